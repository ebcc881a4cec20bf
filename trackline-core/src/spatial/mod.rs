//! # Spatial index
//!
//! Grid-bucketed nearest-point lookup over transformed screen positions.
//! A query inspects only the buckets overlapping its threshold circle, never
//! the whole curve, which is what keeps picking interactive on curves with
//! thousands of points.
//!
//! The index is a plain value built from explicit inputs - points, transform,
//! viewport - and rebuilt wholesale when any of them change. It never reaches
//! into shared state, so building or querying it can't race a notification.

use az::SaturatingAs;

use crate::{
    state::curve::{Frame, TrackPoint},
    transform::Transform,
    util::OrderedF64,
};

/// Buckets per axis. 20x20 cells over a viewport keeps bucket occupancy in
/// the single digits for typical curve sizes.
pub const GRID_BUCKETS: usize = 20;

/// A point found near the query position.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Hit {
    /// Storage index into the curve the index was built from.
    pub index: usize,
    pub frame: Frame,
    pub distance_sq: f64,
}
impl Hit {
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.distance_sq.sqrt()
    }
}

#[derive(Copy, Clone, Debug)]
struct Entry {
    index: usize,
    frame: Frame,
    screen: [f64; 2],
}

/// Screen-space grid over one curve's points under one transform.
pub struct GridIndex {
    buckets: Vec<Vec<Entry>>,
    cell: [f64; 2],
}

impl GridIndex {
    /// Build from explicit inputs. Points whose projection is non-finite are
    /// unpickable and skipped; points outside the viewport clamp into edge
    /// buckets so they stay findable.
    #[must_use]
    pub fn build(points: &[TrackPoint], transform: &Transform, viewport: [f64; 2]) -> Self {
        // A degenerate viewport collapses everything into one bucket; queries
        // still work, just linearly.
        let cell = [
            (viewport[0] / GRID_BUCKETS as f64).max(f64::MIN_POSITIVE),
            (viewport[1] / GRID_BUCKETS as f64).max(f64::MIN_POSITIVE),
        ];
        let mut buckets = vec![Vec::new(); GRID_BUCKETS * GRID_BUCKETS];
        for (index, point) in points.iter().enumerate() {
            let screen = transform.project(point.position);
            if !screen.iter().all(|coordinate| coordinate.is_finite()) {
                continue;
            }
            let (col, row) = bucket_of(cell, screen);
            buckets[row * GRID_BUCKETS + col].push(Entry {
                index,
                frame: point.frame,
                screen,
            });
        }
        Self { buckets, cell }
    }
    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }
    /// The nearest point within `threshold` screen pixels of `pos`, or `None`.
    /// Ties break by smaller distance, then lower frame number.
    #[must_use]
    pub fn query(&self, pos: [f64; 2], threshold: f64) -> Option<Hit> {
        if !threshold.is_finite() || threshold < 0.0 {
            return None;
        }
        if !pos.iter().all(|coordinate| coordinate.is_finite()) {
            return None;
        }
        let threshold_sq = threshold * threshold;
        // Only the bucket ring the threshold circle overlaps.
        let (col_lo, row_lo) = bucket_of(self.cell, [pos[0] - threshold, pos[1] - threshold]);
        let (col_hi, row_hi) = bucket_of(self.cell, [pos[0] + threshold, pos[1] + threshold]);

        let candidates = (row_lo..=row_hi)
            .flat_map(|row| {
                (col_lo..=col_hi).flat_map(move |col| &self.buckets[row * GRID_BUCKETS + col])
            })
            .filter_map(|entry| {
                let dx = entry.screen[0] - pos[0];
                let dy = entry.screen[1] - pos[1];
                // Entries and pos are finite, so the distance is non-NaN.
                let distance_sq = OrderedF64::new(dx * dx + dy * dy).ok()?;
                (distance_sq.get() <= threshold_sq).then_some((distance_sq, entry))
            });
        candidates
            .min_by_key(|&(distance_sq, entry)| (distance_sq, entry.frame))
            .map(|(distance_sq, entry)| Hit {
                index: entry.index,
                frame: entry.frame,
                distance_sq: distance_sq.get(),
            })
    }
}

fn bucket_of(cell: [f64; 2], pos: [f64; 2]) -> (usize, usize) {
    // Saturating: negative coordinates land in column/row zero, far ones clamp
    // to the last bucket.
    let col = (pos[0] / cell[0])
        .floor()
        .saturating_as::<usize>()
        .min(GRID_BUCKETS - 1);
    let row = (pos[1] / cell[1])
        .floor()
        .saturating_as::<usize>()
        .min(GRID_BUCKETS - 1);
    (col, row)
}
