//! # Gaps
//!
//! Gap computation from per-frame status markers. An endframe at frame F
//! terminates its segment; the frames after F up to the next keyframe *or*
//! endframe lack authoritative data and form a gap. Consecutive endframes each
//! bound their own gap - two adjacent segments never collapse into one gap
//! spanning an intermediate endframe.
//!
//! Everything here is a pure function of a point slice. Filling a gap is
//! planned here but applied through a command, so it stays undoable and
//! all-or-nothing.

use super::{Frame, PointStatus, TrackPoint};

/// Where a gap ends.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum GapEnd {
    /// Frame of the boundary point terminating the gap. Exclusive - the
    /// boundary frame itself has data.
    Bounded(Frame),
    /// No later boundary exists; the gap runs to the end of the shot.
    Open,
}

/// A contiguous frame range lacking authoritative tracking data.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Gap {
    /// First frame past the terminating endframe.
    pub start: Frame,
    pub end: GapEnd,
}

impl Gap {
    /// True when the boundary sits directly on `start` - adjacent endframes
    /// leave no frame to fill.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self.end {
            GapEnd::Bounded(end) => end <= self.start,
            GapEnd::Open => false,
        }
    }
    /// Number of missing frames, or `None` for an open-ended gap.
    #[must_use]
    pub fn len(&self) -> Option<u32> {
        match self.end {
            GapEnd::Bounded(end) => Some(end.get().saturating_sub(self.start.get())),
            GapEnd::Open => None,
        }
    }
    /// Last frame missing data, or `None` if open-ended or empty.
    #[must_use]
    pub fn last_missing(&self) -> Option<Frame> {
        match self.end {
            GapEnd::Bounded(end) => end.checked_prev().filter(|&last| last >= self.start),
            GapEnd::Open => None,
        }
    }
}

/// All gaps of a curve's points, in frame order. Storage order of the input is
/// irrelevant.
#[must_use]
pub fn gaps(points: &[TrackPoint]) -> Vec<Gap> {
    let mut in_frame_order: Vec<&TrackPoint> = points.iter().collect();
    in_frame_order.sort_unstable_by_key(|point| point.frame);

    let mut found = Vec::new();
    for (position, point) in in_frame_order.iter().enumerate() {
        if point.status != PointStatus::Endframe {
            continue;
        }
        // Each endframe opens its own gap, bounded by the *next* boundary
        // status - possibly another endframe on the very next frame.
        let end = in_frame_order[position + 1..]
            .iter()
            .find(|later| later.status.is_boundary())
            .map_or(GapEnd::Open, |later| GapEnd::Bounded(later.frame));
        found.push(Gap {
            start: point.frame.next(),
            end,
        });
    }
    found
}

/// Frames carrying any point data at all, coalesced into spans. Renderers use
/// this to draw coverage bars without walking every point.
#[must_use]
pub fn coverage(points: &[TrackPoint]) -> rangemap::RangeInclusiveSet<u32> {
    let mut covered = rangemap::RangeInclusiveSet::new();
    for point in points {
        let frame = point.frame.get();
        covered.insert(frame..=frame);
    }
    covered
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapFillError {
    #[error("gap is open-ended; an explicit end bound is required")]
    OpenEnded,
    #[error("gap contains no frames to fill")]
    Empty,
    #[error("the endframe opening the gap is not in the curve")]
    MissingBoundary,
}

/// A validated, bounded fill of one gap. Feeds `Command::fill_gap`.
#[derive(Clone, Debug, PartialEq)]
pub struct FillPlan {
    /// Interpolated points for the missing frames, in frame order.
    pub inserted: Vec<TrackPoint>,
    /// Storage index and prior status of the endframe this fill seals. Only
    /// set when the fill reaches the far boundary, and always recorded so the
    /// overwrite is exactly reversible.
    pub sealed: Option<(usize, PointStatus)>,
    /// True when a budget cut the fill short of the boundary.
    pub truncated: bool,
}

/// Plan a linear-interpolation fill of `gap`.
///
/// `bound` is the caller's last frame to fill, required for an open-ended gap
/// and otherwise an extra clamp. `budget` caps how many frames this one
/// operation may synthesize; a cut-short plan is still internally consistent,
/// it just leaves the gap open for a later fill.
///
/// Frames inside the gap that already carry (non-authoritative) data are
/// skipped - frame uniqueness wins over resampling.
pub fn fill_plan(
    points: &[TrackPoint],
    gap: Gap,
    bound: Option<Frame>,
    budget: Option<usize>,
) -> Result<FillPlan, GapFillError> {
    let last = match (gap.end, bound) {
        (GapEnd::Bounded(end), None) => end.checked_prev().ok_or(GapFillError::Empty)?,
        (GapEnd::Bounded(end), Some(bound)) => {
            let last = end.checked_prev().ok_or(GapFillError::Empty)?;
            last.min(bound)
        }
        (GapEnd::Open, Some(bound)) => bound,
        (GapEnd::Open, None) => return Err(GapFillError::OpenEnded),
    };
    if last < gap.start {
        return Err(GapFillError::Empty);
    }

    // The endframe anchoring the near side of the gap.
    let near_frame = gap.start.checked_prev().ok_or(GapFillError::MissingBoundary)?;
    let (near_index, near) = points
        .iter()
        .enumerate()
        .find(|(_, point)| point.frame == near_frame && point.status == PointStatus::Endframe)
        .ok_or(GapFillError::MissingBoundary)?;
    // The far anchor, when the gap has one. Holding the near position is the
    // best guess for a bounded fill whose boundary point went missing, and the
    // only option for an open-ended one.
    let far = match gap.end {
        GapEnd::Bounded(end) => points.iter().find(|point| point.frame == end),
        GapEnd::Open => None,
    };

    let mut inserted = Vec::new();
    let mut truncated = false;
    let mut frame = gap.start;
    loop {
        if budget.is_some_and(|budget| inserted.len() >= budget) {
            truncated = true;
            break;
        }
        if points.iter().all(|point| point.frame != frame) {
            let position = match far {
                Some(far) => {
                    let span = f64::from(far.frame.get() - near.frame.get());
                    let t = f64::from(frame.get() - near.frame.get()) / span;
                    [
                        near.position[0] + (far.position[0] - near.position[0]) * t,
                        near.position[1] + (far.position[1] - near.position[1]) * t,
                    ]
                }
                None => near.position,
            };
            inserted.push(TrackPoint::new(frame, position, PointStatus::Interpolated));
        }
        if frame == last {
            break;
        }
        frame = frame.next();
    }

    // Sealing converts the opening endframe to a tracked point, but only once
    // the segment actually reaches the far boundary again.
    let sealed = match gap.end {
        GapEnd::Bounded(end) if !truncated && end.checked_prev() == Some(last) => {
            Some((near_index, near.status))
        }
        _ => None,
    };

    Ok(FillPlan {
        inserted,
        sealed,
        truncated,
    })
}
