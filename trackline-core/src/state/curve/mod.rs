//! # Curves
//!
//! A curve is a named, ordered collection of per-frame tracked points. Storage
//! order is insertion order - frame ordering is a presentation concern, served
//! by the sorted views below without ever reordering the backing storage.
//! Frames are unique within a curve; that invariant is enforced at every
//! mutation boundary.

pub mod commands;
pub mod gaps;

use crate::commands::{CommandConsumer, CommandError, DoUndo};

/// A 1-based frame number. Frame zero is unrepresentable.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Frame(std::num::NonZeroU32);

impl Frame {
    pub const FIRST: Self = Self(std::num::NonZeroU32::MIN);
    /// `None` if `frame` is zero.
    #[must_use]
    pub fn new(frame: u32) -> Option<Self> {
        std::num::NonZeroU32::new(frame).map(Self)
    }
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
    /// The following frame. Saturates at `u32::MAX`, far beyond any shot length.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
    /// The preceding frame, or `None` at frame one.
    #[must_use]
    pub fn checked_prev(self) -> Option<Self> {
        Self::new(self.0.get() - 1)
    }
}
impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Authority classification of a single tracked sample.
#[derive(
    strum::AsRefStr,
    strum::EnumIter,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Hash,
    Debug,
)]
#[repr(u8)]
pub enum PointStatus {
    /// User-set, authoritative.
    Keyframe,
    /// Produced by the tracker.
    Tracked,
    /// Synthesized between neighbors, not authoritative.
    Interpolated,
    /// Last authoritative frame of a segment. The frame after an endframe
    /// opens a gap.
    Endframe,
}
impl Default for PointStatus {
    fn default() -> Self {
        Self::Tracked
    }
}
impl PointStatus {
    /// Statuses that terminate a gap: a keyframe re-establishes authority, an
    /// endframe bounds the next segment.
    #[must_use]
    pub fn is_boundary(self) -> bool {
        matches!(self, Self::Keyframe | Self::Endframe)
    }
}

/// One tracked sample of a curve.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TrackPoint {
    pub frame: Frame,
    /// Position in source-image pixels.
    pub position: [f64; 2],
    pub status: PointStatus,
}
impl TrackPoint {
    #[must_use]
    pub fn new(frame: Frame, position: [f64; 2], status: PointStatus) -> Self {
        Self {
            frame,
            position,
            status,
        }
    }
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|coordinate| coordinate.is_finite())
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveError {
    #[error("two points share frame {0}")]
    DuplicateFrame(Frame),
    #[error("non-finite coordinate on frame {0}")]
    NonFinitePoint(Frame),
}

/// Point storage for one curve. The name lives in the session's curve map, not
/// here - every instance is already bound to exactly one name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Curve {
    points: Vec<TrackPoint>,
}

// Public methods for clients.
impl Curve {
    /// Validate and adopt a point sequence wholesale. Storage order is the
    /// order given.
    pub fn from_points(points: Vec<TrackPoint>) -> Result<Self, CurveError> {
        let mut seen = hashbrown::HashSet::with_capacity(points.len());
        for point in &points {
            if !point.is_finite() {
                return Err(CurveError::NonFinitePoint(point.frame));
            }
            if !seen.insert(point.frame) {
                return Err(CurveError::DuplicateFrame(point.frame));
            }
        }
        Ok(Self { points })
    }
    #[must_use]
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TrackPoint> {
        self.points.get(index)
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    #[must_use]
    pub fn contains_frame(&self, frame: Frame) -> bool {
        self.index_of_frame(frame).is_some()
    }
    // O(n). Fine at interactive curve sizes; the spatial index covers the hot
    // screen-space path.
    /// Storage index of the point on the given frame, if any.
    #[must_use]
    pub fn index_of_frame(&self, frame: Frame) -> Option<usize> {
        self.points.iter().position(|point| point.frame == frame)
    }
    /// Storage indices reordered by frame. Storage itself is never resorted.
    #[must_use]
    pub fn frame_sorted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.points.len()).collect();
        indices.sort_unstable_by_key(|&index| self.points[index].frame);
        indices
    }
    /// Points in frame order, regardless of storage order.
    pub fn iter_frame_order(&self) -> impl Iterator<Item = &TrackPoint> + '_ {
        self.frame_sorted_indices()
            .into_iter()
            .map(|index| &self.points[index])
    }
    /// Lowest and highest frame with data, or `None` for an empty curve.
    #[must_use]
    pub fn frame_span(&self) -> Option<(Frame, Frame)> {
        let first = self.points.iter().map(|point| point.frame).min()?;
        let last = self.points.iter().map(|point| point.frame).max()?;
        Some((first, last))
    }
}

impl CommandConsumer<commands::Command> for Curve {
    fn apply(&mut self, command: DoUndo<'_, commands::Command>) -> Result<(), CommandError> {
        use commands::Command;
        match command {
            // The from/to swap turns the undo arm into the do arm for free.
            DoUndo::Do(Command::PointMoved {
                index, from, to, ..
            })
            | DoUndo::Undo(Command::PointMoved {
                index,
                from: to,
                to: from,
                ..
            }) => {
                let point = self.points.get_mut(*index).ok_or(CommandError::BadIndex)?;
                if point.position != *from {
                    Err(CommandError::MismatchedState)
                } else {
                    point.position = *to;
                    Ok(())
                }
            }
            DoUndo::Do(Command::StatusChanged {
                index, from, to, ..
            })
            | DoUndo::Undo(Command::StatusChanged {
                index,
                from: to,
                to: from,
                ..
            }) => {
                let point = self.points.get_mut(*index).ok_or(CommandError::BadIndex)?;
                if point.status != *from {
                    Err(CommandError::MismatchedState)
                } else {
                    point.status = *to;
                    Ok(())
                }
            }
            DoUndo::Do(Command::PointInserted { point, .. }) => {
                if self.contains_frame(point.frame) {
                    Err(CommandError::MismatchedState)
                } else {
                    self.points.push(*point);
                    Ok(())
                }
            }
            DoUndo::Undo(Command::PointInserted { point, .. }) => {
                let index = self
                    .index_of_frame(point.frame)
                    .ok_or(CommandError::MismatchedState)?;
                if self.points[index] != *point {
                    Err(CommandError::MismatchedState)
                } else {
                    self.points.remove(index);
                    Ok(())
                }
            }
            DoUndo::Do(Command::PointsDeleted { removed, .. }) => {
                // Validate everything against pre-removal indices, then mutate.
                if !indices_strictly_ascending(removed) {
                    return Err(CommandError::MismatchedState);
                }
                for (index, point) in removed.iter() {
                    match self.points.get(*index) {
                        Some(stored) if stored == point => {}
                        Some(_) => return Err(CommandError::MismatchedState),
                        None => return Err(CommandError::BadIndex),
                    }
                }
                // Descending so earlier indices stay valid while removing.
                for (index, _) in removed.iter().rev() {
                    self.points.remove(*index);
                }
                Ok(())
            }
            DoUndo::Undo(Command::PointsDeleted { removed, .. }) => {
                if !indices_strictly_ascending(removed) {
                    return Err(CommandError::MismatchedState);
                }
                // The k'th reinsertion may land at most at the then-current end.
                for (reinserted_before, (index, point)) in removed.iter().enumerate() {
                    if *index > self.points.len() + reinserted_before {
                        return Err(CommandError::BadIndex);
                    }
                    if self.contains_frame(point.frame) {
                        return Err(CommandError::MismatchedState);
                    }
                }
                for (index, point) in removed.iter() {
                    self.points.insert(*index, *point);
                }
                Ok(())
            }
            DoUndo::Do(Command::GapFilled {
                inserted, sealed, ..
            }) => {
                for point in inserted.iter() {
                    if self.contains_frame(point.frame) {
                        return Err(CommandError::MismatchedState);
                    }
                }
                if let Some((index, was)) = sealed {
                    let point = self.points.get(*index).ok_or(CommandError::BadIndex)?;
                    if point.status != *was {
                        return Err(CommandError::MismatchedState);
                    }
                }
                if let Some((index, _)) = sealed {
                    self.points[*index].status = PointStatus::Tracked;
                }
                self.points.extend_from_slice(inserted);
                Ok(())
            }
            DoUndo::Undo(Command::GapFilled {
                inserted, sealed, ..
            }) => {
                let tail_start = self
                    .points
                    .len()
                    .checked_sub(inserted.len())
                    .ok_or(CommandError::MismatchedState)?;
                if self.points[tail_start..] != inserted[..] {
                    return Err(CommandError::MismatchedState);
                }
                if let Some((index, _)) = sealed {
                    // The sealed boundary predates the fill, so it must sit
                    // outside the inserted tail.
                    let point = self
                        .points
                        .get(*index)
                        .filter(|_| *index < tail_start)
                        .ok_or(CommandError::BadIndex)?;
                    if point.status != PointStatus::Tracked {
                        return Err(CommandError::MismatchedState);
                    }
                }
                self.points.truncate(tail_start);
                if let Some((index, was)) = sealed {
                    self.points[*index].status = *was;
                }
                Ok(())
            }
        }
    }
}

fn indices_strictly_ascending(removed: &[(usize, TrackPoint)]) -> bool {
    removed
        .windows(2)
        .all(|pair| pair[0].0 < pair[1].0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(n: u32) -> Frame {
        Frame::new(n).unwrap()
    }
    fn point(n: u32, x: f64, y: f64, status: PointStatus) -> TrackPoint {
        TrackPoint::new(frame(n), [x, y], status)
    }

    #[test]
    fn rejects_duplicate_frames() {
        let result = Curve::from_points(vec![
            point(1, 0.0, 0.0, PointStatus::Keyframe),
            point(2, 1.0, 1.0, PointStatus::Tracked),
            point(1, 2.0, 2.0, PointStatus::Tracked),
        ]);
        assert_eq!(result.unwrap_err(), CurveError::DuplicateFrame(frame(1)));
    }
    #[test]
    fn rejects_non_finite() {
        let result = Curve::from_points(vec![point(3, f64::NAN, 0.0, PointStatus::Tracked)]);
        assert_eq!(result.unwrap_err(), CurveError::NonFinitePoint(frame(3)));
    }
    #[test]
    fn storage_order_is_insertion_order() {
        // Deliberately unsorted by frame.
        let points = vec![
            point(5, 0.0, 0.0, PointStatus::Tracked),
            point(1, 1.0, 1.0, PointStatus::Keyframe),
            point(3, 2.0, 2.0, PointStatus::Tracked),
        ];
        let curve = Curve::from_points(points.clone()).unwrap();
        assert_eq!(curve.points(), &points[..]);
        // ...while the sorted view reorders.
        assert_eq!(curve.frame_sorted_indices(), [1, 2, 0]);
        let frames: Vec<u32> = curve.iter_frame_order().map(|p| p.frame.get()).collect();
        assert_eq!(frames, [1, 3, 5]);
    }
    #[test]
    fn exactly_two_boundary_statuses() {
        use strum::IntoEnumIterator;
        let boundaries: Vec<String> = PointStatus::iter()
            .filter(|status| status.is_boundary())
            .map(|status| status.as_ref().to_owned())
            .collect();
        assert_eq!(boundaries, ["Keyframe", "Endframe"]);
    }
    #[test]
    fn frame_lookup() {
        let curve = Curve::from_points(vec![
            point(5, 0.0, 0.0, PointStatus::Tracked),
            point(1, 1.0, 1.0, PointStatus::Keyframe),
        ])
        .unwrap();
        assert_eq!(curve.index_of_frame(frame(1)), Some(1));
        assert_eq!(curve.index_of_frame(frame(2)), None);
        assert_eq!(curve.frame_span(), Some((frame(1), frame(5))));
    }

    #[test]
    fn move_do_undo_round_trip() {
        use crate::commands::{CommandConsumer, DoUndo};
        let mut curve =
            Curve::from_points(vec![point(1, 10.0, 20.0, PointStatus::Keyframe)]).unwrap();
        let command = commands::Command::PointMoved {
            target: "a".into(),
            index: 0,
            from: [10.0, 20.0],
            to: [50.0, 60.0],
        };
        curve.apply(DoUndo::Do(&command)).unwrap();
        assert_eq!(curve.get(0).unwrap().position, [50.0, 60.0]);
        curve.apply(DoUndo::Undo(&command)).unwrap();
        assert_eq!(curve.get(0).unwrap().position, [10.0, 20.0]);
    }
    #[test]
    fn move_against_drifted_state_is_rejected() {
        use crate::commands::{CommandConsumer, CommandError, DoUndo};
        let mut curve =
            Curve::from_points(vec![point(1, 0.0, 0.0, PointStatus::Keyframe)]).unwrap();
        let command = commands::Command::PointMoved {
            target: "a".into(),
            index: 0,
            from: [10.0, 20.0],
            to: [50.0, 60.0],
        };
        // `from` doesn't match the stored position - nothing may change.
        assert_eq!(
            curve.apply(DoUndo::Do(&command)),
            Err(CommandError::MismatchedState)
        );
        assert_eq!(curve.get(0).unwrap().position, [0.0, 0.0]);
    }
    #[test]
    fn delete_undo_restores_storage_order() {
        use crate::commands::{CommandConsumer, DoUndo};
        let points = vec![
            point(5, 0.0, 0.0, PointStatus::Tracked),
            point(1, 1.0, 1.0, PointStatus::Keyframe),
            point(3, 2.0, 2.0, PointStatus::Tracked),
            point(2, 3.0, 3.0, PointStatus::Endframe),
        ];
        let mut curve = Curve::from_points(points.clone()).unwrap();
        let command = commands::Command::PointsDeleted {
            target: "a".into(),
            removed: vec![(1, points[1]), (3, points[3])],
        };
        curve.apply(DoUndo::Do(&command)).unwrap();
        assert_eq!(curve.points(), &[points[0], points[2]]);
        curve.apply(DoUndo::Undo(&command)).unwrap();
        assert_eq!(curve.points(), &points[..]);
    }
    #[test]
    fn gap_fill_undo_restores_endframe() {
        use crate::commands::{CommandConsumer, DoUndo};
        let mut curve = Curve::from_points(vec![
            point(9, 0.0, 0.0, PointStatus::Endframe),
            point(12, 30.0, 30.0, PointStatus::Keyframe),
        ])
        .unwrap();
        let command = commands::Command::GapFilled {
            target: "a".into(),
            inserted: vec![
                point(10, 10.0, 10.0, PointStatus::Interpolated),
                point(11, 20.0, 20.0, PointStatus::Interpolated),
            ],
            sealed: Some((0, PointStatus::Endframe)),
        };
        curve.apply(DoUndo::Do(&command)).unwrap();
        assert_eq!(curve.len(), 4);
        // The endframe got overwritten by the fill...
        assert_eq!(curve.get(0).unwrap().status, PointStatus::Tracked);

        curve.apply(DoUndo::Undo(&command)).unwrap();
        assert_eq!(curve.len(), 2);
        // ...and undo restores it exactly, metadata included.
        assert_eq!(curve.get(0).unwrap().status, PointStatus::Endframe);
    }
}
