//! Reversible edits against a single curve.
//!
//! Every variant carries the name of the curve it was constructed against
//! (`target`). Execute, undo, and redo all resolve that captured name - a
//! command never consults "the currently active curve", so switching curves
//! between execute and undo cannot redirect the edit.
//!
//! Builders read the current state to capture the before-image a reversal
//! needs; application happens in the session via [`crate::commands`].

use super::{gaps, Curve, PointStatus, TrackPoint};
use crate::commands::CommandError;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    PointMoved {
        target: String,
        index: usize,
        from: [f64; 2],
        to: [f64; 2],
    },
    PointInserted {
        target: String,
        point: TrackPoint,
    },
    /// Pre-removal storage indices paired with the removed points, in strictly
    /// ascending index order.
    PointsDeleted {
        target: String,
        removed: Vec<(usize, TrackPoint)>,
    },
    StatusChanged {
        target: String,
        index: usize,
        from: PointStatus,
        to: PointStatus,
    },
    /// A planned gap fill: synthesized points plus the endframe status the
    /// fill overwrote, so undo can put it back exactly.
    GapFilled {
        target: String,
        inserted: Vec<TrackPoint>,
        sealed: Option<(usize, PointStatus)>,
    },
}

impl Command {
    /// The curve this command is bound to.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::PointMoved { target, .. }
            | Self::PointInserted { target, .. }
            | Self::PointsDeleted { target, .. }
            | Self::StatusChanged { target, .. }
            | Self::GapFilled { target, .. } => target,
        }
    }
    /// Short operation name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PointMoved { .. } => "move point",
            Self::PointInserted { .. } => "insert point",
            Self::PointsDeleted { .. } => "delete points",
            Self::StatusChanged { .. } => "change status",
            Self::GapFilled { .. } => "fill gap",
        }
    }
}

// Builders. Each captures the before-image from the curve it was handed; the
// session re-validates everything again at apply time.
impl Command {
    pub fn move_point(
        target: impl Into<String>,
        curve: &Curve,
        index: usize,
        to: [f64; 2],
    ) -> Result<Self, CommandError> {
        let point = curve.get(index).ok_or(CommandError::BadIndex)?;
        if !to.iter().all(|coordinate| coordinate.is_finite()) {
            return Err(CommandError::NonFinite);
        }
        Ok(Self::PointMoved {
            target: target.into(),
            index,
            from: point.position,
            to,
        })
    }
    /// One move per selected point, ready for [`crate::commands::Command::group`].
    pub fn move_points(
        target: &str,
        curve: &Curve,
        indices: &hashbrown::HashSet<usize>,
        delta: [f64; 2],
    ) -> Result<Vec<Self>, CommandError> {
        if indices.is_empty() {
            return Err(CommandError::NoOp);
        }
        let mut sorted: Vec<usize> = indices.iter().copied().collect();
        sorted.sort_unstable();
        sorted
            .into_iter()
            .map(|index| {
                let point = curve.get(index).ok_or(CommandError::BadIndex)?;
                Self::move_point(
                    target,
                    curve,
                    index,
                    [point.position[0] + delta[0], point.position[1] + delta[1]],
                )
            })
            .collect()
    }
    pub fn insert_point(
        target: impl Into<String>,
        curve: &Curve,
        point: TrackPoint,
    ) -> Result<Self, CommandError> {
        if !point.is_finite() {
            return Err(CommandError::NonFinite);
        }
        if curve.contains_frame(point.frame) {
            return Err(CommandError::MismatchedState);
        }
        Ok(Self::PointInserted {
            target: target.into(),
            point,
        })
    }
    pub fn delete_points(
        target: impl Into<String>,
        curve: &Curve,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<Self, CommandError> {
        let mut sorted: Vec<usize> = indices.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.is_empty() {
            return Err(CommandError::NoOp);
        }
        let removed = sorted
            .into_iter()
            .map(|index| {
                curve
                    .get(index)
                    .map(|point| (index, *point))
                    .ok_or(CommandError::BadIndex)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::PointsDeleted {
            target: target.into(),
            removed,
        })
    }
    pub fn set_status(
        target: impl Into<String>,
        curve: &Curve,
        index: usize,
        to: PointStatus,
    ) -> Result<Self, CommandError> {
        let point = curve.get(index).ok_or(CommandError::BadIndex)?;
        if point.status == to {
            return Err(CommandError::NoOp);
        }
        Ok(Self::StatusChanged {
            target: target.into(),
            index,
            from: point.status,
            to,
        })
    }
    /// Wrap a validated [`gaps::FillPlan`]. Planning can't fail here - the plan
    /// already carries everything apply and undo need.
    #[must_use]
    pub fn fill_gap(target: impl Into<String>, plan: gaps::FillPlan) -> Self {
        Self::GapFilled {
            target: target.into(),
            inserted: plan.inserted,
            sealed: plan.sealed,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::curve::Frame;

    fn curve() -> Curve {
        Curve::from_points(vec![
            TrackPoint::new(Frame::new(1).unwrap(), [10.0, 20.0], PointStatus::Keyframe),
            TrackPoint::new(Frame::new(2).unwrap(), [11.0, 21.0], PointStatus::Tracked),
        ])
        .unwrap()
    }

    #[test]
    fn move_captures_before_image() {
        let command = Command::move_point("a", &curve(), 0, [50.0, 60.0]).unwrap();
        assert_eq!(
            command,
            Command::PointMoved {
                target: "a".into(),
                index: 0,
                from: [10.0, 20.0],
                to: [50.0, 60.0],
            }
        );
        assert_eq!(command.target(), "a");
    }
    #[test]
    fn builders_validate() {
        let curve = curve();
        assert_eq!(
            Command::move_point("a", &curve, 5, [0.0, 0.0]).unwrap_err(),
            CommandError::BadIndex
        );
        assert_eq!(
            Command::move_point("a", &curve, 0, [f64::NAN, 0.0]).unwrap_err(),
            CommandError::NonFinite
        );
        assert_eq!(
            Command::set_status("a", &curve, 1, PointStatus::Tracked).unwrap_err(),
            CommandError::NoOp
        );
        assert_eq!(
            Command::delete_points("a", &curve, []).unwrap_err(),
            CommandError::NoOp
        );
        let duplicate =
            TrackPoint::new(Frame::new(2).unwrap(), [0.0, 0.0], PointStatus::Keyframe);
        assert_eq!(
            Command::insert_point("a", &curve, duplicate).unwrap_err(),
            CommandError::MismatchedState
        );
    }
    #[test]
    fn delete_orders_indices() {
        let command = Command::delete_points("a", &curve(), [1, 0, 1]).unwrap();
        let Command::PointsDeleted { removed, .. } = command else {
            panic!("wrong variant");
        };
        assert_eq!(removed.len(), 2);
        assert!(removed[0].0 < removed[1].0);
    }
    #[test]
    fn grouped_moves_apply_one_delta() {
        let indices: hashbrown::HashSet<usize> = [0, 1].into_iter().collect();
        let moves = Command::move_points("a", &curve(), &indices, [1.0, -1.0]).unwrap();
        assert_eq!(moves.len(), 2);
        let Command::PointMoved { from, to, .. } = &moves[0] else {
            panic!("wrong variant");
        };
        assert_eq!(*to, [from[0] + 1.0, from[1] - 1.0]);
    }
}
