//! # Commands
//!
//! Commands are the way curve data is modified. Each one is an immutable
//! description of a single undoable edit, bound to its target curve at
//! construction. The [`crate::queue`] executes them and keeps the linear
//! undo/redo history.

pub use crate::state::curve::commands::Command as CurveCommand;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("command targets a curve that does not exist")]
    UnknownCurve,
    #[error("command constructed for a state that does not match the current state")]
    MismatchedState,
    #[error("point index out of range for the target curve")]
    BadIndex,
    #[error("non-finite coordinate")]
    NonFinite,
    #[error("command makes no changes")]
    NoOp,
}

pub trait CommandConsumer<C> {
    /// Apply a single command. If this generates an error,
    /// the state of `self` must *not* be observably changed.
    fn apply(&mut self, command: DoUndo<'_, C>) -> Result<(), CommandError>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScopeType {
    /// Commands grouped because they were individual parts of a single,
    /// larger operation - one step as far as the user can tell.
    Atoms,
}

/// Commands about commands!
#[derive(Clone, Debug, PartialEq)]
pub enum MetaCommand {
    /// Bundle many commands into one undo step. Applied in order, reverted in
    /// reverse order.
    Scope(ScopeType, Box<[Command]>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Meta(MetaCommand),
    Curve(CurveCommand),
}
impl From<MetaCommand> for Command {
    fn from(value: MetaCommand) -> Self {
        Self::Meta(value)
    }
}
impl From<CurveCommand> for Command {
    fn from(value: CurveCommand) -> Self {
        Self::Curve(value)
    }
}
impl Command {
    #[must_use]
    pub fn meta(&self) -> Option<&MetaCommand> {
        match self {
            Self::Meta(m) => Some(m),
            Self::Curve(_) => None,
        }
    }
    #[must_use]
    pub fn curve(&self) -> Option<&CurveCommand> {
        match self {
            Self::Curve(c) => Some(c),
            Self::Meta(_) => None,
        }
    }
    /// Short operation name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Meta(MetaCommand::Scope(..)) => "batch edit",
            Self::Curve(c) => c.kind(),
        }
    }
    /// The curve this command (or for a scope, its first member) targets.
    #[must_use]
    pub fn target_curve(&self) -> Option<&str> {
        match self {
            Self::Curve(c) => Some(c.target()),
            Self::Meta(MetaCommand::Scope(_, members)) => {
                members.iter().find_map(Self::target_curve)
            }
        }
    }
    /// Collapse a batch into one command: a single member stays bare, several
    /// become an atoms scope, none is `None`.
    #[must_use]
    pub fn group(mut commands: smallvec::SmallVec<[Self; 1]>) -> Option<Self> {
        match commands.len() {
            0 => None,
            1 => commands.pop(),
            _ => Some(Self::Meta(MetaCommand::Scope(
                ScopeType::Atoms,
                commands.into_vec().into_boxed_slice(),
            ))),
        }
    }
}

#[derive(PartialEq, Eq, Debug)]
pub enum DoUndo<'c, T> {
    Do(&'c T),
    Undo(&'c T),
}
impl<'c, T> DoUndo<'c, T> {
    /// Apply a closure to the inner type T, maintaining the
    /// Do or Undo status. Returns None if the closure returns None.
    pub fn filter_map<Func, Return>(&self, f: Func) -> Option<DoUndo<'c, Return>>
    where
        Func: FnOnce(&'c T) -> Option<&'c Return>,
        Return: 'c,
    {
        match self {
            Self::Do(c) => Some(DoUndo::Do(f(c)?)),
            Self::Undo(c) => Some(DoUndo::Undo(f(c)?)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::curve::{Frame, PointStatus, TrackPoint};

    fn move_command(target: &str) -> Command {
        CurveCommand::PointMoved {
            target: target.into(),
            index: 0,
            from: [0.0, 0.0],
            to: [1.0, 1.0],
        }
        .into()
    }

    #[test]
    fn group_collapses() {
        assert_eq!(Command::group(smallvec::SmallVec::new()), None);

        let single = Command::group(smallvec::smallvec![move_command("a")]).unwrap();
        assert!(single.curve().is_some());

        let scope =
            Command::group(smallvec::smallvec![move_command("a"), move_command("a")]).unwrap();
        assert!(scope.meta().is_some());
        assert_eq!(scope.kind(), "batch edit");
        assert_eq!(scope.target_curve(), Some("a"));
    }
    #[test]
    fn target_survives_wrapping() {
        let insert: Command = CurveCommand::PointInserted {
            target: "tree_03".into(),
            point: TrackPoint::new(Frame::FIRST, [0.0, 0.0], PointStatus::Keyframe),
        }
        .into();
        assert_eq!(insert.target_curve(), Some("tree_03"));
        assert_eq!(insert.kind(), "insert point");
    }
}
