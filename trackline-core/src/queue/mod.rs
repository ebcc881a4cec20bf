//! # Command queue
//!
//! Linear undo/redo history over a session. Executing a command applies it to
//! the session, pushes it on the undo stack, and clears the redo stack; undo
//! and redo replay the stored command with flipped polarity. The history is
//! capacity-bounded - the oldest entry falls off first, and eviction never
//! disturbs the ability to undo or redo what remains.
//!
//! One logical thread owns all of this. The queue wraps everything in a lock
//! purely so collaborators can share the handle; it is not an invitation to
//! mutate from two threads at once.

use std::sync::Arc;

use crate::{
    commands::{Command, CommandConsumer, CommandError, DoUndo},
    state::Session,
};

/// Default bound on retained undo steps. Far beyond interactive undo depth,
/// small enough that a long session doesn't hoard every edit ever made.
pub const DEFAULT_CAPACITY: usize = 256;

/// What a call to undo or redo did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// An entry was replayed and moved between stacks.
    Done,
    /// The stack was empty; nothing to do. Not an error.
    Nothing,
    /// The entry could not be applied - its target vanished or state drifted.
    /// Both stacks and the session are unchanged.
    Failed(CommandError),
}
impl StepOutcome {
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Linear command history. Owns no state - the session to mutate is passed in
/// per call, so tests and embedders can hold them separately.
#[derive(Debug)]
pub struct History {
    undo: std::collections::VecDeque<Command>,
    redo: Vec<Command>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// `capacity` of zero disables history entirely - commands still execute.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            undo: std::collections::VecDeque::with_capacity(capacity.min(64)),
            redo: Vec::new(),
            capacity,
        }
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.undo.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }
    /// Forget everything. The session is untouched.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Apply `command` to the session and record it. On failure the session is
    /// untouched, nothing is recorded, and the stacks keep their state.
    pub fn execute(&mut self, session: &mut Session, command: Command) -> Result<(), CommandError> {
        if let Err(error) = session.apply(DoUndo::Do(&command)) {
            log::warn!(
                "{} on \"{}\" failed: {error}",
                command.kind(),
                command.target_curve().unwrap_or("<none>"),
            );
            return Err(error);
        }
        log::trace!("executed {} on {:?}", command.kind(), command.target_curve());
        // A fresh edit forks away from whatever was undone before it.
        self.redo.clear();
        if self.capacity == 0 {
            return Ok(());
        }
        while self.undo.len() >= self.capacity {
            // Oldest falls off. Entries above it never referenced it.
            self.undo.pop_front();
        }
        self.undo.push_back(command);
        Ok(())
    }
    /// Revert the most recent edit against the curve it was issued on -
    /// never against whatever curve happens to be active now.
    pub fn undo(&mut self, session: &mut Session) -> StepOutcome {
        let Some(command) = self.undo.back() else {
            log::debug!("nothing to undo");
            return StepOutcome::Nothing;
        };
        if let Err(error) = session.apply(DoUndo::Undo(command)) {
            log::warn!(
                "undo of {} on \"{}\" failed: {error}",
                command.kind(),
                command.target_curve().unwrap_or("<none>"),
            );
            return StepOutcome::Failed(error);
        }
        if let Some(command) = self.undo.pop_back() {
            self.redo.push(command);
        }
        StepOutcome::Done
    }
    pub fn redo(&mut self, session: &mut Session) -> StepOutcome {
        let Some(command) = self.redo.last() else {
            log::debug!("nothing to redo");
            return StepOutcome::Nothing;
        };
        if let Err(error) = session.apply(DoUndo::Do(command)) {
            log::warn!(
                "redo of {} on \"{}\" failed: {error}",
                command.kind(),
                command.target_curve().unwrap_or("<none>"),
            );
            return StepOutcome::Failed(error);
        }
        if let Some(command) = self.redo.pop() {
            self.undo.push_back(command);
        }
        StepOutcome::Done
    }
}

struct SessionQueueInner {
    session: Session,
    history: History,
}

/// The handle collaborators hold: session plus history behind one lock, so a
/// command is built and executed against the same state snapshot.
#[derive(Clone)]
pub struct SessionQueue {
    inner: Arc<parking_lot::RwLock<SessionQueueInner>>,
}
impl Default for SessionQueue {
    fn default() -> Self {
        Self::from_session(Session::new(), History::new())
    }
}
impl SessionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn from_session(session: Session, history: History) -> Self {
        Self {
            inner: Arc::new(parking_lot::RwLock::new(SessionQueueInner {
                session,
                history,
            })),
        }
    }
    /// Read access to the session for renderers and exporters.
    pub fn read<R>(&self, read: impl FnOnce(&Session) -> R) -> R {
        read(&self.inner.read().session)
    }
    /// Direct, non-undoable mutation - importer seeding, selection, active
    /// curve. Undoable edits go through [`Self::submit`].
    pub fn seed<R>(&self, write: impl FnOnce(&mut Session) -> R) -> R {
        write(&mut self.inner.write().session)
    }
    /// Execute a pre-built command.
    pub fn submit(&self, command: Command) -> Result<(), CommandError> {
        let mut lock = self.inner.write();
        let SessionQueueInner { session, history } = &mut *lock;
        history.execute(session, command)
    }
    /// Build a command against the current state and execute it in one
    /// critical section, so the captured before-image cannot go stale.
    pub fn submit_with(
        &self,
        build: impl FnOnce(&Session) -> Result<Command, CommandError>,
    ) -> Result<(), CommandError> {
        let mut lock = self.inner.write();
        let SessionQueueInner { session, history } = &mut *lock;
        let command = build(session)?;
        history.execute(session, command)
    }
    pub fn undo(&self) -> StepOutcome {
        let mut lock = self.inner.write();
        let SessionQueueInner { session, history } = &mut *lock;
        history.undo(session)
    }
    pub fn redo(&self) -> StepOutcome {
        let mut lock = self.inner.write();
        let SessionQueueInner { session, history } = &mut *lock;
        history.redo(session)
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.inner.read().history.can_undo()
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.inner.read().history.can_redo()
    }
    /// Forget history without touching data - e.g. after a wholesale reload
    /// made every recorded before-image meaningless.
    pub fn clear_history(&self) {
        self.inner.write().history.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commands::CurveCommand;
    use crate::state::{Frame, PointStatus, TrackPoint};

    fn point(n: u32, x: f64, y: f64) -> TrackPoint {
        TrackPoint::new(Frame::new(n).unwrap(), [x, y], PointStatus::Tracked)
    }
    fn seeded_queue() -> SessionQueue {
        let queue = SessionQueue::new();
        queue.seed(|session| {
            session
                .set_curve_data("a", vec![point(1, 10.0, 20.0), point(2, 30.0, 40.0)])
                .unwrap();
            session
                .set_curve_data("b", vec![point(1, 100.0, 200.0)])
                .unwrap();
        });
        queue
    }
    fn move_a0(queue: &SessionQueue, to: [f64; 2]) {
        queue
            .submit_with(|session| {
                let curve = session.curve("a").ok_or(CommandError::UnknownCurve)?;
                Ok(CurveCommand::move_point("a", curve, 0, to)?.into())
            })
            .unwrap();
    }

    #[test]
    fn undo_follows_the_captured_target() {
        let queue = seeded_queue();
        move_a0(&queue, [50.0, 60.0]);
        // Switching the active curve must not redirect the undo.
        queue.seed(|session| session.set_active_curve(Some("b")).unwrap());

        assert!(queue.undo().is_done());
        queue.read(|session| {
            assert_eq!(session.get_curve_data("a").unwrap()[0].position, [10.0, 20.0]);
            assert_eq!(
                session.get_curve_data("b").unwrap()[0].position,
                [100.0, 200.0]
            );
            assert_eq!(session.active_curve(), Some("b"));
        });
    }
    #[test]
    fn empty_undo_is_a_reported_no_op() {
        let queue = seeded_queue();
        assert_eq!(queue.undo(), StepOutcome::Nothing);
        assert_eq!(queue.redo(), StepOutcome::Nothing);
        assert!(!queue.can_undo());
    }
    #[test]
    fn redo_reapplies_and_new_edit_clears_it() {
        let queue = seeded_queue();
        move_a0(&queue, [50.0, 60.0]);
        assert!(queue.undo().is_done());
        assert!(queue.can_redo());
        assert!(queue.redo().is_done());
        queue.read(|session| {
            assert_eq!(session.get_curve_data("a").unwrap()[0].position, [50.0, 60.0]);
        });

        // Undo again, then execute something new: redo must be gone.
        assert!(queue.undo().is_done());
        move_a0(&queue, [7.0, 7.0]);
        assert!(!queue.can_redo());
        assert_eq!(queue.redo(), StepOutcome::Nothing);
    }
    #[test]
    fn undo_of_deleted_curve_fails_cleanly() {
        let queue = seeded_queue();
        move_a0(&queue, [50.0, 60.0]);
        queue.seed(|session| assert!(session.remove_curve("a")));

        let outcome = queue.undo();
        assert_eq!(outcome, StepOutcome::Failed(CommandError::UnknownCurve));
        // The entry stays put; stacks are consistent and a later restore of
        // the curve could make it undoable again.
        assert!(queue.can_undo());
        assert!(!queue.can_redo());
    }
    #[test]
    fn eviction_keeps_remaining_entries_sound() {
        let queue = SessionQueue::from_session(Session::new(), History::with_capacity(3));
        queue.seed(|session| {
            session.set_curve_data("a", vec![point(1, 0.0, 0.0)]).unwrap();
        });
        // Five sequential moves through a 3-deep history.
        for step in 1..=5 {
            let to = [f64::from(step), 0.0];
            queue
                .submit_with(|session| {
                    let curve = session.curve("a").ok_or(CommandError::UnknownCurve)?;
                    Ok(CurveCommand::move_point("a", curve, 0, to)?.into())
                })
                .unwrap();
        }
        // Only the last three survive; each undoes cleanly in turn.
        for expected in [4.0, 3.0, 2.0] {
            assert!(queue.undo().is_done());
            queue.read(|session| {
                assert_eq!(
                    session.get_curve_data("a").unwrap()[0].position,
                    [expected, 0.0]
                );
            });
        }
        assert_eq!(queue.undo(), StepOutcome::Nothing);
        // And the whole evicted-but-retained window redoes back up.
        for expected in [3.0, 4.0, 5.0] {
            assert!(queue.redo().is_done());
            queue.read(|session| {
                assert_eq!(
                    session.get_curve_data("a").unwrap()[0].position,
                    [expected, 0.0]
                );
            });
        }
    }
    #[test]
    fn batch_undo_restores_every_member() {
        let queue = seeded_queue();
        queue
            .submit_with(|session| {
                let curve = session.curve("a").ok_or(CommandError::UnknownCurve)?;
                let indices: hashbrown::HashSet<usize> = [0, 1].into_iter().collect();
                let moves = CurveCommand::move_points("a", curve, &indices, [5.0, 5.0])?;
                Command::group(moves.into_iter().map(Into::into).collect())
                    .ok_or(CommandError::NoOp)
            })
            .unwrap();
        queue.read(|session| {
            assert_eq!(session.get_curve_data("a").unwrap()[0].position, [15.0, 25.0]);
            assert_eq!(session.get_curve_data("a").unwrap()[1].position, [35.0, 45.0]);
        });
        assert!(queue.undo().is_done());
        queue.read(|session| {
            assert_eq!(session.get_curve_data("a").unwrap()[0].position, [10.0, 20.0]);
            assert_eq!(session.get_curve_data("a").unwrap()[1].position, [30.0, 40.0]);
        });
    }
    #[test]
    fn gap_fill_round_trip_through_history() {
        use crate::state::curve::gaps;
        let queue = SessionQueue::new();
        queue.seed(|session| {
            session
                .set_curve_data(
                    "a",
                    vec![
                        TrackPoint::new(Frame::new(10).unwrap(), [0.0, 0.0], PointStatus::Endframe),
                        TrackPoint::new(
                            Frame::new(14).unwrap(),
                            [8.0, 4.0],
                            PointStatus::Keyframe,
                        ),
                    ],
                )
                .unwrap();
        });
        queue
            .submit_with(|session| {
                let curve = session.curve("a").ok_or(CommandError::UnknownCurve)?;
                let gap = gaps::gaps(curve.points())[0];
                let plan = gaps::fill_plan(curve.points(), gap, None, None)
                    .map_err(|_| CommandError::MismatchedState)?;
                Ok(CurveCommand::fill_gap("a", plan).into())
            })
            .unwrap();
        queue.read(|session| {
            let curve = session.curve("a").unwrap();
            assert_eq!(curve.len(), 5);
            assert_eq!(curve.points()[0].status, PointStatus::Tracked);
            assert!(gaps::gaps(curve.points()).is_empty());
        });

        assert!(queue.undo().is_done());
        queue.read(|session| {
            let curve = session.curve("a").unwrap();
            assert_eq!(curve.len(), 2);
            // The endframe the fill sealed is back, so the gap is too.
            assert_eq!(curve.points()[0].status, PointStatus::Endframe);
            assert_eq!(gaps::gaps(curve.points()).len(), 1);
        });
    }
}
