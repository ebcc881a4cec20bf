//! # Session state
//!
//! The single source of truth: every curve's point data, the active-curve
//! pointer, and per-curve selections. All mutation funnels through here -
//! either directly (IO seeding, selection, active curve) or via command
//! application - and every logical change emits exactly one notification per
//! affected curve, in application order.

pub mod curve;
pub mod selection;

pub use curve::{Curve, CurveError, Frame, PointStatus, TrackPoint};
pub use selection::SelectionState;

use crate::commands::{self, CommandConsumer, CommandError, DoUndo, MetaCommand};
use crate::events::{EventSender, StateEvent};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("curve \"{curve}\" has two points on frame {frame}")]
    DuplicateFrame { curve: String, frame: Frame },
    #[error("curve \"{curve}\" has a non-finite coordinate on frame {frame}")]
    NonFinitePoint { curve: String, frame: Frame },
    #[error("no curve named \"{curve}\"")]
    UnknownCurve { curve: String },
}
impl ValidationError {
    fn wrap(curve: &str, error: CurveError) -> Self {
        let curve = curve.to_owned();
        match error {
            CurveError::DuplicateFrame(frame) => Self::DuplicateFrame { curve, frame },
            CurveError::NonFinitePoint(frame) => Self::NonFinitePoint { curve, frame },
        }
    }
}

/// All mutable editor state for one tracking session.
#[derive(Debug, Default)]
pub struct Session {
    curves: hashbrown::HashMap<String, Curve>,
    active: Option<String>,
    selection: SelectionState,
    events: EventSender,
}

// Read-only query surface.
impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with_events(events: EventSender) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }
    /// Swap the notification sink. Only sensible before collaborators start
    /// observing.
    pub fn set_event_sender(&mut self, events: EventSender) {
        self.events = events;
    }
    #[must_use]
    pub fn curve(&self, name: &str) -> Option<&Curve> {
        self.curves.get(name)
    }
    /// A curve's points in storage order, or `None` for an unknown name.
    #[must_use]
    pub fn get_curve_data(&self, name: &str) -> Option<&[TrackPoint]> {
        self.curves.get(name).map(Curve::points)
    }
    /// All curve names, sorted for stable presentation.
    #[must_use]
    pub fn curve_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.curves.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
    #[must_use]
    pub fn active_curve(&self) -> Option<&str> {
        self.active.as_deref()
    }
    /// A curve's selected indices as an owned copy; empty if none selected.
    #[must_use]
    pub fn get_selection(&self, name: &str) -> hashbrown::HashSet<usize> {
        self.selection.curve_cloned(name)
    }
    #[must_use]
    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }
    /// An independent multi-curve selection snapshot. See
    /// [`SelectionState::with_curve_selection`] for building variants of it.
    #[must_use]
    pub fn selection_snapshot(&self) -> SelectionState {
        self.selection.clone()
    }
    /// A snapshot with one curve's selection replaced. The live selection is
    /// untouched, and the result shares no containers with it.
    #[must_use]
    pub fn with_curve_selection(
        &self,
        name: &str,
        indices: &hashbrown::HashSet<usize>,
    ) -> SelectionState {
        self.selection.with_curve_selection(name, indices)
    }
}

// Mutation surface for IO and input layers. Commands go through
// `CommandConsumer` below instead.
impl Session {
    /// Replace one curve wholesale. Rejects invalid data with state unchanged.
    pub fn set_curve_data(
        &mut self,
        name: &str,
        points: Vec<TrackPoint>,
    ) -> Result<(), ValidationError> {
        let curve =
            Curve::from_points(points).map_err(|error| ValidationError::wrap(name, error))?;
        let len = curve.len();
        self.curves.insert(name.to_owned(), curve);
        self.events.emit(StateEvent::CurveChanged {
            curve: name.to_owned(),
        });
        if self.selection.retain_below(name, len) {
            self.events.emit(StateEvent::SelectionChanged {
                curve: name.to_owned(),
            });
        }
        Ok(())
    }
    /// Replace the whole curve set in one operation - the importer's load
    /// path. Everything is validated before anything changes, then one
    /// curve-changed event fires per touched name (vanished names included).
    /// Later duplicate names win.
    pub fn replace_all(
        &mut self,
        curves: impl IntoIterator<Item = (String, Vec<TrackPoint>)>,
    ) -> Result<(), ValidationError> {
        let mut incoming = hashbrown::HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for (name, points) in curves {
            let curve =
                Curve::from_points(points).map_err(|error| ValidationError::wrap(&name, error))?;
            if incoming.insert(name.clone(), curve).is_none() {
                order.push(name);
            }
        }
        let removed: Vec<String> = self
            .curves
            .keys()
            .filter(|name| !incoming.contains_key(*name))
            .cloned()
            .collect();
        self.curves = incoming;

        for name in removed {
            self.events.emit(StateEvent::CurveChanged {
                curve: name.clone(),
            });
            if self.selection.clear_curve(&name) {
                self.events.emit(StateEvent::SelectionChanged { curve: name });
            }
        }
        for name in order {
            let len = self.curves[&name].len();
            self.events.emit(StateEvent::CurveChanged {
                curve: name.clone(),
            });
            if self.selection.retain_below(&name, len) {
                self.events.emit(StateEvent::SelectionChanged { curve: name });
            }
        }
        if let Some(active) = &self.active {
            if !self.curves.contains_key(active) {
                self.active = None;
                self.events
                    .emit(StateEvent::ActiveCurveChanged { curve: None });
            }
        }
        Ok(())
    }
    /// Delete a curve. Returns false for an unknown name. Not reversible -
    /// commands still holding this name will report failure on undo/redo.
    pub fn remove_curve(&mut self, name: &str) -> bool {
        if self.curves.remove(name).is_none() {
            return false;
        }
        self.events.emit(StateEvent::CurveChanged {
            curve: name.to_owned(),
        });
        if self.selection.clear_curve(name) {
            self.events.emit(StateEvent::SelectionChanged {
                curve: name.to_owned(),
            });
        }
        if self.active.as_deref() == Some(name) {
            self.active = None;
            self.events
                .emit(StateEvent::ActiveCurveChanged { curve: None });
        }
        true
    }
    /// Point UI-driven edits at a curve, or at nothing. Unknown names are
    /// rejected with state unchanged.
    pub fn set_active_curve(&mut self, name: Option<&str>) -> Result<(), ValidationError> {
        if let Some(name) = name {
            if !self.curves.contains_key(name) {
                return Err(ValidationError::UnknownCurve {
                    curve: name.to_owned(),
                });
            }
        }
        if self.active.as_deref() != name {
            self.active = name.map(str::to_owned);
            self.events.emit(StateEvent::ActiveCurveChanged {
                curve: self.active.clone(),
            });
        }
        Ok(())
    }
    /// Replace a curve's selection with a copy of `indices`. Indices out of
    /// range for the current data are dropped rather than stored dangling.
    pub fn set_selection(
        &mut self,
        name: &str,
        indices: &hashbrown::HashSet<usize>,
    ) -> Result<(), ValidationError> {
        let len = self
            .curves
            .get(name)
            .ok_or_else(|| ValidationError::UnknownCurve {
                curve: name.to_owned(),
            })?
            .len();
        let bounded: hashbrown::HashSet<usize> =
            indices.iter().copied().filter(|&index| index < len).collect();
        if self.selection.curve_cloned(name) != bounded {
            self.selection.set_curve(name, &bounded);
            self.events.emit(StateEvent::SelectionChanged {
                curve: name.to_owned(),
            });
        }
        Ok(())
    }
    pub fn clear_selection(&mut self, name: &str) {
        if self.selection.clear_curve(name) {
            self.events.emit(StateEvent::SelectionChanged {
                curve: name.to_owned(),
            });
        }
    }
}

impl CommandConsumer<commands::Command> for Session {
    fn apply(&mut self, command: DoUndo<'_, commands::Command>) -> Result<(), CommandError> {
        let mut touched = Vec::new();
        self.apply_inner(command, &mut touched)?;
        // One notification per affected curve, no matter how many members of a
        // scope touched it.
        for name in touched {
            let len = self.curves.get(&name).map_or(0, Curve::len);
            let pruned = self.selection.retain_below(&name, len);
            self.events.emit(StateEvent::CurveChanged {
                curve: name.clone(),
            });
            if pruned {
                self.events.emit(StateEvent::SelectionChanged { curve: name });
            }
        }
        Ok(())
    }
}

impl Session {
    fn apply_inner(
        &mut self,
        command: DoUndo<'_, commands::Command>,
        touched: &mut Vec<String>,
    ) -> Result<(), CommandError> {
        match command {
            DoUndo::Do(commands::Command::Meta(MetaCommand::Scope(_, members))) => {
                for (applied, member) in members.iter().enumerate() {
                    if let Err(error) = self.apply_inner(DoUndo::Do(member), touched) {
                        // Revert the applied prefix so the scope stays
                        // all-or-nothing.
                        self.roll_back(members[..applied].iter().rev(), true, touched);
                        return Err(error);
                    }
                }
                Ok(())
            }
            DoUndo::Undo(commands::Command::Meta(MetaCommand::Scope(_, members))) => {
                // Reverted in reverse application order.
                for (reverted, member) in members.iter().rev().enumerate() {
                    if let Err(error) = self.apply_inner(DoUndo::Undo(member), touched) {
                        let still_applied = members.len() - reverted;
                        self.roll_back(members[still_applied..].iter(), false, touched);
                        return Err(error);
                    }
                }
                Ok(())
            }
            DoUndo::Do(commands::Command::Curve(curve_command))
            | DoUndo::Undo(commands::Command::Curve(curve_command)) => {
                let target = curve_command.target();
                let curve = self
                    .curves
                    .get_mut(target)
                    .ok_or(CommandError::UnknownCurve)?;
                // Unwrap OK - checked via the match arm.
                curve.apply(command.filter_map(commands::Command::curve).unwrap())?;
                if !touched.iter().any(|already| already == target) {
                    touched.push(target.to_owned());
                }
                Ok(())
            }
        }
    }
    // Best-effort reversal of a partially applied scope. Failure here means a
    // member's applier wasn't all-or-nothing, which is a bug on its side.
    fn roll_back<'c>(
        &mut self,
        members: impl Iterator<Item = &'c commands::Command>,
        undo: bool,
        touched: &mut Vec<String>,
    ) {
        for member in members {
            let polarity = if undo {
                DoUndo::Undo(member)
            } else {
                DoUndo::Do(member)
            };
            let result = self.apply_inner(polarity, touched);
            debug_assert!(result.is_ok(), "scope member rollback failed");
            if let Err(error) = result {
                log::error!("scope rollback failed on {}: {error}", member.kind());
            }
        }
    }
}
