//! Change notifications emitted by the session.
//!
//! Collaborators (renderer, importers, input handling) observe state through
//! these events instead of polling. Events are delivered in application order -
//! the order mutations actually happened - and each names the curve it affects.

/// A change to observable session state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateEvent {
    /// Point data of a curve changed - wholesale replacement, a command, or
    /// curve removal.
    CurveChanged { curve: String },
    /// The selected point set of a curve changed.
    SelectionChanged { curve: String },
    /// A different curve (or none at all) became the active curve.
    ActiveCurveChanged { curve: Option<String> },
}

/// Fire-and-forget sender half held by the session.
///
/// A disconnected sender swallows events, so headless use and most tests don't
/// need to drain a receiver.
#[derive(Clone, Debug, Default)]
pub struct EventSender {
    sender: Option<crossbeam::channel::Sender<StateEvent>>,
}

impl EventSender {
    #[must_use]
    pub fn new(sender: crossbeam::channel::Sender<StateEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }
    /// A sender connected to nothing.
    #[must_use]
    pub fn dummy() -> Self {
        Self { sender: None }
    }
    /// Convenience pair: a connected sender and the receiver observing it.
    #[must_use]
    pub fn channel() -> (Self, crossbeam::channel::Receiver<StateEvent>) {
        let (tx, rx) = crossbeam::channel::unbounded();
        (Self::new(tx), rx)
    }
    /// Emit an event. Silent if there is no receiver anymore - notification is
    /// best-effort and never an error path for the mutation that fired it.
    pub fn emit(&self, event: StateEvent) {
        if let Some(tx) = &self.sender {
            let _ = tx.send(event);
        }
    }
}
