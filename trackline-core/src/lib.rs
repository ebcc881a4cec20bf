pub mod commands;
pub mod events;
pub mod queue;
pub mod spatial;
pub mod state;
pub mod transform;
pub mod util;

pub use queue::SessionQueue;
pub use state::{Curve, Frame, PointStatus, Session, TrackPoint};
