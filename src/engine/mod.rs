mod fare;
mod resolver;
mod selection;
mod session;

pub use fare::FareEngine;
pub use resolver::{resolve, DistanceResolver};
pub use selection::{ResetPolicy, SelectionController, Transition};
pub use session::BookingSession;
