mod location;
mod quote;
mod resolution;
mod route;
mod selection;
mod snapshot;

pub use location::Coordinates;
pub use quote::{FareBreakdown, FareSchedule};
pub use resolution::ResolutionState;
pub use route::{Resolution, Ticket};
pub use selection::SelectionState;
pub use snapshot::Snapshot;
