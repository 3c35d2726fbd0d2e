use serde::{Deserialize, Serialize};

use crate::entities::{FareBreakdown, ResolutionState, SelectionState};

/// Everything the presentation layer needs to draw the booking screen.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub selection: SelectionState,
    pub resolution: ResolutionState,
    pub loading: bool,
    pub fare: Option<FareBreakdown>,
}
