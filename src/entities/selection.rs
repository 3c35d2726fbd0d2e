use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;

/// Which of the two map slots are filled.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SelectionState {
    Empty,
    PickupOnly {
        pickup: Coordinates,
    },
    Both {
        pickup: Coordinates,
        destination: Coordinates,
    },
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::Empty
    }
}

impl SelectionState {
    pub fn name(&self) -> String {
        match self {
            Self::Empty => "empty".into(),
            Self::PickupOnly { pickup: _ } => "pickup_only".into(),
            Self::Both {
                pickup: _,
                destination: _,
            } => "both".into(),
        }
    }

    pub fn pickup(&self) -> Option<Coordinates> {
        match self {
            Self::Empty => None,
            Self::PickupOnly { pickup } => Some(*pickup),
            Self::Both {
                pickup,
                destination: _,
            } => Some(*pickup),
        }
    }

    pub fn destination(&self) -> Option<Coordinates> {
        match self {
            Self::Both {
                pickup: _,
                destination,
            } => Some(*destination),
            _ => None,
        }
    }

    /// The selected pair, only when both slots are filled.
    pub fn pair(&self) -> Option<(Coordinates, Coordinates)> {
        match self {
            Self::Both {
                pickup,
                destination,
            } => Some((*pickup, *destination)),
            _ => None,
        }
    }
}
