use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;

/// Progress of the distance lookup for the current pickup/destination pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ResolutionState {
    Idle,
    Pending {
        pickup: Coordinates,
        destination: Coordinates,
    },
    Resolved {
        distance_km: f64,
    },
    Failed {
        reason: String,
    },
}

impl Default for ResolutionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl ResolutionState {
    pub fn name(&self) -> String {
        match self {
            Self::Idle => "idle".into(),
            Self::Pending {
                pickup: _,
                destination: _,
            } => "pending".into(),
            Self::Resolved { distance_km: _ } => "resolved".into(),
            Self::Failed { reason: _ } => "failed".into(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn distance_km(&self) -> Option<f64> {
        match self {
            Self::Resolved { distance_km } => Some(*distance_km),
            _ => None,
        }
    }
}
