use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;
use crate::error::Error;

/// Tag attached to every in-flight distance lookup.
///
/// The coordinate pair decides whether a late result still applies; `id` only
/// orders tickets within a session for logging.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub pickup: Coordinates,
    pub destination: Coordinates,
    pub requested_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(id: u64, pickup: Coordinates, destination: Coordinates) -> Self {
        Self {
            id,
            pickup,
            destination,
            requested_at: Utc::now(),
        }
    }

    pub fn matches(&self, pickup: &Coordinates, destination: &Coordinates) -> bool {
        self.pickup == *pickup && self.destination == *destination
    }
}

/// A finished lookup: the ticket it was started for and its distance in km.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub ticket: Ticket,
    pub result: Result<f64, Error>,
}

#[test]
fn tickets_match_by_value() {
    use crate::entities::Coordinates;

    let a = Coordinates::new(14.1, 122.9).unwrap();
    let b = Coordinates::new(14.2, 122.8).unwrap();
    let ticket = Ticket::new(1, a, b);

    let a_again = Coordinates::new(14.1, 122.9).unwrap();
    assert!(ticket.matches(&a_again, &b));
    assert!(!ticket.matches(&b, &a));
}
