use serde::{Deserialize, Serialize};

use crate::{
    entities::{Coordinates, SelectionState},
    error::Error,
};

/// Where `reset` leaves the selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Back to no points at all.
    Empty,
    /// Back to the last known device location as pickup, when one is known.
    Home,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self::Empty
    }
}

/// What a single click did to the selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transition {
    PickupSet {
        pickup: Coordinates,
    },
    DestinationSet {
        pickup: Coordinates,
        destination: Coordinates,
    },
    Restarted {
        pickup: Coordinates,
    },
}

/// Two-slot click protocol: pickup, then destination, then a fresh pickup.
#[derive(Clone, Debug, Default)]
pub struct SelectionController {
    state: SelectionState,
    policy: ResetPolicy,
    home: Option<Coordinates>,
}

impl SelectionController {
    pub fn new(policy: ResetPolicy) -> Self {
        Self {
            state: SelectionState::Empty,
            policy,
            home: None,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn policy(&self) -> ResetPolicy {
        self.policy
    }

    pub fn set_home(&mut self, home: Coordinates) -> Result<(), Error> {
        home.validate()?;
        self.home = Some(home);

        Ok(())
    }

    /// Applies one click. An invalid point leaves the state untouched.
    #[tracing::instrument(skip(self))]
    pub fn select_point(&mut self, point: Coordinates) -> Result<Transition, Error> {
        point.validate()?;

        let (state, transition) = match self.state {
            SelectionState::Empty => (
                SelectionState::PickupOnly { pickup: point },
                Transition::PickupSet { pickup: point },
            ),
            SelectionState::PickupOnly { pickup } => (
                SelectionState::Both {
                    pickup,
                    destination: point,
                },
                Transition::DestinationSet {
                    pickup,
                    destination: point,
                },
            ),
            SelectionState::Both {
                pickup: _,
                destination: _,
            } => (
                SelectionState::PickupOnly { pickup: point },
                Transition::Restarted { pickup: point },
            ),
        };

        tracing::debug!("selection {} -> {}", self.state.name(), state.name());
        self.state = state;

        Ok(transition)
    }

    #[tracing::instrument(skip(self))]
    pub fn reset(&mut self) -> SelectionState {
        self.state = match (self.policy, self.home) {
            (ResetPolicy::Home, Some(home)) => SelectionState::PickupOnly { pickup: home },
            _ => SelectionState::Empty,
        };

        self.state
    }
}

#[cfg(test)]
fn point(latitude: f64, longitude: f64) -> Coordinates {
    Coordinates::new(latitude, longitude).unwrap()
}

#[test]
fn clicks_cycle_through_slots() {
    let (a, b, c) = (point(14.11, 122.95), point(14.12, 122.96), point(14.13, 122.97));
    let mut controller = SelectionController::new(ResetPolicy::Empty);

    assert_eq!(
        controller.select_point(a).unwrap(),
        Transition::PickupSet { pickup: a }
    );
    assert_eq!(controller.state(), SelectionState::PickupOnly { pickup: a });

    assert_eq!(
        controller.select_point(b).unwrap(),
        Transition::DestinationSet {
            pickup: a,
            destination: b
        }
    );
    assert_eq!(controller.state().pair(), Some((a, b)));

    assert_eq!(
        controller.select_point(c).unwrap(),
        Transition::Restarted { pickup: c }
    );
    assert_eq!(controller.state(), SelectionState::PickupOnly { pickup: c });
    assert_eq!(controller.state().destination(), None);
}

#[test]
fn same_point_twice_is_a_valid_pair() {
    let a = point(14.11, 122.95);
    let mut controller = SelectionController::new(ResetPolicy::Empty);

    controller.select_point(a).unwrap();
    controller.select_point(a).unwrap();

    assert_eq!(controller.state().pair(), Some((a, a)));
}

#[test]
fn invalid_point_leaves_state_untouched() {
    let a = point(14.11, 122.95);
    let mut controller = SelectionController::new(ResetPolicy::Empty);
    controller.select_point(a).unwrap();

    let bad = Coordinates {
        latitude: f64::NAN,
        longitude: 0.0,
    };
    assert!(controller.select_point(bad).unwrap_err().is_invalid_input());
    assert_eq!(controller.state(), SelectionState::PickupOnly { pickup: a });
}

#[test]
fn reset_follows_policy() {
    let (home, a, b) = (point(14.1, 122.9), point(14.2, 122.8), point(14.3, 122.7));

    let mut controller = SelectionController::new(ResetPolicy::Empty);
    controller.set_home(home).unwrap();
    controller.select_point(a).unwrap();
    controller.select_point(b).unwrap();
    assert_eq!(controller.reset(), SelectionState::Empty);

    let mut controller = SelectionController::new(ResetPolicy::Home);
    assert_eq!(controller.reset(), SelectionState::Empty);

    controller.set_home(home).unwrap();
    controller.select_point(a).unwrap();
    assert_eq!(controller.reset(), SelectionState::PickupOnly { pickup: home });
}
