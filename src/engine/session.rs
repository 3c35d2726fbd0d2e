use async_channel::Receiver;
use tokio::sync::watch;
use uuid::Uuid;

use super::{DistanceResolver, FareEngine, ResetPolicy, SelectionController, Transition};
use crate::{
    api::{DynLocationAPI, DynRouteAPI},
    entities::{
        Coordinates, FareBreakdown, FareSchedule, Resolution, ResolutionState, SelectionState,
        Snapshot, Ticket,
    },
    error::{location_unavailable_error, resolution_dropped_error, Error},
};

/// One rider's booking screen: the selection, the lookup for the current
/// pair, and the fare derived from it.
///
/// The session has a single owner. Lookups run in the background and come
/// back through [`BookingSession::completions`]; the owner feeds them to
/// [`BookingSession::apply`], which drops anything that no longer matches
/// the current pickup/destination.
pub struct BookingSession {
    id: Uuid,
    selection: SelectionController,
    resolver: DistanceResolver,
    fares: FareEngine,
    locations: Option<DynLocationAPI>,
    resolution: ResolutionState,
    ticket: Option<Ticket>,
    fare: Option<FareBreakdown>,
    observers: watch::Sender<Snapshot>,
}

impl BookingSession {
    pub fn new(routes: DynRouteAPI, schedule: FareSchedule, policy: ResetPolicy) -> Self {
        let (observers, _) = watch::channel(Snapshot::default());

        Self {
            id: Uuid::new_v4(),
            selection: SelectionController::new(policy),
            resolver: DistanceResolver::new(routes),
            fares: FareEngine::new(schedule),
            locations: None,
            resolution: ResolutionState::Idle,
            ticket: None,
            fare: None,
            observers,
        }
    }

    pub fn with_locations(mut self, locations: DynLocationAPI) -> Self {
        self.locations = Some(locations);
        self
    }

    pub fn selection(&self) -> SelectionState {
        self.selection.state()
    }

    pub fn resolution(&self) -> &ResolutionState {
        &self.resolution
    }

    pub fn fare(&self) -> Option<FareBreakdown> {
        self.fare
    }

    pub fn is_loading(&self) -> bool {
        self.resolution.is_pending()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            selection: self.selection.state(),
            resolution: self.resolution.clone(),
            loading: self.is_loading(),
            fare: self.fare,
        }
    }

    /// Receives a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.observers.subscribe()
    }

    pub fn completions(&self) -> Receiver<Resolution> {
        self.resolver.completions()
    }

    /// Feeds one map click. Entering the two-point state starts a lookup and
    /// returns its ticket.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub fn select_point(&mut self, point: Coordinates) -> Result<Option<Ticket>, Error> {
        let ticket = match self.selection.select_point(point)? {
            Transition::PickupSet { pickup: _ } | Transition::Restarted { pickup: _ } => {
                self.clear_resolution();
                None
            }
            Transition::DestinationSet {
                pickup,
                destination,
            } => {
                let ticket = self.resolver.start(pickup, destination);
                tracing::info!("started resolution {}", ticket.id);

                self.resolution = ResolutionState::Pending {
                    pickup,
                    destination,
                };
                self.ticket = Some(ticket.clone());
                self.fare = None;
                Some(ticket)
            }
        };

        self.publish();
        Ok(ticket)
    }

    /// Back to an empty selection, or to the home pickup under
    /// [`ResetPolicy::Home`]. Any outstanding lookup becomes stale.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub fn reset(&mut self) -> SelectionState {
        let state = self.selection.reset();
        self.clear_resolution();
        self.publish();

        state
    }

    /// Records a home position, e.g. from the map widget's own geolocation.
    pub fn set_home(&mut self, home: Coordinates) -> Result<(), Error> {
        self.selection.set_home(home)?;

        if self.selection.policy() == ResetPolicy::Home
            && self.selection.state() == SelectionState::Empty
        {
            self.selection.reset();
            self.publish();
        }

        Ok(())
    }

    /// Asks the location capability once for the device position and records
    /// it as home.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn locate(&mut self) -> Result<Coordinates, Error> {
        let locations = self
            .locations
            .clone()
            .ok_or_else(location_unavailable_error)?;

        let here = locations.current_location().await?;
        self.set_home(here)?;

        Ok(here)
    }

    /// Applies a finished lookup if it is the newest one started for the
    /// current pair.
    ///
    /// Returns `Ok(None)` for stale results, which change nothing.
    #[tracing::instrument(
        skip(self, resolution),
        fields(session = %self.id, ticket = resolution.ticket.id)
    )]
    pub fn apply(&mut self, resolution: Resolution) -> Result<Option<FareBreakdown>, Error> {
        if !self.is_current(&resolution.ticket) {
            tracing::debug!(
                "dropping stale resolution requested at {}",
                resolution.ticket.requested_at
            );
            return Ok(None);
        }

        let outcome = resolution
            .result
            .and_then(|distance_km| Ok((distance_km, self.fares.quote(distance_km)?)));

        match outcome {
            Ok((distance_km, fare)) => {
                tracing::info!("resolved {:.3} km, fare {:.2}", distance_km, fare.total_fare);

                self.resolution = ResolutionState::Resolved { distance_km };
                self.fare = Some(fare);
                self.publish();

                Ok(Some(fare))
            }
            Err(err) => {
                tracing::warn!("resolution failed: {}", err);

                self.resolution = ResolutionState::Failed {
                    reason: err.message.clone(),
                };
                self.fare = None;
                self.publish();

                Err(err)
            }
        }
    }

    /// Waits until the current lookup is applied, skipping stale ones.
    ///
    /// Returns `Ok(None)` straight away when nothing is pending.
    pub async fn settle(&mut self) -> Result<Option<FareBreakdown>, Error> {
        let completions = self.completions();

        while self.is_loading() {
            let resolution = completions
                .recv()
                .await
                .map_err(|_| resolution_dropped_error())?;

            if let Some(fare) = self.apply(resolution)? {
                return Ok(Some(fare));
            }
        }

        Ok(None)
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        let newest = self.ticket.as_ref().map(|current| current.id) == Some(ticket.id);

        match (&self.resolution, self.selection.state().pair()) {
            (
                ResolutionState::Pending {
                    pickup,
                    destination,
                },
                Some((selected_pickup, selected_destination)),
            ) => {
                newest
                    && ticket.matches(pickup, destination)
                    && ticket.matches(&selected_pickup, &selected_destination)
            }
            _ => false,
        }
    }

    fn clear_resolution(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if self.resolution.is_pending() {
                tracing::debug!("superseding resolution {}", ticket.id);
            }
        }

        self.resolution = ResolutionState::Idle;
        self.fare = None;
    }

    fn publish(&self) {
        self.observers.send_replace(self.snapshot());
    }
}

#[cfg(test)]
mod fakes {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;

    use crate::api::{LocationAPI, RouteAPI};
    use crate::entities::Coordinates;
    use crate::error::{location_unavailable_error, upstream_error, Error};

    /// Holds every lookup until a permit is released. The first `fail_first`
    /// lookups to finish fail; the rest report the destination latitude
    /// times 1000 as meters.
    #[derive(Clone)]
    pub struct GatedRoute {
        pub gate: Arc<Semaphore>,
        pub requests: Arc<Mutex<Vec<(Coordinates, Coordinates)>>>,
        pub fail_first: Arc<AtomicUsize>,
    }

    impl Default for GatedRoute {
        fn default() -> Self {
            Self {
                gate: Arc::new(Semaphore::new(0)),
                requests: Arc::new(Mutex::new(Vec::new())),
                fail_first: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl GatedRoute {
        pub fn failing() -> Self {
            Self::failing_first(usize::MAX)
        }

        pub fn failing_first(lookups: usize) -> Self {
            Self {
                fail_first: Arc::new(AtomicUsize::new(lookups)),
                ..Self::default()
            }
        }

        pub fn release(&self, permits: usize) {
            self.gate.add_permits(permits);
        }

        pub fn requests(&self) -> Vec<(Coordinates, Coordinates)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RouteAPI for GatedRoute {
        async fn route_distance(
            &self,
            origin: Coordinates,
            destination: Coordinates,
        ) -> Result<f64, Error> {
            self.requests.lock().unwrap().push((origin, destination));
            self.gate
                .acquire()
                .await
                .map_err(|_| upstream_error())?
                .forget();

            let failed = self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failed {
                return Err(upstream_error());
            }
            Ok(destination.latitude * 1000.0)
        }
    }

    pub struct FixedLocation(pub Option<Coordinates>);

    #[async_trait]
    impl LocationAPI for FixedLocation {
        async fn current_location(&self) -> Result<Coordinates, Error> {
            self.0.ok_or_else(location_unavailable_error)
        }
    }
}

#[cfg(test)]
fn point(latitude: f64, longitude: f64) -> Coordinates {
    Coordinates::new(latitude, longitude).unwrap()
}

#[cfg(test)]
fn session(routes: &fakes::GatedRoute, policy: ResetPolicy) -> BookingSession {
    use std::sync::Arc;

    let schedule = FareSchedule::new(50.0, 3.0, 15.0).unwrap();
    BookingSession::new(Arc::new(routes.clone()), schedule, policy)
}

#[tokio::test]
async fn two_clicks_resolve_a_fare() {
    let routes = fakes::GatedRoute::default();
    let mut session = session(&routes, ResetPolicy::Empty);
    let (a, b) = (point(1.0, 1.0), point(5.0, 1.0));

    assert_eq!(session.select_point(a).unwrap(), None);
    assert_eq!(session.selection(), SelectionState::PickupOnly { pickup: a });
    assert!(!session.is_loading());

    let ticket = session.select_point(b).unwrap().unwrap();
    assert!(ticket.matches(&a, &b));
    assert!(session.is_loading());
    assert_eq!(session.fare(), None);

    routes.release(1);
    let fare = session.settle().await.unwrap().unwrap();

    assert_eq!(fare.extra_distance_km, 2.0);
    assert_eq!(fare.total_fare, 80.0);
    assert_eq!(session.resolution(), &ResolutionState::Resolved { distance_km: 5.0 });
    assert_eq!(session.fare(), Some(fare));
    assert!(!session.is_loading());
    assert_eq!(routes.requests(), vec![(a, b)]);
}

#[tokio::test]
async fn third_click_discards_late_result() {
    let routes = fakes::GatedRoute::default();
    let mut session = session(&routes, ResetPolicy::Empty);
    let (a, b, c) = (point(1.0, 1.0), point(5.0, 1.0), point(2.0, 2.0));

    session.select_point(a).unwrap();
    session.select_point(b).unwrap();
    session.select_point(c).unwrap();

    assert_eq!(session.selection(), SelectionState::PickupOnly { pickup: c });
    assert_eq!(session.resolution(), &ResolutionState::Idle);

    routes.release(1);
    let late = session.completions().recv().await.unwrap();
    assert!(late.ticket.matches(&a, &b));
    assert_eq!(session.apply(late).unwrap(), None);

    assert_eq!(session.selection(), SelectionState::PickupOnly { pickup: c });
    assert_eq!(session.resolution(), &ResolutionState::Idle);
    assert_eq!(session.fare(), None);
    assert_eq!(routes.requests().len(), 1);
}

#[tokio::test]
async fn only_the_newest_pair_is_applied() {
    let routes = fakes::GatedRoute::default();
    let mut session = session(&routes, ResetPolicy::Empty);
    let (a, b) = (point(1.0, 1.0), point(5.0, 1.0));
    let (c, d) = (point(1.5, 1.0), point(2.5, 1.0));

    session.select_point(a).unwrap();
    session.select_point(b).unwrap();
    session.select_point(c).unwrap();
    session.select_point(d).unwrap();

    routes.release(2);
    let completions = session.completions();
    let mut applied = Vec::new();
    for _ in 0..2 {
        let resolution = completions.recv().await.unwrap();
        if let Some(fare) = session.apply(resolution).unwrap() {
            applied.push(fare);
        }
    }

    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].total_fare, 50.0);
    assert!(applied[0].minimum_applied);
    assert_eq!(session.resolution(), &ResolutionState::Resolved { distance_km: 2.5 });
    assert_eq!(
        session.selection(),
        SelectionState::Both {
            pickup: c,
            destination: d
        }
    );
}

#[tokio::test]
async fn failure_keeps_selection_and_shows_no_fare() {
    let routes = fakes::GatedRoute::failing();
    let mut session = session(&routes, ResetPolicy::Empty);
    let (a, b) = (point(1.0, 1.0), point(5.0, 1.0));

    session.select_point(a).unwrap();
    session.select_point(b).unwrap();

    routes.release(1);
    let err = session.settle().await.unwrap_err();

    assert!(err.is_resolution_failure());
    assert!(matches!(session.resolution(), ResolutionState::Failed { reason: _ }));
    assert_eq!(session.fare(), None);
    assert!(!session.is_loading());
    assert_eq!(
        session.selection(),
        SelectionState::Both {
            pickup: a,
            destination: b
        }
    );

    // recoverable: the next click starts over
    session.select_point(a).unwrap();
    assert_eq!(session.resolution(), &ResolutionState::Idle);
}

#[tokio::test]
async fn reset_makes_outstanding_lookup_stale() {
    let routes = fakes::GatedRoute::default();
    let mut session = session(&routes, ResetPolicy::Empty);

    session.select_point(point(1.0, 1.0)).unwrap();
    session.select_point(point(5.0, 1.0)).unwrap();
    assert_eq!(session.reset(), SelectionState::Empty);
    assert!(!session.is_loading());

    routes.release(1);
    let late = session.completions().recv().await.unwrap();
    assert_eq!(session.apply(late).unwrap(), None);

    assert_eq!(session.snapshot(), crate::entities::Snapshot::default());
    assert_eq!(session.settle().await.unwrap(), None);
}

#[tokio::test]
async fn repeated_pair_waits_for_newest_lookup() {
    let routes = fakes::GatedRoute::default();
    let mut session = session(&routes, ResetPolicy::Empty);
    let (a, b) = (point(1.0, 1.0), point(5.0, 1.0));

    session.select_point(a).unwrap();
    let first = session.select_point(b).unwrap().unwrap();
    session.reset();
    session.select_point(point(1.0, 1.0)).unwrap();
    let second = session.select_point(point(5.0, 1.0)).unwrap().unwrap();
    assert!(second.id > first.id);

    routes.release(1);
    let older = session.completions().recv().await.unwrap();
    assert_eq!(older.ticket.id, first.id);
    assert_eq!(session.apply(older).unwrap(), None);
    assert!(session.is_loading());

    routes.release(1);
    let fare = session.settle().await.unwrap().unwrap();
    assert_eq!(fare.total_fare, 80.0);
    assert_eq!(session.fare(), Some(fare));
}

#[tokio::test]
async fn older_failure_for_repeated_pair_is_ignored() {
    let routes = fakes::GatedRoute::failing_first(1);
    let mut session = session(&routes, ResetPolicy::Empty);
    let (a, b) = (point(1.0, 1.0), point(5.0, 1.0));

    session.select_point(a).unwrap();
    session.select_point(b).unwrap();
    session.reset();
    session.select_point(a).unwrap();
    let newest = session.select_point(b).unwrap().unwrap();

    routes.release(1);
    let older = session.completions().recv().await.unwrap();
    assert!(older.result.is_err());
    assert_eq!(session.apply(older).unwrap(), None);
    assert!(session.is_loading());

    routes.release(1);
    let latest = session.completions().recv().await.unwrap();
    assert_eq!(latest.ticket.id, newest.id);
    let fare = session.apply(latest).unwrap().unwrap();

    assert_eq!(fare.total_fare, 80.0);
    assert_eq!(session.resolution(), &ResolutionState::Resolved { distance_km: 5.0 });
    assert_eq!(session.fare(), Some(fare));
}

#[tokio::test]
async fn invalid_click_is_rejected_without_side_effects() {
    let routes = fakes::GatedRoute::default();
    let mut session = session(&routes, ResetPolicy::Empty);
    session.select_point(point(1.0, 1.0)).unwrap();

    let bad = Coordinates {
        latitude: 91.0,
        longitude: 0.0,
    };
    assert!(session.select_point(bad).unwrap_err().is_invalid_input());
    assert_eq!(
        session.selection(),
        SelectionState::PickupOnly {
            pickup: point(1.0, 1.0)
        }
    );
    assert!(routes.requests().is_empty());
}

#[tokio::test]
async fn locate_sets_home_pickup() {
    use std::sync::Arc;

    let home = point(14.1122, 122.9553);
    let routes = fakes::GatedRoute::default();
    let mut session = session(&routes, ResetPolicy::Home)
        .with_locations(Arc::new(fakes::FixedLocation(Some(home))));

    assert_eq!(session.locate().await.unwrap(), home);
    assert_eq!(session.selection(), SelectionState::PickupOnly { pickup: home });

    session.select_point(point(5.0, 1.0)).unwrap();
    assert!(session.is_loading());

    assert_eq!(session.reset(), SelectionState::PickupOnly { pickup: home });
    assert_eq!(session.fare(), None);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn locate_failure_is_reported() {
    use std::sync::Arc;

    let routes = fakes::GatedRoute::default();
    let mut session = session(&routes, ResetPolicy::Home);
    assert!(session.locate().await.is_err());

    let mut session = session.with_locations(Arc::new(fakes::FixedLocation(None)));
    assert!(session.locate().await.is_err());
    assert_eq!(session.selection(), SelectionState::Empty);
    assert_eq!(session.reset(), SelectionState::Empty);
}

#[tokio::test]
async fn observers_see_every_change() {
    let routes = fakes::GatedRoute::default();
    let mut session = session(&routes, ResetPolicy::Empty);
    let mut observer = session.subscribe();

    session.select_point(point(1.0, 1.0)).unwrap();
    session.select_point(point(5.0, 1.0)).unwrap();
    assert!(observer.has_changed().unwrap());
    {
        let snapshot = observer.borrow_and_update();
        assert!(snapshot.loading);
        assert_eq!(snapshot.fare, None);
    }

    routes.release(1);
    session.settle().await.unwrap();

    observer.changed().await.unwrap();
    let snapshot = observer.borrow().clone();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.fare.map(|fare| fare.total_fare), Some(80.0));
}
