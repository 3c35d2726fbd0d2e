use async_channel::{Receiver, Sender};

use crate::{
    api::{DynRouteAPI, RouteAPI},
    entities::{Coordinates, Resolution, Ticket},
    error::{malformed_payload_error, upstream_error, Error},
};

/// Starts distance lookups in the background and hands back their results,
/// each tagged with the ticket it was started for.
pub struct DistanceResolver {
    routes: DynRouteAPI,
    last_ticket_id: u64,
    sender: Sender<Resolution>,
    receiver: Receiver<Resolution>,
}

impl DistanceResolver {
    pub fn new(routes: DynRouteAPI) -> Self {
        let (sender, receiver) = async_channel::unbounded();

        Self {
            routes,
            last_ticket_id: 0,
            sender,
            receiver,
        }
    }

    /// Finished lookups, in completion order. Older tickets may arrive after
    /// newer ones.
    pub fn completions(&self) -> Receiver<Resolution> {
        self.receiver.clone()
    }

    /// Spawns one lookup for `(pickup, destination)`. Never retried.
    ///
    /// Must be called from within a tokio runtime.
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self, pickup: Coordinates, destination: Coordinates) -> Ticket {
        self.last_ticket_id += 1;
        let ticket = Ticket::new(self.last_ticket_id, pickup, destination);

        let routes = self.routes.clone();
        let sender = self.sender.clone();
        let tagged = ticket.clone();

        tokio::spawn(async move {
            let result = resolve(routes.as_ref(), tagged.pickup, tagged.destination).await;
            let id = tagged.id;

            if sender.send(Resolution { ticket: tagged, result }).await.is_err() {
                tracing::debug!("resolution {} finished after its session closed", id);
            }
        });

        ticket
    }
}

/// One round trip to the routing capability, converted to kilometers.
///
/// Every failure comes back as a resolution failure; the cause is only logged.
#[tracing::instrument(skip(routes))]
pub async fn resolve(
    routes: &(dyn RouteAPI + Send + Sync),
    pickup: Coordinates,
    destination: Coordinates,
) -> Result<f64, Error> {
    let meters = match routes.route_distance(pickup, destination).await {
        Ok(meters) => meters,
        Err(err) => {
            tracing::warn!("route lookup failed: {}", err);

            if err.is_resolution_failure() {
                return Err(err);
            }
            return Err(Error {
                message: format!("upstream error: {}", err.message),
                ..upstream_error()
            });
        }
    };

    if !meters.is_finite() || meters < 0.0 {
        tracing::warn!("route lookup returned unusable distance {}", meters);
        return Err(malformed_payload_error(meters));
    }

    Ok(meters / 1000.0)
}

#[cfg(test)]
struct FixedRoute(Result<f64, Error>);

#[cfg(test)]
#[async_trait::async_trait]
impl RouteAPI for FixedRoute {
    async fn route_distance(&self, _: Coordinates, _: Coordinates) -> Result<f64, Error> {
        self.0.clone()
    }
}

#[tokio::test]
async fn resolve_converts_meters_to_kilometers() {
    let a = Coordinates::new(14.11, 122.95).unwrap();
    let b = Coordinates::new(14.12, 122.96).unwrap();

    let km = resolve(&FixedRoute(Ok(4500.0)), a, b).await.unwrap();
    assert_eq!(km, 4.5);
}

#[tokio::test]
async fn resolve_collapses_failures() {
    use crate::error::location_unavailable_error;

    let a = Coordinates::new(14.11, 122.95).unwrap();
    let b = Coordinates::new(14.12, 122.96).unwrap();

    let err = resolve(&FixedRoute(Err(upstream_error())), a, b).await.unwrap_err();
    assert!(err.is_resolution_failure());

    let err = resolve(&FixedRoute(Err(location_unavailable_error())), a, b)
        .await
        .unwrap_err();
    assert!(err.is_resolution_failure());

    let err = resolve(&FixedRoute(Ok(-1.0)), a, b).await.unwrap_err();
    assert!(err.is_resolution_failure());

    let err = resolve(&FixedRoute(Ok(f64::NAN)), a, b).await.unwrap_err();
    assert!(err.is_resolution_failure());
}

#[tokio::test]
async fn start_tags_each_lookup() {
    use std::sync::Arc;

    let a = Coordinates::new(14.11, 122.95).unwrap();
    let b = Coordinates::new(14.12, 122.96).unwrap();

    let mut resolver = DistanceResolver::new(Arc::new(FixedRoute(Ok(5000.0))));
    let completions = resolver.completions();

    let first = resolver.start(a, b);
    let second = resolver.start(b, a);
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);

    let mut results = vec![
        completions.recv().await.unwrap(),
        completions.recv().await.unwrap(),
    ];
    results.sort_by_key(|resolution| resolution.ticket.id);

    assert_eq!(results[0].ticket, first);
    assert_eq!(results[1].ticket, second);
    assert_eq!(results[0].result, Ok(5.0));
}
