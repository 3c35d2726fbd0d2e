use async_trait::async_trait;
use std::sync::Arc;

use crate::entities::Coordinates;
use crate::error::Error;

/// Driving-route lookup between two points.
#[async_trait]
pub trait RouteAPI {
    /// Route distance in meters. Order matters: routes may be directional.
    async fn route_distance(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, Error>;
}

/// Single-shot lookup of where the device currently is.
#[async_trait]
pub trait LocationAPI {
    async fn current_location(&self) -> Result<Coordinates, Error>;
}

pub type DynRouteAPI = Arc<dyn RouteAPI + Send + Sync>;
pub type DynLocationAPI = Arc<dyn LocationAPI + Send + Sync>;
