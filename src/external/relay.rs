use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::RouteAPI,
    entities::Coordinates,
    error::{upstream_error, Error},
    external::openrouteservice::parse_distance,
};

pub const DISTANCE_PATH: &str = "/api/get-distance";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinates> for LatLng {
    fn from(coordinates: Coordinates) -> Self {
        Self {
            lat: coordinates.latitude,
            lng: coordinates.longitude,
        }
    }
}

impl TryFrom<LatLng> for Coordinates {
    type Error = Error;

    fn try_from(value: LatLng) -> Result<Self, Self::Error> {
        Coordinates::new(value.lat, value.lng)
    }
}

/// Body of a relay request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistanceParams {
    pub start: LatLng,
    pub end: LatLng,
}

/// Routes through the relay server, which holds the routing key.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    url: String,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}{}", base_url.trim_end_matches('/'), DISTANCE_PATH),
        }
    }
}

#[async_trait]
impl RouteAPI for Client {
    #[tracing::instrument(skip(self))]
    async fn route_distance(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, Error> {
        let params = DistanceParams {
            start: origin.into(),
            end: destination.into(),
        };

        let res = self.http.post(&self.url).json(&params).send().await?;

        let status_code = res.status().as_u16();
        if status_code != 200 {
            tracing::warn!("relay returned status {}", status_code);
            return Err(upstream_error());
        }

        let data: Value = res.json().await?;

        parse_distance(data)
    }
}

#[test]
fn lat_lng_round_trips_through_coordinates() {
    let coordinates = Coordinates::new(14.1122, 122.9553).unwrap();
    let lat_lng = LatLng::from(coordinates);

    assert_eq!(lat_lng, LatLng { lat: 14.1122, lng: 122.9553 });
    assert_eq!(Coordinates::try_from(lat_lng).unwrap(), coordinates);
    assert!(Coordinates::try_from(LatLng { lat: 100.0, lng: 0.0 }).is_err());
}
