use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::RouteAPI,
    entities::Coordinates,
    error::{malformed_payload_error, upstream_error, Error},
};

pub const DEFAULT_API_BASE: &str = "https://api.openrouteservice.org";
pub const DIRECTIONS_PATH: &str = "/v2/directions/driving-car";

/// OpenRouteService driving directions, authenticated with a static key.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DirectionsRequest {
    coordinates: [[f64; 2]; 2],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Directions {
    routes: Vec<DirectionsRoute>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DirectionsRoute {
    summary: Summary,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Summary {
    distance: f64,
}

impl Client {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    /// Raw directions call: upstream status code and JSON body, untouched.
    #[tracing::instrument(skip(self))]
    pub async fn directions(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<(u16, Value), Error> {
        let url = format!("{}{}", self.api_base.trim_end_matches('/'), DIRECTIONS_PATH);
        let body = DirectionsRequest {
            coordinates: [origin.lng_lat(), destination.lng_lat()],
        };

        let res = self
            .http
            .post(url)
            .header(AUTHORIZATION, self.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status_code = res.status().as_u16();
        let data: Value = res.json().await?;

        Ok((status_code, data))
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
        let (status_code, data) = self.directions(origin, destination).await?;

        if !(200..300).contains(&status_code) {
            tracing::warn!("directions returned status {}", status_code);
            return Err(upstream_error());
        }

        parse_distance(data)
    }
}

/// Distance in meters of the first route in a directions payload.
pub fn parse_distance(data: Value) -> Result<f64, Error> {
    let directions: Directions = serde_json::from_value(data)?;

    let route = directions
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| malformed_payload_error("no routes"))?;

    let distance = route.summary.distance;
    if !distance.is_finite() || distance < 0.0 {
        return Err(malformed_payload_error(distance));
    }

    Ok(distance)
}

#[cfg(test)]
pub(crate) async fn mock_directions(distance: Value) -> std::net::SocketAddr {
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::json;

    let app = Router::new().route(
        DIRECTIONS_PATH,
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let distance = distance.clone();
            async move {
                let authorized = headers
                    .get(AUTHORIZATION)
                    .map(|key| key == "test-key")
                    .unwrap_or(false);
                if !authorized {
                    return (
                        axum::http::StatusCode::FORBIDDEN,
                        Json(json!({"error": {"code": 2001, "message": "missing key"}})),
                    );
                }

                (
                    axum::http::StatusCode::OK,
                    Json(json!({
                        "request": body,
                        "routes": [{"summary": {"distance": distance, "duration": 600.0}}],
                    })),
                )
            }
        }),
    );

    let server = axum::Server::bind(&std::net::SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);

    addr
}

#[test]
fn parses_first_route_distance() {
    use serde_json::json;

    let data = json!({
        "routes": [
            {"summary": {"distance": 4523.7, "duration": 610.2}},
            {"summary": {"distance": 9000.0, "duration": 900.0}},
        ]
    });
    assert_eq!(parse_distance(data).unwrap(), 4523.7);
}

#[test]
fn rejects_malformed_payloads() {
    use serde_json::json;

    assert!(parse_distance(json!({"routes": []})).unwrap_err().is_resolution_failure());
    assert!(parse_distance(json!({"routes": [{"summary": {}}]})).is_err());
    assert!(parse_distance(json!({"routes": [{"summary": {"distance": "far"}}]})).is_err());
    assert!(parse_distance(json!({"routes": [{"summary": {"distance": -5.0}}]})).is_err());
    assert!(parse_distance(json!({"error": "quota exceeded"})).is_err());
}

#[tokio::test]
async fn sends_lng_lat_pairs_with_key() {
    use serde_json::json;

    let addr = mock_directions(json!(4500.0)).await;
    let client = Client::new(format!("http://{}", addr), "test-key");

    let origin = Coordinates::new(14.1122, 122.9553).unwrap();
    let destination = Coordinates::new(14.12, 122.96).unwrap();

    let (status_code, data) = client.directions(origin, destination).await.unwrap();
    assert_eq!(status_code, 200);
    assert_eq!(
        data["request"]["coordinates"],
        json!([[122.9553, 14.1122], [122.96, 14.12]])
    );

    let meters = client.route_distance(origin, destination).await.unwrap();
    assert_eq!(meters, 4500.0);
}

#[tokio::test]
async fn non_success_status_is_upstream_error() {
    use serde_json::json;

    let addr = mock_directions(json!(4500.0)).await;
    let client = Client::new(format!("http://{}/", addr), "wrong-key");

    let origin = Coordinates::new(14.1122, 122.9553).unwrap();
    let destination = Coordinates::new(14.12, 122.96).unwrap();

    let err = client.route_distance(origin, destination).await.unwrap_err();
    assert_eq!(err, upstream_error());
}

#[tokio::test]
async fn unreachable_service_is_resolution_failure() {
    let client = Client::new("http://127.0.0.1:9", "test-key");

    let origin = Coordinates::new(14.1122, 122.9553).unwrap();
    let destination = Coordinates::new(14.12, 122.96).unwrap();

    let err = client.route_distance(origin, destination).await.unwrap_err();
    assert!(err.is_resolution_failure());
}
