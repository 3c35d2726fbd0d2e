mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::Extension, routing::post, Router};

use crate::error::{server_error, Error};
use crate::external::{openrouteservice, relay::DISTANCE_PATH};
use crate::server::handlers::distance;

type Directions = Arc<openrouteservice::Client>;

/// Stateless relay in front of the directions service, so clients never see
/// the routing key.
pub fn router(directions: openrouteservice::Client) -> Router {
    Router::new()
        .route(DISTANCE_PATH, post(distance::get_distance))
        .layer(Extension(Arc::new(directions) as Directions))
}

pub async fn serve(addr: SocketAddr, directions: openrouteservice::Client) -> Result<(), Error> {
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(router(directions).into_make_service())
        .await
        .map_err(server_error)
}

#[cfg(test)]
async fn spawn_relay(directions: openrouteservice::Client) -> SocketAddr {
    let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(router(directions).into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);

    addr
}

#[tokio::test]
async fn relays_distance_end_to_end() {
    use crate::api::RouteAPI;
    use crate::entities::Coordinates;
    use crate::external::{openrouteservice::mock_directions, relay};

    let upstream = mock_directions(serde_json::json!(5230.5)).await;
    let directions = openrouteservice::Client::new(format!("http://{}", upstream), "test-key");
    let addr = spawn_relay(directions).await;

    let client = relay::Client::new(&format!("http://{}", addr));
    let origin = Coordinates::new(14.1122, 122.9553).unwrap();
    let destination = Coordinates::new(14.12, 122.96).unwrap();

    let meters = client.route_distance(origin, destination).await.unwrap();
    assert_eq!(meters, 5230.5);
}

#[tokio::test]
async fn passes_upstream_status_and_body_through() {
    use crate::external::openrouteservice::mock_directions;
    use serde_json::{json, Value};

    let upstream = mock_directions(json!(5230.5)).await;
    let directions = openrouteservice::Client::new(format!("http://{}", upstream), "wrong-key");
    let addr = spawn_relay(directions).await;

    let res = reqwest::Client::new()
        .post(format!("http://{}{}", addr, DISTANCE_PATH))
        .json(&json!({
            "start": {"lat": 14.1122, "lng": 122.9553},
            "end": {"lat": 14.12, "lng": 122.96}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], json!(2001));
}

#[tokio::test]
async fn relay_client_reports_rejected_upstream_as_resolution_failure() {
    use crate::api::RouteAPI;
    use crate::entities::Coordinates;
    use crate::external::{openrouteservice::mock_directions, relay};

    let upstream = mock_directions(serde_json::json!(5230.5)).await;
    let directions = openrouteservice::Client::new(format!("http://{}", upstream), "wrong-key");
    let addr = spawn_relay(directions).await;

    let client = relay::Client::new(&format!("http://{}", addr));
    let origin = Coordinates::new(14.1122, 122.9553).unwrap();
    let destination = Coordinates::new(14.12, 122.96).unwrap();

    let err = client.route_distance(origin, destination).await.unwrap_err();
    assert!(err.is_resolution_failure());
}

#[tokio::test]
async fn unreachable_upstream_is_a_server_error() {
    use serde_json::{json, Value};

    let directions = openrouteservice::Client::new("http://127.0.0.1:9", "test-key");
    let addr = spawn_relay(directions).await;

    let res = reqwest::Client::new()
        .post(format!("http://{}{}", addr, DISTANCE_PATH))
        .json(&json!({
            "start": {"lat": 14.1122, "lng": 122.9553},
            "end": {"lat": 14.12, "lng": 122.96}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], json!("Failed to fetch distance"));
}

#[tokio::test]
async fn rejects_out_of_range_coordinates() {
    use serde_json::json;

    let directions = openrouteservice::Client::new("http://127.0.0.1:9", "test-key");
    let addr = spawn_relay(directions).await;

    let res = reqwest::Client::new()
        .post(format!("http://{}{}", addr, DISTANCE_PATH))
        .json(&json!({
            "start": {"lat": 114.0, "lng": 122.9553},
            "end": {"lat": 14.12, "lng": 122.96}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
}
