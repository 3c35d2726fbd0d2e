use axum::extract::{Extension, Json};
use axum::http::StatusCode;
use serde_json::Value;

use crate::entities::Coordinates;
use crate::error::{upstream_error, Error};
use crate::external::relay::DistanceParams;
use crate::server::Directions;

/// Forwards the pair to the directions service and answers with its status
/// and body as received.
pub async fn get_distance(
    Extension(directions): Extension<Directions>,
    Json(params): Json<DistanceParams>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let origin = Coordinates::try_from(params.start)?;
    let destination = Coordinates::try_from(params.end)?;

    let (status_code, data) = directions
        .directions(origin, destination)
        .await
        .map_err(|err| {
            tracing::error!("failed to fetch distance: {}", err);
            err
        })?;

    let status = StatusCode::from_u16(status_code).map_err(|_| upstream_error())?;

    Ok((status, Json(data)))
}
