//! HTTP side of the relay: `/api/grid` and `/api/map-image`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crownquest_protocol::{RoomId, Space};
use crownquest_room::RoomHandle;
use serde::{Deserialize, Serialize};

use crate::server::ServerState;
use crate::tools::{GridGenerator, MapMarker, MapRenderer};

#[derive(Debug, Deserialize)]
struct RoomQuery {
    #[serde(rename = "roomId")]
    room_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct GridResponse {
    spaces: Vec<Space>,
    /// Content hash clients compare against their own copy.
    hash: String,
}

#[derive(Debug, Serialize)]
struct MapImageResponse {
    image: String,
}

pub(crate) fn router<G: GridGenerator, M: MapRenderer>(state: Arc<ServerState<G, M>>) -> Router {
    Router::new()
        .route("/api/grid", get(grid::<G, M>))
        .route("/api/map-image", get(map_image::<G, M>))
        .with_state(state)
}

async fn grid<G: GridGenerator, M: MapRenderer>(
    State(state): State<Arc<ServerState<G, M>>>,
    Query(query): Query<RoomQuery>,
) -> Response {
    let handle = match room(&state, query).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    match handle.grid().await {
        Ok(grid) => {
            let hash = grid.content_hash();
            (StatusCode::OK, Json(GridResponse { spaces: grid.spaces, hash })).into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "grid requested from a stopped room");
            invalid_room()
        }
    }
}

async fn map_image<G: GridGenerator, M: MapRenderer>(
    State(state): State<Arc<ServerState<G, M>>>,
    Query(query): Query<RoomQuery>,
) -> Response {
    let handle = match room(&state, query).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    let (grid, snapshot) = match (handle.grid().await, handle.snapshot().await) {
        (Ok(grid), Ok(snapshot)) => (grid, snapshot),
        _ => return invalid_room(),
    };
    let markers: Vec<MapMarker> = snapshot
        .players
        .iter()
        .map(|p| MapMarker { name: p.name.clone(), position: p.position })
        .collect();

    match state.map_renderer.render(&grid, &markers).await {
        Ok(png) => {
            let image = format!("data:image/png;base64,{}", STANDARD.encode(png));
            (StatusCode::OK, Json(MapImageResponse { image })).into_response()
        }
        Err(e) => {
            tracing::error!(room_id = %handle.room_id(), error = %e, "map rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate map image").into_response()
        }
    }
}

async fn room<G: GridGenerator, M: MapRenderer>(
    state: &ServerState<G, M>,
    query: RoomQuery,
) -> Result<RoomHandle, Response> {
    let room_id = query.room_id.filter(|id| !id.is_empty()).ok_or_else(invalid_room)?;
    state
        .rooms
        .lock()
        .await
        .get(&RoomId::new(room_id))
        .map_err(|_| invalid_room())
}

fn invalid_room() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid or missing roomId").into_response()
}
