use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use plotcanvas_shared::{COORD_MAX, CurrentUser, REVISION_HEADER, TILE_SIZE, TileKey, in_bounds};

use super::{UserQuery, caller};
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let plots = state.ledger.read().await.plots().count();
    Json(serde_json::json!({
        "status": "ok",
        "revision": state.current_revision(),
        "tiles": state.tiles.len(),
        "plots": plots,
        "connections": state.push_tx.receiver_count(),
    }))
}

/// `GET /api/tiles/{tx}/{ty}`: one palette index per pixel, row-major.
pub async fn get_tile(
    State(state): State<AppState>,
    Path((tx, ty)): Path<(i32, i32)>,
) -> Response {
    if !tile_on_canvas(tx, ty) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let (bytes, revision) = state.tile_snapshot(tx, ty);
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
            (
                header::HeaderName::from_static(REVISION_HEADER),
                revision.to_string(),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn tile_on_canvas(tx: i32, ty: i32) -> bool {
    let size = TILE_SIZE as i32;
    let limit = COORD_MAX / size + 1;
    if !(-limit..=limit).contains(&tx) || !(-limit..=limit).contains(&ty) {
        return false;
    }
    let key = TileKey::from_index(tx, ty, TILE_SIZE);
    let last = size - 1;
    [(0, 0), (last, 0), (0, last), (last, last)]
        .into_iter()
        .any(|(dx, dy)| in_bounds(key.origin_x + dx, key.origin_y + dy))
}

/// `GET /api/me`: who the caller is, or 401.
pub async fn me(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    headers: HeaderMap,
) -> Result<Json<CurrentUser>, StatusCode> {
    let Some(id) = caller(&headers, &query) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let balance = state.ledger.write().await.balance(&id);
    Ok(Json(CurrentUser {
        name: id.clone(),
        id,
        balance,
    }))
}
