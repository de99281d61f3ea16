use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use plotcanvas_shared::{
    Plot, PlotId, PlotListResponse, PlotMetaUpdate, PlotMutationResponse, PlotView,
    ServerMessage, refund, validate_plot_meta,
};
use serde::Deserialize;
use tracing::info;

use super::{UserQuery, caller};
use crate::config::PLOT_LIST_LIMIT;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub view: Option<String>,
    pub user: Option<String>,
}

type ApiError = (StatusCode, String);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, message.into())
}

/// Order plots for a listing view. `Mine` assumes the caller already filtered.
pub fn sort_for_view(plots: &mut [Plot], view: PlotView) {
    match view {
        PlotView::Top => plots.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.inserted_at.cmp(&a.inserted_at))
                .then(b.id.cmp(&a.id))
        }),
        PlotView::Recent | PlotView::Mine => {
            plots.sort_by(|a, b| b.inserted_at.cmp(&a.inserted_at).then(b.id.cmp(&a.id)))
        }
    }
}

/// `GET /api/plots?view=recent|top|mine`
pub async fn list_plots(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Json<PlotListResponse>, ApiError> {
    let view = match query.view.as_deref() {
        None => PlotView::default(),
        Some(raw) => PlotView::parse(raw)
            .ok_or_else(|| error(StatusCode::BAD_REQUEST, format!("unknown view {raw:?}")))?,
    };
    let user = caller(
        &headers,
        &UserQuery {
            user: query.user.clone(),
        },
    );
    if view == PlotView::Mine && user.is_none() {
        return Err(error(StatusCode::UNAUTHORIZED, "sign in to list your plots"));
    }

    let mut plots: Vec<Plot> = {
        let ledger = state.ledger.read().await;
        ledger
            .plots()
            .filter(|plot| view != PlotView::Mine || Some(&plot.owner_id) == user.as_ref())
            .cloned()
            .collect()
    };
    sort_for_view(&mut plots, view);
    plots.truncate(PLOT_LIST_LIMIT);
    Ok(Json(PlotListResponse { plots }))
}

/// `PATCH /api/plots/{id}`: rename or re-describe an owned plot.
pub async fn update_plot(
    State(state): State<AppState>,
    Path(id): Path<PlotId>,
    Query(query): Query<UserQuery>,
    headers: HeaderMap,
    Json(body): Json<PlotMetaUpdate>,
) -> Result<Json<PlotMutationResponse>, ApiError> {
    let user = caller(&headers, &query)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "sign in to edit plots"))?;
    let (name, description) = validate_plot_meta(&body.name, &body.description)
        .map_err(|e| error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let mut ledger = state.ledger.write().await;
    let plot = owned_plot(ledger.plot(id), &user)?;
    let plot = Plot {
        name,
        description,
        updated_at: Utc::now(),
        ..plot
    };
    ledger.upsert_plot(plot.clone());
    let new_balance = ledger.balance(&user);
    drop(ledger);

    state.publish(&ServerMessage::PlotUpserted { plot: plot.clone() });
    Ok(Json(PlotMutationResponse {
        plot: Some(plot),
        new_balance,
    }))
}

/// `DELETE /api/plots/{id}`: remove an owned plot and refund its area.
pub async fn delete_plot(
    State(state): State<AppState>,
    Path(id): Path<PlotId>,
    Query(query): Query<UserQuery>,
    headers: HeaderMap,
) -> Result<Json<PlotMutationResponse>, ApiError> {
    let user = caller(&headers, &query)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "sign in to delete plots"))?;

    let _guard = state.edit_lock.lock().await;
    let mut ledger = state.ledger.write().await;
    let plot = owned_plot(ledger.plot(id), &user)?;
    ledger.remove_plot(id);
    let new_balance = ledger.debit(&user, -refund(&plot.polygon));
    drop(ledger);

    let revision = state.next_revision();
    info!(plot_id = id, new_balance, "plot deleted");
    state.publish(&ServerMessage::PlotDeleted {
        plot_id: id,
        revision,
    });
    Ok(Json(PlotMutationResponse {
        plot: None,
        new_balance,
    }))
}

fn owned_plot(plot: Option<&Plot>, user: &str) -> Result<Plot, ApiError> {
    match plot {
        None => Err(error(StatusCode::NOT_FOUND, "plot not found")),
        Some(plot) if plot.owner_id != user => {
            Err(error(StatusCode::FORBIDDEN, "you do not own that plot"))
        }
        Some(plot) => Ok(plot.clone()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use plotcanvas_shared::Polygon;

    use super::*;

    fn plot(id: PlotId, score: i64, age_minutes: i64) -> Plot {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let at = base - Duration::minutes(age_minutes);
        Plot {
            id,
            owner_id: "ada".to_string(),
            name: format!("Plot {id}"),
            description: String::new(),
            polygon: Polygon::rectangle(0, 0, 1, 1),
            score,
            inserted_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn top_orders_by_score_then_recency() {
        let mut plots = vec![plot(1, 5, 30), plot(2, 9, 60), plot(3, 5, 10)];
        sort_for_view(&mut plots, PlotView::Top);
        let ids: Vec<_> = plots.iter().map(|plot| plot.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn recent_orders_by_insertion() {
        let mut plots = vec![plot(1, 5, 30), plot(2, 9, 60), plot(3, 5, 10)];
        sort_for_view(&mut plots, PlotView::Recent);
        let ids: Vec<_> = plots.iter().map(|plot| plot.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
