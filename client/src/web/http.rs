use gloo_net::http::{Request, RequestBuilder, Response};
use plotcanvas_shared::{
    CurrentUser, PlotListResponse, PlotMutationResponse, REVISION_HEADER, Revision, TileKey,
};
use web_sys::AbortSignal;

use crate::config::EngineConfig;
use crate::engine::NetworkEvent;
use crate::plots::PlotRequest;

const USER_HEADER: &str = "x-user-id";

fn with_user(builder: RequestBuilder, user: Option<&str>) -> RequestBuilder {
    match user {
        Some(user) => builder.header(USER_HEADER, user),
        None => builder,
    }
}

async fn ok(response: Result<Response, gloo_net::Error>) -> Result<Response, String> {
    let response = response.map_err(|err| err.to_string())?;
    if !response.ok() {
        let body = response.text().await.unwrap_or_default();
        return Err(if body.is_empty() {
            format!("HTTP {}", response.status())
        } else {
            body
        });
    }
    Ok(response)
}

/// Fetch one tile snapshot and its revision.
pub async fn fetch_tile(
    config: &EngineConfig,
    key: TileKey,
    signal: Option<&AbortSignal>,
) -> NetworkEvent {
    let url = config.api_url(&key.path());
    let result = async {
        let response = ok(Request::get(&url).abort_signal(signal).send().await).await?;
        let revision: Revision = response
            .headers()
            .get(REVISION_HEADER)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);
        let bytes = response.binary().await.map_err(|err| err.to_string())?;
        Ok::<_, String>((bytes, revision))
    }
    .await;

    match result {
        Ok((bytes, revision)) => NetworkEvent::TileLoaded {
            key,
            bytes,
            revision,
        },
        Err(reason) => NetworkEvent::TileFailed { key, reason },
    }
}

/// Ask the authentication collaborator who is signed in.
pub async fn fetch_me(config: &EngineConfig, user: Option<&str>) -> NetworkEvent {
    let Some(user) = user else {
        return NetworkEvent::Me(None);
    };
    let url = config.api_url("/api/me");
    let response = with_user(Request::get(&url), Some(user)).send().await;
    match ok(response).await {
        Ok(response) => NetworkEvent::Me(response.json::<CurrentUser>().await.ok()),
        Err(reason) => {
            tracing::info!(%reason, "not signed in");
            NetworkEvent::Me(None)
        }
    }
}

pub async fn run_plot_request(
    config: &EngineConfig,
    user: Option<&str>,
    request: PlotRequest,
) -> NetworkEvent {
    let url = config.api_url(&request.path());
    let builder = match request.method() {
        "PATCH" => Request::patch(&url),
        "DELETE" => Request::delete(&url),
        _ => Request::get(&url),
    };
    let builder = with_user(builder, user);
    let response = match request.body() {
        Some(body) => match builder.header("content-type", "application/json").body(body) {
            Ok(request) => request.send().await,
            Err(err) => Err(err),
        },
        None => builder.send().await,
    };
    let response = match ok(response).await {
        Ok(response) => response,
        Err(reason) => return NetworkEvent::PlotRequestFailed { reason },
    };

    let decoded = match request {
        PlotRequest::List { .. } => response
            .json::<PlotListResponse>()
            .await
            .map(|list| NetworkEvent::PlotsListed(list.plots)),
        PlotRequest::UpdateMeta { .. } => response
            .json::<PlotMutationResponse>()
            .await
            .map(NetworkEvent::PlotUpdated),
        PlotRequest::Delete { id } => response
            .json::<PlotMutationResponse>()
            .await
            .map(|done| NetworkEvent::PlotRemoved {
                id,
                new_balance: done.new_balance,
            }),
    };
    decoded.unwrap_or_else(|err| NetworkEvent::PlotRequestFailed {
        reason: err.to_string(),
    })
}
