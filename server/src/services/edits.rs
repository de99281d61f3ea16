//! Applies submissions from the persistent channel.
//!
//! Every submission is answered exactly once per `(user, session, sequence)`;
//! replays get the cached reply and change nothing.

use chrono::Utc;
use plotcanvas_shared::{
    EditPayload, EditReply, EditSubmission, MAX_PIXELS_PER_EDIT, Pixel, Plot, PlotId, Polygon,
    RejectReason, ServerMessage, can_afford, charge_for, cost, in_bounds, palette,
    validate_polygon,
};
use tracing::{debug, info};

use crate::state::AppState;

/// Author recorded for pixels drawn without signing in.
pub const ANONYMOUS: &str = "anonymous";

pub async fn submit(
    state: &AppState,
    user: Option<&str>,
    session_id: &str,
    submission: EditSubmission,
) -> EditReply {
    let sequence_id = submission.sequence_id;
    let key = (
        user.unwrap_or(ANONYMOUS).to_string(),
        session_id.to_string(),
        sequence_id,
    );

    let _guard = state.edit_lock.lock().await;
    if let Some(reply) = state.replies.lock().await.get(&key) {
        debug!(sequence_id, session_id, "replayed submission");
        return reply.clone();
    }

    let reply = if !submission.is_consistent() {
        EditReply::reject(sequence_id, RejectReason::Malformed)
    } else {
        match submission.payload {
            EditPayload::Pixels { pixels } => apply_pixels(state, user, sequence_id, pixels).await,
            EditPayload::Polygon { polygon, plot_id } => {
                apply_polygon(state, user, sequence_id, polygon, plot_id).await
            }
        }
    };

    state.replies.lock().await.insert(key, reply.clone());
    reply
}

async fn apply_pixels(
    state: &AppState,
    user: Option<&str>,
    sequence_id: u64,
    pixels: Vec<Pixel>,
) -> EditReply {
    let valid = !pixels.is_empty()
        && pixels.len() <= MAX_PIXELS_PER_EDIT
        && pixels
            .iter()
            .all(|pixel| in_bounds(pixel.x, pixel.y) && palette::is_valid(pixel.color));
    if !valid {
        return EditReply::reject(sequence_id, RejectReason::InvalidPixels);
    }

    let balance = match user {
        Some(user) => state.ledger.write().await.balance(user),
        None => 0,
    };
    let revision = state.next_revision();
    state.write_pixels(&pixels, revision);
    debug!(sequence_id, revision, count = pixels.len(), "pixels applied");
    state.publish(&ServerMessage::Pixels {
        revision,
        author: user.unwrap_or(ANONYMOUS).to_string(),
        pixels,
    });
    EditReply::ack(sequence_id, revision, balance)
}

async fn apply_polygon(
    state: &AppState,
    user: Option<&str>,
    sequence_id: u64,
    polygon: Polygon,
    plot_id: Option<PlotId>,
) -> EditReply {
    let Some(user) = user else {
        return EditReply::reject(sequence_id, RejectReason::SignInRequired);
    };
    let polygon = match validate_polygon(&polygon.vertices) {
        Ok(polygon) => polygon,
        Err(e) => {
            debug!(sequence_id, error = %e, "polygon rejected");
            return EditReply::reject(sequence_id, RejectReason::InvalidPolygon);
        }
    };

    let mut ledger = state.ledger.write().await;
    let previous = match plot_id {
        Some(id) => match ledger.plot(id) {
            None => return EditReply::reject(sequence_id, RejectReason::PlotNotFound),
            Some(plot) if plot.owner_id != user => {
                return EditReply::reject(sequence_id, RejectReason::NotOwner);
            }
            Some(plot) => Some(plot.clone()),
        },
        None => None,
    };
    if ledger.overlapping(&polygon, plot_id).is_some() {
        return EditReply::reject(sequence_id, RejectReason::RegionClaimed);
    }
    let charge = charge_for(previous.as_ref().map(|plot| &plot.polygon), &polygon);
    let balance = ledger.balance(user);
    if !can_afford(balance, charge) {
        return EditReply::reject(sequence_id, RejectReason::InsufficientBalance)
            .with_balance(balance);
    }

    let now = Utc::now();
    let plot = match previous {
        Some(previous) => Plot {
            score: cost(&polygon),
            polygon,
            updated_at: now,
            ..previous
        },
        None => {
            let id = ledger.allocate_plot_id();
            Plot {
                id,
                owner_id: user.to_string(),
                name: format!("Plot {id}"),
                description: String::new(),
                score: cost(&polygon),
                polygon,
                inserted_at: now,
                updated_at: now,
            }
        }
    };
    let new_balance = ledger.debit(user, charge);
    ledger.upsert_plot(plot.clone());
    drop(ledger);

    let revision = state.next_revision();
    info!(
        sequence_id,
        plot_id = plot.id,
        charge,
        new_balance,
        "plot claimed"
    );
    state.publish(&ServerMessage::PlotUpserted { plot: plot.clone() });
    EditReply::ack(sequence_id, revision, new_balance).with_plot(plot)
}

#[cfg(test)]
mod tests {
    use plotcanvas_shared::{ReplyStatus, Vertex};

    use super::*;

    fn state() -> AppState {
        AppState::with_settings(1_000, 16, 64)
    }

    fn pixels(seq: u64, pixels: Vec<Pixel>) -> EditSubmission {
        EditSubmission::new(seq, EditPayload::Pixels { pixels }, 0)
    }

    fn claim(seq: u64, polygon: Polygon, plot_id: Option<PlotId>) -> EditSubmission {
        let estimate = cost(&polygon);
        EditSubmission::new(seq, EditPayload::Polygon { polygon, plot_id }, estimate)
    }

    #[tokio::test]
    async fn pixel_edits_are_stamped_and_pushed() {
        let state = state();
        let mut pushes = state.push_tx.subscribe();

        let reply = submit(&state, Some("ada"), "s1", pixels(1, vec![Pixel::new(5, 5, 3)])).await;
        assert_eq!(reply.status, ReplyStatus::Ack);
        assert_eq!(reply.revision, Some(1));
        assert_eq!(reply.new_balance, Some(1_000));

        let frame = pushes.recv().await.unwrap();
        let pushed: ServerMessage = serde_json::from_str(frame.as_str()).unwrap();
        assert_eq!(
            pushed,
            ServerMessage::Pixels {
                revision: 1,
                author: "ada".to_string(),
                pixels: vec![Pixel::new(5, 5, 3)],
            }
        );
        assert_eq!(state.tile_snapshot(0, 0).1, 1);
    }

    #[tokio::test]
    async fn replayed_submission_gets_cached_reply() {
        let state = state();
        let first = submit(&state, Some("ada"), "s1", pixels(7, vec![Pixel::new(1, 1, 2)])).await;
        let again = submit(&state, Some("ada"), "s1", pixels(7, vec![Pixel::new(1, 1, 9)])).await;
        assert_eq!(first, again);
        assert_eq!(state.current_revision(), 1);
        assert_eq!(state.tile_snapshot(0, 0).0[TILE_OFFSET_1_1], 2);

        // another session reusing the id is a new edit
        let other = submit(&state, Some("ada"), "s2", pixels(7, vec![Pixel::new(1, 1, 9)])).await;
        assert_eq!(other.revision, Some(2));
    }

    const TILE_OFFSET_1_1: usize = plotcanvas_shared::TILE_SIZE as usize + 1;

    #[tokio::test]
    async fn invalid_pixels_are_rejected() {
        let state = state();
        let reply = submit(&state, None, "s", pixels(1, vec![Pixel::new(0, 0, 200)])).await;
        assert_eq!(reply.reason, Some(RejectReason::InvalidPixels));
        let reply = submit(&state, None, "s", pixels(2, Vec::new())).await;
        assert_eq!(reply.reason, Some(RejectReason::InvalidPixels));
        assert_eq!(state.current_revision(), 0);
    }

    #[tokio::test]
    async fn anonymous_pixels_are_accepted_but_claims_are_not() {
        let state = state();
        let reply = submit(&state, None, "s", pixels(1, vec![Pixel::new(0, 0, 1)])).await;
        assert_eq!(reply.status, ReplyStatus::Ack);
        assert_eq!(reply.new_balance, Some(0));

        let reply = submit(&state, None, "s", claim(2, Polygon::rectangle(0, 0, 2, 2), None)).await;
        assert_eq!(reply.reason, Some(RejectReason::SignInRequired));
    }

    #[tokio::test]
    async fn claim_debits_area_and_pushes_plot() {
        let state = state();
        let mut pushes = state.push_tx.subscribe();
        let reply = submit(
            &state,
            Some("ada"),
            "s",
            claim(1, Polygon::rectangle(0, 0, 10, 10), None),
        )
        .await;
        assert_eq!(reply.status, ReplyStatus::Ack);
        assert_eq!(reply.new_balance, Some(900));
        let plot = reply.plot.clone().unwrap();
        assert_eq!(plot.owner_id, "ada");
        assert_eq!(plot.name, format!("Plot {}", plot.id));

        let frame = pushes.recv().await.unwrap();
        let pushed: ServerMessage = serde_json::from_str(frame.as_str()).unwrap();
        assert_eq!(pushed, ServerMessage::PlotUpserted { plot });
    }

    #[tokio::test]
    async fn overlapping_claims_are_refused() {
        let state = state();
        submit(&state, Some("ada"), "s", claim(1, Polygon::rectangle(0, 0, 10, 10), None)).await;
        let reply = submit(&state, Some("bob"), "t", claim(1, Polygon::rectangle(5, 5, 15, 15), None)).await;
        assert_eq!(reply.reason, Some(RejectReason::RegionClaimed));

        // touching edges is fine
        let reply = submit(&state, Some("bob"), "t", claim(2, Polygon::rectangle(10, 0, 12, 2), None)).await;
        assert_eq!(reply.status, ReplyStatus::Ack);
    }

    #[tokio::test]
    async fn server_rechecks_balance_and_geometry() {
        let state = AppState::with_settings(50, 16, 64);
        let reply = submit(&state, Some("ada"), "s", claim(1, Polygon::rectangle(0, 0, 10, 10), None)).await;
        assert_eq!(reply.reason, Some(RejectReason::InsufficientBalance));
        assert_eq!(reply.new_balance, Some(50));

        let bow_tie = Polygon::new(vec![
            Vertex::new(0, 0),
            Vertex::new(4, 4),
            Vertex::new(4, 0),
            Vertex::new(0, 4),
        ]);
        let reply = submit(&state, Some("ada"), "s", claim(2, bow_tie, None)).await;
        assert_eq!(reply.reason, Some(RejectReason::InvalidPolygon));
    }

    #[tokio::test]
    async fn reshaping_charges_the_difference_and_checks_ownership() {
        let state = state();
        let created = submit(&state, Some("ada"), "s", claim(1, Polygon::rectangle(0, 0, 10, 10), None)).await;
        let id = created.plot.unwrap().id;

        let reply = submit(&state, Some("bob"), "t", claim(1, Polygon::rectangle(0, 0, 5, 5), Some(id))).await;
        assert_eq!(reply.reason, Some(RejectReason::NotOwner));

        let reply = submit(&state, Some("ada"), "s", claim(2, Polygon::rectangle(0, 0, 5, 10), Some(id))).await;
        assert_eq!(reply.status, ReplyStatus::Ack);
        assert_eq!(reply.new_balance, Some(950));
        assert_eq!(reply.plot.map(|plot| plot.id), Some(id));

        let reply = submit(&state, Some("ada"), "s", claim(3, Polygon::rectangle(0, 0, 5, 5), Some(999))).await;
        assert_eq!(reply.reason, Some(RejectReason::PlotNotFound));
    }
}
