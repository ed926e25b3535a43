use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    Extension,
    extract::{Query, State},
    http::header,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{info, warn};
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;

use super::assigned_scope;
use crate::{
    core::{app_error::AppError, app_state::AppState},
    events::{SubscriptionFilter, Topic},
    location::LocationScope,
    models::OrderEntity,
    session::Session,
    store::Store,
    terminal::sound,
};

const SNAPSHOT_EVENT: &str = "orders:snapshot";

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_feed))
        .routes(utoipa_axum::routes!(get_alert_sound))
}

#[derive(Deserialize, IntoParams)]
struct FeedQuery {
    /// Comma-separated topics, e.g. `orders:insert,notifications:insert`. Defaults to every topic.
    topics: Option<String>,
    /// `all` or a location code. Defaults to the staff member's own assignment.
    #[param(value_type = Option<String>)]
    location: Option<LocationScope>,
}

fn parse_topics(raw: Option<&str>) -> Result<Vec<Topic>, AppError> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(Topic::ALL.to_vec());
    };
    raw.split(',')
        .map(|topic| topic.parse::<Topic>().map_err(AppError::BadRequest))
        .collect()
}

/// The scope's active orders, once per `period`, starting one period from now.
///
/// A failed read is logged and skipped.
fn snapshots(
    store: Arc<dyn Store>,
    scope: LocationScope,
    period: Duration,
) -> impl Stream<Item = Vec<OrderEntity>> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    stream::unfold((store, ticker), move |(store, mut ticker)| async move {
        ticker.tick().await;
        let orders = match store.list_active_orders(scope).await {
            Ok(orders) => Some(orders),
            Err(err) => {
                warn!(error = %err, %scope, "Feed snapshot read failed");
                None
            }
        };
        Some((orders, (store, ticker)))
    })
    .filter_map(|orders| async move { orders })
}

/// Server-sent change events for orders and notifications.
///
/// Each event is named after its topic and carries the changed row as JSON.
/// When an order topic is requested, an `orders:snapshot` event with the
/// scope's active orders follows every poll period, so a client that missed
/// events catches up.
#[utoipa::path(
    get,
    path = "/feed",
    tags = ["Staff feed"],
    security(("bearerAuth" = [])),
    params(FeedQuery),
    responses(
        (status = 200, description = "Event stream", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Unknown topic")
    )
)]
async fn get_feed(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<FeedQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let topics = parse_topics(query.topics.as_deref())?;
    let scope = match query.location {
        Some(scope) => scope,
        None => assigned_scope(&session)?,
    };
    let wants_orders = topics.iter().any(|topic| topic.is_order());
    let subscription = state.bus.subscribe(SubscriptionFilter::new(topics, scope));
    info!(%scope, subscribers = state.bus.subscriber_count(), "Staff feed opened");

    let changes = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((event, subscription))
    })
    .filter_map(|event| async move {
        match Event::default()
            .event(event.topic().as_str())
            .json_data(event.as_ref())
        {
            Ok(sse) => Some(Ok(sse)),
            Err(err) => {
                warn!(error = %err, topic = %event.topic(), "Failed to encode change event");
                None
            }
        }
    });

    let snapshots = if wants_orders {
        snapshots(
            state.store.clone(),
            scope,
            state.config.terminal.poll_interval,
        )
        .filter_map(|orders| async move {
            match Event::default().event(SNAPSHOT_EVENT).json_data(&orders) {
                Ok(sse) => Some(Ok(sse)),
                Err(err) => {
                    warn!(error = %err, "Failed to encode order snapshot");
                    None
                }
            }
        })
        .boxed()
    } else {
        stream::empty().boxed()
    };

    Ok(Sse::new(stream::select(changes, snapshots)).keep_alive(KeepAlive::default()))
}

/// The new-order chime as a WAV file.
#[utoipa::path(
    get,
    path = "/alert.wav",
    tags = ["Staff feed"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Alert sound", body = Vec<u8>, content_type = "audio/wav")
    )
)]
async fn get_alert_sound() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        sound::chime_wav(),
    )
}
