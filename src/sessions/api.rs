use std::convert::Infallible;

use axum::{
    extract::{Extension, Path},
    response::sse::{Event, Sse},
    Json,
};
use chrono::Utc;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

use super::models::{AdvisorId, Availability, StatusSnapshot, UserId};
use super::service::SessionService;

fn parse_advisor(raw: &str) -> AppResult<AdvisorId> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidIdentifier)
}

/// key: metering-api -> rest endpoints
///
/// Thin transport adapter: identity comes from the auth middleware upstream,
/// the clock is sampled here, and everything else lives in the service.
pub async fn session_status(
    Extension(service): Extension<SessionService>,
    AuthUser { user_id }: AuthUser,
    Path(advisor_id): Path<String>,
) -> AppResult<Json<StatusSnapshot>> {
    let advisor_id = parse_advisor(&advisor_id)?;
    let snapshot = service.status(user_id, advisor_id, Utc::now()).await?;
    Ok(Json(snapshot))
}

pub async fn start_free_session(
    Extension(service): Extension<SessionService>,
    AuthUser { user_id }: AuthUser,
    Path(advisor_id): Path<String>,
) -> AppResult<Json<StatusSnapshot>> {
    let advisor_id = parse_advisor(&advisor_id)?;
    let snapshot = service.start_free(user_id, advisor_id, Utc::now()).await?;
    Ok(Json(snapshot))
}

pub async fn start_paid_session(
    Extension(service): Extension<SessionService>,
    AuthUser { user_id }: AuthUser,
    Path(advisor_id): Path<String>,
) -> AppResult<Json<StatusSnapshot>> {
    let advisor_id = parse_advisor(&advisor_id)?;
    let snapshot = service.start_paid(user_id, advisor_id, Utc::now()).await?;
    Ok(Json(snapshot))
}

pub async fn stop_session(
    Extension(service): Extension<SessionService>,
    AuthUser { user_id }: AuthUser,
    Path(advisor_id): Path<String>,
) -> AppResult<Json<StatusSnapshot>> {
    let advisor_id = parse_advisor(&advisor_id)?;
    let snapshot = service.stop(user_id, advisor_id, Utc::now()).await?;
    Ok(Json(snapshot))
}

pub async fn availability(
    Extension(service): Extension<SessionService>,
    AuthUser { user_id }: AuthUser,
    Path(advisor_id): Path<String>,
) -> AppResult<Json<Availability>> {
    let advisor_id = parse_advisor(&advisor_id)?;
    let availability = service
        .check_availability(user_id, advisor_id, Utc::now())
        .await?;
    Ok(Json(availability))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
    pub user_id: UserId,
    pub credits: i64,
}

pub async fn wallet_balance(
    Extension(service): Extension<SessionService>,
    AuthUser { user_id }: AuthUser,
) -> AppResult<Json<WalletView>> {
    let credits = service.store().credits(user_id).await;
    Ok(Json(WalletView { user_id, credits }))
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub amount: i64,
}

/// Glue for the out-of-scope payment collaborator.
pub async fn top_up(
    Extension(service): Extension<SessionService>,
    AuthUser { user_id }: AuthUser,
    Json(payload): Json<TopUpRequest>,
) -> AppResult<Json<WalletView>> {
    let credits = service.top_up(user_id, payload.amount).await?;
    Ok(Json(WalletView { user_id, credits }))
}

pub async fn stream_events(
    Extension(service): Extension<SessionService>,
    AuthUser { user_id }: AuthUser,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = service.events().subscribe(user_id);
    let stream = BroadcastStream::new(rx).filter_map(|res| async move {
        match res {
            Ok(event) => serde_json::to_string(&event)
                .ok()
                .map(|data| Ok(Event::default().event(event.kind()).data(data))),
            Err(_) => None,
        }
    });
    Sse::new(stream)
}
