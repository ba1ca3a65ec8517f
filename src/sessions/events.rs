use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config;

use super::models::{AdvisorId, SessionStatus, StatusSnapshot, UserId};

/// key: metering-events -> wire payloads
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsUpdate {
    pub user_id: UserId,
    pub credits: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub user_id: UserId,
    pub advisor_id: AdvisorId,
    pub is_free: bool,
    pub remaining_free_time: i64,
    pub paid_timer: i64,
    pub credits: i64,
    pub status: SessionStatus,
    pub free_session_used: bool,
    pub show_feedback_modal: bool,
}

impl SessionUpdate {
    pub fn from_snapshot(user_id: UserId, advisor_id: AdvisorId, snapshot: &StatusSnapshot) -> Self {
        Self {
            user_id,
            advisor_id,
            is_free: snapshot.is_free,
            remaining_free_time: snapshot.remaining_free_time,
            paid_timer: snapshot.paid_timer,
            credits: snapshot.credits,
            status: snapshot.status,
            free_session_used: snapshot.free_session_used,
            show_feedback_modal: snapshot.show_feedback_modal,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum SessionEvent {
    CreditsUpdate(CreditsUpdate),
    SessionUpdate(SessionUpdate),
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::CreditsUpdate(_) => "creditsUpdate",
            SessionEvent::SessionUpdate(_) => "sessionUpdate",
        }
    }
}

/// key: metering-events -> per-user broadcast hub
///
/// Notifier port for state deltas. Delivery is at-most-once and
/// fire-and-forget: publishing to a user nobody subscribed to is a no-op,
/// and lagging receivers drop messages. Transport adapters (SSE in
/// `sessions::api`) live outside the core.
#[derive(Clone, Default)]
pub struct EventHub {
    channels: Arc<DashMap<UserId, broadcast::Sender<SessionEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, user_id: UserId) -> broadcast::Receiver<SessionEvent> {
        use dashmap::mapref::entry::Entry;
        match self.channels.entry(user_id) {
            Entry::Occupied(e) => e.get().subscribe(),
            Entry::Vacant(v) => {
                let (tx, rx) = broadcast::channel(*config::EVENT_CHANNEL_CAPACITY);
                v.insert(tx);
                rx
            }
        }
    }

    pub fn publish(&self, user_id: UserId, event: SessionEvent) {
        if let Some(tx) = self.channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }
}
