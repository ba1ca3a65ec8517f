use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type UserId = i32;
pub type AdvisorId = Uuid;

/// key: metering-models -> wallets,sessions,snapshots
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: UserId,
    pub credits: i64,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            credits: 0,
        }
    }
}

/// Per (user, advisor) timing and billing record. One record per pairing;
/// archived records are retained for history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub user_id: UserId,
    pub advisor_id: AdvisorId,
    pub start_time: DateTime<Utc>,
    pub free_end_time: DateTime<Utc>,
    pub remaining_free_time: i64,
    pub free_session_used: bool,
    pub paid_session: bool,
    pub paid_start_time: Option<DateTime<Utc>>,
    pub initial_credits: i64,
    pub minutes_charged: i64,
    pub last_charge_time: DateTime<Utc>,
    pub is_archived: bool,
}

impl ActiveSession {
    pub fn new_free(
        user_id: UserId,
        advisor_id: AdvisorId,
        now: DateTime<Utc>,
        window_secs: i64,
    ) -> Self {
        Self {
            user_id,
            advisor_id,
            start_time: now,
            free_end_time: now + chrono::Duration::seconds(window_secs),
            remaining_free_time: window_secs,
            free_session_used: false,
            paid_session: false,
            paid_start_time: None,
            initial_credits: 0,
            minutes_charged: 0,
            last_charge_time: now,
            is_archived: false,
        }
    }

    /// Record created on a paid start with no prior contact: the free window
    /// is forfeited immediately.
    pub fn new_for_paid(
        user_id: UserId,
        advisor_id: AdvisorId,
        now: DateTime<Utc>,
        window_secs: i64,
    ) -> Self {
        let mut session = Self::new_free(user_id, advisor_id, now, window_secs);
        session.free_session_used = true;
        session.remaining_free_time = 0;
        session
    }

    pub fn is_paid_active(&self) -> bool {
        self.paid_session && !self.is_archived
    }

    /// Whole seconds since the paid period began, clamped at zero.
    pub fn elapsed_paid_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.paid_start_time
            .map(|start| (now - start).num_seconds().max(0))
    }

    /// Seconds left in the free window, recomputed from the stored deadline.
    pub fn free_remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        if self.free_session_used {
            0
        } else {
            (self.free_end_time - now).num_seconds().max(0)
        }
    }

    /// Seconds of paid time left, funded by the credit snapshot taken at
    /// activation.
    pub fn paid_remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        match self.elapsed_paid_secs(now) {
            Some(elapsed) if self.paid_session => (self.initial_credits * 60 - elapsed).max(0),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    New,
    Free,
    Paid,
    Stopped,
    InsufficientCredits,
}

/// Full status projection returned by every control operation and carried in
/// sessionUpdate events. Deadlines are recomputed from stored timestamps so
/// this view agrees with the sweep at any instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_free: bool,
    pub remaining_free_time: i64,
    pub paid_timer: i64,
    pub credits: i64,
    pub status: SessionStatus,
    pub free_session_used: bool,
    pub show_feedback_modal: bool,
}

impl StatusSnapshot {
    /// Read-only projection; never mutates the session it reads.
    pub fn project(
        session: Option<&ActiveSession>,
        credits: i64,
        free_window_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(session) = session else {
            return Self {
                is_free: true,
                remaining_free_time: free_window_secs,
                paid_timer: 0,
                credits,
                status: SessionStatus::New,
                free_session_used: false,
                show_feedback_modal: false,
            };
        };

        let remaining_free = session.free_remaining_secs(now);
        let is_free = !session.free_session_used && remaining_free > 0;
        let paid_timer = session.paid_remaining_secs(now);
        let status = if is_free {
            SessionStatus::Free
        } else if session.paid_session {
            if paid_timer > 0 {
                SessionStatus::Paid
            } else {
                SessionStatus::InsufficientCredits
            }
        } else {
            SessionStatus::Stopped
        };

        Self {
            is_free,
            remaining_free_time: remaining_free,
            paid_timer,
            credits,
            status,
            // An expired free window reports used even before a sweep
            // persists it.
            free_session_used: session.free_session_used
                || (!session.paid_session && remaining_free == 0 && !is_free),
            show_feedback_modal: false,
        }
    }
}

/// Availability gate consumed by the chat-orchestration collaborator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub available: bool,
    pub is_free: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
