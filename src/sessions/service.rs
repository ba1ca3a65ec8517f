use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config;
use crate::error::{AppError, AppResult};

use super::events::{CreditsUpdate, EventHub, SessionEvent, SessionUpdate};
use super::models::{
    ActiveSession, AdvisorId, Availability, SessionStatus, StatusSnapshot, UserId,
};
use super::store::{MeterStore, UserAccount};

pub const NO_CREDITS_MESSAGE: &str = "Purchase credits for best results.";

/// key: metering-service -> session lifecycle
///
/// Control API core. Every operation takes `now` so callers and tests agree
/// on the clock, and every mutation happens under the per-user account lock.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<MeterStore>,
    events: EventHub,
}

impl SessionService {
    pub fn new(store: Arc<MeterStore>, events: EventHub) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> &Arc<MeterStore> {
        &self.store
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Read-only projection of wallet plus timer arithmetic.
    pub async fn status(
        &self,
        user_id: UserId,
        advisor_id: AdvisorId,
        now: DateTime<Utc>,
    ) -> AppResult<StatusSnapshot> {
        let account = self.store.account(user_id);
        let account = account.lock().await;
        Ok(StatusSnapshot::project(
            account.sessions.get(&advisor_id),
            account.wallet.credits,
            *config::FREE_SESSION_SECS,
            now,
        ))
    }

    /// Opens the one-time free window for this pairing. Re-requesting while
    /// the window is still open returns the current remaining time without
    /// extending it.
    pub async fn start_free(
        &self,
        user_id: UserId,
        advisor_id: AdvisorId,
        now: DateTime<Utc>,
    ) -> AppResult<StatusSnapshot> {
        let window = *config::FREE_SESSION_SECS;
        let account = self.store.account(user_id);
        let mut account = account.lock().await;

        let session = match account.sessions.get_mut(&advisor_id) {
            Some(session) => {
                if session.free_session_used {
                    return Err(AppError::FreeSessionUsed);
                }
                if session.free_remaining_secs(now) == 0 {
                    // Window elapsed but not yet swept; persist the
                    // exhaustion before rejecting.
                    session.free_session_used = true;
                    session.is_archived = true;
                    return Err(AppError::FreeSessionUsed);
                }
                session.remaining_free_time = session.free_remaining_secs(now);
                session.clone()
            }
            None => {
                let session = ActiveSession::new_free(user_id, advisor_id, now, window);
                account.sessions.insert(advisor_id, session.clone());
                session
            }
        };

        let snapshot = StatusSnapshot {
            is_free: true,
            remaining_free_time: session.remaining_free_time,
            paid_timer: 0,
            credits: account.wallet.credits,
            status: SessionStatus::Free,
            free_session_used: false,
            show_feedback_modal: false,
        };
        self.publish_session(user_id, advisor_id, &snapshot);
        Ok(snapshot)
    }

    /// Activates minute-metered billing. Enforces the one-paid-session-per-
    /// user invariant by force-stopping any sibling paid session first, all
    /// under the same account lock.
    pub async fn start_paid(
        &self,
        user_id: UserId,
        advisor_id: AdvisorId,
        now: DateTime<Utc>,
    ) -> AppResult<StatusSnapshot> {
        let window = *config::FREE_SESSION_SECS;
        let account = self.store.account(user_id);
        let mut account = account.lock().await;

        if account.wallet.credits < 1 {
            return Err(AppError::InsufficientCredits);
        }
        if account
            .sessions
            .get(&advisor_id)
            .map(|s| s.is_paid_active())
            .unwrap_or(false)
        {
            return Err(AppError::BadRequest("paid session already active".into()));
        }

        self.force_stop_siblings(user_id, advisor_id, &mut account, now);

        let credits = account.wallet.credits;
        let session = account
            .sessions
            .entry(advisor_id)
            .or_insert_with(|| ActiveSession::new_for_paid(user_id, advisor_id, now, window));
        session.paid_session = true;
        session.paid_start_time = Some(now);
        session.initial_credits = credits;
        session.minutes_charged = 0;
        session.last_charge_time = now;
        session.free_session_used = true;
        session.remaining_free_time = 0;
        session.is_archived = false;

        let snapshot = StatusSnapshot {
            is_free: false,
            remaining_free_time: 0,
            paid_timer: credits * 60,
            credits,
            status: SessionStatus::Paid,
            free_session_used: true,
            show_feedback_modal: false,
        };
        self.publish_session(user_id, advisor_id, &snapshot);
        Ok(snapshot)
    }

    /// Ends the session and settles the wallet. Idempotent: stopping an
    /// already-archived session returns its last known state unchanged.
    pub async fn stop(
        &self,
        user_id: UserId,
        advisor_id: AdvisorId,
        now: DateTime<Utc>,
    ) -> AppResult<StatusSnapshot> {
        let account = self.store.account(user_id);
        let mut account = account.lock().await;
        let UserAccount {
            wallet, sessions, ..
        } = &mut *account;

        let Some(session) = sessions.get_mut(&advisor_id) else {
            return Err(AppError::NoActiveSession);
        };

        if session.is_archived {
            return Ok(StatusSnapshot {
                is_free: false,
                remaining_free_time: session.remaining_free_time,
                paid_timer: 0,
                credits: wallet.credits,
                status: SessionStatus::Stopped,
                free_session_used: session.free_session_used,
                show_feedback_modal: true,
            });
        }

        let mut remaining = 0;
        if session.paid_session {
            if let Some(elapsed) = session.elapsed_paid_secs(now) {
                let minutes = elapsed / 60;
                remaining = (session.initial_credits * 60 - elapsed).max(0);
                wallet.credits = (session.initial_credits - minutes).max(0);
            }
        }
        session.paid_session = false;
        session.paid_start_time = None;
        session.is_archived = true;

        let snapshot = StatusSnapshot {
            is_free: false,
            remaining_free_time: session.remaining_free_time,
            paid_timer: remaining,
            credits: wallet.credits,
            status: SessionStatus::Stopped,
            free_session_used: session.free_session_used,
            show_feedback_modal: true,
        };
        self.publish_session(user_id, advisor_id, &snapshot);
        Ok(snapshot)
    }

    /// Availability gate for the chat-orchestration collaborator. Lazily
    /// opens the free window on first contact and lazily charges elapsed
    /// whole paid minutes before reporting.
    pub async fn check_availability(
        &self,
        user_id: UserId,
        advisor_id: AdvisorId,
        now: DateTime<Utc>,
    ) -> AppResult<Availability> {
        let window = *config::FREE_SESSION_SECS;
        let account = self.store.account(user_id);
        let mut account = account.lock().await;

        let free_window_open = match account.sessions.get(&advisor_id) {
            None => {
                let session = ActiveSession::new_free(user_id, advisor_id, now, window);
                account.sessions.insert(advisor_id, session);
                return Ok(Availability {
                    available: true,
                    is_free: true,
                    message: None,
                });
            }
            Some(session) => !session.free_session_used && session.free_remaining_secs(now) > 0,
        };

        if free_window_open {
            return Ok(Availability {
                available: true,
                is_free: true,
                message: None,
            });
        }

        if account.wallet.credits <= 0 {
            return Ok(Availability {
                available: false,
                is_free: false,
                message: Some(NO_CREDITS_MESSAGE.to_string()),
            });
        }

        // Settle any minute boundaries crossed since the last charge before
        // reporting, so a stale session cannot look funded.
        let UserAccount {
            wallet, sessions, ..
        } = &mut *account;
        if let Some(session) = sessions.get_mut(&advisor_id) {
            if session.is_paid_active() {
                if let Some(elapsed) = session.elapsed_paid_secs(now) {
                    let minutes_elapsed = elapsed / 60;
                    if minutes_elapsed > session.minutes_charged {
                        let expected = (session.initial_credits - minutes_elapsed).max(0);
                        if wallet.credits > expected {
                            wallet.credits = expected;
                            self.events.publish(
                                user_id,
                                SessionEvent::CreditsUpdate(CreditsUpdate {
                                    user_id,
                                    credits: expected,
                                }),
                            );
                        }
                        session.minutes_charged = minutes_elapsed;
                        session.last_charge_time = now;
                    }
                }
            }
        }

        if account.wallet.credits <= 0 {
            return Ok(Availability {
                available: false,
                is_free: false,
                message: Some(NO_CREDITS_MESSAGE.to_string()),
            });
        }

        Ok(Availability {
            available: true,
            is_free: false,
            message: None,
        })
    }

    /// Ledger credit for the out-of-scope top-up collaborator.
    pub async fn top_up(&self, user_id: UserId, amount: i64) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::BadRequest("amount must be positive".into()));
        }
        let credits = self.store.credit(user_id, amount).await;
        self.events.publish(
            user_id,
            SessionEvent::CreditsUpdate(CreditsUpdate { user_id, credits }),
        );
        Ok(credits)
    }

    /// Charges and archives every other paid-active session of this user.
    /// Whole elapsed minutes are settled against each session's own credit
    /// snapshot.
    fn force_stop_siblings(
        &self,
        user_id: UserId,
        advisor_id: AdvisorId,
        account: &mut UserAccount,
        now: DateTime<Utc>,
    ) {
        let UserAccount {
            wallet, sessions, ..
        } = account;
        for (sibling_id, session) in sessions.iter_mut() {
            if *sibling_id == advisor_id || !session.is_paid_active() {
                continue;
            }
            if let Some(elapsed) = session.elapsed_paid_secs(now) {
                let minutes = elapsed / 60;
                wallet.credits = (session.initial_credits - minutes).max(0);
            }
            session.paid_session = false;
            session.paid_start_time = None;
            session.is_archived = true;
            info!(
                user_id,
                advisor_id = %sibling_id,
                credits = wallet.credits,
                "force-stopped paid session superseded by new paid start"
            );
            let snapshot = StatusSnapshot {
                is_free: false,
                remaining_free_time: 0,
                paid_timer: 0,
                credits: wallet.credits,
                status: SessionStatus::Stopped,
                free_session_used: session.free_session_used,
                show_feedback_modal: true,
            };
            let update = SessionUpdate::from_snapshot(user_id, *sibling_id, &snapshot);
            self.events
                .publish(user_id, SessionEvent::SessionUpdate(update));
        }
    }

    fn publish_session(&self, user_id: UserId, advisor_id: AdvisorId, snapshot: &StatusSnapshot) {
        let update = SessionUpdate::from_snapshot(user_id, advisor_id, snapshot);
        self.events
            .publish(user_id, SessionEvent::SessionUpdate(update));
    }
}
