use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tokio::time::{self, Duration as TokioDuration};
use tracing::{info, warn};

use crate::config;

use super::events::{CreditsUpdate, EventHub, SessionEvent, SessionUpdate};
use super::models::{ActiveSession, SessionStatus, UserId, Wallet};
use super::store::{MeterStore, UserAccount};

/// key: metering-scheduler -> 1 Hz sweep
pub fn spawn(store: Arc<MeterStore>, events: EventHub) {
    let interval = TokioDuration::from_secs(*config::TICK_INTERVAL_SECS);

    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if let Err(err) = process_tick(&store, &events, now).await {
                warn!(?err, "metering sweep failed");
            }
        }
    });
}

/// key: metering-scheduler -> tick handler
///
/// Walks every account under its own lock. A failure in one session is
/// logged and skipped so a corrupt record never halts the sweep; the next
/// scheduled run retries implicitly.
pub async fn process_tick(store: &MeterStore, events: &EventHub, now: DateTime<Utc>) -> Result<()> {
    for user_id in store.user_ids() {
        let account = store.account(user_id);
        let mut account = account.lock().await;
        sweep_account(user_id, &mut account, events, now);
    }
    Ok(())
}

fn sweep_account(user_id: UserId, account: &mut UserAccount, events: &EventHub, now: DateTime<Utc>) {
    let UserAccount {
        wallet, sessions, ..
    } = account;

    for (advisor_id, session) in sessions.iter_mut() {
        if session.is_archived {
            continue;
        }
        // A session participates in exactly one sweep, gated by
        // free_session_used.
        let result = if session.paid_session {
            sweep_paid(wallet, session, events, now)
        } else if !session.free_session_used {
            sweep_free(wallet, session, events, now);
            Ok(())
        } else {
            Ok(())
        };
        if let Err(err) = result {
            warn!(
                ?err,
                user_id,
                advisor_id = %advisor_id,
                "session sweep failed; skipping"
            );
        }
    }
}

/// Settles crossed minute boundaries against the activation snapshot and
/// expires the session when its funded time runs out. The minutes_charged
/// counter makes a delayed tick charge every boundary it crossed, and the
/// snapshot comparison keeps a concurrent manual stop from being charged
/// twice.
fn sweep_paid(
    wallet: &mut Wallet,
    session: &mut ActiveSession,
    events: &EventHub,
    now: DateTime<Utc>,
) -> Result<()> {
    let user_id = session.user_id;
    let Some(elapsed) = session.elapsed_paid_secs(now) else {
        bail!("paid session has no start timestamp");
    };

    let minutes_elapsed = elapsed / 60;
    if minutes_elapsed > session.minutes_charged {
        let expected = (session.initial_credits - minutes_elapsed).max(0);
        if wallet.credits > expected {
            wallet.credits = expected;
            events.publish(
                user_id,
                SessionEvent::CreditsUpdate(CreditsUpdate {
                    user_id,
                    credits: expected,
                }),
            );
            info!(
                user_id,
                advisor_id = %session.advisor_id,
                credits = wallet.credits,
                elapsed,
                "deducted paid session credits"
            );
        }
        session.minutes_charged = minutes_elapsed;
        session.last_charge_time = now;
    }

    let remaining = (session.initial_credits * 60 - elapsed).max(0);

    // Broadcast every cycle for timer display smoothness.
    events.publish(
        user_id,
        SessionEvent::SessionUpdate(SessionUpdate {
            user_id,
            advisor_id: session.advisor_id,
            is_free: false,
            remaining_free_time: 0,
            paid_timer: remaining,
            credits: wallet.credits,
            status: if remaining > 0 {
                SessionStatus::Paid
            } else {
                SessionStatus::InsufficientCredits
            },
            free_session_used: session.free_session_used,
            show_feedback_modal: remaining <= 0,
        }),
    );

    if remaining <= 0 {
        session.paid_session = false;
        session.paid_start_time = None;
        session.is_archived = true;
        info!(
            user_id,
            advisor_id = %session.advisor_id,
            credits = wallet.credits,
            "paid session exhausted; terminated"
        );
    }

    Ok(())
}

/// Counts the free window down from its stored deadline and archives the
/// session when it closes.
fn sweep_free(
    wallet: &Wallet,
    session: &mut ActiveSession,
    events: &EventHub,
    now: DateTime<Utc>,
) {
    let user_id = session.user_id;
    let remaining = session.free_remaining_secs(now);
    session.remaining_free_time = remaining;
    if remaining <= 0 {
        session.free_session_used = true;
        session.is_archived = true;
    }

    events.publish(
        user_id,
        SessionEvent::SessionUpdate(SessionUpdate {
            user_id,
            advisor_id: session.advisor_id,
            is_free: remaining > 0,
            remaining_free_time: remaining,
            paid_timer: 0,
            credits: wallet.credits,
            status: if remaining > 0 {
                SessionStatus::Free
            } else {
                SessionStatus::Stopped
            },
            free_session_used: session.free_session_used,
            show_feedback_modal: remaining <= 0,
        }),
    );

    if remaining <= 0 {
        info!(
            user_id,
            advisor_id = %session.advisor_id,
            "free session window closed"
        );
    }
}
