use std::sync::Arc;

use advisory_billing::error::AppError;
use advisory_billing::sessions::{
    process_tick, EventHub, MeterStore, SessionEvent, SessionService, SessionStatus,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

fn setup() -> (SessionService, Arc<MeterStore>, EventHub) {
    let store = Arc::new(MeterStore::new());
    let events = EventHub::new();
    let service = SessionService::new(store.clone(), events.clone());
    (service, store, events)
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

const USER: i32 = 11;

#[tokio::test]
async fn deducts_exactly_floor_minutes_over_125_seconds() {
    let (service, store, events) = setup();
    let advisor = Uuid::new_v4();
    service.top_up(USER, 5).await.unwrap();
    service.start_paid(USER, advisor, t0()).await.unwrap();

    for second in 1..=125 {
        process_tick(&store, &events, t0() + Duration::seconds(second))
            .await
            .unwrap();
    }

    assert_eq!(store.credits(USER).await, 3);
    let snapshot = service
        .status(USER, advisor, t0() + Duration::seconds(125))
        .await
        .unwrap();
    assert_eq!(snapshot.paid_timer, 175);
    assert_eq!(snapshot.status, SessionStatus::Paid);
}

#[tokio::test]
async fn delayed_tick_charges_every_crossed_boundary() {
    let (service, store, events) = setup();
    let advisor = Uuid::new_v4();
    service.top_up(USER, 5).await.unwrap();
    service.start_paid(USER, advisor, t0()).await.unwrap();

    // the scheduler skipped three minutes of cycles; one tick catches up
    process_tick(&store, &events, t0() + Duration::seconds(185))
        .await
        .unwrap();
    assert_eq!(store.credits(USER).await, 2);
}

#[tokio::test]
async fn tick_and_stop_charge_the_same_minute_once() {
    let (service, store, events) = setup();
    let advisor = Uuid::new_v4();
    service.top_up(USER, 5).await.unwrap();
    service.start_paid(USER, advisor, t0()).await.unwrap();

    process_tick(&store, &events, t0() + Duration::seconds(60))
        .await
        .unwrap();
    assert_eq!(store.credits(USER).await, 4);

    // a stop at the same boundary settles to the same balance, not below
    let snapshot = service
        .stop(USER, advisor, t0() + Duration::seconds(61))
        .await
        .unwrap();
    assert_eq!(snapshot.credits, 4);

    // and a late tick on the archived session changes nothing
    process_tick(&store, &events, t0() + Duration::seconds(62))
        .await
        .unwrap();
    assert_eq!(store.credits(USER).await, 4);
}

#[tokio::test]
async fn stop_then_tick_charges_once_as_well() {
    let (service, store, events) = setup();
    let advisor = Uuid::new_v4();
    service.top_up(USER, 5).await.unwrap();
    service.start_paid(USER, advisor, t0()).await.unwrap();

    service
        .stop(USER, advisor, t0() + Duration::seconds(60))
        .await
        .unwrap();
    process_tick(&store, &events, t0() + Duration::seconds(60))
        .await
        .unwrap();
    assert_eq!(store.credits(USER).await, 4);
}

#[tokio::test]
async fn exhausted_paid_session_is_terminated() {
    let (service, store, events) = setup();
    let advisor = Uuid::new_v4();
    service.top_up(USER, 1).await.unwrap();
    service.start_paid(USER, advisor, t0()).await.unwrap();

    process_tick(&store, &events, t0() + Duration::seconds(59))
        .await
        .unwrap();
    assert_eq!(store.credits(USER).await, 1);

    process_tick(&store, &events, t0() + Duration::seconds(60))
        .await
        .unwrap();
    assert_eq!(store.credits(USER).await, 0);

    let snapshot = service
        .status(USER, advisor, t0() + Duration::seconds(61))
        .await
        .unwrap();
    assert_eq!(snapshot.status, SessionStatus::Stopped);
}

#[tokio::test]
async fn free_sweep_counts_down_and_archives() {
    let (service, store, events) = setup();
    let advisor = Uuid::new_v4();
    service.start_free(USER, advisor, t0()).await.unwrap();

    process_tick(&store, &events, t0() + Duration::seconds(30))
        .await
        .unwrap();
    let snapshot = service
        .status(USER, advisor, t0() + Duration::seconds(30))
        .await
        .unwrap();
    assert_eq!(snapshot.status, SessionStatus::Free);
    assert_eq!(snapshot.remaining_free_time, 30);

    process_tick(&store, &events, t0() + Duration::seconds(60))
        .await
        .unwrap();
    let err = service
        .start_free(USER, advisor, t0() + Duration::seconds(61))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FreeSessionUsed));
}

#[tokio::test]
async fn wallet_stays_non_negative_under_long_ticking() {
    let (service, store, events) = setup();
    let advisor = Uuid::new_v4();
    service.top_up(USER, 2).await.unwrap();
    service.start_paid(USER, advisor, t0()).await.unwrap();

    for second in (30..=400).step_by(30) {
        process_tick(&store, &events, t0() + Duration::seconds(second))
            .await
            .unwrap();
        assert!(store.credits(USER).await >= 0);
    }
    assert_eq!(store.credits(USER).await, 0);
}

#[tokio::test]
async fn paid_sweep_broadcasts_every_cycle() {
    let (service, store, events) = setup();
    let advisor = Uuid::new_v4();
    service.top_up(USER, 2).await.unwrap();
    service.start_paid(USER, advisor, t0()).await.unwrap();

    let mut rx = events.subscribe(USER);
    process_tick(&store, &events, t0() + Duration::seconds(1))
        .await
        .unwrap();
    match rx.try_recv().unwrap() {
        SessionEvent::SessionUpdate(update) => {
            assert_eq!(update.paid_timer, 119);
            assert_eq!(update.status, SessionStatus::Paid);
            assert!(!update.show_feedback_modal);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // crossing a minute boundary emits the credits delta first
    process_tick(&store, &events, t0() + Duration::seconds(60))
        .await
        .unwrap();
    match rx.try_recv().unwrap() {
        SessionEvent::CreditsUpdate(update) => assert_eq!(update.credits, 1),
        other => panic!("unexpected event: {:?}", other),
    }
    match rx.try_recv().unwrap() {
        SessionEvent::SessionUpdate(update) => assert_eq!(update.paid_timer, 60),
        other => panic!("unexpected event: {:?}", other),
    }
}
