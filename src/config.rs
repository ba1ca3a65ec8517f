use once_cell::sync::Lazy;

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// key: metering-config -> free introductory window length
///
/// Seconds of free chat each (user, advisor) pairing gets once. Defaults
/// to 60.
pub static FREE_SESSION_SECS: Lazy<i64> = Lazy::new(|| {
    std::env::var("FREE_SESSION_SECS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(60)
});

/// key: metering-config -> sweep cadence
///
/// Seconds between metering sweeps. Defaults to 1; billing stays correct
/// under a slower cadence because charges catch up from stored timestamps.
pub static TICK_INTERVAL_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("TICK_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(1)
});

/// key: metering-config -> notifier channel capacity
///
/// Buffered events per subscribed user; lagging receivers drop the oldest.
/// Defaults to 16.
pub static EVENT_CHANNEL_CAPACITY: Lazy<usize> = Lazy::new(|| {
    std::env::var("EVENT_CHANNEL_CAPACITY")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|capacity| *capacity > 0)
        .unwrap_or(16)
});
