//! Integration tests for the location coordinator.
//!
//! These tests drive the public API against the simulated sensor and
//! permission provider:
//! - One-shot requests (cache, fresh reading, timeout, exactly-once)
//! - Watches (fan-out, unwatch, stop_observing)
//! - Configuration merging across requests
//! - Permission prompts and fault handling
//!
//! Run with: `cargo test --test coordinator_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use geocoord::clock::ManualClock;
use geocoord::config::Settings;
use geocoord::coordinator::{Coordinator, SessionState};
use geocoord::error::ErrorKind;
use geocoord::options::{MaximumAge, RequestOptions};
use geocoord::permission::{PermissionStatus, SimulatedPermissions};
use geocoord::position::{Position, Provider, ProviderAvailability};
use geocoord::sensor::{SensorFault, SimulatedSensor};
use geocoord::LocationError;

const T0: i64 = 1_700_000_000_000;

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    coordinator: Coordinator,
    sensor: SimulatedSensor,
    permissions: SimulatedPermissions,
    clock: ManualClock,
}

fn create_harness(status: PermissionStatus) -> Harness {
    let sensor = SimulatedSensor::new();
    let permissions = SimulatedPermissions::new(status);
    let clock = ManualClock::new(T0);
    let coordinator = Coordinator::builder(permissions.clone(), sensor.clone())
        .clock(Arc::new(clock.clone()))
        .spawn();
    Harness {
        coordinator,
        sensor,
        permissions,
        clock,
    }
}

fn granted() -> Harness {
    create_harness(PermissionStatus::Granted)
}

/// Let the daemon drain its queues.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn hamburg(timestamp_ms: i64, accuracy: f64) -> Position {
    Position::new(53.63, 9.99, accuracy, timestamp_ms).with_provider(Provider::Gps)
}

fn options_with_filter(meters: f64) -> RequestOptions {
    RequestOptions::builder()
        .distance_filter_m(meters)
        .build()
        .unwrap()
}

// ============================================================================
// One-shot requests
// ============================================================================

#[tokio::test]
async fn test_fresh_reading_resolves_request() {
    let h = granted();
    let request = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .get_current_position(RequestOptions::default())
                .await
        })
    };
    settle().await;
    assert!(h.sensor.is_running());

    h.sensor.push_reading(hamburg(T0, 8.0));
    let position = request.await.unwrap().unwrap();

    assert_eq!(position, hamburg(T0, 8.0));
    settle().await;
    assert!(!h.sensor.is_running(), "session should stop once nobody waits");
    assert_eq!(h.coordinator.last_known_position(), Some(hamburg(T0, 8.0)));
}

#[tokio::test]
async fn test_cached_reading_within_maximum_age() {
    let h = granted();

    // Seed the cache through a short-lived watch.
    let watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;
    h.sensor.push_reading(hamburg(T0, 8.0));
    settle().await;
    drop(watch);
    settle().await;
    let starts = h.sensor.start_count();

    h.clock.advance_ms(4_000);
    let options = RequestOptions::builder()
        .maximum_age(MaximumAge::Within(Duration::from_millis(5_000)))
        .build()
        .unwrap();
    let position = h.coordinator.get_current_position(options).await.unwrap();

    assert_eq!(position.timestamp_ms, T0);
    assert_eq!(h.sensor.start_count(), starts, "cache hit must not start the sensor");
    assert!(!h.sensor.is_running());
}

#[tokio::test]
async fn test_zero_maximum_age_forces_fresh_reading() {
    let h = granted();
    let watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;
    h.sensor.push_reading(hamburg(T0, 8.0));
    settle().await;
    drop(watch);
    settle().await;

    let request = {
        let coordinator = h.coordinator.clone();
        let options = RequestOptions::builder()
            .maximum_age(MaximumAge::ZERO)
            .build()
            .unwrap();
        tokio::spawn(async move { coordinator.get_current_position(options).await })
    };
    settle().await;
    assert!(h.sensor.is_running());

    h.sensor.push_reading(hamburg(T0 + 1_000, 5.0));
    assert_eq!(request.await.unwrap().unwrap().timestamp_ms, T0 + 1_000);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_without_reading() {
    let h = granted();
    let options = RequestOptions::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    let err = h
        .coordinator
        .get_current_position(options)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.code(), 3);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(150));

    settle().await;
    assert!(!h.sensor.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_exactly_once_under_timer_reading_race() {
    let h = granted();
    let outcomes = Arc::new(AtomicUsize::new(0));

    let mut requests = Vec::new();
    for _ in 0..8 {
        let coordinator = h.coordinator.clone();
        let outcomes = Arc::clone(&outcomes);
        requests.push(tokio::spawn(async move {
            let options = RequestOptions::builder()
                .timeout(Duration::from_millis(100))
                .build()
                .unwrap();
            let result = coordinator.get_current_position(options).await;
            outcomes.fetch_add(1, Ordering::SeqCst);
            result
        }));
    }
    settle().await;

    // Land the reading on the same tick the timers expire.
    tokio::time::advance(Duration::from_millis(100)).await;
    h.sensor.push_reading(hamburg(T0, 8.0));
    settle().await;
    h.sensor.push_reading(hamburg(T0 + 10, 8.0));
    tokio::time::sleep(Duration::from_millis(200)).await;

    for request in requests {
        let result = request.await.unwrap();
        match result {
            Ok(position) => assert_eq!(position.timestamp_ms, T0),
            Err(err) => assert_eq!(err.kind(), ErrorKind::Timeout),
        }
    }
    assert_eq!(outcomes.load(Ordering::SeqCst), 8);
    assert_eq!(h.coordinator.status().pending_requests, 0);
}

#[tokio::test]
async fn test_no_provider_fails_request() {
    let h = granted();
    h.sensor.set_availability(ProviderAvailability::NONE);

    let err = h
        .coordinator
        .get_current_position(RequestOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PositionUnavailable);
    assert_eq!(err.message(), "No location provider available");
    assert_eq!(h.sensor.start_count(), 0);
}

#[tokio::test]
async fn test_high_accuracy_falls_back_to_network() {
    let h = granted();
    h.sensor.set_availability(ProviderAvailability {
        gps: false,
        network: true,
    });

    let _watch = h
        .coordinator
        .watch_position(RequestOptions::builder().high_accuracy(true).build().unwrap());
    settle().await;

    let session = h.sensor.current_session().unwrap();
    assert_eq!(session.provider, Provider::Network);
    assert!(session.config.use_high_accuracy);
}

// ============================================================================
// Watches
// ============================================================================

#[tokio::test]
async fn test_watch_receives_every_reading() {
    let h = granted();
    let mut watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;

    for i in 0..3 {
        h.sensor.push_reading(hamburg(T0 + i * 1_000, 8.0));
    }

    for i in 0..3 {
        let position = watch.next().await.unwrap().unwrap();
        assert_eq!(position.timestamp_ms, T0 + i * 1_000);
    }
    assert!(h.sensor.is_running());
}

#[tokio::test]
async fn test_double_unwatch_is_noop() {
    let h = granted();
    let updates = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&updates);

    let token = h.coordinator.watch_position_with(
        move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        },
        None::<fn(LocationError)>,
        RequestOptions::default(),
    );
    settle().await;

    h.coordinator.unwatch(token);
    h.coordinator.unwatch(token);
    settle().await;

    h.sensor.push_reading(hamburg(T0, 8.0));
    settle().await;

    assert_eq!(updates.load(Ordering::SeqCst), 0);
    assert!(!h.sensor.is_running());
    assert_eq!(h.coordinator.status().active_watches, 0);
}

#[tokio::test]
async fn test_unwatch_takes_effect_before_queued_reading() {
    let h = granted();
    let updates = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&updates);

    let token = h.coordinator.watch_position_with(
        move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        },
        None::<fn(LocationError)>,
        RequestOptions::default(),
    );
    settle().await;

    // Reading queued, then unwatch, before the daemon runs again.
    h.sensor.push_reading(hamburg(T0, 8.0));
    h.coordinator.unwatch(token);
    settle().await;

    assert_eq!(updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_observing_keeps_pending_request() {
    let h = granted();
    let _a = h.coordinator.watch_position(RequestOptions::default());
    let _b = h.coordinator.watch_position(RequestOptions::default());
    let request = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .get_current_position(RequestOptions::default())
                .await
        })
    };
    settle().await;

    h.coordinator.stop_observing();
    settle().await;

    let status = h.coordinator.status();
    assert_eq!(status.active_watches, 0);
    assert_eq!(status.pending_requests, 1);
    assert!(h.sensor.is_running());

    h.sensor.push_reading(hamburg(T0, 8.0));
    assert!(request.await.unwrap().is_ok());
}

// ============================================================================
// Configuration merging
// ============================================================================

#[tokio::test]
async fn test_smallest_distance_filter_wins() {
    let h = granted();
    let _watch = h.coordinator.watch_position(options_with_filter(100.0));
    settle().await;
    assert_eq!(
        h.sensor.current_session().unwrap().config.smallest_distance_filter_m,
        100.0
    );

    let request = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .get_current_position(options_with_filter(10.0))
                .await
        })
    };
    settle().await;
    assert_eq!(
        h.sensor.current_session().unwrap().config.smallest_distance_filter_m,
        10.0
    );

    // Once the one-shot is answered the watch's filter applies again.
    h.sensor.push_reading(hamburg(T0, 8.0));
    request.await.unwrap().unwrap();
    settle().await;
    assert_eq!(
        h.sensor.current_session().unwrap().config.smallest_distance_filter_m,
        100.0
    );
}

#[tokio::test]
async fn test_high_accuracy_follows_watches() {
    let h = granted();
    let _coarse = h.coordinator.watch_position(RequestOptions::default());
    let fine = h
        .coordinator
        .watch_position(RequestOptions::builder().high_accuracy(true).build().unwrap());
    settle().await;

    let config = h.coordinator.status().effective_config().unwrap();
    assert!(config.use_high_accuracy);
    assert_eq!(h.sensor.current_session().unwrap().provider, Provider::Gps);

    fine.unsubscribe();
    settle().await;

    let config = h.coordinator.status().effective_config().unwrap();
    assert!(!config.use_high_accuracy);
    assert_eq!(
        h.sensor.current_session().unwrap().provider,
        Provider::Network
    );
}

#[tokio::test]
async fn test_background_setting_reaches_sensor() {
    let h = granted();
    h.coordinator.set_configuration(Settings {
        enable_background_location_updates: true,
        ..Settings::default()
    });

    let _watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;

    assert!(h.sensor.current_session().unwrap().background);
}

// ============================================================================
// Permission
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_permission_requests_share_one_prompt() {
    let h = create_harness(PermissionStatus::Undetermined);
    h.permissions.set_prompt_result(PermissionStatus::Granted);
    h.permissions.set_prompt_delay(Duration::from_millis(300));

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move { coordinator.request_permission().await })
        })
        .collect();

    for caller in callers {
        assert_eq!(caller.await.unwrap(), PermissionStatus::Granted);
    }
    assert_eq!(h.permissions.prompt_count(), 1);
    assert_eq!(h.coordinator.check_permission(), PermissionStatus::Granted);
}

#[tokio::test]
async fn test_determined_permission_returns_without_prompt() {
    let h = create_harness(PermissionStatus::Denied);

    assert_eq!(
        h.coordinator.request_permission().await,
        PermissionStatus::Denied
    );
    assert_eq!(h.permissions.prompt_count(), 0);
}

#[tokio::test]
async fn test_grant_starts_waiting_watch() {
    let h = create_harness(PermissionStatus::Undetermined);
    let mut watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;
    assert!(!h.sensor.is_running());

    h.coordinator.request_permission().await;
    settle().await;
    assert!(h.sensor.is_running());

    h.sensor.push_reading(hamburg(T0, 8.0));
    assert!(watch.next().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_denied_prompt_fails_waiting_requests() {
    let h = create_harness(PermissionStatus::Undetermined);
    h.permissions.set_prompt_result(PermissionStatus::Denied);

    let coordinator = h.coordinator.clone();
    let pending = tokio::spawn(async move {
        let options = RequestOptions::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        coordinator.get_current_position(options).await
    });
    let mut watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;
    assert_eq!(h.coordinator.status().pending_requests, 1);

    assert_eq!(
        h.coordinator.request_permission().await,
        PermissionStatus::Denied
    );

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = watch.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(watch.is_active(), "watch stays registered");

    settle().await;
    assert_eq!(h.sensor.start_count(), 0);
    assert_eq!(h.coordinator.status().pending_requests, 0);
}

#[tokio::test]
async fn test_revocation_stops_session_and_notifies_watch() {
    let h = granted();
    let mut watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;

    h.permissions.set_status(PermissionStatus::Denied);
    h.coordinator.notify_permission_changed();

    let err = watch.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    settle().await;
    assert!(!h.sensor.is_running());
    assert!(watch.is_active(), "watch stays registered");
}

// ============================================================================
// Sensor faults
// ============================================================================

#[tokio::test]
async fn test_transient_fault_is_absorbed() {
    let h = granted();
    let mut watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;

    h.sensor.push_fault(SensorFault::from_cl_error_code(1));
    h.sensor.push_reading(hamburg(T0, 8.0));

    assert!(watch.next().await.unwrap().is_ok());
    assert!(h.sensor.is_running());
}

#[tokio::test]
async fn test_fatal_fault_keeps_watch_registered() {
    let h = granted();
    let mut watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;
    assert_eq!(h.sensor.start_count(), 1);

    h.sensor.push_fault(SensorFault::ProviderDisabled);
    let err = watch.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PositionUnavailable);

    settle().await;
    assert!(!h.sensor.is_running());
    assert_eq!(h.coordinator.status().session, SessionState::Idle);
    assert_eq!(h.coordinator.status().active_watches, 1);

    // A new registration restarts the session and the old watch sees readings again.
    let _other = h.coordinator.watch_position(RequestOptions::default());
    settle().await;
    assert_eq!(h.sensor.start_count(), 2);

    h.sensor.push_reading(hamburg(T0, 8.0));
    assert!(watch.next().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_fatal_fault_rejects_pending_request() {
    let h = granted();
    let request = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .get_current_position(RequestOptions::default())
                .await
        })
    };
    settle().await;

    h.sensor
        .push_fault(SensorFault::from_android_exception("SecurityException", "revoked"));

    let err = request.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_shutdown_ends_watches() {
    let h = granted();
    let mut watch = h.coordinator.watch_position(RequestOptions::default());
    settle().await;

    h.coordinator.shutdown();

    assert!(watch.next().await.is_none());
    settle().await;
    assert!(!h.sensor.is_running());

    let err = h
        .coordinator
        .get_current_position(RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, LocationError::coordinator_stopped());
}
