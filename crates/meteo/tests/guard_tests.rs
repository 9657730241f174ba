//! Lifecycle guard tests
//!
//! Run with: `cargo test -p meteo --test guard_tests`

use common::test_utils::{DEFAULT_TEST_TIMEOUT, create_mock_sensor_packet, wait_until};
use meteo::usb::{MockConnect, MockRead, MockSession};
use meteo::{Driver, DriverSettings, DriverState, MeteoError, MeteoGuard, StartupSettings};
use std::time::Duration;

fn fast_settings() -> DriverSettings {
    DriverSettings {
        connect_backoff: Duration::from_millis(20),
        connect_settle: Duration::from_millis(20),
        release_delay: Duration::ZERO,
        ..DriverSettings::default()
    }
}

fn startup(timeout: Option<Duration>) -> StartupSettings {
    StartupSettings {
        connect_timeout: timeout,
        poll_interval: Duration::from_millis(10),
    }
}

#[derive(Debug)]
enum TaskError {
    Meteo(MeteoError),
    Failed,
}

impl From<MeteoError> for TaskError {
    fn from(e: MeteoError) -> Self {
        TaskError::Meteo(e)
    }
}

#[test]
fn test_timeout_when_never_connected() {
    let session = MockSession::new();
    let stats = session.stats();
    let driver = Driver::with_session(session, fast_settings());
    let monitor = driver.monitor();

    let err = MeteoGuard::start(driver, &startup(Some(Duration::from_millis(200))))
        .err()
        .unwrap();

    assert!(matches!(err, MeteoError::StartupTimeout(t) if t == Duration::from_millis(200)));
    assert!(!err.is_transport());

    // The guard already raised the flag
    assert!(monitor.stop_requested());
    assert!(!monitor.request_stop());

    wait_until(DEFAULT_TEST_TIMEOUT, || monitor.state() == DriverState::Stopped).unwrap();
    assert_eq!(stats.releases(), 1);
    assert!(stats.connects() >= 1);
}

#[test]
fn test_scoped_run_joins_on_success() {
    let session = MockSession::new()
        .then_connect(MockConnect::Connected)
        .then_read(MockRead::Data(create_mock_sensor_packet("20.1", "1013", "45")))
        .read_delay(Duration::from_millis(5));
    let stats = session.stats();
    let driver = Driver::with_session(session, fast_settings());
    let monitor = driver.monitor();

    let line = driver
        .run_scoped(&startup(Some(DEFAULT_TEST_TIMEOUT)), |driver| {
            wait_until(DEFAULT_TEST_TIMEOUT, || driver.reading().humidity == 45.0)
                .map_err(|_| TaskError::Failed)?;
            Ok::<_, TaskError>(driver.envstr())
        })
        .unwrap();

    assert_eq!(line, "20.1,45,1013");
    // Joined: cleanup is already done
    assert_eq!(monitor.state(), DriverState::Stopped);
    assert_eq!(stats.releases(), 1);
}

#[test]
fn test_scoped_run_propagates_failure() {
    let session = MockSession::new().connect_fallback(MockConnect::Connected);
    let driver = Driver::with_session(session, fast_settings());
    let monitor = driver.monitor();

    let result: Result<(), TaskError> =
        driver.run_scoped(&startup(None), |_| Err(TaskError::Failed));

    assert!(matches!(result, Err(TaskError::Failed)));
    assert!(monitor.stop_requested());
    wait_until(DEFAULT_TEST_TIMEOUT, || monitor.state() == DriverState::Stopped).unwrap();
}

#[test]
fn test_scoped_run_timeout_reaches_caller() {
    let driver = Driver::with_session(MockSession::new(), fast_settings());

    let result: Result<(), TaskError> = driver.run_scoped(
        &startup(Some(Duration::from_millis(50))),
        |_| panic!("closure must not run"),
    );

    assert!(matches!(
        result,
        Err(TaskError::Meteo(MeteoError::StartupTimeout(_)))
    ));
}

#[test]
fn test_panic_in_scope_still_stops_worker() {
    let session = MockSession::new().connect_fallback(MockConnect::Connected);
    let driver = Driver::with_session(session, fast_settings());
    let monitor = driver.monitor();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<(), MeteoError> = driver.run_scoped(&startup(None), |_| panic!("boom"));
    }));

    assert!(outcome.is_err());
    assert!(monitor.stop_requested());
    wait_until(DEFAULT_TEST_TIMEOUT, || monitor.state() == DriverState::Stopped).unwrap();
}
