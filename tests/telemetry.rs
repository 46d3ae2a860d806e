mod common;

use common::{Lcg, MockDialer};
use embassy_futures::block_on;
use sense_node::NetError;
use sense_node::telemetry::{Readiness, Reading, ReconnectingSocket};

const RETRY_MS: u32 = 5_000;

fn socket(dialer: MockDialer) -> ReconnectingSocket<MockDialer> {
    ReconnectingSocket::new(dialer, RETRY_MS, 200, 30_000)
}

#[test]
fn first_ensure_dials_and_configures_the_session() {
    let mut data = socket(MockDialer::default());

    assert_eq!(block_on(data.ensure(0)), Readiness::Connected);
    assert!(data.is_connected());
    assert_eq!(data.dialer().connects, 1);
    assert_eq!(data.dialer().keep_alive_ms, Some(30_000));
    assert!(data.dialer().nonblocking);

    // Already connected: no second dial
    assert_eq!(block_on(data.ensure(10)), Readiness::Connected);
    assert_eq!(data.dialer().connects, 1);
}

#[test]
fn failed_dial_waits_for_the_cooldown() {
    let mut data = socket(MockDialer::failing(2, NetError::Refused));

    assert_eq!(block_on(data.ensure(1_000)), Readiness::Failed(NetError::Refused));
    assert_eq!(data.dialer().closes, 1);
    assert_eq!(block_on(data.ensure(1_001)), Readiness::CoolingDown);
    assert_eq!(block_on(data.ensure(5_999)), Readiness::CoolingDown);
    assert_eq!(data.dialer().connects, 1);

    assert_eq!(block_on(data.ensure(6_000)), Readiness::Failed(NetError::Refused));
    assert_eq!(block_on(data.ensure(11_000)), Readiness::Connected);
    assert_eq!(data.dialer().connects, 3);
}

#[test]
fn dial_attempts_are_spaced_whatever_the_outcome() {
    let mut rng = Lcg(2024);
    let mut dialer = MockDialer::default();
    dialer.connect_results = (0..400)
        .map(|_| {
            if rng.below(3) == 0 {
                Ok(())
            } else {
                Err(NetError::TimedOut)
            }
        })
        .collect();
    let mut data = socket(dialer);

    let mut now: u32 = 0;
    let mut last_dial: Option<u32> = None;
    let mut dials = 0;

    for _ in 0..2_000 {
        now = now.wrapping_add(rng.below(1_500));
        let before = data.dialer().connects;
        block_on(data.ensure(now));

        if data.dialer().connects > before {
            if let Some(last) = last_dial {
                assert!(
                    now.wrapping_sub(last) >= RETRY_MS,
                    "dialed at {} and {}",
                    last,
                    now
                );
            }
            last_dial = Some(now);
            dials += 1;
        }

        // Knock established sessions down now and then
        if data.is_connected() && rng.below(4) == 0 {
            data.dialer_mut().send_error = Some(NetError::Reset);
            data.send_line(now, "distance: 1");
            data.dialer_mut().send_error = None;
        }
    }

    assert!(dials > 10);
}

#[test]
fn send_failure_clears_the_handle_and_restarts_the_cooldown() {
    let mut data = socket(MockDialer::default());
    assert_eq!(block_on(data.ensure(0)), Readiness::Connected);

    data.dialer_mut().send_error = Some(NetError::Reset);
    assert!(!data.send_line(7_000, "distance: 250"));
    assert!(!data.is_connected());
    assert_eq!(data.session(), None);
    assert_eq!(data.dialer().closes, 1);

    data.dialer_mut().send_error = None;
    assert_eq!(block_on(data.ensure(7_001)), Readiness::CoolingDown);
    assert_eq!(block_on(data.ensure(11_999)), Readiness::CoolingDown);
    assert_eq!(data.dialer().connects, 1);

    assert_eq!(block_on(data.ensure(12_000)), Readiness::Connected);
    assert_eq!(data.dialer().connects, 2);
}

#[test]
fn lines_without_a_session_are_dropped() {
    let mut data = socket(MockDialer::failing(1, NetError::Unreachable));
    block_on(data.ensure(0));

    assert!(!data.send_line(10, "distance: 1"));
    assert!(!data.send_reading(10, Reading::Alert(true)));
    assert!(data.dialer().sent.is_empty());
    assert_eq!(data.last_attempt_ms(), Some(0));
}

#[test]
fn readings_are_newline_terminated() {
    let mut data = socket(MockDialer::default());
    block_on(data.ensure(0));

    assert!(data.send_reading(1, Reading::Distance(812)));
    assert!(data.send_reading(2, Reading::Alert(false)));
    assert_eq!(data.dialer().sent, ["distance: 812\n", "alert: 0\n"]);
    assert_eq!(data.session().map(|s| s.lines_sent), Some(2));
}

#[test]
fn oversized_line_is_rejected_without_dropping_the_session() {
    let mut data = socket(MockDialer::default());
    block_on(data.ensure(0));

    let long = "x".repeat(200);
    assert!(!data.send_line(1, &long));
    assert!(data.is_connected());
    assert!(data.dialer().sent.is_empty());
}
