mod common;

use common::MockLink;
use sense_node::link::{LinkState, LinkWatchdog};

#[test]
fn down_link_is_associated_once_per_interval() {
    let mut watchdog = LinkWatchdog::new(MockLink::default(), 10_000);

    watchdog.poll(0);
    assert_eq!(watchdog.state(), LinkState::Connecting);
    assert_eq!(watchdog.link_mut().associations, 1);

    for now in (100..10_000).step_by(100) {
        watchdog.poll(now);
    }
    assert_eq!(watchdog.link_mut().associations, 1);

    watchdog.poll(10_000);
    assert_eq!(watchdog.link_mut().associations, 2);
}

#[test]
fn association_completes_on_a_later_poll() {
    let link = MockLink {
        up_on_associate: true,
        ..MockLink::default()
    };
    let mut watchdog = LinkWatchdog::new(link, 10_000);

    watchdog.poll(0);
    assert_eq!(watchdog.state(), LinkState::Connecting);
    watchdog.poll(100);
    assert_eq!(watchdog.state(), LinkState::Up);
    assert!(watchdog.is_up());
}

#[test]
fn lost_link_goes_down_and_retries() {
    let mut watchdog = LinkWatchdog::new(MockLink::up(), 10_000);

    watchdog.poll(0);
    assert_eq!(watchdog.state(), LinkState::Up);
    assert_eq!(watchdog.link_mut().associations, 0);

    watchdog.link_mut().up = false;
    watchdog.poll(3_000);
    // Never attempted before, so the retry goes out right away
    assert_eq!(watchdog.state(), LinkState::Connecting);
    assert_eq!(watchdog.link_mut().associations, 1);
}

#[test]
fn rejected_request_stays_down_until_the_next_interval() {
    let link = MockLink {
        reject: true,
        ..MockLink::default()
    };
    let mut watchdog = LinkWatchdog::new(link, 10_000);

    watchdog.poll(0);
    assert_eq!(watchdog.state(), LinkState::Down);
    watchdog.poll(9_999);
    assert_eq!(watchdog.link_mut().associations, 1);

    watchdog.link_mut().reject = false;
    watchdog.poll(10_000);
    assert_eq!(watchdog.state(), LinkState::Connecting);
    assert_eq!(watchdog.link_mut().associations, 2);
}

#[test]
fn boot_attempt_defers_the_first_watchdog_retry() {
    let mut watchdog = LinkWatchdog::new(MockLink::default(), 10_000);

    watchdog.note_attempt(1_000);
    assert_eq!(watchdog.state(), LinkState::Connecting);

    watchdog.poll(5_000);
    assert_eq!(watchdog.link_mut().associations, 0);
    watchdog.poll(11_000);
    assert_eq!(watchdog.link_mut().associations, 1);
}
