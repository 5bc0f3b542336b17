use super::*;
use crate::test_helpers::{Fixture, RecordingShell, fixture, logged_in_fixture};

const TIMEOUT: Duration = Duration::from_secs(600);
const MS: Duration = Duration::from_millis(1);

fn install(fx: &Fixture) -> IdleMonitorHandle {
    let shell = Arc::new(RecordingShell::new(fx.journal.clone()));
    IdleMonitor::install(fx.store.clone(), shell, TIMEOUT)
}

fn forced_logout_sequence() -> Vec<String> {
    vec![
        "loading:on".to_owned(),
        "api:logout".to_owned(),
        format!("navigate:{LANDING_ROUTE}"),
        "loading:off".to_owned(),
        format!("alert:{SESSION_EXPIRED_MESSAGE}"),
    ]
}

// =============================================================================
// ActivityEvent
// =============================================================================

#[test]
fn qualifying_events() {
    assert!(ActivityEvent::PointerDown.is_qualifying());
    assert!(ActivityEvent::KeyDown.is_qualifying());
    assert!(ActivityEvent::Scroll.is_qualifying());
    assert!(ActivityEvent::TouchStart.is_qualifying());
    assert!(!ActivityEvent::PointerMove.is_qualifying());
    assert!(!ActivityEvent::Focus.is_qualifying());
}

// =============================================================================
// firing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn single_keydown_fires_exactly_once_at_timeout() {
    let fx = logged_in_fixture();
    let handle = install(&fx);
    assert!(handle.record(ActivityEvent::KeyDown));

    tokio::time::sleep(TIMEOUT - MS).await;
    assert!(fx.journal.entries().is_empty());
    assert!(matches!(handle.state(), IdleState::Armed { .. }));

    tokio::time::sleep(MS * 2).await;
    assert_eq!(fx.journal.entries(), forced_logout_sequence());
    assert_eq!(handle.state(), IdleState::Fired);
    assert!(!fx.store.is_logged_in());

    tokio::time::sleep(TIMEOUT * 3).await;
    assert_eq!(fx.api.logout_count(), 1);
    assert_eq!(fx.journal.count(&format!("alert:{SESSION_EXPIRED_MESSAGE}")), 1);
}

#[tokio::test(start_paused = true)]
async fn mount_alone_arms_the_timer() {
    let fx = logged_in_fixture();
    let _handle = install(&fx);

    tokio::time::sleep(TIMEOUT + MS).await;
    assert_eq!(fx.journal.entries(), forced_logout_sequence());
}

#[tokio::test(start_paused = true)]
async fn activity_rearms_and_cancels_previous_deadline() {
    let fx = logged_in_fixture();
    let handle = install(&fx);

    tokio::time::sleep(Duration::from_secs(540)).await;
    handle.record(ActivityEvent::Scroll);

    // The first deadline at 600s must not fire.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(fx.api.logout_count(), 0);

    // New deadline is 540s + 600s.
    tokio::time::sleep(Duration::from_secs(480) - MS).await;
    assert_eq!(fx.api.logout_count(), 0);
    tokio::time::sleep(MS * 2).await;
    assert_eq!(fx.api.logout_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn rearm_updates_reported_deadline() {
    let fx = logged_in_fixture();
    let handle = install(&fx);

    tokio::time::sleep(Duration::from_secs(60)).await;
    handle.record(ActivityEvent::TouchStart);
    tokio::task::yield_now().await;

    let expected = Instant::now() + TIMEOUT;
    assert_eq!(handle.state(), IdleState::Armed { deadline: expected });
}

#[tokio::test(start_paused = true)]
async fn non_qualifying_events_do_not_extend() {
    let fx = logged_in_fixture();
    let handle = install(&fx);

    for _ in 0..9 {
        tokio::time::sleep(Duration::from_secs(60)).await;
        handle.record(ActivityEvent::PointerMove);
        handle.record(ActivityEvent::Focus);
    }
    tokio::time::sleep(Duration::from_secs(60) + MS).await;
    assert_eq!(fx.api.logout_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn logout_failure_still_navigates_and_notifies() {
    let fx = logged_in_fixture();
    fx.api.set_logout_fails(true);
    let _handle = install(&fx);

    tokio::time::sleep(TIMEOUT + MS).await;
    assert_eq!(fx.journal.entries(), forced_logout_sequence());
    assert!(!fx.store.is_logged_in());
}

#[tokio::test(start_paused = true)]
async fn deadline_without_session_skips_sequence() {
    let fx = fixture();
    let handle = install(&fx);

    tokio::time::sleep(TIMEOUT + MS).await;
    assert_eq!(handle.state(), IdleState::Fired);
    assert!(fx.journal.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn activity_after_fire_rearms_only_when_logged_in() {
    let fx = logged_in_fixture();
    let handle = install(&fx);

    tokio::time::sleep(TIMEOUT + MS).await;
    assert_eq!(handle.state(), IdleState::Fired);

    handle.record(ActivityEvent::KeyDown);
    tokio::task::yield_now().await;
    assert_eq!(handle.state(), IdleState::Fired);

    fx.store.login(crate::test_helpers::valid_session()).unwrap();
    handle.record(ActivityEvent::KeyDown);
    tokio::task::yield_now().await;
    assert!(matches!(handle.state(), IdleState::Armed { .. }));

    tokio::time::sleep(TIMEOUT + MS).await;
    assert_eq!(fx.api.logout_count(), 2);
}

// =============================================================================
// teardown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn steady_activity_then_unmount_never_fires() {
    let fx = logged_in_fixture();
    let handle = install(&fx);
    let listener = handle.listener();

    for _ in 0..12 {
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(listener.record(ActivityEvent::PointerDown));
    }
    handle.dispose();

    tokio::time::sleep(TIMEOUT * 4).await;
    assert!(fx.journal.entries().is_empty());
    assert!(fx.store.is_logged_in());
    assert!(!listener.is_attached());
    assert!(!listener.record(ActivityEvent::KeyDown));
}

#[tokio::test(start_paused = true)]
async fn drop_disables_pending_deadline() {
    let fx = logged_in_fixture();
    let handle = install(&fx);
    let listener = handle.listener();

    tokio::time::sleep(TIMEOUT - MS).await;
    drop(handle);

    tokio::time::sleep(TIMEOUT).await;
    assert_eq!(fx.api.logout_count(), 0);
    assert!(!listener.is_attached());
}

#[tokio::test(start_paused = true)]
async fn listeners_detach_as_soon_as_dispose_returns() {
    let fx = logged_in_fixture();
    let handle = install(&fx);
    let listener = handle.listener();
    assert!(listener.is_attached());

    handle.dispose();
    assert!(!listener.is_attached());
    assert!(!listener.record(ActivityEvent::KeyDown));
}

#[tokio::test(start_paused = true)]
async fn dispose_after_fire_reports_disabled() {
    let fx = logged_in_fixture();
    let handle = install(&fx);
    let state = Arc::clone(&handle.state);

    tokio::time::sleep(TIMEOUT + MS).await;
    assert_eq!(handle.state(), IdleState::Fired);

    handle.dispose();
    assert_eq!(*state.borrow(), IdleState::Disabled);
}
