mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use common::{FakeApi, Rig};
use ticketvisor::{ConnectivityLoop, ConnectivityState, DeviceStatus, InboundMessage};

async fn tick(rig: &Rig) {
    rig.connectivity.tick(Instant::now()).await;
}

#[tokio::test(start_paused = true)]
async fn test_never_ready_while_link_down() {
    let rig = Rig::new(FakeApi::new());

    for _ in 0..50 {
        tick(&rig).await;
        assert_eq!(rig.connectivity.state(), ConnectivityState::LinkDown);
        assert!(!rig.connectivity.is_ready_for_calls());
        tokio::time::advance(Duration::from_millis(100)).await;
    }
    assert_eq!(rig.panel.status(), DeviceStatus::LinkError);
    assert_eq!(rig.display.last().as_deref(), Some("W"));
    assert_eq!(rig.session.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_link_attempts_are_paced() {
    let rig = Rig::new(FakeApi::new());

    tick(&rig).await;
    assert_eq!(rig.link.attempts(), 1);

    tokio::time::advance(Duration::from_millis(3400)).await;
    tick(&rig).await;
    assert_eq!(rig.link.attempts(), 1);

    tokio::time::advance(Duration::from_millis(100)).await;
    tick(&rig).await;
    assert_eq!(rig.link.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_broker_failure_blocks_and_retries_on_its_own_timer() {
    let rig = Rig::new(FakeApi::new());
    rig.session.accept_connect.store(false, Ordering::SeqCst);
    rig.link.set_up(true);

    tick(&rig).await;
    assert_eq!(rig.connectivity.state(), ConnectivityState::LinkUpBrokerDown);
    tick(&rig).await;
    assert_eq!(rig.session.connects(), 1);
    assert!(rig.connectivity.is_blocked());
    assert_eq!(rig.panel.status(), DeviceStatus::BrokerError);

    tokio::time::advance(Duration::from_millis(2400)).await;
    tick(&rig).await;
    assert_eq!(rig.session.connects(), 1);

    rig.session.accept_connect.store(true, Ordering::SeqCst);
    tokio::time::advance(Duration::from_millis(100)).await;
    tick(&rig).await;
    assert_eq!(rig.session.connects(), 2);
    assert_eq!(rig.connectivity.state(), ConnectivityState::Ready);
    assert!(rig.connectivity.is_ready_for_calls());
    assert_eq!(rig.panel.status(), DeviceStatus::Normal);
    assert_eq!(
        *rig.session.subscriptions.lock(),
        vec!["bakery/42/bread_time_update".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_timers_are_independent() {
    let rig = Rig::new(FakeApi::new());
    rig.session.accept_connect.store(false, Ordering::SeqCst);

    // link attempt at t=0
    tick(&rig).await;
    assert_eq!(rig.link.attempts(), 1);

    // broker is attempted at once even though the link was just attempted
    rig.link.set_up(true);
    tokio::time::advance(Duration::from_millis(100)).await;
    tick(&rig).await;
    tick(&rig).await;
    assert_eq!(rig.session.connects(), 1);

    // back to LinkDown at t=1.1s: the link timer still runs from t=0
    rig.link.set_up(false);
    tokio::time::advance(Duration::from_secs(1)).await;
    tick(&rig).await;
    assert_eq!(rig.connectivity.state(), ConnectivityState::LinkDown);
    tick(&rig).await;
    assert_eq!(rig.link.attempts(), 1);

    tokio::time::advance(Duration::from_millis(2400)).await;
    tick(&rig).await;
    assert_eq!(rig.link.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_block_leaves_ready_until_broker_reconnect() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    assert_eq!(rig.session.connects(), 1);

    rig.connectivity.block_admission();
    assert_eq!(rig.connectivity.state(), ConnectivityState::LinkUpBrokerDown);
    assert!(!rig.connectivity.is_ready_for_calls());

    // the broker timer still runs from the first connect
    tick(&rig).await;
    assert_eq!(rig.session.connects(), 1);
    assert!(rig.connectivity.is_blocked());

    tokio::time::advance(rig.cfg.broker_retry_interval).await;
    tick(&rig).await;
    assert_eq!(rig.session.connects(), 2);
    assert_eq!(rig.connectivity.state(), ConnectivityState::Ready);
    assert!(rig.connectivity.is_ready_for_calls());
}

#[tokio::test(start_paused = true)]
async fn test_ready_is_never_reported_while_blocked() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.session.accept_connect.store(false, Ordering::SeqCst);
    rig.connectivity.block_admission();

    for _ in 0..100 {
        tick(&rig).await;
        assert_ne!(rig.connectivity.state(), ConnectivityState::Ready);
        tokio::time::advance(Duration::from_millis(100)).await;
    }
    // failed reconnects at 2.5s, 5s and 7.5s
    assert_eq!(rig.session.connects(), 1 + 3);
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_in_ready_blocks_admission() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;

    rig.link.set_up(false);
    tick(&rig).await;
    assert_eq!(rig.connectivity.state(), ConnectivityState::LinkDown);
    assert!(rig.connectivity.is_blocked());
    assert_eq!(rig.display.last().as_deref(), Some("W"));
}

#[tokio::test(start_paused = true)]
async fn test_ready_returns_inbound_messages() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.session.push_inbound("bakery/42/bread_time_update", "{}");

    let msgs = rig.connectivity.tick(Instant::now()).await;
    assert_eq!(msgs.len(), 1);
    assert!(rig.connectivity.tick(Instant::now()).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_control_topic_triggers_catalog_refresh() {
    let rig = Rig::new(FakeApi::with_catalog(&[(1, 40), (2, 25)]));
    rig.make_ready().await;
    let driver = ConnectivityLoop::new(
        &rig.cfg,
        Arc::clone(&rig.connectivity),
        Arc::clone(&rig.handlers),
    );

    let other = InboundMessage {
        topic: "bakery/42/other".into(),
        payload: String::new(),
    };
    assert!(!driver.dispatch(&other));

    let control = InboundMessage {
        topic: "bakery/42/bread_time_update".into(),
        payload: String::new(),
    };
    assert!(driver.dispatch(&control));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(rig.api.fetch_count(), 1);
    assert_eq!(rig.handlers.catalog().snapshot().len(), 2);
}
