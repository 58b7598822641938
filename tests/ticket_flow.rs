mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{FakeApi, Rig};
use ticketvisor::{CycleOutcome, FlowState, Task, Ticket, TicketFlow};

fn flow(rig: &Rig) -> Arc<TicketFlow> {
    Arc::new(TicketFlow::new(
        &rig.cfg,
        Arc::clone(&rig.handlers),
        Arc::clone(&rig.scans),
        rig.bus.clone(),
    ))
}

#[tokio::test(start_paused = true)]
async fn test_unscanned_ticket_is_skipped_once_after_deadline() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.set_catalog(&[(1, 40)]);
    rig.api.serve(Ticket::new(7).with_item(1, 1));
    let flow = flow(&rig);

    let start = Instant::now();
    let outcome = flow.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Skipped(7));
    assert!(start.elapsed() >= Duration::from_secs(40));
    assert_eq!(*rig.api.skipped.lock(), vec![7]);
    assert!(rig.api.advanced.lock().is_empty());
    assert_eq!(flow.state(), FlowState::Advance);
}

#[tokio::test(start_paused = true)]
async fn test_matching_scan_advances_and_is_consumed() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.set_catalog(&[(1, 40)]);
    rig.api.serve(Ticket::new(7).with_item(1, 2));
    rig.api.advance_items.lock().insert(1, 3);
    let flow = flow(&rig);

    let task = {
        let flow = Arc::clone(&flow);
        tokio::spawn(async move { flow.run_cycle().await })
    };
    tokio::time::sleep(Duration::from_secs(10)).await;
    rig.scans.record(7);

    let start = Instant::now();
    assert_eq!(task.await.unwrap(), CycleOutcome::Advanced(7));
    assert!(start.elapsed() >= rig.cfg.result_hold);
    assert_eq!(*rig.api.advanced.lock(), vec![7]);
    assert!(rig.api.skipped.lock().is_empty());
    assert_eq!(rig.scans.peek(), None);
    assert_eq!(rig.panel.digits(), [3, 0, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_scan_wins_over_passed_deadline() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    // empty catalog: zero estimate, the deadline is already due
    rig.api.serve(Ticket::new(7).with_item(1, 1));
    rig.scans.record(7);
    let flow = flow(&rig);

    assert_eq!(flow.run_cycle().await, CycleOutcome::Advanced(7));
    assert!(rig.api.skipped.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scan_for_another_ticket_is_left_pending() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.set_catalog(&[(1, 3)]);
    rig.api.serve(Ticket::new(7).with_item(1, 1));
    rig.scans.record(5);
    let flow = flow(&rig);

    assert_eq!(flow.run_cycle().await, CycleOutcome::Skipped(7));
    assert_eq!(rig.scans.peek(), Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_announce_shows_the_estimate() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.set_catalog(&[(1, 40), (2, 25)]);
    rig.api.serve(Ticket::new(7).with_item(1, 3).with_item(2, 2));
    let flow = flow(&rig);

    flow.run_cycle().await;

    let frames = rig.display.frames.lock().clone();
    let ticket = frames.iter().position(|f| f == "007").unwrap();
    assert_eq!(frames[ticket + 1], "003");
}

#[tokio::test(start_paused = true)]
async fn test_empty_queue_defers_next_poll() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    let flow = flow(&rig);

    assert_eq!(flow.run_cycle().await, CycleOutcome::Empty);
    assert!(!rig.handlers.hint().get());
    assert!(!flow.should_poll(Instant::now()));

    tokio::time::advance(rig.cfg.recheck_interval).await;
    assert!(flow.should_poll(Instant::now()));
}

#[tokio::test(start_paused = true)]
async fn test_queue_hint_skips_the_idle_wait() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    let flow = flow(&rig);

    flow.run_cycle().await;
    assert!(!flow.should_poll(Instant::now()));

    rig.handlers.hint().set(true);
    assert!(flow.should_poll(Instant::now()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_counts_as_empty() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.handlers.hint().set(true);
    rig.api
        .fail_current
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let flow = flow(&rig);

    assert_eq!(flow.run_cycle().await, CycleOutcome::Empty);
    assert!(!rig.handlers.hint().get());
    assert_eq!(rig.diagnostics(), vec!["ct:failed:http_fail"]);
}

#[tokio::test(start_paused = true)]
async fn test_closed_admission_abandons_without_touching_hint() {
    let rig = Rig::new(FakeApi::new());
    rig.handlers.hint().set(true);
    let flow = flow(&rig);

    assert_eq!(flow.run_cycle().await, CycleOutcome::Abandoned);
    assert!(rig.handlers.hint().get());
    assert_eq!(rig.api.remote_calls(), 0);
    assert!(flow.should_poll(Instant::now()));
}

#[tokio::test(start_paused = true)]
async fn test_state_changes_are_observable() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.api.serve(Ticket::new(9));
    let flow = flow(&rig);
    let mut states = flow.subscribe_state();

    assert_eq!(*states.borrow_and_update(), FlowState::IdleWait);
    flow.run_cycle().await;
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), FlowState::Advance);
}

#[tokio::test(start_paused = true)]
async fn test_scan_is_kept_while_admission_is_closed() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.set_catalog(&[(1, 40)]);
    rig.api.serve(Ticket::new(7).with_item(1, 1));
    let flow = flow(&rig);

    let task = {
        let flow = Arc::clone(&flow);
        tokio::spawn(async move { flow.run_cycle().await })
    };
    tokio::time::sleep(Duration::from_secs(10)).await;
    rig.connectivity.block_admission();
    rig.scans.record(7);

    assert_eq!(task.await.unwrap(), CycleOutcome::Abandoned);
    assert_eq!(rig.scans.peek(), Some(7));
    assert!(rig.api.advanced.lock().is_empty());
    assert!(rig.api.skipped.lock().is_empty());

    // after reconnecting, the same ticket is polled again and the kept scan advances it
    rig.make_ready().await;
    assert_eq!(flow.run_cycle().await, CycleOutcome::Advanced(7));
    assert!(rig.api.skipped.lock().is_empty());
    assert_eq!(rig.scans.peek(), None);
}

#[tokio::test(start_paused = true)]
async fn test_huge_estimate_is_capped() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.set_catalog(&[(1, u32::MAX)]);
    rig.api.serve(Ticket::new(7).with_item(1, u32::MAX));
    rig.scans.record(7);
    let flow = flow(&rig);

    assert_eq!(flow.run_cycle().await, CycleOutcome::Advanced(7));

    let frames = rig.display.frames.lock().clone();
    let ticket = frames.iter().position(|f| f == "007").unwrap();
    assert_eq!(frames[ticket + 1], "999");
}

#[tokio::test(start_paused = true)]
async fn test_run_returns_to_idle_wait_after_advance() {
    let rig = Rig::new(FakeApi::new());
    rig.make_ready().await;
    rig.set_catalog(&[(1, 5)]);
    rig.api.serve(Ticket::new(7).with_item(1, 1));
    *rig.api.skip_delay.lock() = Duration::from_millis(500);
    let flow = flow(&rig);
    let mut states = flow.subscribe_state();

    let ctx = CancellationToken::new();
    let task = {
        let flow = Arc::clone(&flow);
        let ctx = ctx.clone();
        tokio::spawn(async move { flow.run(ctx).await })
    };

    states.wait_for(|s| *s == FlowState::Advance).await.unwrap();
    states.wait_for(|s| *s == FlowState::IdleWait).await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(*rig.api.skipped.lock(), vec![7]);
    assert_eq!(flow.state(), FlowState::IdleWait);

    ctx.cancel();
    task.await.unwrap().unwrap();
}
