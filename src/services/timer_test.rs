use super::*;
use tokio::time::timeout;

fn fired(cmd: &Command) -> Option<(&str, u64)> {
    match cmd {
        Command::TimerFired { page_id, generation } => Some((page_id.as_str(), *generation)),
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn timer_fires_after_duration() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut timers = TimerManager::new(tx.downgrade());

    let generation = timers.start("T1", Duration::from_secs(10)).expect("timer should start");
    assert!(timers.is_active("T1"));

    assert!(
        timeout(Duration::from_secs(9), rx.recv()).await.is_err(),
        "timer must not fire early"
    );
    let cmd = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timer should fire")
        .expect("channel open");
    assert_eq!(fired(&cmd), Some(("T1", generation)));
}

#[tokio::test(start_paused = true)]
async fn cancelled_timer_never_fires() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut timers = TimerManager::new(tx.downgrade());

    timers.start("T1", Duration::from_secs(5));
    assert!(timers.cancel("T1"));
    assert!(!timers.is_active("T1"));

    assert!(timeout(Duration::from_secs(30), rx.recv()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn starting_again_replaces_existing_timer() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut timers = TimerManager::new(tx.downgrade());

    let first = timers.start("T1", Duration::from_secs(100)).expect("first");
    let second = timers.start("T1", Duration::from_secs(10)).expect("second");
    assert_ne!(first, second);
    assert_eq!(timers.active_count(), 1);

    let cmd = timeout(Duration::from_secs(20), rx.recv())
        .await
        .expect("replacement should fire")
        .expect("channel open");
    assert_eq!(fired(&cmd), Some(("T1", second)));

    assert!(
        timeout(Duration::from_secs(200), rx.recv()).await.is_err(),
        "replaced timer must not fire"
    );
}

#[tokio::test(start_paused = true)]
async fn claim_rejects_fire_that_raced_a_cancel() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut timers = TimerManager::new(tx.downgrade());

    let stale = timers.start("T1", Duration::from_secs(1)).expect("start");
    let cmd = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("fire")
        .expect("channel open");
    assert_eq!(fired(&cmd), Some(("T1", stale)));

    // The fire is queued; a manual transition cancels before it is handled.
    timers.cancel("T1");
    assert!(!timers.claim("T1", stale));

    // A fresh timer for the same page is not confused with the stale fire.
    let fresh = timers.start("T1", Duration::from_secs(60)).expect("restart");
    assert!(!timers.claim("T1", stale));
    assert!(timers.claim("T1", fresh));
    assert!(!timers.is_active("T1"));
}

#[tokio::test]
async fn zero_duration_starts_nothing() {
    let (tx, _rx) = mpsc::channel(8);
    let mut timers = TimerManager::new(tx.downgrade());

    assert_eq!(timers.start("T0", Duration::ZERO), None);
    assert!(!timers.is_active("T0"));
}

#[tokio::test(start_paused = true)]
async fn cancel_all_clears_every_page() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut timers = TimerManager::new(tx.downgrade());

    timers.start("T1", Duration::from_secs(5));
    timers.start("T2", Duration::from_secs(5));
    assert_eq!(timers.active_count(), 2);

    timers.cancel_all();
    assert_eq!(timers.active_count(), 0);
    assert!(timeout(Duration::from_secs(30), rx.recv()).await.is_err());
}
