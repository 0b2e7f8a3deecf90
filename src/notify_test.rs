use super::*;
use tokio::sync::broadcast::error::TryRecvError;

const TTL: Duration = Duration::from_millis(3000);

fn drain(rx: &mut broadcast::Receiver<NotificationEvent>) -> Vec<NotificationEvent> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return out,
            Err(TryRecvError::Lagged(n)) => panic!("lagged by {n}"),
        }
    }
}

async fn advance(by: Duration) {
    tokio::time::sleep(by).await;
    tokio::task::yield_now().await;
}

// =============================================================
// ordering
// =============================================================

#[tokio::test(start_paused = true)]
async fn list_preserves_insertion_order() {
    let center = NotificationCenter::new(TTL);
    center.info("first");
    center.warning("second");
    center.success("third");

    let messages: Vec<String> = center.list().into_iter().map(|n| n.message).collect();
    assert_eq!(messages, vec!["first", "second", "third"]);
    assert_eq!(center.list()[1].kind, NotificationKind::Warning);
}

// =============================================================
// auto-dismiss
// =============================================================

#[tokio::test(start_paused = true)]
async fn notification_expires_after_ttl() {
    let center = NotificationCenter::new(TTL);
    let mut rx = center.subscribe();
    let id = center.info("saved");

    advance(TTL - Duration::from_millis(1)).await;
    assert_eq!(center.len(), 1);

    advance(Duration::from_millis(2)).await;
    assert!(center.is_empty());

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], NotificationEvent::Dismissed { id, reason: DismissReason::Expired });
}

#[tokio::test(start_paused = true)]
async fn early_dismiss_cancels_timer() {
    let center = NotificationCenter::new(TTL);
    let mut rx = center.subscribe();
    let id = center.error("boom");

    advance(Duration::from_millis(100)).await;
    assert!(center.dismiss(id));
    assert!(!center.dismiss(id), "second dismissal must be a no-op");

    advance(TTL * 2).await;
    let events = drain(&mut rx);
    let dismissals: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, NotificationEvent::Dismissed { .. }))
        .collect();
    assert_eq!(dismissals, vec![&NotificationEvent::Dismissed { id, reason: DismissReason::Manual }]);
}

#[tokio::test(start_paused = true)]
async fn dismissing_one_leaves_others_on_their_timers() {
    let center = NotificationCenter::new(TTL);
    let a = center.info("a");
    advance(Duration::from_millis(1000)).await;
    let b = center.info("b");

    assert!(center.dismiss(a));
    advance(Duration::from_millis(2500)).await;
    assert_eq!(center.list().into_iter().map(|n| n.id).collect::<Vec<_>>(), vec![b]);

    advance(Duration::from_millis(600)).await;
    assert!(center.is_empty());
}

#[tokio::test(start_paused = true)]
async fn sticky_notification_stays_until_dismissed() {
    let center = NotificationCenter::new(TTL);
    let id = center.push_with(NotificationKind::Warning, "offline", None);

    advance(TTL * 10).await;
    assert_eq!(center.len(), 1);
    assert!(center.dismiss(id));
}

#[tokio::test(start_paused = true)]
async fn clear_removes_everything_and_stops_timers() {
    let center = NotificationCenter::new(TTL);
    let mut rx = center.subscribe();
    center.info("a");
    center.info("b");

    center.clear();
    assert!(center.is_empty());

    advance(TTL * 2).await;
    let reasons: Vec<DismissReason> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            NotificationEvent::Dismissed { reason, .. } => Some(reason),
            NotificationEvent::Shown(_) => None,
        })
        .collect();
    assert_eq!(reasons, vec![DismissReason::Cleared, DismissReason::Cleared]);
}

#[test]
fn without_runtime_notifications_are_kept() {
    let center = NotificationCenter::new(TTL);
    let id = center.info("no runtime");
    assert_eq!(center.len(), 1);
    assert!(center.dismiss(id));
}

// =============================================================
// errors
// =============================================================

#[tokio::test(start_paused = true)]
async fn error_from_uses_user_message() {
    let center = NotificationCenter::new(TTL);
    let err = crate::session::SessionError::NotAuthenticated;
    center.error_from(&err);

    let shown = center.list();
    assert_eq!(shown[0].kind, NotificationKind::Error);
    assert_eq!(shown[0].message, "Please sign in to continue.");
}
