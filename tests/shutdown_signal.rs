// tests/shutdown_signal.rs

mod common;
use crate::common::with_timeout;

use std::time::Duration;

use gitwatch::Shutdown;

#[tokio::test]
async fn clones_share_the_flag() {
    let shutdown = Shutdown::new();
    let clone = shutdown.clone();
    assert!(!clone.is_triggered());

    shutdown.trigger();
    assert!(clone.is_triggered());
    with_timeout(clone.wait()).await;
}

#[tokio::test]
async fn parent_cancels_child() {
    let parent = Shutdown::new();
    let child = parent.child();
    let grandchild = child.child();

    let waiter = {
        let grandchild = grandchild.clone();
        tokio::spawn(async move { grandchild.wait().await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    parent.trigger();
    with_timeout(waiter).await.unwrap();
    assert!(child.is_triggered());
    assert!(grandchild.is_triggered());
}

#[tokio::test]
async fn child_does_not_cancel_parent() {
    let parent = Shutdown::new();
    let child = parent.child();

    child.trigger();
    child.trigger();
    with_timeout(child.wait()).await;

    assert!(!parent.is_triggered());
    assert!(
        tokio::time::timeout(Duration::from_millis(50), parent.wait())
            .await
            .is_err()
    );
}
