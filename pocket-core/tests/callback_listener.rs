//! Integration tests for the local callback listener.
//!
//! These tests talk to the listener over real local HTTP connections.

use pocket_core::{CallbackError, CallbackListener};
use std::time::Duration;

#[tokio::test]
async fn test_favicon_request_does_not_signal() {
    let listener = CallbackListener::bind("127.0.0.1").await.unwrap();
    let favicon = format!("{}favicon.ico", listener.redirect_uri());

    let response = reqwest::get(&favicon).await.unwrap();
    assert_eq!(response.status(), 404);

    let result = listener.wait(Some(Duration::from_millis(200))).await;
    assert!(matches!(result, Err(CallbackError::TimedOut(_))));
}

#[tokio::test]
async fn test_callback_hit_signals() {
    let listener = CallbackListener::bind("127.0.0.1").await.unwrap();
    let redirect = listener.redirect_uri();

    let response = reqwest::get(&redirect).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(response.text().await.unwrap(), "Authorized.\n");

    // The signal was sent before anyone waited; it must still be observed.
    listener
        .wait(Some(Duration::from_secs(5)))
        .await
        .expect("callback should have been signalled");
}

#[tokio::test]
async fn test_callback_with_query_and_path_signals() {
    let listener = CallbackListener::bind("127.0.0.1").await.unwrap();
    let redirect = format!("{}done?status=ok", listener.redirect_uri());

    let waiter = tokio::spawn(listener.wait(Some(Duration::from_secs(5))));
    let response = reqwest::get(&redirect).await.unwrap();
    assert_eq!(response.status(), 200);

    waiter.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_hits_signal_once_without_blocking() {
    let listener = CallbackListener::bind("127.0.0.1").await.unwrap();
    let redirect = listener.redirect_uri();

    let hits: Vec<_> = (0..8)
        .map(|_| {
            let redirect = redirect.clone();
            tokio::spawn(async move { reqwest::get(&redirect).await.unwrap().status() })
        })
        .collect();

    for hit in hits {
        assert_eq!(hit.await.unwrap(), 200);
    }

    listener.wait(Some(Duration::from_secs(5))).await.unwrap();
}

#[tokio::test]
async fn test_listener_closed_after_wait() {
    let listener = CallbackListener::bind("127.0.0.1").await.unwrap();
    let redirect = listener.redirect_uri();

    reqwest::get(&redirect).await.unwrap();
    listener.wait(None).await.unwrap();

    // Give the aborted accept loop a moment to release the socket.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = reqwest::get(&redirect).await;
    assert!(result.is_err(), "listener should no longer accept connections");
}

#[tokio::test]
async fn test_listener_closed_on_drop() {
    let listener = CallbackListener::bind("127.0.0.1").await.unwrap();
    let redirect = listener.redirect_uri();
    drop(listener);

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(reqwest::get(&redirect).await.is_err());
}

#[tokio::test]
async fn test_abandoned_wait_closes_listener() {
    let listener = CallbackListener::bind("127.0.0.1").await.unwrap();
    let redirect = listener.redirect_uri();

    // The caller gives up on an unbounded wait, as the CLI does on Ctrl-C.
    let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
    cancel_tx.send(()).unwrap();
    tokio::select! {
        result = listener.wait(None) => panic!("wait should not finish: {:?}", result),
        _ = cancel_rx => {}
    }

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(reqwest::get(&redirect).await.is_err());
}
