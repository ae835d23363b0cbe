//! Shutdown behaviour of the HTTP server under the lifecycle coordinator.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{routing::get, Router};
use catalog_server::http::HttpServer;
use catalog_server::lifecycle::{
    FatalReason, GracefulServer, LifecycleContext, ServerError, ServerState, ShutdownCause,
};
use catalog_server::net::connection::InFlightTracker;
use catalog_server::net::listener;
use tokio::sync::Notify;

mod common;

/// Server with a single `/slow` route that takes `work` to answer.
async fn slow_server(work: Duration) -> (HttpServer, Arc<Notify>) {
    let entered = Arc::new(Notify::new());
    let signal = entered.clone();
    let router = Router::new().route(
        "/slow",
        get(move || {
            let signal = signal.clone();
            async move {
                signal.notify_one();
                tokio::time::sleep(work).await;
                "done"
            }
        }),
    );

    let tcp = listener::bind("127.0.0.1:0").await.unwrap();
    (HttpServer::new(tcp, router, InFlightTracker::new()), entered)
}

fn recorder() -> (Arc<Mutex<Vec<FatalReason>>>, impl Fn(FatalReason) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |reason| sink.lock().unwrap().push(reason))
}

#[tokio::test]
async fn clean_stop_refuses_new_connections() {
    let app = common::spawn_app().await;
    let addr = app.addr;
    let mut states = app.server.subscribe();
    assert_eq!(app.server.state(), ServerState::Running);

    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    app.shutdown().await;
    assert_eq!(*states.borrow_and_update(), ServerState::Stopped);

    let result = common::client()
        .get(format!("http://{addr}/health"))
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn in_flight_request_finishes_during_drain() {
    let (http, entered) = slow_server(Duration::from_millis(300)).await;
    let (fatal, handler) = recorder();
    let ctx = LifecycleContext::new();
    let mut server = GracefulServer::new(http, Duration::from_secs(5)).with_fatal_handler(handler);
    server.start(&ctx).unwrap();
    let url = format!("http://{}/slow", server.local_addr().unwrap());

    let request = tokio::spawn(async move { common::client().get(url).send().await });
    entered.notified().await;

    assert!(ctx.cancel(ShutdownCause::Terminate));
    server.stop().await.unwrap();

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "done");
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(fatal.lock().unwrap().is_empty());
    assert_eq!(ctx.cause(), Some(ShutdownCause::Terminate));
}

#[tokio::test]
async fn drain_overrun_triggers_forced_exit() {
    let (http, entered) = slow_server(Duration::from_secs(1)).await;
    let (fatal, handler) = recorder();
    let ctx = LifecycleContext::new();
    let mut server =
        GracefulServer::new(http, Duration::from_millis(100)).with_fatal_handler(handler);
    let mut states = server.subscribe();
    server.start(&ctx).unwrap();
    let url = format!("http://{}/slow", server.local_addr().unwrap());

    let request = tokio::spawn(async move { common::client().get(url).send().await });
    entered.notified().await;

    ctx.cancel(ShutdownCause::Interrupt);
    tokio::time::timeout(
        Duration::from_secs(2),
        states.wait_for(|s| *s == ServerState::ForcedExit),
    )
    .await
    .unwrap()
    .unwrap();

    {
        let seen = fatal.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], FatalReason::DrainTimedOut(d) if d == Duration::from_millis(100)));
    }

    server.stop().await.unwrap();
    assert_eq!(server.state(), ServerState::ForcedExit);
    let _ = request.await;
    assert_eq!(fatal.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn stop_before_start_and_missing_listener() {
    let (http, _) = slow_server(Duration::ZERO).await;
    let mut server = GracefulServer::new(http, Duration::from_secs(1));
    server.stop().await.unwrap();
    assert_eq!(server.state(), ServerState::Idle);

    let mut empty = GracefulServer::<HttpServer>::new(None, Duration::from_secs(1));
    let err = empty.start(&LifecycleContext::new()).unwrap_err();
    assert!(matches!(err, ServerError::MissingListener));
    assert_eq!(empty.state(), ServerState::Idle);
}
