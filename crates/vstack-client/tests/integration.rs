//! End-to-end exercise of the client shim against a real `Supervisor` and
//! `vstack_bridge` router, with fake STT/TTS/LLM servers standing in for
//! the actual auxiliary processes (§6d: "exercise the full stack without
//! shelling out to real model servers").

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use vstack_core::config::Config;
use vstack_supervisor::Supervisor;

async fn spawn_fake(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

async fn spawn_daemon(config: Config) -> String {
    let supervisor = Arc::new(Supervisor::new(config));
    let router = vstack_bridge::build_router(supervisor);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

async fn fake_stt() -> String {
    let router = Router::new().route("/health", get(|| async { Json(json!({"ok": true})) }));
    spawn_fake(router).await
}

async fn fake_tts() -> String {
    let router = Router::new().route(
        "/v1/audio/voices",
        get(|| async { Json(json!({"voices": ["default"]})) }),
    );
    spawn_fake(router).await
}

async fn fake_llm() -> String {
    let router = Router::new()
        .route("/version", get(|| async { Json(json!({"version": "0.1.0"})) }))
        .route(
            "/generate",
            post(|| async { Json(json!({"response": "ok", "done": true})) }),
        );
    spawn_fake(router).await
}

async fn test_config() -> Config {
    let mut config = Config::default();
    config.stt.health_url = format!("{}/health", fake_stt().await);

    let tts_base = fake_tts().await;
    config.tts.base_url = tts_base.clone();
    config.tts.voices_url = Some(format!("{tts_base}/v1/audio/voices"));

    let llm_base = fake_llm().await;
    config.llm.api_base = llm_base.clone();
    config.llm.version_url = Some(format!("{llm_base}/version"));
    config.llm.generate_url = Some(format!("{llm_base}/generate"));
    config.llm.manage_server = false;

    config.timers.heartbeat_s = 1;
    config.timers.lease_ttl_s = 5;
    config.timers.status_poll_timeout_s = 5;

    let tmp = std::env::temp_dir().join(format!("vstack-client-it-{}", std::process::id()));
    config.log.dir = tmp.to_string_lossy().to_string();
    config
}

#[tokio::test]
async fn acquire_ensure_release_round_trip_against_real_daemon() {
    let config = test_config().await;
    let base_url = spawn_daemon(config.clone()).await;

    let (host, port) = {
        let url = reqwest::Url::parse(&base_url).unwrap();
        (
            url.host_str().unwrap().to_string(),
            url.port().unwrap(),
        )
    };
    let mut client_config = config.clone();
    client_config.daemon.host = host;
    client_config.daemon.port = port;

    let client = vstack_client::Client::new(&client_config);
    let lease = client
        .acquire(json!({"client": "integration-test"}))
        .await
        .expect("acquire");
    assert!(lease.lease_id().starts_with("lease_"));

    lease.ensure(None).await.expect("ensure without warm");

    lease.release().await.expect("release");
}

#[tokio::test]
async fn ensure_with_model_waits_for_warm_done() {
    let config = test_config().await;
    let base_url = spawn_daemon(config.clone()).await;
    let url = reqwest::Url::parse(&base_url).unwrap();

    let mut client_config = config.clone();
    client_config.daemon.host = url.host_str().unwrap().to_string();
    client_config.daemon.port = url.port().unwrap();

    let client = vstack_client::Client::new(&client_config);
    let lease = client.acquire(json!({})).await.expect("acquire");

    lease
        .ensure(Some("llama3".to_string()))
        .await
        .expect("ensure with warm");

    lease.release().await.expect("release");
}
