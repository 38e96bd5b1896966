//! Pure, side-effect-free health checks (§4.1). Safe to call concurrently
//! from `/status` — each probe is a short-timeout HTTP/TCP round trip with
//! no shared state.

use std::net::ToSocketAddrs;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;

const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// `GET {health_url}` must return success AND a JSON body with `ok == true`.
pub async fn stt_healthy(health_url: &str) -> bool {
    match client().get(health_url).send().await {
        Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
            Ok(body) => body.get("ok").and_then(Value::as_bool).unwrap_or(false),
            Err(_) => false,
        },
        _ => false,
    }
}

/// TCP connect to `host:port` within the probe timeout.
pub async fn tcp_open(host: &str, port: u16) -> bool {
    let addr = match format!("{host}:{port}")
        .to_socket_addrs()
        .ok()
        .and_then(|mut it| it.next())
    {
        Some(a) => a,
        None => return false,
    };
    matches!(
        timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// TCP connect to `(host, port)` then `GET {voices_url}` must return success
/// with a JSON object containing a `voices` field.
pub async fn tts_healthy(host: &str, port: u16, voices_url: &str) -> bool {
    if !tcp_open(host, port).await {
        return false;
    }
    match client().get(voices_url).send().await {
        Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
            Ok(body) => body.get("voices").is_some(),
            Err(_) => false,
        },
        _ => false,
    }
}

/// `GET {version_url}` must return success with a JSON object containing a
/// `version` field.
pub async fn llm_healthy(version_url: &str) -> bool {
    match client().get(version_url).send().await {
        Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
            Ok(body) => body.get("version").is_some(),
            Err(_) => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn(router: Router) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn stt_probe_requires_ok_true() {
        let router = Router::new().route("/health", get(|| async { Json(json!({"ok": true})) }));
        let (base, handle) = spawn(router).await;
        assert!(stt_healthy(&format!("{base}/health")).await);
        handle.abort();
    }

    #[tokio::test]
    async fn stt_probe_rejects_ok_false() {
        let router = Router::new().route("/health", get(|| async { Json(json!({"ok": false})) }));
        let (base, handle) = spawn(router).await;
        assert!(!stt_healthy(&format!("{base}/health")).await);
        handle.abort();
    }

    #[tokio::test]
    async fn stt_probe_fails_on_connection_refused() {
        assert!(!stt_healthy("http://127.0.0.1:1").await);
    }

    #[tokio::test]
    async fn llm_probe_requires_version_field() {
        let router =
            Router::new().route("/version", get(|| async { Json(json!({"version": "0.1"})) }));
        let (base, handle) = spawn(router).await;
        assert!(llm_healthy(&format!("{base}/version")).await);
        handle.abort();
    }

    #[tokio::test]
    async fn tts_probe_requires_tcp_and_voices_field() {
        let router =
            Router::new().route("/v1/audio/voices", get(|| async { Json(json!({"voices": []})) }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let voices_url = format!("http://{addr}/v1/audio/voices");
        assert!(tts_healthy(&addr.ip().to_string(), addr.port(), &voices_url).await);
        handle.abort();
    }
}
