//! HTTP surface of the automation service.
//!
//! - `POST /webhook` - HMAC-verified ingress; answers 202 and detaches
//! - `GET  /` - liveness
//! - `GET  /api/history[...]` - dashboard read API
//! - `GET  /api/metrics`, `GET /api/trigger-config`
//! - `POST /api/manual-run`, `POST /api/runs/{run_id}/retry`
//!
//! `start()` wires configuration, the session store, the host client, the
//! LLM gateway, and the orchestrator together, then serves until shutdown.

pub mod core;
pub mod error_handler;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
};
use tracing::info;

use automation::Orchestrator;
use host_client::{HostClient, HostClientConfig, retry::RetryPolicy};
use llm_gateway::LlmGateway;
use session_store::{SessionStore, StoreConfig};

use crate::core::app_state::AppState;
use crate::core::config::AppConfig;
pub use crate::error_handler::{AppError, AppResult};

/// Builds the full application state from configuration.
async fn build_state(config: AppConfig) -> Result<AppState, AppError> {
    let store = Arc::new(
        SessionStore::open(StoreConfig::new(&config.session_file))
            .await
            .map_err(AppError::StoreInit)?,
    );

    let host = Arc::new(
        HostClient::new(HostClientConfig {
            base_api: config.host_api_base.clone(),
            repo: config.host_repo.clone(),
            token: config.host_api_token.clone(),
            retry: RetryPolicy::default(),
        })
        .map_err(AppError::HostSetup)?,
    );

    let gateway = Arc::new(LlmGateway::from_env().map_err(AppError::GatewaySetup)?);

    let orchestrator = Arc::new(Orchestrator::new(
        host,
        gateway,
        Arc::clone(&store),
        config.automation.clone(),
    ));

    Ok(AppState {
        config: Arc::new(config),
        store,
        orchestrator,
        started_at: Instant::now(),
    })
}

/// Routes + state → the service router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::health_route::health))
        .route("/webhook", post(routes::webhook::webhook_route::webhook))
        .route("/api/history", get(routes::history::history_route::history))
        .route(
            "/api/history/pr/{pr_number}",
            get(routes::history::history_route::history_by_pr),
        )
        .route(
            "/api/history/skipped",
            get(routes::history::history_route::history_skipped),
        )
        .route("/api/metrics", get(routes::metrics::metrics_route::metrics))
        .route(
            "/api/trigger-config",
            get(routes::metrics::trigger_config_route::trigger_config),
        )
        .route(
            "/api/manual-run",
            post(routes::manual::manual_run_route::manual_run),
        )
        .route(
            "/api/runs/{run_id}/retry",
            post(routes::manual::retry_route::retry_run),
        )
        .with_state(state)
}

/// Loads config, opens the store, and serves until shutdown.
///
/// # Errors
/// [`AppError`] variants map to process exit codes: configuration → 1,
/// bind → 2, store rehydrate → 3.
pub async fn start() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let addr = format!("{}:{}", config.host, config.port);
    let state = build_state(config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(AppError::Bind)?;
    info!(%addr, "automation service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use llm_gateway::{LlmModelConfig, LlmProvider};
    use session_store::{PendingRun, RunType};
    use tower::util::ServiceExt;

    use crate::routes::webhook::signature::sign;

    const SECRET: &str = "test-webhook-secret";

    /// State wired against a scratch store and unroutable endpoints, so
    /// accepted runs fail fast in the background without touching the
    /// network.
    async fn test_state(dir: &tempfile::TempDir) -> AppState {
        let store = Arc::new(
            SessionStore::open(StoreConfig::new(dir.path().join("sessions.json")))
                .await
                .unwrap(),
        );
        let host = Arc::new(
            HostClient::new(HostClientConfig {
                base_api: "http://127.0.0.1:9".to_string(),
                repo: "acme/widgets".to_string(),
                token: "test-token".to_string(),
                retry: RetryPolicy {
                    max_attempts: 1,
                    ..RetryPolicy::default()
                },
            })
            .unwrap(),
        );
        let gateway = Arc::new(
            LlmGateway::new(LlmModelConfig {
                provider: LlmProvider::OpenAi,
                model: "gpt-4o-mini".to_string(),
                endpoint: "http://127.0.0.1:9".to_string(),
                api_key: Some("test-key".to_string()),
                max_tokens: None,
                temperature: None,
                timeout_secs: Some(1),
                max_requests_per_minute: 60,
                min_delay_seconds: 0.0,
            })
            .unwrap(),
        );

        let mut config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            webhook_secret: SECRET.to_string(),
            host_api_base: "http://127.0.0.1:9".to_string(),
            host_api_token: "test-token".to_string(),
            host_repo: "acme/widgets".to_string(),
            session_file: dir.path().join("sessions.json"),
            automation: automation::AutomationSettings::default(),
        };
        config.automation.dedup_window = std::time::Duration::from_secs(600);

        let orchestrator = Arc::new(Orchestrator::new(
            host,
            gateway,
            Arc::clone(&store),
            config.automation.clone(),
        ));
        AppState {
            config: Arc::new(config),
            store,
            orchestrator,
            started_at: Instant::now(),
        }
    }

    fn push_body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "ref": "refs/heads/main",
            "after": "abcdef0123456789abcdef0123456789abcdef01",
            "deleted": false
        }))
        .unwrap()
    }

    fn webhook_request(event: &str, body: Vec<u8>, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-github-event", event);
        if let Some(sig) = signature {
            builder = builder.header("x-hub-signature-256", sig);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);

        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn webhook_without_signature_is_403_and_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let app = build_router(state.clone());

        let resp = app
            .oneshot(webhook_request("push", push_body(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(state.store.list_runs(10, None).await.is_empty());
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_403() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let app = build_router(state.clone());

        let resp = app
            .oneshot(webhook_request(
                "push",
                push_body(),
                Some("sha256=deadbeef".to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(state.store.list_runs(10, None).await.is_empty());
    }

    #[tokio::test]
    async fn webhook_unknown_event_kind_is_204() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let app = build_router(state.clone());

        let body = br#"{"zen":"Design for failure."}"#.to_vec();
        let sig = sign(SECRET, &body);
        let resp = app
            .oneshot(webhook_request("ping", body, Some(sig)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(state.store.list_runs(10, None).await.is_empty());
    }

    #[tokio::test]
    async fn webhook_valid_push_is_202_and_creates_exactly_one_run() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let app = build_router(state.clone());

        let body = push_body();
        let sig = sign(SECRET, &body);
        let resp = app
            .oneshot(webhook_request("push", body, Some(sig)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "accepted");
        let run_id = json["run_id"].as_str().unwrap().to_string();

        let run = state.store.get_run(&run_id).await.unwrap();
        assert_eq!(run.commit_sha, "abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(state.store.list_runs(10, None).await.len(), 1);
    }

    #[tokio::test]
    async fn webhook_redelivery_reuses_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let body = push_body();
        let sig = sign(SECRET, &body);

        let first = build_router(state.clone())
            .oneshot(webhook_request("push", body.clone(), Some(sig.clone())))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        let first_id = {
            let b = to_bytes(first.into_body(), usize::MAX).await.unwrap();
            serde_json::from_slice::<serde_json::Value>(&b).unwrap()["run_id"]
                .as_str()
                .unwrap()
                .to_string()
        };

        // The first run is still pending/running (its background work is
        // failing against an unroutable host), so redelivery must dedup.
        let second = build_router(state.clone())
            .oneshot(webhook_request("push", body, Some(sig)))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::ACCEPTED);
        let second_id = {
            let b = to_bytes(second.into_body(), usize::MAX).await.unwrap();
            serde_json::from_slice::<serde_json::Value>(&b).unwrap()["run_id"]
                .as_str()
                .unwrap()
                .to_string()
        };

        if second_id == first_id {
            assert_eq!(state.store.list_runs(10, None).await.len(), 1);
        } else {
            // The first run reached a terminal failure before redelivery;
            // a fresh run is the correct behavior then.
            assert_eq!(state.store.list_runs(10, None).await.len(), 2);
        }
    }

    #[tokio::test]
    async fn webhook_branch_deletion_is_204() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let app = build_router(state.clone());

        let body = serde_json::to_vec(&serde_json::json!({
            "ref": "refs/heads/gone",
            "after": "0000000000000000000000000000000000000000",
            "deleted": true
        }))
        .unwrap();
        let sig = sign(SECRET, &body);
        let resp = app
            .oneshot(webhook_request("push", body, Some(sig)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn history_endpoints_return_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        for uri in ["/api/history", "/api/history/pr/67", "/api/history/skipped"] {
            let resp = build_router(state.clone())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
            let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert!(json.is_array(), "{uri}");
        }
    }

    #[tokio::test]
    async fn metrics_and_trigger_config_render() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let resp = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["runs_total"], 0);

        let resp = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/trigger-config")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["trigger_mode"], "both");
        assert_eq!(json["trivial_max_lines"], 10);
    }

    #[tokio::test]
    async fn manual_run_with_commit_sha_is_202() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let app = build_router(state.clone());

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/manual-run")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"commit_sha":"1234567890abcdef","branch":"main"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(state.store.list_runs(10, None).await.len(), 1);
    }

    #[tokio::test]
    async fn retry_unknown_run_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/runs/nope-123/retry")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn retry_non_terminal_run_is_409() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let run_id = state
            .store
            .create_pending(PendingRun {
                commit_sha: "feedface00000000".to_string(),
                branch: "main".to_string(),
                pr_number: None,
                dedup_key: None,
            })
            .await
            .unwrap();

        let resp = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(&format!("/api/runs/{run_id}/retry"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn retry_terminal_run_creates_a_new_run() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let run_id = state
            .store
            .create_pending(PendingRun {
                commit_sha: "feedface00000000".to_string(),
                branch: "main".to_string(),
                pr_number: None,
                dedup_key: None,
            })
            .await
            .unwrap();
        state
            .store
            .skip_run(&run_id, "Empty diff", RunType::SkippedTrivialChange)
            .await
            .unwrap();

        let resp = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(&format!("/api/runs/{run_id}/retry"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_ne!(json["run_id"].as_str().unwrap(), run_id);
        assert_eq!(state.store.list_runs(10, None).await.len(), 2);
    }
}
