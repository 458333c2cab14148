//! HTTP control surface for LeadSync.
//!
//! Exposes the manual trigger, scheduler status, ad-hoc email and health
//! endpoints over axum.

pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use leadsync_core::{SyncOrchestrator, SyncScheduler};
use leadsync_shared::{LeadSyncError, Result};

pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub scheduler: Arc<SyncScheduler>,
}

impl AppState {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, scheduler: Arc<SyncScheduler>) -> Self {
        Self {
            orchestrator,
            scheduler,
        }
    }
}

#[tracing::instrument(level = "debug", skip_all)]
pub fn router(state: AppState) -> Router {
    routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the control surface and run the scheduler until `shutdown` fires.
#[tracing::instrument(level = "info", skip_all, fields(%addr))]
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler = tokio::spawn(
        state
            .scheduler
            .clone()
            .run(state.orchestrator.clone(), stop_rx),
    );

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LeadSyncError::config(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(%addr, "control surface listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            let _ = stop_tx.send(true);
        })
        .await
        .map_err(|e| LeadSyncError::Network(format!("server error: {e}")));

    if let Err(e) = scheduler.await {
        tracing::warn!(error = %e, "scheduler task ended abnormally");
    }
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use leadsync_crm::RecordSource;
    use leadsync_mailer::{MailService, Notifier, OutgoingEmail, TemplateCatalog};
    use leadsync_shared::{Lead, ScheduleConfig, SyncConfig};
    use leadsync_storage::LeadStore;
    use serde_json::{Value, json};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct OnePage;

    #[async_trait]
    impl RecordSource for OnePage {
        async fn fetch_page(&self, _page: u32, _per_page: u32) -> Result<Vec<Lead>> {
            Ok(vec![Lead::new("1", "Ada", "ada@example.com", "555", None)])
        }
    }

    #[derive(Default)]
    struct NullStore;

    #[async_trait]
    impl LeadStore for NullStore {
        async fn upsert_lead(&self, _lead: &Lead) -> Result<()> {
            Ok(())
        }
        async fn list_lead_ids(&self) -> Result<HashSet<String>> {
            Ok(HashSet::new())
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Outbox {
        async fn send(&self, email: &OutgoingEmail) -> Result<()> {
            if self.fail {
                return Err(LeadSyncError::Notification("provider down".into()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn state_with(outbox: Arc<Outbox>) -> AppState {
        let mail = Arc::new(MailService::new(TemplateCatalog::builtin(), outbox));
        let config = SyncConfig {
            page_size: 200,
            recipients: vec!["ops@example.com".into()],
            notify_new_leads: false,
            cold_email: Default::default(),
        };
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(OnePage),
            Arc::new(NullStore),
            mail,
            config,
        ));
        let scheduler = Arc::new(SyncScheduler::new(&ScheduleConfig::default()).unwrap());
        AppState::new(orchestrator, scheduler)
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let app = router(state_with(Arc::default()));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["scheduler_running"], false);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn sync_status_lists_daily_job() {
        let app = router(state_with(Arc::default()));
        let resp = app
            .oneshot(Request::builder().uri("/sync-status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["jobs"][0]["id"], "sync_leads_daily");
        assert!(body["jobs"][0]["next_run_time"].is_string());
        assert!(body["current_time"].is_string());
        assert_eq!(body["pass_running"], false);
        assert!(body["last_pass"].is_null());
    }

    #[tokio::test]
    async fn trigger_accepts_then_refuses_overlap() {
        let state = state_with(Arc::default());

        // Hold the gate so the spawned pass cannot start.
        let held = state.orchestrator.try_begin().unwrap();
        let resp = router(state.clone())
            .oneshot(post_json("/sync-leads", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        drop(held);

        let resp = router(state.clone())
            .oneshot(post_json("/sync-leads", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "Lead synchronization started in background");
        assert_eq!(body["pass_running"], true);
    }

    #[tokio::test]
    async fn triggered_pass_report_shows_in_status() {
        let state = state_with(Arc::default());
        let resp = router(state.clone())
            .oneshot(post_json("/sync-leads", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let mut report = None;
        for _ in 0..100 {
            report = state.orchestrator.last_report().await;
            if report.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(report.expect("pass finished").new_leads, 1);
    }

    #[tokio::test]
    async fn send_email_renders_template() {
        let outbox = Arc::new(Outbox::default());
        let app = router(state_with(outbox.clone()));

        let resp = app
            .oneshot(post_json(
                "/send-email",
                json!({
                    "email": "someone@example.com",
                    "subject": "Hello",
                    "template_data": { "message": "testing" }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["message"], "Email sent successfully");
        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent[0].to, "someone@example.com");
        assert_eq!(sent[0].subject, "Hello");
        assert!(sent[0].text.contains("Message: testing"));
    }

    #[tokio::test]
    async fn send_email_delivery_failure_is_bad_gateway() {
        let outbox = Arc::new(Outbox {
            fail: true,
            ..Outbox::default()
        });
        let resp = router(state_with(outbox))
            .oneshot(post_json("/send-email", json!({ "email": "someone@example.com" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn send_email_rejects_bad_address() {
        let resp = router(state_with(Arc::default()))
            .oneshot(post_json("/send-email", json!({ "email": "   " })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
