pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis API
        .route(
            "/api/v1/analysis",
            get(handlers::handle_get_session)
                .post(handlers::handle_analyze)
                .delete(handlers::handle_reset),
        )
        .route("/api/v1/analysis/stage", get(handlers::handle_get_stage))
        .route(
            "/api/v1/analysis/selection",
            post(handlers::handle_selection),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::analysis::orchestrator::AnalysisOrchestrator;
    use crate::llm_client::{GatewayError, ModelGateway};
    use crate::storage::MemoryStore;

    struct CannedGateway {
        replies: Mutex<VecDeque<&'static str>>,
    }

    #[async_trait]
    impl ModelGateway for CannedGateway {
        async fn complete(&self, _prompt: &str) -> Result<String, GatewayError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .map(String::from)
                .ok_or_else(|| GatewayError::MalformedResponse("no canned reply".to_string()))
        }
    }

    const SKILLS: &str = r#"{"keySkills": [{"name": "Python", "importance": "required"}]}"#;
    const SEARCHES: &str = r#"{"booleanSearches": {"broad": {"searchString": "Python"}, "mid": {"searchString": "Python AND AWS"}, "narrow": {"searchString": "Python AND AWS AND Docker"}}}"#;

    fn app(replies: Vec<&'static str>) -> Router {
        let gateway = Arc::new(CannedGateway {
            replies: Mutex::new(replies.into()),
        });
        let orchestrator = AnalysisOrchestrator::new(gateway, Arc::new(MemoryStore::new()));
        build_router(AppState {
            orchestrator: Arc::new(orchestrator),
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(vec![]), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_analyze_returns_result_and_updates_session() {
        let app = app(vec![SKILLS, SEARCHES]);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/analysis",
            Some(json!({"jobDescription": "Senior Python Developer, 5+ years, AWS, Docker"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["skills"][0]["name"], "Python");
        assert_eq!(body["skills"][0]["importance"], "required");
        assert_eq!(body["skills"][0]["alternatives"], json!([]));
        assert_eq!(body["booleanSearches"]["narrow"]["searchString"], "Python AND AWS AND Docker");

        let (status, session) = send(&app, Method::GET, "/api/v1/analysis", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["stage"], "complete");
        assert_eq!(
            session["jobDescription"],
            "Senior Python Developer, 5+ years, AWS, Docker"
        );
        assert_eq!(session["result"]["runId"], body["runId"]);
    }

    #[tokio::test]
    async fn test_empty_job_description_is_bad_request() {
        let app = app(vec![]);
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/analysis",
            Some(json!({"jobDescription": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (_, stage) = send(&app, Method::GET, "/api/v1/analysis/stage", None).await;
        assert_eq!(stage, json!({"stage": "idle"}));
    }

    #[tokio::test]
    async fn test_failed_run_reports_generic_error_and_failed_stage() {
        let app = app(vec!["Sorry, I cannot help with that."]);
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/analysis",
            Some(json!({"jobDescription": "Barista"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "ANALYSIS_FAILED");

        let (_, session) = send(&app, Method::GET, "/api/v1/analysis", None).await;
        assert_eq!(session["stage"], "failed");
        assert_eq!(session["result"], Value::Null);
    }

    #[tokio::test]
    async fn test_selection_then_reset() {
        let app = app(vec![]);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/analysis/selection",
            Some(json!({"text": "Platform Engineer — Kubernetes, Terraform"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, session) = send(&app, Method::GET, "/api/v1/analysis", None).await;
        assert_eq!(
            session["jobDescription"],
            "Platform Engineer — Kubernetes, Terraform"
        );

        let (status, _) = send(&app, Method::DELETE, "/api/v1/analysis", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, session) = send(&app, Method::GET, "/api/v1/analysis", None).await;
        assert_eq!(session["jobDescription"], Value::Null);
        assert_eq!(session["stage"], "idle");
    }
}
