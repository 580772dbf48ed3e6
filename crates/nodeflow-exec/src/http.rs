use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tracing::debug;

use nodeflow_core::config::OrchestratorConfig;
use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::OrchestratorApi;
use nodeflow_core::types::{
    Checkpoint, ExecutionContext, ExecutionId, StatusSnapshot, SubmitResponse,
};

/// Orchestrator client over its REST API.
pub struct HttpOrchestrator {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpOrchestrator {
    pub fn new(config: &OrchestratorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| NodeflowError::Orchestrator(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    fn execution_url(&self, id: &ExecutionId, action: &str) -> String {
        format!(
            "{}/api/executions/{}/{}",
            self.base_url,
            urlencoding::encode(id.as_str()),
            action
        )
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) if !key.is_empty() => req.bearer_auth(key),
            _ => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| NodeflowError::Orchestrator(format!("{what} request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NodeflowError::OrchestratorStatus {
                status: status.as_u16(),
                body: error_detail(&body),
            });
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T> {
        resp.json::<T>()
            .await
            .map_err(|e| NodeflowError::Orchestrator(format!("Invalid {what} response: {e}")))
    }
}

/// Pull `detail`/`error`/`message` out of a JSON error body, else the raw text.
fn error_detail(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    ["detail", "error", "message"]
        .iter()
        .find_map(|key| value[*key].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Submission envelope: the workflow plus the session that will receive pushes.
fn submission_body(workflow: serde_json::Value, ctx: &ExecutionContext) -> serde_json::Value {
    let mut body = serde_json::json!({
        "workflow": workflow,
        "session_id": ctx.session_id.0,
    });
    if !ctx.parameters.is_empty() {
        body["parameters"] = serde_json::Value::Object(ctx.parameters.clone());
    }
    body
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum CheckpointList {
    Bare(Vec<Checkpoint>),
    Wrapped { checkpoints: Vec<Checkpoint> },
}

impl OrchestratorApi for HttpOrchestrator {
    fn submit(
        &self,
        workflow: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> BoxFuture<'_, Result<SubmitResponse>> {
        let body = submission_body(workflow, ctx);
        Box::pin(async move {
            let url = format!("{}/api/executions", self.base_url);
            let resp = self
                .send(self.http.post(&url).json(&body), "submit")
                .await
                .map_err(|e| match e {
                    NodeflowError::OrchestratorStatus { status, body } if status < 500 => {
                        NodeflowError::SubmissionRejected(format!("{status}: {body}"))
                    }
                    other => other,
                })?;
            let accepted: SubmitResponse = Self::json(resp, "submit").await?;
            debug!(execution_id = %accepted.execution_id, "Submission accepted");
            Ok(accepted)
        })
    }

    fn status(&self, id: &ExecutionId) -> BoxFuture<'_, Result<StatusSnapshot>> {
        let url = self.execution_url(id, "status");
        Box::pin(async move {
            let resp = self.send(self.http.get(&url), "status").await?;
            Self::json(resp, "status").await
        })
    }

    fn cancel(&self, id: &ExecutionId) -> BoxFuture<'_, Result<()>> {
        let url = self.execution_url(id, "cancel");
        Box::pin(async move {
            self.send(self.http.post(&url), "cancel").await?;
            Ok(())
        })
    }

    fn checkpoints(
        &self,
        id: &ExecutionId,
        limit: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<Checkpoint>>> {
        let mut url = self.execution_url(id, "checkpoints");
        if let Some(limit) = limit {
            url.push_str(&format!("?limit={limit}"));
        }
        Box::pin(async move {
            let resp = self.send(self.http.get(&url), "checkpoints").await?;
            let list: CheckpointList = Self::json(resp, "checkpoints").await?;
            Ok(match list {
                CheckpointList::Bare(items) => items,
                CheckpointList::Wrapped { checkpoints } => checkpoints,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_core::types::SessionId;
    use serde_json::json;

    fn client(base_url: &str) -> HttpOrchestrator {
        HttpOrchestrator::new(&OrchestratorConfig {
            base_url: base_url.into(),
            ws_url: None,
            api_key: Some("secret".into()),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_execution_urls() {
        let api = client("http://localhost:8000/");
        let id = ExecutionId::from("run 42");
        assert_eq!(
            api.execution_url(&id, "status"),
            "http://localhost:8000/api/executions/run%2042/status"
        );
        assert_eq!(
            api.execution_url(&ExecutionId::from("abc"), "cancel"),
            "http://localhost:8000/api/executions/abc/cancel"
        );
    }

    #[test]
    fn test_submission_body() {
        let ctx = ExecutionContext::new(SessionId::from_string("s-1"));
        assert_eq!(
            submission_body(json!({"nodes": [], "edges": []}), &ctx),
            json!({"workflow": {"nodes": [], "edges": []}, "session_id": "s-1"})
        );

        let ctx = ctx.with_parameter("dataset", json!("shoes"));
        let body = submission_body(json!({}), &ctx);
        assert_eq!(body["parameters"], json!({"dataset": "shoes"}));
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(error_detail(r#"{"detail": "Unknown template"}"#), "Unknown template");
        assert_eq!(error_detail(r#"{"error": "boom"}"#), "boom");
        assert_eq!(error_detail("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_detail(r#"{"other": 1}"#), r#"{"other": 1}"#);
    }

    #[test]
    fn test_checkpoint_list_shapes() {
        let bare: CheckpointList =
            serde_json::from_str(r#"[{"id": "c1", "node_id": "load", "state": {"rows": 10}}]"#).unwrap();
        let wrapped: CheckpointList =
            serde_json::from_str(r#"{"checkpoints": [{"id": "c1"}, {"id": "c2"}]}"#).unwrap();
        assert!(matches!(bare, CheckpointList::Bare(ref v) if v.len() == 1));
        assert!(matches!(wrapped, CheckpointList::Wrapped { ref checkpoints } if checkpoints.len() == 2));
    }
}
