use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::future::Future;
use tracing::{debug, instrument};
use url::Url;

use crate::config::DashboardConfig;
use crate::error::FetchError;
use crate::model::{
    ActionRequest, ChartEntry, ClusterCapacity, NamespaceScope, NamespaceSummary, ResourceKind,
    value_as_count,
};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PageQuery {
    pub kind: ResourceKind,
    pub namespace: NamespaceScope,
    pub page: u32,
    pub page_size: u32,
}

/// The two calls the resource pipeline needs from the backend.
pub trait ResourceBackend: Clone + Send + Sync + 'static {
    fn fetch_count(
        &self,
        kind: ResourceKind,
        namespace: &NamespaceScope,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send;

    /// Returns the raw `{data: {items, totalCount}}` payload.
    fn fetch_page(&self, query: &PageQuery)
    -> impl Future<Output = Result<Value, FetchError>> + Send;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NamespaceOp {
    Events,
    Describe,
    Edit,
    Delete,
    Create,
}

impl NamespaceOp {
    pub fn label(self) -> &'static str {
        match self {
            Self::Events => "namespace events",
            Self::Describe => "describe namespace",
            Self::Edit => "edit namespace",
            Self::Delete => "delete namespace",
            Self::Create => "create namespace",
        }
    }

    fn path(self) -> &'static str {
        match self {
            Self::Events => "/api/namespace/events",
            Self::Describe => "/api/namespace/describe",
            Self::Edit => "/api/namespace/edit",
            Self::Delete => "/api/namespace/delete",
            Self::Create => "/api/namespace/create",
        }
    }

    fn is_read(self) -> bool {
        matches!(self, Self::Events | Self::Describe | Self::Edit)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MaintenanceOp {
    HealthCheck,
    RefreshApplication,
    Restart,
    RefreshDatabase,
}

impl MaintenanceOp {
    pub fn label(self) -> &'static str {
        match self {
            Self::HealthCheck => "health check",
            Self::RefreshApplication => "application refresh",
            Self::Restart => "restart",
            Self::RefreshDatabase => "database refresh",
        }
    }

    fn path(self) -> &'static str {
        match self {
            Self::HealthCheck => "/health_check",
            Self::RefreshApplication => "/refresh_application",
            Self::Restart => "/restart",
            Self::RefreshDatabase => "/api/refresh-database",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    upload_path: String,
}

impl ApiClient {
    pub fn new(config: &DashboardConfig) -> Result<Self, FetchError> {
        let base = build_base_url(&config.server, &config.base_path)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| FetchError::Transport {
                url: base.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            base,
            upload_path: config.upload_path.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Resolves an absolute backend path against the configured prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        resolve_endpoint(&self.base, path)
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self
            .http
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        decode_response(&url, response).await
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<Value, FetchError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST form");
        let response = self
            .http
            .post(url.clone())
            .form(form)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        decode_response(&url, response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, FetchError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST json");
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        decode_response(&url, response).await
    }

    pub async fn cluster_capacity(&self) -> Result<ClusterCapacity, FetchError> {
        let value = self.get_json("/get_cluster_capacity", &[]).await?;
        let body = value.get("data").filter(|data| data.is_object()).unwrap_or(&value);
        Ok(ClusterCapacity::from_value(body))
    }

    pub async fn namespaces(&self) -> Result<Vec<String>, FetchError> {
        let value = self.get_json("/get_namespaces", &[]).await?;
        let Some(list) = value.get("namespaces").and_then(Value::as_array) else {
            return Err(FetchError::MalformedPayload(
                "response has no `namespaces` array".to_string(),
            ));
        };
        let mut namespaces = list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect::<Vec<_>>();
        namespaces.sort();
        namespaces.dedup();
        Ok(namespaces)
    }

    pub async fn namespace_details(&self) -> Result<Vec<NamespaceSummary>, FetchError> {
        let url = self.endpoint("/get_namespace_details")?;
        let value = self.get_json("/get_namespace_details", &[]).await?;
        let list = value
            .get("namespaces")
            .cloned()
            .ok_or_else(|| {
                FetchError::MalformedPayload("response has no `namespaces` array".to_string())
            })?;
        serde_json::from_value(list).map_err(|error| FetchError::Decode {
            url: url.to_string(),
            reason: error.to_string(),
        })
    }

    pub async fn namespace_op(&self, op: NamespaceOp, name: &str) -> Result<String, FetchError> {
        let value = if op.is_read() {
            self.get_json(op.path(), &[("namespace", name)]).await?
        } else {
            self.post_json(op.path(), &json!({ "namespace": name }))
                .await?
        };
        Ok(extract_text(value))
    }

    pub async fn update_namespace(&self, name: &str, manifest: &str) -> Result<String, FetchError> {
        let value = self
            .post_json(
                "/api/namespace/update",
                &json!({ "namespace": name, "yaml": manifest }),
            )
            .await?;
        Ok(extract_text(value))
    }

    pub async fn pod_details(&self, namespace: &str, name: &str) -> Result<Value, FetchError> {
        self.get_json(&pod_path(namespace, name, "details"), &[])
            .await
    }

    pub async fn pod_describe(&self, namespace: &str, name: &str) -> Result<String, FetchError> {
        let value = self
            .get_json(&pod_path(namespace, name, "describe"), &[])
            .await?;
        Ok(extract_text(value))
    }

    pub async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String, FetchError> {
        let value = self
            .get_json(&pod_path(namespace, name, "logs"), &[])
            .await?;
        Ok(extract_text(value))
    }

    pub async fn charts(&self) -> Result<Vec<ChartEntry>, FetchError> {
        let url = self.endpoint("/api/charts/list")?;
        let value = self.get_json("/api/charts/list", &[]).await?;
        let list = match value {
            Value::Array(_) => value,
            Value::Object(ref map) => map
                .get("charts")
                .or_else(|| map.get("data"))
                .cloned()
                .unwrap_or(Value::Array(Vec::new())),
            _ => Value::Array(Vec::new()),
        };
        serde_json::from_value(list).map_err(|error| FetchError::Decode {
            url: url.to_string(),
            reason: error.to_string(),
        })
    }

    pub async fn delete_chart(&self, name: &str, version: &str) -> Result<String, FetchError> {
        let value = self
            .post_json(
                "/api/charts/delete",
                &json!({ "name": name, "version": version }),
            )
            .await?;
        Ok(extract_text(value))
    }

    #[instrument(skip(self), fields(action = request.action.as_str(), kind = %request.kind))]
    pub async fn run_action(&self, request: &ActionRequest) -> Result<String, FetchError> {
        let mut form = vec![
            ("action", request.action.as_str().to_string()),
            ("resource_type", request.kind.api_name().to_string()),
            ("namespace", request.namespace.clone()),
            ("resource_name", request.name.clone()),
        ];
        if let Some(command) = &request.command {
            form.push(("command", command.clone()));
        }
        let value = self.post_form("/run_action", &form).await?;
        Ok(extract_text(value))
    }

    pub async fn maintenance(&self, op: MaintenanceOp) -> Result<String, FetchError> {
        let value = match op {
            MaintenanceOp::HealthCheck => self.get_json(op.path(), &[]).await?,
            _ => self.post_json(op.path(), &json!({})).await?,
        };
        Ok(extract_text(value))
    }

    pub async fn upload_manifest(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, FetchError> {
        let url = self.endpoint(&self.upload_path)?;
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/x-yaml")
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        let form = Form::new().part("file", part);
        let response = self
            .http
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        decode_response(&url, response).await.map(extract_text)
    }
}

impl ResourceBackend for ApiClient {
    async fn fetch_count(
        &self,
        kind: ResourceKind,
        namespace: &NamespaceScope,
    ) -> Result<u64, FetchError> {
        let form = [
            ("resource_type", kind.api_name().to_string()),
            ("namespace", namespace.label()),
            ("page", "1".to_string()),
            ("page_size", "1".to_string()),
            ("count_only", "true".to_string()),
        ];
        let payload = self.post_form("/get_resources", &form).await?;
        payload
            .get("data")
            .and_then(|data| data.get("totalCount"))
            .and_then(value_as_count)
            .ok_or_else(|| FetchError::MalformedPayload("count response has no totalCount".to_string()))
    }

    async fn fetch_page(&self, query: &PageQuery) -> Result<Value, FetchError> {
        let form = [
            ("resource_type", query.kind.api_name().to_string()),
            ("namespace", query.namespace.label()),
            ("page", query.page.to_string()),
            ("page_size", query.page_size.to_string()),
        ];
        self.post_form("/get_resources", &form).await
    }
}

fn build_base_url(server: &str, base_path: &str) -> Result<Url, FetchError> {
    let mut base = Url::parse(server.trim()).map_err(|source| FetchError::InvalidUrl {
        path: server.to_string(),
        source,
    })?;

    let segments = [base.path(), base_path]
        .iter()
        .map(|part| part.trim().trim_matches('/').to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    let path = if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    };
    base.set_path(&path);
    Ok(base)
}

fn resolve_endpoint(base: &Url, path: &str) -> Result<Url, FetchError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|source| FetchError::InvalidUrl {
            path: path.to_string(),
            source,
        })
}

fn pod_path(namespace: &str, name: &str, leaf: &str) -> String {
    format!(
        "/api/pod/{}/{}/{leaf}",
        urlencoding::encode(namespace),
        urlencoding::encode(name)
    )
}

async fn decode_response(url: &Url, response: reqwest::Response) -> Result<Value, FetchError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: truncate(&text, 240),
        });
    }

    let value = parse_body(&text);
    reject_if_error(&value)?;
    Ok(value)
}

/// Plain-text bodies (describe output, logs) are kept as JSON strings.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn reject_if_error(value: &Value) -> Result<(), FetchError> {
    let Some(map) = value.as_object() else {
        return Ok(());
    };

    if let Some(error) = map.get("error").and_then(Value::as_str)
        && !error.trim().is_empty()
    {
        return Err(FetchError::Rejected(error.to_string()));
    }

    if map.get("success").and_then(Value::as_bool) == Some(false) {
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        return Err(FetchError::Rejected(message.to_string()));
    }

    Ok(())
}

pub fn extract_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text,
        Value::Object(ref map) => {
            for key in [
                "output", "logs", "describe", "events", "yaml", "message", "result", "status",
            ] {
                if let Some(Value::String(text)) = map.get(key) {
                    return text.clone();
                }
            }
            serde_json::to_string_pretty(&value).unwrap_or_default()
        }
        other => other.to_string(),
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }

    let mut out = value
        .chars()
        .take(max.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::{
        build_base_url, extract_text, parse_body, pod_path, reject_if_error, resolve_endpoint,
    };
    use crate::error::FetchError;
    use serde_json::{Value, json};

    #[test]
    fn endpoints_resolve_under_base_path() {
        let base = build_base_url("http://backend:5000", "/dash/").unwrap();
        let url = resolve_endpoint(&base, "/get_resources").unwrap();
        assert_eq!(url.as_str(), "http://backend:5000/dash/get_resources");
    }

    #[test]
    fn endpoints_resolve_at_root_without_prefix() {
        let base = build_base_url("http://backend:5000/", "").unwrap();
        let url = resolve_endpoint(&base, "/api/charts/list").unwrap();
        assert_eq!(url.as_str(), "http://backend:5000/api/charts/list");
    }

    #[test]
    fn server_path_and_prefix_are_combined() {
        let base = build_base_url("https://gateway.example/k8s", "ui").unwrap();
        let url = resolve_endpoint(&base, "health_check").unwrap();
        assert_eq!(url.as_str(), "https://gateway.example/k8s/ui/health_check");
    }

    #[test]
    fn invalid_server_is_reported() {
        assert!(matches!(
            build_base_url("not a url", ""),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn pod_paths_encode_segments() {
        assert_eq!(
            pod_path("team a", "web/0", "logs"),
            "/api/pod/team%20a/web%2F0/logs"
        );
    }

    #[test]
    fn plain_text_bodies_become_strings() {
        assert_eq!(parse_body("Name: web\nStatus: Running"), json!("Name: web\nStatus: Running"));
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
    }

    #[test]
    fn backend_error_fields_are_rejections() {
        assert!(matches!(
            reject_if_error(&json!({"error": "namespace exists"})),
            Err(FetchError::Rejected(message)) if message == "namespace exists"
        ));
        assert!(matches!(
            reject_if_error(&json!({"success": false})),
            Err(FetchError::Rejected(_))
        ));
        assert!(reject_if_error(&json!({"success": true, "error": ""})).is_ok());
    }

    #[test]
    fn extract_text_prefers_known_fields() {
        assert_eq!(extract_text(json!({"output": "done"})), "done");
        assert_eq!(extract_text(json!("raw")), "raw");
        assert!(extract_text(json!({"other": 1})).contains("\"other\": 1"));
    }
}
