use serde::Deserialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};

use crate::error::FetchError;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Page sizes above this value mean "fetch everything as a single page".
pub const FETCH_ALL_THRESHOLD: u32 = 500;
pub const FETCH_ALL_PAGE_SIZE: u32 = 10_000;

pub fn is_fetch_all(page_size: u32) -> bool {
    page_size > FETCH_ALL_THRESHOLD
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Pods,
    Services,
    Deployments,
    InferenceServices,
    ConfigMaps,
    Secrets,
}

impl ResourceKind {
    pub const ALL: [Self; 6] = [
        Self::Pods,
        Self::Services,
        Self::Deployments,
        Self::InferenceServices,
        Self::ConfigMaps,
        Self::Secrets,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Pods => "Pods",
            Self::Services => "Services",
            Self::Deployments => "Deployments",
            Self::InferenceServices => "InferenceServices",
            Self::ConfigMaps => "ConfigMaps",
            Self::Secrets => "Secrets",
        }
    }

    pub fn api_name(self) -> &'static str {
        match self {
            Self::Pods => "pods",
            Self::Services => "services",
            Self::Deployments => "deployments",
            Self::InferenceServices => "inferenceservices",
            Self::ConfigMaps => "configmaps",
            Self::Secrets => "secrets",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "po" | "pod" | "pods" => Some(Self::Pods),
            "svc" | "service" | "services" => Some(Self::Services),
            "deploy" | "deployment" | "deployments" | "dp" => Some(Self::Deployments),
            "isvc" | "inferenceservice" | "inferenceservices" | "inference-service"
            | "inference-services" => Some(Self::InferenceServices),
            "cm" | "configmap" | "configmaps" | "config-map" | "config-maps" => {
                Some(Self::ConfigMaps)
            }
            "secret" | "secrets" => Some(Self::Secrets),
            _ => None,
        }
    }

    pub fn short_token(self) -> &'static str {
        match self {
            Self::Pods => "po",
            Self::Services => "svc",
            Self::Deployments => "deploy",
            Self::InferenceServices => "isvc",
            Self::ConfigMaps => "cm",
            Self::Secrets => "secret",
        }
    }

    pub fn offset(self, delta: isize) -> Self {
        let len = Self::ALL.len() as isize;
        let current = Self::ALL
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or(0) as isize;
        Self::ALL[(current + delta).rem_euclid(len) as usize]
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.api_name())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub enum NamespaceScope {
    #[default]
    All,
    Named(String),
}

impl NamespaceScope {
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Named(trimmed.to_string())
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Named(namespace) => namespace.clone(),
        }
    }
}

impl Display for NamespaceScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Named(namespace) => write!(f, "{namespace}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Tab {
    Home,
    Resources,
    Cli,
    Yaml,
    Namespaces,
    Charts,
    Settings,
}

impl Tab {
    pub const ALL: [Self; 7] = [
        Self::Home,
        Self::Resources,
        Self::Cli,
        Self::Yaml,
        Self::Namespaces,
        Self::Charts,
        Self::Settings,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Resources => "Resources",
            Self::Cli => "CLI",
            Self::Yaml => "YAML",
            Self::Namespaces => "Namespaces",
            Self::Charts => "Charts",
            Self::Settings => "Settings",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "home" | "dashboard" => Some(Self::Home),
            "resources" | "explorer" | "res" => Some(Self::Resources),
            "cli" | "console" | "terminal" => Some(Self::Cli),
            "yaml" | "deploy" | "apply" => Some(Self::Yaml),
            "namespaces" | "ns" => Some(Self::Namespaces),
            "charts" | "helm" => Some(Self::Charts),
            "settings" | "admin" => Some(Self::Settings),
            _ => None,
        }
    }

    pub fn offset(self, delta: isize) -> Self {
        let len = Self::ALL.len() as isize;
        let current = Self::ALL.iter().position(|tab| *tab == self).unwrap_or(0) as isize;
        Self::ALL[(current + delta).rem_euclid(len) as usize]
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Self::Asc => "▲",
            Self::Desc => "▼",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SortField {
    Name,
    Namespace,
    Status,
    Age,
    Cpu,
    Gpu,
    Memory,
    /// Raw property lookup, dotted paths allowed (`spec.replicas`).
    Property(String),
}

impl SortField {
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "name" => Self::Name,
            "namespace" | "ns" => Self::Namespace,
            "status" | "phase" => Self::Status,
            "age" | "created" => Self::Age,
            "cpu" => Self::Cpu,
            "gpu" => Self::Gpu,
            "memory" | "mem" => Self::Memory,
            _ => Self::Property(token.trim().to_string()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Name => "name".to_string(),
            Self::Namespace => "namespace".to_string(),
            Self::Status => "status".to_string(),
            Self::Age => "age".to_string(),
            Self::Cpu => "cpu".to_string(),
            Self::Gpu => "gpu".to_string(),
            Self::Memory => "memory".to_string(),
            Self::Property(path) => path.clone(),
        }
    }

    pub fn sortable_for(kind: ResourceKind) -> Vec<Self> {
        let mut fields = vec![Self::Name, Self::Namespace, Self::Status, Self::Age];
        if kind == ResourceKind::Pods {
            fields.extend([Self::Cpu, Self::Gpu, Self::Memory]);
        }
        fields
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePage {
    pub items: Vec<Value>,
    pub total_count: Option<u64>,
}

impl ResourcePage {
    pub fn from_payload(payload: &Value) -> Result<Self, FetchError> {
        let Some(data) = payload.get("data").filter(|data| data.is_object()) else {
            return Err(FetchError::MalformedPayload(
                "response has no `data` object".to_string(),
            ));
        };

        let items = match data.get("items") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(FetchError::MalformedPayload(
                    "`data.items` is not an array".to_string(),
                ));
            }
        };
        let total_count = data.get("totalCount").and_then(value_as_count);

        Ok(Self { items, total_count })
    }
}

pub fn value_as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterCapacity {
    pub cpu_cores: f64,
    pub memory_mi: f64,
    pub gpu: f64,
}

impl Default for ClusterCapacity {
    fn default() -> Self {
        Self {
            cpu_cores: 32.0,
            memory_mi: 131_072.0,
            gpu: 8.0,
        }
    }
}

impl ClusterCapacity {
    /// Reads `{cpu, memory, gpu}`; each value may be a number or a
    /// Kubernetes quantity string. Missing or unparsable values keep the
    /// defaults.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let cpu_cores = value
            .get("cpu")
            .and_then(|raw| match raw {
                Value::String(text) => crate::query::parse_cpu_cores(text),
                other => other.as_f64(),
            })
            .unwrap_or(defaults.cpu_cores);
        let memory_mi = value
            .get("memory")
            .and_then(|raw| match raw {
                Value::String(text) => crate::query::parse_memory_mi(text),
                other => other.as_f64(),
            })
            .unwrap_or(defaults.memory_mi);
        let gpu = value
            .get("gpu")
            .and_then(|raw| match raw {
                Value::String(text) => text.trim().parse::<f64>().ok(),
                other => other.as_f64(),
            })
            .unwrap_or(defaults.gpu);

        Self {
            cpu_cores,
            memory_mi,
            gpu,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSummary {
    pub name: String,
    #[serde(default)]
    pub pod_count: u64,
    #[serde(default)]
    pub resources: NamespaceResources,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NamespaceResources {
    #[serde(default)]
    pub cpu: Value,
    #[serde(default)]
    pub gpu: Value,
    #[serde(default)]
    pub memory: Value,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ActionKind {
    Describe,
    Logs,
    Exec,
    Delete,
}

impl ActionKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "describe" | "desc" => Some(Self::Describe),
            "logs" | "log" => Some(Self::Logs),
            "exec" => Some(Self::Exec),
            "delete" | "del" | "rm" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Describe => "describe",
            Self::Logs => "logs",
            Self::Exec => "exec",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ActionRequest {
    pub action: ActionKind,
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub command: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{
        ClusterCapacity, DEFAULT_PAGE_SIZE, FETCH_ALL_PAGE_SIZE, FETCH_ALL_THRESHOLD,
        NamespaceScope, ResourceKind, ResourcePage, Tab, is_fetch_all,
    };
    use serde_json::json;

    #[test]
    fn resource_aliases_map_to_expected_kinds() {
        assert_eq!(ResourceKind::from_token("po"), Some(ResourceKind::Pods));
        assert_eq!(
            ResourceKind::from_token("isvc"),
            Some(ResourceKind::InferenceServices)
        );
        assert_eq!(
            ResourceKind::from_token("config-maps"),
            Some(ResourceKind::ConfigMaps)
        );
        assert_eq!(ResourceKind::from_token("nodes"), None);
    }

    #[test]
    fn kind_offset_wraps_around() {
        assert_eq!(ResourceKind::Pods.offset(-1), ResourceKind::Secrets);
        assert_eq!(ResourceKind::Secrets.offset(1), ResourceKind::Pods);
        assert_eq!(Tab::Settings.offset(1), Tab::Home);
    }

    #[test]
    fn fetch_all_threshold_is_exclusive() {
        assert!(!is_fetch_all(FETCH_ALL_THRESHOLD));
        assert!(is_fetch_all(FETCH_ALL_THRESHOLD + 1));
        assert!(is_fetch_all(FETCH_ALL_PAGE_SIZE));
        assert!(!is_fetch_all(DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn resource_page_requires_data_object() {
        assert!(ResourcePage::from_payload(&json!({"items": []})).is_err());
        assert!(ResourcePage::from_payload(&json!({"data": "nope"})).is_err());

        let page = ResourcePage::from_payload(&json!({
            "data": {"items": [{"metadata": {"name": "a"}}], "totalCount": 120}
        }))
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_count, Some(120));
    }

    #[test]
    fn capacity_accepts_quantities_and_numbers() {
        let capacity = ClusterCapacity::from_value(&json!({
            "cpu": "96",
            "memory": "512Gi",
            "gpu": 4
        }));
        assert_eq!(capacity.cpu_cores, 96.0);
        assert_eq!(capacity.memory_mi, 524_288.0);
        assert_eq!(capacity.gpu, 4.0);

        let fallback = ClusterCapacity::from_value(&json!({}));
        assert_eq!(fallback, ClusterCapacity::default());
    }

    #[test]
    fn namespace_scope_parses_all_label() {
        assert_eq!(NamespaceScope::from_label("ALL"), NamespaceScope::All);
        assert_eq!(
            NamespaceScope::from_label(" kube-system "),
            NamespaceScope::Named("kube-system".to_string())
        );
    }
}
