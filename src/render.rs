use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret, Service};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;

use crate::model::ResourceKind;
use crate::query::{
    creation_millis, resource_name, resource_namespace, resource_status, resource_usage,
    status_counts,
};
use crate::store::{ResourceState, ResourceStore, total_pages};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RenderMode {
    /// Resources explorer: every item held.
    FullList,
    /// Home sub-tabs: items so far plus a "Load More" affordance.
    LoadMore,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StatusTone {
    Good,
    Warn,
    Bad,
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowData {
    pub name: String,
    pub namespace: String,
    pub cells: Vec<String>,
    pub status: String,
    pub tone: StatusTone,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LoadMore {
    Available { next_page: u32, remaining: u64 },
    Loading { page: u32 },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EmptyState {
    NoMatches { search: Option<String> },
    NoResources,
    Loading { estimate: Option<u64> },
    Failed { message: String },
}

impl EmptyState {
    pub fn message(&self, kind: ResourceKind) -> String {
        match self {
            Self::NoMatches {
                search: Some(search),
            } => format!("No {} match \"{search}\". Press Esc to clear the search.", kind.title()),
            Self::NoMatches { search: None } => {
                format!("No {} match the active filter.", kind.title())
            }
            Self::NoResources => format!("No {} found.", kind.title()),
            Self::Loading {
                estimate: Some(count),
            } => format!("Loading {count} items…"),
            Self::Loading { estimate: None } => format!("Loading {}…", kind.title()),
            Self::Failed { message } => format!("Failed to load {}: {message}", kind.title()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryCard {
    pub label: String,
    pub count: usize,
    pub tone: StatusTone,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub kind: ResourceKind,
    pub mode: RenderMode,
    pub headers: Vec<&'static str>,
    pub rows: Vec<RowData>,
    pub selected: Option<usize>,
    pub count_line: String,
    pub load_more: Option<LoadMore>,
    pub empty: Option<EmptyState>,
    pub cards: Vec<SummaryCard>,
    pub indicators: Vec<String>,
    pub stale: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub mode: RenderMode,
    pub selected: usize,
    pub now: Instant,
    pub clock: DateTime<Utc>,
}

pub fn render_current_page(
    store: &ResourceStore,
    kind: ResourceKind,
    context: RenderContext,
) -> TableView {
    let Some(state) = store.state(kind) else {
        return TableView {
            kind,
            mode: context.mode,
            headers: headers(kind),
            rows: Vec::new(),
            selected: None,
            count_line: "Showing 0 of 0".to_string(),
            load_more: None,
            empty: Some(EmptyState::Loading { estimate: None }),
            cards: Vec::new(),
            indicators: Vec::new(),
            stale: false,
            error: None,
        };
    };

    let rows = state
        .items
        .iter()
        .map(|item| format_row(kind, item, context.clock))
        .collect::<Vec<_>>();
    let selected = (!rows.is_empty()).then(|| context.selected.min(rows.len() - 1));

    let source_total = state
        .original
        .as_ref()
        .and_then(|snapshot| snapshot.total_count)
        .unwrap_or_else(|| state.total());
    let count_line = format!("Showing {} of {source_total}", rows.len());

    let load_more = match context.mode {
        RenderMode::FullList => None,
        RenderMode::LoadMore => load_more_state(state),
    };

    TableView {
        kind,
        mode: context.mode,
        headers: headers(kind),
        empty: empty_state(state, rows.is_empty()),
        rows,
        selected,
        count_line,
        load_more,
        cards: summary_cards(state),
        indicators: filter_indicators(state),
        stale: store.is_stale(kind, context.now),
        error: state.error.as_ref().map(|failure| failure.message.clone()),
    }
}

fn load_more_state(state: &ResourceState) -> Option<LoadMore> {
    let held = state.items.len() as u64;
    let total = state.total();
    if held >= total {
        return None;
    }
    if let Some(page) = state.pending_page {
        return Some(LoadMore::Loading { page });
    }
    Some(LoadMore::Available {
        next_page: total_pages(held, state.page_size) + 1,
        remaining: total - held,
    })
}

fn empty_state(state: &ResourceState, empty: bool) -> Option<EmptyState> {
    if !empty {
        return None;
    }
    if state.loading {
        return Some(EmptyState::Loading {
            estimate: state.loading_estimate,
        });
    }
    if let Some(failure) = &state.error {
        return Some(EmptyState::Failed {
            message: failure.message.clone(),
        });
    }
    if state.has_filter() {
        return Some(EmptyState::NoMatches {
            search: state.search.clone(),
        });
    }
    Some(EmptyState::NoResources)
}

pub fn summary_cards(state: &ResourceState) -> Vec<SummaryCard> {
    let source = state.source_items();
    let mut cards = vec![SummaryCard {
        label: "Total".to_string(),
        count: source.len(),
        tone: StatusTone::Neutral,
        active: state.status_filter.is_none(),
    }];
    cards.extend(
        status_counts(state.kind, source)
            .into_iter()
            .map(|(label, count)| SummaryCard {
                tone: status_tone(state.kind, &label),
                active: state.status_filter.as_deref() == Some(label.as_str()),
                label,
                count,
            }),
    );
    cards
}

pub fn filter_indicators(state: &ResourceState) -> Vec<String> {
    let mut indicators = Vec::new();
    if let Some(status) = &state.status_filter {
        indicators.push(format!("status: {status}"));
    }
    if let Some(search) = &state.search {
        indicators.push(format!("search: \"{search}\""));
    }
    if let Some(sort) = &state.sort {
        indicators.push(format!("sort: {} {}", sort.field.label(), sort.direction.arrow()));
    }
    indicators
}

pub fn status_tone(kind: ResourceKind, status: &str) -> StatusTone {
    match (kind, status) {
        (ResourceKind::Pods, "Running" | "Succeeded") => StatusTone::Good,
        (ResourceKind::Pods, "Pending") => StatusTone::Warn,
        (ResourceKind::Pods, "Failed") => StatusTone::Bad,
        (ResourceKind::Deployments | ResourceKind::InferenceServices, "Ready") => StatusTone::Good,
        (ResourceKind::Deployments, "NotReady") => StatusTone::Warn,
        (ResourceKind::InferenceServices, "NotReady") => StatusTone::Bad,
        _ => StatusTone::Neutral,
    }
}

pub fn headers(kind: ResourceKind) -> Vec<&'static str> {
    match kind {
        ResourceKind::Pods => vec![
            "NAME", "NAMESPACE", "STATUS", "READY", "RESTARTS", "CPU", "GPU", "MEMORY", "NODE",
            "AGE",
        ],
        ResourceKind::Services => vec![
            "NAME",
            "NAMESPACE",
            "TYPE",
            "CLUSTER-IP",
            "EXTERNAL-IP",
            "PORTS",
            "AGE",
        ],
        ResourceKind::Deployments => {
            vec!["NAME", "NAMESPACE", "READY", "UP-TO-DATE", "AVAILABLE", "AGE"]
        }
        ResourceKind::InferenceServices => vec!["NAME", "NAMESPACE", "READY", "URL", "AGE"],
        ResourceKind::ConfigMaps => vec!["NAME", "NAMESPACE", "DATA", "AGE"],
        ResourceKind::Secrets => vec!["NAME", "NAMESPACE", "TYPE", "DATA", "AGE"],
    }
}

pub fn format_row(kind: ResourceKind, item: &Value, clock: DateTime<Utc>) -> RowData {
    let name = resource_name(item).to_string();
    let namespace = resource_namespace(item).to_string();
    let status = resource_status(kind, item);
    let age = format_age(item, clock);

    let columns = match kind {
        ResourceKind::Pods => pod_columns(item, &status),
        ResourceKind::Services => decode::<Service>(item).map(|service| service_columns(&service)),
        ResourceKind::Deployments => {
            decode::<Deployment>(item).map(|deployment| deployment_columns(&deployment))
        }
        ResourceKind::InferenceServices => Some(vec![
            status.clone(),
            item.pointer("/status/url")
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string(),
        ]),
        ResourceKind::ConfigMaps => {
            decode::<ConfigMap>(item).map(|config_map| configmap_columns(&config_map))
        }
        ResourceKind::Secrets => Some(vec![
            decode::<Secret>(item)
                .and_then(|secret| secret.type_)
                .unwrap_or_else(|| status.clone()),
            data_key_count(item).to_string(),
        ]),
    };

    let expected = headers(kind).len() - 3;
    let mut columns = columns.unwrap_or_default();
    columns.resize(expected, "-".to_string());

    let mut cells = Vec::with_capacity(expected + 3);
    cells.push(name.clone());
    cells.push(display_or_dash(&namespace));
    cells.extend(columns);
    cells.push(age);

    RowData {
        tone: status_tone(kind, &status),
        name,
        namespace,
        cells,
        status,
    }
}

/// Decodes a raw item into its typed form. The backend omits
/// `apiVersion`/`kind`, so they are filled in from the type.
fn decode<T>(item: &Value) -> Option<T>
where
    T: k8s_openapi::Resource + DeserializeOwned,
{
    let mut value = item.clone();
    if let Value::Object(map) = &mut value {
        map.insert(
            "apiVersion".to_string(),
            Value::String(T::API_VERSION.to_string()),
        );
        map.insert("kind".to_string(), Value::String(T::KIND.to_string()));
    }
    serde_json::from_value(value).ok()
}

fn pod_columns(item: &Value, status: &str) -> Option<Vec<String>> {
    let pod = decode::<Pod>(item)?;
    let (ready, total, restarts) = pod
        .status
        .as_ref()
        .map(|status| {
            let containers = status.container_statuses.as_deref().unwrap_or(&[]);
            (
                containers.iter().filter(|container| container.ready).count(),
                containers.len(),
                containers
                    .iter()
                    .map(|container| container.restart_count)
                    .sum::<i32>(),
            )
        })
        .unwrap_or((0, 0, 0));
    let usage = resource_usage(item);
    let node = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.clone())
        .unwrap_or_else(|| "-".to_string());

    Some(vec![
        status.to_string(),
        format!("{ready}/{total}"),
        restarts.to_string(),
        format_cores(usage.cpu_cores),
        format_gpu(usage.gpu),
        format_mebibytes(usage.memory_mi),
        node,
    ])
}

fn service_columns(service: &Service) -> Vec<String> {
    let spec = service.spec.as_ref();
    let service_type = spec
        .and_then(|spec| spec.type_.clone())
        .unwrap_or_else(|| "ClusterIP".to_string());
    let cluster_ip = spec
        .and_then(|spec| spec.cluster_ip.clone())
        .unwrap_or_else(|| "-".to_string());

    let mut external = service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|entry| entry.ip.clone().or_else(|| entry.hostname.clone()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if external.is_empty() {
        external = spec
            .and_then(|spec| spec.external_ips.clone())
            .unwrap_or_default();
    }
    let external_ip = if !external.is_empty() {
        external.join(",")
    } else if service_type == "LoadBalancer" {
        "<pending>".to_string()
    } else {
        "-".to_string()
    };

    let ports = spec
        .and_then(|spec| spec.ports.as_ref())
        .filter(|ports| !ports.is_empty())
        .map(|ports| {
            ports
                .iter()
                .map(|port| {
                    let protocol = port.protocol.as_deref().unwrap_or("TCP");
                    match port.node_port {
                        Some(node_port) => format!("{}:{node_port}/{protocol}", port.port),
                        None => format!("{}/{protocol}", port.port),
                    }
                })
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_else(|| "-".to_string());

    vec![service_type, cluster_ip, external_ip, ports]
}

fn deployment_columns(deployment: &Deployment) -> Vec<String> {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(0);
    let status = deployment.status.as_ref();
    let ready = status.and_then(|status| status.ready_replicas).unwrap_or(0);
    let updated = status
        .and_then(|status| status.updated_replicas)
        .unwrap_or(0);
    let available = status
        .and_then(|status| status.available_replicas)
        .unwrap_or(0);

    vec![
        format!("{ready}/{desired}"),
        updated.to_string(),
        available.to_string(),
    ]
}

fn configmap_columns(config_map: &ConfigMap) -> Vec<String> {
    let keys = config_map.data.as_ref().map_or(0, |data| data.len())
        + config_map.binary_data.as_ref().map_or(0, |data| data.len());
    vec![keys.to_string()]
}

/// Secret values may arrive redacted, so keys are counted on the raw item.
fn data_key_count(item: &Value) -> usize {
    ["data", "stringData"]
        .iter()
        .filter_map(|key| item.get(*key).and_then(Value::as_object))
        .map(|map| map.len())
        .sum()
}

fn format_age(item: &Value, clock: DateTime<Utc>) -> String {
    match creation_millis(item) {
        Some(created) => {
            format_elapsed_seconds(((clock.timestamp_millis() - created) / 1_000).max(0))
        }
        None => "-".to_string(),
    }
}

pub fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}

pub fn format_cores(cores: f64) -> String {
    if cores <= 0.0 {
        return "-".to_string();
    }
    if cores >= 1.0 {
        format!("{cores:.2}c")
    } else {
        format!("{}m", (cores * 1_000.0).round() as u64)
    }
}

pub fn format_mebibytes(mebibytes: f64) -> String {
    if mebibytes <= 0.0 {
        return "-".to_string();
    }
    if mebibytes >= 1_048_576.0 {
        format!("{:.1}Ti", mebibytes / 1_048_576.0)
    } else if mebibytes >= 1_024.0 {
        format!("{:.1}Gi", mebibytes / 1_024.0)
    } else {
        format!("{mebibytes:.0}Mi")
    }
}

fn format_gpu(gpu: f64) -> String {
    if gpu <= 0.0 {
        "-".to_string()
    } else if gpu.fract() == 0.0 {
        format!("{gpu:.0}")
    } else {
        format!("{gpu:.1}")
    }
}

fn display_or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EmptyState, LoadMore, RenderContext, RenderMode, StatusTone, format_elapsed_seconds,
        format_row, render_current_page,
    };
    use crate::config::CacheSettings;
    use crate::model::ResourceKind;
    use crate::store::ResourceStore;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{Value, json};
    use std::time::Instant;

    fn clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()
    }

    fn context(mode: RenderMode) -> RenderContext {
        RenderContext {
            mode,
            selected: 99,
            now: Instant::now(),
            clock: clock(),
        }
    }

    fn pods_payload(count: usize, total: u64) -> Value {
        let items = (0..count)
            .map(|index| {
                json!({
                    "metadata": {
                        "name": format!("pod-{index}"),
                        "namespace": "default",
                        "creationTimestamp": "2024-06-01T00:00:00Z"
                    },
                    "spec": {
                        "nodeName": "node-a",
                        "containers": [{"name": "app", "resources": {"requests": {"cpu": "250m", "memory": "512Mi"}}}]
                    },
                    "status": {
                        "phase": "Running",
                        "containerStatuses": [{
                            "name": "app", "image": "app:1", "imageID": "", "ready": true, "restartCount": 2
                        }]
                    }
                })
            })
            .collect::<Vec<_>>();
        json!({"data": {"items": items, "totalCount": total}})
    }

    #[test]
    fn pod_rows_use_typed_fields() {
        let payload = pods_payload(1, 1);
        let row = format_row(ResourceKind::Pods, &payload["data"]["items"][0], clock());
        assert_eq!(
            row.cells,
            vec!["pod-0", "default", "Running", "1/1", "2", "250m", "-", "512Mi", "node-a", "1d"]
        );
        assert_eq!(row.tone, StatusTone::Good);
    }

    #[test]
    fn service_rows_show_ports_and_pending_external_ip() {
        let item = json!({
            "metadata": {"name": "web", "namespace": "shop"},
            "spec": {"type": "LoadBalancer", "clusterIP": "10.0.0.12", "ports": [{"port": 80, "nodePort": 30080}]}
        });
        let row = format_row(ResourceKind::Services, &item, clock());
        assert_eq!(
            row.cells,
            vec!["web", "shop", "LoadBalancer", "10.0.0.12", "<pending>", "80:30080/TCP", "-"]
        );
    }

    #[test]
    fn deployment_and_secret_rows() {
        let deployment = json!({
            "metadata": {"name": "api", "namespace": "prod"},
            "spec": {"replicas": 3, "selector": {}, "template": {}},
            "status": {"readyReplicas": 2, "updatedReplicas": 3, "availableReplicas": 2}
        });
        let row = format_row(ResourceKind::Deployments, &deployment, clock());
        assert_eq!(row.cells[2..5], ["2/3", "3", "2"]);
        assert_eq!(row.status, "NotReady");

        let secret = json!({
            "metadata": {"name": "tls", "namespace": "prod"},
            "type": "kubernetes.io/tls",
            "data": {"tls.crt": "***", "tls.key": "***"}
        });
        let row = format_row(ResourceKind::Secrets, &secret, clock());
        assert_eq!(row.cells[2..4], ["kubernetes.io/tls", "2"]);
    }

    #[test]
    fn undecodable_items_fall_back_to_dashes() {
        let row = format_row(
            ResourceKind::ConfigMaps,
            &json!({"metadata": {"name": "cfg"}, "data": "not-a-map"}),
            clock(),
        );
        assert_eq!(row.cells, vec!["cfg", "-", "-", "-"]);
    }

    #[test]
    fn load_more_mode_offers_next_page() {
        let mut store = ResourceStore::new(CacheSettings::default());
        store
            .process_page(ResourceKind::Pods, &pods_payload(50, 120), 1, 50, Instant::now())
            .unwrap();

        let view = render_current_page(&store, ResourceKind::Pods, context(RenderMode::LoadMore));
        assert_eq!(view.count_line, "Showing 50 of 120");
        assert_eq!(
            view.load_more,
            Some(LoadMore::Available {
                next_page: 2,
                remaining: 70
            })
        );
        assert_eq!(view.selected, Some(49));

        let full = render_current_page(&store, ResourceKind::Pods, context(RenderMode::FullList));
        assert_eq!(full.load_more, None);
    }

    #[test]
    fn empty_search_result_offers_clear_action() {
        let mut store = ResourceStore::new(CacheSettings::default());
        store
            .process_page(ResourceKind::Pods, &pods_payload(3, 3), 1, 50, Instant::now())
            .unwrap();
        store.apply_filter(ResourceKind::Pods, None, Some("zzz"));

        let view = render_current_page(&store, ResourceKind::Pods, context(RenderMode::FullList));
        assert_eq!(
            view.empty,
            Some(EmptyState::NoMatches {
                search: Some("zzz".to_string())
            })
        );
        assert_eq!(view.count_line, "Showing 0 of 3");
        assert_eq!(view.selected, None);
        assert_eq!(view.indicators, vec!["search: \"zzz\"".to_string()]);
        assert_eq!(view.cards[0].count, 3);
    }

    #[test]
    fn missing_state_renders_loading() {
        let store = ResourceStore::new(CacheSettings::default());
        let view = render_current_page(&store, ResourceKind::Secrets, context(RenderMode::LoadMore));
        assert_eq!(view.empty, Some(EmptyState::Loading { estimate: None }));
    }

    #[test]
    fn elapsed_seconds_use_largest_unit() {
        assert_eq!(format_elapsed_seconds(59), "59s");
        assert_eq!(format_elapsed_seconds(3_600), "1h");
        assert_eq!(format_elapsed_seconds(172_800), "2d");
    }
}
