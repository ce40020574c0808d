use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::{ResourceKind, SortDirection, SortField, SortSpec};

const MEBIBYTE: f64 = 1_048_576.0;

pub fn resource_name(item: &Value) -> &str {
    item.pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("")
}

pub fn resource_namespace(item: &Value) -> &str {
    item.pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or("")
}

pub fn resource_status(kind: ResourceKind, item: &Value) -> String {
    match kind {
        ResourceKind::Pods => item
            .pointer("/status/phase")
            .and_then(Value::as_str)
            .filter(|phase| !phase.is_empty())
            .unwrap_or("Unknown")
            .to_string(),
        ResourceKind::Deployments => {
            let desired = item
                .pointer("/spec/replicas")
                .or_else(|| item.pointer("/status/replicas"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let ready = item
                .pointer("/status/readyReplicas")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let label = if ready >= desired { "Ready" } else { "NotReady" };
            label.to_string()
        }
        ResourceKind::InferenceServices => inference_ready(item).to_string(),
        ResourceKind::Services => item
            .pointer("/spec/type")
            .and_then(Value::as_str)
            .unwrap_or("ClusterIP")
            .to_string(),
        ResourceKind::Secrets => item
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("Opaque")
            .to_string(),
        ResourceKind::ConfigMaps => "Active".to_string(),
    }
}

fn inference_ready(item: &Value) -> &'static str {
    let condition = item
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|condition| condition.get("type").and_then(Value::as_str) == Some("Ready"))
        });
    match condition
        .and_then(|condition| condition.get("status"))
        .and_then(Value::as_str)
    {
        Some("True") => "Ready",
        Some("False") => "NotReady",
        _ => "Unknown",
    }
}

pub fn matches_status(kind: ResourceKind, item: &Value, status: &str) -> bool {
    resource_status(kind, item) == status
}

pub fn matches_search(item: &Value, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    resource_name(item).to_lowercase().contains(&needle)
        || resource_namespace(item).to_lowercase().contains(&needle)
}

pub fn filter_items(
    kind: ResourceKind,
    items: &[Value],
    status: Option<&str>,
    search: Option<&str>,
) -> Vec<Value> {
    items
        .iter()
        .filter(|item| status.is_none_or(|status| matches_status(kind, item, status)))
        .filter(|item| search.is_none_or(|needle| matches_search(item, needle)))
        .cloned()
        .collect()
}

pub fn status_counts(kind: ResourceKind, items: &[Value]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(resource_status(kind, item)).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Missing,
    Number(f64),
    Text(String),
}

pub fn sort_key(kind: ResourceKind, item: &Value, field: &SortField) -> SortKey {
    match field {
        SortField::Name => SortKey::Text(resource_name(item).to_lowercase()),
        SortField::Namespace => SortKey::Text(resource_namespace(item).to_lowercase()),
        SortField::Status => SortKey::Text(resource_status(kind, item).to_lowercase()),
        SortField::Age => creation_millis(item)
            .map(|millis| SortKey::Number(millis as f64))
            .unwrap_or(SortKey::Missing),
        SortField::Cpu => SortKey::Number(resource_usage(item).cpu_cores),
        SortField::Gpu => SortKey::Number(resource_usage(item).gpu),
        SortField::Memory => SortKey::Number(resource_usage(item).memory_mi),
        SortField::Property(path) => match lookup_path(item, path) {
            None | Some(Value::Null) => SortKey::Missing,
            Some(Value::Number(number)) => number
                .as_f64()
                .map(SortKey::Number)
                .unwrap_or(SortKey::Missing),
            Some(Value::String(text)) => SortKey::Text(text.to_lowercase()),
            Some(other) => SortKey::Text(other.to_string().to_lowercase()),
        },
    }
}

fn compare_keys(left: &SortKey, right: &SortKey) -> Ordering {
    match (left, right) {
        (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
        (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
        (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
        (SortKey::Missing, _) => Ordering::Less,
        (_, SortKey::Missing) => Ordering::Greater,
        (SortKey::Number(a), SortKey::Text(b)) => a.to_string().cmp(b),
        (SortKey::Text(a), SortKey::Number(b)) => a.cmp(&b.to_string()),
    }
}

pub fn compare_items(kind: ResourceKind, left: &Value, right: &Value, sort: &SortSpec) -> Ordering {
    let ordering = compare_keys(
        &sort_key(kind, left, &sort.field),
        &sort_key(kind, right, &sort.field),
    );
    match sort.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Stable: equal keys keep their current relative order.
pub fn sort_items(kind: ResourceKind, items: &mut [Value], sort: &SortSpec) {
    items.sort_by(|left, right| compare_items(kind, left, right, sort));
}

pub fn lookup_path<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for segment in path.split('.').filter(|segment| !segment.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(list) => list.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn creation_millis(item: &Value) -> Option<i64> {
    item.pointer("/metadata/creationTimestamp")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|timestamp| timestamp.timestamp_millis())
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsage {
    pub cpu_cores: f64,
    pub memory_mi: f64,
    pub gpu: f64,
}

/// Sums container requests; a container without a request for a key
/// contributes its limit for that key instead.
pub fn resource_usage(item: &Value) -> ResourceUsage {
    let Some(containers) = item
        .pointer("/spec/containers")
        .and_then(Value::as_array)
    else {
        return ResourceUsage::default();
    };

    let mut usage = ResourceUsage::default();
    for container in containers {
        let requests = container.pointer("/resources/requests");
        let limits = container.pointer("/resources/limits");
        let quantity = |key: &str| {
            requests
                .and_then(|map| map.get(key))
                .or_else(|| limits.and_then(|map| map.get(key)))
        };

        if let Some(cpu) = quantity("cpu").and_then(quantity_text) {
            usage.cpu_cores += parse_cpu_cores(&cpu).unwrap_or(0.0);
        }
        if let Some(memory) = quantity("memory").and_then(quantity_text) {
            usage.memory_mi += parse_memory_mi(&memory).unwrap_or(0.0);
        }
        if let Some(gpu) = quantity("nvidia.com/gpu")
            .or_else(|| quantity("gpu"))
            .and_then(quantity_text)
        {
            usage.gpu += gpu.trim().parse::<f64>().unwrap_or(0.0);
        }
    }
    usage
}

fn quantity_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

pub fn parse_cpu_cores(value: &str) -> Option<f64> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let (number, divisor) = if let Some(number) = raw.strip_suffix('m') {
        (number, 1_000.0)
    } else if let Some(number) = raw.strip_suffix('u') {
        (number, 1_000_000.0)
    } else if let Some(number) = raw.strip_suffix('n') {
        (number, 1_000_000_000.0)
    } else {
        (raw, 1.0)
    };

    let cores = number.parse::<f64>().ok()? / divisor;
    (cores.is_finite() && cores >= 0.0).then_some(cores)
}

pub fn parse_memory_mi(value: &str) -> Option<f64> {
    const UNITS: [(&str, f64); 14] = [
        ("Ei", 1_152_921_504_606_846_976.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ti", 1_099_511_627_776.0),
        ("Gi", 1_073_741_824.0),
        ("Mi", 1_048_576.0),
        ("Ki", 1_024.0),
        ("E", 1_000_000_000_000_000_000.0),
        ("P", 1_000_000_000_000_000.0),
        ("T", 1_000_000_000_000.0),
        ("G", 1_000_000_000.0),
        ("M", 1_000_000.0),
        ("K", 1_000.0),
        ("k", 1_000.0),
        ("m", 0.001),
    ];

    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let (number, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| raw.strip_suffix(suffix).map(|n| (n, *multiplier)))
        .unwrap_or((raw, 1.0));

    let bytes = number.parse::<f64>().ok()? * multiplier;
    (bytes.is_finite() && bytes >= 0.0).then_some(bytes / MEBIBYTE)
}

#[cfg(test)]
mod tests {
    use super::{
        MEBIBYTE, filter_items, lookup_path, parse_cpu_cores, parse_memory_mi, resource_name,
        resource_status, resource_usage, sort_items,
    };
    use crate::model::{ResourceKind, SortDirection, SortField, SortSpec};
    use serde_json::{Value, json};

    fn pod(name: &str, namespace: &str, phase: &str) -> Value {
        json!({
            "metadata": {"name": name, "namespace": namespace},
            "status": {"phase": phase}
        })
    }

    #[test]
    fn status_accessors_follow_resource_kind() {
        assert_eq!(resource_status(ResourceKind::Pods, &pod("a", "x", "Pending")), "Pending");
        assert_eq!(resource_status(ResourceKind::Pods, &json!({})), "Unknown");

        let ready = json!({"spec": {"replicas": 2}, "status": {"readyReplicas": 2}});
        let partial = json!({"spec": {"replicas": 3}, "status": {"readyReplicas": 1}});
        assert_eq!(resource_status(ResourceKind::Deployments, &ready), "Ready");
        assert_eq!(resource_status(ResourceKind::Deployments, &partial), "NotReady");

        let isvc = json!({"status": {"conditions": [
            {"type": "PredictorReady", "status": "True"},
            {"type": "Ready", "status": "False"}
        ]}});
        assert_eq!(resource_status(ResourceKind::InferenceServices, &isvc), "NotReady");
        assert_eq!(resource_status(ResourceKind::InferenceServices, &json!({})), "Unknown");

        assert_eq!(resource_status(ResourceKind::Services, &json!({})), "ClusterIP");
        assert_eq!(
            resource_status(ResourceKind::Secrets, &json!({"type": "kubernetes.io/tls"})),
            "kubernetes.io/tls"
        );
        assert_eq!(resource_status(ResourceKind::ConfigMaps, &json!({})), "Active");
    }

    #[test]
    fn search_matches_name_or_namespace_case_insensitively() {
        let items = vec![
            json!({"metadata": {"name": "web-frontend", "namespace": "default"}}),
            json!({"metadata": {"name": "db", "namespace": "web"}}),
            json!({"metadata": {"name": "cache", "namespace": "infra"}}),
        ];
        let found = filter_items(ResourceKind::Services, &items, None, Some("WEB"));
        let names = found.iter().map(resource_name).collect::<Vec<_>>();
        assert_eq!(names, vec!["web-frontend", "db"]);
    }

    #[test]
    fn status_and_search_combine_with_and() {
        let items = vec![
            pod("api-1", "prod", "Running"),
            pod("api-2", "prod", "Failed"),
            pod("worker", "prod", "Running"),
        ];
        let found = filter_items(ResourceKind::Pods, &items, Some("Running"), Some("api"));
        assert_eq!(found.len(), 1);
        assert_eq!(resource_name(&found[0]), "api-1");
    }

    #[test]
    fn sort_is_stable_and_direction_aware() {
        let mut items = vec![
            pod("b", "one", "Running"),
            pod("a", "two", "Running"),
            pod("c", "three", "Failed"),
        ];
        let by_status = SortSpec {
            field: SortField::Status,
            direction: SortDirection::Asc,
        };
        sort_items(ResourceKind::Pods, &mut items, &by_status);
        let names = items.iter().map(resource_name).collect::<Vec<_>>();
        assert_eq!(names, vec!["c", "b", "a"]);

        let by_name_desc = SortSpec {
            field: SortField::Name,
            direction: SortDirection::Desc,
        };
        sort_items(ResourceKind::Pods, &mut items, &by_name_desc);
        let names = items.iter().map(resource_name).collect::<Vec<_>>();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn age_sorts_by_creation_timestamp() {
        let older = json!({"metadata": {"name": "old", "creationTimestamp": "2024-01-01T00:00:00Z"}});
        let newer = json!({"metadata": {"name": "new", "creationTimestamp": "2024-06-01T00:00:00Z"}});
        let mut items = vec![newer, older];
        sort_items(
            ResourceKind::ConfigMaps,
            &mut items,
            &SortSpec {
                field: SortField::Age,
                direction: SortDirection::Asc,
            },
        );
        assert_eq!(resource_name(&items[0]), "old");
    }

    #[test]
    fn property_sort_compares_numbers_numerically() {
        let mut items = vec![
            json!({"metadata": {"name": "a"}, "spec": {"replicas": 10}}),
            json!({"metadata": {"name": "b"}, "spec": {"replicas": 9}}),
        ];
        sort_items(
            ResourceKind::Deployments,
            &mut items,
            &SortSpec {
                field: SortField::Property("spec.replicas".to_string()),
                direction: SortDirection::Asc,
            },
        );
        assert_eq!(resource_name(&items[0]), "b");
    }

    #[test]
    fn usage_sums_requests_and_falls_back_to_limits() {
        let item = json!({"spec": {"containers": [
            {"resources": {"requests": {"cpu": "250m", "memory": "512Mi"}, "limits": {"nvidia.com/gpu": "1"}}},
            {"resources": {"limits": {"cpu": "1", "memory": "1Gi", "gpu": 2}}}
        ]}});
        let usage = resource_usage(&item);
        assert_eq!(usage.cpu_cores, 1.25);
        assert_eq!(usage.memory_mi, 1536.0);
        assert_eq!(usage.gpu, 3.0);
    }

    #[test]
    fn quantities_parse_to_cores_and_mebibytes() {
        assert_eq!(parse_cpu_cores("500m"), Some(0.5));
        assert_eq!(parse_cpu_cores("2"), Some(2.0));
        assert_eq!(parse_cpu_cores("nope"), None);
        assert_eq!(parse_memory_mi("1Gi"), Some(1024.0));
        assert_eq!(parse_memory_mi("2048Ki"), Some(2.0));
        assert_eq!(parse_memory_mi("1048576"), Some(1.0));
        assert_eq!(parse_memory_mi("1M"), Some(1_000_000.0 / MEBIBYTE));
        assert_eq!(parse_memory_mi(""), None);
    }

    #[test]
    fn memory_accepts_lowercase_decimal_suffixes() {
        assert_eq!(parse_memory_mi("2048k"), Some(2_048_000.0 / MEBIBYTE));
        let milli = parse_memory_mi("1048576000m").unwrap_or_default();
        assert!((milli - 1.0).abs() < 1e-9);
        assert_eq!(parse_memory_mi("129e6"), Some(129_000_000.0 / MEBIBYTE));
    }

    #[test]
    fn lookup_path_walks_objects_and_arrays() {
        let item = json!({"spec": {"ports": [{"port": 80}]}});
        assert_eq!(lookup_path(&item, "spec.ports.0.port"), Some(&json!(80)));
        assert_eq!(lookup_path(&item, "spec.missing"), None);
    }
}
