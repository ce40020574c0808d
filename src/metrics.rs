use serde_json::Value;
use std::collections::BTreeMap;

use crate::model::{ClusterCapacity, ResourceKind};
use crate::query::{ResourceUsage, resource_usage, status_counts};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardMetrics {
    pub total_pods: usize,
    pub phase_counts: BTreeMap<String, usize>,
    pub requested: ResourceUsage,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub gpu_percent: f64,
}

impl DashboardMetrics {
    pub fn phase(&self, phase: &str) -> usize {
        self.phase_counts.get(phase).copied().unwrap_or(0)
    }
}

/// Pod phase counts and summed requests against cluster capacity.
pub fn compute_dashboard_metrics(pods: &[Value], capacity: ClusterCapacity) -> DashboardMetrics {
    let requested = pods.iter().map(resource_usage).fold(
        ResourceUsage::default(),
        |mut total, usage| {
            total.cpu_cores += usage.cpu_cores;
            total.memory_mi += usage.memory_mi;
            total.gpu += usage.gpu;
            total
        },
    );

    DashboardMetrics {
        total_pods: pods.len(),
        phase_counts: status_counts(ResourceKind::Pods, pods),
        cpu_percent: percent(requested.cpu_cores, capacity.cpu_cores),
        memory_percent: percent(requested.memory_mi, capacity.memory_mi),
        gpu_percent: percent(requested.gpu, capacity.gpu),
        requested,
    }
}

fn percent(used: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        return 0.0;
    }
    (used / capacity * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::compute_dashboard_metrics;
    use crate::model::ClusterCapacity;
    use serde_json::{Value, json};

    fn pod(phase: &str, cpu: &str, memory: &str, gpu: u64) -> Value {
        json!({
            "metadata": {"name": "p"},
            "spec": {"containers": [{"resources": {"requests": {
                "cpu": cpu, "memory": memory, "nvidia.com/gpu": gpu.to_string()
            }}}]},
            "status": {"phase": phase}
        })
    }

    #[test]
    fn metrics_sum_requests_against_capacity() {
        let pods = vec![
            pod("Running", "2", "1Gi", 1),
            pod("Running", "500m", "512Mi", 0),
            pod("Pending", "1500m", "512Mi", 1),
        ];
        let capacity = ClusterCapacity {
            cpu_cores: 8.0,
            memory_mi: 4096.0,
            gpu: 4.0,
        };

        let metrics = compute_dashboard_metrics(&pods, capacity);
        assert_eq!(metrics.total_pods, 3);
        assert_eq!(metrics.phase("Running"), 2);
        assert_eq!(metrics.phase("Failed"), 0);
        assert_eq!(metrics.requested.cpu_cores, 4.0);
        assert_eq!(metrics.cpu_percent, 50.0);
        assert_eq!(metrics.memory_percent, 50.0);
        assert_eq!(metrics.gpu_percent, 50.0);
    }

    #[test]
    fn percentages_are_capped() {
        let pods = vec![pod("Running", "64", "1Gi", 0)];
        let metrics = compute_dashboard_metrics(
            &pods,
            ClusterCapacity {
                cpu_cores: 32.0,
                memory_mi: 0.0,
                gpu: 8.0,
            },
        );
        assert_eq!(metrics.cpu_percent, 100.0);
        assert_eq!(metrics.memory_percent, 0.0);
    }
}
