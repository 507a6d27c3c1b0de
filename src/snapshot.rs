//! Aggregated analysis snapshot.
//!
//! A [`Snapshot`] is a pure projection of the [`ResponseSlots`]: it is rebuilt
//! from scratch after every slot update and never patched in place. Field
//! names match the JSON the UI expects.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::protocol::messages::{BreakdownResponse, LinearModel, ThroughputResponse};
use crate::session::ResponseSlots;

/// UI-facing view of everything the backend reported so far.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Snapshot {
    pub project_root: Option<String>,
    pub project_entry_point: Option<String>,
    /// Serialized as `{}` while no throughput response arrived.
    #[serde(serialize_with = "or_empty_object")]
    pub throughput: Option<ThroughputSummary>,
    /// Serialized as `{}` while no breakdown response arrived.
    #[serde(serialize_with = "or_empty_object")]
    pub breakdown: Option<BreakdownSummary>,
    /// `(device name, predicted runtime in ms)` in backend order.
    pub habitat: Vec<(String, f32)>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ThroughputSummary {
    pub samples_per_second: f32,
    pub predicted_max_samples_per_second: f32,
    /// `(slope, bias)` of run time (ms) against batch size.
    pub run_time_ms: Option<(f64, f64)>,
    /// `(slope, bias)` of peak memory (bytes) against batch size.
    pub peak_usage_bytes: Option<(f64, f64)>,
    /// Source location of the batch size, as `path:line`.
    pub batch_size_context: Option<String>,
    pub can_manipulate_batch_size: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BreakdownSummary {
    pub peak_usage_bytes: u64,
    pub memory_capacity_bytes: u64,
    pub iteration_run_time_ms: f32,
    pub batch_size: u32,
    pub num_nodes_operation_tree: usize,
    pub num_nodes_weight_tree: usize,
}

impl Snapshot {
    /// Project the current slot contents.
    pub fn build(slots: &ResponseSlots) -> Self {
        let (project_root, project_entry_point) = match &slots.initialize {
            Some(init) => (
                Some(init.server_project_root.clone()),
                init.entry_point.as_ref().map(|path| path.joined()),
            ),
            None => (None, None),
        };

        let habitat = slots
            .habitat
            .iter()
            .flat_map(|habitat| &habitat.predictions)
            .map(|prediction| (prediction.device_name.clone(), prediction.runtime_ms))
            .collect();

        Self {
            project_root,
            project_entry_point,
            throughput: slots.throughput.as_ref().map(ThroughputSummary::from),
            breakdown: slots.breakdown.as_ref().map(BreakdownSummary::from),
            habitat,
        }
    }
}

impl From<&ThroughputResponse> for ThroughputSummary {
    fn from(msg: &ThroughputResponse) -> Self {
        Self {
            samples_per_second: msg.samples_per_second,
            predicted_max_samples_per_second: msg.predicted_max_samples_per_second,
            run_time_ms: msg.run_time_ms.as_ref().map(model_pair),
            peak_usage_bytes: msg.peak_usage_bytes.as_ref().map(model_pair),
            batch_size_context: msg.batch_size_context.as_ref().map(ToString::to_string),
            can_manipulate_batch_size: msg.can_manipulate_batch_size,
        }
    }
}

impl From<&BreakdownResponse> for BreakdownSummary {
    fn from(msg: &BreakdownResponse) -> Self {
        Self {
            peak_usage_bytes: msg.peak_usage_bytes,
            memory_capacity_bytes: msg.memory_capacity_bytes,
            iteration_run_time_ms: msg.iteration_run_time_ms,
            batch_size: msg.batch_size,
            num_nodes_operation_tree: msg.operation_tree.len(),
            num_nodes_weight_tree: msg.weight_tree.len(),
        }
    }
}

fn model_pair(model: &LinearModel) -> (f64, f64) {
    (model.slope, model.bias)
}

fn or_empty_object<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(value) => value.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}
