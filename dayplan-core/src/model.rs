//! Capability boundary for the language model.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ModelContext;
use crate::error::PlanResult;

/// Black-box call into the scheduling model: bounded textual context in,
/// raw JSON out. Treated as non-deterministic, fallible, and
/// schema-violating in practice; the normalizer defends against the output.
///
/// Implementations perform exactly one outbound call per invocation and
/// hold no state; the retry budget lives in the pipeline, not here.
#[async_trait]
pub trait ScheduleModel: Send + Sync {
    async fn generate(&self, context: &ModelContext) -> PlanResult<Value>;
}
