pub mod prompts;
mod schema;

pub use schema::{SchemaError, Violation};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AnalysisSettings;
use crate::input::{JobDescription, Profile};
use crate::providers::{AdapterError, LlmAdapter, RequestConfig};

/// Orchestrator failures. Messages are provider-agnostic; the underlying
/// cause stays reachable through `source()`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("language-model request for gap analysis failed")]
    Provider(#[source] AdapterError),

    #[error("gap analysis response did not match the expected schema")]
    Schema(#[source] SchemaError),
}

/// Validated gap analysis. Only obtainable through schema validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    qualified: bool,
    gap_analysis: Vec<Value>,
    improvement_plan: Vec<Value>,
    ats_score: u8,
}

impl AnalysisResult {
    /// Validate normalized adapter content against the analysis schema.
    pub fn from_content(content: &Value) -> Result<Self, SchemaError> {
        schema::validate(content)
    }

    pub fn qualified(&self) -> bool {
        self.qualified
    }

    /// Findings: strings or JSON objects, in provider order.
    pub fn gap_analysis(&self) -> &[Value] {
        &self.gap_analysis
    }

    /// Actions: strings or JSON objects, in provider order.
    pub fn improvement_plan(&self) -> &[Value] {
        &self.improvement_plan
    }

    pub fn ats_score(&self) -> u8 {
        self.ats_score
    }
}

/// Runs the ATS gap analysis through any `LlmAdapter`.
pub struct GapAnalyzer<'a> {
    adapter: &'a dyn LlmAdapter,
    request: RequestConfig,
}

impl<'a> GapAnalyzer<'a> {
    pub fn new(adapter: &'a dyn LlmAdapter, settings: &AnalysisSettings) -> Self {
        Self {
            adapter,
            request: RequestConfig::from(settings),
        }
    }

    /// One adapter call, no retry at this layer. Schema failures are final.
    pub async fn analyze_gaps(
        &self,
        profile: &Profile,
        job_desc: &JobDescription,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut data = Map::new();
        data.insert("profile".to_owned(), Value::Object(profile.fields().clone()));
        data.insert(
            "job_description".to_owned(),
            Value::String(job_desc.as_str().to_owned()),
        );

        let response = self
            .adapter
            .analyze(&Value::Object(data), prompts::ATS_RUBRIC, &self.request)
            .await
            .map_err(|e| {
                warn!(provider = self.adapter.name(), error = %e, "gap analysis request failed");
                AnalysisError::Provider(e)
            })?;

        let result = AnalysisResult::from_content(&response.content).map_err(|e| {
            warn!(provider = self.adapter.name(), error = %e, "gap analysis response rejected");
            AnalysisError::Schema(e)
        })?;

        info!(
            model = %response.model,
            qualified = result.qualified,
            ats_score = result.ats_score,
            "gap analysis complete"
        );
        Ok(result)
    }
}
