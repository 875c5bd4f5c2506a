use std::path::PathBuf;

use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::analysis::{AnalysisResult, GapAnalyzer};
use crate::config::Config;
use crate::error::OptimizerError;
use crate::generation::{GenerationError, Generator};
use crate::input::{InputRoot, JobDescription, Profile};
use crate::providers::LlmAdapter;

/// Result of one successful run.
#[derive(Debug)]
pub struct Outcome {
    pub analysis: AnalysisResult,
    pub artifacts: Vec<PathBuf>,
}

/// Render the documents for the analysis verdict and write them as one batch.
///
/// Qualified: resume and cover letter. Not qualified: improvement plan only.
pub fn produce_documents(
    generator: &dyn Generator,
    profile: &Profile,
    job_desc: &JobDescription,
    analysis: &AnalysisResult,
) -> Result<Vec<PathBuf>, GenerationError> {
    let artifacts = if analysis.qualified() {
        let mut artifacts = generator.resume(profile, analysis)?;
        artifacts.extend(generator.cover_letter(profile, job_desc)?);
        artifacts
    } else {
        generator.improvement_plan(analysis)?
    };
    generator.write_all(artifacts)
}

/// One invocation: read inputs, analyze, produce documents.
pub struct Pipeline<'a> {
    config: &'a Config,
    inputs: &'a InputRoot,
    adapter: &'a dyn LlmAdapter,
    generator: &'a dyn Generator,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        inputs: &'a InputRoot,
        adapter: &'a dyn LlmAdapter,
        generator: &'a dyn Generator,
    ) -> Self {
        Self {
            config,
            inputs,
            adapter,
            generator,
        }
    }

    pub async fn run(&self) -> Result<Outcome, OptimizerError> {
        let run_id = Uuid::now_v7();
        self.run_inner()
            .instrument(info_span!("run", %run_id, provider = self.adapter.name()))
            .await
    }

    async fn run_inner(&self) -> Result<Outcome, OptimizerError> {
        let settings = self.config.inputs();
        let profile = self.inputs.read_profile(&settings.profile)?;
        let job_desc = self.inputs.read_job_description(&settings.job_description)?;
        info!(
            profile = %settings.profile.display(),
            job_description = %settings.job_description.display(),
            "inputs loaded"
        );

        let analysis = GapAnalyzer::new(self.adapter, self.config.analysis())
            .analyze_gaps(&profile, &job_desc)
            .await?;

        let artifacts = produce_documents(self.generator, &profile, &job_desc, &analysis)?;
        info!(
            qualified = analysis.qualified(),
            artifacts = artifacts.len(),
            "run complete"
        );

        Ok(Outcome {
            analysis,
            artifacts,
        })
    }
}
