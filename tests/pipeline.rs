//! End-to-end runs with a deterministic stub adapter and temporary directories.

use std::collections::BTreeMap;
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use applicant_optimizer::OptimizerError;
use applicant_optimizer::analysis::{AnalysisError, AnalysisResult};
use applicant_optimizer::config::Config;
use applicant_optimizer::generation::{Artifact, DocumentGenerator, GenerationError, Generator};
use applicant_optimizer::input::{InputError, InputRoot, JobDescription, Profile};
use applicant_optimizer::pipeline::{Pipeline, produce_documents};
use applicant_optimizer::providers::{AdapterError, AdapterResponse, LlmAdapter, RequestConfig};
use async_trait::async_trait;
use serde_json::{Value, json};

const CONFIG: &str = r#"
[resume_analysis]
model = "openai/gpt-4"
temperature = 0.7
max_tokens = 1000

[resume_generation]
output_dir = "./data/generated"
formats = ["md", "json"]
"#;

struct StubAdapter {
    content: Value,
}

#[async_trait]
impl LlmAdapter for StubAdapter {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _system_message: &str,
        config: &RequestConfig,
    ) -> Result<AdapterResponse, AdapterError> {
        Ok(AdapterResponse {
            content: self.content.clone(),
            model: config.model.clone(),
            token_usage: BTreeMap::from([("total_tokens".to_owned(), 42)]),
        })
    }
}

struct RateLimitedAdapter;

#[async_trait]
impl LlmAdapter for RateLimitedAdapter {
    fn name(&self) -> &str {
        "rate-limited"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _system_message: &str,
        _config: &RequestConfig,
    ) -> Result<AdapterResponse, AdapterError> {
        Err(AdapterError::RateLimited {
            retry_after_secs: Some(30),
        })
    }
}

/// Records which documents were requested; writes nothing.
#[derive(Default)]
struct RecordingGenerator {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingGenerator {
    fn artifact(&self, name: &'static str) -> Vec<Artifact> {
        self.calls.lock().unwrap().push(name);
        vec![Artifact {
            path: PathBuf::from(name),
            body: String::new(),
        }]
    }
}

impl Generator for RecordingGenerator {
    fn resume(&self, _: &Profile, _: &AnalysisResult) -> Result<Vec<Artifact>, GenerationError> {
        Ok(self.artifact("resume"))
    }

    fn cover_letter(&self, _: &Profile, _: &JobDescription) -> Result<Vec<Artifact>, GenerationError> {
        Ok(self.artifact("cover_letter"))
    }

    fn improvement_plan(&self, _: &AnalysisResult) -> Result<Vec<Artifact>, GenerationError> {
        Ok(self.artifact("improvement_plan"))
    }

    fn write_all(&self, artifacts: Vec<Artifact>) -> Result<Vec<PathBuf>, GenerationError> {
        Ok(artifacts.into_iter().map(|a| a.path).collect())
    }
}

fn analysis_content(qualified: bool) -> Value {
    let score = if qualified { 86 } else { 38 };
    json!({
        "qualified": qualified,
        "gap_analysis": ["Kubernetes"],
        "improvement_plan": ["Earn the CKA"],
        "ats_score": score
    })
}

fn workspace() -> (tempfile::TempDir, InputRoot) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("input")).unwrap();
    std::fs::write(
        dir.path().join("input/linkedin_profile.json"),
        r#"{"name": "Grace Hopper", "headline": "Compiler engineer", "skills": ["COBOL", "Rust"]}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("input/job_description.txt"),
        "Platform Engineer\nRequires Kubernetes and Rust.",
    )
    .unwrap();
    let root = InputRoot::new(dir.path()).unwrap();
    (dir, root)
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn profile() -> Profile {
    match json!({"name": "Grace Hopper"}) {
        Value::Object(fields) => Profile::from_object(fields),
        _ => unreachable!(),
    }
}

#[test]
fn qualified_produces_resume_and_cover_letter() {
    let generator = RecordingGenerator::default();
    let analysis = AnalysisResult::from_content(&analysis_content(true)).unwrap();
    let job = JobDescription::new("Platform Engineer").unwrap();

    let written = produce_documents(&generator, &profile(), &job, &analysis).unwrap();

    assert_eq!(*generator.calls.lock().unwrap(), vec!["resume", "cover_letter"]);
    assert_eq!(written, vec![PathBuf::from("resume"), PathBuf::from("cover_letter")]);
}

#[test]
fn not_qualified_produces_improvement_plan_only() {
    let generator = RecordingGenerator::default();
    let analysis = AnalysisResult::from_content(&analysis_content(false)).unwrap();
    let job = JobDescription::new("Platform Engineer").unwrap();

    produce_documents(&generator, &profile(), &job, &analysis).unwrap();

    assert_eq!(*generator.calls.lock().unwrap(), vec!["improvement_plan"]);
}

#[tokio::test]
async fn qualified_run_writes_documents() {
    let (dir, inputs) = workspace();
    let config = Config::from_str(CONFIG).unwrap();
    let adapter = StubAdapter {
        content: analysis_content(true),
    };
    let generator = DocumentGenerator::new(config.generation(), inputs.path());

    let outcome = Pipeline::new(&config, &inputs, &adapter, &generator)
        .run()
        .await
        .unwrap();

    assert!(outcome.analysis.qualified());
    assert_eq!(outcome.artifacts.len(), 4);
    let out_dir = dir.path().join("data/generated");
    assert_eq!(
        file_names(&out_dir),
        vec!["cover_letter.json", "cover_letter.md", "resume.json", "resume.md"]
    );
    let resume = std::fs::read_to_string(out_dir.join("resume.md")).unwrap();
    assert!(resume.starts_with("# Grace Hopper\n"));
    assert!(resume.contains("Estimated ATS score: 86/100"));
    let letter = std::fs::read_to_string(out_dir.join("cover_letter.md")).unwrap();
    assert!(letter.contains("following position: Platform Engineer"));
}

#[tokio::test]
async fn unqualified_run_writes_improvement_plan() {
    let (dir, inputs) = workspace();
    let config = Config::from_str(CONFIG).unwrap();
    let adapter = StubAdapter {
        content: analysis_content(false),
    };
    let generator = DocumentGenerator::new(config.generation(), inputs.path());

    let outcome = Pipeline::new(&config, &inputs, &adapter, &generator)
        .run()
        .await
        .unwrap();

    assert!(!outcome.analysis.qualified());
    assert_eq!(
        file_names(&dir.path().join("data/generated")),
        vec!["improvement_plan.json", "improvement_plan.md"]
    );
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let (_dir, inputs) = workspace();
    let config = Config::from_str(CONFIG).unwrap();
    let adapter = StubAdapter {
        content: analysis_content(false),
    };
    let generator = RecordingGenerator::default();
    let pipeline = Pipeline::new(&config, &inputs, &adapter, &generator);

    let first = pipeline.run().await.unwrap();
    let second = pipeline.run().await.unwrap();
    assert_eq!(first.analysis, second.analysis);
    assert_eq!(first.artifacts, second.artifacts);
}

#[tokio::test]
async fn schema_failure_writes_nothing() {
    let (dir, inputs) = workspace();
    let config = Config::from_str(CONFIG).unwrap();
    let adapter = StubAdapter {
        content: json!({"qualified": "yes"}),
    };
    let generator = DocumentGenerator::new(config.generation(), inputs.path());

    let err = Pipeline::new(&config, &inputs, &adapter, &generator)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OptimizerError::Analysis(AnalysisError::Schema(_))
    ));
    assert!(!dir.path().join("data").exists());
}

#[tokio::test]
async fn provider_failure_keeps_cause_chain() {
    let (_dir, inputs) = workspace();
    let config = Config::from_str(CONFIG).unwrap();
    let generator = RecordingGenerator::default();

    let err = Pipeline::new(&config, &inputs, &RateLimitedAdapter, &generator)
        .run()
        .await
        .unwrap_err();

    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    assert_eq!(
        chain,
        vec![
            "analysis error",
            "language-model request for gap analysis failed",
            "provider rate limit exceeded",
        ]
    );
    assert!(generator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_profile_is_input_error() {
    let (dir, inputs) = workspace();
    std::fs::remove_file(dir.path().join("input/linkedin_profile.json")).unwrap();
    let config = Config::from_str(CONFIG).unwrap();
    let adapter = StubAdapter {
        content: analysis_content(true),
    };
    let generator = RecordingGenerator::default();

    let err = Pipeline::new(&config, &inputs, &adapter, &generator)
        .run()
        .await
        .unwrap_err();

    match err {
        OptimizerError::Input(InputError::NotFound { path }) => {
            assert_eq!(path, PathBuf::from("input/linkedin_profile.json"));
        }
        other => panic!("expected Input(NotFound), got {other:?}"),
    }
}
