pub mod render;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::AnalysisResult;
use crate::config::{GenerationSettings, OutputFormat};
use crate::input::{JobDescription, Profile};
use render::Document;

/// Document stems written by `DocumentGenerator`.
const DOCUMENT_NAMES: [&str; 3] = ["resume", "cover_letter", "improvement_plan"];

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to encode {name} as JSON")]
    Encode {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot create output directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write artifact {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A rendered document that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub body: String,
}

/// Extension point for document output. Rendering methods never touch the
/// filesystem; `write_all` persists a batch all-or-nothing.
pub trait Generator: Send + Sync {
    fn resume(
        &self,
        profile: &Profile,
        analysis: &AnalysisResult,
    ) -> Result<Vec<Artifact>, GenerationError>;

    fn cover_letter(
        &self,
        profile: &Profile,
        job_desc: &JobDescription,
    ) -> Result<Vec<Artifact>, GenerationError>;

    fn improvement_plan(&self, analysis: &AnalysisResult) -> Result<Vec<Artifact>, GenerationError>;

    fn write_all(&self, artifacts: Vec<Artifact>) -> Result<Vec<PathBuf>, GenerationError>;
}

/// Renders each document once per configured format beneath `output_dir`.
#[derive(Debug, Clone)]
pub struct DocumentGenerator {
    output_dir: PathBuf,
    formats: Vec<OutputFormat>,
}

impl DocumentGenerator {
    /// `settings.output_dir` is validated relative, so it stays beneath `root`.
    pub fn new(settings: &GenerationSettings, root: &Path) -> Self {
        Self {
            output_dir: root.join(&settings.output_dir),
            formats: settings.formats.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn artifacts(&self, name: &'static str, document: &Document) -> Result<Vec<Artifact>, GenerationError> {
        self.formats
            .iter()
            .map(|format| {
                let body = document
                    .render(*format)
                    .map_err(|e| GenerationError::Encode { name, source: e })?;
                Ok(Artifact {
                    path: self.output_dir.join(format!("{name}.{}", format.extension())),
                    body,
                })
            })
            .collect()
    }
}

impl Generator for DocumentGenerator {
    fn resume(
        &self,
        profile: &Profile,
        analysis: &AnalysisResult,
    ) -> Result<Vec<Artifact>, GenerationError> {
        self.artifacts("resume", &render::resume(profile, analysis))
    }

    fn cover_letter(
        &self,
        profile: &Profile,
        job_desc: &JobDescription,
    ) -> Result<Vec<Artifact>, GenerationError> {
        self.artifacts("cover_letter", &render::cover_letter(profile, job_desc))
    }

    fn improvement_plan(&self, analysis: &AnalysisResult) -> Result<Vec<Artifact>, GenerationError> {
        self.artifacts("improvement_plan", &render::improvement_plan(analysis))
    }

    /// Stage every artifact to a hidden `.partial` file, then rename into place.
    ///
    /// The batch replaces every document a previous run left in `output_dir`,
    /// including those of the other verdict. Replaced files are moved aside to
    /// `.bak` siblings and restored if anything fails.
    fn write_all(&self, artifacts: Vec<Artifact>) -> Result<Vec<PathBuf>, GenerationError> {
        create_output_dir(&self.output_dir)?;

        let targets: Vec<PathBuf> = artifacts.iter().map(|a| a.path.clone()).collect();
        let superseded = self.superseded(&targets);

        let mut batch = Batch::default();
        if let Err(e) = batch.apply(artifacts, superseded) {
            batch.rollback();
            return Err(e);
        }
        batch.commit();

        info!(
            dir = %self.output_dir.display(),
            count = targets.len(),
            "artifacts written"
        );
        Ok(targets)
    }
}

impl DocumentGenerator {
    /// Existing files this batch will replace: its own targets plus any
    /// document a previous run wrote in any format.
    fn superseded(&self, targets: &[PathBuf]) -> Vec<PathBuf> {
        let known = DOCUMENT_NAMES.into_iter().flat_map(move |name| {
            OutputFormat::ALL
                .into_iter()
                .map(move |format| self.output_dir.join(format!("{name}.{}", format.extension())))
        });

        let mut paths: Vec<PathBuf> = Vec::new();
        for path in targets.iter().cloned().chain(known) {
            if replaceable(&path) && !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }
}

/// Filesystem changes made by one `write_all`.
#[derive(Debug, Default)]
struct Batch {
    /// (staging file, target)
    staged: Vec<(PathBuf, PathBuf)>,
    /// (backup, original location)
    backups: Vec<(PathBuf, PathBuf)>,
    placed: Vec<PathBuf>,
}

impl Batch {
    fn apply(
        &mut self,
        artifacts: Vec<Artifact>,
        superseded: Vec<PathBuf>,
    ) -> Result<(), GenerationError> {
        for artifact in artifacts {
            let staging = sibling(&artifact.path, "partial");
            let result = std::fs::write(&staging, &artifact.body);
            self.staged.push((staging, artifact.path.clone()));
            result.map_err(|e| write_error(&artifact.path, e))?;
        }

        for original in superseded {
            let backup = sibling(&original, "bak");
            std::fs::rename(&original, &backup).map_err(|e| write_error(&original, e))?;
            self.backups.push((backup, original));
        }

        for (staging, target) in &self.staged {
            std::fs::rename(staging, target).map_err(|e| write_error(target, e))?;
            self.placed.push(target.clone());
        }
        Ok(())
    }

    fn commit(self) {
        discard(self.backups.iter().map(|(backup, _)| backup.as_path()));
    }

    /// Best-effort. Failures are logged; the caller reports the write error.
    fn rollback(self) {
        discard(self.placed.iter().map(PathBuf::as_path));
        discard(self.staged.iter().map(|(staging, _)| staging.as_path()));
        for (backup, original) in self.backups.iter().rev() {
            if let Err(e) = std::fs::rename(backup, original) {
                warn!(
                    path = %original.display(),
                    error = %e,
                    "failed to restore previous artifact"
                );
            }
        }
    }
}

fn create_output_dir(dir: &Path) -> Result<(), GenerationError> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir).map_err(|e| GenerationError::CreateDir {
        path: dir.to_owned(),
        source: e,
    })
}

/// Hidden sibling of `path`: `dir/.name.{suffix}`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{suffix}"))
}

/// Anything but a directory can be moved aside and restored.
fn replaceable(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| !m.is_dir())
}

fn write_error(path: &Path, source: std::io::Error) -> GenerationError {
    GenerationError::Write {
        path: path.to_owned(),
        source,
    }
}

fn discard<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to remove artifact");
            }
        }
    }
}
