use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::InputSettings;

const MAX_INPUT_FILE_SIZE: u64 = 1024 * 1024; // 1 MiB

#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot resolve input root {}", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input path escapes the permitted root: {}", path.display())]
    OutsideRoot { path: PathBuf },

    #[error("input file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("input path is not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("input file {} exceeds {} byte limit", path.display(), MAX_INPUT_FILE_SIZE)]
    TooLarge { path: PathBuf },

    #[error("cannot read input file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// Candidate profile: an opaque JSON object of arbitrary depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Profile(Map<String, Value>);

impl Profile {
    pub fn from_object(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// First non-empty string among `keys`, looked up at the top level.
    pub fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.0.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Job description text. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct JobDescription(String);

impl JobDescription {
    /// Returns `None` for blank text.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory that every input read must stay within. Stored canonicalized.
#[derive(Debug, Clone)]
pub struct InputRoot {
    root: PathBuf,
}

impl InputRoot {
    pub fn new(root: &Path) -> Result<Self, InputError> {
        let root = root.canonicalize().map_err(|e| InputError::Root {
            path: root.to_owned(),
            source: e,
        })?;
        Ok(Self { root })
    }

    pub fn current_dir() -> Result<Self, InputError> {
        let cwd = std::env::current_dir().map_err(|e| InputError::Root {
            path: PathBuf::from("."),
            source: e,
        })?;
        Self::new(&cwd)
    }

    /// Configured `inputs.root`, or the working directory when unset.
    pub fn from_settings(settings: &InputSettings) -> Result<Self, InputError> {
        match &settings.root {
            Some(root) => Self::new(root),
            None => Self::current_dir(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root and prove it names a regular file inside it.
    ///
    /// Lexical escapes are rejected before touching the filesystem. The surviving
    /// path is canonicalized and checked again so symlinks cannot leave the root.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, InputError> {
        let outside = || InputError::OutsideRoot {
            path: path.to_owned(),
        };

        let joined = self.root.join(path);
        let normalized = normalize_lexically(&joined).ok_or_else(outside)?;
        if !normalized.starts_with(&self.root) {
            return Err(outside());
        }

        let canonical = normalized.canonicalize().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => InputError::NotFound {
                path: path.to_owned(),
            },
            _ => InputError::Read {
                path: path.to_owned(),
                source: e,
            },
        })?;
        if !canonical.starts_with(&self.root) {
            return Err(outside());
        }

        let metadata = std::fs::metadata(&canonical).map_err(|e| InputError::Read {
            path: path.to_owned(),
            source: e,
        })?;
        if !metadata.is_file() {
            return Err(InputError::NotAFile {
                path: path.to_owned(),
            });
        }
        if metadata.len() > MAX_INPUT_FILE_SIZE {
            return Err(InputError::TooLarge {
                path: path.to_owned(),
            });
        }

        Ok(canonical)
    }

    /// Read a candidate profile. The file must hold a JSON object.
    pub fn read_profile(&self, path: &Path) -> Result<Profile, InputError> {
        let content = self.read(path)?;
        let value: Value = serde_json::from_str(&content).map_err(|e| InputError::Malformed {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        match value {
            Value::Object(fields) => Ok(Profile(fields)),
            _ => Err(InputError::Malformed {
                path: path.to_owned(),
                reason: "expected a JSON object".to_owned(),
            }),
        }
    }

    pub fn read_job_description(&self, path: &Path) -> Result<JobDescription, InputError> {
        let content = self.read(path)?;
        JobDescription::new(content).ok_or_else(|| InputError::Malformed {
            path: path.to_owned(),
            reason: "job description is empty".to_owned(),
        })
    }

    fn read(&self, path: &Path) -> Result<String, InputError> {
        let resolved = self.resolve(path)?;
        debug!(path = %resolved.display(), "reading input");
        std::fs::read_to_string(&resolved).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => InputError::Malformed {
                path: path.to_owned(),
                reason: "not valid UTF-8".to_owned(),
            },
            _ => InputError::Read {
                path: path.to_owned(),
                source: e,
            },
        })
    }
}

/// Collapse `.` and `..` without consulting the filesystem.
/// Returns `None` if `..` would climb above the filesystem root.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_with_files() -> (tempfile::TempDir, InputRoot) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("input")).unwrap();
        std::fs::write(
            dir.path().join("input/profile.json"),
            r#"{"name": "Ada Lovelace", "skills": ["analysis", "mathematics"]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("input/job.txt"),
            "\n  Senior analyst, 5+ years experience.\n",
        )
        .unwrap();
        let root = InputRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn reads_profile() {
        let (_dir, root) = root_with_files();
        let profile = root.read_profile(Path::new("input/profile.json")).unwrap();
        assert_eq!(profile.first_str(&["name"]), Some("Ada Lovelace"));
        assert!(profile.fields().contains_key("skills"));
    }

    #[test]
    fn reads_job_description_trimmed() {
        let (_dir, root) = root_with_files();
        let job = root.read_job_description(Path::new("./input/job.txt")).unwrap();
        assert_eq!(job.as_str(), "Senior analyst, 5+ years experience.");
    }

    #[test]
    fn traversal_rejected() {
        let (_dir, root) = root_with_files();
        let err = root.read_profile(Path::new("../../etc/passwd")).unwrap_err();
        match err {
            InputError::OutsideRoot { path } => assert_eq!(path, PathBuf::from("../../etc/passwd")),
            other => panic!("expected OutsideRoot, got {other:?}"),
        }
    }

    #[test]
    fn absolute_path_outside_root_rejected() {
        let (_dir, root) = root_with_files();
        let err = root.read_job_description(Path::new("/etc/hostname")).unwrap_err();
        assert!(matches!(err, InputError::OutsideRoot { .. }));
    }

    #[test]
    fn inner_traversal_that_stays_inside_is_allowed() {
        let (_dir, root) = root_with_files();
        let job = root.read_job_description(Path::new("input/../input/job.txt"));
        assert!(job.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_rejected() {
        let (dir, root) = root_with_files();
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "top secret").unwrap();
        std::os::unix::fs::symlink(&secret, dir.path().join("input/link.txt")).unwrap();

        let err = root.read_job_description(Path::new("input/link.txt")).unwrap_err();
        assert!(matches!(err, InputError::OutsideRoot { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_dir, root) = root_with_files();
        let err = root.read_profile(Path::new("input/missing.json")).unwrap_err();
        assert!(matches!(err, InputError::NotFound { .. }));
        assert!(err.to_string().contains("input/missing.json"));
    }

    #[test]
    fn directory_is_not_a_file() {
        let (_dir, root) = root_with_files();
        let err = root.read_profile(Path::new("input")).unwrap_err();
        assert!(matches!(err, InputError::NotAFile { .. }));
    }

    #[test]
    fn invalid_json_profile_is_malformed() {
        let (dir, root) = root_with_files();
        std::fs::write(dir.path().join("input/bad.json"), "{not json").unwrap();
        let err = root.read_profile(Path::new("input/bad.json")).unwrap_err();
        assert!(matches!(err, InputError::Malformed { .. }));
    }

    #[test]
    fn non_object_profile_is_malformed() {
        let (dir, root) = root_with_files();
        std::fs::write(dir.path().join("input/list.json"), "[1, 2, 3]").unwrap();
        let err = root.read_profile(Path::new("input/list.json")).unwrap_err();
        match err {
            InputError::Malformed { reason, .. } => assert_eq!(reason, "expected a JSON object"),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn blank_job_description_is_malformed() {
        let (dir, root) = root_with_files();
        std::fs::write(dir.path().join("input/blank.txt"), "  \n\t").unwrap();
        let err = root.read_job_description(Path::new("input/blank.txt")).unwrap_err();
        assert!(matches!(err, InputError::Malformed { .. }));
    }

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            Some(PathBuf::from("/a/c"))
        );
        assert_eq!(normalize_lexically(Path::new("/..")), None);
    }
}
