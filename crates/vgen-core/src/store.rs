//! On-disk artifacts, one directory per run.
//!
//! Layout: `<workspace>/<run_id>/<artifact file>`. Writes go through a temp
//! file in the same directory and are renamed into place.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::domain::{Result, RunState, VgenError};

pub const PLANNING_FILE: &str = "high_level_planning_task.md";
pub const DECOMPOSITION_FILE: &str = "verilog_task.json";
pub const DESIGN_FILE: &str = "design.sv";
pub const TESTBENCH_FILE: &str = "testbench.sv";
pub const REPORT_MARKDOWN_FILE: &str = "iverilog_report.md";
pub const REPORT_JSON_FILE: &str = "iverilog_report.json";
pub const RUN_SUMMARY_FILE: &str = "run.json";
pub const RUN_DIGEST_FILE: &str = "run.digest";

/// Root of all run directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `run_id` under the root. Ids that are not one plain path
    /// segment are rejected so no run can reach outside the workspace.
    fn run_path(&self, run_id: &str) -> Result<PathBuf> {
        let mut components = Path::new(run_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == run_id => Ok(self.root.join(name)),
            _ => Err(VgenError::InvalidRunId(run_id.to_string())),
        }
    }

    /// Open (creating if needed) the directory of `run_id`.
    pub fn run_dir(&self, run_id: &str) -> Result<RunDir> {
        let path = self.run_path(run_id)?;
        fs::create_dir_all(&path)?;
        Ok(RunDir { path })
    }

    /// Directory of an existing run, without creating it.
    pub fn existing_run_dir(&self, run_id: &str) -> Result<RunDir> {
        let path = self.run_path(run_id)?;
        if !path.is_dir() {
            return Err(VgenError::MissingArtifact(path));
        }
        Ok(RunDir { path })
    }
}

/// Artifacts of a single run.
#[derive(Debug, Clone)]
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.file(name).is_file()
    }

    /// Atomically replace `name` with `content`.
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.file(name);
        let mut tmp = NamedTempFile::new_in(&self.path)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }

    /// Read `name`, reporting absence as `MissingArtifact`.
    pub fn read(&self, name: &str) -> Result<String> {
        let path = self.file(name);
        fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                VgenError::MissingArtifact(path)
            } else {
                VgenError::Io(e)
            }
        })
    }

    /// Copy every artifact of `source` into this directory.
    ///
    /// The source run's summary and digest are not copied. Returns the number
    /// of files copied.
    pub fn seed_from(&self, source: &RunDir) -> Result<usize> {
        let mut copied = 0;
        for entry in fs::read_dir(&source.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name == RUN_SUMMARY_FILE || name == RUN_DIGEST_FILE {
                continue;
            }
            fs::copy(entry.path(), self.path.join(&name))?;
            copied += 1;
        }
        Ok(copied)
    }

    /// Persist `run.json` and its SHA-256 `run.digest`.
    pub fn write_run_summary(&self, state: &RunState) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(state)?;
        let path = self.write(RUN_SUMMARY_FILE, &json)?;
        self.write(RUN_DIGEST_FILE, &sha256_hex(json.as_bytes()))?;
        Ok(path)
    }

    /// Read `run.json`, verifying it against `run.digest`.
    pub fn read_run_summary(&self) -> Result<RunState> {
        let json = self.read(RUN_SUMMARY_FILE)?;
        let expected = self.read(RUN_DIGEST_FILE)?;
        let actual = sha256_hex(json.as_bytes());
        if expected.trim() != actual {
            return Err(VgenError::DigestMismatch {
                expected: expected.trim().to_string(),
                actual,
            });
        }
        Ok(serde_json::from_str(&json)?)
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunRequest;

    fn make_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("runs")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = make_store();
        let run = store.run_dir("run_a").unwrap();
        run.write(DESIGN_FILE, "module m; endmodule\n").unwrap();
        assert_eq!(run.read(DESIGN_FILE).unwrap(), "module m; endmodule\n");

        run.write(DESIGN_FILE, "module m2; endmodule\n").unwrap();
        assert_eq!(run.read(DESIGN_FILE).unwrap(), "module m2; endmodule\n");
    }

    #[test]
    fn test_missing_artifact() {
        let (_dir, store) = make_store();
        let run = store.run_dir("run_b").unwrap();
        match run.read(TESTBENCH_FILE) {
            Err(VgenError::MissingArtifact(path)) => assert!(path.ends_with(TESTBENCH_FILE)),
            other => panic!("expected MissingArtifact, got {other:?}"),
        }
        assert!(matches!(
            store.existing_run_dir("never_ran"),
            Err(VgenError::MissingArtifact(_))
        ));
    }

    #[test]
    fn test_run_ids_stay_inside_root() {
        let (dir, store) = make_store();
        let outside = dir.path().join("elsewhere");
        fs::create_dir_all(&outside).unwrap();
        let absolute = outside.to_string_lossy().into_owned();

        for id in ["../elsewhere", "..", ".", "", "a/b", "run_a/", absolute.as_str()] {
            assert!(
                matches!(store.existing_run_dir(id), Err(VgenError::InvalidRunId(_))),
                "{id:?} was accepted"
            );
            assert!(matches!(store.run_dir(id), Err(VgenError::InvalidRunId(_))));
        }
        assert!(store.run_dir("run_20240101_000000_abcd1234").is_ok());
    }

    #[test]
    fn test_seed_copies_artifacts_but_not_summary() {
        let (_dir, store) = make_store();
        let source = store.run_dir("run_src").unwrap();
        source.write(DESIGN_FILE, "module d; endmodule").unwrap();
        source.write(TESTBENCH_FILE, "module tb; endmodule").unwrap();
        let state = RunState::new("run_src", &RunRequest::default());
        source.write_run_summary(&state).unwrap();

        let target = store.run_dir("run_dst").unwrap();
        assert_eq!(target.seed_from(&source).unwrap(), 2);
        assert_eq!(target.read(DESIGN_FILE).unwrap(), "module d; endmodule");
        assert!(!target.exists(RUN_SUMMARY_FILE));
    }

    #[test]
    fn test_run_summary_digest_verified() {
        let (_dir, store) = make_store();
        let run = store.run_dir("run_c").unwrap();
        let state = RunState::new("run_c", &RunRequest::default());
        run.write_run_summary(&state).unwrap();
        assert_eq!(run.read_run_summary().unwrap(), state);

        run.write(RUN_SUMMARY_FILE, "{\"tampered\": true}").unwrap();
        assert!(matches!(
            run.read_run_summary(),
            Err(VgenError::DigestMismatch { .. })
        ));
    }
}
