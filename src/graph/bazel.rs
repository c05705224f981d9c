//! Bazel backend - shells out to the `bazel` binary
//!
//! Every call is one `bazel query`/`cquery`/`build` invocation run from the
//! workspace root. `--keep_going` lets a query over partially broken
//! packages still return what it can.

use crate::domain::AppMetadata;
use crate::error::{ReleaseError, Result};
use crate::graph::BuildGraph;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Exit code bazel uses for "partial results" under `--keep_going`
const PARTIAL_SUCCESS: i32 = 3;

pub struct BazelQuery {
    bazel: String,
    workspace: PathBuf,
    metadata_kind: String,
}

impl BazelQuery {
    pub fn new(
        bazel: impl Into<String>,
        workspace: impl Into<PathBuf>,
        metadata_kind: impl Into<String>,
    ) -> Self {
        BazelQuery {
            bazel: bazel.into(),
            workspace: workspace.into(),
            metadata_kind: metadata_kind.into(),
        }
    }

    fn bazel_cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bazel);
        cmd.current_dir(&self.workspace);
        cmd
    }

    /// Run a command and return stdout lines. `allow_partial` accepts the
    /// keep-going exit code.
    fn run(&self, mut cmd: Command, description: &str, allow_partial: bool) -> Result<Vec<String>> {
        debug!(command = description, "running bazel");
        let output = cmd
            .output()
            .map_err(|e| ReleaseError::build_graph(format!("failed to run {}: {}", self.bazel, e)))?;

        let code = output.status.code();
        if !output.status.success() && !(allow_partial && code == Some(PARTIAL_SUCCESS)) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReleaseError::build_graph(format!(
                "{} exited with {:?}: {}",
                description,
                code,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn query(&self, expression: &str) -> Result<Vec<String>> {
        let mut cmd = self.bazel_cmd();
        cmd.args(["query", "--keep_going", "--output=label", "--", expression]);
        self.run(cmd, &format!("bazel query '{}'", expression), true)
    }
}

impl BuildGraph for BazelQuery {
    fn resolve_file(&self, path: &str) -> Result<Option<String>> {
        if !self.workspace.join(path).exists() {
            return Ok(None);
        }
        let mut cmd = self.bazel_cmd();
        cmd.args(["query", "--output=label", "--", path]);
        match self.run(cmd, &format!("bazel query '{}'", path), false) {
            Ok(labels) => Ok(labels.into_iter().next()),
            Err(e) => {
                debug!(path, error = %e, "file does not resolve to a target");
                Ok(None)
            }
        }
    }

    fn reverse_dependencies(&self, nodes: &[String]) -> Result<Vec<String>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let expression = format!("rdeps(//..., set({}))", nodes.join(" "));
        self.query(&expression)
    }

    fn release_targets(&self, pattern: &str) -> Result<Vec<String>> {
        let expression = format!("kind('{}', {})", self.metadata_kind, pattern);
        self.query(&expression)
    }

    fn metadata(&self, target: &str) -> Result<AppMetadata> {
        let mut build = self.bazel_cmd();
        build.args(["build", target]);
        self.run(build, &format!("bazel build {}", target), false)?;

        let mut files = self.bazel_cmd();
        files.args(["cquery", "--output=files", target]);
        let outputs = self.run(files, &format!("bazel cquery {}", target), false)?;

        let json = outputs
            .iter()
            .find(|f| f.ends_with(".json"))
            .ok_or_else(|| {
                ReleaseError::build_graph(format!("{} produced no metadata file", target))
            })?;

        let path = Path::new(json);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        };
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
