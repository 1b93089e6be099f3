//! Test doubles for the container runtime.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use typed_builder::TypedBuilder;

use crate::error::{BundlingError, BundlingResult};
use crate::options::ASSET_OUTPUT_DIR;
use crate::runtime::{ContainerRuntime, RunInvocation};

/// A [`ContainerRuntime`] that records calls instead of running containers.
///
/// A run writes placeholder output into the host directory mounted at
/// `/asset-output`: the names in `output_files` if given, otherwise
/// `function.zip` when the command mentions it and `index.html` when not.
#[derive(Debug, Default, TypedBuilder)]
pub struct RecordingRuntime {
    /// Fail every image build.
    #[builder(default)]
    failing_builds: bool,

    /// Fail every run.
    #[builder(default)]
    failing_runs: bool,

    /// Files each run writes to the output directory.
    #[builder(default)]
    output_files: Vec<String>,

    #[builder(default, setter(skip))]
    builds: Mutex<Vec<(PathBuf, String)>>,

    #[builder(default, setter(skip))]
    runs: Mutex<Vec<RunInvocation>>,
}

impl RecordingRuntime {
    /// Image builds requested so far as `(context, tag)`.
    #[must_use]
    pub fn builds(&self) -> Vec<(PathBuf, String)> {
        self.builds.lock().clone()
    }

    /// Runs requested so far.
    #[must_use]
    pub fn runs(&self) -> Vec<RunInvocation> {
        self.runs.lock().clone()
    }

    fn outputs_for(&self, invocation: &RunInvocation) -> Vec<String> {
        if !self.output_files.is_empty() {
            return self.output_files.clone();
        }
        if invocation.command.iter().any(|arg| arg.contains("function.zip")) {
            vec!["function.zip".to_owned()]
        } else {
            vec!["index.html".to_owned()]
        }
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn build_image(&self, context: &Path, tag: &str) -> BundlingResult<()> {
        self.builds
            .lock()
            .push((context.to_path_buf(), tag.to_owned()));
        if self.failing_builds {
            return Err(BundlingError::CommandFailed {
                program: format!("docker build -t {tag} {}", context.display()),
                status: "exit status: 1".to_owned(),
                stderr: "Cannot connect to the Docker daemon".to_owned(),
            });
        }
        Ok(())
    }

    async fn run(&self, invocation: &RunInvocation) -> BundlingResult<()> {
        self.runs.lock().push(invocation.clone());
        if self.failing_runs {
            return Err(BundlingError::CommandFailed {
                program: format!("docker {}", invocation.docker_args().join(" ")),
                status: "exit status: 1".to_owned(),
                stderr: "bundling command failed".to_owned(),
            });
        }

        if let Some(output) = invocation.host_path_for(ASSET_OUTPUT_DIR) {
            for name in self.outputs_for(invocation) {
                let path = output.join(&name);
                tokio::fs::write(&path, format!("bundled {name}"))
                    .await
                    .map_err(|e| BundlingError::io(&path, e))?;
            }
        }
        Ok(())
    }
}
