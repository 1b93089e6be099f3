//! Container runtime abstraction.
//!
//! Image builds and bundling runs go through [`ContainerRuntime`]. The
//! production implementation shells out to the `docker` CLI; tests use the
//! recording fake in [`crate::testing`].

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{BundlingError, BundlingResult};
use crate::options::{ASSET_INPUT_DIR, DockerVolume};

/// A fully resolved `docker run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInvocation {
    /// Image to run.
    pub image: String,
    /// Command and arguments.
    pub command: Vec<String>,
    /// Bind mounts, including the input and output directories.
    pub volumes: Vec<DockerVolume>,
    /// User to run as.
    pub user: Option<String>,
    /// Working directory inside the container.
    pub working_dir: String,
}

impl RunInvocation {
    /// Arguments passed to the `docker` binary.
    #[must_use]
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_owned(), "--rm".to_owned()];
        if let Some(user) = &self.user {
            args.push("-u".to_owned());
            args.push(user.clone());
        }
        for volume in &self.volumes {
            args.push("-v".to_owned());
            args.push(volume.to_mount_arg());
        }
        args.push("-w".to_owned());
        args.push(self.working_dir.clone());
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }

    /// Host path mounted at the given container path, if any.
    #[must_use]
    pub fn host_path_for(&self, container_path: &str) -> Option<&Path> {
        self.volumes
            .iter()
            .find(|v| v.container_path == container_path)
            .map(|v| v.host_path.as_path())
    }
}

impl Default for RunInvocation {
    fn default() -> Self {
        Self {
            image: String::new(),
            command: Vec::new(),
            volumes: Vec::new(),
            user: None,
            working_dir: ASSET_INPUT_DIR.to_owned(),
        }
    }
}

/// Builds images and runs bundling commands in containers.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + fmt::Debug {
    /// Build `context` into an image tagged `tag`.
    async fn build_image(&self, context: &Path, tag: &str) -> BundlingResult<()>;

    /// Run a bundling command to completion.
    async fn run(&self, invocation: &RunInvocation) -> BundlingResult<()>;
}

/// [`ContainerRuntime`] backed by the `docker` command-line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    /// Use the given client binary (e.g. `docker` or `podman`).
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn exec(&self, args: &[String]) -> BundlingResult<()> {
        let program = format!("{} {}", self.binary.display(), args.join(" "));
        debug!(%program, "running container command");

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| BundlingError::io(&self.binary, e))?;

        if output.status.success() {
            return Ok(());
        }

        Err(BundlingError::CommandFailed {
            program,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn build_image(&self, context: &Path, tag: &str) -> BundlingResult<()> {
        let args = vec![
            "build".to_owned(),
            "-t".to_owned(),
            tag.to_owned(),
            context.display().to_string(),
        ];
        self.exec(&args).await
    }

    async fn run(&self, invocation: &RunInvocation) -> BundlingResult<()> {
        self.exec(&invocation.docker_args()).await
    }
}
