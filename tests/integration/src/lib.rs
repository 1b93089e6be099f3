//! Integration tests for ApiStack bundling.
//!
//! These tests drive a real container runtime (`docker` by default, or the
//! binary named by `CONTAINER_CLI`). They are marked `#[ignore]` so they
//! don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p apistack-integration -- --ignored
//! ```

use std::path::Path;
use std::sync::{Arc, Once};

use apistack_bundling::DockerCli;
use apistack_core::StackConfig;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Image used for bundling steps that only need a shell.
#[must_use]
pub fn shell_image() -> String {
    std::env::var("BUNDLING_TEST_IMAGE").unwrap_or_else(|_| "alpine:3".to_owned())
}

/// Create a runtime backed by the local container client.
#[must_use]
pub fn docker() -> Arc<DockerCli> {
    init_tracing();
    let cli = std::env::var("CONTAINER_CLI").unwrap_or_else(|_| "docker".to_owned());
    Arc::new(DockerCli::new(cli))
}

/// Lay out a minimal project under `root` and return a config pointing at
/// it. The documentation image context builds `FROM <base>` with `extra`
/// appended to the Dockerfile.
pub fn write_project(root: &Path, extra: &str) -> std::io::Result<StackConfig> {
    std::fs::create_dir_all(root.join("app"))?;
    std::fs::write(root.join("app/pom.xml"), "<project/>")?;
    std::fs::create_dir_all(root.join("api/docker"))?;
    std::fs::write(root.join("api/openapi.yaml"), "openapi: 3.0.0\ninfo:\n  title: Widgets\n")?;
    std::fs::write(
        root.join("api/docker/Dockerfile"),
        format!("FROM {}\n{extra}", shell_image()),
    )?;

    Ok(StackConfig::builder()
        .app_source_dir(root.join("app"))
        .api_definition_path(root.join("api/openapi.yaml"))
        .doc_source_dir(root.join("api"))
        .doc_build_context(root.join("api/docker"))
        .dependency_cache_dir(root.join("m2"))
        .outdir(root.join("cdk.out"))
        .build())
}

mod test_bundling;
mod test_doc_image;
