//! ApiStack synthesizer.
//!
//! Declares the stack from environment configuration and writes
//! `<outdir>/<stack>.template.json` and `<outdir>/<stack>.assets.json`.
//!
//! # Usage
//!
//! ```text
//! STAGE_NAME=prod apistack-synth [--publish] [--print]
//! ```
//!
//! - `--publish` also bundles every asset in its build image and stages it
//!   under `<outdir>/asset.<hash>`.
//! - `--print` writes the template to stdout.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STACK_NAME` | `OpenAPIBlogStack` | Stack name |
//! | `STAGE_NAME` | `dev` | API stage |
//! | `APP_SOURCE_DIR` | `../app/` | Function sources |
//! | `API_DEFINITION_PATH` | `../api/openapi.yaml` | OpenAPI document |
//! | `DOC_SOURCE_DIR` | `../api` | Documentation sources |
//! | `DOC_BUILD_CONTEXT` | `../api/docker` | Documentation image context |
//! | `DEPENDENCY_CACHE_DIR` | `$HOME/.m2/` | Maven cache mounted into the build |
//! | `ENABLE_DOCS` | `true` | Declare the documentation website |
//! | `CONTINUE_ON_DOC_IMAGE_FAILURE` | `true` | Keep going when the doc image fails to build |
//! | `BUCKET_ENCRYPTION` | `unencrypted` | `unencrypted`, `s3-managed` or `kms-managed` |
//! | `DEFAULT_ACCOUNT` | `000000000000` | Account of the staging bucket |
//! | `DEFAULT_REGION` | `us-east-1` | Region of the staging bucket |
//! | `OUTDIR` | `cdk.out` | Output directory |
//! | `CONTAINER_CLI` | `docker` | Container client binary |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::sync::Arc;

use anyhow::{Context, Result};
use apistack_bundling::{AssetPublisher, DockerCli};
use apistack_core::StackConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
/// Logs go to stderr so `--print` output stays clean.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let publish = std::env::args().any(|a| a == "--publish");
    let print = std::env::args().any(|a| a == "--print");

    let config = StackConfig::from_env().context("invalid stack configuration")?;
    init_tracing(&config.log_level)?;

    info!(
        stack = %config.stack_name,
        stage = %config.stage_name,
        enable_docs = config.enable_docs,
        outdir = %config.outdir.display(),
        version = VERSION,
        "starting ApiStack synthesis",
    );

    let cli = std::env::var("CONTAINER_CLI").unwrap_or_else(|_| "docker".to_owned());
    let runtime = Arc::new(DockerCli::new(cli));

    let synthesized = apistack_stack::synth(&config, runtime.as_ref())
        .await
        .context("failed to synthesize stack")?;
    synthesized
        .write_to(&config.outdir)
        .await
        .with_context(|| format!("failed to write {}", config.outdir.display()))?;

    if publish {
        let publisher = AssetPublisher::new(runtime, &config.outdir);
        let published = synthesized
            .publish(&publisher)
            .await
            .context("failed to publish assets")?;
        for asset in &published {
            info!(
                hash = %asset.hash,
                object_key = %asset.object_key,
                path = %asset.path.display(),
                "staged asset"
            );
        }
    }

    if print {
        let json = synthesized
            .template()
            .to_json_pretty()
            .context("failed to render template")?;
        println!("{json}");
    }

    info!(
        resources = synthesized.template().resources().len(),
        outputs = synthesized.template().outputs().len(),
        "synthesis complete"
    );
    Ok(())
}
