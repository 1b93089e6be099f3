//! The API stack: a Lambda-backed REST API plus its documentation website.
//!
//! Declaration order follows the dependency order of the pipeline:
//!
//! ```text
//! code asset ─▶ function ─▶ permission
//! definition asset ─▶ merged definition ─▶ REST API ─▶ deployment ─▶ stage
//! doc image ─▶ doc asset ─┐
//! bucket ─▶ OAI ─▶ read grant ─▶ distribution ─▶ bucket deployment
//! outputs
//! ```
//!
//! The documentation half is optional and omitted entirely when
//! [`StackConfig::enable_docs`] is off.

use std::path::{Path, PathBuf};
use std::time::Duration;

use apistack_bundling::{
    AssetManifest, AssetPublisher, BundlingOptions, BundlingOutput, ContainerRuntime, DockerImage,
    DockerVolume, ImageBuildPolicy, PublishedAsset,
};
use apistack_core::{LogicalId, StackConfig};
use apistack_template::{Output, Template};
use tracing::info;

use crate::builder::{DeclaredStack, Handle, StackBuilder};
use crate::checkpoint::Checkpoint;
use crate::constructs::apigateway::{MergedDefinition, SpecRestApi};
use crate::constructs::assets::{DirectoryAsset, FileAsset};
use crate::constructs::cloudfront::{Distribution, OriginAccessIdentity, S3Origin};
use crate::constructs::deployment::{BucketDeployment, CacheControl};
use crate::constructs::lambda::{Function, RetentionDays, Runtime};
use crate::constructs::s3::{Bucket, TeardownPolicy};
use crate::error::{StackError, StackResult};

/// Construct id of the function.
pub const FUNCTION_ID: &str = "OpenAPIBlogLambda";
/// Logical id the function resource is pinned to.
pub const FUNCTION_LOGICAL_ID: &str = "APILambda";
/// Construct id of the function code asset.
pub const CODE_ASSET_ID: &str = "OpenAPIBlogLambdaCode";
/// Construct id of the gateway invoke permission.
pub const PERMISSION_ID: &str = "OpenAPIBlogLambdaAPIGWPermission";
/// Construct id of the API definition asset.
pub const DEFINITION_ASSET_ID: &str = "OpenAPIBlogAsset";
/// Node id of the merged API definition.
pub const MERGED_DEFINITION_ID: &str = "OpenAPIBlogAPIDefinition";
/// Construct id of the REST API.
pub const REST_API_ID: &str = "OpenAPIBlogRestAPI";
/// Name of the REST API.
pub const REST_API_NAME: &str = "OpenAPIBlogWidgetAPI";
/// Export name of the stage endpoint.
pub const ENDPOINT_EXPORT_NAME: &str = "OpenAPIBlogWidgetRestApiEndpoint";
/// Construct id of the bundled documentation.
pub const DOC_ASSET_ID: &str = "OpenAPIBlogS3DeploymentSource";
/// Construct id of the web bucket.
pub const BUCKET_ID: &str = "OpenAPIBlogAPIBucket";
/// Construct id of the origin access identity.
pub const ACCESS_IDENTITY_ID: &str = "OpenAPIBlogWidgetAPIOAI";
/// Comment of the origin access identity.
pub const ACCESS_IDENTITY_COMMENT: &str = "OAI for the OpenAPI Blog Widget API Document Website";
/// Construct id of the distribution.
pub const DISTRIBUTION_ID: &str = "OpenAPIBlogCFD";
/// Construct id of the bucket deployment.
pub const DEPLOYMENT_ID: &str = "OpenAPIBlogS3Deployment";

/// Output holding the REST API id.
pub const REST_ID_OUTPUT: &str = "OpenAPIBlogAPIRestIdOutput";
/// Output holding the web bucket name.
pub const BUCKET_NAME_OUTPUT: &str = "OpenAPIBlogWebBucketName";
/// Output holding the distribution domain name.
pub const CLOUDFRONT_URL_OUTPUT: &str = "OpenAPIBlogCloudFrontURL";
/// Output holding the distribution id.
pub const DISTRIBUTION_ID_OUTPUT: &str = "OpenAPIBlogCloudFrontDistributionID";

/// Quarkus entry point of the function.
pub const HANDLER: &str = "io.quarkus.amazon.lambda.runtime.QuarkusStreamHandler::handleRequest";

/// Where the dependency cache is mounted in the build image.
pub const DEPENDENCY_CACHE_MOUNT: &str = "/root/.m2/";

/// Build the function package and copy it to the output directory.
#[must_use]
pub fn api_packaging_command() -> Vec<String> {
    vec![
        "/bin/sh".to_owned(),
        "-c".to_owned(),
        "pwd && ls -l && mvn --no-transfer-progress clean package && cp target/function.zip /asset-output/"
            .to_owned(),
    ]
}

/// Render the OpenAPI document to a static site and copy it to the output
/// directory.
#[must_use]
pub fn doc_packaging_command() -> Vec<String> {
    vec![
        "/bin/sh".to_owned(),
        "-c".to_owned(),
        concat!(
            "pwd && ls -l && ",
            "widdershins --search false --language_tabs 'javascript:JavaScript' 'python:Python' 'java:Java' ",
            "--summary openapi.yaml -o /openapi/slate/source/index.html.md && ",
            "cd /openapi/slate && ",
            "bundle exec middleman build --clean && ",
            "ls -la build/* && ",
            "cp -a build/. /asset-output/"
        )
        .to_owned(),
    ]
}

/// `Cache-Control` set on every documentation object.
#[must_use]
pub fn doc_cache_control() -> Vec<CacheControl> {
    vec![
        CacheControl::Public,
        CacheControl::MaxAge(Duration::ZERO),
        CacheControl::SMaxAge(Duration::ZERO),
    ]
}

/// A synthesized stack: the declared graph plus its asset manifest.
#[derive(Debug)]
pub struct Synthesized {
    /// The declared stack.
    pub stack: DeclaredStack,
    /// Assets to upload before the template is applied.
    pub manifest: AssetManifest,
}

impl Synthesized {
    /// The CloudFormation template.
    #[must_use]
    pub fn template(&self) -> &Template {
        &self.stack.template
    }

    /// Logical ids in evaluation order.
    ///
    /// # Errors
    ///
    /// See [`DeclaredStack::plan`].
    pub fn plan(&self) -> StackResult<Vec<LogicalId>> {
        self.stack.plan()
    }

    /// Path of the template under `outdir`.
    #[must_use]
    pub fn template_path(&self, outdir: &Path) -> PathBuf {
        outdir.join(format!("{}.template.json", self.stack.name))
    }

    /// Path of the asset manifest under `outdir`.
    #[must_use]
    pub fn manifest_path(&self, outdir: &Path) -> PathBuf {
        outdir.join(format!("{}.assets.json", self.stack.name))
    }

    /// Write the template and asset manifest into `outdir`.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::Io`] or [`StackError::Bundling`] if a file
    /// cannot be written.
    pub async fn write_to(&self, outdir: &Path) -> StackResult<()> {
        tokio::fs::create_dir_all(outdir)
            .await
            .map_err(|source| StackError::Io {
                path: outdir.to_path_buf(),
                source,
            })?;

        let template_path = self.template_path(outdir);
        let json = self.template().to_json_pretty()?;
        tokio::fs::write(&template_path, json)
            .await
            .map_err(|source| StackError::Io {
                path: template_path.clone(),
                source,
            })?;

        let manifest_path = self.manifest_path(outdir);
        self.manifest.write_to(&manifest_path).await?;

        info!(
            stack = %self.stack.name,
            template = %template_path.display(),
            manifest = %manifest_path.display(),
            assets = self.manifest.len(),
            "wrote synthesized stack"
        );
        Ok(())
    }

    /// Bundle and stage every declared asset.
    ///
    /// # Errors
    ///
    /// Returns the first bundling failure, e.g.
    /// [`apistack_bundling::BundlingError::ImageUnavailable`] when the
    /// documentation image could not be built.
    pub async fn publish(&self, publisher: &AssetPublisher) -> StackResult<Vec<PublishedAsset>> {
        Ok(publisher.publish_all(&self.stack.assets).await?)
    }
}

/// Build the documentation image and apply the configured failure policy.
///
/// # Errors
///
/// Returns the build error when the policy is to abort.
pub async fn resolve_doc_image(
    config: &StackConfig,
    runtime: &dyn ContainerRuntime,
) -> StackResult<DockerImage> {
    let context = &config.doc_build_context;
    let outcome = DockerImage::from_build(runtime, context).await;
    let policy = ImageBuildPolicy::from_continue_flag(config.continue_on_doc_image_failure);
    Ok(policy.resolve(context, outcome)?)
}

/// Validate `config`, resolve the documentation image if needed, and
/// synthesize the stack.
///
/// # Errors
///
/// Fails on invalid configuration, a missing asset source, or a doc image
/// build failure under [`ImageBuildPolicy::Abort`].
pub async fn synth(config: &StackConfig, runtime: &dyn ContainerRuntime) -> StackResult<Synthesized> {
    config.validate()?;
    let doc_image = if config.enable_docs {
        Some(resolve_doc_image(config, runtime).await?)
    } else {
        None
    };
    synthesize(config, doc_image)
}

/// Declare the stack for `config`.
///
/// `doc_image` must be given when documentation is enabled.
///
/// # Errors
///
/// Fails if an asset source is missing, a construct is invalid, or
/// documentation is enabled without an image.
pub fn synthesize(config: &StackConfig, doc_image: Option<DockerImage>) -> StackResult<Synthesized> {
    info!(stack = %config.stack_name, stage = %config.stage_name, "synthesizing stack");
    let mut stack = StackBuilder::new(&config.stack_name, None);

    let rest_api = declare_api(&mut stack, config)?;
    stack.declare_output(REST_ID_OUTPUT, Output::new(rest_api.rest_api_id()))?;

    if config.enable_docs {
        let image = doc_image.ok_or_else(|| StackError::InvalidConstruct {
            id: DEPLOYMENT_ID.to_owned(),
            reason: "documentation is enabled but no documentation image was resolved".to_owned(),
        })?;
        declare_docs(&mut stack, config, image)?;
    }
    stack.checkpoint(Checkpoint::Outputs);

    let stack = stack.finish()?;
    let manifest = AssetManifest::new(&stack.assets, &config.account, &config.region);
    Ok(Synthesized { stack, manifest })
}

fn declare_api(stack: &mut StackBuilder, config: &StackConfig) -> StackResult<Handle<SpecRestApi>> {
    let api_bundling = BundlingOptions::builder()
        .image(Runtime::Java11.bundling_image())
        .command(api_packaging_command())
        .volumes(vec![DockerVolume::new(
            &config.dependency_cache_dir,
            DEPENDENCY_CACHE_MOUNT,
        )])
        .user("root")
        .output_type(BundlingOutput::Archived)
        .build();
    let code = stack.add(
        CODE_ASSET_ID,
        DirectoryAsset::new(&config.app_source_dir).with_bundling(api_bundling),
    )?;
    stack.checkpoint(Checkpoint::CodeAsset);

    let function = stack.add(
        FUNCTION_ID,
        Function::new(Runtime::Java11, &code, HANDLER)
            .memory_size(512)
            .timeout(Duration::from_secs(30))
            .log_retention(RetentionDays::OneDay)
            .override_logical_id(FUNCTION_LOGICAL_ID)?,
    )?;
    stack.checkpoint(Checkpoint::Function);

    function.add_permission(stack, PERMISSION_ID, "apigateway.amazonaws.com")?;
    stack.checkpoint(Checkpoint::Permission);

    let definition_asset = stack.add(DEFINITION_ASSET_ID, FileAsset::new(&config.api_definition_path))?;
    let definition = stack.add(MERGED_DEFINITION_ID, MergedDefinition::include(&definition_asset))?;
    stack.checkpoint(Checkpoint::ApiAsset);

    let rest_api = stack.add(
        REST_API_ID,
        SpecRestApi::builder()
            .definition(definition)
            .rest_api_name(REST_API_NAME)
            .stage(config.stage_name.clone())
            .deploy(true)
            .endpoint_export_name(ENDPOINT_EXPORT_NAME)
            .build(),
    )?;
    stack.checkpoint(Checkpoint::RestApi);
    Ok(rest_api)
}

fn declare_docs(stack: &mut StackBuilder, config: &StackConfig, image: DockerImage) -> StackResult<()> {
    stack.checkpoint(Checkpoint::DocImage);

    let doc_bundling = BundlingOptions::builder()
        .image(image)
        .command(doc_packaging_command())
        .user("root")
        .output_type(BundlingOutput::NotArchived)
        .build();
    let docs = stack.add(
        DOC_ASSET_ID,
        DirectoryAsset::new(&config.doc_source_dir).with_bundling(doc_bundling),
    )?;
    stack.checkpoint(Checkpoint::DocSource);

    let bucket = stack.add(
        BUCKET_ID,
        Bucket::builder()
            .versioned(true)
            .encryption(config.bucket_encryption)
            .teardown(TeardownPolicy::DestroyWithContents)
            .build(),
    )?;
    stack.checkpoint(Checkpoint::Bucket);

    let identity = stack.add(ACCESS_IDENTITY_ID, OriginAccessIdentity::new(ACCESS_IDENTITY_COMMENT))?;
    let grant = bucket.grant_read(stack, &identity)?;
    stack.checkpoint(Checkpoint::AccessIdentity);

    let distribution = stack.add(
        DISTRIBUTION_ID,
        Distribution::builder().origin(S3Origin::new(&grant)).build(),
    )?;
    stack.checkpoint(Checkpoint::Distribution);

    stack.add(
        DEPLOYMENT_ID,
        BucketDeployment::builder()
            .sources(vec![docs])
            .destination(bucket.clone())
            .distribution(distribution.clone())
            .distribution_paths(vec!["/*".to_owned()])
            .prune(true)
            .cache_control(doc_cache_control())
            .build(),
    )?;
    stack.checkpoint(Checkpoint::Deployment);

    stack.declare_output(BUCKET_NAME_OUTPUT, Output::new(bucket.bucket_name()))?;
    stack.declare_output(CLOUDFRONT_URL_OUTPUT, Output::new(distribution.domain_name()))?;
    stack.declare_output(DISTRIBUTION_ID_OUTPUT, Output::new(distribution.distribution_id()))?;
    Ok(())
}
