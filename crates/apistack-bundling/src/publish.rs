//! Asset publishing: bundle in a container, then stage under the output
//! directory.
//!
//! Bundling follows the mount contract of the build image:
//!
//! ```text
//! <source>        ──▶ /asset-input   (working directory)
//! <bundle dir>    ◀── /asset-output  (command writes here)
//! <extra volumes> ──▶ as declared    (e.g. dependency cache)
//! ```
//!
//! Archived output must be a single file which is staged as is. Any other
//! output tree is staged as a directory and zipped.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use zip::write::SimpleFileOptions;

use crate::error::{BundlingError, BundlingResult};
use crate::fingerprint::{list_files, relative_key};
use crate::options::{ASSET_INPUT_DIR, ASSET_OUTPUT_DIR, BundlingOptions, BundlingOutput, DockerVolume};
use crate::runtime::{ContainerRuntime, RunInvocation};
use crate::staging::{AssetKind, AssetPackaging, AssetSpec};

/// An asset ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedAsset {
    /// Asset hash.
    pub hash: String,
    /// Destination object key.
    pub object_key: String,
    /// File to upload.
    pub path: PathBuf,
    /// How the asset was packaged.
    pub packaging: AssetPackaging,
}

/// Bundles and stages assets under an output directory.
#[derive(Debug, Clone)]
pub struct AssetPublisher {
    runtime: Arc<dyn ContainerRuntime>,
    outdir: PathBuf,
}

impl AssetPublisher {
    /// Create a publisher staging into `outdir`.
    #[must_use]
    pub fn new(runtime: Arc<dyn ContainerRuntime>, outdir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            outdir: outdir.into(),
        }
    }

    /// The staging directory.
    #[must_use]
    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// Publish every asset in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// See [`AssetPublisher::publish`].
    pub async fn publish_all<'a>(
        &self,
        assets: impl IntoIterator<Item = &'a AssetSpec>,
    ) -> BundlingResult<Vec<PublishedAsset>> {
        let mut published = Vec::new();
        for asset in assets {
            published.push(self.publish(asset).await?);
        }
        Ok(published)
    }

    /// Bundle (if needed) and stage one asset.
    ///
    /// # Errors
    ///
    /// - [`BundlingError::ImageUnavailable`] if the bundling image was never
    ///   built.
    /// - [`BundlingError::SourceNotFound`] if the source is missing.
    /// - [`BundlingError::CommandFailed`] if the container command fails.
    /// - [`BundlingError::UnexpectedArchiveOutput`] if archived output is not
    ///   exactly one file.
    pub async fn publish(&self, asset: &AssetSpec) -> BundlingResult<PublishedAsset> {
        tokio::fs::create_dir_all(&self.outdir)
            .await
            .map_err(|e| BundlingError::io(&self.outdir, e))?;

        let path = match asset.bundling() {
            Some(options) => self.bundle(asset, options).await?,
            None => self.stage_unbundled(asset).await?,
        };

        info!(
            logical_id = %asset.id(),
            hash = %asset.hash(),
            path = %path.display(),
            "asset staged"
        );

        Ok(PublishedAsset {
            hash: asset.hash().to_owned(),
            object_key: asset.object_key(),
            path,
            packaging: asset.packaging(),
        })
    }

    async fn bundle(&self, asset: &AssetSpec, options: &BundlingOptions) -> BundlingResult<PathBuf> {
        options.image.ensure_available()?;
        ensure_exists(asset.source()).await?;

        let bundle_dir = self.outdir.join(format!("bundling-temp-{}", asset.hash()));
        reset_dir(&bundle_dir).await?;

        if options.local.try_bundle(&bundle_dir, options) {
            debug!(logical_id = %asset.id(), "bundled on host");
        } else {
            self.run_in_container(asset, options, &bundle_dir).await?;
        }

        let archive = self.outdir.join(format!("asset.{}.zip", asset.hash()));
        match options.output_type {
            BundlingOutput::Archived => match single_file(&bundle_dir).await? {
                Ok(file) => copy(&file, &archive).await?,
                Err(count) => {
                    return Err(BundlingError::UnexpectedArchiveOutput {
                        dir: bundle_dir,
                        count,
                    });
                }
            },
            BundlingOutput::NotArchived => {
                let staged = self.outdir.join(asset.staged_name());
                if tokio::fs::try_exists(&staged).await.unwrap_or(false) {
                    remove_dir(&staged).await?;
                }
                tokio::fs::rename(&bundle_dir, &staged)
                    .await
                    .map_err(|e| BundlingError::io(&bundle_dir, e))?;
                zip_dir(staged, archive.clone()).await?;
                return Ok(archive);
            }
        }

        remove_dir(&bundle_dir).await?;
        Ok(archive)
    }

    async fn run_in_container(
        &self,
        asset: &AssetSpec,
        options: &BundlingOptions,
        bundle_dir: &Path,
    ) -> BundlingResult<()> {
        // Extra mounts are caches; a missing host directory is created empty.
        for volume in &options.volumes {
            tokio::fs::create_dir_all(&volume.host_path)
                .await
                .map_err(|e| BundlingError::io(&volume.host_path, e))?;
        }

        let mut volumes = vec![
            DockerVolume::new(absolute(asset.source())?, ASSET_INPUT_DIR),
            DockerVolume::new(absolute(bundle_dir)?, ASSET_OUTPUT_DIR),
        ];
        volumes.extend(options.volumes.iter().cloned());

        let invocation = RunInvocation {
            image: options.image.image().to_owned(),
            command: options.command.clone(),
            volumes,
            user: options.user.clone(),
            working_dir: ASSET_INPUT_DIR.to_owned(),
        };

        info!(
            logical_id = %asset.id(),
            image = %options.image,
            "bundling asset in container"
        );
        self.runtime.run(&invocation).await
    }

    async fn stage_unbundled(&self, asset: &AssetSpec) -> BundlingResult<PathBuf> {
        ensure_exists(asset.source()).await?;
        match asset.kind() {
            AssetKind::File => {
                let staged = self.outdir.join(asset.staged_name());
                copy(asset.source(), &staged).await?;
                Ok(staged)
            }
            AssetKind::Directory => {
                let archive = self.outdir.join(format!("asset.{}.zip", asset.hash()));
                zip_dir(asset.source().to_path_buf(), archive.clone()).await?;
                Ok(archive)
            }
        }
    }
}

async fn ensure_exists(path: &Path) -> BundlingResult<()> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(BundlingError::SourceNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(BundlingError::io(path, e)),
    }
}

fn absolute(path: &Path) -> BundlingResult<PathBuf> {
    std::path::absolute(path).map_err(|e| BundlingError::io(path, e))
}

async fn reset_dir(dir: &Path) -> BundlingResult<()> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        remove_dir(dir).await?;
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BundlingError::io(dir, e))
}

async fn remove_dir(dir: &Path) -> BundlingResult<()> {
    tokio::fs::remove_dir_all(dir)
        .await
        .map_err(|e| BundlingError::io(dir, e))
}

async fn copy(from: &Path, to: &Path) -> BundlingResult<()> {
    tokio::fs::copy(from, to)
        .await
        .map(|_| ())
        .map_err(|e| BundlingError::io(from, e))
}

/// The only top-level entry of `dir` if it is a regular file, otherwise the
/// number of top-level entries.
async fn single_file(dir: &Path) -> BundlingResult<Result<PathBuf, usize>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| BundlingError::io(dir, e))?;
    let mut found = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BundlingError::io(dir, e))?
    {
        found.push(entry.path());
    }

    match found.as_slice() {
        [only] if only.is_file() => Ok(Ok(only.clone())),
        _ => Ok(Err(found.len())),
    }
}

/// Zip a directory tree on the blocking pool.
async fn zip_dir(dir: PathBuf, archive: PathBuf) -> BundlingResult<()> {
    tokio::task::spawn_blocking(move || write_zip(&dir, &archive))
        .await
        .map_err(anyhow::Error::from)?
}

fn write_zip(dir: &Path, archive: &Path) -> BundlingResult<()> {
    let file = File::create(archive).map_err(|e| BundlingError::io(archive, e))?;
    let mut writer = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for relative in list_files(dir)? {
        let full = dir.join(&relative);
        let contents = std::fs::read(&full).map_err(|e| BundlingError::io(&full, e))?;
        writer.start_file(relative_key(&relative), options)?;
        writer
            .write_all(&contents)
            .map_err(|e| BundlingError::io(archive, e))?;
    }

    writer.finish()?;
    debug!(dir = %dir.display(), archive = %archive.display(), "zipped directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Read;

    use apistack_core::LogicalId;

    use super::*;
    use crate::image::{DockerImage, ImageBuildPolicy};
    use crate::testing::RecordingRuntime;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn zip_names(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_should_bundle_archived_output_in_container() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("pom.xml"), "<project/>").unwrap();
        let out = tempfile::tempdir().unwrap();
        let cache = out.path().join("m2-cache");

        let options = BundlingOptions::builder()
            .image(DockerImage::from_registry("public.ecr.aws/sam/build-java11"))
            .command(vec![
                "/bin/sh".into(),
                "-c".into(),
                "mvn package && cp target/function.zip /asset-output/".into(),
            ])
            .volumes(vec![DockerVolume::new(&cache, "/root/.m2/")])
            .user("root")
            .output_type(BundlingOutput::Archived)
            .build();
        let asset =
            AssetSpec::new(id("Code"), src.path(), AssetKind::Directory, Some(options)).unwrap();

        let runtime = Arc::new(RecordingRuntime::default());
        let publisher = AssetPublisher::new(runtime.clone(), out.path());
        let published = publisher.publish(&asset).await.unwrap();

        assert_eq!(published.packaging, AssetPackaging::File);
        assert_eq!(published.object_key, format!("{}.zip", asset.hash()));
        assert!(published.path.is_file());
        assert!(cache.is_dir(), "missing cache directory should be created");

        let runs = runtime.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].user.as_deref(), Some("root"));
        assert_eq!(runs[0].working_dir, ASSET_INPUT_DIR);
        assert!(runs[0].host_path_for("/root/.m2/").is_some());
    }

    #[tokio::test]
    async fn test_should_zip_unarchived_output() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("openapi.yaml"), "openapi: 3.0.0").unwrap();
        let out = tempfile::tempdir().unwrap();

        let options = BundlingOptions::builder()
            .image(DockerImage::from_registry("apistack-docs"))
            .command(vec!["build-docs".into()])
            .output_type(BundlingOutput::NotArchived)
            .build();
        let asset =
            AssetSpec::new(id("Docs"), src.path(), AssetKind::Directory, Some(options)).unwrap();

        let publisher = AssetPublisher::new(Arc::new(RecordingRuntime::default()), out.path());
        let published = publisher.publish(&asset).await.unwrap();

        assert_eq!(published.packaging, AssetPackaging::ZipDirectory);
        assert_eq!(zip_names(&published.path), vec!["index.html"]);
        assert!(out.path().join(asset.staged_name()).join("index.html").is_file());
    }

    #[tokio::test]
    async fn test_should_stage_single_zip_output_as_directory_by_default() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("pom.xml"), "<project/>").unwrap();
        let out = tempfile::tempdir().unwrap();

        let options = BundlingOptions::builder()
            .image(DockerImage::from_registry("alpine"))
            .command(vec!["emit-zip".into()])
            .build();
        let asset =
            AssetSpec::new(id("Code"), src.path(), AssetKind::Directory, Some(options)).unwrap();

        let runtime = RecordingRuntime::builder()
            .output_files(vec!["bundle.zip".into()])
            .build();
        let publisher = AssetPublisher::new(Arc::new(runtime), out.path());
        let published = publisher.publish(&asset).await.unwrap();

        assert_eq!(published.packaging, asset.packaging());
        assert_eq!(published.packaging, AssetPackaging::ZipDirectory);
        assert!(out.path().join(asset.staged_name()).is_dir());
        assert_eq!(zip_names(&published.path), vec!["bundle.zip"]);
    }

    #[tokio::test]
    async fn test_should_reject_archived_output_with_many_files() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("pom.xml"), "<project/>").unwrap();
        let out = tempfile::tempdir().unwrap();

        let options = BundlingOptions::builder()
            .image(DockerImage::from_registry("alpine"))
            .command(vec!["emit-two-files".into()])
            .output_type(BundlingOutput::Archived)
            .build();
        let asset =
            AssetSpec::new(id("Code"), src.path(), AssetKind::Directory, Some(options)).unwrap();

        let runtime = RecordingRuntime::builder()
            .output_files(vec!["a.zip".into(), "b.zip".into()])
            .build();
        let publisher = AssetPublisher::new(Arc::new(runtime), out.path());
        let err = publisher.publish(&asset).await.unwrap_err();
        assert!(matches!(err, BundlingError::UnexpectedArchiveOutput { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_should_fail_publish_with_unavailable_image() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("openapi.yaml"), "openapi: 3.0.0").unwrap();
        let out = tempfile::tempdir().unwrap();

        let runtime = Arc::new(RecordingRuntime::builder().failing_builds(true).build());
        let context = src.path().join("docker");
        fs::create_dir_all(&context).unwrap();
        fs::write(context.join("Dockerfile"), "FROM ruby:2.7").unwrap();
        let image = ImageBuildPolicy::Continue
            .resolve(&context, DockerImage::from_build(runtime.as_ref(), &context).await)
            .unwrap();

        let options = BundlingOptions::builder()
            .image(image)
            .output_type(BundlingOutput::NotArchived)
            .build();
        let asset =
            AssetSpec::new(id("Docs"), src.path(), AssetKind::Directory, Some(options)).unwrap();

        let err = AssetPublisher::new(runtime.clone(), out.path())
            .publish(&asset)
            .await
            .unwrap_err();
        assert!(matches!(err, BundlingError::ImageUnavailable { .. }));
        assert!(runtime.runs().is_empty());
    }

    #[tokio::test]
    async fn test_should_stage_plain_file_and_directory() {
        let src = tempfile::tempdir().unwrap();
        let definition = src.path().join("openapi.yaml");
        fs::write(&definition, "openapi: 3.0.0").unwrap();
        fs::create_dir_all(src.path().join("site/css")).unwrap();
        fs::write(src.path().join("site/index.html"), "<h1/>").unwrap();
        fs::write(src.path().join("site/css/a.css"), "a{}").unwrap();
        let out = tempfile::tempdir().unwrap();
        let publisher = AssetPublisher::new(Arc::new(RecordingRuntime::default()), out.path());

        let file = AssetSpec::new(id("ApiAsset"), &definition, AssetKind::File, None).unwrap();
        let dir = AssetSpec::new(id("Site"), src.path().join("site"), AssetKind::Directory, None)
            .unwrap();
        let published = publisher.publish_all([&file, &dir]).await.unwrap();

        let mut staged = String::new();
        File::open(&published[0].path)
            .unwrap()
            .read_to_string(&mut staged)
            .unwrap();
        assert_eq!(staged, "openapi: 3.0.0");
        assert_eq!(zip_names(&published[1].path), vec!["css/a.css", "index.html"]);
    }

    #[tokio::test]
    async fn test_should_report_missing_source_at_publish() {
        let src = tempfile::tempdir().unwrap();
        let path = src.path().join("openapi.yaml");
        fs::write(&path, "x").unwrap();
        let asset = AssetSpec::new(id("ApiAsset"), &path, AssetKind::File, None).unwrap();
        fs::remove_file(&path).unwrap();

        let out = tempfile::tempdir().unwrap();
        let err = AssetPublisher::new(Arc::new(RecordingRuntime::default()), out.path())
            .publish(&asset)
            .await
            .unwrap_err();
        assert!(matches!(err, BundlingError::SourceNotFound { .. }));
    }
}
