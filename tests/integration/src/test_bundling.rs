//! Container bundling integration tests.

#[cfg(test)]
mod tests {
    use std::fs;

    use apistack_bundling::{
        AssetKind, AssetPackaging, AssetPublisher, AssetSpec, BundlingError, BundlingOptions,
        BundlingOutput, DockerImage, DockerVolume,
    };
    use apistack_core::{BucketEncryption, LogicalId};
    use apistack_stack::constructs::s3::TeardownPolicy;
    use apistack_stack::deploy::{BucketDeploymentAction, SimulatedBucket};

    use crate::{docker, shell_image};

    fn options(script: &str, output_type: BundlingOutput) -> BundlingOptions {
        BundlingOptions::builder()
            .image(DockerImage::from_registry(shell_image()))
            .command(vec!["/bin/sh".into(), "-c".into(), script.into()])
            .user("root")
            .output_type(output_type)
            .build()
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_should_zip_unarchived_output_and_deploy_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("site");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("index.md"), "# Widgets").expect("write");

        let asset = AssetSpec::new(
            LogicalId::new("Docs").expect("id"),
            &source,
            AssetKind::Directory,
            Some(options(
                "cp /asset-input/index.md /asset-output/index.html && mkdir -p /asset-output/css && echo 'body{}' > /asset-output/css/site.css",
                BundlingOutput::NotArchived,
            )),
        )
        .expect("asset");

        let publisher = AssetPublisher::new(docker(), dir.path().join("cdk.out"));
        let published = publisher.publish(&asset).await.expect("publish");
        assert_eq!(published.packaging, AssetPackaging::ZipDirectory);

        let artifact = BucketDeploymentAction::read_artifact(&published.path).expect("read zip");
        let keys: Vec<_> = artifact.keys().cloned().collect();
        assert_eq!(keys, vec!["css/site.css", "index.html"]);

        let bucket = SimulatedBucket::new(
            "docs",
            true,
            BucketEncryption::Unencrypted,
            TeardownPolicy::DestroyWithContents,
        );
        let action = BucketDeploymentAction::new(true, Some("no-cache".into()), Vec::new());
        let report = action.apply(&artifact, &bucket, None).expect("apply");
        assert_eq!(report.uploaded.len(), 2);
        assert_eq!(bucket.keys(), keys);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_should_stage_single_archived_file_and_create_cache_mount() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("app");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("pom.xml"), "<project/>").expect("write");
        let cache = dir.path().join("m2");

        let mut bundling = options(
            "ls /root/.m2/ && echo package > /asset-output/function.zip",
            BundlingOutput::Archived,
        );
        bundling.volumes = vec![DockerVolume::new(&cache, "/root/.m2/")];
        let asset = AssetSpec::new(
            LogicalId::new("Code").expect("id"),
            &source,
            AssetKind::Directory,
            Some(bundling),
        )
        .expect("asset");

        let publisher = AssetPublisher::new(docker(), dir.path().join("cdk.out"));
        let published = publisher.publish(&asset).await.expect("publish");

        assert!(cache.is_dir());
        assert_eq!(published.packaging, AssetPackaging::File);
        assert_eq!(
            fs::read_to_string(&published.path).expect("read"),
            "package\n"
        );
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_should_reject_archived_output_with_several_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("app");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("pom.xml"), "<project/>").expect("write");

        let asset = AssetSpec::new(
            LogicalId::new("Code").expect("id"),
            &source,
            AssetKind::Directory,
            Some(options(
                "touch /asset-output/a.zip /asset-output/b.zip",
                BundlingOutput::Archived,
            )),
        )
        .expect("asset");

        let publisher = AssetPublisher::new(docker(), dir.path().join("cdk.out"));
        let err = publisher.publish(&asset).await.unwrap_err();
        assert!(matches!(err, BundlingError::UnexpectedArchiveOutput { count: 2, .. }));
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_should_report_failing_bundling_command() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("app");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("pom.xml"), "<project/>").expect("write");

        let asset = AssetSpec::new(
            LogicalId::new("Code").expect("id"),
            &source,
            AssetKind::Directory,
            Some(options("exit 3", BundlingOutput::Archived)),
        )
        .expect("asset");

        let publisher = AssetPublisher::new(docker(), dir.path().join("cdk.out"));
        let err = publisher.publish(&asset).await.unwrap_err();
        assert!(matches!(err, BundlingError::CommandFailed { .. }));
    }
}
