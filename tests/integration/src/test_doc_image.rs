//! Documentation image build integration tests.

#[cfg(test)]
mod tests {
    use apistack_bundling::{AssetPublisher, BundlingError, DockerImage};
    use apistack_stack::api_stack::{
        BUCKET_NAME_OUTPUT, CLOUDFRONT_URL_OUTPUT, DISTRIBUTION_ID_OUTPUT, DOC_ASSET_ID,
        REST_ID_OUTPUT,
    };
    use apistack_stack::{StackError, synth};

    use crate::{docker, write_project};

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_should_build_doc_image_from_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_project(dir.path(), "RUN mkdir -p /openapi/slate\n").expect("project");

        let runtime = docker();
        let image = DockerImage::from_build(runtime.as_ref(), &config.doc_build_context)
            .await
            .expect("build");
        assert!(image.is_available());
        assert!(image.image().starts_with("apistack-"));

        let synthesized = synth(&config, runtime.as_ref()).await.expect("synth");
        let doc_asset = synthesized
            .stack
            .assets
            .iter()
            .find(|a| a.id().as_str() == DOC_ASSET_ID)
            .expect("doc asset");
        let bundling = doc_asset.bundling().expect("bundling");
        assert_eq!(bundling.image, image);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_should_continue_past_broken_doc_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_project(dir.path(), "RUN exit 1\n").expect("project");

        let runtime = docker();
        let synthesized = synth(&config, runtime.as_ref()).await.expect("synth");
        for output in [
            REST_ID_OUTPUT,
            BUCKET_NAME_OUTPUT,
            CLOUDFRONT_URL_OUTPUT,
            DISTRIBUTION_ID_OUTPUT,
        ] {
            assert!(synthesized.template().output(output).is_some(), "{output}");
        }
        synthesized.write_to(&config.outdir).await.expect("write");

        let doc_asset = synthesized
            .stack
            .assets
            .iter()
            .find(|a| a.id().as_str() == DOC_ASSET_ID)
            .expect("doc asset");
        let publisher = AssetPublisher::new(runtime, &config.outdir);
        let err = publisher.publish(doc_asset).await.unwrap_err();
        assert!(matches!(err, BundlingError::ImageUnavailable { .. }));
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_should_abort_on_broken_doc_image_when_configured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = write_project(dir.path(), "RUN exit 1\n").expect("project");
        config.continue_on_doc_image_failure = false;

        let err = synth(&config, docker().as_ref()).await.unwrap_err();
        assert!(matches!(err, StackError::Bundling(BundlingError::ImageBuild { .. })));
    }
}
