//! REST APIs defined by an OpenAPI document.

use std::collections::BTreeMap;

use apistack_core::{LogicalId, StageName};
use apistack_template::{Output, Pseudo, ResourceDecl, Value};
use sha2::{Digest, Sha256};
use typed_builder::TypedBuilder;

use super::assets::FileAsset;
use crate::builder::{Construct, Handle, StackBuilder};
use crate::error::StackResult;

/// Transform macro that inlines a document stored in S3.
pub const INCLUDE_TRANSFORM: &str = "AWS::Include";

/// An API definition merged into the template from an uploaded asset.
///
/// Renders as `{"Fn::Transform": {"Name": "AWS::Include", "Parameters":
/// {"Location": <asset url>}}}`. Only the location is substituted; the
/// document itself is not parsed.
#[derive(Debug, Clone)]
pub struct MergedDefinition {
    asset: Handle<FileAsset>,
}

impl MergedDefinition {
    /// Include the document uploaded by `asset`.
    #[must_use]
    pub fn include(asset: &Handle<FileAsset>) -> Self {
        Self {
            asset: asset.clone(),
        }
    }
}

impl Construct for MergedDefinition {
    type Attrs = Value;

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, Value)> {
        stack.declare_derived(id.clone(), &[self.asset.id()])?;
        let transform = Value::Transform {
            name: INCLUDE_TRANSFORM.to_owned(),
            parameters: BTreeMap::from([("Location".to_owned(), self.asset.attrs().s3_url())]),
        };
        Ok((id, transform))
    }
}

/// Ids of the nodes a REST API expands into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestApiAttrs {
    /// Deployment and stage, when deployed.
    pub stage: Option<DeployedStage>,
}

/// A deployment and the stage it is published to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedStage {
    /// Deployment resource id.
    pub deployment: LogicalId,
    /// Stage resource id.
    pub stage: LogicalId,
    /// Stage name.
    pub name: StageName,
}

/// A REST API whose body is an OpenAPI document.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SpecRestApi {
    /// The merged definition used as the API body.
    definition: Handle<MergedDefinition>,

    /// API name.
    #[builder(setter(into))]
    rest_api_name: String,

    /// Stage the deployment is published to.
    #[builder(default)]
    stage: StageName,

    /// Whether to declare a deployment and stage.
    #[builder(default = true)]
    deploy: bool,

    /// Export the stage endpoint URL under this name.
    #[builder(default, setter(strip_option, into))]
    endpoint_export_name: Option<String>,
}

/// Deployment ids change whenever the body changes so that a new
/// deployment is created.
fn deployment_suffix(body: &Value) -> StackResult<String> {
    let rendered = serde_json::to_vec(body)?;
    Ok(hex::encode(Sha256::digest(&rendered))[..8].to_owned())
}

fn stage_url(api: &LogicalId, stage: &StageName) -> Value {
    Value::join(
        "",
        [
            Value::str("https://"),
            Value::reference(api),
            Value::str(".execute-api."),
            Value::PseudoRef(Pseudo::Region),
            Value::str("."),
            Value::PseudoRef(Pseudo::UrlSuffix),
            Value::str(format!("/{stage}/")),
        ],
    )
}

impl Construct for SpecRestApi {
    type Attrs = RestApiAttrs;

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, RestApiAttrs)> {
        let body = self.definition.attrs().clone();
        let suffix = deployment_suffix(&body)?;

        let api = ResourceDecl::new("AWS::ApiGateway::RestApi")
            .property("Body", body)
            .property("Name", self.rest_api_name);
        stack.declare_resource_after(id.clone(), api, &[self.definition.id()])?;

        if !self.deploy {
            return Ok((id, RestApiAttrs { stage: None }));
        }

        let deployment_id = LogicalId::new(format!("{id}Deployment{suffix}"))?;
        let deployment = ResourceDecl::new("AWS::ApiGateway::Deployment")
            .property("Description", "Automatically created by the RestApi construct")
            .property("RestApiId", Value::reference(&id));
        stack.declare_resource(deployment_id.clone(), deployment)?;

        let stage_suffix: String = self
            .stage
            .as_str()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let stage_id = LogicalId::new(format!("{id}DeploymentStage{stage_suffix}"))?;
        let stage = ResourceDecl::new("AWS::ApiGateway::Stage")
            .property("DeploymentId", Value::reference(&deployment_id))
            .property("RestApiId", Value::reference(&id))
            .property("StageName", self.stage.as_str());
        stack.declare_resource(stage_id.clone(), stage)?;

        if let Some(export) = self.endpoint_export_name {
            let output = Output::new(stage_url(&id, &self.stage)).with_export(export);
            stack.declare_output(&format!("{id}Endpoint"), output)?;
        }

        Ok((
            id,
            RestApiAttrs {
                stage: Some(DeployedStage {
                    deployment: deployment_id,
                    stage: stage_id,
                    name: self.stage,
                }),
            },
        ))
    }
}

impl Handle<SpecRestApi> {
    /// `Ref` of the REST API, i.e. its id.
    #[must_use]
    pub fn rest_api_id(&self) -> Value {
        Value::reference(self.id())
    }

    /// Invoke URL of the deployed stage, if the API is deployed.
    #[must_use]
    pub fn url(&self) -> Option<Value> {
        self.attrs()
            .stage
            .as_ref()
            .map(|stage| stage_url(self.id(), &stage.name))
    }
}
