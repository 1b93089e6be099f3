//! Synthesized template document.

use apistack_core::LogicalId;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::intrinsic::Value;
use crate::resource::ResourceDecl;

/// The template format version written into every template.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A stack output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    /// Value of the output, resolved at apply time.
    #[serde(rename = "Value")]
    pub value: Value,
    /// Optional human-readable description.
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional cross-stack export.
    #[serde(rename = "Export", skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

impl Output {
    /// An output with only a value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
            export: None,
        }
    }

    /// Export the output under the given name.
    #[must_use]
    pub fn with_export(mut self, name: impl Into<String>) -> Self {
        self.export = Some(Export { name: name.into() });
        self
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Export block of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Export {
    /// Export name, unique per account and region.
    #[serde(rename = "Name")]
    pub name: String,
}

/// A synthesized template: resources and outputs in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    description: Option<String>,
    resources: Vec<(LogicalId, ResourceDecl)>,
    outputs: Vec<(LogicalId, Output)>,
}

impl Template {
    /// Create an empty template.
    #[must_use]
    pub fn new(description: Option<String>) -> Self {
        Self {
            description,
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Append a resource. Ordering and uniqueness are the caller's concern.
    pub fn push_resource(&mut self, id: LogicalId, decl: ResourceDecl) {
        self.resources.push((id, decl));
    }

    /// Append an output.
    pub fn push_output(&mut self, id: LogicalId, output: Output) {
        self.outputs.push((id, output));
    }

    /// Look up a resource by logical ID.
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<&ResourceDecl> {
        self.resources
            .iter()
            .find(|(rid, _)| rid.as_str() == id)
            .map(|(_, decl)| decl)
    }

    /// Look up an output by logical ID.
    #[must_use]
    pub fn output(&self, id: &str) -> Option<&Output> {
        self.outputs
            .iter()
            .find(|(oid, _)| oid.as_str() == id)
            .map(|(_, output)| output)
    }

    /// All resources in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[(LogicalId, ResourceDecl)] {
        &self.resources
    }

    /// All outputs in declaration order.
    #[must_use]
    pub fn outputs(&self) -> &[(LogicalId, Output)] {
        &self.outputs
    }

    /// Resources of the given type, in declaration order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a LogicalId, &'a ResourceDecl)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, decl)| decl.resource_type() == resource_type)
            .map(|(id, decl)| (id, decl))
    }

    /// Render the template as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error (not expected for well-formed values).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Serializes `(id, value)` pairs as a JSON object, keeping their order.
struct Ordered<'a, T>(&'a [(LogicalId, T)]);

impl<T: Serialize> Serialize for Ordered<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, value) in self.0 {
            map.serialize_entry(id.as_str(), value)?;
        }
        map.end()
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("AWSTemplateFormatVersion", TEMPLATE_FORMAT_VERSION)?;
        if let Some(description) = &self.description {
            map.serialize_entry("Description", description)?;
        }
        map.serialize_entry("Resources", &Ordered(&self.resources))?;
        if !self.outputs.is_empty() {
            map.serialize_entry("Outputs", &Ordered(&self.outputs))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    #[test]
    fn test_should_keep_resources_in_declaration_order() {
        let mut template = Template::new(Some("docs".to_owned()));
        template.push_resource(id("Zeta"), ResourceDecl::new("AWS::S3::Bucket"));
        template.push_resource(id("Alpha"), ResourceDecl::new("AWS::S3::BucketPolicy"));

        let json = template.to_json_pretty().unwrap();
        let zeta = json.find("\"Zeta\"").unwrap();
        let alpha = json.find("\"Alpha\"").unwrap();
        assert!(zeta < alpha, "declaration order must be preserved");
        assert!(json.contains("\"AWSTemplateFormatVersion\": \"2010-09-09\""));
        assert!(!json.contains("\"Outputs\""));
    }

    #[test]
    fn test_should_serialize_output_with_export() {
        let mut template = Template::default();
        template.push_resource(id("Api"), ResourceDecl::new("AWS::ApiGateway::RestApi"));
        template.push_output(
            id("Endpoint"),
            Output::new(Value::reference(&id("Api"))).with_export("ApiEndpoint"),
        );

        let json: serde_json::Value =
            serde_json::from_str(&template.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["Outputs"]["Endpoint"]["Value"]["Ref"], "Api");
        assert_eq!(json["Outputs"]["Endpoint"]["Export"]["Name"], "ApiEndpoint");
        assert!(template.output("Endpoint").is_some());
    }

    #[test]
    fn test_should_filter_resources_by_type() {
        let mut template = Template::default();
        template.push_resource(id("A"), ResourceDecl::new("AWS::S3::Bucket"));
        template.push_resource(id("B"), ResourceDecl::new("AWS::IAM::Role"));
        template.push_resource(id("C"), ResourceDecl::new("AWS::S3::Bucket"));

        let buckets: Vec<&str> = template
            .resources_of_type("AWS::S3::Bucket")
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(buckets, vec!["A", "C"]);
        assert!(template.resource("B").is_some());
        assert!(template.resource("D").is_none());
    }
}
