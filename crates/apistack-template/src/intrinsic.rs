//! Property values and intrinsic functions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use apistack_core::LogicalId;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// CloudFormation pseudo parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    /// `AWS::AccountId`
    AccountId,
    /// `AWS::Region`
    Region,
    /// `AWS::Partition`
    Partition,
    /// `AWS::URLSuffix`
    UrlSuffix,
    /// `AWS::StackName`
    StackName,
}

impl Pseudo {
    /// The parameter name as written in a template.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountId => "AWS::AccountId",
            Self::Region => "AWS::Region",
            Self::Partition => "AWS::Partition",
            Self::UrlSuffix => "AWS::URLSuffix",
            Self::StackName => "AWS::StackName",
        }
    }
}

impl fmt::Display for Pseudo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A template value: a literal, a collection, or an intrinsic function.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Number(i64),
    /// String literal.
    String(String),
    /// Ordered list.
    List(Vec<Value>),
    /// Object with keys in sorted order.
    Map(BTreeMap<String, Value>),
    /// `{"Ref": "<LogicalId>"}`
    Ref(LogicalId),
    /// `{"Ref": "AWS::..."}`
    PseudoRef(Pseudo),
    /// `{"Fn::GetAtt": ["<LogicalId>", "<Attribute>"]}`
    GetAtt(LogicalId, String),
    /// `{"Fn::Join": ["<delimiter>", [...]]}`
    Join(String, Vec<Value>),
    /// `{"Fn::Sub": "<template string>"}`
    Sub(String),
    /// `{"Fn::Transform": {"Name": ..., "Parameters": {...}}}`
    Transform {
        /// Macro name, e.g. `AWS::Include`.
        name: String,
        /// Macro parameters.
        parameters: BTreeMap<String, Value>,
    },
}

impl Value {
    /// Shorthand for a string literal.
    #[must_use]
    pub fn str(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Build a map value from key/value pairs.
    #[must_use]
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a list value.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// `Ref` to another node in the stack.
    #[must_use]
    pub fn reference(id: &LogicalId) -> Self {
        Self::Ref(id.clone())
    }

    /// `Fn::GetAtt` on another node in the stack.
    #[must_use]
    pub fn get_att(id: &LogicalId, attribute: impl Into<String>) -> Self {
        Self::GetAtt(id.clone(), attribute.into())
    }

    /// `Fn::Join` with the given delimiter.
    #[must_use]
    pub fn join(delimiter: impl Into<String>, parts: impl IntoIterator<Item = Value>) -> Self {
        Self::Join(delimiter.into(), parts.into_iter().collect())
    }

    /// `Fn::Sub` over a template string.
    #[must_use]
    pub fn sub(template: impl Into<String>) -> Self {
        Self::Sub(template.into())
    }

    /// Look up a key if this is a map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// The string literal, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean literal, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Logical IDs of the stack nodes this value reads from.
    ///
    /// Pseudo parameters and `${AWS::...}` placeholders are not references.
    #[must_use]
    pub fn references(&self) -> BTreeSet<LogicalId> {
        let mut out = BTreeSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut BTreeSet<LogicalId>) {
        match self {
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) | Self::PseudoRef(_) => {}
            Self::Ref(id) | Self::GetAtt(id, _) => {
                out.insert(id.clone());
            }
            Self::List(items) | Self::Join(_, items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Self::Map(entries) | Self::Transform { parameters: entries, .. } => {
                for value in entries.values() {
                    value.collect_references(out);
                }
            }
            Self::Sub(template) => out.extend(sub_placeholders(template)),
        }
    }
}

/// Extract the logical IDs named by `${Id}` / `${Id.Attr}` placeholders.
fn sub_placeholders(template: &str) -> Vec<LogicalId> {
    let mut ids = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        // `${!Literal}` is an escaped placeholder.
        if !name.starts_with('!') && !name.contains("::") {
            let base = name.split('.').next().unwrap_or(name);
            if let Ok(id) = LogicalId::new(base) {
                ids.push(id);
            }
        }
        rest = &after[end + 1..];
    }
    ids
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(i64::from(n))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => serializer.serialize_i64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Ref(id) => single_entry(serializer, "Ref", id.as_str()),
            Self::PseudoRef(p) => single_entry(serializer, "Ref", p.as_str()),
            Self::GetAtt(id, attr) => {
                single_entry(serializer, "Fn::GetAtt", &[id.as_str(), attr.as_str()])
            }
            Self::Join(delimiter, parts) => {
                single_entry(serializer, "Fn::Join", &(delimiter.as_str(), parts))
            }
            Self::Sub(template) => single_entry(serializer, "Fn::Sub", template.as_str()),
            Self::Transform { name, parameters } => {
                let body = TransformBody { name, parameters };
                single_entry(serializer, "Fn::Transform", &body)
            }
        }
    }
}

#[derive(Serialize)]
struct TransformBody<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Parameters")]
    parameters: &'a BTreeMap<String, Value>,
}

fn single_entry<S: Serializer, V: Serialize + ?Sized>(
    serializer: S,
    key: &str,
    value: &V,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    #[test]
    fn test_should_serialize_ref_and_get_att() {
        let value = Value::list([
            Value::reference(&id("WebBucket")),
            Value::get_att(&id("WebBucket"), "Arn"),
            Value::PseudoRef(Pseudo::Region),
        ]);
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!([
                {"Ref": "WebBucket"},
                {"Fn::GetAtt": ["WebBucket", "Arn"]},
                {"Ref": "AWS::Region"}
            ])
        );
    }

    #[test]
    fn test_should_serialize_transform_include() {
        let value = Value::Transform {
            name: "AWS::Include".to_owned(),
            parameters: BTreeMap::from([(
                "Location".to_owned(),
                Value::sub("s3://assets-${AWS::AccountId}/abc.yaml"),
            )]),
        };
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"Fn::Transform": {
                "Name": "AWS::Include",
                "Parameters": {"Location": {"Fn::Sub": "s3://assets-${AWS::AccountId}/abc.yaml"}}
            }})
        );
    }

    #[test]
    fn test_should_serialize_join() {
        let value = Value::join("", [Value::get_att(&id("Bucket"), "Arn"), "/*".into()]);
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"Fn::Join": ["", [{"Fn::GetAtt": ["Bucket", "Arn"]}, "/*"]]})
        );
    }

    #[test]
    fn test_should_collect_nested_references() {
        let value = Value::map([
            ("Role", Value::get_att(&id("ServiceRole"), "Arn")),
            (
                "Nested",
                Value::list([Value::join(",", [Value::reference(&id("Fn"))])]),
            ),
            ("Region", Value::PseudoRef(Pseudo::Region)),
        ]);
        let refs: Vec<String> = value.references().iter().map(ToString::to_string).collect();
        assert_eq!(refs, vec!["Fn", "ServiceRole"]);
    }

    #[test]
    fn test_should_collect_sub_placeholders_except_pseudo_and_escaped() {
        let value = Value::sub("arn:${AWS::Partition}:s3:::${WebBucket}/${Api.RootResourceId}/${!Literal}");
        let refs: Vec<String> = value.references().iter().map(ToString::to_string).collect();
        assert_eq!(refs, vec!["Api", "WebBucket"]);
    }

    #[test]
    fn test_should_look_up_map_entries() {
        let value = Value::map([("Status", Value::str("Enabled"))]);
        assert_eq!(value.get("Status").and_then(Value::as_str), Some("Enabled"));
        assert!(value.get("Missing").is_none());
    }
}
