//! CloudFormation template document

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub const FORMAT_VERSION: &str = "2010-09-09";

/// A CloudFormation template
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    pub description: String,
    /// Logical ID -> resource
    pub resources: BTreeMap<String, Resource>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: description.into(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, logical_id: impl Into<String>, resource: Resource) {
        self.resources.insert(logical_id.into(), resource);
    }

    pub fn output(&mut self, name: impl Into<String>, description: &str, value: Value) {
        self.outputs.insert(
            name.into(),
            Output {
                description: Some(description.to_string()),
                value,
            },
        );
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Resources of one type, ordered by logical ID
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A single template resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    pub properties: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

impl Resource {
    pub fn new(resource_type: &str, properties: Value) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: vec![],
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    pub fn depends_on(mut self, logical_id: &str) -> Self {
        self.depends_on.push(logical_id.to_string());
        self
    }

    /// Keep the physical resource when it leaves the stack
    pub fn retain(mut self) -> Self {
        self.deletion_policy = Some("Retain".to_string());
        self.update_replace_policy = Some("Retain".to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: Value,
}

/// `{"Ref": id}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Sub": text}`
pub fn sub(text: impl Into<String>) -> Value {
    json!({ "Fn::Sub": text.into() })
}

/// `{"Fn::Join": [separator, parts]}`
pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_cloudformation_keys() {
        let mut template = Template::new("test");
        template.add(
            "Table",
            Resource::new("AWS::DynamoDB::Table", json!({"BillingMode": "PAY_PER_REQUEST"})).retain(),
        );
        template.add(
            "Topic",
            Resource::new("AWS::SNS::Topic", json!({})).depends_on("Table"),
        );

        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(value["Resources"]["Table"]["Type"], "AWS::DynamoDB::Table");
        assert_eq!(value["Resources"]["Table"]["DeletionPolicy"], "Retain");
        assert!(value["Resources"]["Table"].get("DependsOn").is_none());
        assert_eq!(value["Resources"]["Topic"]["DependsOn"], json!(["Table"]));
        assert!(value.get("Outputs").is_none());
    }

    #[test]
    fn test_intrinsics() {
        assert_eq!(reference("Topic"), json!({"Ref": "Topic"}));
        assert_eq!(
            get_att("Table", "StreamArn"),
            json!({"Fn::GetAtt": ["Table", "StreamArn"]})
        );
        assert_eq!(
            join("", vec![json!("/aws/lambda/"), reference("Fn")]),
            json!({"Fn::Join": ["", ["/aws/lambda/", {"Ref": "Fn"}]]})
        );
    }
}
