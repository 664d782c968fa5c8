//! Mock definition data model.
//!
//! Defines the request matcher and response template pair that the store
//! holds and the dispatcher replays.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors produced when a definition fails eager validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The request method is present but empty.
    #[error("request method cannot be empty")]
    EmptyMethod,

    /// The request url is not an absolute path.
    #[error("request url must start with '/': {0:?}")]
    UrlNotAbsolute(String),

    /// The response status is outside the valid HTTP range.
    #[error("invalid status code: {0}")]
    InvalidStatus(u16),
}

/// A single mock definition: which requests it matches and what to answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockDefinition {
    /// Request matcher
    pub request: RequestSpec,

    /// Response to replay
    pub response: ResponseSpec,
}

impl MockDefinition {
    /// Validate the definition before it is admitted into the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.request.validate()?;
        self.response.validate()?;
        Ok(())
    }
}

/// Request matching configuration: method and url are compared exactly,
/// headers (when present) gate the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSpec {
    /// HTTP method, matched case-sensitively
    pub method: String,

    /// Absolute request path, matched by string equality
    pub url: String,

    /// Required headers; ordered so the serialized form is canonical
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

impl RequestSpec {
    /// Validate the request side of a definition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.method.is_empty() {
            return Err(ValidationError::EmptyMethod);
        }
        if !self.url.starts_with('/') {
            return Err(ValidationError::UrlNotAbsolute(self.url.clone()));
        }
        Ok(())
    }

    /// Header requirements, treating an empty map the same as no map.
    pub fn header_requirements(&self) -> Option<&BTreeMap<String, String>> {
        self.headers.as_ref().filter(|h| !h.is_empty())
    }
}

/// Response template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseSpec {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodySpec>,
}

fn default_status() -> u16 {
    200
}

impl ResponseSpec {
    /// Validate the response side of a definition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.status < 100 || self.status > 599 {
            return Err(ValidationError::InvalidStatus(self.status));
        }
        Ok(())
    }
}

/// Response body: either raw text passed through byte-for-byte or a
/// structured value encoded as JSON. Untagged so the wire shape stays
/// `"body": <any>` - a JSON string becomes `Text`, everything else `Json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodySpec {
    /// Raw text, sent as-is
    Text(String),
    /// Structured value, serialized as JSON
    Json(serde_json::Value),
}

impl BodySpec {
    /// Get the body content as bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            BodySpec::Text(content) => Ok(content.as_bytes().to_vec()),
            BodySpec::Json(content) => serde_json::to_vec(content),
        }
    }

    /// Get content type for this body.
    pub fn content_type(&self) -> &'static str {
        match self {
            BodySpec::Text(_) => "text/plain",
            BodySpec::Json(_) => "application/json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_definition() {
        let json = r#"{
            "request": { "method": "GET", "url": "/api/users" },
            "response": {
                "status": 200,
                "headers": { "Content-Type": "application/json" },
                "body": { "users": [] }
            }
        }"#;
        let def: MockDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.request.method, "GET");
        assert_eq!(def.request.url, "/api/users");
        assert!(def.request.headers.is_none());
        assert_eq!(def.response.status, 200);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_status_defaults_to_200() {
        let json = r#"{
            "request": { "method": "GET", "url": "/x" },
            "response": {}
        }"#;
        let def: MockDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.response.status, 200);
        assert!(def.response.headers.is_empty());
        assert!(def.response.body.is_none());
    }

    #[test]
    fn test_missing_request_fields_fail_to_parse() {
        let json = r#"{ "request": { "method": "GET" }, "response": {} }"#;
        assert!(serde_json::from_str::<MockDefinition>(json).is_err());

        let json = r#"{ "response": { "status": 200 } }"#;
        assert!(serde_json::from_str::<MockDefinition>(json).is_err());
    }

    #[test]
    fn test_string_body_parses_as_text() {
        let json = r#"{
            "request": { "method": "GET", "url": "/x" },
            "response": { "body": "plain text" }
        }"#;
        let def: MockDefinition = serde_json::from_str(json).unwrap();
        match &def.response.body {
            Some(BodySpec::Text(content)) => assert_eq!(content, "plain text"),
            other => panic!("expected text body, got {:?}", other),
        }
    }

    #[test]
    fn test_object_body_parses_as_json() {
        let json = r#"{
            "request": { "method": "GET", "url": "/x" },
            "response": { "body": { "msg": "hi" } }
        }"#;
        let def: MockDefinition = serde_json::from_str(json).unwrap();
        match &def.response.body {
            Some(BodySpec::Json(content)) => assert_eq!(content["msg"], "hi"),
            other => panic!("expected json body, got {:?}", other),
        }
    }

    #[test]
    fn test_body_to_bytes() {
        let text = BodySpec::Text("hello".to_string());
        assert_eq!(text.to_bytes().unwrap(), b"hello");
        assert_eq!(text.content_type(), "text/plain");

        let json = BodySpec::Json(serde_json::json!({"key": "value"}));
        assert_eq!(json.to_bytes().unwrap(), br#"{"key":"value"}"#);
        assert_eq!(json.content_type(), "application/json");
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        let json = r#"{
            "request": { "method": "GET", "url": "api/users" },
            "response": {}
        }"#;
        let def: MockDefinition = serde_json::from_str(json).unwrap();
        assert!(matches!(
            def.validate(),
            Err(ValidationError::UrlNotAbsolute(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_method() {
        let json = r#"{
            "request": { "method": "", "url": "/x" },
            "response": {}
        }"#;
        let def: MockDefinition = serde_json::from_str(json).unwrap();
        assert!(matches!(def.validate(), Err(ValidationError::EmptyMethod)));
    }

    #[test]
    fn test_validate_rejects_out_of_range_status() {
        for status in [0u16, 99, 600, 1000] {
            let json = format!(
                r#"{{ "request": {{ "method": "GET", "url": "/x" }},
                     "response": {{ "status": {} }} }}"#,
                status
            );
            let def: MockDefinition = serde_json::from_str(&json).unwrap();
            assert!(
                matches!(def.validate(), Err(ValidationError::InvalidStatus(_))),
                "status {} should be rejected",
                status
            );
        }
    }

    #[test]
    fn test_empty_header_map_is_no_requirement() {
        let json = r#"{
            "request": { "method": "GET", "url": "/x", "headers": {} },
            "response": {}
        }"#;
        let def: MockDefinition = serde_json::from_str(json).unwrap();
        assert!(def.request.header_requirements().is_none());
    }

    #[test]
    fn test_wire_shape_round_trip() {
        let json = r#"{"request":{"method":"GET","url":"/api/x","headers":{"H":"v"}},"response":{"status":200,"headers":{"H":"v"},"body":{"k":1}}}"#;
        let def: MockDefinition = serde_json::from_str(json).unwrap();
        let back = serde_json::to_string(&def).unwrap();
        let reparsed: MockDefinition = serde_json::from_str(&back).unwrap();
        assert_eq!(def, reparsed);
    }
}
