//! Batched JMAP requests
//!
//! A [`Request`] is an ordered list of method invocations sent in a single
//! HTTP round trip. Later invocations consume the output of earlier ones
//! through typed references ([`ResultReference`], [`CreationId`]) that only
//! become wire syntax (`"#ids"`, `"#draft"`) at serialization time.

use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::method::Method;
use super::{CORE_CAPABILITY, MAIL_CAPABILITY};

/// A complete JMAP API request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub using: Vec<String>,
    pub method_calls: Vec<Invocation>,
}

impl Request {
    /// Whether every invocation in this request is a read
    pub fn is_read_only(&self) -> bool {
        self.method_calls.iter().all(|call| call.method.is_read_only())
    }
}

/// One method call inside a request
#[derive(Debug, Clone)]
pub struct Invocation {
    pub method: Method,
    pub arguments: Map<String, Value>,
    /// Arguments whose value is the result of an earlier call
    pub references: Vec<(String, ResultReference)>,
    pub call_id: String,
}

impl Invocation {
    /// Arguments as sent on the wire, with references under `#name` keys
    pub fn wire_arguments(&self) -> Map<String, Value> {
        let mut arguments = self.arguments.clone();
        for (name, reference) in &self.references {
            arguments.insert(
                format!("#{}", name),
                serde_json::to_value(reference).unwrap_or(Value::Null),
            );
        }
        arguments
    }
}

impl Serialize for Invocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut triple = serializer.serialize_tuple(3)?;
        triple.serialize_element(self.method.as_str())?;
        triple.serialize_element(&self.wire_arguments())?;
        triple.serialize_element(&self.call_id)?;
        triple.end()
    }
}

/// Handle to a call already added to a [`RequestBuilder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRef {
    call_id: String,
    method: Method,
}

impl CallRef {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Reference a JSON pointer inside this call's (not yet known) result
    pub fn result(&self, path: impl Into<String>) -> ResultReference {
        ResultReference {
            result_of: self.call_id.clone(),
            name: self.method.as_str().to_string(),
            path: path.into(),
        }
    }
}

/// Back-reference to the result of an earlier call in the same request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReference {
    pub result_of: String,
    pub name: String,
    pub path: String,
}

/// Request-scoped id for an object created earlier in the same request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreationId(String);

impl CreationId {
    pub fn new(id: impl Into<String>) -> Self {
        CreationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `#id` form later calls use to point at the created object
    pub fn reference(&self) -> String {
        format!("#{}", self.0)
    }
}

/// Accumulates invocations for a single round trip
#[derive(Debug)]
pub struct RequestBuilder {
    using: Vec<String>,
    calls: Vec<Invocation>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            using: vec![CORE_CAPABILITY.to_string(), MAIL_CAPABILITY.to_string()],
            calls: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: &str) -> Self {
        if !self.using.iter().any(|c| c == capability) {
            self.using.push(capability.to_string());
        }
        self
    }

    /// Append a call and get a handle for referencing its result
    pub fn call(&mut self, method: Method, arguments: Value) -> CallRef {
        self.push(method, arguments, Vec::new())
    }

    /// Append a call whose `name` argument is taken from an earlier result
    pub fn call_with_reference(
        &mut self,
        method: Method,
        arguments: Value,
        name: &str,
        reference: ResultReference,
    ) -> CallRef {
        self.push(method, arguments, vec![(name.to_string(), reference)])
    }

    fn push(
        &mut self,
        method: Method,
        arguments: Value,
        references: Vec<(String, ResultReference)>,
    ) -> CallRef {
        let arguments = match arguments {
            Value::Object(map) => map,
            other => {
                debug_assert!(other.is_null(), "JMAP arguments must be an object");
                Map::new()
            }
        };

        let call_id = format!("c{}", self.calls.len());
        self.calls.push(Invocation {
            method,
            arguments,
            references,
            call_id: call_id.clone(),
        });

        CallRef { call_id, method }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn build(self) -> Request {
        Request {
            using: self.using,
            method_calls: self.calls,
        }
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SUBMISSION_CAPABILITY;
    use serde_json::json;

    #[test]
    fn test_query_then_get_serializes_back_reference() {
        let mut builder = RequestBuilder::new();
        let query = builder.call(Method::EmailQuery, json!({"accountId": "a1", "limit": 10}));
        builder.call_with_reference(
            Method::EmailGet,
            json!({"accountId": "a1"}),
            "ids",
            query.result("/ids"),
        );

        let wire = serde_json::to_value(builder.build()).unwrap();
        let calls = wire["methodCalls"].as_array().unwrap();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][0], "Email/query");
        assert_eq!(calls[0][2], "c0");
        assert_eq!(calls[1][0], "Email/get");
        assert_eq!(
            calls[1][1]["#ids"],
            json!({"resultOf": "c0", "name": "Email/query", "path": "/ids"})
        );
        assert!(calls[1][1].get("ids").is_none());
    }

    #[test]
    fn test_capabilities_are_not_duplicated() {
        let request = RequestBuilder::new()
            .with_capability(SUBMISSION_CAPABILITY)
            .with_capability(SUBMISSION_CAPABILITY)
            .build();

        assert_eq!(request.using.len(), 3);
    }

    #[test]
    fn test_creation_reference() {
        let draft = CreationId::new("draft");
        assert_eq!(draft.reference(), "#draft");
        assert_eq!(draft.as_str(), "draft");
    }

    #[test]
    fn test_read_only_detection() {
        let mut builder = RequestBuilder::new();
        builder.call(Method::MailboxGet, json!({"accountId": "a1"}));
        let reads = builder.build();
        assert!(reads.is_read_only());

        let mut builder = RequestBuilder::new();
        builder.call(Method::EmailQuery, json!({}));
        builder.call(Method::EmailSet, json!({}));
        assert!(!builder.build().is_read_only());
    }
}
