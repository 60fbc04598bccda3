//! JMAP responses and the typed shapes of the method results we consume

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::request::CallRef;
use crate::error::{JmapError, Result};

/// A complete JMAP API response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub method_responses: Vec<MethodResponse>,
    #[serde(default)]
    pub session_state: Option<String>,
}

/// One `[name, arguments, callId]` triple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodResponse(pub String, pub Value, pub String);

impl MethodResponse {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn arguments(&self) -> &Value {
        &self.1
    }

    pub fn call_id(&self) -> &str {
        &self.2
    }
}

impl Response {
    pub fn new(method_responses: Vec<MethodResponse>) -> Self {
        Self {
            method_responses,
            session_state: None,
        }
    }

    /// Raw result of a call.
    ///
    /// Matches on call id and method name: a server may add implicit
    /// responses (e.g. `Email/set` after `EmailSubmission/set`) that share
    /// the call id of the call that triggered them.
    pub fn get(&self, call: &CallRef) -> Result<&Value> {
        let method = call.method().as_str();

        let found = self
            .method_responses
            .iter()
            .filter(|r| r.call_id() == call.call_id())
            .find(|r| r.name() == method || r.name() == "error");

        match found {
            Some(response) if response.name() == "error" => {
                let args = response.arguments();
                Err(JmapError::Method {
                    method: method.to_string(),
                    error_type: args
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                    description: args
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("No description")
                        .to_string(),
                })
            }
            Some(response) => Ok(response.arguments()),
            None => Err(JmapError::protocol(
                format!("No {} response for call {}", method, call.call_id()),
                serde_json::to_value(&self.method_responses).unwrap_or(Value::Null),
            )),
        }
    }

    /// Result of a call, deserialized into `T`
    pub fn parse<T: DeserializeOwned>(&self, call: &CallRef) -> Result<T> {
        let raw = self.get(call)?;
        serde_json::from_value(raw.clone()).map_err(|e| {
            JmapError::protocol(
                format!("Malformed {} response: {}", call.method(), e),
                raw.clone(),
            )
        })
    }
}

/// Result of any `Foo/get`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResponse<T> {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    pub list: Vec<T>,
    #[serde(default)]
    pub not_found: Vec<String>,
}

/// Result of `Email/query`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub ids: Vec<String>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub position: u64,
}

/// Result of any `Foo/set`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetResponse {
    #[serde(default)]
    pub created: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub updated: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub destroyed: Option<Vec<String>>,
    #[serde(default)]
    pub not_created: Option<HashMap<String, SetError>>,
    #[serde(default)]
    pub not_updated: Option<HashMap<String, SetError>>,
    #[serde(default)]
    pub not_destroyed: Option<HashMap<String, SetError>>,
}

impl SetResponse {
    pub fn created(&self, creation_id: &str) -> Option<&Value> {
        self.created.as_ref().and_then(|c| c.get(creation_id))
    }

    pub fn not_created(&self, creation_id: &str) -> Option<&SetError> {
        self.not_created.as_ref().and_then(|c| c.get(creation_id))
    }

    pub fn was_updated(&self, id: &str) -> bool {
        self.updated.as_ref().is_some_and(|u| u.contains_key(id))
    }

    pub fn not_updated(&self, id: &str) -> Option<&SetError> {
        self.not_updated.as_ref().and_then(|u| u.get(id))
    }

    pub fn was_destroyed(&self, id: &str) -> bool {
        self.destroyed.as_ref().is_some_and(|d| d.iter().any(|x| x == id))
    }

    pub fn not_destroyed(&self, id: &str) -> Option<&SetError> {
        self.not_destroyed.as_ref().and_then(|d| d.get(id))
    }
}

/// Per-object failure inside a `Foo/set` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Option<Vec<String>>,
}

impl SetError {
    pub fn is_not_found(&self) -> bool {
        self.error_type == "notFound"
    }
}

impl std::fmt::Display for SetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.error_type, description),
            None => write!(f, "{}", self.error_type),
        }
    }
}
