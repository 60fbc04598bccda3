//! JMAP session resource

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{JmapError, Result};
use crate::protocol::MAIL_CAPABILITY;

/// Characters left untouched when filling URL templates
const TEMPLATE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The session document returned by the discovery endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub capabilities: HashMap<String, Value>,
    #[serde(default)]
    pub accounts: HashMap<String, Account>,
    /// Capability URI -> account id
    #[serde(default)]
    pub primary_accounts: HashMap<String, String>,
    #[serde(default)]
    pub username: String,
    pub api_url: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub event_source_url: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// An account visible to the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_personal: bool,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default)]
    pub account_capabilities: HashMap<String, Value>,
}

impl Session {
    /// Parse a raw session document
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| JmapError::Initialization(format!("Malformed session document: {}", e)))
    }

    /// The account holding the user's mail
    pub fn primary_mail_account(&self) -> Option<&str> {
        self.primary_accounts
            .get(MAIL_CAPABILITY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Expand the download URL template for a blob
    pub fn download_url_for(
        &self,
        account_id: &str,
        blob_id: &str,
        name: &str,
        mime_type: &str,
    ) -> String {
        let fill = |value: &str| utf8_percent_encode(value, TEMPLATE_VALUE).to_string();

        self.download_url
            .replace("{accountId}", &fill(account_id))
            .replace("{blobId}", &fill(blob_id))
            .replace("{name}", &fill(name))
            .replace("{type}", &fill(mime_type))
    }
}

/// A session bound to the account every call is made against
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub session: Session,
    pub account_id: String,
}

impl ActiveSession {
    /// Resolve the primary mail account of a session
    pub fn resolve(session: Session) -> Result<Self> {
        let account_id = session
            .primary_mail_account()
            .ok_or_else(|| {
                JmapError::Configuration(
                    "Session document has no primary mail account".to_string(),
                )
            })?
            .to_string();

        Ok(Self {
            session,
            account_id,
        })
    }
}
