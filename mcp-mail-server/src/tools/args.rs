//! Typed tool arguments; unknown keys are rejected

use jmap_rs::model::{AdvancedFilter, EmailAddress, MessageFilter, SortSpec};
use jmap_rs::SendOptions;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ServerError};

/// Parse `arguments` into `T`; a missing or null object counts as `{}`
pub fn parse<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ServerError::InvalidArguments(e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListEmailsArgs {
    pub mailbox_id: Option<String>,
    pub limit: Option<u64>,
    pub position: Option<u64>,
    #[serde(default)]
    pub filter: MessageFilter,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailIdArgs {
    pub email_id: String,
}

/// One address or a list of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Addresses {
    One(String),
    Many(Vec<String>),
}

impl Default for Addresses {
    fn default() -> Self {
        Addresses::Many(Vec::new())
    }
}

impl Addresses {
    pub fn into_addresses(self) -> Vec<EmailAddress> {
        let raw = match self {
            Addresses::One(address) => vec![address],
            Addresses::Many(addresses) => addresses,
        };
        raw.iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(parse_address)
            .collect()
    }
}

/// `Name <addr@host>` or a bare `addr@host`
pub fn parse_address(raw: &str) -> EmailAddress {
    match (raw.rfind('<'), raw.ends_with('>')) {
        (Some(open), true) => {
            let email = EmailAddress::new(raw[open + 1..raw.len() - 1].trim());
            let name = raw[..open].trim().trim_matches('"').trim();
            if name.is_empty() {
                email
            } else {
                email.with_name(name)
            }
        }
        _ => EmailAddress::new(raw),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendEmailArgs {
    pub to: Addresses,
    #[serde(default)]
    pub cc: Addresses,
    #[serde(default)]
    pub bcc: Addresses,
    #[serde(default)]
    pub subject: String,
    #[serde(alias = "body")]
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub from: Option<String>,
}

impl SendEmailArgs {
    pub fn into_options(self) -> SendOptions {
        SendOptions {
            to: self.to.into_addresses(),
            cc: self.cc.into_addresses(),
            bcc: self.bcc.into_addresses(),
            subject: self.subject,
            text_body: self.text_body,
            html_body: self.html_body,
            from: self.from,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    pub query: String,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdvancedSearchArgs {
    #[serde(default)]
    pub filter: AdvancedFilter,
    #[serde(default)]
    pub sort: Vec<SortSpec>,
    #[serde(default)]
    pub position: u64,
    pub limit: Option<u64>,
}

fn default_read() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadArgs {
    pub email_id: String,
    #[serde(default = "default_read")]
    pub read: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkMarkReadArgs {
    pub email_ids: Vec<String>,
    #[serde(default = "default_read")]
    pub read: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveArgs {
    pub email_id: String,
    pub target_mailbox_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkMoveArgs {
    pub email_ids: Vec<String>,
    pub target_mailbox_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkIdsArgs {
    pub email_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadArgs {
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailboxStatsArgs {
    pub mailbox_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsArgs {
    pub days: Option<u32>,
    pub max_messages: Option<usize>,
    pub include_content: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaysArgs {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopSendersArgs {
    pub days: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportArgs {
    pub days: Option<u32>,
    pub max_messages: Option<usize>,
}

/// Bulk tools need at least one id
pub fn require_ids(ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        return Err(ServerError::InvalidArguments(
            "email_ids must not be empty".to_string(),
        ));
    }
    Ok(())
}
