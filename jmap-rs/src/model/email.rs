use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::nullable;

/// Standard keywords (RFC 8621 §4.1.1)
pub mod keyword {
    pub const SEEN: &str = "$seen";
    pub const FLAGGED: &str = "$flagged";
    pub const DRAFT: &str = "$draft";
    pub const ANSWERED: &str = "$answered";
}

/// A mailbox address with an optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

/// A body part in the parsed MIME structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailBodyPart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub blob_id: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub disposition: Option<String>,
    #[serde(default)]
    pub cid: Option<String>,
}

/// Decoded content of a text body part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailBodyValue {
    pub value: String,
    #[serde(default)]
    pub is_encoding_problem: bool,
    #[serde(default)]
    pub is_truncated: bool,
}

/// Attachment descriptor exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub part_id: Option<String>,
    pub blob_id: Option<String>,
    pub size: u64,
    pub name: Option<String>,
    pub mime_type: Option<String>,
}

/// A message as read from the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    #[serde(default)]
    pub blob_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub mailbox_ids: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub keywords: BTreeMap<String, bool>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub from: Vec<EmailAddress>,
    #[serde(default, deserialize_with = "nullable")]
    pub to: Vec<EmailAddress>,
    #[serde(default, deserialize_with = "nullable")]
    pub cc: Vec<EmailAddress>,
    #[serde(default, deserialize_with = "nullable")]
    pub bcc: Vec<EmailAddress>,
    #[serde(default, deserialize_with = "nullable")]
    pub reply_to: Vec<EmailAddress>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub has_attachment: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub text_body: Vec<EmailBodyPart>,
    #[serde(default, deserialize_with = "nullable")]
    pub html_body: Vec<EmailBodyPart>,
    #[serde(default, deserialize_with = "nullable")]
    pub attachments: Vec<EmailBodyPart>,
    #[serde(default, deserialize_with = "nullable")]
    pub body_values: BTreeMap<String, EmailBodyValue>,
}

impl Email {
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.get(keyword).copied().unwrap_or(false)
    }

    pub fn is_seen(&self) -> bool {
        self.has_keyword(keyword::SEEN)
    }

    pub fn is_flagged(&self) -> bool {
        self.has_keyword(keyword::FLAGGED)
    }

    pub fn is_draft(&self) -> bool {
        self.has_keyword(keyword::DRAFT)
    }

    pub fn in_mailbox(&self, mailbox_id: &str) -> bool {
        self.mailbox_ids.get(mailbox_id).copied().unwrap_or(false)
    }

    /// Mailboxes this message currently belongs to
    pub fn mailbox_id_list(&self) -> Vec<&str> {
        self.mailbox_ids
            .iter()
            .filter(|(_, member)| **member)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// First `From` address
    pub fn sender(&self) -> Option<&EmailAddress> {
        self.from.first()
    }

    pub fn subject_or_empty(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }

    /// Decoded plain-text body, parts joined in order
    pub fn text_content(&self) -> Option<String> {
        self.join_parts(&self.text_body)
    }

    /// Decoded HTML body, parts joined in order
    pub fn html_content(&self) -> Option<String> {
        self.join_parts(&self.html_body)
    }

    fn join_parts(&self, parts: &[EmailBodyPart]) -> Option<String> {
        let values: Vec<&str> = parts
            .iter()
            .filter_map(|part| part.part_id.as_ref())
            .filter_map(|id| self.body_values.get(id))
            .map(|v| v.value.as_str())
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values.join("\n"))
        }
    }

    pub fn attachment_descriptors(&self) -> Vec<Attachment> {
        self.attachments
            .iter()
            .map(|part| Attachment {
                part_id: part.part_id.clone(),
                blob_id: part.blob_id.clone(),
                size: part.size,
                name: part.name.clone(),
                mime_type: part.mime_type.clone(),
            })
            .collect()
    }
}
