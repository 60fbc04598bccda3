//! Inputs and outputs of client operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{JmapError, Result};
use crate::model::{Email, EmailAddress, MessageFilter};

/// Default page size for message listings
pub const DEFAULT_LIST_LIMIT: u64 = 50;

/// Options for `list_messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Restrict to one mailbox
    pub mailbox_id: Option<String>,
    pub limit: u64,
    /// Zero-based index of the first result
    pub position: u64,
    pub filter: MessageFilter,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            mailbox_id: None,
            limit: DEFAULT_LIST_LIMIT,
            position: 0,
            filter: MessageFilter::default(),
        }
    }
}

impl ListOptions {
    pub fn in_mailbox(mailbox_id: impl Into<String>) -> Self {
        Self {
            mailbox_id: Some(mailbox_id.into()),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    pub fn with_filter(mut self, filter: MessageFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// One page of a message listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Email>,
    /// Server-side match count; may exceed `messages.len()`
    pub total: u64,
}

/// One page of an advanced search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub messages: Vec<Email>,
    pub total: u64,
    pub position: u64,
    /// Set when the page is full, so more results may follow
    pub has_more_results: bool,
}

/// A message to compose and submit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendOptions {
    pub to: Vec<EmailAddress>,
    #[serde(default)]
    pub cc: Vec<EmailAddress>,
    #[serde(default)]
    pub bcc: Vec<EmailAddress>,
    #[serde(default)]
    pub subject: String,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    /// Sending address; the first identity is used when absent
    pub from: Option<String>,
}

impl SendOptions {
    pub fn validate(&self) -> Result<()> {
        if self.envelope_recipients().is_empty() {
            return Err(JmapError::InvalidInput(
                "At least one recipient is required".to_string(),
            ));
        }

        if let Some(bad) = self
            .to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .find(|a| !a.email.contains('@'))
        {
            return Err(JmapError::InvalidInput(format!(
                "Invalid recipient address '{}'",
                bad.email
            )));
        }

        if non_empty(&self.text_body).is_none() && non_empty(&self.html_body).is_none() {
            return Err(JmapError::InvalidInput(
                "A text or HTML body is required".to_string(),
            ));
        }

        Ok(())
    }

    /// to ∪ cc ∪ bcc, first occurrence wins, compared case-insensitively
    pub fn envelope_recipients(&self) -> Vec<String> {
        let mut recipients: Vec<String> = Vec::new();
        for address in self.to.iter().chain(&self.cc).chain(&self.bcc) {
            if !recipients
                .iter()
                .any(|r| r.eq_ignore_ascii_case(&address.email))
            {
                recipients.push(address.email.clone());
            }
        }
        recipients
    }

    pub fn text(&self) -> Option<&str> {
        non_empty(&self.text_body)
    }

    pub fn html(&self) -> Option<&str> {
        non_empty(&self.html_body)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// A message accepted for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Outcome of a batch operation; partial success is normal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

/// One failed item of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub id: String,
    pub error: String,
}

impl BatchResult {
    pub fn from_outcomes(outcomes: Vec<(String, Result<()>)>) -> Self {
        let mut result = BatchResult::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => result.succeeded.push(id),
                Err(e) => result.failed.push(BatchFailure {
                    id,
                    error: e.to_string(),
                }),
            }
        }
        result
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}
