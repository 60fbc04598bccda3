use serde::{Deserialize, Serialize};

use super::email::EmailAddress;
use super::nullable;

/// A sending identity configured on the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "nullable")]
    pub reply_to: Vec<EmailAddress>,
    #[serde(default, deserialize_with = "nullable")]
    pub bcc: Vec<EmailAddress>,
    #[serde(default)]
    pub may_delete: bool,
}

impl Identity {
    pub fn address(&self) -> EmailAddress {
        let address = EmailAddress::new(self.email.clone());
        if self.name.is_empty() {
            address
        } else {
            address.with_name(self.name.clone())
        }
    }
}

/// A conversation: the ids of its messages, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub email_ids: Vec<String>,
}
