//! JMAP method names used by the client

use serde::{Deserialize, Serialize};

/// A JMAP method this client knows how to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "Mailbox/get")]
    MailboxGet,
    #[serde(rename = "Email/query")]
    EmailQuery,
    #[serde(rename = "Email/get")]
    EmailGet,
    #[serde(rename = "Email/set")]
    EmailSet,
    #[serde(rename = "Thread/get")]
    ThreadGet,
    #[serde(rename = "Identity/get")]
    IdentityGet,
    #[serde(rename = "EmailSubmission/set")]
    EmailSubmissionSet,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::MailboxGet => "Mailbox/get",
            Method::EmailQuery => "Email/query",
            Method::EmailGet => "Email/get",
            Method::EmailSet => "Email/set",
            Method::ThreadGet => "Thread/get",
            Method::IdentityGet => "Identity/get",
            Method::EmailSubmissionSet => "EmailSubmission/set",
        }
    }

    /// Whether calling this method never changes server state
    pub fn is_read_only(&self) -> bool {
        !matches!(self, Method::EmailSet | Method::EmailSubmissionSet)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
