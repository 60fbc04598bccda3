use serde::{Deserialize, Serialize};

/// Well-known mailbox roles (RFC 8621 §2)
pub mod role {
    pub const INBOX: &str = "inbox";
    pub const DRAFTS: &str = "drafts";
    pub const SENT: &str = "sent";
    pub const TRASH: &str = "trash";
    pub const ARCHIVE: &str = "archive";
    pub const JUNK: &str = "junk";
}

/// A folder in the account's mailbox tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub sort_order: u32,
    #[serde(default)]
    pub total_emails: u64,
    #[serde(default)]
    pub unread_emails: u64,
    #[serde(default)]
    pub total_threads: u64,
    #[serde(default)]
    pub unread_threads: u64,
    #[serde(default)]
    pub my_rights: Option<MailboxRights>,
    #[serde(default)]
    pub is_subscribed: bool,
}

impl Mailbox {
    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Permissions the user holds on a mailbox
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxRights {
    #[serde(default)]
    pub may_read_items: bool,
    #[serde(default)]
    pub may_add_items: bool,
    #[serde(default)]
    pub may_remove_items: bool,
    #[serde(default)]
    pub may_set_seen: bool,
    #[serde(default)]
    pub may_set_keywords: bool,
    #[serde(default)]
    pub may_create_child: bool,
    #[serde(default)]
    pub may_rename: bool,
    #[serde(default)]
    pub may_delete: bool,
    #[serde(default)]
    pub may_submit: bool,
}

/// Message and thread counts for one mailbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxStats {
    pub mailbox_id: String,
    pub name: String,
    pub role: Option<String>,
    pub total_emails: u64,
    pub unread_emails: u64,
    pub total_threads: u64,
    pub unread_threads: u64,
}

impl From<&Mailbox> for MailboxStats {
    fn from(mailbox: &Mailbox) -> Self {
        Self {
            mailbox_id: mailbox.id.clone(),
            name: mailbox.name.clone(),
            role: mailbox.role.clone(),
            total_emails: mailbox.total_emails,
            unread_emails: mailbox.unread_emails,
            total_threads: mailbox.total_threads,
            unread_threads: mailbox.unread_threads,
        }
    }
}
