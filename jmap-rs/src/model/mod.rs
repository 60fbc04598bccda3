//! Mail objects exchanged with the server

use serde::{Deserialize, Deserializer};

pub mod email;
pub mod filter;
pub mod identity;
pub mod mailbox;

pub use email::{keyword, Attachment, Email, EmailAddress, EmailBodyPart, EmailBodyValue};
pub use filter::{AdvancedFilter, MessageFilter, SortField, SortSpec};
pub use identity::{Identity, Thread};
pub use mailbox::{role, Mailbox, MailboxRights, MailboxStats};

/// Treat an explicit JSON `null` like a missing field
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
