//! Typed message filters and sort orders
//!
//! Every recognised key is a field; unknown keys are rejected at
//! deserialization time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::email::keyword;
use crate::error::{JmapError, Result};

/// Filter accepted by `list_messages`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageFilter {
    /// Free-text search across headers and body
    pub text: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    /// Received at or after
    pub after: Option<DateTime<Utc>>,
    /// Received strictly before
    pub before: Option<DateTime<Utc>>,
    pub has_attachment: Option<bool>,
    pub is_unread: Option<bool>,
}

impl MessageFilter {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            text: Some(query.into()),
            ..Default::default()
        }
    }

    /// Messages received in `[after, before)`
    pub fn received_between(after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self {
            after: Some(after),
            before: Some(before),
            ..Default::default()
        }
    }

    /// Build the JMAP `FilterCondition`, optionally scoped to a mailbox
    pub fn to_condition(&self, mailbox_id: Option<&str>) -> Value {
        let mut condition = Map::new();

        if let Some(mailbox_id) = mailbox_id {
            condition.insert("inMailbox".to_string(), json!(mailbox_id));
        }
        insert_text(&mut condition, "text", &self.text);
        insert_text(&mut condition, "from", &self.from);
        insert_text(&mut condition, "to", &self.to);
        insert_text(&mut condition, "subject", &self.subject);
        if let Some(after) = self.after {
            condition.insert("after".to_string(), json!(after));
        }
        if let Some(before) = self.before {
            condition.insert("before".to_string(), json!(before));
        }
        if let Some(has_attachment) = self.has_attachment {
            condition.insert("hasAttachment".to_string(), json!(has_attachment));
        }
        match self.is_unread {
            Some(true) => {
                condition.insert("notKeyword".to_string(), json!(keyword::SEEN));
            }
            Some(false) => {
                condition.insert("hasKeyword".to_string(), json!(keyword::SEEN));
            }
            None => {}
        }

        Value::Object(condition)
    }
}

/// The full filter vocabulary of `advanced_search`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdvancedFilter {
    pub in_mailbox: Option<String>,
    #[serde(default)]
    pub in_mailbox_other_than: Vec<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub text: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub has_keyword: Option<String>,
    pub not_keyword: Option<String>,
    pub all_in_thread_have_keyword: Option<String>,
    pub some_in_thread_have_keyword: Option<String>,
    pub none_in_thread_have_keyword: Option<String>,
    pub has_attachment: Option<bool>,
    /// Sugar for `not_keyword = "$seen"`
    pub is_unread: Option<bool>,
    /// Sugar for `has_keyword = "$flagged"`
    pub is_flagged: Option<bool>,
    /// Sugar for `has_keyword = "$draft"`
    pub is_draft: Option<bool>,
}

impl AdvancedFilter {
    /// Build the JMAP filter.
    ///
    /// A `FilterCondition` holds a single `hasKeyword` and a single
    /// `notKeyword`, so additional keyword requirements are joined with an
    /// `AND` operator.
    pub fn to_filter(&self) -> Result<Value> {
        self.validate()?;

        let mut condition = Map::new();

        insert_text(&mut condition, "inMailbox", &self.in_mailbox);
        if !self.in_mailbox_other_than.is_empty() {
            condition.insert(
                "inMailboxOtherThan".to_string(),
                json!(self.in_mailbox_other_than),
            );
        }
        if let Some(after) = self.after {
            condition.insert("after".to_string(), json!(after));
        }
        if let Some(before) = self.before {
            condition.insert("before".to_string(), json!(before));
        }
        if let Some(min_size) = self.min_size {
            condition.insert("minSize".to_string(), json!(min_size));
        }
        if let Some(max_size) = self.max_size {
            condition.insert("maxSize".to_string(), json!(max_size));
        }
        insert_text(&mut condition, "text", &self.text);
        insert_text(&mut condition, "from", &self.from);
        insert_text(&mut condition, "to", &self.to);
        insert_text(&mut condition, "cc", &self.cc);
        insert_text(&mut condition, "bcc", &self.bcc);
        insert_text(&mut condition, "subject", &self.subject);
        insert_text(&mut condition, "body", &self.body);
        insert_text(
            &mut condition,
            "allInThreadHaveKeyword",
            &self.all_in_thread_have_keyword,
        );
        insert_text(
            &mut condition,
            "someInThreadHaveKeyword",
            &self.some_in_thread_have_keyword,
        );
        insert_text(
            &mut condition,
            "noneInThreadHaveKeyword",
            &self.none_in_thread_have_keyword,
        );
        if let Some(has_attachment) = self.has_attachment {
            condition.insert("hasAttachment".to_string(), json!(has_attachment));
        }

        let (required, excluded) = self.keyword_requirements()?;
        let mut extra = Vec::new();

        for (i, kw) in required.iter().enumerate() {
            if i == 0 {
                condition.insert("hasKeyword".to_string(), json!(kw));
            } else {
                extra.push(json!({ "hasKeyword": kw }));
            }
        }
        for (i, kw) in excluded.iter().enumerate() {
            if i == 0 {
                condition.insert("notKeyword".to_string(), json!(kw));
            } else {
                extra.push(json!({ "notKeyword": kw }));
            }
        }

        if extra.is_empty() {
            return Ok(Value::Object(condition));
        }

        let mut conditions = vec![Value::Object(condition)];
        conditions.extend(extra);
        Ok(json!({ "operator": "AND", "conditions": conditions }))
    }

    fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(JmapError::InvalidInput(format!(
                    "min_size ({}) is larger than max_size ({})",
                    min, max
                )));
            }
        }

        if let (Some(after), Some(before)) = (self.after, self.before) {
            if after > before {
                return Err(JmapError::InvalidInput(
                    "after must not be later than before".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Keywords that must be present and absent, sugar expanded, deduplicated
    fn keyword_requirements(&self) -> Result<(Vec<String>, Vec<String>)> {
        let mut required: Vec<String> = Vec::new();
        let mut excluded: Vec<String> = Vec::new();

        let push = |list: &mut Vec<String>, kw: &str| {
            if !list.iter().any(|k| k == kw) {
                list.push(kw.to_string());
            }
        };

        if let Some(kw) = self.has_keyword.as_deref() {
            push(&mut required, kw);
        }
        if let Some(kw) = self.not_keyword.as_deref() {
            push(&mut excluded, kw);
        }
        match self.is_unread {
            Some(true) => push(&mut excluded, keyword::SEEN),
            Some(false) => push(&mut required, keyword::SEEN),
            None => {}
        }
        match self.is_flagged {
            Some(true) => push(&mut required, keyword::FLAGGED),
            Some(false) => push(&mut excluded, keyword::FLAGGED),
            None => {}
        }
        match self.is_draft {
            Some(true) => push(&mut required, keyword::DRAFT),
            Some(false) => push(&mut excluded, keyword::DRAFT),
            None => {}
        }

        if let Some(kw) = required.iter().find(|kw| excluded.contains(kw)) {
            return Err(JmapError::InvalidInput(format!(
                "keyword {} is both required and excluded",
                kw
            )));
        }

        Ok((required, excluded))
    }
}

/// Sortable message properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[serde(alias = "received_at")]
    ReceivedAt,
    #[serde(alias = "sent_at")]
    SentAt,
    Size,
    From,
    To,
    Subject,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::ReceivedAt => "receivedAt",
            SortField::SentAt => "sentAt",
            SortField::Size => "size",
            SortField::From => "from",
            SortField::To => "to",
            SortField::Subject => "subject",
        }
    }
}

/// One sort key; descending unless `ascending` is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortSpec {
    pub property: SortField,
    #[serde(default)]
    pub ascending: bool,
}

impl SortSpec {
    pub fn descending(property: SortField) -> Self {
        Self {
            property,
            ascending: false,
        }
    }

    pub fn ascending(property: SortField) -> Self {
        Self {
            property,
            ascending: true,
        }
    }

    /// JMAP `Comparator` object
    pub fn to_comparator(&self) -> Value {
        json!({ "property": self.property.as_str(), "isAscending": self.ascending })
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::descending(SortField::ReceivedAt)
    }
}

fn insert_text(condition: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
        condition.insert(key.to_string(), json!(value));
    }
}
