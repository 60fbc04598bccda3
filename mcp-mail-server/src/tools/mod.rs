//! Tool catalog exposed over `tools/list` and `tools/call`

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub mod args;
pub mod dispatch;

pub use dispatch::call_tool;

/// A tool that can be called by the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (e.g., "send_email")
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Input parameters
    pub parameters: Vec<ToolParameter>,
}

impl Tool {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// MCP `tools/list` entry with the parameters as a JSON schema
    pub fn to_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut property = json!({
                "type": param.param_type,
                "description": param.description,
            });
            if let Some(items) = &param.items {
                property["items"] = json!({ "type": items });
            }
            properties.insert(param.name.clone(), property);
            if param.required {
                required.push(param.name.clone());
            }
        }

        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }
        })
    }
}

/// Tool parameter definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: String, // "string", "number", "boolean", "array", "object"
    /// Element type of an array parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    pub required: bool,
}

impl ToolParameter {
    pub fn new(name: &str, description: &str, param_type: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            param_type: param_type.to_string(),
            items: None,
            required,
        }
    }

    pub fn string(name: &str, description: &str, required: bool) -> Self {
        Self::new(name, description, "string", required)
    }

    pub fn number(name: &str, description: &str, required: bool) -> Self {
        Self::new(name, description, "number", required)
    }

    pub fn boolean(name: &str, description: &str, required: bool) -> Self {
        Self::new(name, description, "boolean", required)
    }

    pub fn object(name: &str, description: &str, required: bool) -> Self {
        Self::new(name, description, "object", required)
    }

    pub fn array(name: &str, description: &str, items: &str, required: bool) -> Self {
        Self {
            items: Some(items.to_string()),
            ..Self::new(name, description, "array", required)
        }
    }
}

fn days_parameter() -> ToolParameter {
    ToolParameter::number("days", "Look-back window in days (default from config)", false)
}

/// Every tool this server answers, in `tools/list` order
pub fn catalog() -> Vec<Tool> {
    vec![
        Tool::new(
            "list_mailboxes",
            "List all mailboxes (folders) with their roles and message counts. Mailbox ids are needed by list_emails, move_email and bulk_move.",
        ),
        Tool::new(
            "list_emails",
            "List messages, newest first. Returns summaries with an 'id' field to pass to get_email.",
        )
        .with_parameter(ToolParameter::string("mailbox_id", "Restrict to this mailbox", false))
        .with_parameter(ToolParameter::number("limit", "Maximum number of messages (default: 50)", false))
        .with_parameter(ToolParameter::number("position", "Zero-based offset for paging", false))
        .with_parameter(ToolParameter::object(
            "filter",
            "Optional filter: text, from, to, subject, after, before, has_attachment, is_unread",
            false,
        )),
        Tool::new(
            "get_email",
            "Read the full content of one message, including text and HTML bodies.",
        )
        .with_parameter(ToolParameter::string("email_id", "Message id from list_emails", true)),
        Tool::new(
            "send_email",
            "Compose and send a message from one of the account's identities. The sent copy lands in the Sent mailbox.",
        )
        .with_parameter(ToolParameter::array("to", "Recipient addresses ('Name <addr>' accepted)", "string", true))
        .with_parameter(ToolParameter::array("cc", "Cc addresses", "string", false))
        .with_parameter(ToolParameter::array("bcc", "Bcc addresses", "string", false))
        .with_parameter(ToolParameter::string("subject", "Subject line", true))
        .with_parameter(ToolParameter::string("text_body", "Plain-text body", false))
        .with_parameter(ToolParameter::string("html_body", "HTML body", false))
        .with_parameter(ToolParameter::string("from", "Sending address; first identity when omitted", false)),
        Tool::new(
            "search_emails",
            "Full-text search across headers and bodies, newest first.",
        )
        .with_parameter(ToolParameter::string("query", "Search text", true))
        .with_parameter(ToolParameter::number("limit", "Maximum number of messages (default: 50)", false)),
        Tool::new(
            "advanced_search",
            "Search with structured filters (mailbox, dates, size, addresses, keywords, thread keywords, attachments) and sort keys.",
        )
        .with_parameter(ToolParameter::object("filter", "Filter conditions; unknown keys are rejected", false))
        .with_parameter(ToolParameter::array("sort", "Sort keys: {property, ascending}", "object", false))
        .with_parameter(ToolParameter::number("position", "Zero-based offset for paging", false))
        .with_parameter(ToolParameter::number("limit", "Page size (default: 50)", false)),
        Tool::new("mark_email_read", "Mark one message read or unread.")
            .with_parameter(ToolParameter::string("email_id", "Message id", true))
            .with_parameter(ToolParameter::boolean("read", "true for read (default), false for unread", false)),
        Tool::new("bulk_mark_read", "Mark several messages read or unread; reports per-message results.")
            .with_parameter(ToolParameter::array("email_ids", "Message ids", "string", true))
            .with_parameter(ToolParameter::boolean("read", "true for read (default), false for unread", false)),
        Tool::new("move_email", "Move one message to a mailbox, replacing its current mailboxes.")
            .with_parameter(ToolParameter::string("email_id", "Message id", true))
            .with_parameter(ToolParameter::string("target_mailbox_id", "Destination mailbox id", true)),
        Tool::new("bulk_move", "Move several messages to a mailbox; reports per-message results.")
            .with_parameter(ToolParameter::array("email_ids", "Message ids", "string", true))
            .with_parameter(ToolParameter::string("target_mailbox_id", "Destination mailbox id", true)),
        Tool::new("delete_email", "Permanently delete one message.")
            .with_parameter(ToolParameter::string("email_id", "Message id", true)),
        Tool::new("bulk_delete", "Permanently delete several messages; reports per-message results.")
            .with_parameter(ToolParameter::array("email_ids", "Message ids", "string", true)),
        Tool::new("list_identities", "List the sending identities configured on the account."),
        Tool::new("get_thread", "Read every message of a conversation, oldest first.")
            .with_parameter(ToolParameter::string("thread_id", "Thread id from a message summary", true)),
        Tool::new("get_mailbox_stats", "Message and thread counts per mailbox.")
            .with_parameter(ToolParameter::string("mailbox_id", "Only this mailbox", false)),
        Tool::new("get_email_attachments", "List a message's attachments with download URLs.")
            .with_parameter(ToolParameter::string("email_id", "Message id", true)),
        Tool::new(
            "get_email_analytics",
            "Full mailbox analytics: volume, top senders, activity patterns, folder usage, content insights and unread metrics.",
        )
        .with_parameter(days_parameter())
        .with_parameter(ToolParameter::number("max_messages", "Cap on analysed messages (default: 1000)", false))
        .with_parameter(ToolParameter::boolean("include_content", "Include subject and attachment insights (default: true)", false)),
        Tool::new("get_email_volume", "Sent and received message counts.")
            .with_parameter(days_parameter()),
        Tool::new("get_top_senders", "Senders of received mail ranked by message count.")
            .with_parameter(days_parameter())
            .with_parameter(ToolParameter::number("limit", "Number of senders (default from config)", false)),
        Tool::new("get_activity_patterns", "Message counts by hour of day, by day and by month.")
            .with_parameter(days_parameter()),
        Tool::new(
            "get_analytics_report",
            "Human-readable analytics report with recommendations.",
        )
        .with_parameter(days_parameter())
        .with_parameter(ToolParameter::number("max_messages", "Cap on analysed messages (default: 1000)", false)),
    ]
}
