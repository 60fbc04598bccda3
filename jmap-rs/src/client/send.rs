use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use super::options::{SendOptions, SentMessage};
use super::JmapClient;
use crate::error::{JmapError, Result};
use crate::model::{keyword, role, Identity, Mailbox};
use crate::protocol::{CreationId, Method, RequestBuilder, SetResponse, SUBMISSION_CAPABILITY};

impl JmapClient {
    /// Compose a draft and submit it in one request.
    ///
    /// When the account has a Sent mailbox the submitted message is moved
    /// there; otherwise the server destroys the draft after submission. If
    /// the draft is created but submission fails, the draft is destroyed
    /// and a single `Send` error is returned.
    pub async fn send_message(&self, options: &SendOptions) -> Result<SentMessage> {
        let account_id = self.account_id()?.to_string();
        options.validate()?;

        let mailboxes = self.list_mailboxes().await?;
        let drafts = mailboxes
            .iter()
            .find(|m| m.has_role(role::DRAFTS))
            .ok_or_else(|| JmapError::MailboxNotFound(role::DRAFTS.to_string()))?;
        let sent = mailboxes.iter().find(|m| m.has_role(role::SENT));
        let identity = self.resolve_identity(options.from.as_deref()).await?;

        let draft = CreationId::new("draft");
        let submission = CreationId::new("submission");

        let mut builder = RequestBuilder::new().with_capability(SUBMISSION_CAPABILITY);
        let create = builder.call(
            Method::EmailSet,
            json!({
                "accountId": account_id,
                "create": { draft.as_str(): draft_object(options, &identity, drafts) },
            }),
        );

        let mut submit_args = json!({
            "accountId": account_id,
            "create": {
                submission.as_str(): {
                    "identityId": identity.id,
                    "emailId": draft.reference(),
                    "envelope": {
                        "mailFrom": { "email": identity.email },
                        "rcptTo": options
                            .envelope_recipients()
                            .iter()
                            .map(|email| json!({ "email": email }))
                            .collect::<Vec<_>>(),
                    },
                },
            },
        });
        match sent {
            Some(sent) => {
                submit_args["onSuccessUpdateEmail"] = json!({
                    submission.reference(): {
                        format!("mailboxIds/{}", drafts.id): null,
                        format!("mailboxIds/{}", sent.id): true,
                        format!("keywords/{}", keyword::DRAFT): null,
                    }
                });
            }
            None => {
                submit_args["onSuccessDestroyEmail"] = json!([submission.reference()]);
            }
        }
        let submit = builder.call(Method::EmailSubmissionSet, submit_args);

        // A half-finished send must not look retryable to callers.
        let response = self
            .send(builder.build())
            .await
            .map_err(|e| JmapError::Send(format!("request failed: {}", e)))?;

        let created: SetResponse = response
            .parse(&create)
            .map_err(|e| JmapError::Send(format!("draft could not be created: {}", e)))?;
        if let Some(err) = created.not_created(draft.as_str()) {
            return Err(JmapError::Send(format!("draft could not be created: {}", err)));
        }
        let email_id = created
            .created(draft.as_str())
            .and_then(|c| c.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| JmapError::Send("server did not report the created draft".to_string()))?
            .to_string();

        let submitted = response
            .parse::<SetResponse>(&submit)
            .map_err(|e| e.to_string())
            .and_then(|set| {
                if let Some(err) = set.not_created(submission.as_str()) {
                    return Err(err.to_string());
                }
                set.created(submission.as_str())
                    .cloned()
                    .ok_or_else(|| "server did not report the submission".to_string())
            });

        match submitted {
            Ok(submission) => {
                let sent_at = submission
                    .get("sendAt")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc));

                info!(
                    "📤 Sent message {} to {} recipient(s)",
                    email_id,
                    options.envelope_recipients().len()
                );
                Ok(SentMessage {
                    id: email_id,
                    sent_at,
                })
            }
            Err(reason) => {
                error!("❌ Submission failed: {}", reason);
                self.discard_draft(&email_id).await;
                Err(JmapError::Send(format!("submission failed: {}", reason)))
            }
        }
    }

    /// The identity to send from: the one matching `from`, else the first
    async fn resolve_identity(&self, from: Option<&str>) -> Result<Identity> {
        let identities = self.list_identities().await?;

        match from {
            Some(from) => identities
                .into_iter()
                .find(|i| i.email.eq_ignore_ascii_case(from))
                .ok_or_else(|| JmapError::IdentityNotFound(from.to_string())),
            None => identities
                .into_iter()
                .next()
                .ok_or_else(|| JmapError::IdentityNotFound("this account".to_string())),
        }
    }

    /// Best-effort cleanup of a draft whose submission failed
    async fn discard_draft(&self, email_id: &str) {
        match self.delete_message(email_id).await {
            Ok(()) => info!("🗑️ Discarded unsent draft {}", email_id),
            Err(e) => warn!("Failed to discard unsent draft {}: {}", email_id, e),
        }
    }
}

/// The `Email/set` create object for an outgoing draft
fn draft_object(options: &SendOptions, identity: &Identity, drafts: &Mailbox) -> Value {
    let mut email = Map::new();
    email.insert("mailboxIds".to_string(), json!({ drafts.id.as_str(): true }));
    email.insert(
        "keywords".to_string(),
        json!({ (keyword::DRAFT): true, (keyword::SEEN): true }),
    );
    email.insert("from".to_string(), json!([identity.address()]));
    email.insert("to".to_string(), json!(options.to));
    if !options.cc.is_empty() {
        email.insert("cc".to_string(), json!(options.cc));
    }
    if !options.bcc.is_empty() {
        email.insert("bcc".to_string(), json!(options.bcc));
    }
    email.insert("subject".to_string(), json!(options.subject));

    let mut body_values = Map::new();
    if let Some(text) = options.text() {
        body_values.insert("text".to_string(), json!({ "value": text }));
        email.insert(
            "textBody".to_string(),
            json!([{ "partId": "text", "type": "text/plain" }]),
        );
    }
    if let Some(html) = options.html() {
        body_values.insert("html".to_string(), json!({ "value": html }));
        email.insert(
            "htmlBody".to_string(),
            json!([{ "partId": "html", "type": "text/html" }]),
        );
    }
    email.insert("bodyValues".to_string(), Value::Object(body_values));

    Value::Object(email)
}
