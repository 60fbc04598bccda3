use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use std::future::Future;
use tracing::{debug, info};

use super::options::BatchResult;
use super::JmapClient;
use crate::error::{JmapError, Result};
use crate::model::keyword;
use crate::protocol::{Method, RequestBuilder, SetError, SetResponse};

impl JmapClient {
    /// Set or clear `$seen` on a message
    pub async fn update_read_state(&self, id: &str, read: bool) -> Result<()> {
        let value = if read { Value::Bool(true) } else { Value::Null };
        let mut patch = Map::new();
        patch.insert(format!("keywords/{}", keyword::SEEN), value);

        self.update_email(id, Value::Object(patch)).await?;
        debug!("Marked {} as {}", id, if read { "read" } else { "unread" });
        Ok(())
    }

    /// Replace the mailbox membership of a message with `mailbox_id`
    pub async fn move_message(&self, id: &str, mailbox_id: &str) -> Result<()> {
        if mailbox_id.is_empty() {
            return Err(JmapError::InvalidInput("Target mailbox id is empty".to_string()));
        }

        self.update_email(id, json!({ "mailboxIds": { mailbox_id: true } }))
            .await?;
        debug!("Moved {} to mailbox {}", id, mailbox_id);
        Ok(())
    }

    /// Permanently destroy a message
    pub async fn delete_message(&self, id: &str) -> Result<()> {
        let account_id = self.account_id()?;

        let mut builder = RequestBuilder::new();
        let set = builder.call(
            Method::EmailSet,
            json!({ "accountId": account_id, "destroy": [id] }),
        );

        let response = self.send(builder.build()).await?;
        let result: SetResponse = response.parse(&set)?;

        if result.was_destroyed(id) {
            debug!("Destroyed {}", id);
            return Ok(());
        }
        match result.not_destroyed(id) {
            Some(err) => Err(set_failure(id, err)),
            None => Err(JmapError::protocol(
                format!("Email/set did not report the outcome for {}", id),
                response.get(&set)?.clone(),
            )),
        }
    }

    pub async fn update_read_states(&self, ids: &[String], read: bool) -> Result<BatchResult> {
        self.run_batch(ids, |id| self.update_read_state(id, read))
            .await
    }

    pub async fn move_messages(&self, ids: &[String], mailbox_id: &str) -> Result<BatchResult> {
        self.run_batch(ids, |id| self.move_message(id, mailbox_id))
            .await
    }

    pub async fn delete_messages(&self, ids: &[String]) -> Result<BatchResult> {
        self.run_batch(ids, |id| self.delete_message(id)).await
    }

    /// Run `op` for every id with bounded concurrency.
    ///
    /// Only a missing session fails the whole batch; per-item errors are
    /// collected into the result.
    async fn run_batch<'a, F, Fut>(&'a self, ids: &'a [String], op: F) -> Result<BatchResult>
    where
        F: Fn(&'a str) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.active_session()?;

        let pending: Vec<_> = ids
            .iter()
            .map(|id| {
                let outcome = op(id.as_str());
                async move { (id.clone(), outcome.await) }
            })
            .collect();

        let outcomes: Vec<(String, Result<()>)> = stream::iter(pending)
            .buffered(self.config.max_concurrent_requests.max(1))
            .collect()
            .await;

        let result = BatchResult::from_outcomes(outcomes);
        info!(
            "📦 Batch finished: {} succeeded, {} failed",
            result.succeeded.len(),
            result.failed.len()
        );
        Ok(result)
    }

    /// Apply one `Email/set` update patch and check its outcome
    async fn update_email(&self, id: &str, patch: Value) -> Result<()> {
        let account_id = self.account_id()?;

        let mut builder = RequestBuilder::new();
        let set = builder.call(
            Method::EmailSet,
            json!({ "accountId": account_id, "update": { id: patch } }),
        );

        let response = self.send(builder.build()).await?;
        let result: SetResponse = response.parse(&set)?;

        if result.was_updated(id) {
            return Ok(());
        }
        match result.not_updated(id) {
            Some(err) => Err(set_failure(id, err)),
            None => Err(JmapError::protocol(
                format!("Email/set did not report the outcome for {}", id),
                response.get(&set)?.clone(),
            )),
        }
    }
}

fn set_failure(id: &str, err: &SetError) -> JmapError {
    if err.is_not_found() {
        JmapError::NotFound(format!("message {}", id))
    } else {
        JmapError::Method {
            method: Method::EmailSet.as_str().to_string(),
            error_type: err.error_type.clone(),
            description: err
                .description
                .clone()
                .unwrap_or_else(|| format!("update of {} rejected", id)),
        }
    }
}
