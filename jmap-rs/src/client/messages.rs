use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

use super::options::{ListOptions, MessagePage, SearchPage};
use super::JmapClient;
use crate::error::{JmapError, Result};
use crate::model::{AdvancedFilter, Email, MessageFilter, SortSpec, Thread};
use crate::protocol::{GetResponse, Method, QueryResponse, RequestBuilder};

/// Body bytes fetched per message in listings
pub(crate) const LIST_BODY_BYTES: u64 = 256;

/// Body bytes fetched when a single message is opened
pub(crate) const DETAIL_BODY_BYTES: u64 = 100_000;

const LIST_PROPERTIES: &[&str] = &[
    "id",
    "blobId",
    "threadId",
    "mailboxIds",
    "keywords",
    "size",
    "receivedAt",
    "sentAt",
    "from",
    "to",
    "cc",
    "subject",
    "preview",
    "hasAttachment",
    "textBody",
    "bodyValues",
];

const DETAIL_PROPERTIES: &[&str] = &[
    "id",
    "blobId",
    "threadId",
    "mailboxIds",
    "keywords",
    "size",
    "receivedAt",
    "sentAt",
    "from",
    "to",
    "cc",
    "bcc",
    "replyTo",
    "subject",
    "preview",
    "hasAttachment",
    "textBody",
    "htmlBody",
    "attachments",
    "bodyValues",
];

/// A query window and the messages in it
struct QueryPage {
    messages: Vec<Email>,
    total: u64,
    position: u64,
}

impl JmapClient {
    /// List messages, newest first
    pub async fn list_messages(&self, options: &ListOptions) -> Result<MessagePage> {
        let filter = options.filter.to_condition(options.mailbox_id.as_deref());
        let page = self
            .query_messages(filter, &[SortSpec::default()], options.position, options.limit)
            .await?;

        Ok(MessagePage {
            messages: page.messages,
            total: page.total,
        })
    }

    /// Free-text search across headers and body, newest first
    pub async fn search_by_text(&self, query: &str, limit: u64) -> Result<MessagePage> {
        if query.trim().is_empty() {
            return Err(JmapError::InvalidInput("Search query is empty".to_string()));
        }

        let options = ListOptions::default()
            .with_limit(limit)
            .with_filter(MessageFilter::text(query));
        self.list_messages(&options).await
    }

    /// Search with the full filter vocabulary and caller-chosen sort
    pub async fn advanced_search(
        &self,
        filter: &AdvancedFilter,
        sort: &[SortSpec],
        position: u64,
        limit: u64,
    ) -> Result<SearchPage> {
        let condition = filter.to_filter()?;
        let default_sort = [SortSpec::default()];
        let sort = if sort.is_empty() { &default_sort[..] } else { sort };

        let page = self.query_messages(condition, sort, position, limit).await?;
        let has_more_results = limit > 0 && page.messages.len() as u64 == limit;

        Ok(SearchPage {
            messages: page.messages,
            total: page.total,
            position: page.position,
            has_more_results,
        })
    }

    /// Full detail of one message; `None` when it does not exist
    pub async fn get_message(&self, id: &str) -> Result<Option<Email>> {
        let account_id = self.account_id()?;

        let mut builder = RequestBuilder::new();
        let get = builder.call(
            Method::EmailGet,
            json!({
                "accountId": account_id,
                "ids": [id],
                "properties": DETAIL_PROPERTIES,
                "fetchTextBodyValues": true,
                "fetchHTMLBodyValues": true,
                "maxBodyValueBytes": DETAIL_BODY_BYTES,
            }),
        );

        let response = self.send(builder.build()).await?;
        let emails: GetResponse<Email> = response.parse(&get)?;

        Ok(emails.list.into_iter().find(|e| e.id == id))
    }

    /// Every message of a conversation, in thread order
    pub async fn get_thread(&self, thread_id: &str) -> Result<Vec<Email>> {
        let account_id = self.account_id()?;

        let mut builder = RequestBuilder::new();
        let thread = builder.call(
            Method::ThreadGet,
            json!({ "accountId": account_id, "ids": [thread_id] }),
        );
        let get = builder.call_with_reference(
            Method::EmailGet,
            json!({
                "accountId": account_id,
                "properties": LIST_PROPERTIES,
                "fetchTextBodyValues": true,
                "maxBodyValueBytes": LIST_BODY_BYTES,
            }),
            "ids",
            thread.result("/list/*/emailIds"),
        );

        let response = self.send(builder.build()).await?;
        let threads: GetResponse<Thread> = response.parse(&thread)?;
        let Some(thread) = threads.list.into_iter().next() else {
            return Err(JmapError::NotFound(format!("thread {}", thread_id)));
        };

        let emails: GetResponse<Email> = response.parse(&get)?;
        Ok(in_id_order(&thread.email_ids, emails.list))
    }

    /// `Email/query` chained to `Email/get` in one round trip
    async fn query_messages(
        &self,
        filter: Value,
        sort: &[SortSpec],
        position: u64,
        limit: u64,
    ) -> Result<QueryPage> {
        let account_id = self.account_id()?;
        let comparators: Vec<Value> = sort.iter().map(SortSpec::to_comparator).collect();

        let mut builder = RequestBuilder::new();
        let query = builder.call(
            Method::EmailQuery,
            json!({
                "accountId": account_id,
                "filter": filter,
                "sort": comparators,
                "position": position,
                "limit": limit,
                "calculateTotal": true,
            }),
        );
        let get = builder.call_with_reference(
            Method::EmailGet,
            json!({
                "accountId": account_id,
                "properties": LIST_PROPERTIES,
                "fetchTextBodyValues": true,
                "maxBodyValueBytes": LIST_BODY_BYTES,
            }),
            "ids",
            query.result("/ids"),
        );

        let response = self.send(builder.build()).await?;
        let query: QueryResponse = response.parse(&query)?;
        let emails: GetResponse<Email> = response.parse(&get)?;

        debug!(
            "Query matched {:?} message(s), fetched {}",
            query.total,
            emails.list.len()
        );

        let messages = in_id_order(&query.ids, emails.list);
        Ok(QueryPage {
            total: query.total.unwrap_or(position + messages.len() as u64),
            position: query.position,
            messages,
        })
    }
}

/// `Foo/get` may answer in any order; restore the order of `ids`
fn in_id_order(ids: &[String], emails: Vec<Email>) -> Vec<Email> {
    let mut by_id: HashMap<String, Email> = emails.into_iter().map(|e| (e.id.clone(), e)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
