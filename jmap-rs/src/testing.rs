//! In-memory JMAP server for tests
//!
//! [`FakeMailServer`] implements [`Transport`] and answers the wire form of
//! each request: result references are resolved by JSON pointer, creation
//! ids are tracked across calls, filters and sorts are evaluated, and
//! `EmailSubmission/set` produces the implicit `Email/set` response a real
//! server sends. Failures can be injected per request, per method or per
//! submission.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::JmapClient;
use crate::config::JmapConfig;
use crate::error::{JmapError, Result};
use crate::model::{
    keyword, role, Email, EmailAddress, EmailBodyPart, EmailBodyValue, Identity, Mailbox,
    MailboxRights,
};
use crate::protocol::{
    MethodResponse, Request, Response, ResultReference, MAIL_CAPABILITY, SUBMISSION_CAPABILITY,
};
use crate::transport::Transport;

pub const SESSION_URL: &str = "https://jmap.test/jmap/session";
pub const API_URL: &str = "https://jmap.test/jmap/api/";
pub const ACCOUNT_ID: &str = "acc-1";
pub const ACCOUNT_EMAIL: &str = "me@example.com";
pub const IDENTITY_ID: &str = "identity-1";

const PREVIEW_CHARS: usize = 256;

/// A JMAP account held in memory
pub struct FakeMailServer {
    state: Mutex<ServerState>,
}

struct ServerState {
    mailboxes: Vec<Mailbox>,
    emails: Vec<Email>,
    identities: Vec<Identity>,
    next_id: u64,
    state: u64,
    requests: Vec<Value>,
    submissions: Vec<Value>,
    transport_failures: u32,
    failing_methods: HashSet<String>,
    reject_submissions: bool,
    session_unavailable: bool,
    has_mail_account: bool,
}

/// Method-level or per-object failure
#[derive(Debug)]
struct Failure {
    error_type: &'static str,
    description: String,
}

impl Failure {
    fn new(error_type: &'static str, description: impl Into<String>) -> Self {
        Self {
            error_type,
            description: description.into(),
        }
    }

    fn to_value(&self) -> Value {
        json!({ "type": self.error_type, "description": self.description })
    }
}

type Outcome<T> = std::result::Result<T, Failure>;

impl Default for FakeMailServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMailServer {
    /// Account with Inbox, Drafts, Sent, Archive and Trash and one identity
    pub fn new() -> Self {
        let mailboxes = [
            ("Inbox", role::INBOX),
            ("Drafts", role::DRAFTS),
            ("Sent", role::SENT),
            ("Archive", role::ARCHIVE),
            ("Trash", role::TRASH),
        ]
        .iter()
        .enumerate()
        .map(|(i, (name, role))| Mailbox {
            id: format!("mb-{}", role),
            name: name.to_string(),
            role: Some(role.to_string()),
            sort_order: i as u32,
            my_rights: Some(MailboxRights {
                may_read_items: true,
                may_add_items: true,
                may_remove_items: true,
                may_set_seen: true,
                may_set_keywords: true,
                may_submit: true,
                ..Default::default()
            }),
            is_subscribed: true,
            ..Default::default()
        })
        .collect();

        Self {
            state: Mutex::new(ServerState {
                mailboxes,
                emails: Vec::new(),
                identities: vec![Identity {
                    id: IDENTITY_ID.to_string(),
                    name: "Test User".to_string(),
                    email: ACCOUNT_EMAIL.to_string(),
                    reply_to: Vec::new(),
                    bcc: Vec::new(),
                    may_delete: false,
                }],
                next_id: 1,
                state: 1,
                requests: Vec::new(),
                submissions: Vec::new(),
                transport_failures: 0,
                failing_methods: HashSet::new(),
                reject_submissions: false,
                session_unavailable: false,
                has_mail_account: true,
            }),
        }
    }

    /// Client configuration pointing at this server
    pub fn config() -> JmapConfig {
        JmapConfig::new(SESSION_URL, "test-token").with_account_email(ACCOUNT_EMAIL)
    }

    /// A client bound to `server`, not yet initialized
    pub fn connect(server: &Arc<Self>) -> JmapClient {
        JmapClient::with_transport(Self::config(), server.clone())
    }

    /// A client bound to `server` with its session discovered
    pub async fn initialized_client(server: &Arc<Self>) -> JmapClient {
        let client = Self::connect(server);
        client
            .initialize()
            .await
            .expect("fake session should initialize");
        client
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a message and return its id
    pub fn insert(&self, fixture: EmailFixture) -> String {
        let mut state = self.lock();
        let email = state.materialize(fixture);
        let id = email.id.clone();
        state.emails.push(email);
        id
    }

    pub fn email(&self, id: &str) -> Option<Email> {
        self.lock().emails.iter().find(|e| e.id == id).cloned()
    }

    pub fn emails(&self) -> Vec<Email> {
        self.lock().emails.clone()
    }

    pub fn email_count(&self) -> usize {
        self.lock().emails.len()
    }

    pub fn mailbox_id(&self, role: &str) -> Option<String> {
        self.lock()
            .mailboxes
            .iter()
            .find(|m| m.has_role(role))
            .map(|m| m.id.clone())
    }

    /// Add a folder without a role
    pub fn add_mailbox(&self, name: &str) -> String {
        let mut state = self.lock();
        let id = state.next_id("mb");
        state.mailboxes.push(Mailbox {
            id: id.clone(),
            name: name.to_string(),
            ..Default::default()
        });
        id
    }

    /// Drop the mailbox carrying `role`
    pub fn remove_mailbox(&self, role: &str) {
        self.lock().mailboxes.retain(|m| !m.has_role(role));
    }

    /// Fail the next `count` API requests with a retryable transport error
    pub fn fail_next_requests(&self, count: u32) {
        self.lock().transport_failures = count;
    }

    /// Answer every call of `method` with a `serverFail` error
    pub fn fail_method(&self, method: &str) {
        self.lock().failing_methods.insert(method.to_string());
    }

    /// Refuse every submission with `forbiddenToSend`
    pub fn reject_submissions(&self) {
        self.lock().reject_submissions = true;
    }

    /// Reject session discovery with 401
    pub fn make_session_unavailable(&self) {
        self.lock().session_unavailable = true;
    }

    /// Serve a session without a primary mail account
    pub fn remove_mail_account(&self) {
        self.lock().has_mail_account = false;
    }

    /// Wire JSON of every API request received, in order
    pub fn requests(&self) -> Vec<Value> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Accepted submission objects, including their envelopes
    pub fn submissions(&self) -> Vec<Value> {
        self.lock().submissions.clone()
    }
}

#[async_trait]
impl Transport for FakeMailServer {
    async fn fetch_session(&self) -> Result<Value> {
        let state = self.lock();
        if state.session_unavailable {
            return Err(JmapError::Transport {
                message: "Authentication rejected (401 Unauthorized)".to_string(),
                retryable: false,
            });
        }

        let primary_accounts = if state.has_mail_account {
            json!({ MAIL_CAPABILITY: ACCOUNT_ID, SUBMISSION_CAPABILITY: ACCOUNT_ID })
        } else {
            json!({})
        };

        Ok(json!({
            "capabilities": {
                "urn:ietf:params:jmap:core": { "maxCallsInRequest": 16 },
                MAIL_CAPABILITY: {},
                SUBMISSION_CAPABILITY: {},
            },
            "accounts": {
                ACCOUNT_ID: { "name": ACCOUNT_EMAIL, "isPersonal": true, "isReadOnly": false },
            },
            "primaryAccounts": primary_accounts,
            "username": ACCOUNT_EMAIL,
            "apiUrl": API_URL,
            "downloadUrl": "https://jmap.test/jmap/download/{accountId}/{blobId}/{name}?type={type}",
            "uploadUrl": "https://jmap.test/jmap/upload/{accountId}/",
            "eventSourceUrl": "https://jmap.test/jmap/events/",
            "state": "session-1",
        }))
    }

    async fn execute(&self, api_url: &str, request: &Request) -> Result<Response> {
        let wire = serde_json::to_value(request)
            .map_err(|e| JmapError::InvalidInput(format!("Unserializable request: {}", e)))?;
        let mut state = self.lock();
        state.requests.push(wire.clone());

        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            return Err(JmapError::Transport {
                message: "Unexpected HTTP status 503 Service Unavailable".to_string(),
                retryable: true,
            });
        }
        if api_url != API_URL {
            return Err(JmapError::Transport {
                message: format!("Unexpected HTTP status 404 for {}", api_url),
                retryable: false,
            });
        }

        let using: Vec<String> = wire["using"]
            .as_array()
            .map(|u| u.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();
        let calls = wire["methodCalls"].as_array().cloned().unwrap_or_default();

        let mut responses: Vec<MethodResponse> = Vec::new();
        let mut created_ids: HashMap<String, String> = HashMap::new();

        for call in calls {
            let name = call[0].as_str().unwrap_or_default().to_string();
            let args = call[1].as_object().cloned().unwrap_or_default();
            let call_id = call[2].as_str().unwrap_or_default().to_string();

            match state.invoke(&name, args, &call_id, &using, &responses, &mut created_ids) {
                Ok(mut produced) => responses.append(&mut produced),
                Err(failure) => responses.push(MethodResponse(
                    "error".to_string(),
                    failure.to_value(),
                    call_id,
                )),
            }
        }

        Ok(Response {
            method_responses: responses,
            session_state: Some("session-1".to_string()),
        })
    }
}

impl ServerState {
    fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{}-{}", prefix, self.next_id);
        self.next_id += 1;
        id
    }

    fn state_string(&self) -> String {
        format!("state-{}", self.state)
    }

    fn invoke(
        &mut self,
        name: &str,
        args: Map<String, Value>,
        call_id: &str,
        using: &[String],
        previous: &[MethodResponse],
        created_ids: &mut HashMap<String, String>,
    ) -> Outcome<Vec<MethodResponse>> {
        if self.failing_methods.contains(name) {
            return Err(Failure::new("serverFail", format!("{} is unavailable", name)));
        }

        let needs = |capability: &str| {
            if using.iter().any(|u| u == capability) {
                Ok(())
            } else {
                Err(Failure::new(
                    "unknownMethod",
                    format!("{} requires capability {}", name, capability),
                ))
            }
        };
        needs(MAIL_CAPABILITY)?;

        let args = resolve_references(args, previous)?;
        if let Some(account_id) = args.get("accountId").and_then(Value::as_str) {
            if account_id != ACCOUNT_ID {
                return Err(Failure::new("accountNotFound", account_id));
            }
        }

        let single = |result: Value| vec![MethodResponse(name.to_string(), result, call_id.to_string())];

        match name {
            "Mailbox/get" => Ok(single(self.mailbox_get())),
            "Email/query" => Ok(single(self.email_query(&args)?)),
            "Email/get" => Ok(single(self.email_get(&args))),
            "Email/set" => Ok(single(self.email_set(&args, created_ids))),
            "Thread/get" => Ok(single(self.thread_get(&args))),
            "Identity/get" => {
                needs(SUBMISSION_CAPABILITY)?;
                Ok(single(self.identity_get()))
            }
            "EmailSubmission/set" => {
                needs(SUBMISSION_CAPABILITY)?;
                Ok(self.submission_set(&args, call_id, created_ids))
            }
            other => Err(Failure::new("unknownMethod", other)),
        }
    }

    fn mailbox_get(&self) -> Value {
        let list: Vec<Value> = self
            .mailboxes
            .iter()
            .map(|mailbox| {
                let members: Vec<&Email> = self
                    .emails
                    .iter()
                    .filter(|e| e.in_mailbox(&mailbox.id))
                    .collect();
                let threads: HashSet<&str> =
                    members.iter().filter_map(|e| e.thread_id.as_deref()).collect();
                let unread_threads: HashSet<&str> = members
                    .iter()
                    .filter(|e| !e.is_seen())
                    .filter_map(|e| e.thread_id.as_deref())
                    .collect();

                let mut mailbox = mailbox.clone();
                mailbox.total_emails = members.len() as u64;
                mailbox.unread_emails = members.iter().filter(|e| !e.is_seen()).count() as u64;
                mailbox.total_threads = threads.len() as u64;
                mailbox.unread_threads = unread_threads.len() as u64;
                json!(mailbox)
            })
            .collect();

        json!({
            "accountId": ACCOUNT_ID,
            "state": self.state_string(),
            "list": list,
            "notFound": [],
        })
    }

    fn identity_get(&self) -> Value {
        json!({
            "accountId": ACCOUNT_ID,
            "state": self.state_string(),
            "list": self.identities,
            "notFound": [],
        })
    }

    fn email_query(&self, args: &Map<String, Value>) -> Outcome<Value> {
        let filter = args.get("filter").cloned().unwrap_or(Value::Null);

        let mut matched: Vec<&Email> = Vec::new();
        for email in &self.emails {
            if self.matches(email, &filter)? {
                matched.push(email);
            }
        }

        if let Some(sort) = args.get("sort").and_then(Value::as_array) {
            // Stable sorts applied from the last comparator to the first
            for comparator in sort.iter().rev() {
                let property = comparator["property"].as_str().unwrap_or_default();
                if !SORTABLE.contains(&property) {
                    return Err(Failure::new("unsupportedSort", property));
                }
                let ascending = comparator
                    .get("isAscending")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);

                matched.sort_by(|a, b| {
                    let order = compare(a, b, property);
                    if ascending {
                        order
                    } else {
                        order.reverse()
                    }
                });
            }
        }

        let position = args.get("position").and_then(Value::as_u64).unwrap_or(0) as usize;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(usize::MAX, |l| l as usize);
        let ids: Vec<&str> = matched
            .iter()
            .skip(position)
            .take(limit)
            .map(|e| e.id.as_str())
            .collect();

        Ok(json!({
            "accountId": ACCOUNT_ID,
            "queryState": self.state_string(),
            "canCalculateChanges": false,
            "position": position,
            "ids": ids,
            "total": matched.len(),
        }))
    }

    fn matches(&self, email: &Email, filter: &Value) -> Outcome<bool> {
        let Some(object) = filter.as_object() else {
            return Ok(true);
        };

        if let Some(operator) = object.get("operator") {
            let conditions = object
                .get("conditions")
                .and_then(Value::as_array)
                .ok_or_else(|| Failure::new("unsupportedFilter", "operator without conditions"))?;

            let mut results = Vec::with_capacity(conditions.len());
            for condition in conditions {
                results.push(self.matches(email, condition)?);
            }

            return match operator.as_str() {
                Some("AND") => Ok(results.iter().all(|r| *r)),
                Some("OR") => Ok(results.iter().any(|r| *r)),
                Some("NOT") => Ok(!results.iter().any(|r| *r)),
                _ => Err(Failure::new("unsupportedFilter", "unknown operator")),
            };
        }

        for (key, value) in object {
            if !self.condition(email, key, value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn condition(&self, email: &Email, key: &str, value: &Value) -> Outcome<bool> {
        let unsupported = || Failure::new("unsupportedFilter", format!("bad value for {}", key));
        let text = || value.as_str().map(str::to_lowercase).ok_or_else(unsupported);
        let number = || value.as_u64().ok_or_else(unsupported);
        let date = || {
            value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc))
                .ok_or_else(unsupported)
        };
        let thread = || {
            self.emails
                .iter()
                .filter(|e| e.thread_id.is_some() && e.thread_id == email.thread_id)
        };

        let matched = match key {
            "inMailbox" => email.in_mailbox(&text_exact(value).ok_or_else(unsupported)?),
            "inMailboxOtherThan" => {
                let excluded: Vec<&str> = value
                    .as_array()
                    .ok_or_else(unsupported)?
                    .iter()
                    .filter_map(Value::as_str)
                    .collect();
                email
                    .mailbox_id_list()
                    .iter()
                    .any(|id| !excluded.contains(id))
            }
            "before" => {
                let before = date()?;
                email.received_at.is_some_and(|r| r < before)
            }
            "after" => {
                let after = date()?;
                email.received_at.is_some_and(|r| r >= after)
            }
            "minSize" => email.size >= number()?,
            "maxSize" => email.size < number()?,
            "hasKeyword" => email.has_keyword(&text_exact(value).ok_or_else(unsupported)?),
            "notKeyword" => !email.has_keyword(&text_exact(value).ok_or_else(unsupported)?),
            "hasAttachment" => email.has_attachment == value.as_bool().ok_or_else(unsupported)?,
            "allInThreadHaveKeyword" => {
                let kw = text_exact(value).ok_or_else(unsupported)?;
                thread().all(|e| e.has_keyword(&kw))
            }
            "someInThreadHaveKeyword" => {
                let kw = text_exact(value).ok_or_else(unsupported)?;
                thread().any(|e| e.has_keyword(&kw))
            }
            "noneInThreadHaveKeyword" => {
                let kw = text_exact(value).ok_or_else(unsupported)?;
                !thread().any(|e| e.has_keyword(&kw))
            }
            "text" => {
                let needle = text()?;
                [&email.from, &email.to, &email.cc, &email.bcc]
                    .iter()
                    .any(|list| addresses_contain(list, &needle))
                    || email.subject_or_empty().to_lowercase().contains(&needle)
                    || body_text(email).contains(&needle)
            }
            "from" => addresses_contain(&email.from, &text()?),
            "to" => addresses_contain(&email.to, &text()?),
            "cc" => addresses_contain(&email.cc, &text()?),
            "bcc" => addresses_contain(&email.bcc, &text()?),
            "subject" => email.subject_or_empty().to_lowercase().contains(&text()?),
            "body" => body_text(email).contains(&text()?),
            other => {
                return Err(Failure::new(
                    "unsupportedFilter",
                    format!("unsupported filter property {}", other),
                ))
            }
        };

        Ok(matched)
    }

    fn email_get(&self, args: &Map<String, Value>) -> Value {
        let ids: Option<Vec<String>> = args.get("ids").and_then(Value::as_array).map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        });
        let properties: Option<Vec<String>> =
            args.get("properties").and_then(Value::as_array).map(|p| {
                p.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            });
        let flag = |name: &str| args.get(name).and_then(Value::as_bool).unwrap_or(false);
        let fetch_all = flag("fetchAllBodyValues");
        let fetch_text = fetch_all || flag("fetchTextBodyValues");
        let fetch_html = fetch_all || flag("fetchHTMLBodyValues");
        let max_bytes = args
            .get("maxBodyValueBytes")
            .and_then(Value::as_u64)
            .filter(|m| *m > 0)
            .map(|m| m as usize);

        // Storage order, not request order, as real servers may do
        let list: Vec<Value> = self
            .emails
            .iter()
            .filter(|e| ids.as_ref().map_or(true, |ids| ids.contains(&e.id)))
            .map(|e| render_email(e, properties.as_deref(), fetch_text, fetch_html, max_bytes))
            .collect();
        let not_found: Vec<&String> = ids
            .iter()
            .flatten()
            .filter(|id| !self.emails.iter().any(|e| &e.id == *id))
            .collect();

        json!({
            "accountId": ACCOUNT_ID,
            "state": self.state_string(),
            "list": list,
            "notFound": not_found,
        })
    }

    fn thread_get(&self, args: &Map<String, Value>) -> Value {
        let mut list = Vec::new();
        let mut not_found = Vec::new();

        for id in args
            .get("ids")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            let mut members: Vec<&Email> = self
                .emails
                .iter()
                .filter(|e| e.thread_id.as_deref() == Some(id))
                .collect();
            if members.is_empty() {
                not_found.push(id.to_string());
                continue;
            }
            members.sort_by(|a, b| a.received_at.cmp(&b.received_at));
            let email_ids: Vec<&str> = members.iter().map(|e| e.id.as_str()).collect();
            list.push(json!({ "id": id, "emailIds": email_ids }));
        }

        json!({
            "accountId": ACCOUNT_ID,
            "state": self.state_string(),
            "list": list,
            "notFound": not_found,
        })
    }

    fn email_set(
        &mut self,
        args: &Map<String, Value>,
        created_ids: &mut HashMap<String, String>,
    ) -> Value {
        let old_state = self.state_string();
        let mut created = Map::new();
        let mut not_created = Map::new();
        let mut updated = Map::new();
        let mut not_updated = Map::new();
        let mut destroyed = Vec::new();
        let mut not_destroyed = Map::new();

        if let Some(create) = args.get("create").and_then(Value::as_object) {
            for (creation_id, object) in create {
                match self.create_email(object) {
                    Ok(email) => {
                        created_ids.insert(creation_id.clone(), email.id.clone());
                        created.insert(
                            creation_id.clone(),
                            json!({
                                "id": email.id,
                                "blobId": email.blob_id,
                                "threadId": email.thread_id,
                                "size": email.size,
                            }),
                        );
                        self.emails.push(email);
                    }
                    Err(failure) => {
                        not_created.insert(creation_id.clone(), failure.to_value());
                    }
                }
            }
        }

        if let Some(update) = args.get("update").and_then(Value::as_object) {
            for (id, patch) in update {
                let id = resolve_id(id, created_ids);
                match self.apply_patch(&id, patch) {
                    Ok(()) => {
                        updated.insert(id, Value::Null);
                    }
                    Err(failure) => {
                        not_updated.insert(id, failure.to_value());
                    }
                }
            }
        }

        if let Some(destroy) = args.get("destroy").and_then(Value::as_array) {
            for id in destroy.iter().filter_map(Value::as_str) {
                let id = resolve_id(id, created_ids);
                match self.emails.iter().position(|e| e.id == id) {
                    Some(index) => {
                        self.emails.remove(index);
                        destroyed.push(id);
                    }
                    None => {
                        not_destroyed.insert(id, Failure::new("notFound", "no such email").to_value());
                    }
                }
            }
        }

        if !created.is_empty() || !updated.is_empty() || !destroyed.is_empty() {
            self.state += 1;
        }

        let or_null = |map: Map<String, Value>| {
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        };

        json!({
            "accountId": ACCOUNT_ID,
            "oldState": old_state,
            "newState": self.state_string(),
            "created": or_null(created),
            "updated": or_null(updated),
            "destroyed": if destroyed.is_empty() { Value::Null } else { json!(destroyed) },
            "notCreated": or_null(not_created),
            "notUpdated": or_null(not_updated),
            "notDestroyed": or_null(not_destroyed),
        })
    }

    fn create_email(&mut self, object: &Value) -> Outcome<Email> {
        let mut object = object
            .as_object()
            .cloned()
            .ok_or_else(|| Failure::new("invalidProperties", "email must be an object"))?;
        let id = self.next_id("M");
        object.insert("id".to_string(), json!(id));

        let mut email: Email = serde_json::from_value(Value::Object(object))
            .map_err(|e| Failure::new("invalidProperties", e.to_string()))?;
        self.check_mailboxes(&email.mailbox_ids)?;

        let text = email
            .text_content()
            .or_else(|| email.html_content())
            .unwrap_or_default();
        email.blob_id = Some(format!("blob-{}", id));
        email.thread_id = Some(self.next_id("T"));
        email.received_at = Some(email.received_at.unwrap_or_else(Utc::now));
        email.size = (email.subject_or_empty().len() + text.len()) as u64;
        email.preview = Some(text.chars().take(PREVIEW_CHARS).collect());
        email.has_attachment = !email.attachments.is_empty();
        Ok(email)
    }

    fn apply_patch(&mut self, id: &str, patch: &Value) -> Outcome<()> {
        let patch = patch
            .as_object()
            .ok_or_else(|| Failure::new("invalidPatch", "patch must be an object"))?;
        let current = self
            .emails
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Failure::new("notFound", "no such email"))?;

        let mut email = current.clone();
        for (path, value) in patch {
            let invalid = || Failure::new("invalidPatch", format!("cannot apply {}", path));
            match path.split_once('/') {
                None if path == "mailboxIds" => {
                    email.mailbox_ids =
                        serde_json::from_value(value.clone()).map_err(|_| invalid())?;
                }
                None if path == "keywords" => {
                    email.keywords = serde_json::from_value(value.clone()).map_err(|_| invalid())?;
                }
                Some(("mailboxIds", mailbox_id)) => {
                    set_member(&mut email.mailbox_ids, mailbox_id, value).ok_or_else(invalid)?
                }
                Some(("keywords", kw)) => set_member(&mut email.keywords, kw, value).ok_or_else(invalid)?,
                _ => return Err(invalid()),
            }
        }
        self.check_mailboxes(&email.mailbox_ids)?;

        if let Some(slot) = self.emails.iter_mut().find(|e| e.id == id) {
            *slot = email;
        }
        Ok(())
    }

    fn check_mailboxes(&self, mailbox_ids: &BTreeMap<String, bool>) -> Outcome<()> {
        if !mailbox_ids.values().any(|member| *member) {
            return Err(Failure::new(
                "invalidProperties",
                "an email must belong to at least one mailbox",
            ));
        }
        if let Some(unknown) = mailbox_ids
            .keys()
            .find(|id| !self.mailboxes.iter().any(|m| &m.id == *id))
        {
            return Err(Failure::new(
                "invalidProperties",
                format!("unknown mailbox {}", unknown),
            ));
        }
        Ok(())
    }

    fn submission_set(
        &mut self,
        args: &Map<String, Value>,
        call_id: &str,
        created_ids: &mut HashMap<String, String>,
    ) -> Vec<MethodResponse> {
        let old_state = self.state_string();
        let mut created = Map::new();
        let mut not_created = Map::new();
        // "#creationId" of each accepted submission -> its email id
        let mut submitted: HashMap<String, String> = HashMap::new();

        if let Some(create) = args.get("create").and_then(Value::as_object) {
            for (creation_id, object) in create {
                match self.accept_submission(object, created_ids) {
                    Ok(email_id) => {
                        let submission_id = self.next_id("S");
                        created.insert(
                            creation_id.clone(),
                            json!({ "id": submission_id, "sendAt": Utc::now(), "undoStatus": "final" }),
                        );
                        self.submissions.push(object.clone());
                        submitted.insert(format!("#{}", creation_id), email_id);
                    }
                    Err(failure) => {
                        not_created.insert(creation_id.clone(), failure.to_value());
                    }
                }
            }
        }

        let mut responses = vec![MethodResponse(
            "EmailSubmission/set".to_string(),
            json!({
                "accountId": ACCOUNT_ID,
                "oldState": old_state,
                "newState": self.state_string(),
                "created": if created.is_empty() { Value::Null } else { Value::Object(created) },
                "notCreated": if not_created.is_empty() { Value::Null } else { Value::Object(not_created) },
            }),
            call_id.to_string(),
        )];

        let mut implicit = Map::new();
        if let Some(updates) = args.get("onSuccessUpdateEmail").and_then(Value::as_object) {
            let update: Map<String, Value> = updates
                .iter()
                .filter_map(|(reference, patch)| {
                    submitted
                        .get(reference)
                        .map(|email_id| (email_id.clone(), patch.clone()))
                })
                .collect();
            if !update.is_empty() {
                implicit.insert("update".to_string(), Value::Object(update));
            }
        }
        if let Some(destroys) = args.get("onSuccessDestroyEmail").and_then(Value::as_array) {
            let destroy: Vec<Value> = destroys
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|reference| submitted.get(reference))
                .map(|email_id| json!(email_id))
                .collect();
            if !destroy.is_empty() {
                implicit.insert("destroy".to_string(), Value::Array(destroy));
            }
        }

        if !implicit.is_empty() {
            let result = self.email_set(&implicit, created_ids);
            responses.push(MethodResponse(
                "Email/set".to_string(),
                result,
                call_id.to_string(),
            ));
        }

        responses
    }

    fn accept_submission(
        &self,
        object: &Value,
        created_ids: &HashMap<String, String>,
    ) -> Outcome<String> {
        if self.reject_submissions {
            return Err(Failure::new(
                "forbiddenToSend",
                "sending is disabled for this account",
            ));
        }

        let identity_id = object["identityId"].as_str().unwrap_or_default();
        if !self.identities.iter().any(|i| i.id == identity_id) {
            return Err(Failure::new("invalidProperties", "unknown identity"));
        }

        let email_id = resolve_id(object["emailId"].as_str().unwrap_or_default(), created_ids);
        if !self.emails.iter().any(|e| e.id == email_id) {
            return Err(Failure::new("invalidProperties", "unknown email"));
        }

        let has_recipients = object["envelope"]["rcptTo"]
            .as_array()
            .is_some_and(|r| !r.is_empty());
        if !has_recipients {
            return Err(Failure::new("noRecipients", "envelope has no recipients"));
        }

        Ok(email_id)
    }

    fn materialize(&mut self, fixture: EmailFixture) -> Email {
        let id = self.next_id("M");
        let thread_id = fixture.thread_id.unwrap_or_else(|| self.next_id("T"));

        let mut mailbox_ids: BTreeMap<String, bool> =
            fixture.mailbox_ids.into_iter().map(|m| (m, true)).collect();
        let roles = if mailbox_ids.is_empty() && fixture.mailbox_roles.is_empty() {
            vec![role::INBOX.to_string()]
        } else {
            fixture.mailbox_roles
        };
        for wanted in roles {
            if let Some(mailbox) = self.mailboxes.iter().find(|m| m.has_role(&wanted)) {
                mailbox_ids.insert(mailbox.id.clone(), true);
            }
        }

        let mut body_values = BTreeMap::new();
        let mut text_body = Vec::new();
        if let Some(text) = &fixture.text {
            body_values.insert(
                "1".to_string(),
                EmailBodyValue {
                    value: text.clone(),
                    ..Default::default()
                },
            );
            text_body.push(EmailBodyPart {
                part_id: Some("1".to_string()),
                mime_type: Some("text/plain".to_string()),
                size: text.len() as u64,
                ..Default::default()
            });
        }

        let attachments = if fixture.has_attachment {
            vec![EmailBodyPart {
                part_id: Some("2".to_string()),
                blob_id: Some(format!("blob-{}-2", id)),
                size: 2048,
                name: Some("report.pdf".to_string()),
                mime_type: Some("application/pdf".to_string()),
                disposition: Some("attachment".to_string()),
                ..Default::default()
            }]
        } else {
            Vec::new()
        };

        let preview = fixture.preview.or_else(|| {
            fixture
                .text
                .as_ref()
                .map(|t| t.chars().take(PREVIEW_CHARS).collect())
        });

        Email {
            blob_id: Some(format!("blob-{}", id)),
            thread_id: Some(thread_id),
            mailbox_ids,
            keywords: fixture.keywords.into_iter().map(|k| (k, true)).collect(),
            size: fixture.size,
            received_at: Some(fixture.received_at),
            sent_at: Some(fixture.received_at),
            from: vec![fixture.from],
            to: fixture.to,
            cc: fixture.cc,
            subject: Some(fixture.subject),
            preview,
            has_attachment: fixture.has_attachment,
            text_body,
            attachments,
            body_values,
            id,
            ..Default::default()
        }
    }
}

/// Builder for messages seeded into a [`FakeMailServer`]
#[derive(Debug, Clone)]
pub struct EmailFixture {
    from: EmailAddress,
    to: Vec<EmailAddress>,
    cc: Vec<EmailAddress>,
    subject: String,
    received_at: DateTime<Utc>,
    mailbox_ids: Vec<String>,
    mailbox_roles: Vec<String>,
    keywords: Vec<String>,
    preview: Option<String>,
    text: Option<String>,
    has_attachment: bool,
    size: u64,
    thread_id: Option<String>,
}

impl EmailFixture {
    /// An unread message in the Inbox, addressed to the account owner
    pub fn new(from: &str, subject: &str) -> Self {
        Self {
            from: EmailAddress::new(from),
            to: vec![EmailAddress::new(ACCOUNT_EMAIL)],
            cc: Vec::new(),
            subject: subject.to_string(),
            received_at: Utc::now(),
            mailbox_ids: Vec::new(),
            mailbox_roles: Vec::new(),
            keywords: Vec::new(),
            preview: None,
            text: None,
            has_attachment: false,
            size: 1024,
            thread_id: None,
        }
    }

    /// A read message from the account owner in the Sent mailbox
    pub fn outgoing(to: &str, subject: &str) -> Self {
        let mut fixture = Self::new(ACCOUNT_EMAIL, subject).in_role(role::SENT).seen();
        fixture.to = vec![EmailAddress::new(to)];
        fixture
    }

    pub fn named(mut self, name: &str) -> Self {
        self.from = self.from.with_name(name);
        self
    }

    pub fn cc(mut self, email: &str) -> Self {
        self.cc.push(EmailAddress::new(email));
        self
    }

    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }

    /// Place in the mailbox carrying `role`
    pub fn in_role(mut self, role: &str) -> Self {
        self.mailbox_roles.push(role.to_string());
        self
    }

    pub fn in_mailbox(mut self, mailbox_id: &str) -> Self {
        self.mailbox_ids.push(mailbox_id.to_string());
        self
    }

    pub fn seen(self) -> Self {
        self.keyword(keyword::SEEN)
    }

    pub fn flagged(self) -> Self {
        self.keyword(keyword::FLAGGED)
    }

    pub fn keyword(mut self, kw: &str) -> Self {
        self.keywords.push(kw.to_string());
        self
    }

    pub fn preview(mut self, preview: &str) -> Self {
        self.preview = Some(preview.to_string());
        self
    }

    pub fn body(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_attachment(mut self) -> Self {
        self.has_attachment = true;
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn in_thread(mut self, thread_id: &str) -> Self {
        self.thread_id = Some(thread_id.to_string());
        self
    }
}

const SORTABLE: &[&str] = &["receivedAt", "sentAt", "size", "from", "to", "subject"];

fn compare(a: &Email, b: &Email, property: &str) -> Ordering {
    let first = |list: &[EmailAddress]| list.first().map(|a| a.email.to_lowercase());
    match property {
        "receivedAt" => a.received_at.cmp(&b.received_at),
        "sentAt" => a.sent_at.cmp(&b.sent_at),
        "size" => a.size.cmp(&b.size),
        "from" => first(&a.from).cmp(&first(&b.from)),
        "to" => first(&a.to).cmp(&first(&b.to)),
        "subject" => a
            .subject_or_empty()
            .to_lowercase()
            .cmp(&b.subject_or_empty().to_lowercase()),
        _ => Ordering::Equal,
    }
}

fn text_exact(value: &Value) -> Option<String> {
    value.as_str().map(String::from)
}

fn addresses_contain(addresses: &[EmailAddress], needle: &str) -> bool {
    addresses.iter().any(|a| {
        a.email.to_lowercase().contains(needle)
            || a.name.as_deref().is_some_and(|n| n.to_lowercase().contains(needle))
    })
}

/// Lower-cased concatenation of every body value
fn body_text(email: &Email) -> String {
    email
        .body_values
        .values()
        .map(|v| v.value.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n")
}

fn resolve_id(id: &str, created_ids: &HashMap<String, String>) -> String {
    id.strip_prefix('#')
        .and_then(|creation_id| created_ids.get(creation_id))
        .cloned()
        .unwrap_or_else(|| id.to_string())
}

/// `true` adds the member, `null` or `false` removes it
fn set_member(map: &mut BTreeMap<String, bool>, key: &str, value: &Value) -> Option<()> {
    match value {
        Value::Bool(true) => {
            map.insert(key.to_string(), true);
        }
        Value::Null | Value::Bool(false) => {
            map.remove(key);
        }
        _ => return None,
    }
    Some(())
}

fn render_email(
    email: &Email,
    properties: Option<&[String]>,
    fetch_text: bool,
    fetch_html: bool,
    max_bytes: Option<usize>,
) -> Value {
    let mut wanted: HashSet<&str> = HashSet::new();
    if fetch_text {
        wanted.extend(email.text_body.iter().filter_map(|p| p.part_id.as_deref()));
    }
    if fetch_html {
        wanted.extend(email.html_body.iter().filter_map(|p| p.part_id.as_deref()));
    }

    let mut rendered = email.clone();
    rendered.body_values = email
        .body_values
        .iter()
        .filter(|(part_id, _)| wanted.contains(part_id.as_str()))
        .map(|(part_id, body)| {
            let mut body = body.clone();
            if let Some(max) = max_bytes {
                if body.value.len() > max {
                    let mut end = max;
                    while !body.value.is_char_boundary(end) {
                        end -= 1;
                    }
                    body.value.truncate(end);
                    body.is_truncated = true;
                }
            }
            (part_id.clone(), body)
        })
        .collect();

    let mut value = json!(rendered);
    if let (Some(properties), Value::Object(map)) = (properties, &mut value) {
        map.retain(|key, _| key == "id" || properties.iter().any(|p| p == key));
    }
    value
}

/// Resolve every `#name` argument against earlier responses
fn resolve_references(
    args: Map<String, Value>,
    previous: &[MethodResponse],
) -> Outcome<Map<String, Value>> {
    let mut resolved = Map::new();

    for (key, value) in args {
        let Some(name) = key.strip_prefix('#') else {
            resolved.insert(key, value);
            continue;
        };

        let reference: ResultReference = serde_json::from_value(value)
            .map_err(|e| Failure::new("invalidResultReference", e.to_string()))?;
        let source = previous
            .iter()
            .find(|r| r.call_id() == reference.result_of && r.name() == reference.name)
            .ok_or_else(|| {
                Failure::new(
                    "invalidResultReference",
                    format!("no {} result for {}", reference.name, reference.result_of),
                )
            })?;
        let value = evaluate_pointer(source.arguments(), &reference.path).ok_or_else(|| {
            Failure::new(
                "invalidResultReference",
                format!("path {} does not resolve", reference.path),
            )
        })?;

        resolved.insert(name.to_string(), value);
    }

    Ok(resolved)
}

/// JSON pointer where `*` maps over an array and flattens nested arrays
fn evaluate_pointer(value: &Value, path: &str) -> Option<Value> {
    let tokens: Vec<&str> = path.split('/').filter(|t| !t.is_empty()).collect();
    walk(value, &tokens)
}

fn walk(value: &Value, tokens: &[&str]) -> Option<Value> {
    let Some((head, rest)) = tokens.split_first() else {
        return Some(value.clone());
    };

    if *head == "*" {
        let mut out = Vec::new();
        for item in value.as_array()? {
            match walk(item, rest)? {
                Value::Array(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        return Some(Value::Array(out));
    }

    match value {
        Value::Object(map) => walk(map.get(*head)?, rest),
        Value::Array(items) => walk(items.get(head.parse::<usize>().ok()?)?, rest),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_wildcard_flattens() {
        let value = json!({"list": [{"emailIds": ["a", "b"]}, {"emailIds": ["c"]}]});
        assert_eq!(
            evaluate_pointer(&value, "/list/*/emailIds"),
            Some(json!(["a", "b", "c"]))
        );
        assert_eq!(evaluate_pointer(&value, "/list/0/emailIds/1"), Some(json!("b")));
        assert_eq!(evaluate_pointer(&value, "/missing"), None);
    }

    #[test]
    fn test_set_member_patch_values() {
        let mut map = BTreeMap::new();
        assert!(set_member(&mut map, "$seen", &json!(true)).is_some());
        assert!(map.contains_key("$seen"));
        assert!(set_member(&mut map, "$seen", &Value::Null).is_some());
        assert!(map.is_empty());
        assert!(set_member(&mut map, "$seen", &json!("yes")).is_none());
    }
}
