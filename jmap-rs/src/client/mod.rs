//! JMAP mail client
//!
//! [`JmapClient`] discovers the session once, then issues batched requests
//! against the account's primary mail account. Reads are retried on
//! retryable transport failures; mutations never are.

mod messages;
mod mutations;
mod options;
mod send;

pub use options::{
    BatchFailure, BatchResult, ListOptions, MessagePage, SearchPage, SendOptions, SentMessage,
    DEFAULT_LIST_LIMIT,
};

use serde_json::json;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::JmapConfig;
use crate::error::{JmapError, Result};
use crate::model::{Identity, Mailbox, MailboxStats};
use crate::protocol::{GetResponse, Method, Request, RequestBuilder, Response, SUBMISSION_CAPABILITY};
use crate::session::{ActiveSession, Session};
use crate::transport::{HttpTransport, Transport};

/// Base delay between read retries, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

const MAILBOX_PROPERTIES: &[&str] = &[
    "id",
    "name",
    "parentId",
    "role",
    "sortOrder",
    "totalEmails",
    "unreadEmails",
    "totalThreads",
    "unreadThreads",
    "myRights",
    "isSubscribed",
];

/// Client for one JMAP account
pub struct JmapClient {
    config: JmapConfig,
    transport: Arc<dyn Transport>,
    /// Written once by `initialize()`, read-only afterwards
    session: OnceLock<ActiveSession>,
}

impl JmapClient {
    /// Create a client that talks HTTP to the configured server
    pub fn new(config: JmapConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over any transport
    pub fn with_transport(config: JmapConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            session: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &JmapConfig {
        &self.config
    }

    /// Discover the session and bind the primary mail account.
    ///
    /// Calling this again after success is a no-op.
    pub async fn initialize(&self) -> Result<()> {
        if self.session.get().is_some() {
            return Ok(());
        }

        info!("🔌 Discovering JMAP session at {}", self.config.session_url);

        let document = self.fetch_session_document().await.map_err(|e| match e {
            JmapError::Transport { message, .. } => JmapError::Initialization(message),
            other => other,
        })?;
        let session = Session::from_value(document)?;
        let active = ActiveSession::resolve(session)?;

        info!(
            "✅ JMAP session ready: account {} ({})",
            active.account_id, active.session.username
        );

        // A concurrent initialize may have won the race; its session is equivalent.
        let _ = self.session.set(active);
        Ok(())
    }

    /// Session discovery is a read; retried like one
    async fn fetch_session_document(&self) -> Result<serde_json::Value> {
        let retries = self.config.read_retries;
        let mut attempt = 0;
        loop {
            match self.transport.fetch_session().await {
                Err(e) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    warn!("Session discovery failed ({}), retry {}/{}", e, attempt, retries);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.session.get().is_some()
    }

    /// The bound session, or `Uninitialized`
    pub fn active_session(&self) -> Result<&ActiveSession> {
        self.session.get().ok_or(JmapError::Uninitialized)
    }

    pub fn account_id(&self) -> Result<&str> {
        Ok(self.active_session()?.account_id.as_str())
    }

    /// The account owner's address: configured value, else the session username
    pub fn account_email(&self) -> Result<String> {
        let session = self.active_session()?;
        Ok(self
            .config
            .account_email
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| session.session.username.clone()))
    }

    /// Send one batched request; read-only requests are retried
    pub(crate) async fn send(&self, request: Request) -> Result<Response> {
        let session = self.active_session()?;
        let retries = if request.is_read_only() {
            self.config.read_retries
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            match self
                .transport
                .execute(&session.session.api_url, &request)
                .await
            {
                Err(e) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    warn!("JMAP request failed ({}), retry {}/{}", e, attempt, retries);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// All mailboxes of the account
    pub async fn list_mailboxes(&self) -> Result<Vec<Mailbox>> {
        let account_id = self.account_id()?;

        let mut builder = RequestBuilder::new();
        let get = builder.call(
            Method::MailboxGet,
            json!({
                "accountId": account_id,
                "ids": null,
                "properties": MAILBOX_PROPERTIES,
            }),
        );

        let response = self.send(builder.build()).await?;
        let mailboxes: GetResponse<Mailbox> = response.parse(&get)?;

        debug!("Fetched {} mailboxes", mailboxes.list.len());
        Ok(mailboxes.list)
    }

    /// The mailbox carrying a role such as `inbox` or `sent`
    pub async fn find_mailbox_by_role(&self, role: &str) -> Result<Mailbox> {
        self.list_mailboxes()
            .await?
            .into_iter()
            .find(|m| m.has_role(role))
            .ok_or_else(|| JmapError::MailboxNotFound(role.to_string()))
    }

    /// Counts for one mailbox, or for every mailbox when `mailbox_id` is `None`
    pub async fn get_mailbox_stats(&self, mailbox_id: Option<&str>) -> Result<Vec<MailboxStats>> {
        let mailboxes = self.list_mailboxes().await?;

        match mailbox_id {
            Some(id) => mailboxes
                .iter()
                .find(|m| m.id == id)
                .map(|m| vec![MailboxStats::from(m)])
                .ok_or_else(|| JmapError::NotFound(format!("mailbox {}", id))),
            None => Ok(mailboxes.iter().map(MailboxStats::from).collect()),
        }
    }

    /// Sending identities configured on the account
    pub async fn list_identities(&self) -> Result<Vec<Identity>> {
        let account_id = self.account_id()?;

        let mut builder = RequestBuilder::new().with_capability(SUBMISSION_CAPABILITY);
        let get = builder.call(
            Method::IdentityGet,
            json!({ "accountId": account_id, "ids": null }),
        );

        let response = self.send(builder.build()).await?;
        let identities: GetResponse<Identity> = response.parse(&get)?;
        Ok(identities.list)
    }

    /// Download URL for an attachment blob
    pub fn attachment_download_url(
        &self,
        blob_id: &str,
        name: &str,
        mime_type: &str,
    ) -> Result<String> {
        let session = self.active_session()?;
        if session.session.download_url.is_empty() {
            return Err(JmapError::protocol(
                "Session has no download URL",
                json!({ "blobId": blob_id }),
            ));
        }

        Ok(session
            .session
            .download_url_for(&session.account_id, blob_id, name, mime_type))
    }
}

impl std::fmt::Debug for JmapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JmapClient")
            .field("session_url", &self.config.session_url)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
