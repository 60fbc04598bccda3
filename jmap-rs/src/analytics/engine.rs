use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info, warn};

use super::aggregate::{self, BucketZone};
use super::types::{
    ActivityPatterns, AnalyticsRequest, AnalyticsResult, ContentInsights, Period, SenderStat,
    VolumeStats, DEFAULT_MAX_MESSAGES,
};
use crate::client::{JmapClient, ListOptions};
use crate::error::{JmapError, Result};
use crate::model::{Email, MessageFilter};

/// Messages fetched per round trip
const PAGE_SIZE: usize = 100;

/// Computes mailbox analytics over a time window.
///
/// Stateless: every call fetches fresh messages through the client.
pub struct AnalyticsEngine<'a> {
    client: &'a JmapClient,
    zone: BucketZone,
}

impl<'a> AnalyticsEngine<'a> {
    /// Bucket times in the host's local time zone
    pub fn new(client: &'a JmapClient) -> Self {
        Self {
            client,
            zone: BucketZone::Local,
        }
    }

    /// Bucket times at a fixed offset instead
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.zone = BucketZone::Fixed(offset);
        self
    }

    pub fn bucket_zone(&self) -> BucketZone {
        self.zone
    }

    /// Fetch the window once and derive every facet
    pub async fn compute(&self, request: &AnalyticsRequest) -> Result<AnalyticsResult> {
        let account_email = self.client.account_email()?;
        let messages = self
            .fetch_window(request.start, request.end, request.max_messages)
            .await?;

        info!(
            "📊 Analysing {} message(s) between {} and {}",
            messages.len(),
            request.start,
            request.end
        );

        let (_, received) = aggregate::partition(&messages, &account_email);
        let folder_usage = if messages.is_empty() {
            Vec::new()
        } else {
            match self.client.list_mailboxes().await {
                Ok(mailboxes) => aggregate::folder_usage(&messages, &mailboxes),
                Err(e) => {
                    warn!("Folder usage unavailable, mailbox listing failed: {}", e);
                    Vec::new()
                }
            }
        };
        let content_insights = if request.include_content {
            aggregate::content_insights(&messages)
        } else {
            ContentInsights::default()
        };

        Ok(AnalyticsResult {
            period: Period {
                start: request.start,
                end: request.end,
            },
            volume: aggregate::volume(&messages, &account_email),
            top_senders: aggregate::top_senders(&received, request.top_senders_limit),
            activity_patterns: aggregate::activity_patterns(&messages, self.zone),
            folder_usage,
            content_insights,
            response_metrics: aggregate::response_metrics(&received),
        })
    }

    /// Full analytics over the last `days` days
    pub async fn compute_for_days(
        &self,
        days: u32,
        max_messages: usize,
        include_content: bool,
    ) -> Result<AnalyticsResult> {
        let request = AnalyticsRequest::last_days(check_days(days)?)
            .with_max_messages(max_messages)
            .with_content(include_content);
        self.compute(&request).await
    }

    /// Sent and received counts over the last `days` days
    pub async fn volume(&self, days: u32) -> Result<VolumeStats> {
        let account_email = self.client.account_email()?;
        let messages = self.fetch_days(days).await?;
        Ok(aggregate::volume(&messages, &account_email))
    }

    /// Ranked senders of received mail over the last `days` days
    pub async fn top_senders(&self, days: u32, limit: usize) -> Result<Vec<SenderStat>> {
        let account_email = self.client.account_email()?;
        let messages = self.fetch_days(days).await?;
        let (_, received) = aggregate::partition(&messages, &account_email);
        Ok(aggregate::top_senders(&received, limit))
    }

    /// Hour, day and month histograms over the last `days` days
    pub async fn activity_patterns(&self, days: u32) -> Result<ActivityPatterns> {
        let messages = self.fetch_days(days).await?;
        Ok(aggregate::activity_patterns(&messages, self.zone))
    }

    async fn fetch_days(&self, days: u32) -> Result<Vec<Email>> {
        let request = AnalyticsRequest::last_days(check_days(days)?);
        self.fetch_window(request.start, request.end, DEFAULT_MAX_MESSAGES)
            .await
    }

    /// Page through `[start, end)` until `max` messages or the server total
    async fn fetch_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<Email>> {
        if start > end {
            return Err(JmapError::InvalidInput(
                "Analytics window starts after it ends".to_string(),
            ));
        }

        let filter = MessageFilter::received_between(start, end);
        let mut messages: Vec<Email> = Vec::new();
        let mut position = 0u64;

        while messages.len() < max {
            let limit = (max - messages.len()).min(PAGE_SIZE);
            let options = ListOptions::default()
                .with_filter(filter.clone())
                .with_position(position)
                .with_limit(limit as u64);

            let page = self.client.list_messages(&options).await?;
            let fetched = page.messages.len();
            position += fetched as u64;
            messages.extend(page.messages);

            debug!("Fetched {} message(s), {}/{}", fetched, position, page.total);
            if fetched < limit || position >= page.total {
                break;
            }
        }

        Ok(messages)
    }
}

fn check_days(days: u32) -> Result<u32> {
    if days == 0 {
        return Err(JmapError::InvalidInput(
            "days must be at least 1".to_string(),
        ));
    }
    Ok(days)
}
