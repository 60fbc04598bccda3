use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Messages analysed when the caller gives no bound
pub const DEFAULT_MAX_MESSAGES: usize = 1000;

/// Length of the ranked sender list when the caller gives no bound
pub const DEFAULT_TOP_SENDERS: usize = 10;

/// What to analyse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_messages: usize,
    /// Gates the subject and preview heuristics
    pub include_content: bool,
    pub top_senders_limit: usize,
}

impl AnalyticsRequest {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            max_messages: DEFAULT_MAX_MESSAGES,
            include_content: true,
            top_senders_limit: DEFAULT_TOP_SENDERS,
        }
    }

    /// The window `[now - days, now]`
    pub fn last_days(days: u32) -> Self {
        let end = Utc::now();
        Self::new(end - Duration::days(i64::from(days)), end)
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_content(mut self, include_content: bool) -> Self {
        self.include_content = include_content;
        self
    }

    pub fn with_top_senders_limit(mut self, limit: usize) -> Self {
        self.top_senders_limit = limit;
        self
    }
}

/// Snapshot derived from one fetch; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub period: Period,
    pub volume: VolumeStats,
    pub top_senders: Vec<SenderStat>,
    pub activity_patterns: ActivityPatterns,
    pub folder_usage: Vec<FolderUsage>,
    pub content_insights: ContentInsights,
    pub response_metrics: ResponseMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStats {
    pub total: u64,
    pub sent: u64,
    pub received: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderStat {
    pub email: String,
    pub name: Option<String>,
    pub count: u64,
    /// Share of received messages
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPatterns {
    /// Always 24 entries, hours 0 to 23
    pub by_hour: Vec<HourCount>,
    pub by_day: Vec<DayCount>,
    pub by_month: Vec<MonthCount>,
}

impl ActivityPatterns {
    /// Busiest hour; the earliest wins ties
    pub fn peak_hour(&self) -> Option<&HourCount> {
        self.by_hour
            .iter()
            .filter(|h| h.count > 0)
            .fold(None, |best: Option<&HourCount>, h| match best {
                Some(b) if b.count >= h.count => Some(b),
                _ => Some(h),
            })
    }

    /// Busiest day; the earliest wins ties
    pub fn peak_day(&self) -> Option<&DayCount> {
        self.by_day.iter().fold(None, |best: Option<&DayCount>, d| match best {
            Some(b) if b.count >= d.count => Some(b),
            _ => Some(d),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderUsage {
    pub mailbox_id: String,
    pub name: String,
    pub count: u64,
    /// Share of all analysed messages; folders may overlap
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentInsights {
    pub average_preview_length: f64,
    pub with_attachments: u64,
    pub top_keywords: Vec<KeywordCount>,
    pub subject_patterns: SubjectPatterns,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPatterns {
    pub reply: u64,
    pub forward: u64,
    pub newsletter: u64,
    pub financial: u64,
    pub meeting: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetrics {
    pub unread_count: u64,
    /// Share of received messages
    pub unread_percentage: f64,
    pub oldest_unread: Option<DateTime<Utc>>,
    /// Always 0.0; see `response_time_note`
    pub average_response_time_hours: f64,
    pub response_time_note: String,
}
