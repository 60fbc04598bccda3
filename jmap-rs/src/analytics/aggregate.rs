//! Pure aggregations over fetched messages

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Timelike, Utc};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use super::types::{
    ActivityPatterns, ContentInsights, DayCount, FolderUsage, HourCount, KeywordCount,
    MonthCount, ResponseMetrics, SenderStat, SubjectPatterns, VolumeStats,
};
use crate::model::{Email, Mailbox};

pub const RESPONSE_TIME_NOTE: &str = "Average response time is not measured: it needs thread-level \
correlation of received messages with replies, which is not attempted.";

const TOP_KEYWORDS: usize = 10;

const STOP_WORDS: &[&str] = &[
    "about", "after", "also", "been", "from", "have", "here", "into", "just", "more", "only",
    "over", "that", "their", "them", "then", "there", "these", "they", "this", "what", "when",
    "were", "will", "with", "your",
];

/// Characters stripped from subject tokens
fn non_word_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\W").expect("valid non-word regex"))
}

/// Time zone used for hour, day and month buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketZone {
    /// Host time zone, resolved per message so DST transitions are honoured
    #[default]
    Local,
    /// One offset for every message
    Fixed(FixedOffset),
}

impl BucketZone {
    /// Wall-clock time of `instant` in this zone
    pub fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            BucketZone::Local => instant.with_timezone(&Local).naive_local(),
            BucketZone::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole` as a percentage with two decimals; 0 when `whole` is 0
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / whole as f64)
    }
}

/// Whether the first sender is the account owner
pub fn is_sent_by(email: &Email, account_email: &str) -> bool {
    email
        .sender()
        .is_some_and(|from| from.email.eq_ignore_ascii_case(account_email))
}

/// Split into (sent, received) by sender address
pub fn partition<'a>(messages: &'a [Email], account_email: &str) -> (Vec<&'a Email>, Vec<&'a Email>) {
    messages.iter().partition(|e| is_sent_by(e, account_email))
}

pub fn volume(messages: &[Email], account_email: &str) -> VolumeStats {
    let (sent, received) = partition(messages, account_email);
    VolumeStats {
        total: messages.len() as u64,
        sent: sent.len() as u64,
        received: received.len() as u64,
    }
}

/// Received messages ranked by sender; first-seen wins ties
pub fn top_senders(received: &[&Email], limit: usize) -> Vec<SenderStat> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut senders: Vec<SenderStat> = Vec::new();

    for email in received {
        let Some(from) = email.sender() else {
            continue;
        };
        let key = from.email.to_lowercase();

        match index.get(&key) {
            Some(&i) => {
                senders[i].count += 1;
                if senders[i].name.is_none() {
                    senders[i].name = from.name.clone().filter(|n| !n.is_empty());
                }
            }
            None => {
                index.insert(key.clone(), senders.len());
                senders.push(SenderStat {
                    email: key,
                    name: from.name.clone().filter(|n| !n.is_empty()),
                    count: 1,
                    percentage: 0.0,
                });
            }
        }
    }

    let total = received.len() as u64;
    for sender in &mut senders {
        sender.percentage = percentage(sender.count, total);
    }

    // sort_by is stable
    senders.sort_by(|a, b| b.count.cmp(&a.count));
    senders.truncate(limit);
    senders
}

/// Hour, day and month histograms by local time of receipt
pub fn activity_patterns(messages: &[Email], zone: BucketZone) -> ActivityPatterns {
    let mut by_hour = [0u64; 24];
    let mut by_day: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_month: BTreeMap<String, u64> = BTreeMap::new();

    for received in messages.iter().filter_map(timestamp) {
        let local = zone.wall_clock(received);
        by_hour[local.hour() as usize] += 1;
        *by_day.entry(local.format("%Y-%m-%d").to_string()).or_default() += 1;
        *by_month.entry(local.format("%Y-%m").to_string()).or_default() += 1;
    }

    ActivityPatterns {
        by_hour: by_hour
            .iter()
            .enumerate()
            .map(|(hour, &count)| HourCount {
                hour: hour as u32,
                count,
            })
            .collect(),
        by_day: by_day
            .into_iter()
            .map(|(date, count)| DayCount { date, count })
            .collect(),
        by_month: by_month
            .into_iter()
            .map(|(month, count)| MonthCount { month, count })
            .collect(),
    }
}

/// Receipt time, falling back to the sent time
fn timestamp(email: &Email) -> Option<DateTime<Utc>> {
    email.received_at.or(email.sent_at)
}

/// Membership counts per folder, busiest first
pub fn folder_usage(messages: &[Email], mailboxes: &[Mailbox]) -> Vec<FolderUsage> {
    let names: HashMap<&str, &str> = mailboxes
        .iter()
        .map(|m| (m.id.as_str(), m.name.as_str()))
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for email in messages {
        for id in email.mailbox_id_list() {
            let count = counts.entry(id.to_string()).or_insert_with(|| {
                order.push(id.to_string());
                0
            });
            *count += 1;
        }
    }

    let total = messages.len() as u64;
    let mut usage: Vec<FolderUsage> = order
        .into_iter()
        .map(|id| {
            let count = counts.get(&id).copied().unwrap_or(0);
            let name = names
                .get(id.as_str())
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string())
                .unwrap_or_else(|| id.clone());
            FolderUsage {
                percentage: percentage(count, total),
                mailbox_id: id,
                name,
                count,
            }
        })
        .collect();

    usage.sort_by(|a, b| b.count.cmp(&a.count));
    usage
}

/// Preview, attachment and subject heuristics
pub fn content_insights(messages: &[Email]) -> ContentInsights {
    if messages.is_empty() {
        return ContentInsights::default();
    }

    let preview_chars: usize = messages
        .iter()
        .map(|e| e.preview.as_deref().map_or(0, |p| p.chars().count()))
        .sum();

    let mut patterns = SubjectPatterns::default();
    for email in messages {
        classify_subject(email.subject_or_empty(), &mut patterns);
    }

    ContentInsights {
        average_preview_length: round2(preview_chars as f64 / messages.len() as f64),
        with_attachments: messages.iter().filter(|e| e.has_attachment).count() as u64,
        top_keywords: top_keywords(messages.iter().map(Email::subject_or_empty), TOP_KEYWORDS),
        subject_patterns: patterns,
    }
}

fn classify_subject(subject: &str, patterns: &mut SubjectPatterns) {
    let subject = subject.to_lowercase();

    if contains_any(&subject, &["re:"]) {
        patterns.reply += 1;
    }
    if contains_any(&subject, &["fwd:", "fw:"]) {
        patterns.forward += 1;
    }
    if contains_any(&subject, &["newsletter", "unsubscribe"]) {
        patterns.newsletter += 1;
    }
    if contains_any(&subject, &["invoice", "payment", "receipt"]) {
        patterns.financial += 1;
    }
    if contains_any(&subject, &["meeting", "calendar", "invite"]) {
        patterns.meeting += 1;
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Most frequent subject words longer than three characters.
///
/// Words are whitespace-separated with non-word characters removed, so
/// "follow-up" counts as "followup".
pub fn top_keywords<'a>(subjects: impl Iterator<Item = &'a str>, limit: usize) -> Vec<KeywordCount> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut keywords: Vec<KeywordCount> = Vec::new();

    for subject in subjects {
        let lowered = subject.to_lowercase();
        for token in lowered.split_whitespace() {
            let cleaned = non_word_regex().replace_all(token, "");
            let word = cleaned.as_ref();
            if word.chars().count() <= 3 || STOP_WORDS.contains(&word) {
                continue;
            }
            match index.get(word) {
                Some(&i) => keywords[i].count += 1,
                None => {
                    index.insert(word.to_string(), keywords.len());
                    keywords.push(KeywordCount {
                        keyword: word.to_string(),
                        count: 1,
                    });
                }
            }
        }
    }

    keywords.sort_by(|a, b| b.count.cmp(&a.count));
    keywords.truncate(limit);
    keywords
}

/// Unread share among received messages
pub fn response_metrics(received: &[&Email]) -> ResponseMetrics {
    let unread: Vec<&&Email> = received.iter().filter(|e| !e.is_seen()).collect();

    ResponseMetrics {
        unread_count: unread.len() as u64,
        unread_percentage: percentage(unread.len() as u64, received.len() as u64),
        oldest_unread: unread.iter().filter_map(|e| timestamp(e)).min(),
        average_response_time_hours: 0.0,
        response_time_note: RESPONSE_TIME_NOTE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EmailAddress;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn email(from: &str, subject: &str, hour: u32) -> Email {
        Email {
            id: format!("{}-{}-{}", from, subject, hour),
            from: vec![EmailAddress::new(from)],
            subject: Some(subject.to_string()),
            received_at: Some(Utc.with_ymd_and_hms(2024, 5, 14, hour, 30, 0).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_percentage_never_divides_by_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
    }

    #[test]
    fn test_volume_classifies_by_sender_case_insensitively() {
        let messages = vec![
            email("Me@Example.com", "status", 9),
            email("alice@example.com", "hello", 10),
            email("bob@example.com", "hi", 11),
        ];

        let volume = volume(&messages, "me@example.com");
        assert_eq!(volume, VolumeStats { total: 3, sent: 1, received: 2 });
    }

    #[test]
    fn test_top_senders_are_stable_and_case_folded() {
        let messages = vec![
            email("bob@example.com", "a", 9),
            email("alice@example.com", "b", 9),
            email("Alice@Example.com", "c", 9),
            email("carol@example.com", "d", 9),
            email("bob@example.com", "e", 9),
        ];
        let received: Vec<&Email> = messages.iter().collect();

        let senders = top_senders(&received, 10);
        let order: Vec<&str> = senders.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(order, vec!["bob@example.com", "alice@example.com", "carol@example.com"]);
        assert_eq!(senders[0].percentage, 40.0);

        let sum: f64 = senders.iter().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.5);

        assert_eq!(top_senders(&received, 1).len(), 1);
    }

    #[test]
    fn test_hour_histogram_is_complete_in_local_time() {
        let messages = vec![email("a@x.com", "s", 0), email("a@x.com", "s", 23)];
        let plus_two = BucketZone::Fixed(FixedOffset::east_opt(2 * 3600).unwrap());

        let patterns = activity_patterns(&messages, plus_two);
        assert_eq!(patterns.by_hour.len(), 24);
        assert!(patterns.by_hour.iter().enumerate().all(|(i, h)| h.hour == i as u32));
        assert_eq!(patterns.by_hour.iter().map(|h| h.count).sum::<u64>(), 2);
        assert_eq!(patterns.by_hour[2].count, 1);
        assert_eq!(patterns.by_hour[1].count, 1);

        // 23:30 UTC is already the next day at +02:00
        let days: Vec<&str> = patterns.by_day.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(days, vec!["2024-05-14", "2024-05-15"]);
        assert_eq!(patterns.by_month.len(), 1);
        assert_eq!(patterns.by_month[0].month, "2024-05");
    }

    #[test]
    fn test_local_buckets_resolve_offset_per_message() {
        // Mid-winter and mid-summer instants straddle any DST transition
        let winter = Utc.with_ymd_and_hms(2026, 1, 15, 17, 0, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2026, 7, 15, 17, 0, 0).unwrap();
        let messages: Vec<Email> = [winter, summer]
            .into_iter()
            .map(|at| Email {
                received_at: Some(at),
                ..email("a@x.com", "s", 0)
            })
            .collect();

        let patterns = activity_patterns(&messages, BucketZone::Local);
        let mut expected = [0u64; 24];
        for at in [winter, summer] {
            expected[at.with_timezone(&Local).hour() as usize] += 1;
        }
        let actual: Vec<u64> = patterns.by_hour.iter().map(|h| h.count).collect();
        assert_eq!(actual, expected.to_vec());
    }

    #[test]
    fn test_wall_clock_in_local_and_fixed_zones() {
        let summer = Utc.with_ymd_and_hms(2026, 7, 15, 17, 0, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2026, 1, 15, 17, 0, 0).unwrap();

        assert_eq!(BucketZone::Local.wall_clock(summer), summer.with_timezone(&Local).naive_local());
        assert_eq!(BucketZone::Local.wall_clock(winter), winter.with_timezone(&Local).naive_local());

        let minus_five = BucketZone::Fixed(FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(minus_five.wall_clock(summer).hour(), 12);
        assert_eq!(minus_five.wall_clock(winter).hour(), 12);
    }

    #[test]
    fn test_keywords_strip_punctuation_inside_words() {
        let subjects = ["Follow-up: e-mail migration", "Can't make the follow-up", "RE: [ops] e-mail"];
        let keywords = top_keywords(subjects.into_iter(), 10);

        let counts: Vec<(&str, u64)> = keywords.iter().map(|k| (k.keyword.as_str(), k.count)).collect();
        assert_eq!(
            counts,
            vec![("followup", 2), ("email", 2), ("migration", 1), ("cant", 1), ("make", 1)]
        );
    }

    #[test]
    fn test_folder_usage_counts_every_membership() {
        let mut overlapping = email("a@x.com", "s", 9);
        overlapping.mailbox_ids = BTreeMap::from([("inbox".to_string(), true), ("work".to_string(), true)]);
        let mut inbox_only = email("b@x.com", "s", 9);
        inbox_only.mailbox_ids = BTreeMap::from([("inbox".to_string(), true)]);

        let mailboxes = vec![Mailbox {
            id: "inbox".to_string(),
            name: "Inbox".to_string(),
            ..Default::default()
        }];

        let usage = folder_usage(&[overlapping, inbox_only], &mailboxes);
        assert_eq!(usage[0].name, "Inbox");
        assert_eq!(usage[0].count, 2);
        assert_eq!(usage[0].percentage, 100.0);
        assert_eq!(usage[1].name, "work");
        assert_eq!(usage[1].percentage, 50.0);
    }

    #[test]
    fn test_content_insights_keywords_and_patterns() {
        let mut messages = vec![
            email("a@x.com", "Re: Quarterly budget meeting", 9),
            email("b@x.com", "Fwd: Budget invoice", 9),
            email("c@x.com", "Weekly newsletter: budget tips", 9),
        ];
        messages[0].preview = Some("abcd".to_string());
        messages[1].has_attachment = true;

        let insights = content_insights(&messages);
        assert_eq!(insights.average_preview_length, 1.33);
        assert_eq!(insights.with_attachments, 1);
        assert_eq!(insights.top_keywords[0], KeywordCount { keyword: "budget".to_string(), count: 3 });
        assert!(insights.top_keywords.iter().all(|k| k.keyword.len() > 3));
        assert_eq!(insights.subject_patterns.reply, 1);
        assert_eq!(insights.subject_patterns.forward, 1);
        assert_eq!(insights.subject_patterns.newsletter, 1);
        assert_eq!(insights.subject_patterns.financial, 1);
        assert_eq!(insights.subject_patterns.meeting, 1);
    }

    #[test]
    fn test_response_metrics_track_oldest_unread() {
        let mut read = email("a@x.com", "s", 8);
        read.keywords.insert("$seen".to_string(), true);
        let late = email("b@x.com", "s", 15);
        let early = email("c@x.com", "s", 10);
        let received = vec![&read, &late, &early];

        let metrics = response_metrics(&received);
        assert_eq!(metrics.unread_count, 2);
        assert_eq!(metrics.unread_percentage, 66.67);
        assert_eq!(metrics.oldest_unread, early.received_at);
        assert_eq!(metrics.average_response_time_hours, 0.0);
        assert!(!metrics.response_time_note.is_empty());
    }

    #[test]
    fn test_empty_input_yields_zeroes() {
        assert_eq!(content_insights(&[]), ContentInsights::default());
        let metrics = response_metrics(&[]);
        assert_eq!(metrics.unread_percentage, 0.0);
        assert!(metrics.oldest_unread.is_none());
        assert!(top_senders(&[], 10).is_empty());
        assert!(folder_usage(&[], &[]).is_empty());
    }
}
