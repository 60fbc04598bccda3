//! AnalyticsEngine against the in-memory JMAP server

use chrono::{Duration, FixedOffset, Local, TimeZone, Timelike, Utc};
use jmap_rs::analytics::{format_report, AnalyticsEngine, AnalyticsRequest, BucketZone};
use jmap_rs::model::role;
use jmap_rs::testing::{EmailFixture, FakeMailServer};
use jmap_rs::JmapError;
use std::sync::Arc;

fn hours_ago(hours: i64) -> chrono::DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

/// Seven received messages from three senders, two sent, one outside the window
fn seeded_server() -> Arc<FakeMailServer> {
    let server = Arc::new(FakeMailServer::new());

    for i in 0..3 {
        server.insert(
            EmailFixture::new("alice@example.com", &format!("Re: Budget review {i}"))
                .named("Alice")
                .received_at(hours_ago(2 + i)),
        );
    }
    server.insert(EmailFixture::new("Bob@Example.com", "Weekly newsletter").received_at(hours_ago(30)).seen());
    server.insert(
        EmailFixture::new("bob@example.com", "Invoice 42")
            .with_attachment()
            .received_at(hours_ago(31))
            .in_role(role::ARCHIVE),
    );
    server.insert(EmailFixture::new("carol@example.com", "Meeting invite").received_at(hours_ago(50)).seen());
    server.insert(EmailFixture::new("carol@example.com", "Fwd: meeting notes").received_at(hours_ago(51)).seen());

    server.insert(EmailFixture::outgoing("alice@example.com", "Re: Budget review").received_at(hours_ago(1)));
    server.insert(EmailFixture::outgoing("carol@example.com", "Agenda").received_at(hours_ago(49)));

    server.insert(EmailFixture::new("old@example.com", "Ancient history").received_at(hours_ago(24 * 40)));

    server
}

#[tokio::test]
async fn test_compute_classifies_and_ranks() {
    let server = seeded_server();
    let client = FakeMailServer::initialized_client(&server).await;
    let engine = AnalyticsEngine::new(&client).with_utc_offset(utc());

    let result = engine.compute(&AnalyticsRequest::last_days(7)).await.unwrap();

    assert_eq!(result.volume.total, 9);
    assert_eq!(result.volume.sent, 2);
    assert_eq!(result.volume.received, 7);

    let senders: Vec<(&str, u64)> = result
        .top_senders
        .iter()
        .map(|s| (s.email.as_str(), s.count))
        .collect();
    assert_eq!(
        senders,
        vec![
            ("alice@example.com", 3),
            ("bob@example.com", 2),
            ("carol@example.com", 2)
        ]
    );
    assert_eq!(result.top_senders[0].name.as_deref(), Some("Alice"));
    assert_eq!(result.top_senders[0].percentage, 42.86);

    let sender_share: f64 = result.top_senders.iter().map(|s| s.percentage).sum();
    assert!((sender_share - 100.0).abs() <= 0.5, "sum was {sender_share}");

    let folder_share: f64 = result.folder_usage.iter().map(|f| f.percentage).sum();
    assert!((folder_share - 100.0).abs() <= 0.5, "sum was {folder_share}");
    assert_eq!(result.folder_usage[0].name, "Inbox");
    assert_eq!(result.folder_usage[0].count, 6);

    let metrics = &result.response_metrics;
    assert_eq!(metrics.unread_count, 4);
    assert_eq!(metrics.unread_percentage, 57.14);
    assert!(metrics.oldest_unread.is_some());
    assert_eq!(metrics.average_response_time_hours, 0.0);
    assert!(!metrics.response_time_note.is_empty());
}

#[tokio::test]
async fn test_hour_histogram_covers_every_message() {
    let server = Arc::new(FakeMailServer::new());
    let base = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
    for (i, hour) in [0, 8, 8, 13, 23, 23, 23].iter().enumerate() {
        server.insert(
            EmailFixture::new("a@example.com", &format!("m{i}"))
                .received_at(base + Duration::hours(*hour) + Duration::days(i as i64 % 2)),
        );
    }
    let client = FakeMailServer::initialized_client(&server).await;
    let engine = AnalyticsEngine::new(&client).with_utc_offset(utc());

    let request = AnalyticsRequest::new(base - Duration::days(1), base + Duration::days(3));
    let patterns = engine.compute(&request).await.unwrap().activity_patterns;

    assert_eq!(patterns.by_hour.len(), 24);
    assert!(patterns.by_hour.iter().enumerate().all(|(i, h)| h.hour == i as u32));
    assert_eq!(patterns.by_hour.iter().map(|h| h.count).sum::<u64>(), 7);
    assert_eq!(patterns.by_hour[23].count, 3);
    assert_eq!(patterns.peak_hour().unwrap().hour, 23);

    let days: Vec<&str> = patterns.by_day.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(days, vec!["2024-03-10", "2024-03-11"]);
    assert_eq!(patterns.by_month.len(), 1);
    assert_eq!(patterns.by_month[0].month, "2024-03");
    assert_eq!(patterns.by_month[0].count, 7);
}

#[tokio::test]
async fn test_buckets_follow_configured_offset() {
    let server = Arc::new(FakeMailServer::new());
    let at = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
    server.insert(EmailFixture::new("a@example.com", "Late").received_at(at));
    let client = FakeMailServer::initialized_client(&server).await;

    let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
    let engine = AnalyticsEngine::new(&client).with_utc_offset(plus_two);
    assert_eq!(engine.bucket_zone(), BucketZone::Fixed(plus_two));

    let request = AnalyticsRequest::new(at - Duration::hours(1), at + Duration::hours(1));
    let patterns = engine.compute(&request).await.unwrap().activity_patterns;

    assert_eq!(patterns.by_hour[1].count, 1);
    assert_eq!(patterns.by_day[0].date, "2024-03-11");
}

#[tokio::test]
async fn test_default_buckets_use_host_zone_per_message() {
    let server = Arc::new(FakeMailServer::new());
    let winter = Utc.with_ymd_and_hms(2026, 1, 15, 17, 0, 0).unwrap();
    let summer = Utc.with_ymd_and_hms(2026, 7, 15, 17, 0, 0).unwrap();
    server.insert(EmailFixture::new("a@example.com", "Winter").received_at(winter));
    server.insert(EmailFixture::new("b@example.com", "Summer").received_at(summer));
    let client = FakeMailServer::initialized_client(&server).await;

    let engine = AnalyticsEngine::new(&client);
    assert_eq!(engine.bucket_zone(), BucketZone::Local);

    let request = AnalyticsRequest::new(winter - Duration::hours(1), summer + Duration::hours(1));
    let patterns = engine.compute(&request).await.unwrap().activity_patterns;

    for at in [winter, summer] {
        let local = at.with_timezone(&Local);
        assert!(patterns.by_hour[local.hour() as usize].count >= 1, "{local}");
        let day = local.format("%Y-%m-%d").to_string();
        assert!(patterns.by_day.iter().any(|d| d.date == day), "{day}");
    }
}

#[tokio::test]
async fn test_empty_window_yields_zeroes() {
    let server = seeded_server();
    let client = FakeMailServer::initialized_client(&server).await;
    let engine = AnalyticsEngine::new(&client).with_utc_offset(utc());

    let start = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
    let request = AnalyticsRequest::new(start, start + Duration::days(7));
    let result = engine.compute(&request).await.unwrap();

    assert_eq!(result.volume.total, 0);
    assert_eq!(result.volume.sent, 0);
    assert_eq!(result.volume.received, 0);
    assert!(result.top_senders.is_empty());
    assert!(result.folder_usage.is_empty());
    assert!(result.activity_patterns.by_day.is_empty());
    assert!(result.activity_patterns.by_month.is_empty());
    assert_eq!(result.activity_patterns.by_hour.len(), 24);
    assert!(result.activity_patterns.by_hour.iter().all(|h| h.count == 0));
    assert_eq!(result.response_metrics.unread_count, 0);
    assert_eq!(result.response_metrics.unread_percentage, 0.0);
    assert_eq!(result.content_insights.average_preview_length, 0.0);

    // One query, no mailbox listing
    assert_eq!(server.request_count(), 1);

    let report = format_report(&result, 7);
    assert!(!report.contains("NaN"));
}

#[tokio::test]
async fn test_content_insights_are_gated() {
    let server = seeded_server();
    let client = FakeMailServer::initialized_client(&server).await;
    let engine = AnalyticsEngine::new(&client).with_utc_offset(utc());

    let with_content = engine.compute_for_days(7, 1000, true).await.unwrap();
    let patterns = &with_content.content_insights.subject_patterns;
    assert_eq!(patterns.reply, 4);
    assert_eq!(patterns.forward, 1);
    assert_eq!(patterns.newsletter, 1);
    assert_eq!(patterns.financial, 1);
    assert_eq!(patterns.meeting, 2);
    assert_eq!(with_content.content_insights.with_attachments, 1);
    assert_eq!(
        with_content.content_insights.top_keywords[0].keyword,
        "budget"
    );

    let without = engine.compute_for_days(7, 1000, false).await.unwrap();
    assert_eq!(without.content_insights.with_attachments, 0);
    assert!(without.content_insights.top_keywords.is_empty());
    assert_eq!(without.volume, with_content.volume);
}

#[tokio::test]
async fn test_fetch_pages_until_cap_or_total() {
    let server = Arc::new(FakeMailServer::new());
    for i in 0..250 {
        server.insert(
            EmailFixture::new(&format!("sender{}@example.com", i % 7), "Bulk")
                .received_at(hours_ago(1) - Duration::minutes(i)),
        );
    }
    let client = FakeMailServer::initialized_client(&server).await;
    let engine = AnalyticsEngine::new(&client);

    let volume = engine.volume(7).await.unwrap();
    assert_eq!(volume.total, 250);
    assert_eq!(server.request_count(), 3);

    let capped = engine
        .compute(&AnalyticsRequest::last_days(7).with_max_messages(120))
        .await
        .unwrap();
    assert_eq!(capped.volume.total, 120);

    let ranked = engine.top_senders(7, 3).await.unwrap();
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].email, "sender0@example.com");
}

#[tokio::test]
async fn test_folder_listing_failure_degrades() {
    let server = seeded_server();
    server.fail_method("Mailbox/get");
    let client = FakeMailServer::initialized_client(&server).await;
    let engine = AnalyticsEngine::new(&client);

    let result = engine.compute(&AnalyticsRequest::last_days(7)).await.unwrap();
    assert!(result.folder_usage.is_empty());
    assert_eq!(result.volume.total, 9);
}

#[tokio::test]
async fn test_invalid_windows_are_rejected() {
    let server = seeded_server();
    let client = FakeMailServer::initialized_client(&server).await;
    let engine = AnalyticsEngine::new(&client);

    assert!(matches!(
        engine.volume(0).await,
        Err(JmapError::InvalidInput(_))
    ));

    let now = Utc::now();
    let backwards = AnalyticsRequest::new(now, now - Duration::days(1));
    assert!(matches!(
        engine.compute(&backwards).await,
        Err(JmapError::InvalidInput(_))
    ));
    assert_eq!(server.request_count(), 0);
}
