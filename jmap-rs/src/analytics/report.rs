//! Human-readable analytics report

use std::fmt::Write;

use super::aggregate::percentage;
use super::types::AnalyticsResult;

pub const UNREAD_THRESHOLD_PERCENT: f64 = 20.0;
pub const TOP_SENDER_THRESHOLD_PERCENT: f64 = 30.0;
pub const ATTACHMENT_THRESHOLD_PERCENT: f64 = 50.0;
/// Inclusive working-hours range for the peak-hour check
pub const WORKDAY_HOURS: std::ops::RangeInclusive<u32> = 9..=17;

const REPORT_LIST_LEN: usize = 5;

/// Render a multi-section text report followed by recommendations
pub fn format_report(result: &AnalyticsResult, days: u32) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = write_report(&mut out, result, days);
    out
}

fn write_report(out: &mut String, result: &AnalyticsResult, days: u32) -> std::fmt::Result {
    writeln!(out, "📊 Email Analytics Report (last {} days)", days)?;
    writeln!(
        out,
        "Period: {} to {}",
        result.period.start.format("%Y-%m-%d"),
        result.period.end.format("%Y-%m-%d")
    )?;

    writeln!(out)?;
    writeln!(out, "📬 Volume")?;
    writeln!(out, "  Total: {}", result.volume.total)?;
    writeln!(out, "  Received: {}", result.volume.received)?;
    writeln!(out, "  Sent: {}", result.volume.sent)?;

    writeln!(out)?;
    writeln!(out, "👥 Top Senders")?;
    if result.top_senders.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for (rank, sender) in result.top_senders.iter().take(REPORT_LIST_LEN).enumerate() {
        let label = match &sender.name {
            Some(name) => format!("{} <{}>", name, sender.email),
            None => sender.email.clone(),
        };
        writeln!(
            out,
            "  {}. {}: {} ({:.2}%)",
            rank + 1,
            label,
            sender.count,
            sender.percentage
        )?;
    }

    writeln!(out)?;
    writeln!(out, "⏰ Activity")?;
    match result.activity_patterns.peak_hour() {
        Some(peak) => writeln!(out, "  Peak hour: {:02}:00 ({} messages)", peak.hour, peak.count)?,
        None => writeln!(out, "  Peak hour: n/a")?,
    }
    match result.activity_patterns.peak_day() {
        Some(day) => writeln!(out, "  Busiest day: {} ({} messages)", day.date, day.count)?,
        None => writeln!(out, "  Busiest day: n/a")?,
    }
    writeln!(out, "  Active days: {}", result.activity_patterns.by_day.len())?;

    writeln!(out)?;
    writeln!(out, "📁 Folders")?;
    if result.folder_usage.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for folder in result.folder_usage.iter().take(REPORT_LIST_LEN) {
        writeln!(
            out,
            "  {}: {} ({:.2}%)",
            folder.name, folder.count, folder.percentage
        )?;
    }

    let content = &result.content_insights;
    writeln!(out)?;
    writeln!(out, "📝 Content")?;
    writeln!(out, "  Average preview length: {:.2} chars", content.average_preview_length)?;
    writeln!(out, "  With attachments: {}", content.with_attachments)?;
    if !content.top_keywords.is_empty() {
        let keywords: Vec<String> = content
            .top_keywords
            .iter()
            .map(|k| format!("{} ({})", k.keyword, k.count))
            .collect();
        writeln!(out, "  Top keywords: {}", keywords.join(", "))?;
    }
    let patterns = &content.subject_patterns;
    writeln!(
        out,
        "  Replies: {}, forwards: {}, newsletters: {}, financial: {}, meetings: {}",
        patterns.reply, patterns.forward, patterns.newsletter, patterns.financial, patterns.meeting
    )?;

    let metrics = &result.response_metrics;
    writeln!(out)?;
    writeln!(out, "📨 Responsiveness")?;
    writeln!(
        out,
        "  Unread: {} ({:.2}% of received)",
        metrics.unread_count, metrics.unread_percentage
    )?;
    if let Some(oldest) = metrics.oldest_unread {
        writeln!(out, "  Oldest unread: {}", oldest.format("%Y-%m-%d %H:%M UTC"))?;
    }
    writeln!(out, "  Note: {}", metrics.response_time_note)?;

    writeln!(out)?;
    writeln!(out, "💡 Recommendations")?;
    let recommendations = recommendations(result);
    if recommendations.is_empty() {
        writeln!(out, "  Your inbox looks healthy.")?;
    }
    for recommendation in recommendations {
        writeln!(out, "  - {}", recommendation)?;
    }

    Ok(())
}

/// Threshold-driven suggestions
pub fn recommendations(result: &AnalyticsResult) -> Vec<String> {
    let mut tips = Vec::new();

    if result.response_metrics.unread_percentage > UNREAD_THRESHOLD_PERCENT {
        tips.push(format!(
            "{:.2}% of received mail is unread; consider an inbox-zero session or filters.",
            result.response_metrics.unread_percentage
        ));
    }

    if let Some(top) = result
        .top_senders
        .first()
        .filter(|s| s.percentage > TOP_SENDER_THRESHOLD_PERCENT)
    {
        tips.push(format!(
            "{} accounts for {:.2}% of received mail; a dedicated folder or rule may help.",
            top.email, top.percentage
        ));
    }

    let attachment_share = percentage(
        result.content_insights.with_attachments,
        result.volume.total,
    );
    if attachment_share > ATTACHMENT_THRESHOLD_PERCENT {
        tips.push(format!(
            "{:.2}% of messages carry attachments; watch your storage quota.",
            attachment_share
        ));
    }

    if let Some(peak) = result.activity_patterns.peak_hour() {
        if !WORKDAY_HOURS.contains(&peak.hour) {
            tips.push(format!(
                "Mail peaks at {:02}:00, outside working hours; consider scheduled delivery or quiet hours.",
                peak.hour
            ));
        }
    }

    tips
}
