//! Tool execution: arguments in, JSON payload out

use jmap_rs::analytics::{format_report, recommendations, AnalyticsRequest};
use jmap_rs::client::{MessagePage, SearchPage};
use jmap_rs::model::{Email, EmailAddress, Mailbox};
use jmap_rs::{BatchResult, JmapError, ListOptions};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::args::{self, parse, require_ids};
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Run one tool; argument and mail errors come back as `Err`
pub async fn call_tool(state: &AppState, name: &str, arguments: Value) -> Result<Value> {
    info!("🔧 Calling tool: {}", name);

    match name {
        "list_mailboxes" => list_mailboxes(state, arguments).await,
        "list_emails" => list_emails(state, arguments).await,
        "get_email" => get_email(state, arguments).await,
        "send_email" => send_email(state, arguments).await,
        "search_emails" => search_emails(state, arguments).await,
        "advanced_search" => advanced_search(state, arguments).await,
        "mark_email_read" => mark_email_read(state, arguments).await,
        "bulk_mark_read" => bulk_mark_read(state, arguments).await,
        "move_email" => move_email(state, arguments).await,
        "bulk_move" => bulk_move(state, arguments).await,
        "delete_email" => delete_email(state, arguments).await,
        "bulk_delete" => bulk_delete(state, arguments).await,
        "list_identities" => list_identities(state, arguments).await,
        "get_thread" => get_thread(state, arguments).await,
        "get_mailbox_stats" => get_mailbox_stats(state, arguments).await,
        "get_email_attachments" => get_email_attachments(state, arguments).await,
        "get_email_analytics" => get_email_analytics(state, arguments).await,
        "get_email_volume" => get_email_volume(state, arguments).await,
        "get_top_senders" => get_top_senders(state, arguments).await,
        "get_activity_patterns" => get_activity_patterns(state, arguments).await,
        "get_analytics_report" => get_analytics_report(state, arguments).await,
        _ => Err(ServerError::UnknownTool(name.to_string())),
    }
}

async fn list_mailboxes(state: &AppState, arguments: Value) -> Result<Value> {
    parse::<args::NoArgs>(arguments)?;
    let mailboxes = state.client.list_mailboxes().await?;

    Ok(json!({
        "count": mailboxes.len(),
        "mailboxes": mailboxes.iter().map(render_mailbox).collect::<Vec<_>>(),
    }))
}

async fn list_emails(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::ListEmailsArgs = parse(arguments)?;

    let mut options = ListOptions::default().with_filter(args.filter);
    options.mailbox_id = args.mailbox_id;
    if let Some(limit) = args.limit {
        options = options.with_limit(limit);
    }
    if let Some(position) = args.position {
        options = options.with_position(position);
    }

    let page = state.client.list_messages(&options).await?;
    Ok(render_page(&page, options.position))
}

async fn get_email(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::EmailIdArgs = parse(arguments)?;
    let email = fetch_email(state, &args.email_id).await?;
    Ok(render_detail(&email))
}

async fn send_email(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::SendEmailArgs = parse(arguments)?;
    let options = args.into_options();
    let recipients = options.envelope_recipients();

    let sent = state.client.send_message(&options).await?;
    info!("✅ Email {} sent to {} recipient(s)", sent.id, recipients.len());

    Ok(json!({
        "success": true,
        "email_id": sent.id,
        "sent_at": sent.sent_at,
        "message": format!("Email sent to {}", recipients.join(", ")),
    }))
}

async fn search_emails(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::SearchArgs = parse(arguments)?;
    let limit = args.limit.unwrap_or(jmap_rs::client::DEFAULT_LIST_LIMIT);

    let page = state.client.search_by_text(&args.query, limit).await?;
    let mut payload = render_page(&page, 0);
    payload["query"] = json!(args.query);
    Ok(payload)
}

async fn advanced_search(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::AdvancedSearchArgs = parse(arguments)?;
    let limit = args.limit.unwrap_or(jmap_rs::client::DEFAULT_LIST_LIMIT);

    let page = state
        .client
        .advanced_search(&args.filter, &args.sort, args.position, limit)
        .await?;
    Ok(render_search_page(&page))
}

async fn mark_email_read(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::MarkReadArgs = parse(arguments)?;
    state
        .client
        .update_read_state(&args.email_id, args.read)
        .await?;

    Ok(json!({
        "success": true,
        "email_id": args.email_id,
        "read": args.read,
    }))
}

async fn bulk_mark_read(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::BulkMarkReadArgs = parse(arguments)?;
    require_ids(&args.email_ids)?;

    let result = state
        .client
        .update_read_states(&args.email_ids, args.read)
        .await?;
    Ok(render_batch(&result))
}

async fn move_email(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::MoveArgs = parse(arguments)?;
    state
        .client
        .move_message(&args.email_id, &args.target_mailbox_id)
        .await?;

    Ok(json!({
        "success": true,
        "email_id": args.email_id,
        "mailbox_id": args.target_mailbox_id,
    }))
}

async fn bulk_move(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::BulkMoveArgs = parse(arguments)?;
    require_ids(&args.email_ids)?;

    let result = state
        .client
        .move_messages(&args.email_ids, &args.target_mailbox_id)
        .await?;
    Ok(render_batch(&result))
}

async fn delete_email(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::EmailIdArgs = parse(arguments)?;
    state.client.delete_message(&args.email_id).await?;

    Ok(json!({
        "success": true,
        "email_id": args.email_id,
    }))
}

async fn bulk_delete(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::BulkIdsArgs = parse(arguments)?;
    require_ids(&args.email_ids)?;

    let result = state.client.delete_messages(&args.email_ids).await?;
    Ok(render_batch(&result))
}

async fn list_identities(state: &AppState, arguments: Value) -> Result<Value> {
    parse::<args::NoArgs>(arguments)?;
    let identities = state.client.list_identities().await?;

    let rendered: Vec<Value> = identities
        .iter()
        .map(|identity| {
            json!({
                "id": identity.id,
                "name": identity.name,
                "email": identity.email,
                "reply_to": addresses(&identity.reply_to),
                "bcc": addresses(&identity.bcc),
            })
        })
        .collect();

    Ok(json!({ "count": rendered.len(), "identities": rendered }))
}

async fn get_thread(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::ThreadArgs = parse(arguments)?;
    let messages = state.client.get_thread(&args.thread_id).await?;

    Ok(json!({
        "thread_id": args.thread_id,
        "count": messages.len(),
        "messages": messages.iter().map(render_summary).collect::<Vec<_>>(),
    }))
}

async fn get_mailbox_stats(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::MailboxStatsArgs = parse(arguments)?;
    let stats = state
        .client
        .get_mailbox_stats(args.mailbox_id.as_deref())
        .await?;

    Ok(json!({ "mailboxes": serde_json::to_value(&stats)? }))
}

async fn get_email_attachments(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::EmailIdArgs = parse(arguments)?;
    let email = fetch_email(state, &args.email_id).await?;

    let mut attachments = Vec::new();
    for attachment in email.attachment_descriptors() {
        let name = attachment.name.as_deref().unwrap_or("attachment");
        let mime_type = attachment
            .mime_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let download_url = match attachment.blob_id.as_deref() {
            Some(blob_id) => Some(
                state
                    .client
                    .attachment_download_url(blob_id, name, mime_type)?,
            ),
            None => None,
        };

        attachments.push(json!({
            "part_id": attachment.part_id,
            "blob_id": attachment.blob_id,
            "name": name,
            "mime_type": mime_type,
            "size": attachment.size,
            "download_url": download_url,
        }));
    }

    Ok(json!({
        "email_id": email.id,
        "count": attachments.len(),
        "attachments": attachments,
    }))
}

async fn get_email_analytics(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::AnalyticsArgs = parse(arguments)?;
    let days = window_days(state, args.days)?;

    let request = AnalyticsRequest::last_days(days)
        .with_max_messages(args.max_messages.unwrap_or(state.analytics.max_messages))
        .with_content(args.include_content.unwrap_or(true))
        .with_top_senders_limit(state.analytics.top_senders);
    let result = state.analytics_engine().compute(&request).await?;

    let mut payload = serde_json::to_value(&result)?;
    payload["days"] = json!(days);
    Ok(payload)
}

async fn get_email_volume(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::DaysArgs = parse(arguments)?;
    let days = window_days(state, args.days)?;

    let volume = state.analytics_engine().volume(days).await?;
    Ok(json!({
        "days": days,
        "total": volume.total,
        "sent": volume.sent,
        "received": volume.received,
    }))
}

async fn get_top_senders(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::TopSendersArgs = parse(arguments)?;
    let days = window_days(state, args.days)?;
    let limit = args.limit.unwrap_or(state.analytics.top_senders);

    let senders = state.analytics_engine().top_senders(days, limit).await?;
    Ok(json!({
        "days": days,
        "senders": serde_json::to_value(&senders)?,
    }))
}

async fn get_activity_patterns(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::DaysArgs = parse(arguments)?;
    let days = window_days(state, args.days)?;

    let patterns = state.analytics_engine().activity_patterns(days).await?;
    let mut payload = serde_json::to_value(&patterns)?;
    payload["days"] = json!(days);
    payload["peak_hour"] = json!(patterns.peak_hour().map(|h| h.hour));
    payload["peak_day"] = json!(patterns.peak_day().map(|d| d.date.clone()));
    Ok(payload)
}

async fn get_analytics_report(state: &AppState, arguments: Value) -> Result<Value> {
    let args: args::ReportArgs = parse(arguments)?;
    let days = window_days(state, args.days)?;

    let request = AnalyticsRequest::last_days(days)
        .with_max_messages(args.max_messages.unwrap_or(state.analytics.max_messages))
        .with_top_senders_limit(state.analytics.top_senders);
    let result = state.analytics_engine().compute(&request).await?;

    Ok(json!({
        "days": days,
        "report": format_report(&result, days),
        "recommendations": recommendations(&result),
        "volume": serde_json::to_value(&result.volume)?,
    }))
}

async fn fetch_email(state: &AppState, id: &str) -> Result<Email> {
    state
        .client
        .get_message(id)
        .await?
        .ok_or_else(|| ServerError::Jmap(JmapError::NotFound(format!("email {}", id))))
}

fn window_days(state: &AppState, days: Option<u32>) -> Result<u32> {
    match days.unwrap_or(state.analytics.default_days) {
        0 => Err(ServerError::InvalidArguments(
            "days must be at least 1".to_string(),
        )),
        days => Ok(days),
    }
}

fn addresses(list: &[EmailAddress]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

fn render_mailbox(mailbox: &Mailbox) -> Value {
    json!({
        "id": mailbox.id,
        "name": mailbox.name,
        "role": mailbox.role,
        "parent_id": mailbox.parent_id,
        "total_emails": mailbox.total_emails,
        "unread_emails": mailbox.unread_emails,
    })
}

fn render_summary(email: &Email) -> Value {
    json!({
        "id": email.id,
        "thread_id": email.thread_id,
        "subject": email.subject_or_empty(),
        "from": addresses(&email.from),
        "to": addresses(&email.to),
        "received_at": email.received_at,
        "preview": email.preview,
        "is_unread": !email.is_seen(),
        "is_flagged": email.is_flagged(),
        "has_attachment": email.has_attachment,
        "size": email.size,
        "mailbox_ids": email.mailbox_id_list(),
    })
}

fn render_detail(email: &Email) -> Value {
    let mut detail = render_summary(email);
    detail["cc"] = json!(addresses(&email.cc));
    detail["bcc"] = json!(addresses(&email.bcc));
    detail["reply_to"] = json!(addresses(&email.reply_to));
    detail["sent_at"] = json!(email.sent_at);
    detail["text_body"] = json!(email.text_content());
    detail["html_body"] = json!(email.html_content());
    detail["attachments"] = json!(email
        .attachment_descriptors()
        .iter()
        .map(|a| json!({
            "name": a.name,
            "mime_type": a.mime_type,
            "size": a.size,
            "blob_id": a.blob_id,
        }))
        .collect::<Vec<_>>());
    detail
}

fn render_page(page: &MessagePage, position: u64) -> Value {
    let mut payload = json!({
        "total": page.total,
        "position": position,
        "count": page.messages.len(),
        "emails": page.messages.iter().map(render_summary).collect::<Vec<_>>(),
    });

    let shown = position + page.messages.len() as u64;
    if shown < page.total {
        payload["warning"] = json!(format!(
            "Showing {} of {} matching messages; pass a larger position to see more",
            page.messages.len(),
            page.total
        ));
    }
    payload
}

fn render_search_page(page: &SearchPage) -> Value {
    json!({
        "total": page.total,
        "position": page.position,
        "count": page.messages.len(),
        "has_more_results": page.has_more_results,
        "emails": page.messages.iter().map(render_summary).collect::<Vec<_>>(),
    })
}

fn render_batch(result: &BatchResult) -> Value {
    if !result.is_complete_success() {
        warn!(
            "⚠️  Batch finished with {} failure(s) out of {}",
            result.failed.len(),
            result.failed.len() + result.succeeded.len()
        );
    }

    json!({
        "success": result.is_complete_success(),
        "success_count": result.succeeded.len(),
        "failure_count": result.failed.len(),
        "succeeded": result.succeeded,
        "failed": result
            .failed
            .iter()
            .map(|f| json!({ "id": f.id, "error": f.error }))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmap_rs::client::BatchFailure;

    #[test]
    fn test_render_page_warns_when_more_remain() {
        let page = MessagePage {
            messages: vec![Email {
                id: "m1".to_string(),
                ..Default::default()
            }],
            total: 3,
        };
        let payload = render_page(&page, 0);
        assert_eq!(payload["count"], 1);
        assert!(payload["warning"].as_str().unwrap().contains("1 of 3"));

        let last = render_page(&page, 2);
        assert!(last.get("warning").is_none());
    }

    #[test]
    fn test_render_batch_counts() {
        let result = BatchResult {
            succeeded: vec!["m1".to_string(), "m2".to_string()],
            failed: vec![BatchFailure {
                id: "m3".to_string(),
                error: "Not found: m3".to_string(),
            }],
        };
        let payload = render_batch(&result);
        assert_eq!(payload["success"], false);
        assert_eq!(payload["success_count"], 2);
        assert_eq!(payload["failure_count"], 1);
        assert_eq!(payload["failed"][0]["id"], "m3");
    }

    #[test]
    fn test_summary_marks_unread_without_seen_keyword() {
        let mut email = Email {
            id: "m1".to_string(),
            subject: Some("Hello".to_string()),
            from: vec![EmailAddress::new("a@example.com").with_name("Alice")],
            ..Default::default()
        };
        let summary = render_summary(&email);
        assert_eq!(summary["is_unread"], true);
        assert_eq!(summary["from"][0], "Alice <a@example.com>");

        email.keywords.insert("$seen".to_string(), true);
        assert_eq!(render_summary(&email)["is_unread"], false);
    }
}
