//! JmapClient against the in-memory JMAP server

use chrono::{Duration, Utc};
use jmap_rs::client::SendOptions;
use jmap_rs::model::{
    keyword, role, AdvancedFilter, EmailAddress, MessageFilter, SortField, SortSpec,
};
use jmap_rs::testing::{EmailFixture, FakeMailServer, ACCOUNT_EMAIL, ACCOUNT_ID};
use jmap_rs::{AnalyticsEngine, AnalyticsRequest, JmapError, ListOptions};
use std::sync::Arc;

fn server() -> Arc<FakeMailServer> {
    Arc::new(FakeMailServer::new())
}

fn hours_ago(hours: i64) -> chrono::DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

fn send_options(to: &str, subject: &str) -> SendOptions {
    SendOptions {
        to: vec![EmailAddress::new(to)],
        subject: subject.to_string(),
        text_body: Some("Hello there".to_string()),
        ..Default::default()
    }
}

/// Method names of the most recent request, in order
fn last_request_methods(server: &FakeMailServer) -> Vec<String> {
    let requests = server.requests();
    let last = requests.last().expect("at least one request");
    last["methodCalls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|call| call[0].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_operations_before_initialize_are_rejected() {
    let server = server();
    server.insert(EmailFixture::new("alice@example.com", "Hi"));
    let client = FakeMailServer::connect(&server);

    assert!(!client.is_initialized());
    assert!(matches!(
        client.list_mailboxes().await,
        Err(JmapError::Uninitialized)
    ));
    assert!(matches!(
        client.list_messages(&ListOptions::default()).await,
        Err(JmapError::Uninitialized)
    ));
    assert!(matches!(
        client.get_message("M-1").await,
        Err(JmapError::Uninitialized)
    ));
    assert!(matches!(
        client.send_message(&send_options("bob@example.com", "x")).await,
        Err(JmapError::Uninitialized)
    ));
    assert!(matches!(
        client.delete_messages(&["M-1".to_string()]).await,
        Err(JmapError::Uninitialized)
    ));
    assert!(matches!(
        client.account_email(),
        Err(JmapError::Uninitialized)
    ));

    let analytics = AnalyticsEngine::new(&client)
        .compute(&AnalyticsRequest::last_days(7))
        .await;
    assert!(matches!(analytics, Err(JmapError::Uninitialized)));

    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn test_initialize_binds_primary_account() {
    let server = server();
    let client = FakeMailServer::connect(&server);

    client.initialize().await.unwrap();
    client.initialize().await.unwrap();

    assert!(client.is_initialized());
    assert_eq!(client.account_id().unwrap(), ACCOUNT_ID);
    assert_eq!(client.account_email().unwrap(), ACCOUNT_EMAIL);
}

#[tokio::test]
async fn test_initialize_without_mail_account_is_configuration_error() {
    let server = server();
    server.remove_mail_account();
    let client = FakeMailServer::connect(&server);

    let err = client.initialize().await.unwrap_err();
    assert!(matches!(err, JmapError::Configuration(_)), "got {err:?}");
    assert!(!client.is_initialized());
}

#[tokio::test]
async fn test_rejected_session_is_initialization_error() {
    let server = server();
    server.make_session_unavailable();
    let client = FakeMailServer::connect(&server);

    let err = client.initialize().await.unwrap_err();
    assert!(matches!(err, JmapError::Initialization(_)), "got {err:?}");
}

#[tokio::test]
async fn test_list_messages_newest_first_in_one_round_trip() {
    let server = server();
    let oldest = server.insert(EmailFixture::new("a@example.com", "Oldest").received_at(hours_ago(3)));
    let newest = server.insert(EmailFixture::new("b@example.com", "Newest").received_at(hours_ago(1)));
    let middle = server.insert(EmailFixture::new("c@example.com", "Middle").received_at(hours_ago(2)));
    let client = FakeMailServer::initialized_client(&server).await;

    let page = client
        .list_messages(&ListOptions::default().with_limit(2))
        .await
        .unwrap();

    let ids: Vec<&str> = page.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec![newest.as_str(), middle.as_str()]);
    assert_eq!(page.total, 3);

    assert_eq!(server.request_count(), 1);
    assert_eq!(last_request_methods(&server), vec!["Email/query", "Email/get"]);
    let get_args = &server.requests()[0]["methodCalls"][1][1];
    assert_eq!(get_args["#ids"]["path"], "/ids");

    let rest = client
        .list_messages(&ListOptions::default().with_limit(2).with_position(2))
        .await
        .unwrap();
    assert_eq!(rest.messages.len(), 1);
    assert_eq!(rest.messages[0].id, oldest);
}

#[tokio::test]
async fn test_list_messages_filters_by_mailbox_and_unread() {
    let server = server();
    let archive = server.mailbox_id(role::ARCHIVE).unwrap();
    server.insert(EmailFixture::new("a@example.com", "Inbox unread"));
    server.insert(EmailFixture::new("a@example.com", "Inbox read").seen());
    let archived = server.insert(EmailFixture::new("a@example.com", "Archived").in_role(role::ARCHIVE));
    let client = FakeMailServer::initialized_client(&server).await;

    let page = client
        .list_messages(&ListOptions::in_mailbox(archive))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.messages[0].id, archived);

    let unread = MessageFilter {
        is_unread: Some(true),
        ..Default::default()
    };
    let page = client
        .list_messages(&ListOptions::default().with_filter(unread))
        .await
        .unwrap();
    let subjects: Vec<&str> = page.messages.iter().map(|m| m.subject_or_empty()).collect();
    assert_eq!(page.total, 2);
    assert!(!subjects.contains(&"Inbox read"));
}

#[tokio::test]
async fn test_list_views_truncate_bodies_but_detail_does_not() {
    let server = server();
    let body = "lorem ipsum ".repeat(100);
    let id = server.insert(EmailFixture::new("a@example.com", "Long").body(&body));
    let client = FakeMailServer::initialized_client(&server).await;

    let page = client.list_messages(&ListOptions::default()).await.unwrap();
    let listed = page.messages[0].text_content().unwrap();
    assert!(listed.len() <= 256);
    assert!(page.messages[0].body_values.values().all(|v| v.is_truncated));

    let detail = client.get_message(&id).await.unwrap().unwrap();
    assert_eq!(detail.text_content().unwrap(), body);
}

#[tokio::test]
async fn test_get_missing_message_is_none() {
    let server = server();
    let client = FakeMailServer::initialized_client(&server).await;

    assert!(client.get_message("M-404").await.unwrap().is_none());
}

#[tokio::test]
async fn test_send_then_get_round_trip() {
    let server = server();
    let client = FakeMailServer::initialized_client(&server).await;

    let options = SendOptions {
        to: vec![EmailAddress::new("bob@example.com").with_name("Bob")],
        cc: vec![EmailAddress::new("carol@example.com")],
        bcc: vec![EmailAddress::new("BOB@example.com"), EmailAddress::new("dave@example.com")],
        subject: "Quarterly numbers".to_string(),
        text_body: Some("See attached.".to_string()),
        ..Default::default()
    };
    let sent = client.send_message(&options).await.unwrap();
    assert!(sent.sent_at.is_some());

    // Draft creation and submission travel together
    assert_eq!(
        last_request_methods(&server),
        vec!["Email/set", "EmailSubmission/set"]
    );

    let message = client.get_message(&sent.id).await.unwrap().unwrap();
    assert_eq!(message.subject_or_empty(), "Quarterly numbers");
    assert_eq!(message.to, options.to);
    assert_eq!(message.cc, options.cc);
    assert_eq!(message.sender().unwrap().email, ACCOUNT_EMAIL);

    let sent_box = server.mailbox_id(role::SENT).unwrap();
    assert_eq!(message.mailbox_id_list(), vec![sent_box.as_str()]);
    assert!(!message.has_keyword(keyword::DRAFT));

    let submissions = server.submissions();
    assert_eq!(submissions.len(), 1);
    let rcpt: Vec<&str> = submissions[0]["envelope"]["rcptTo"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["email"].as_str().unwrap())
        .collect();
    assert_eq!(rcpt, vec!["bob@example.com", "carol@example.com", "dave@example.com"]);
}

#[tokio::test]
async fn test_send_without_sent_mailbox_destroys_draft() {
    let server = server();
    server.remove_mailbox(role::SENT);
    let client = FakeMailServer::initialized_client(&server).await;

    let sent = client
        .send_message(&send_options("bob@example.com", "No sent folder"))
        .await
        .unwrap();

    assert!(client.get_message(&sent.id).await.unwrap().is_none());
    assert_eq!(server.email_count(), 0);
    assert_eq!(server.submissions().len(), 1);
}

#[tokio::test]
async fn test_failed_submission_leaves_no_draft() {
    let server = server();
    server.reject_submissions();
    let client = FakeMailServer::initialized_client(&server).await;

    let err = client
        .send_message(&send_options("bob@example.com", "Blocked"))
        .await
        .unwrap_err();

    match err {
        JmapError::Send(message) => assert!(message.contains("forbiddenToSend"), "{message}"),
        other => panic!("expected Send error, got {other:?}"),
    }
    assert_eq!(server.email_count(), 0);
}

#[tokio::test]
async fn test_send_validates_before_any_request() {
    let server = server();
    let client = FakeMailServer::initialized_client(&server).await;

    let no_recipients = SendOptions {
        subject: "x".to_string(),
        text_body: Some("body".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        client.send_message(&no_recipients).await,
        Err(JmapError::InvalidInput(_))
    ));

    let no_body = SendOptions {
        text_body: None,
        ..send_options("bob@example.com", "x")
    };
    assert!(matches!(
        client.send_message(&no_body).await,
        Err(JmapError::InvalidInput(_))
    ));

    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn test_send_requires_drafts_mailbox_and_known_identity() {
    let server = server();
    let client = FakeMailServer::initialized_client(&server).await;

    let stranger = SendOptions {
        from: Some("someone-else@example.com".to_string()),
        ..send_options("bob@example.com", "x")
    };
    assert!(matches!(
        client.send_message(&stranger).await,
        Err(JmapError::IdentityNotFound(_))
    ));

    let case_insensitive = SendOptions {
        from: Some("ME@EXAMPLE.COM".to_string()),
        ..send_options("bob@example.com", "x")
    };
    assert!(client.send_message(&case_insensitive).await.is_ok());

    server.remove_mailbox(role::DRAFTS);
    assert!(matches!(
        client.send_message(&send_options("bob@example.com", "x")).await,
        Err(JmapError::MailboxNotFound(_))
    ));
}

#[tokio::test]
async fn test_mark_read_is_idempotent() {
    let server = server();
    let id = server.insert(EmailFixture::new("a@example.com", "Unread"));
    let client = FakeMailServer::initialized_client(&server).await;

    client.update_read_state(&id, true).await.unwrap();
    client.update_read_state(&id, true).await.unwrap();
    assert!(server.email(&id).unwrap().is_seen());

    client.update_read_state(&id, false).await.unwrap();
    assert!(!server.email(&id).unwrap().is_seen());
}

#[tokio::test]
async fn test_updates_on_unknown_message_are_not_found() {
    let server = server();
    let archive = server.mailbox_id(role::ARCHIVE).unwrap();
    let client = FakeMailServer::initialized_client(&server).await;

    assert!(matches!(
        client.update_read_state("M-404", true).await,
        Err(JmapError::NotFound(_))
    ));
    assert!(matches!(
        client.move_message("M-404", &archive).await,
        Err(JmapError::NotFound(_))
    ));
    assert!(matches!(
        client.delete_message("M-404").await,
        Err(JmapError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_move_replaces_mailbox_membership() {
    let server = server();
    let projects = server.add_mailbox("Projects");
    let archive = server.mailbox_id(role::ARCHIVE).unwrap();
    let id = server.insert(EmailFixture::new("a@example.com", "Filed twice").in_role(role::INBOX).in_mailbox(&projects));
    let client = FakeMailServer::initialized_client(&server).await;

    client.move_message(&id, &archive).await.unwrap();
    assert_eq!(server.email(&id).unwrap().mailbox_id_list(), vec![archive.as_str()]);

    assert!(client.move_message(&id, "mb-missing").await.is_err());
    assert!(matches!(
        client.move_message(&id, "").await,
        Err(JmapError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_batch_delete_isolates_unknown_id() {
    let server = server();
    let first = server.insert(EmailFixture::new("a@example.com", "One"));
    let second = server.insert(EmailFixture::new("a@example.com", "Two"));
    let third = server.insert(EmailFixture::new("a@example.com", "Three"));
    let client = FakeMailServer::initialized_client(&server).await;

    let ids = vec![first.clone(), "M-404".to_string(), second.clone(), third.clone()];
    let result = client.delete_messages(&ids).await.unwrap();

    assert_eq!(result.succeeded, vec![first, second, third]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].id, "M-404");
    assert!(!result.failed[0].error.is_empty());
    assert!(!result.is_complete_success());
    assert_eq!(server.email_count(), 0);
}

#[tokio::test]
async fn test_batch_mark_and_move() {
    let server = server();
    let archive = server.mailbox_id(role::ARCHIVE).unwrap();
    let ids: Vec<String> = (0..6)
        .map(|i| server.insert(EmailFixture::new("a@example.com", &format!("Bulk {i}"))))
        .collect();
    let client = FakeMailServer::initialized_client(&server).await;

    let marked = client.update_read_states(&ids, true).await.unwrap();
    assert!(marked.is_complete_success());
    assert_eq!(marked.succeeded, ids);
    assert!(server.emails().iter().all(|e| e.is_seen()));

    let moved = client.move_messages(&ids[..3], &archive).await.unwrap();
    assert_eq!(moved.succeeded.len(), 3);
    assert_eq!(
        server.emails().iter().filter(|e| e.in_mailbox(&archive)).count(),
        3
    );
}

#[tokio::test]
async fn test_advanced_search_flags_truncated_results() {
    let server = server();
    for i in 0..15 {
        server.insert(
            EmailFixture::new("reports@example.com", &format!("Weekly report {i}"))
                .received_at(hours_ago(i + 1)),
        );
    }
    for i in 0..3 {
        server.insert(EmailFixture::new("friend@example.com", &format!("Dinner {i}")));
    }
    let client = FakeMailServer::initialized_client(&server).await;

    let filter = AdvancedFilter {
        subject: Some("report".to_string()),
        ..Default::default()
    };

    let first = client.advanced_search(&filter, &[], 0, 10).await.unwrap();
    assert_eq!(first.messages.len(), 10);
    assert_eq!(first.total, 15);
    assert!(first.has_more_results);
    assert_eq!(first.messages[0].subject_or_empty(), "Weekly report 0");

    let second = client.advanced_search(&filter, &[], 10, 10).await.unwrap();
    assert_eq!(second.messages.len(), 5);
    assert_eq!(second.position, 10);
    assert!(!second.has_more_results);
}

#[tokio::test]
async fn test_advanced_search_keyword_sugar_and_sort() {
    let server = server();
    let small = server.insert(EmailFixture::new("a@example.com", "Small").flagged().size(100));
    let large = server.insert(EmailFixture::new("a@example.com", "Large").flagged().size(9000));
    server.insert(EmailFixture::new("a@example.com", "Read").flagged().seen());
    server.insert(EmailFixture::new("a@example.com", "Plain"));
    let client = FakeMailServer::initialized_client(&server).await;

    let filter = AdvancedFilter {
        is_flagged: Some(true),
        is_unread: Some(true),
        ..Default::default()
    };
    let page = client
        .advanced_search(&filter, &[SortSpec::ascending(SortField::Size)], 0, 50)
        .await
        .unwrap();

    let ids: Vec<&str> = page.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec![small.as_str(), large.as_str()]);
    assert!(!page.has_more_results);

    let contradictory = AdvancedFilter {
        has_keyword: Some(keyword::SEEN.to_string()),
        is_unread: Some(true),
        ..Default::default()
    };
    assert!(matches!(
        client.advanced_search(&contradictory, &[], 0, 10).await,
        Err(JmapError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_search_by_text_matches_body() {
    let server = server();
    let id = server.insert(EmailFixture::new("billing@example.com", "Monthly").body("Your invoice is ready"));
    server.insert(EmailFixture::new("friend@example.com", "Weekend").body("Hiking?"));
    let client = FakeMailServer::initialized_client(&server).await;

    let page = client.search_by_text("INVOICE", 10).await.unwrap();
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].id, id);

    assert!(matches!(
        client.search_by_text("   ", 10).await,
        Err(JmapError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_reads_retry_transient_failures() {
    let server = server();
    let client = FakeMailServer::initialized_client(&server).await;

    server.fail_next_requests(2);
    let mailboxes = client.list_mailboxes().await.unwrap();
    assert_eq!(mailboxes.len(), 5);
    assert_eq!(server.request_count(), 3);

    server.fail_next_requests(3);
    let err = client.list_mailboxes().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(server.request_count(), 6);
}

#[tokio::test]
async fn test_mutations_are_not_retried() {
    let server = server();
    let id = server.insert(EmailFixture::new("a@example.com", "Once"));
    let client = FakeMailServer::initialized_client(&server).await;

    server.fail_next_requests(1);
    let err = client.update_read_state(&id, true).await.unwrap_err();
    assert!(matches!(err, JmapError::Transport { .. }));
    assert_eq!(server.request_count(), 1);
    assert!(!server.email(&id).unwrap().is_seen());

    client.update_read_state(&id, true).await.unwrap();
    assert!(server.email(&id).unwrap().is_seen());
}

#[tokio::test]
async fn test_get_thread_returns_conversation_in_order() {
    let server = server();
    let first = server.insert(EmailFixture::new("a@example.com", "Plan").in_thread("T-plan").received_at(hours_ago(5)));
    let third = server.insert(EmailFixture::outgoing("a@example.com", "Re: Plan").in_thread("T-plan").received_at(hours_ago(1)));
    let second = server.insert(EmailFixture::new("a@example.com", "Re: Plan").in_thread("T-plan").received_at(hours_ago(3)));
    server.insert(EmailFixture::new("b@example.com", "Other"));
    let client = FakeMailServer::initialized_client(&server).await;

    let thread = client.get_thread("T-plan").await.unwrap();
    let ids: Vec<&str> = thread.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec![first.as_str(), second.as_str(), third.as_str()]);

    assert_eq!(last_request_methods(&server), vec!["Thread/get", "Email/get"]);
    let requests = server.requests();
    let get_args = &requests.last().unwrap()["methodCalls"][1][1];
    assert_eq!(get_args["#ids"]["path"], "/list/*/emailIds");

    assert!(matches!(
        client.get_thread("T-missing").await,
        Err(JmapError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_mailbox_lookup_and_stats() {
    let server = server();
    let inbox = server.mailbox_id(role::INBOX).unwrap();
    server.insert(EmailFixture::new("a@example.com", "One"));
    server.insert(EmailFixture::new("a@example.com", "Two"));
    server.insert(EmailFixture::new("a@example.com", "Three").seen());
    let client = FakeMailServer::initialized_client(&server).await;

    let found = client.find_mailbox_by_role(role::INBOX).await.unwrap();
    assert_eq!(found.id, inbox);
    assert!(matches!(
        client.find_mailbox_by_role(role::JUNK).await,
        Err(JmapError::MailboxNotFound(_))
    ));

    let stats = client.get_mailbox_stats(Some(&inbox)).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total_emails, 3);
    assert_eq!(stats[0].unread_emails, 2);

    let all = client.get_mailbox_stats(None).await.unwrap();
    assert_eq!(all.len(), 5);

    assert!(matches!(
        client.get_mailbox_stats(Some("mb-missing")).await,
        Err(JmapError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_identities_and_attachment_urls() {
    let server = server();
    let id = server.insert(EmailFixture::new("a@example.com", "Report").with_attachment());
    let client = FakeMailServer::initialized_client(&server).await;

    let identities = client.list_identities().await.unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].email, ACCOUNT_EMAIL);

    let message = client.get_message(&id).await.unwrap().unwrap();
    let attachments = message.attachment_descriptors();
    assert_eq!(attachments.len(), 1);

    let blob = attachments[0].blob_id.as_deref().unwrap();
    let url = client
        .attachment_download_url(blob, "Q3 report.pdf", "application/pdf")
        .unwrap();
    assert!(url.contains(blob));
    assert!(url.contains("Q3%20report.pdf"));
    assert!(!url.contains('{'));
}

#[tokio::test]
async fn test_method_errors_surface_with_type() {
    let server = server();
    server.fail_method("Mailbox/get");
    let client = FakeMailServer::initialized_client(&server).await;

    match client.list_mailboxes().await {
        Err(JmapError::Method { method, error_type, .. }) => {
            assert_eq!(method, "Mailbox/get");
            assert_eq!(error_type, "serverFail");
        }
        other => panic!("expected method error, got {other:?}"),
    }
}
