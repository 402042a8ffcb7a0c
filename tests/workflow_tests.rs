mod mocks;

use calendar_digest::components::google_calendar::{CalendarEvent, UNTITLED_EVENT};
use calendar_digest::components::similarity_store::SearchScope;
use calendar_digest::components::{SummaryWorkflow, WorkflowOptions};
use calendar_digest::error::Error;
use mocks::{
    provider_event, standup_and_review, MockCalendar, MockModel, MockSimilarityStore, GOOD_CODE,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct Harness {
    calendar: Arc<MockCalendar>,
    model: Arc<MockModel>,
    store: Arc<MockSimilarityStore>,
    workflow: SummaryWorkflow,
}

fn harness(calendar: MockCalendar, model: MockModel, store: MockSimilarityStore) -> Harness {
    let calendar = Arc::new(calendar);
    let model = Arc::new(model);
    let store = Arc::new(store);
    let workflow = SummaryWorkflow::new(
        calendar.clone(),
        model.clone(),
        store.clone(),
        WorkflowOptions::default(),
    );
    Harness {
        calendar,
        model,
        store,
        workflow,
    }
}

fn default_harness() -> Harness {
    harness(
        MockCalendar::new(standup_and_review()),
        MockModel::new(),
        MockSimilarityStore::new(),
    )
}

#[tokio::test]
async fn callback_to_search_end_to_end() {
    let h = default_harness();

    let completed = h.workflow.complete_authorization(GOOD_CODE).await.unwrap();
    let titles: Vec<&str> = completed
        .digest
        .events
        .iter()
        .map(|e| e.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Standup", "Review"]);
    assert!(!completed.digest.summary.is_empty());
    // One holistic completion for the whole calendar
    assert_eq!(h.model.completions.load(Ordering::SeqCst), 1);

    let report = h
        .workflow
        .store_all_event_summaries("user-1", &completed.digest.events)
        .await;
    assert_eq!(report.stored, 2);
    assert!(report.failed.is_empty());
    assert_eq!(h.store.len().await, 2);

    let matches = h
        .workflow
        .search_similar_events(&SearchScope::Global, "Standup in brief", None, None)
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].event_title, "Standup");
    assert_eq!(matches[0].summary, "Standup in brief");
    assert!(matches[0].similarity > 0.99);
}

#[tokio::test]
async fn overview_prompt_lists_every_event() {
    let h = default_harness();
    h.workflow.complete_authorization(GOOD_CODE).await.unwrap();

    let prompts = h.model.prompts.lock().await;
    let user_prompt = &prompts[0][1].content;
    assert!(user_prompt.contains("Standup"));
    assert!(user_prompt.contains("Daily sync"));
    assert!(user_prompt.contains("Review"));
    assert!(user_prompt.contains("(none)"));
}

#[tokio::test]
async fn failed_code_exchange_skips_summarization() {
    let h = default_harness();

    let err = h.workflow.complete_authorization("bad-code").await.unwrap_err();
    assert!(matches!(err, Error::AuthExchange { .. }));
    assert_eq!(h.calendar.listings.load(Ordering::SeqCst), 0);
    assert_eq!(h.model.completions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn overview_failure_yields_no_digest() {
    let h = harness(
        MockCalendar::new(standup_and_review()),
        MockModel::failing_completions_on("upcoming events"),
        MockSimilarityStore::new(),
    );

    let err = h.workflow.complete_authorization(GOOD_CODE).await.unwrap_err();
    assert!(matches!(err, Error::SummaryGeneration { .. }));
    assert_eq!(h.calendar.listings.load(Ordering::SeqCst), 1);
    assert_eq!(h.model.completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_calendar_still_gets_a_summary() {
    let h = harness(
        MockCalendar::new(Vec::new()),
        MockModel::new(),
        MockSimilarityStore::new(),
    );

    let completed = h.workflow.complete_authorization(GOOD_CODE).await.unwrap();
    assert!(completed.digest.events.is_empty());
    assert!(!completed.digest.summary.is_empty());
    assert_eq!(h.model.completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn untitled_events_get_placeholder_and_max_events_applies() {
    let events = vec![
        provider_event(None, None, "2030-01-07T09:00:00Z"),
        provider_event(Some("Two"), None, "2030-01-07T10:00:00Z"),
        provider_event(Some("Three"), None, "2030-01-07T11:00:00Z"),
        provider_event(Some("Four"), None, "2030-01-07T12:00:00Z"),
        provider_event(Some("Five"), None, "2030-01-07T13:00:00Z"),
        provider_event(Some("Six"), None, "2030-01-07T14:00:00Z"),
    ];
    let h = harness(
        MockCalendar::new(events),
        MockModel::new(),
        MockSimilarityStore::new(),
    );

    let completed = h.workflow.complete_authorization(GOOD_CODE).await.unwrap();
    assert_eq!(completed.digest.events.len(), 5);
    assert_eq!(completed.digest.events[0].title, UNTITLED_EVENT);
    assert_eq!(completed.digest.events[4].title, "Five");
}

#[tokio::test]
async fn regenerate_event_summary_uses_single_event_prompt() {
    let h = default_harness();
    let event = CalendarEvent::new("Standup", "", "2030-01-07T09:00:00Z");

    let summary = h.workflow.regenerate_event_summary(&event).await.unwrap();
    assert_eq!(summary, "Standup in brief");

    let prompts = h.model.prompts.lock().await;
    assert!(prompts[0][1].content.contains("Description: (none)"));
}

#[tokio::test]
async fn embedding_failure_writes_nothing() {
    let h = harness(
        MockCalendar::new(standup_and_review()),
        MockModel::failing_embeddings(),
        MockSimilarityStore::new(),
    );
    let event = CalendarEvent::new("Standup", "Daily sync", "2030-01-07T09:00:00Z");

    let err = h
        .workflow
        .store_event_summary("user-1", &event, "Standup in brief")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Embedding { .. }));
    assert_eq!(h.store.len().await, 0);
}

#[tokio::test]
async fn store_failure_is_surfaced() {
    let h = harness(
        MockCalendar::new(Vec::new()),
        MockModel::new(),
        MockSimilarityStore::failing_appends(),
    );
    let event = CalendarEvent::new("Standup", "", "2030-01-07T09:00:00Z");

    let err = h
        .workflow
        .store_event_summary("user-1", &event, "Standup in brief")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage { .. }));
    assert!(!err.is_transient());
    assert_eq!(h.model.embeddings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stored_event_rows_keep_their_titles() {
    let h = default_harness();
    let standup = CalendarEvent::new("Standup", "", "2030-01-07T09:00:00Z");
    let review = CalendarEvent::new("Review", "Code review", "2030-01-08T15:00:00Z");

    h.workflow
        .store_event_summary("user-1", &standup, "Standup in brief")
        .await
        .unwrap();
    h.workflow
        .store_event_summary("user-1", &review, "Review in brief")
        .await
        .unwrap();

    let rows = h.store.rows.lock().await;
    let titles: Vec<&str> = rows.iter().map(|r| r.event_title.as_str()).collect();
    assert_eq!(titles, vec!["Standup", "Review"]);
    assert_eq!(rows[0].event_description, "");
    assert_eq!(rows[1].event_description, "Code review");
}

#[tokio::test]
async fn stored_record_embeds_the_summary() {
    let h = default_harness();
    let event = CalendarEvent::new("Standup", "Daily sync", "2030-01-07T09:00:00Z");

    h.workflow
        .store_event_summary("user-1", &event, "Standup in brief")
        .await
        .unwrap();

    let rows = h.store.rows.lock().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, "user-1");
    assert_eq!(rows[0].event_description, "Daily sync");
    assert_eq!(rows[0].embedding, mocks::embed_words("Standup in brief"));
}

#[tokio::test]
async fn store_rejects_blank_input() {
    let h = default_harness();
    let event = CalendarEvent::new("Standup", "", "2030-01-07T09:00:00Z");

    let err = h
        .workflow
        .store_event_summary("", &event, "summary")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = h
        .workflow
        .store_event_summary("user-1", &event, "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(h.model.embeddings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bulk_store_isolates_failures() {
    let h = harness(
        MockCalendar::new(Vec::new()),
        MockModel::failing_completions_on("Broken"),
        MockSimilarityStore::new(),
    );
    let events = vec![
        CalendarEvent::new("Standup", "", "2030-01-07T09:00:00Z"),
        CalendarEvent::new("Broken", "", "2030-01-07T10:00:00Z"),
        CalendarEvent::new("Review", "", "2030-01-07T11:00:00Z"),
    ];

    let report = h.workflow.store_all_event_summaries("user-1", &events).await;
    assert_eq!(report.stored, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].title, "Broken");
    assert_eq!(h.store.len().await, 2);
}

#[tokio::test]
async fn search_collapses_duplicate_titles() {
    let h = default_harness();
    let event = CalendarEvent::new("Standup", "", "2030-01-07T09:00:00Z");
    h.workflow
        .store_event_summary("user-1", &event, "daily standup sync")
        .await
        .unwrap();
    h.workflow
        .store_event_summary("user-1", &event, "daily standup sync notes")
        .await
        .unwrap();

    let matches = h
        .workflow
        .search_similar_events(&SearchScope::Global, "daily standup sync", Some(0.5), None)
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].summary, "daily standup sync");
}

#[tokio::test]
async fn search_respects_user_scope() {
    let h = default_harness();
    let event = CalendarEvent::new("Standup", "", "2030-01-07T09:00:00Z");
    h.workflow
        .store_event_summary("user-1", &event, "daily standup sync")
        .await
        .unwrap();

    let own = h
        .workflow
        .search_similar_events(
            &SearchScope::from_user_id(Some("user-1")),
            "daily standup sync",
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(own.len(), 1);

    let other = h
        .workflow
        .search_similar_events(
            &SearchScope::from_user_id(Some("user-2")),
            "daily standup sync",
            None,
            None,
        )
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn search_validates_arguments() {
    let h = default_harness();

    let err = h
        .workflow
        .search_similar_events(&SearchScope::Global, " ", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = h
        .workflow
        .search_similar_events(&SearchScope::Global, "standup", Some(1.5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let none = h
        .workflow
        .search_similar_events(&SearchScope::Global, "standup", None, Some(0))
        .await
        .unwrap();
    assert!(none.is_empty());
    assert_eq!(h.model.embeddings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn search_failure_is_surfaced() {
    let h = harness(
        MockCalendar::new(Vec::new()),
        MockModel::new(),
        MockSimilarityStore::failing_queries(),
    );

    let err = h
        .workflow
        .search_similar_events(&SearchScope::Global, "standup", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Search { .. }));
}

#[tokio::test]
async fn refresh_digest_refreshes_expired_credentials_only() {
    let h = default_harness();

    let fresh = MockCalendar::credential(chrono::Utc::now().timestamp() + 3600);
    let completed = h.workflow.refresh_digest(&fresh).await.unwrap();
    assert_eq!(completed.credential, fresh);
    assert_eq!(h.calendar.refreshes.load(Ordering::SeqCst), 0);

    let expired = MockCalendar::credential(0);
    let completed = h.workflow.refresh_digest(&expired).await.unwrap();
    assert_eq!(completed.credential.access_token, "fresh-access-token");
    assert_eq!(h.calendar.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(completed.digest.events.len(), 2);
}
