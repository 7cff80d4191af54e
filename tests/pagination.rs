//! Cursor pagination against the in-memory backend: boundary semantics,
//! exhaustion, error reporting, upstream deletions.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::json;

use chat_ui_core::{Chat, CursorPaginator, Message, PaginationToken, TableQuery};
use common::{MockBackend, chat_row, message_row};

fn seeded_backend() -> Arc<MockBackend> {
    let backend = Arc::new(MockBackend::new());
    backend.seed(
        "messages",
        vec![
            message_row(1, 7, "peer", "oldest", "2023-12-31T08:00:00+00:00", true),
            message_row(2, 7, "me", "second", "2024-01-01T09:00:00+00:00", true),
            message_row(3, 7, "peer", "third", "2024-01-01T10:00:00+00:00", true),
            message_row(4, 7, "me", "fourth", "2024-01-02T11:00:00+00:00", false),
            message_row(5, 7, "peer", "newest", "2024-01-02T12:00:00+00:00", false),
            // Noise from another conversation.
            message_row(6, 8, "peer", "elsewhere", "2024-01-02T13:00:00+00:00", false),
        ],
    );
    backend
}

fn message_paginator(backend: &Arc<MockBackend>, page_size: usize) -> CursorPaginator<Message> {
    CursorPaginator::<Message>::new(backend.clone(), "messages", "id", page_size)
        .with_filter("chat_id", 7)
}

#[tokio::test]
async fn pages_walk_backward_until_exhausted() {
    let backend = seeded_backend();
    let mut paginator = message_paginator(&backend, 2);
    assert!(paginator.cursor().is_none());

    let first: Vec<i64> = paginator.next_page().await.unwrap().unwrap()
        .iter().map(|m| m.id).collect();
    assert_eq!(first, [5, 4]);
    assert_eq!(paginator.cursor(), Some(&PaginationToken::Id(4)));
    assert!(!paginator.is_exhausted());

    let second: Vec<i64> = paginator.next_page().await.unwrap().unwrap()
        .iter().map(|m| m.id).collect();
    assert_eq!(second, [3, 2]);

    // The last page is short, which already marks the end of history.
    let third: Vec<i64> = paginator.next_page().await.unwrap().unwrap()
        .iter().map(|m| m.id).collect();
    assert_eq!(third, [1]);
    assert!(paginator.is_exhausted());

    // Further requests are no-ops.
    assert!(paginator.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn an_exactly_full_last_page_exhausts_on_the_next_empty_one() {
    let backend = seeded_backend();
    let mut paginator = message_paginator(&backend, 5);
    let page = paginator.next_page().await.unwrap().unwrap();
    assert_eq!(page.len(), 5);
    assert!(!paginator.is_exhausted());

    assert!(paginator.next_page().await.unwrap().is_none());
    assert!(paginator.is_exhausted());
}

#[tokio::test]
async fn a_deleted_boundary_row_does_not_break_paging() {
    let backend = seeded_backend();
    let mut paginator = message_paginator(&backend, 2);
    paginator.next_page().await.unwrap().unwrap();
    assert_eq!(paginator.cursor(), Some(&PaginationToken::Id(4)));

    // The boundary row vanishes upstream between the two requests. The bound
    // is relational, so the next page is still correct.
    backend
        .delete("messages", vec![("id".to_owned(), json!(4))])
        .await
        .unwrap();
    let next: Vec<i64> = paginator.next_page().await.unwrap().unwrap()
        .iter().map(|m| m.id).collect();
    assert_eq!(next, [3, 2]);
}

#[tokio::test]
async fn a_failed_page_leaves_the_cursor_for_a_retry() {
    let backend = seeded_backend();
    let mut paginator = message_paginator(&backend, 2);
    paginator.next_page().await.unwrap().unwrap();
    let cursor_before = paginator.cursor().cloned();

    backend.fail_next_select.store(true, Ordering::SeqCst);
    let err = paginator.next_page().await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(paginator.cursor().cloned(), cursor_before);
    assert!(!paginator.is_exhausted());

    // Re-invoking with the same boundary serves the same page.
    let retried: Vec<i64> = paginator.next_page().await.unwrap().unwrap()
        .iter().map(|m| m.id).collect();
    assert_eq!(retried, [3, 2]);
}

#[tokio::test]
async fn reset_starts_over_from_the_newest_page() {
    let backend = seeded_backend();
    let mut paginator = message_paginator(&backend, 2);
    paginator.next_page().await.unwrap().unwrap();
    paginator.next_page().await.unwrap().unwrap();

    paginator.reset();
    assert!(paginator.cursor().is_none());
    let first_again: Vec<i64> = paginator.next_page().await.unwrap().unwrap()
        .iter().map(|m| m.id).collect();
    assert_eq!(first_again, [5, 4]);
}

#[tokio::test]
async fn the_chat_list_pages_on_the_activity_timestamp() {
    let backend = Arc::new(MockBackend::new());
    backend.seed(
        "inbox",
        vec![
            chat_row(11, "me", "a", "Alice", "2024-01-01T08:00:00+00:00"),
            chat_row(12, "me", "b", "Bob", "2024-01-03T08:00:00+00:00"),
            chat_row(13, "me", "c", "Carol", "2024-01-02T08:00:00+00:00"),
        ],
    );
    let mut paginator = CursorPaginator::<Chat>::new(backend.clone(), "inbox", "updated_at", 2);

    let first: Vec<i64> = paginator.next_page().await.unwrap().unwrap()
        .iter().map(|c| c.id).collect();
    // Most recent activity first, regardless of row ids.
    assert_eq!(first, [12, 13]);
    assert_eq!(
        paginator.cursor(),
        Some(&PaginationToken::Timestamp(
            "2024-01-02T08:00:00+00:00".to_owned()
        ))
    );

    let second: Vec<i64> = paginator.next_page().await.unwrap().unwrap()
        .iter().map(|c| c.id).collect();
    assert_eq!(second, [11]);
    assert!(paginator.is_exhausted());
}
