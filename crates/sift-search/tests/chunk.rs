mod common;
use common::*;

use serde_json::json;
use sift_search::{Chunk, Operation, SearchError};

#[test]
fn empty_result_never_calls_back() {
    let (mut b, transport) = builder(vec![scroll_page("s1", 0, &[])]);

    let mut calls = 0;
    let outcome = b
        .index(INDEX)
        .chunk(|_| {
            calls += 1;
            Chunk::Continue
        })
        .unwrap();

    assert_eq!(outcome, Chunk::Continue);
    assert_eq!(calls, 0);
    assert_eq!(transport.calls().len(), 1);
}

#[test]
fn first_request_opens_scroll_with_defaults() {
    let (mut b, transport) = builder(vec![scroll_page("s1", 0, &[])]);
    b.index(INDEX).chunk(|_| Chunk::Continue).unwrap();

    let (op, request) = transport.call(0);
    assert_eq!(op, Operation::Search);
    assert_eq!(request.scroll.as_deref(), Some("10m"));
    assert_eq!(body(&request)["size"], json!(2000));
}

#[test]
fn scrolls_until_pages_run_out() {
    let (mut b, transport) = builder(vec![
        scroll_page("s1", 5, &["1", "2"]),
        scroll_page("s2", 5, &["3", "4"]),
        scroll_page("s3", 5, &["5"]),
    ]);

    let mut seen = Vec::new();
    let outcome = b
        .index(INDEX)
        .chunk_with(2, "1m", |records| {
            seen.extend(records.iter().map(|r| r.id().unwrap().to_string()));
            Chunk::Continue
        })
        .unwrap();

    assert_eq!(outcome, Chunk::Continue);
    assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].1.scroll.as_deref(), Some("1m"));
    assert_eq!(calls[1].0, Operation::Scroll);
    assert_eq!(calls[1].1.scroll_id.as_deref(), Some("s1"));
    assert_eq!(calls[2].1.scroll_id.as_deref(), Some("s2"));
    assert_eq!(calls[2].1.scroll.as_deref(), Some("1m"));
}

#[test]
fn empty_page_ends_scroll_early() {
    let (mut b, transport) = builder(vec![
        scroll_page("s1", 4, &["1", "2"]),
        scroll_page("s1", 4, &["3", "4"]),
        scroll_page("s1", 4, &[]),
    ]);

    let mut pages = 0;
    b.index(INDEX)
        .chunk_with(2, "1m", |_| {
            pages += 1;
            Chunk::Continue
        })
        .unwrap();

    assert_eq!(pages, 2);
    assert_eq!(transport.calls().len(), 3);
}

#[test]
fn stop_halts_without_further_requests() {
    let (mut b, transport) = builder(vec![
        scroll_page("s1", 6, &["1", "2"]),
        scroll_page("s2", 6, &["3", "4"]),
    ]);

    let outcome = b
        .index(INDEX)
        .chunk_with(2, "1m", |_| Chunk::Stop)
        .unwrap();

    assert_eq!(outcome, Chunk::Stop);
    assert_eq!(transport.calls().len(), 1);
}

#[test]
fn missing_scroll_id_is_unexpected() {
    let (mut b, _) = builder(vec![hits(4, &["1", "2"])]);
    let err = b
        .index(INDEX)
        .chunk_with(2, "1m", |_| Chunk::Continue)
        .unwrap_err();
    assert!(matches!(err, SearchError::UnexpectedResponse(_)));
}
