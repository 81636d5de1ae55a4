mod common;
use common::*;

use bson::{Document, doc};
use flint_client::{BoxError, Error};
use flint_query::{Limit, Pagination};

fn collect_into(out: &mut Vec<Document>) -> impl FnMut(&Document) -> Result<(), BoxError> + '_ {
    move |d: &Document| {
        out.push(d.clone());
        Ok(())
    }
}

// ── Simple listing ──────────────────────────────────────────────

#[test]
fn list_streams_every_match() {
    let (driver, client) = seeded(10);
    let mut out = Vec::new();
    client
        .query()
        .where_eq("status", "active")
        .list(collect_into(&mut out))
        .unwrap();

    assert_eq!(out.len(), 5);
    assert!(out.iter().all(|d| d.get_str("status").unwrap() == "active"));
    assert_eq!(driver.open_cursors(), 0);
}

#[test]
fn list_applies_projection_and_sort() {
    let (_driver, client) = seeded(5);
    let mut out = Vec::new();
    client
        .query()
        .select(["name"])
        .with_sort("score", "DESC")
        .list(collect_into(&mut out))
        .unwrap();

    assert_eq!(names(&out), ["acct-005", "acct-004", "acct-003", "acct-002", "acct-001"]);
    assert!(out[0].get("score").is_none());
    assert!(out[0].get("_id").is_some());
}

#[test]
fn negations_do_not_narrow_the_filter() {
    let (_driver, client) = seeded(6);
    let mut out = Vec::new();
    client
        .query()
        .not("status", "active")
        .list(collect_into(&mut out))
        .unwrap();
    assert_eq!(out.len(), 6);
}

#[test]
fn in_and_or_buckets_combine() {
    let (_driver, client) = seeded(10);
    let mut out = Vec::new();
    client
        .query()
        .where_gte("score", 3)
        .or_where_eq("status", "active")
        .or_where_eq("name", "acct-009")
        .in_where("name", vec!["acct-004", "acct-009", "acct-001"])
        .list(collect_into(&mut out))
        .unwrap();
    assert_eq!(names(&out), ["acct-004", "acct-009"]);
}

#[test]
fn callback_failure_aborts_and_releases_the_cursor() {
    let (driver, client) = seeded(10);
    let mut seen = 0;
    let err = client
        .query()
        .list(|_| {
            seen += 1;
            if seen == 3 {
                return Err("stop here".into());
            }
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, Error::Stream(_)));
    assert_eq!(seen, 3);
    assert_eq!(driver.open_cursors(), 0);
}

// ── Offset pagination ───────────────────────────────────────────

#[test]
fn second_page_of_three() {
    let (_driver, client) = seeded(45);
    let mut out = Vec::new();
    let pagination = client
        .query()
        .with_sort("score", "asc")
        .with_limit(Limit::new(2, 20))
        .list_with_pagination(collect_into(&mut out))
        .unwrap();

    assert_eq!(out.len(), 20);
    assert_eq!(out[0].get_str("name").unwrap(), "acct-021");
    assert_eq!(
        pagination,
        Pagination {
            total_count: 45,
            total_pages: 3,
            current_page: 2,
            size: 20,
        }
    );
}

#[test]
fn last_page_is_partial() {
    let (_driver, client) = seeded(45);
    let mut out = Vec::new();
    client
        .query()
        .with_limit(Limit::new(3, 20))
        .list_with_pagination(collect_into(&mut out))
        .unwrap();
    assert_eq!(out.len(), 5);
}

#[test]
fn page_below_one_reads_the_first_page() {
    let (_driver, client) = seeded(30);
    let mut out = Vec::new();
    let pagination = client
        .query()
        .with_limit(Limit::new(-4, 10))
        .list_with_pagination(collect_into(&mut out))
        .unwrap();
    assert_eq!(pagination.current_page, 1);
    assert_eq!(out[0].get_str("name").unwrap(), "acct-001");
}

#[test]
fn page_far_past_the_end_is_empty() {
    let (_driver, client) = seeded(45);
    let mut out = Vec::new();
    let pagination = client
        .query()
        .with_limit(Limit::new(i64::MAX / 4, 20))
        .list_with_pagination(collect_into(&mut out))
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(pagination.current_page, i64::MAX / 4);
    assert_eq!(pagination.total_pages, 3);
}

#[test]
fn empty_filter_uses_the_estimate() {
    let (driver, client) = seeded(12);
    client.query().list_with_pagination(|_| Ok(())).unwrap();
    let calls = driver.calls();
    assert!(calls.contains(&"estimated_document_count"));
    assert!(!calls.contains(&"count_documents"));
}

#[test]
fn filtered_listing_counts_exactly() {
    let (driver, client) = seeded(12);
    let pagination = client
        .query()
        .where_eq("status", "paused")
        .with_size(4)
        .list_with_pagination(|_| Ok(()))
        .unwrap();
    assert_eq!(pagination.total_count, 6);
    assert_eq!(pagination.total_pages, 2);
    let calls = driver.calls();
    assert!(calls.contains(&"count_documents"));
    assert!(!calls.contains(&"estimated_document_count"));
}

#[test]
fn override_filter_replaces_conditions() {
    let (_driver, client) = seeded(10);
    let pagination = client
        .query()
        .where_eq("status", "active")
        .with_condition(doc! { "score": { "$lte": 3 } })
        .list_with_pagination(|_| Ok(()))
        .unwrap();
    assert_eq!(pagination.total_count, 3);
}

// ── Last-id pagination ──────────────────────────────────────────

#[test]
fn exactly_one_full_page_returns_no_token() {
    let (_driver, client) = seeded(20);
    let mut out = Vec::new();
    let token = client
        .query()
        .with_size(20)
        .list_with_last_id(collect_into(&mut out))
        .unwrap();
    assert_eq!(out.len(), 20);
    assert_eq!(token, "");
}

#[test]
fn one_extra_document_yields_the_twentieth_id() {
    let (_driver, client) = seeded(21);
    let mut out = Vec::new();
    let token = client
        .query()
        .with_size(20)
        .list_with_last_id(collect_into(&mut out))
        .unwrap();
    assert_eq!(out.len(), 20);
    assert_eq!(token, oid(20).to_hex());

    let mut rest = Vec::new();
    let next = client
        .query()
        .with_size(20)
        .with_last_id(token)
        .list_with_last_id(collect_into(&mut rest))
        .unwrap();
    assert_eq!(names(&rest), ["acct-021"]);
    assert_eq!(next, "");
}

#[test]
fn walking_tokens_visits_every_document_once() {
    let (_driver, client) = seeded(45);
    let mut seen = Vec::new();
    let mut token = String::new();
    let mut pages = 0;
    loop {
        let mut page = Vec::new();
        token = client
            .query()
            .with_size(20)
            .with_last_id(token)
            .list_with_last_id(collect_into(&mut page))
            .unwrap();
        pages += 1;
        seen.extend(page);
        if token.is_empty() {
            break;
        }
    }
    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 45);
    assert_eq!(seen[44].get_str("name").unwrap(), "acct-045");
}

#[test]
fn tokens_respect_the_override_filter() {
    let (_driver, client) = seeded(10);
    let mut out = Vec::new();
    let token = client
        .query()
        .with_condition(doc! { "status": "active" })
        .with_size(2)
        .with_last_id(oid(4).to_hex())
        .list_with_last_id(collect_into(&mut out))
        .unwrap();
    assert_eq!(names(&out), ["acct-006", "acct-008"]);
    assert_eq!(token, oid(8).to_hex());
}

#[test]
fn malformed_token_is_an_error() {
    let (driver, client) = seeded(3);
    let err = client
        .query()
        .with_last_id("zzz")
        .list_with_last_id(|_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCursor(_)));
    assert!(driver.calls().is_empty());
}

#[test]
fn non_object_id_documents_are_rejected() {
    let (driver, client) = seeded(0);
    driver.seed(&ns(), [doc! { "_id": "acct-x", "name": "x" }]).unwrap();
    let err = client.query().list_with_last_id(|_| Ok(())).unwrap_err();
    assert!(matches!(err, Error::InvalidCursor(_)));
    assert_eq!(driver.open_cursors(), 0);
}
