mod common;

use std::collections::HashSet;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use common::*;
use rollup_digest::fetch::{fetch_window, FetchLimits, FetchStrategy};
use rollup_digest::MessageQuery;

fn limits(page_size: u8, max_pages: u32) -> FetchLimits {
    FetchLimits {
        cursor_batch: 100,
        bootstrap_batch: 50,
        page_size,
        max_pages,
        timeout: Duration::from_secs(5),
    }
}

fn ids(messages: &[rollup_core::ChatMessage]) -> Vec<u64> {
    messages.iter().map(|m| m.id.parse().unwrap()).collect()
}

#[tokio::test]
async fn bounded_scan_returns_exactly_the_window() {
    let history: Vec<_> = (1..=250).map(|i| msg(i, "10", "alice", "x")).collect();
    let gw = FakeGateway::new().with_thread(thread("1", "T", "10"), history);
    let cutoff = base_time() + ChronoDuration::minutes(101);

    let window = fetch_window(
        &gw,
        "1",
        FetchStrategy::BoundedScan { cutoff },
        &limits(100, 10),
    )
    .await;

    assert_eq!(ids(&window), (101..=250).collect::<Vec<_>>());
    let unique: HashSet<_> = window.iter().map(|m| m.id.clone()).collect();
    assert_eq!(unique.len(), window.len());
    assert_eq!(
        gw.queries_for("1"),
        [
            MessageQuery::Latest { limit: 100 },
            MessageQuery::Before {
                id: "151".into(),
                limit: 100
            },
        ]
    );
}

#[tokio::test]
async fn bounded_scan_stops_at_page_guardrail() {
    let history: Vec<_> = (1..=100).map(|i| msg(i, "10", "alice", "x")).collect();
    let gw = FakeGateway::new().with_thread(thread("1", "T", "10"), history);

    let window = fetch_window(
        &gw,
        "1",
        FetchStrategy::BoundedScan {
            cutoff: base_time(),
        },
        &limits(10, 2),
    )
    .await;

    assert_eq!(ids(&window), (81..=100).collect::<Vec<_>>());
    assert_eq!(gw.queries_for("1").len(), 2);
}

#[tokio::test]
async fn bounded_scan_stops_on_empty_page() {
    let history: Vec<_> = (1..=15).map(|i| msg(i, "10", "alice", "x")).collect();
    let gw = FakeGateway::new().with_thread(thread("1", "T", "10"), history);

    let window = fetch_window(
        &gw,
        "1",
        FetchStrategy::BoundedScan {
            cutoff: base_time(),
        },
        &limits(10, 10),
    )
    .await;

    assert_eq!(window.len(), 15);
    assert_eq!(gw.queries_for("1").len(), 3);
}

#[tokio::test]
async fn cursor_mode_bootstraps_then_reads_after_cursor() {
    let history: Vec<_> = (1..=80).map(|i| msg(i, "10", "alice", "x")).collect();
    let gw = FakeGateway::new().with_thread(thread("1", "T", "10"), history);

    let bootstrap = fetch_window(&gw, "1", FetchStrategy::Cursor { after: None }, &limits(100, 10)).await;
    assert_eq!(ids(&bootstrap), (31..=80).collect::<Vec<_>>());

    let after = fetch_window(
        &gw,
        "1",
        FetchStrategy::Cursor { after: Some("75") },
        &limits(100, 10),
    )
    .await;
    assert_eq!(ids(&after), [76, 77, 78, 79, 80]);
}

#[tokio::test]
async fn cursor_mode_drops_the_cursor_and_older_messages() {
    let history: Vec<_> = (1..=10).map(|i| msg(i, "10", "alice", "x")).collect();
    let mut gw = FakeGateway::new().with_thread(thread("1", "T", "10"), history);
    gw.loose_after = true;

    let window = fetch_window(
        &gw,
        "1",
        FetchStrategy::Cursor { after: Some("7") },
        &limits(100, 10),
    )
    .await;
    assert_eq!(ids(&window), [8, 9, 10]);
}

#[tokio::test]
async fn fetch_errors_yield_an_empty_window() {
    let mut gw = FakeGateway::new().with_thread(
        thread("1", "T", "10"),
        vec![msg(1, "10", "alice", "x")],
    );
    gw.fail_messages.insert("1".into());

    let window = fetch_window(&gw, "1", FetchStrategy::Cursor { after: None }, &limits(100, 10)).await;
    assert!(window.is_empty());
}
