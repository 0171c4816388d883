mod common;

use chainstream_core::error::StreamError;
use chainstream_near::scanner::ScanStep;
use chainstream_near::{BlockScanner, ScanFilter};

use common::{event_log, outcome, Call, MockNear};

fn names(scan: &chainstream_near::HeightScan) -> Vec<String> {
    scan.events.iter().map(|e| e.event.event.clone()).collect()
}

#[tokio::test]
async fn only_chunks_produced_at_the_height_are_read() {
    let mock = MockNear::new(0);
    mock.add_block(20, &[(20, "fresh"), (19, "stale")]);
    mock.add_chunk("fresh", &[]);
    mock.add_chunk("stale", &[]);

    let scan = BlockScanner::new(mock.clone())
        .scan(20, &ScanFilter::account("token.test"))
        .await;

    assert!(scan.failures.is_empty());
    assert_eq!(mock.calls(), vec![Call::Block(20), Call::Chunk("fresh".into())]);
}

#[tokio::test]
async fn transaction_outcome_precedes_receipt_outcomes() {
    let mock = MockNear::new(0);
    mock.add_block(7, &[(7, "C")]);
    mock.add_chunk("C", &[("T", "token.test", "token.test")]);
    mock.add_tx(
        "T",
        outcome("T", "token.test", &[event_log("first", "1")]),
        vec![
            outcome("R1", "token.test", &[event_log("second", "2"), event_log("third", "3")]),
            outcome("R2", "token.test", &[event_log("fourth", "4")]),
        ],
    );

    let scan = BlockScanner::new(mock.clone())
        .scan(7, &ScanFilter::account("token.test"))
        .await;

    assert_eq!(names(&scan), vec!["first", "second", "third", "fourth"]);
    let receipts: Vec<_> = scan.events.iter().map(|e| e.context.receipt_id.as_str()).collect();
    assert_eq!(receipts, vec!["T", "R1", "R1", "R2"]);
    assert!(scan.events.iter().all(|e| e.context.block_height == 7));
    assert_eq!(scan.events[0].context.standard, Some(serde_json::json!("nep141")));
}

#[tokio::test]
async fn unwatched_receivers_are_not_fetched() {
    let mock = MockNear::new(0);
    mock.add_block(3, &[(3, "C")]);
    mock.add_chunk("C", &[("T1", "alice.test", "other.test"), ("T2", "alice.test", "token.test")]);
    mock.add_tx("T2", outcome("T2", "alice.test", &[]), vec![]);

    BlockScanner::new(mock.clone())
        .scan(3, &ScanFilter::account("token.test"))
        .await;

    assert!(!mock.calls().contains(&Call::Tx("T1".into())));
    assert!(mock.calls().contains(&Call::Tx("T2".into())));
}

#[tokio::test]
async fn outcomes_of_other_executors_are_ignored() {
    let mock = MockNear::new(0);
    mock.add_block(4, &[(4, "C")]);
    mock.add_chunk("C", &[("T", "alice.test", "router.test")]);
    mock.add_tx(
        "T",
        outcome("T", "alice.test", &[event_log("signer_side", "0")]),
        vec![
            outcome("R1", "router.test", &[event_log("routed", "1")]),
            outcome("R2", "token.test", &[event_log("ft_transfer", "2")]),
        ],
    );

    let scan = BlockScanner::new(mock.clone())
        .scan(4, &ScanFilter::accounts(["router.test"]))
        .await;
    assert_eq!(names(&scan), vec!["routed"]);
    assert_eq!(scan.events[0].context.contract_id, "router.test");
}

#[tokio::test]
async fn failed_chunk_does_not_abort_siblings() {
    let mock = MockNear::new(0);
    mock.add_block(9, &[(9, "missing"), (9, "ok")]);
    mock.add_chunk("ok", &[("T", "alice.test", "token.test")]);
    mock.add_tx("T", outcome("T", "alice.test", &[]), vec![outcome("R", "token.test", &[event_log("ft_mint", "1")])]);

    let scan = BlockScanner::new(mock.clone())
        .scan(9, &ScanFilter::account("token.test"))
        .await;

    assert_eq!(names(&scan), vec!["ft_mint"]);
    assert_eq!(scan.failures.len(), 1);
    assert_eq!(
        scan.failures[0].step,
        ScanStep::Chunk {
            chunk_hash: "missing".into()
        }
    );
    assert!(matches!(scan.failures[0].error, StreamError::DataUnavailable(_)));
}

#[tokio::test]
async fn failed_transaction_does_not_abort_siblings() {
    let mock = MockNear::new(0);
    mock.add_block(9, &[(9, "C")]);
    mock.add_chunk("C", &[("gone", "alice.test", "token.test"), ("T", "alice.test", "token.test")]);
    mock.add_tx("T", outcome("T", "alice.test", &[]), vec![outcome("R", "token.test", &[event_log("ft_burn", "1")])]);

    let scan = BlockScanner::new(mock.clone())
        .scan(9, &ScanFilter::account("token.test"))
        .await;

    assert_eq!(names(&scan), vec!["ft_burn"]);
    assert_eq!(
        scan.failures[0].step,
        ScanStep::TxStatus {
            tx_hash: "gone".into()
        }
    );
}

#[tokio::test]
async fn malformed_log_is_skipped_and_recorded() {
    let mock = MockNear::new(0);
    mock.add_block(2, &[(2, "C")]);
    mock.add_chunk("C", &[("T", "alice.test", "token.test")]);
    mock.add_tx(
        "T",
        outcome("T", "alice.test", &[]),
        vec![outcome(
            "R",
            "token.test",
            &[
                "Transfer 5 from alice.test".to_string(),
                "EVENT_JSON:{broken".to_string(),
                event_log("ft_transfer", "5"),
            ],
        )],
    );

    let scan = BlockScanner::new(mock.clone())
        .scan(2, &ScanFilter::account("token.test"))
        .await;
    assert_eq!(names(&scan), vec!["ft_transfer"]);
    assert_eq!(scan.failures.len(), 1);
    assert!(matches!(scan.failures[0].error, StreamError::MalformedEvent { .. }));
}

#[tokio::test]
async fn missing_block_yields_empty_scan() {
    let mock = MockNear::new(0);
    let scan = BlockScanner::new(mock.clone())
        .scan(42, &ScanFilter::account("token.test"))
        .await;
    assert!(scan.events.is_empty());
    assert_eq!(scan.failures.len(), 1);
    assert_eq!(scan.failures[0].step, ScanStep::Block);
}

#[tokio::test]
async fn empty_filter_makes_no_calls() {
    let mock = MockNear::new(0);
    mock.add_event_block(5, "token.test", &[event_log("ft_transfer", "1")]);
    let scan = BlockScanner::new(mock.clone()).scan(5, &ScanFilter::default()).await;
    assert!(scan.events.is_empty());
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn event_name_and_max_events_narrow_the_scan() {
    let mock = MockNear::new(0);
    mock.add_event_block(
        6,
        "token.test",
        &[
            event_log("ft_mint", "1"),
            event_log("ft_transfer", "2"),
            event_log("ft_transfer", "3"),
            event_log("ft_transfer", "4"),
        ],
    );
    let filter = ScanFilter::account("token.test")
        .event_name("ft_transfer")
        .max_events(2);
    let scan = BlockScanner::new(mock.clone()).scan(6, &filter).await;
    assert_eq!(names(&scan), vec!["ft_transfer", "ft_transfer"]);
    assert!(scan.truncated);
}
