//! Integration tests for the lane runtime
//!
//! Drives the full stage graph (readers → enrichment → gate lanes →
//! watermark stage → window lanes → sink hub) over in-memory channels and
//! stream files.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tampering_detector::ingest::{Enricher, MemoryPlayerDirectory};
use tampering_detector::models::{Player, TamperingResult};
use tampering_detector::runtime::{PipelineStats, Runtime, RuntimeInputs, RuntimeOptions};
use tampering_detector::sinks::{JsonlFileSink, MemorySink, SinkHub};
use tampering_detector::stream::{EngineSettings, Watermark};
use tampering_detector::transport::StreamWriter;
use tokio::sync::{mpsc, watch};

fn roster() -> MemoryPlayerDirectory {
    MemoryPlayerDirectory::new(vec![
        Player::new("KingJames", "Lebron James", "LAL"),
        Player::new("AntDavis23", "Anthony Davis", "LAL"),
        Player::new("KyrieIrving", "Kyrie Irving", "BKN"),
        Player::new("StephenCurry30", "Stephen Curry", "GSW"),
        Player::new("KlayThompson", "Klay Thompson", "GSW"),
    ])
}

fn options() -> RuntimeOptions {
    RuntimeOptions {
        settings: EngineSettings {
            window_size: 60_000,
            bounded_delay: 0,
            idle_timeout: 60_000,
            allowed_lateness: 10_000,
        },
        lanes: 3,
        channel_capacity: 64,
        max_in_flight: 4,
        dedup_capacity: 100,
    }
}

fn mention(id: u64, event_time: i64, author: &str, athlete: &str) -> String {
    json!({
        "event_time": event_time,
        "data": [{
            "id": id,
            "context_annotations": [
                {"domain": {"id": "60", "name": "Athlete"}, "entity": {"name": athlete}}
            ]
        }],
        "includes": {"users": [{"username": author}]}
    })
    .to_string()
}

struct Harness {
    runtime: Runtime,
    primary: Arc<MemorySink>,
    late: Arc<MemorySink>,
    audit: Arc<MemorySink>,
    stats: Arc<PipelineStats>,
}

fn harness() -> Harness {
    let (primary, late, audit) = (
        MemorySink::new("results"),
        MemorySink::new("late"),
        MemorySink::new("audit"),
    );
    let stats = Arc::new(PipelineStats::default());
    let hub = SinkHub::new(primary.clone(), late.clone(), audit.clone(), stats.clone());
    let enricher = Enricher::new(Arc::new(roster()), Duration::from_millis(500));
    Harness {
        runtime: Runtime::new(options(), enricher, hub, stats.clone()),
        primary,
        late,
        audit,
        stats,
    }
}

fn results(sink: &MemorySink) -> Vec<TamperingResult> {
    sink.records()
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_runtime_detects_and_flushes_at_end_of_input() {
    let h = harness();
    let (_control_tx, control_rx) = mpsc::channel(16);
    let (mention_tx, mention_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(_control_tx);

    for line in [
        mention(1, 1_000, "KingJames", "Kyrie Irving"),
        mention(2, 2_000, "AntDavis23", "Kyrie Irving"),
        mention(2, 2_000, "AntDavis23", "Kyrie Irving"), // duplicate id
        "{not json".to_string(),
        mention(3, 3_000, "ghost", "Kyrie Irving"),      // unknown author
        mention(4, 4_000, "StephenCurry30", "Kyrie Irving"),
    ] {
        mention_tx.send(line).await.unwrap();
    }
    drop(mention_tx);

    let inputs = RuntimeInputs {
        controls: control_rx,
        mentions: vec![mention_rx],
    };
    let summary = h.runtime.run(inputs, shutdown_rx).await.unwrap();

    assert!(summary.flushed);
    assert_eq!(summary.final_watermark, Watermark::MAX);

    let found = results(&h.primary);
    assert_eq!(found.len(), 1, "GSW has a single contact");
    assert_eq!(found[0].team, "LAL");
    assert_eq!(found[0].counterpart, "Kyrie Irving");
    assert_eq!(found[0].total, 2);

    assert_eq!(h.audit.len(), 3);
    assert!(h.late.is_empty());

    let stats = h.stats.snapshot();
    assert_eq!(stats.mentions_read, 6);
    assert_eq!(stats.mentions_duplicate, 1);
    assert_eq!(stats.mention_parse_errors, 1);
    assert_eq!(stats.lookup_misses, 1);
    assert_eq!(stats.contacts_enriched, 3);
}

#[tokio::test]
async fn test_runtime_suppresses_restricted_team() {
    let h = harness();
    let (control_tx, control_rx) = mpsc::channel(16);
    let (mention_tx, mention_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let inputs = RuntimeInputs {
        controls: control_rx,
        mentions: vec![mention_rx],
    };
    let Harness {
        runtime,
        primary,
        audit,
        stats,
        ..
    } = h;
    let run = tokio::spawn(async move { runtime.run(inputs, shutdown_rx).await });

    control_tx
        .send(r#"{"team":"LAL","restricted":true,"isRemoval":false}"#.to_string())
        .await
        .unwrap();
    drop(control_tx);
    // Contacts go out only after the gate lane has applied the control.
    tokio::time::timeout(Duration::from_secs(5), async {
        while stats.snapshot().controls_applied == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("control change applied");

    for line in [
        mention(1, 1_000, "KingJames", "Kyrie Irving"),
        mention(2, 2_000, "AntDavis23", "Kyrie Irving"),
        mention(3, 3_000, "StephenCurry30", "Kyrie Irving"),
        mention(4, 4_000, "KlayThompson", "Kyrie Irving"),
    ] {
        mention_tx.send(line).await.unwrap();
    }
    drop(mention_tx);

    let summary = run.await.unwrap().unwrap();
    assert!(summary.flushed);

    let found = results(&primary);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].team, "GSW");
    assert_eq!(audit.len(), 2);
    assert_eq!(summary.stats.contacts_suppressed, 2);
}

#[tokio::test]
async fn test_shutdown_skips_end_of_input_flush() {
    let h = harness();
    let (control_tx, control_rx) = mpsc::channel(16);
    let (mention_tx, mention_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    mention_tx
        .send(mention(1, 1_000, "KingJames", "Kyrie Irving"))
        .await
        .unwrap();
    mention_tx
        .send(mention(2, 2_000, "AntDavis23", "Kyrie Irving"))
        .await
        .unwrap();
    shutdown_tx.send(true).unwrap();
    drop(mention_tx);
    drop(control_tx);

    let inputs = RuntimeInputs {
        controls: control_rx,
        mentions: vec![mention_rx],
    };
    let summary = h.runtime.run(inputs, shutdown_rx).await.unwrap();
    assert!(!summary.flushed);
    assert!(h.primary.is_empty(), "window never closed");
}

#[tokio::test]
async fn test_run_files_reads_and_writes_stream_files() {
    let dir = tempfile::tempdir().unwrap();

    let mut control = StreamWriter::create(dir.path(), "nba-control").await.unwrap();
    control
        .append(
            &json!({
                "eventName": "INSERT",
                "dynamodb": {"NewImage": {"team": {"S": "BOS"}, "control": {"BOOL": true}}}
            })
            .to_string(),
        )
        .await
        .unwrap();

    let mut mentions = StreamWriter::create(dir.path(), "nba-mentions").await.unwrap();
    for line in [
        mention(1, 1_000, "KingJames", "Kyrie Irving"),
        mention(2, 2_000, "AntDavis23", "Kyrie Irving"),
        // Next window: pushes the watermark past window 0.
        mention(3, 61_000, "KingJames", "Stephen Curry"),
        // Window 0 already fired but is still within allowed lateness.
        mention(4, 30_000, "AntDavis23", "Kyrie Irving"),
    ] {
        mentions.append(&line).await.unwrap();
    }

    let stats = Arc::new(PipelineStats::default());
    let hub = SinkHub::new(
        Arc::new(JsonlFileSink::create(dir.path(), "results").await.unwrap()),
        Arc::new(JsonlFileSink::create(dir.path(), "late").await.unwrap()),
        Arc::new(JsonlFileSink::create(dir.path(), "audit").await.unwrap()),
        stats.clone(),
    );
    let runtime = Runtime::new(
        RuntimeOptions {
            lanes: 1,
            max_in_flight: 1,
            ..options()
        },
        Enricher::new(Arc::new(roster()), Duration::from_millis(500)),
        hub,
        stats,
    );

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let summary = runtime
        .run_files(dir.path(), "nba-control", &["nba-mentions".to_string()], shutdown_rx)
        .await
        .unwrap();

    assert_eq!(summary.stats.controls_read, 1);
    let read = |name: &str| -> Vec<Value> {
        std::fs::read_to_string(dir.path().join(format!("{}.jsonl", name)))
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    };

    let primary = read("results");
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0]["total"], 2);
    assert_eq!(primary[0]["tamperingPlayer"], "Kyrie Irving");

    let late = read("late");
    assert_eq!(late.len(), 1);
    assert_eq!(late[0]["eventTime"], 30_000);

    assert_eq!(read("audit").len(), 4);
}

#[tokio::test]
async fn test_run_files_reads_nothing_when_shutdown_already_requested() {
    let dir = tempfile::tempdir().unwrap();
    StreamWriter::create(dir.path(), "nba-control").await.unwrap();
    let mut mentions = StreamWriter::create(dir.path(), "nba-mentions").await.unwrap();
    for i in 0..200u64 {
        mentions
            .append(&mention(i, 1_000 * i as i64, "KingJames", "Kyrie Irving"))
            .await
            .unwrap();
    }

    let h = harness();
    let (_shutdown_tx, shutdown_rx) = watch::channel(true);
    let summary = h
        .runtime
        .run_files(dir.path(), "nba-control", &["nba-mentions".to_string()], shutdown_rx)
        .await
        .unwrap();

    assert!(!summary.flushed);
    assert_eq!(summary.stats.mentions_read, 0);
    assert_eq!(summary.stats.controls_read, 0);
    assert!(h.audit.is_empty());
}
