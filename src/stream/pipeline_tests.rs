//! Pipeline Tests
//!
//! End-to-end checks of gate → watermark → windows → aggregate on one worker:
//! 1. Restricted teams are suppressed while other teams still fire
//! 2. Control changes apply in arrival order, removal is idempotent
//! 3. Late contacts after firing, then closure
//! 4. Every accepted contact is audited exactly once

use super::clock::{Millis, Watermark};
use super::output::{partition, OutputRecord};
use super::pipeline::*;
use crate::models::{Contact, ControlChange, Player};

const W: Millis = 60_000;

fn settings() -> EngineSettings {
    EngineSettings {
        window_size: W,
        bounded_delay: 5_000,
        idle_timeout: 120_000,
        allowed_lateness: 10_000,
    }
}

fn contact(source: &str, team: &str, destination: &str, t: Millis) -> Contact {
    Contact::new(
        t,
        Player::new(source.replace(' ', ""), source, team),
        Player::new(destination.replace(' ', ""), destination, "BKN"),
    )
}

fn run(pipeline: &mut Pipeline, contacts: Vec<Contact>) -> Vec<OutputRecord> {
    let mut out = Vec::new();
    for c in contacts {
        out.extend(pipeline.offer(0, c));
    }
    out
}

// =============================================================================
// FIRING
// =============================================================================

#[test]
fn test_two_players_in_window_produce_one_result() {
    let mut pipeline = Pipeline::new(settings());
    let out = run(
        &mut pipeline,
        vec![
            contact("Lebron James", "LAL", "Kyrie Irving", 1_000),
            contact("Anthony Davis", "LAL", "Kyrie Irving", 2_000),
            // Pushes the watermark to W.
            contact("Lebron James", "LAL", "Kevin Durant", W + 5_000),
        ],
    );

    let buckets = partition(&out);
    assert_eq!(buckets.primary.len(), 1);
    assert_eq!(buckets.primary[0].total, 2);
    assert_eq!(buckets.primary[0].counterpart, "Kyrie Irving");
    assert_eq!(pipeline.watermark(), Watermark(W));
    assert_eq!(pipeline.counters().results, 1);
}

#[test]
fn test_single_contact_does_not_fire_result() {
    let mut pipeline = Pipeline::new(settings());
    let mut out = run(
        &mut pipeline,
        vec![contact("Lebron James", "LAL", "Kyrie Irving", 1_000)],
    );
    out.extend(pipeline.finish());

    let buckets = partition(&out);
    assert!(buckets.primary.is_empty());
    assert_eq!(buckets.audit.len(), 1);
}

#[test]
fn test_finish_flushes_open_windows() {
    let mut pipeline = Pipeline::new(settings());
    let mut out = run(
        &mut pipeline,
        vec![
            contact("Lebron James", "LAL", "Kyrie Irving", 1_000),
            contact("Anthony Davis", "LAL", "Kyrie Irving", 2_000),
        ],
    );
    assert!(partition(&out).primary.is_empty());

    out.extend(pipeline.finish());
    assert_eq!(partition(&out).primary.len(), 1);
    assert_eq!(pipeline.windows().live_windows(), 0);
}

// =============================================================================
// CONTROL GATE
// =============================================================================

#[test]
fn test_restricted_team_suppressed_other_team_fires() {
    let mut pipeline = Pipeline::new(settings());
    pipeline.apply_control(ControlChange::upsert("LAL", true).with_sequence(1));

    let mut out = run(
        &mut pipeline,
        vec![
            contact("Lebron James", "LAL", "Kyrie Irving", 1_000),
            contact("Anthony Davis", "LAL", "Kyrie Irving", 2_000),
            contact("Stephen Curry", "GSW", "Kyrie Irving", 3_000),
            contact("Klay Thompson", "GSW", "Kyrie Irving", 4_000),
        ],
    );
    out.extend(pipeline.finish());

    let buckets = partition(&out);
    assert_eq!(buckets.primary.len(), 1);
    assert_eq!(buckets.primary[0].team, "GSW");
    assert!(buckets.audit.iter().all(|c| c.source.team == "GSW"));
    assert_eq!(pipeline.counters().contacts_suppressed, 2);
    assert_eq!(pipeline.gate().stats().contacts_suppressed, 2);
}

#[test]
fn test_control_changes_apply_in_arrival_order() {
    let mut pipeline = Pipeline::new(settings());
    pipeline.apply_control(ControlChange::upsert("LAL", true).with_sequence(1));
    let suppressed = pipeline.offer(0, contact("Lebron James", "LAL", "Kyrie Irving", 1_000));
    assert!(suppressed.is_empty());

    pipeline.apply_control(ControlChange::upsert("LAL", false).with_sequence(2));
    let mut out = run(
        &mut pipeline,
        vec![
            contact("Anthony Davis", "LAL", "Kyrie Irving", 2_000),
            contact("Russell Westbrook", "LAL", "Kyrie Irving", 3_000),
        ],
    );
    out.extend(pipeline.finish());

    let buckets = partition(&out);
    let result = buckets.primary[0];
    assert_eq!(result.total, 2);
    assert!(!result.players.contains("Lebron James"));
}

#[test]
fn test_removal_is_idempotent_and_unrestricts() {
    let mut pipeline = Pipeline::new(settings());
    pipeline.apply_control(ControlChange::upsert("LAL", true));
    pipeline.apply_control(ControlChange::removal("LAL"));
    pipeline.apply_control(ControlChange::removal("LAL"));
    assert!(!pipeline.gate().tracker().currently_restricted("LAL"));

    let out = pipeline.offer(0, contact("Lebron James", "LAL", "Kyrie Irving", 1_000));
    assert!(out.is_empty(), "buffered, not yet fired");
    assert_eq!(pipeline.counters().contacts_buffered, 1);
    assert_eq!(pipeline.counters().controls, 3);
}

#[test]
fn test_controls_do_not_move_watermark() {
    let mut pipeline = Pipeline::new(settings());
    pipeline.offer(0, contact("Lebron James", "LAL", "Kyrie Irving", 100_000));
    let before = pipeline.watermark();
    pipeline.apply_control(ControlChange::upsert("GSW", true));
    pipeline.apply_control(ControlChange::removal("GSW"));
    assert_eq!(pipeline.watermark(), before);
}

// =============================================================================
// LATENESS
// =============================================================================

#[test]
fn test_late_contact_then_window_closes() {
    let mut pipeline = Pipeline::new(settings());
    let mut out = run(
        &mut pipeline,
        vec![
            contact("Lebron James", "LAL", "Kyrie Irving", 1_000),
            contact("Anthony Davis", "LAL", "Kyrie Irving", 2_000),
            contact("Lebron James", "LAL", "Kevin Durant", W + 5_000),
        ],
    );
    assert_eq!(partition(&out).primary.len(), 1);

    // Watermark is W; window 0 is live until W + 10s.
    let late = contact("Russell Westbrook", "LAL", "Kyrie Irving", 30_000);
    out.extend(pipeline.offer(0, late.clone()));
    assert_eq!(partition(&out).late, vec![&late]);

    // Watermark to W + 11s closes window 0.
    out.extend(pipeline.offer(0, contact("Lebron James", "LAL", "Kevin Durant", W + 16_000)));
    let too_late = contact("Austin Reaves", "LAL", "Kyrie Irving", 40_000);
    out.extend(pipeline.offer(0, too_late.clone()));

    let buckets = partition(&out);
    assert_eq!(buckets.primary.len(), 1, "no re-fire");
    assert_eq!(buckets.late.len(), 1);
    assert!(out.iter().all(|r| r.as_contact() != Some(&too_late)));
    assert_eq!(pipeline.counters().contacts_late, 1);
}

#[test]
fn test_audit_matches_accepted_contacts() {
    let mut pipeline = Pipeline::new(settings());
    pipeline.apply_control(ControlChange::upsert("BOS", true));

    let schedule = [
        ("Lebron James", "LAL", 1_000),
        ("Jayson Tatum", "BOS", 2_000),
        ("Anthony Davis", "LAL", 70_000),
        ("Stephen Curry", "GSW", 59_000),
        ("Klay Thompson", "GSW", 140_000),
        ("Draymond Green", "GSW", 10_000),
        ("Lebron James", "LAL", 200_000),
    ];

    let mut out = Vec::new();
    for (source, team, t) in schedule {
        out.extend(pipeline.offer(0, contact(source, team, "Kyrie Irving", t)));
    }
    out.extend(pipeline.finish());

    let counters = pipeline.counters();
    let audit = partition(&out).audit.len() as u64;
    assert_eq!(counters.contacts_suppressed, 1);
    assert_eq!(audit, counters.contacts_buffered + counters.contacts_late);
    assert!(
        counters.contacts_buffered + counters.contacts_late < counters.contacts_in - 1,
        "the 10s contact is past allowed lateness"
    );
}
