//! Append-only ledger (§4.6, §6): events, outcomes, overrides, plus
//! the derived patterns/calibrations tables. Uses `rusqlite` with a
//! schema-plus-trigger style: triggers enforce invariants the
//! application layer must never be trusted to enforce alone - here a
//! trigger forbids UPDATE on `events` outright, since the ledger's
//! append-only contract is a test invariant (§8.11), not a convention.

use crate::domain::Domain;
use crate::types::{Calibration, DecisionEvent, Mode, MinisterId, Outcome, OutcomeResult, OverrideRow, Pattern, PatternKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).with_context(|| format!("failed to open {path:?}"))?;
        let ledger = Self { conn };
        ledger.init_schema()?;
        Ok(ledger)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let ledger = Self { conn };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                event_id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                domain TEXT NOT NULL,
                stakes TEXT,
                emotional_load REAL NOT NULL,
                urgency REAL NOT NULL,
                ministers_called TEXT NOT NULL,
                verdict_summary TEXT NOT NULL,
                posture TEXT NOT NULL,
                illusions_detected TEXT NOT NULL,
                contradictions_found INTEGER NOT NULL,
                mode TEXT NOT NULL,
                sovereign_action TEXT,
                action_followed_counsel INTEGER,
                override_reason TEXT
            );

            CREATE TRIGGER IF NOT EXISTS events_no_update
            BEFORE UPDATE ON events
            BEGIN
                SELECT RAISE(ABORT, 'events is append-only: UPDATE is forbidden');
            END;

            CREATE TABLE IF NOT EXISTS outcomes (
                event_id TEXT PRIMARY KEY REFERENCES events(event_id),
                resolved_at TEXT NOT NULL,
                result TEXT NOT NULL,
                damage REAL NOT NULL,
                benefit REAL NOT NULL,
                lessons TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS overrides (
                event_id TEXT NOT NULL REFERENCES events(event_id),
                recorded_at TEXT NOT NULL,
                reason TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS patterns (
                pattern_id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                description TEXT NOT NULL,
                domain TEXT,
                frequency INTEGER NOT NULL,
                last_seen TEXT NOT NULL,
                last_outcome TEXT
            );

            CREATE TABLE IF NOT EXISTS calibrations (
                subject TEXT NOT NULL,
                domain TEXT,
                confidence REAL NOT NULL,
                caution REAL NOT NULL,
                urgency_threshold REAL NOT NULL,
                bluntness REAL NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (subject, domain)
            );
            "#,
        )?;
        Ok(())
    }

    pub fn append_event(&self, event: &DecisionEvent) -> Result<()> {
        let ministers_json = serde_json::to_string(&event.ministers_called)?;
        let illusions_json = serde_json::to_string(&event.illusions_detected)?;
        self.conn.execute(
            "INSERT INTO events (event_id, timestamp, domain, stakes, emotional_load, urgency, ministers_called, verdict_summary, posture, illusions_detected, contradictions_found, mode, sovereign_action, action_followed_counsel, override_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                event.event_id.to_string(),
                event.timestamp.to_rfc3339(),
                event.domain.as_str(),
                event.stakes,
                event.emotional_load,
                event.urgency,
                ministers_json,
                event.verdict_summary,
                event.posture,
                illusions_json,
                event.contradictions_found,
                event.mode.as_str(),
                event.sovereign_action,
                event.action_followed_counsel.map(|b| b as i64),
                event.override_reason,
            ],
        )?;
        Ok(())
    }

    pub fn get_event(&self, event_id: Uuid) -> Result<Option<DecisionEvent>> {
        self.conn
            .query_row(
                "SELECT event_id, timestamp, domain, stakes, emotional_load, urgency, ministers_called, verdict_summary, posture, illusions_detected, contradictions_found, mode, sovereign_action, action_followed_counsel, override_reason
                 FROM events WHERE event_id = ?1",
                params![event_id.to_string()],
                row_to_event,
            )
            .optional()
            .context("failed to query event")
    }

    pub fn all_events(&self) -> Result<Vec<DecisionEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, domain, stakes, emotional_load, urgency, ministers_called, verdict_summary, posture, illusions_detected, contradictions_found, mode, sovereign_action, action_followed_counsel, override_reason
             FROM events ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map([], row_to_event)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("failed to collect events")
    }

    pub fn append_outcome(&self, outcome: &Outcome) -> Result<()> {
        let lessons_json = serde_json::to_string(&outcome.lessons)?;
        self.conn.execute(
            "INSERT INTO outcomes (event_id, resolved_at, result, damage, benefit, lessons)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                outcome.event_id.to_string(),
                outcome.resolved_at.to_rfc3339(),
                result_as_str(outcome.result),
                outcome.damage,
                outcome.benefit,
                lessons_json,
            ],
        )?;
        Ok(())
    }

    pub fn all_outcomes(&self) -> Result<Vec<Outcome>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, resolved_at, result, damage, benefit, lessons FROM outcomes",
        )?;
        let rows = stmt.query_map([], |row| {
            let event_id: String = row.get(0)?;
            let resolved_at: String = row.get(1)?;
            let result: String = row.get(2)?;
            let lessons: String = row.get(5)?;
            Ok(Outcome {
                event_id: Uuid::parse_str(&event_id).unwrap_or_default(),
                resolved_at: parse_ts(&resolved_at),
                result: parse_result(&result),
                damage: row.get(3)?,
                benefit: row.get(4)?,
                lessons: serde_json::from_str(&lessons).unwrap_or_default(),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("failed to collect outcomes")
    }

    pub fn append_override(&self, row: &OverrideRow) -> Result<()> {
        self.conn.execute(
            "INSERT INTO overrides (event_id, recorded_at, reason) VALUES (?1, ?2, ?3)",
            params![row.event_id.to_string(), row.recorded_at.to_rfc3339(), row.reason],
        )?;
        Ok(())
    }

    pub fn all_overrides(&self) -> Result<Vec<OverrideRow>> {
        let mut stmt = self.conn.prepare("SELECT event_id, recorded_at, reason FROM overrides")?;
        let rows = stmt.query_map([], |row| {
            let event_id: String = row.get(0)?;
            let recorded_at: String = row.get(1)?;
            Ok(OverrideRow {
                event_id: Uuid::parse_str(&event_id).unwrap_or_default(),
                recorded_at: parse_ts(&recorded_at),
                reason: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("failed to collect overrides")
    }

    pub fn replace_patterns(&self, patterns: &[Pattern]) -> Result<()> {
        self.conn.execute("DELETE FROM patterns", [])?;
        for pattern in patterns {
            self.conn.execute(
                "INSERT INTO patterns (pattern_id, kind, description, domain, frequency, last_seen, last_outcome)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    pattern.pattern_id,
                    kind_as_str(pattern.kind),
                    pattern.description,
                    pattern.domain.map(|d| d.as_str()),
                    pattern.frequency,
                    pattern.last_seen.to_rfc3339(),
                    pattern.last_outcome.map(result_as_str),
                ],
            )?;
        }
        Ok(())
    }

    pub fn all_patterns(&self) -> Result<Vec<Pattern>> {
        let mut stmt = self.conn.prepare(
            "SELECT pattern_id, kind, description, domain, frequency, last_seen, last_outcome FROM patterns",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(1)?;
            let domain: Option<String> = row.get(3)?;
            let last_seen: String = row.get(5)?;
            let last_outcome: Option<String> = row.get(6)?;
            Ok(Pattern {
                pattern_id: row.get(0)?,
                kind: parse_kind(&kind),
                description: row.get(2)?,
                domain: domain.and_then(|d| Domain::parse(&d)),
                frequency: row.get(4)?,
                last_seen: parse_ts(&last_seen),
                last_outcome: last_outcome.map(|o| parse_result(&o)),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("failed to collect patterns")
    }

    pub fn upsert_calibration(&self, calibration: &Calibration) -> Result<()> {
        self.conn.execute(
            "INSERT INTO calibrations (subject, domain, confidence, caution, urgency_threshold, bluntness, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(subject, domain) DO UPDATE SET
                confidence = excluded.confidence,
                caution = excluded.caution,
                urgency_threshold = excluded.urgency_threshold,
                bluntness = excluded.bluntness,
                updated_at = excluded.updated_at",
            params![
                calibration.subject,
                calibration.domain.map(|d| d.as_str()),
                calibration.confidence,
                calibration.caution,
                calibration.urgency_threshold,
                calibration.bluntness,
                calibration.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_calibration(&self, subject: &str, domain: Option<Domain>) -> Result<Option<Calibration>> {
        self.conn
            .query_row(
                "SELECT subject, domain, confidence, caution, urgency_threshold, bluntness, updated_at
                 FROM calibrations WHERE subject = ?1 AND domain IS ?2",
                params![subject, domain.map(|d| d.as_str())],
                row_to_calibration,
            )
            .optional()
            .context("failed to query calibration")
    }
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<DecisionEvent> {
    let event_id: String = row.get(0)?;
    let timestamp: String = row.get(1)?;
    let domain: String = row.get(2)?;
    let ministers_json: String = row.get(6)?;
    let illusions_json: String = row.get(9)?;
    let mode: String = row.get(11)?;
    let action_followed_counsel: Option<i64> = row.get(13)?;

    Ok(DecisionEvent {
        event_id: Uuid::parse_str(&event_id).unwrap_or_default(),
        timestamp: parse_ts(&timestamp),
        domain: Domain::parse(&domain).unwrap_or(Domain::Strategy),
        stakes: row.get(3)?,
        emotional_load: row.get(4)?,
        urgency: row.get(5)?,
        ministers_called: serde_json::from_str::<Vec<MinisterId>>(&ministers_json).unwrap_or_default(),
        verdict_summary: row.get(7)?,
        posture: row.get(8)?,
        illusions_detected: serde_json::from_str(&illusions_json).unwrap_or_default(),
        contradictions_found: row.get(10)?,
        mode: parse_mode(&mode),
        sovereign_action: row.get(12)?,
        action_followed_counsel: action_followed_counsel.map(|v| v != 0),
        override_reason: row.get(14)?,
    })
}

fn row_to_calibration(row: &rusqlite::Row) -> rusqlite::Result<Calibration> {
    let domain: Option<String> = row.get(1)?;
    let updated_at: String = row.get(6)?;
    Ok(Calibration {
        subject: row.get(0)?,
        domain: domain.and_then(|d| Domain::parse(&d)),
        confidence: row.get(2)?,
        caution: row.get(3)?,
        urgency_threshold: row.get(4)?,
        bluntness: row.get(5)?,
        updated_at: parse_ts(&updated_at),
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn parse_mode(s: &str) -> Mode {
    match s {
        "quick" => Mode::Quick,
        "war" => Mode::War,
        _ => Mode::Normal,
    }
}

fn result_as_str(r: OutcomeResult) -> &'static str {
    match r {
        OutcomeResult::Success => "success",
        OutcomeResult::Partial => "partial",
        OutcomeResult::Failure => "failure",
    }
}

fn parse_result(s: &str) -> OutcomeResult {
    match s {
        "success" => OutcomeResult::Success,
        "partial" => OutcomeResult::Partial,
        _ => OutcomeResult::Failure,
    }
}

fn kind_as_str(k: PatternKind) -> &'static str {
    match k {
        PatternKind::RepetitionLoop => "repetition_loop",
        PatternKind::OverrideLoop => "override_loop",
        PatternKind::EmotionalLoop => "emotional_loop",
        PatternKind::OutcomePattern => "outcome_pattern",
        PatternKind::WarEscalationBias => "war_escalation_bias",
        PatternKind::WarFalseUrgencyLoop => "war_false_urgency_loop",
        PatternKind::WarRepeatedOverrides => "war_repeated_overrides",
    }
}

fn parse_kind(s: &str) -> PatternKind {
    match s {
        "override_loop" => PatternKind::OverrideLoop,
        "emotional_loop" => PatternKind::EmotionalLoop,
        "outcome_pattern" => PatternKind::OutcomePattern,
        "war_escalation_bias" => PatternKind::WarEscalationBias,
        "war_false_urgency_loop" => PatternKind::WarFalseUrgencyLoop,
        "war_repeated_overrides" => PatternKind::WarRepeatedOverrides,
        _ => PatternKind::RepetitionLoop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> DecisionEvent {
        DecisionEvent {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            domain: Domain::Risk,
            stakes: Some("high".to_string()),
            emotional_load: 0.4,
            urgency: 0.3,
            ministers_called: vec![MinisterId::Risk, MinisterId::Truth],
            verdict_summary: "ADVANCE".to_string(),
            posture: "confident".to_string(),
            illusions_detected: vec![],
            contradictions_found: 0,
            mode: Mode::Normal,
            sovereign_action: None,
            action_followed_counsel: None,
            override_reason: None,
        }
    }

    #[test]
    fn append_and_read_back_event() {
        let ledger = Ledger::open_in_memory().unwrap();
        let event = sample_event();
        ledger.append_event(&event).unwrap();
        let fetched = ledger.get_event(event.event_id).unwrap().unwrap();
        assert_eq!(fetched.domain, Domain::Risk);
        assert_eq!(fetched.ministers_called, vec![MinisterId::Risk, MinisterId::Truth]);
    }

    // §8 invariant 11: events are append-only.
    #[test]
    fn update_on_events_is_forbidden() {
        let ledger = Ledger::open_in_memory().unwrap();
        let event = sample_event();
        ledger.append_event(&event).unwrap();
        let result = ledger.conn.execute(
            "UPDATE events SET posture = 'tampered' WHERE event_id = ?1",
            params![event.event_id.to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn outcome_references_event_by_id() {
        let ledger = Ledger::open_in_memory().unwrap();
        let event = sample_event();
        ledger.append_event(&event).unwrap();
        let outcome = Outcome {
            event_id: event.event_id,
            resolved_at: Utc::now(),
            result: OutcomeResult::Success,
            damage: 0.1,
            benefit: 0.8,
            lessons: vec!["lesson".to_string()],
        };
        ledger.append_outcome(&outcome).unwrap();
        let all = ledger.all_outcomes().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].event_id, event.event_id);
    }

    #[test]
    fn calibration_upsert_replaces_existing_row() {
        let ledger = Ledger::open_in_memory().unwrap();
        let mut cal = Calibration::baseline("n", Some(Domain::Risk));
        ledger.upsert_calibration(&cal).unwrap();
        cal.caution = 0.5;
        ledger.upsert_calibration(&cal).unwrap();

        let fetched = ledger.get_calibration("n", Some(Domain::Risk)).unwrap().unwrap();
        assert_eq!(fetched.caution, 0.5);
    }
}
