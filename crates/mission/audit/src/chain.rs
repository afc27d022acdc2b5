//! Per-mission hash chain
//!
//! Every mission has its own chain: sequence numbers start at 1 and each
//! event carries the hash of its predecessor. Timestamps are clamped so a
//! mission's trail never runs backwards even if the wall clock does.

use crate::{AuditError, AuditResult};
use chrono::{DateTime, Utc};
use mission_types::{AuditAppend, AuditEvent, MissionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tail of a mission's chain
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChainHead {
    pub sequence: u64,
    pub last_hash: Option<String>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl ChainHead {
    /// Rebuild the head from the last stored event.
    pub fn from_last(event: Option<&AuditEvent>) -> Self {
        match event {
            Some(e) => Self {
                sequence: e.sequence,
                last_hash: Some(e.hash.clone()),
                last_timestamp: Some(e.timestamp),
            },
            None => Self::default(),
        }
    }

    /// Turn an append request into the next stored event and advance the head.
    pub fn seal(&mut self, append: AuditAppend) -> AuditResult<AuditEvent> {
        let timestamp = match self.last_timestamp {
            Some(last) if append.timestamp < last => last,
            _ => append.timestamp,
        };

        let mut event = AuditEvent {
            event_id: format!("audit-{}", Uuid::new_v4()),
            mission_id: append.mission_id,
            sequence: self.sequence + 1,
            timestamp,
            kind: append.kind,
            phase_id: append.phase_id,
            step_id: append.step_id,
            detail: append.detail,
            previous_hash: self.last_hash.clone(),
            hash: String::new(),
        };
        event.hash = compute_event_hash(&event)?;

        self.sequence = event.sequence;
        self.last_hash = Some(event.hash.clone());
        self.last_timestamp = Some(event.timestamp);
        Ok(event)
    }
}

/// blake3 over the canonical JSON form of everything except the hash itself.
pub fn compute_event_hash(event: &AuditEvent) -> AuditResult<String> {
    let serializable = serde_json::json!({
        "event_id": event.event_id,
        "mission_id": event.mission_id,
        "sequence": event.sequence,
        "timestamp": event.timestamp,
        "kind": event.kind,
        "phase_id": event.phase_id,
        "step_id": event.step_id,
        "detail": event.detail,
        "previous_hash": event.previous_hash,
    });
    let serialized = serde_json::to_vec(&serializable)?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}

/// Result of checking a mission's trail
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub mission_id: MissionId,
    pub events: usize,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Recompute and check every link of a mission's trail.
pub fn verify_chain(mission_id: &MissionId, events: &[AuditEvent]) -> ChainVerification {
    match check_links(mission_id, events) {
        Ok(()) => ChainVerification {
            mission_id: mission_id.clone(),
            events: events.len(),
            valid: true,
            broken_at: None,
            reason: None,
        },
        Err((sequence, err)) => ChainVerification {
            mission_id: mission_id.clone(),
            events: events.len(),
            valid: false,
            broken_at: Some(sequence),
            reason: Some(err.to_string()),
        },
    }
}

fn check_links(mission_id: &MissionId, events: &[AuditEvent]) -> Result<(), (u64, AuditError)> {
    let mut previous: Option<&AuditEvent> = None;
    for (position, event) in events.iter().enumerate() {
        let expected_sequence = position as u64 + 1;
        let fail = |msg: String| Err((expected_sequence, AuditError::Integrity(msg)));

        if &event.mission_id != mission_id {
            return fail(format!("event {} belongs to {}", event.event_id, event.mission_id));
        }
        if event.sequence != expected_sequence {
            return fail(format!(
                "expected sequence {}, found {}",
                expected_sequence, event.sequence
            ));
        }
        let expected_previous = previous.map(|p| p.hash.as_str());
        if event.previous_hash.as_deref() != expected_previous {
            return fail("previous hash does not match predecessor".to_string());
        }
        if let Some(p) = previous {
            if event.timestamp < p.timestamp {
                return fail("timestamp runs backwards".to_string());
            }
        }
        let recomputed = compute_event_hash(event).map_err(|e| (expected_sequence, e))?;
        if recomputed != event.hash {
            return fail("hash does not match event contents".to_string());
        }
        previous = Some(event);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mission_types::AuditEventKind;

    fn append(mission: &MissionId, kind: AuditEventKind) -> AuditAppend {
        AuditAppend::new(mission.clone(), kind, "detail")
    }

    #[test]
    fn test_seal_links_events() {
        let mission = MissionId::new("m-1");
        let mut head = ChainHead::default();
        let first = head.seal(append(&mission, AuditEventKind::Started)).unwrap();
        let second = head.seal(append(&mission, AuditEventKind::Succeeded)).unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(first.previous_hash, None);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.previous_hash, Some(first.hash.clone()));
        assert!(verify_chain(&mission, &[first, second]).valid);
    }

    #[test]
    fn test_timestamps_are_clamped() {
        let mission = MissionId::new("m-1");
        let mut head = ChainHead::default();
        let first = head.seal(append(&mission, AuditEventKind::Started)).unwrap();

        let mut early = append(&mission, AuditEventKind::Succeeded);
        early.timestamp = first.timestamp - Duration::seconds(30);
        let second = head.seal(early).unwrap();
        assert_eq!(second.timestamp, first.timestamp);
    }

    #[test]
    fn test_tampering_is_detected() {
        let mission = MissionId::new("m-1");
        let mut head = ChainHead::default();
        let first = head.seal(append(&mission, AuditEventKind::Started)).unwrap();
        let mut second = head.seal(append(&mission, AuditEventKind::Failed)).unwrap();
        second.detail = "rewritten".to_string();

        let report = verify_chain(&mission, &[first, second]);
        assert!(!report.valid);
        assert_eq!(report.broken_at, Some(2));
    }

    #[test]
    fn test_gap_is_detected() {
        let mission = MissionId::new("m-1");
        let mut head = ChainHead::default();
        let _first = head.seal(append(&mission, AuditEventKind::Started)).unwrap();
        let second = head.seal(append(&mission, AuditEventKind::Succeeded)).unwrap();

        let report = verify_chain(&mission, &[second]);
        assert!(!report.valid);
        assert_eq!(report.broken_at, Some(1));
    }

    #[test]
    fn test_head_resumes_from_last_event() {
        let mission = MissionId::new("m-1");
        let mut head = ChainHead::default();
        let first = head.seal(append(&mission, AuditEventKind::Started)).unwrap();

        let mut resumed = ChainHead::from_last(Some(&first));
        let second = resumed.seal(append(&mission, AuditEventKind::Succeeded)).unwrap();
        assert!(verify_chain(&mission, &[first, second]).valid);
    }
}
