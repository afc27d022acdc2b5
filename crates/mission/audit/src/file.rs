//! File-backed audit log and plan store
//!
//! Each mission's trail is a JSON-lines file, `<dir>/<mission_id>.jsonl`,
//! appended and synced one event at a time. Each plan is a single JSON file,
//! `<dir>/<workflow_id>.json`.

use crate::chain::ChainHead;
use crate::traits::{AuditLog, PlanStore};
use crate::{AuditError, AuditResult};
use async_trait::async_trait;
use mission_types::{AuditAppend, AuditEvent, ExecutionPlan, MissionId, WorkflowId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};

const FEED_CAPACITY: usize = 256;

/// Turn an identifier into a safe, unique file stem.
///
/// `[A-Za-z0-9-]` is kept; every other byte becomes `_xx` in lowercase hex,
/// `_` included, so distinct ids never share a file.
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{:02x}", byte));
        }
    }
    stem
}

// ── Audit log ────────────────────────────────────────────────────────

/// Audit log persisted as one JSON-lines file per mission
pub struct FileAuditLog {
    dir: PathBuf,
    /// Chain heads of missions touched by this process. Held across the
    /// write so sequence assignment and persistence stay in one order.
    heads: Mutex<HashMap<MissionId, ChainHead>>,
    feed: broadcast::Sender<AuditEvent>,
}

impl FileAuditLog {
    /// Open (creating if needed) an audit directory.
    pub async fn open(dir: impl Into<PathBuf>) -> AuditResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        tracing::debug!(dir = %dir.display(), "Opened file audit log");
        Ok(Self {
            dir,
            heads: Mutex::new(HashMap::new()),
            feed,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn trail_path(&self, mission_id: &MissionId) -> PathBuf {
        self.dir
            .join(format!("{}.jsonl", file_stem(mission_id.as_str())))
    }

    async fn read_trail(&self, mission_id: &MissionId) -> AuditResult<Vec<AuditEvent>> {
        let path = self.trail_path(mission_id);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(line).map_err(|e| {
                AuditError::Integrity(format!(
                    "{}:{}: unreadable event: {}",
                    path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            events.push(event);
        }
        Ok(events)
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, event: AuditAppend) -> AuditResult<AuditEvent> {
        let mut heads = self.heads.lock().await;

        let mission_id = event.mission_id.clone();
        if !heads.contains_key(&mission_id) {
            let existing = self.read_trail(&mission_id).await?;
            heads.insert(mission_id.clone(), ChainHead::from_last(existing.last()));
        }

        // Seal a copy so a failed write leaves the head untouched.
        let mut head = heads.get(&mission_id).cloned().unwrap_or_default();
        let record = head.seal(event)?;

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.trail_path(&mission_id))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        file.sync_data().await?;

        heads.insert(mission_id, head);
        drop(heads);

        let _ = self.feed.send(record.clone());
        Ok(record)
    }

    async fn events_for(&self, mission_id: &MissionId) -> AuditResult<Vec<AuditEvent>> {
        self.read_trail(mission_id).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.feed.subscribe()
    }
}

// ── Plan store ───────────────────────────────────────────────────────

/// Plan store persisted as one JSON file per plan
pub struct FilePlanStore {
    dir: PathBuf,
}

impl FilePlanStore {
    pub async fn open(dir: impl Into<PathBuf>) -> AuditResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn plan_path(&self, workflow_id: &WorkflowId) -> PathBuf {
        self.dir
            .join(format!("{}.json", file_stem(workflow_id.as_str())))
    }
}

#[async_trait]
impl PlanStore for FilePlanStore {
    async fn save_plan(&self, plan: &ExecutionPlan) -> AuditResult<()> {
        if let Some(existing) = self.load_plan(&plan.workflow_id).await? {
            if &existing != plan {
                return Err(AuditError::Conflict(format!(
                    "plan {} already stored with different content",
                    plan.workflow_id
                )));
            }
            return Ok(());
        }
        let body = serde_json::to_vec_pretty(plan)?;
        fs::write(self.plan_path(&plan.workflow_id), body).await?;
        tracing::debug!(workflow_id = %plan.workflow_id, "Stored plan");
        Ok(())
    }

    async fn load_plan(&self, workflow_id: &WorkflowId) -> AuditResult<Option<ExecutionPlan>> {
        match fs::read(self.plan_path(workflow_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_plans(&self) -> AuditResult<Vec<WorkflowId>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            let plan: ExecutionPlan = serde_json::from_slice(&bytes)?;
            ids.push(plan.workflow_id);
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mission_types::{
        ActionType, AuditEventKind, Confidence, ExecutionStep, PlanSource, RiskAssessment,
        RiskLevel,
    };

    #[tokio::test]
    async fn test_trail_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mission = MissionId::new("mission-1");

        let first = {
            let log = FileAuditLog::open(dir.path()).await.unwrap();
            log.append(AuditAppend::new(
                mission.clone(),
                AuditEventKind::Started,
                "phase one",
            ))
            .await
            .unwrap()
        };

        let log = FileAuditLog::open(dir.path()).await.unwrap();
        let second = log
            .append(AuditAppend::new(
                mission.clone(),
                AuditEventKind::Succeeded,
                "phase one",
            ))
            .await
            .unwrap();

        assert_eq!(second.sequence, 2);
        assert_eq!(second.previous_hash, Some(first.hash));
        let events = log.events_for(&mission).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(log.verify(&mission).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_tampered_file_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let mission = MissionId::new("mission-2");
        let log = FileAuditLog::open(dir.path()).await.unwrap();
        for kind in [AuditEventKind::Started, AuditEventKind::Succeeded] {
            log.append(AuditAppend::new(mission.clone(), kind, "ok"))
                .await
                .unwrap();
        }

        let path = dir.path().join("mission-2.jsonl");
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, contents.replacen("\"ok\"", "\"forged\"", 1)).unwrap();

        let report = log.verify(&mission).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.broken_at, Some(1));
    }

    #[tokio::test]
    async fn test_ids_are_sanitised_for_paths() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::open(dir.path()).await.unwrap();
        let mission = MissionId::new("../escape");
        log.append(AuditAppend::new(mission.clone(), AuditEventKind::Started, ""))
            .await
            .unwrap();
        assert!(dir.path().join("_2e_2e_2fescape.jsonl").exists());
    }

    #[test]
    fn test_file_stem_is_injective() {
        assert_eq!(file_stem("mission-1"), "mission-1");
        assert_eq!(file_stem("job/1"), "job_2f1");
        assert_eq!(file_stem("job_1"), "job_5f1");
        assert_eq!(file_stem("job_2f1"), "job_5f2f1");
        assert_eq!(file_stem("café"), "caf_c3_a9");
    }

    #[tokio::test]
    async fn test_similar_ids_keep_separate_trails() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::open(dir.path()).await.unwrap();
        let slash = MissionId::new("job/1");
        let underscore = MissionId::new("job_1");

        log.append(AuditAppend::new(slash.clone(), AuditEventKind::Started, "a"))
            .await
            .unwrap();
        let second = log
            .append(AuditAppend::new(underscore.clone(), AuditEventKind::Started, "b"))
            .await
            .unwrap();
        assert_eq!(second.sequence, 1);

        // A fresh process reloads each chain head from its own file.
        let reopened = FileAuditLog::open(dir.path()).await.unwrap();
        for mission in [&slash, &underscore] {
            let events = reopened.events_for(mission).await.unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(&events[0].mission_id, mission);
            assert!(reopened.verify(mission).await.unwrap().valid);
        }
    }

    #[tokio::test]
    async fn test_plan_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::open(dir.path()).await.unwrap();
        let plan = ExecutionPlan::new(
            "Plan",
            "desc",
            vec![ExecutionStep::new(
                "s1",
                "Read total",
                ActionType::Extract,
                Confidence::High,
                8,
            )],
            RiskAssessment::new(RiskLevel::Low),
            PlanSource::Reasoning,
        );
        store.save_plan(&plan).await.unwrap();

        let reopened = FilePlanStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.load_plan(&plan.workflow_id).await.unwrap(), Some(plan.clone()));
        assert_eq!(reopened.list_plans().await.unwrap(), vec![plan.workflow_id.clone()]);
        assert!(reopened
            .load_plan(&WorkflowId::new("missing"))
            .await
            .unwrap()
            .is_none());
    }
}
