//! Checkpoint store
//!
//! One JSON file per `req_id`, rewritten after every node transition so a
//! restarted process can resume from the last good state. Resume takes an
//! advisory per-`req_id` lock; a second resumer is refused, not queued.

use std::fs;
use std::path::PathBuf;

use dashmap::DashMap;
use tracing::debug;
use webpilot_core_types::{ReqId, RunState};

use crate::OrchestratorError;

pub struct CheckpointStore {
    dir: PathBuf,
    locks: DashMap<String, ()>,
}

impl CheckpointStore {
    pub fn new(dir: PathBuf) -> Result<Self, OrchestratorError> {
        fs::create_dir_all(&dir).map_err(|e| OrchestratorError::Checkpoint(e.to_string()))?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    fn path_for(&self, req_id: &ReqId) -> PathBuf {
        self.dir.join(format!("{}.json", req_id.0))
    }

    pub fn save(&self, state: &RunState) -> Result<(), OrchestratorError> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| OrchestratorError::Checkpoint(e.to_string()))?;
        fs::write(self.path_for(&state.req_id), json)
            .map_err(|e| OrchestratorError::Checkpoint(e.to_string()))?;
        Ok(())
    }

    pub fn load(&self, req_id: &ReqId) -> Result<Option<RunState>, OrchestratorError> {
        let path = self.path_for(req_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes =
            fs::read(&path).map_err(|e| OrchestratorError::Checkpoint(e.to_string()))?;
        let state = serde_json::from_slice(&bytes)
            .map_err(|e| OrchestratorError::Checkpoint(e.to_string()))?;
        Ok(Some(state))
    }

    pub fn remove(&self, req_id: &ReqId) {
        let _ = fs::remove_file(self.path_for(req_id));
        self.locks.remove(&req_id.0);
    }

    /// Advisory lock for resumption; concurrent resume attempts on the
    /// same `req_id` are refused.
    pub fn acquire_resume_lock(&self, req_id: &ReqId) -> Result<(), OrchestratorError> {
        match self.locks.entry(req_id.0.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(OrchestratorError::Resume(
                format!("run {} is already being resumed", req_id.0),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                debug!(req_id = %req_id.0, "resume lock acquired");
                Ok(())
            }
        }
    }

    pub fn release_resume_lock(&self, req_id: &ReqId) {
        self.locks.remove(&req_id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::{ActionKind, Intent, PlanStep};

    fn sample_state() -> RunState {
        RunState::new(
            ReqId::from("ckpt-1"),
            "https://example.org",
            vec![PlanStep::new(Intent::new("Save", ActionKind::Click))],
        )
    }

    #[test]
    fn checkpoints_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().to_path_buf()).unwrap();
        let mut state = sample_state();
        state.step_idx = 1;
        store.save(&state).unwrap();

        let loaded = store.load(&ReqId::from("ckpt-1")).unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(store.load(&ReqId::from("missing")).unwrap().is_none());
    }

    #[test]
    fn resume_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().to_path_buf()).unwrap();
        let req_id = ReqId::from("ckpt-2");
        store.acquire_resume_lock(&req_id).unwrap();
        assert!(store.acquire_resume_lock(&req_id).is_err());
        store.release_resume_lock(&req_id);
        store.acquire_resume_lock(&req_id).unwrap();
    }
}
