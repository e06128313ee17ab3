use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use super::{Collaborators, PersistenceError, RelationshipLearner};
use crate::settings::LearningConfig;

/// Explicitly owned learners keyed by user id. Each learner sits behind its
/// own mutex, which serializes learning calls per user while different users
/// proceed independently.
pub struct LearnerRegistry {
    config: LearningConfig,
    deps: Collaborators,
    learners: Mutex<HashMap<String, Arc<Mutex<RelationshipLearner>>>>,
}

impl LearnerRegistry {
    pub fn new(config: LearningConfig, deps: Collaborators) -> Self {
        Self {
            config,
            deps,
            learners: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.deps
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<RelationshipLearner>>>> {
        // A poisoned map still holds valid Arcs; keep serving them.
        self.learners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The user's learner, loading it from the store on first access.
    pub fn get_or_create(&self, user_id: &str) -> Arc<Mutex<RelationshipLearner>> {
        let mut map = self.map();
        Arc::clone(map.entry(user_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(RelationshipLearner::new(
                user_id,
                self.config.clone(),
                self.deps.clone(),
            )))
        }))
    }

    pub fn get(&self, user_id: &str) -> Option<Arc<Mutex<RelationshipLearner>>> {
        self.map().get(user_id).cloned()
    }

    /// Save and drop the user's learner.
    pub fn remove(&self, user_id: &str) -> Result<bool, PersistenceError> {
        let Some(learner) = self.map().remove(user_id) else {
            return Ok(false);
        };
        let mut learner = learner.lock().unwrap_or_else(|e| e.into_inner());
        learner.save_if_dirty()?;
        Ok(true)
    }

    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.map().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<Mutex<RelationshipLearner>>> {
        self.map().values().cloned().collect()
    }

    /// Save every dirty learner. Returns (saved, failed); failures are logged
    /// and retried on the next call.
    pub fn save_all(&self) -> (usize, usize) {
        let mut saved = 0;
        let mut failed = 0;
        for learner in self.snapshot() {
            let mut learner = learner.lock().unwrap_or_else(|e| e.into_inner());
            match learner.save_if_dirty() {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    warn!(user_id = learner.user_id(), "autosave failed: {e}");
                }
            }
        }
        (saved, failed)
    }

    /// Decay every learner. Returns the number of relations removed.
    pub fn decay_all(&self) -> usize {
        self.snapshot()
            .into_iter()
            .map(|learner| {
                let mut learner = learner.lock().unwrap_or_else(|e| e.into_inner());
                learner.apply_decay().removed
            })
            .sum()
    }
}
