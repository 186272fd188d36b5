use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, ScouterError};
use crate::tracker::TrackingResult;

use super::manager::InstanceManager;
use super::state::InstanceState;

/// Cloneable handle to an [`InstanceManager`] shared between a writer and
/// any number of readers. The lock is held only while updating or copying
/// a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SharedInstanceManager {
    inner: Arc<Mutex<InstanceManager>>,
}

impl SharedInstanceManager {
    pub fn new(manager: InstanceManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, InstanceManager>> {
        self.inner.lock().map_err(|_| ScouterError::LockPoisoned)
    }

    pub fn update(&self, result: &TrackingResult) -> Result<Vec<InstanceState>> {
        self.lock()?.update(result)
    }

    pub fn get_current_states(&self) -> Result<Vec<InstanceState>> {
        Ok(self.lock()?.get_current_states())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}
