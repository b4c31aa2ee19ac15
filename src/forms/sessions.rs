//! Registry of mounted form controllers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use super::{HydrateOptions, HydrationController};
use crate::drafts::{draft_key, lock, DraftStore, Role};
use crate::errors::FormError;

/// Form instances mounted through the API, addressed by session id.
///
/// A draft key belongs to at most one session; mounting the same key again
/// supersedes the older session.
pub struct FormSessions {
    store: Arc<DraftStore>,
    sessions: Mutex<HashMap<Uuid, HydrationController>>,
}

/// Parameters for mounting a form.
pub struct MountSpec<'a> {
    pub user_id: Option<&'a str>,
    pub role: Role,
    pub defaults: Value,
    pub server_data: Option<&'a Value>,
    pub options: HydrateOptions,
    /// Leave the form unhydrated until server data is supplied
    pub defer_hydration: bool,
}

impl FormSessions {
    pub fn new(store: Arc<DraftStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Mount a form and return its session id.
    pub fn mount(&self, spec: MountSpec<'_>) -> Result<Uuid, FormError> {
        let key = draft_key(spec.user_id, spec.role);
        let store = self.store.clone();
        let controller = if spec.defer_hydration {
            HydrationController::new(store, key, spec.defaults, spec.options)?
        } else {
            HydrationController::mount(store, key, spec.defaults, spec.server_data, spec.options)?
        };

        let id = Uuid::new_v4();
        let mut sessions = lock(&self.sessions);
        sessions.retain(|existing, other| {
            let superseded = other.key() == controller.key();
            if superseded {
                tracing::warn!(
                    "Session {} superseded by {} for draft {}",
                    existing,
                    id,
                    other.key()
                );
            }
            !superseded
        });
        tracing::info!("Mounted form {} on draft {}", id, controller.key());
        sessions.insert(id, controller);
        Ok(id)
    }

    /// Run `f` against a mounted session. Returns `None` for unknown ids.
    pub fn with_session<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut HydrationController) -> R,
    ) -> Option<R> {
        lock(&self.sessions).get_mut(&id).map(f)
    }

    /// Drop a session. Its draft stays in the store.
    pub fn unmount(&self, id: Uuid) -> bool {
        let removed = lock(&self.sessions).remove(&id).is_some();
        if removed {
            tracing::info!("Unmounted form {}", id);
        }
        removed
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }
}
