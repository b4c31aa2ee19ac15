//! Clears drafts of inactive roles when the user navigates.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::drafts::{all_role_keys, draft_key, draft_owner, lock, DraftStore, Role};

/// Outcome of reaping after a navigation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReapReport {
    pub role: Role,
    /// Draft key left in place for the active role
    pub kept: String,
    /// Keys that held a draft and were removed
    pub cleared: Vec<String>,
}

/// Route-change handler removing other roles' drafts for the current user.
pub struct RoleChangeReaper {
    store: Arc<DraftStore>,
    last_seen: Mutex<Option<(String, String)>>,
}

impl RoleChangeReaper {
    pub fn new(store: Arc<DraftStore>) -> Self {
        Self {
            store,
            last_seen: Mutex::new(None),
        }
    }

    /// Handle a navigation event.
    ///
    /// Returns `None` when `(pathname, user_id)` repeats the previous event. User ids
    /// are compared by draft owner, so absent and blank ids are the same user.
    pub fn on_route_change(&self, pathname: &str, user_id: Option<&str>) -> Option<ReapReport> {
        {
            let mut last_seen = lock(&self.last_seen);
            let current = (pathname.to_string(), draft_owner(user_id).to_string());
            if last_seen.as_ref() == Some(&current) {
                return None;
            }
            *last_seen = Some(current);
        }

        let role = Role::from_path(pathname);
        Some(reap_other_roles(&self.store, user_id, role))
    }
}

/// Clear every draft of `user_id` except the one for `role`.
pub fn reap_other_roles(store: &DraftStore, user_id: Option<&str>, role: Role) -> ReapReport {
    let kept = draft_key(user_id, role);
    let cleared: Vec<String> = all_role_keys(user_id)
        .into_iter()
        .filter(|key| *key != kept)
        .filter(|key| store.clear_draft(key))
        .collect();

    if !cleared.is_empty() {
        tracing::info!("Role {} active, cleared drafts {:?}", role, cleared);
    }

    ReapReport {
        role,
        kept,
        cleared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded_store(user_id: Option<&str>, roles: &[Role]) -> Arc<DraftStore> {
        let store = Arc::new(DraftStore::in_memory());
        for role in roles {
            store.set_draft(&draft_key(user_id, *role), json!({"role": role.as_str()}));
        }
        store
    }

    #[test]
    fn test_navigation_keeps_only_current_role() {
        let store = seeded_store(Some("u1"), &[Role::User, Role::Organizer, Role::Academy]);
        let reaper = RoleChangeReaper::new(store.clone());

        let report = reaper
            .on_route_change("/profile/organizer/edit", Some("u1"))
            .unwrap();

        assert_eq!(report.role, Role::Organizer);
        assert_eq!(report.cleared.len(), 2);
        assert!(store.get_draft(&draft_key(Some("u1"), Role::Organizer)).is_some());
        assert!(store.get_draft(&draft_key(Some("u1"), Role::User)).is_none());
        assert!(store.get_draft(&draft_key(Some("u1"), Role::Academy)).is_none());
    }

    #[test]
    fn test_other_users_are_untouched() {
        let store = seeded_store(Some("u2"), &[Role::Academy]);
        store.set_draft(&draft_key(Some("u1"), Role::Academy), json!({}));
        let reaper = RoleChangeReaper::new(store.clone());

        reaper.on_route_change("/profile/teacher", Some("u1"));

        assert!(store.get_draft(&draft_key(Some("u2"), Role::Academy)).is_some());
        assert!(store.get_draft(&draft_key(Some("u1"), Role::Academy)).is_none());
    }

    #[test]
    fn test_repeated_event_is_ignored() {
        let store = seeded_store(Some("u1"), &[Role::User]);
        let reaper = RoleChangeReaper::new(store.clone());

        assert!(reaper.on_route_change("/academia", Some("u1")).is_some());
        store.set_draft(&draft_key(Some("u1"), Role::User), json!({}));
        assert!(reaper.on_route_change("/academia", Some("u1")).is_none());
        assert!(store.get_draft(&draft_key(Some("u1"), Role::User)).is_some());

        // A user change with the same path counts as a new event.
        assert!(reaper.on_route_change("/academia", None).is_some());
    }

    #[test]
    fn test_blank_user_id_repeats_anonymous_event() {
        let store = seeded_store(None, &[Role::User]);
        let reaper = RoleChangeReaper::new(store.clone());

        assert!(reaper.on_route_change("/marca", None).is_some());
        store.set_draft(&draft_key(None, Role::User), json!({}));
        assert!(reaper.on_route_change("/marca", Some("")).is_none());
        assert!(reaper.on_route_change("/marca", Some("  ")).is_none());
        assert!(store.get_draft(&draft_key(None, Role::User)).is_some());
    }

    #[test]
    fn test_unknown_route_falls_back_to_user_role() {
        let store = seeded_store(None, &[Role::User, Role::Brand]);
        let reaper = RoleChangeReaper::new(store.clone());

        let report = reaper.on_route_change("/events/42", None).unwrap();

        assert_eq!(report.role, Role::User);
        assert_eq!(report.cleared, vec![draft_key(None, Role::Brand)]);
        assert!(store.get_draft(&draft_key(None, Role::User)).is_some());
    }
}
