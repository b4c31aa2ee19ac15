//! Per-form hydration and mutation.
//!
//! A controller computes the form's initial value exactly once from draft, server
//! data and defaults. After that only the user's own edits change it, and each edit
//! is mirrored into the draft store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::drafts::{deep_merge, DraftStore};
use crate::errors::FormError;

/// Hydration settings supplied by the form.
#[derive(Debug, Clone, Copy)]
pub struct HydrateOptions {
    /// Restore a saved draft in preference to server data
    pub prefer_draft: bool,
    /// Shape version of the form; drafts written under another version are discarded
    pub schema_version: Option<u32>,
}

impl Default for HydrateOptions {
    fn default() -> Self {
        Self {
            prefer_draft: true,
            schema_version: None,
        }
    }
}

/// Which source the hydrated value was layered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Draft,
    Server,
    Defaults,
}

#[derive(Debug)]
enum HydrationState {
    NotHydrated,
    Hydrated {
        form: Map<String, Value>,
        provenance: Provenance,
    },
}

/// Controller for one mounted form instance.
pub struct HydrationController {
    store: Arc<DraftStore>,
    key: String,
    defaults: Map<String, Value>,
    options: HydrateOptions,
    state: HydrationState,
}

impl HydrationController {
    /// Create an unhydrated controller. `defaults` must be a JSON object.
    pub fn new(
        store: Arc<DraftStore>,
        key: impl Into<String>,
        defaults: Value,
        options: HydrateOptions,
    ) -> Result<Self, FormError> {
        let Value::Object(defaults) = defaults else {
            return Err(FormError::NotAnObject("defaults"));
        };

        Ok(Self {
            store,
            key: key.into(),
            defaults,
            options,
            state: HydrationState::NotHydrated,
        })
    }

    /// Create a controller and hydrate it immediately.
    pub fn mount(
        store: Arc<DraftStore>,
        key: impl Into<String>,
        defaults: Value,
        server_data: Option<&Value>,
        options: HydrateOptions,
    ) -> Result<Self, FormError> {
        let mut controller = Self::new(store, key, defaults, options)?;
        controller.hydrate(server_data);
        Ok(controller)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_hydrated(&self) -> bool {
        matches!(self.state, HydrationState::Hydrated { .. })
    }

    /// The live form value, once hydrated.
    pub fn form(&self) -> Option<&Map<String, Value>> {
        match &self.state {
            HydrationState::Hydrated { form, .. } => Some(form),
            HydrationState::NotHydrated => None,
        }
    }

    /// Owned copy of the live form value as JSON.
    pub fn snapshot(&self) -> Option<Value> {
        self.form().cloned().map(Value::Object)
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match &self.state {
            HydrationState::Hydrated { provenance, .. } => Some(*provenance),
            HydrationState::NotHydrated => None,
        }
    }

    /// Compute the initial form value. Only the first call has any effect.
    ///
    /// Returns whether this call performed the hydration.
    pub fn hydrate(&mut self, server_data: Option<&Value>) -> bool {
        if self.is_hydrated() {
            tracing::debug!("Ignoring server data for already hydrated form {}", self.key);
            return false;
        }

        let base = Value::Object(self.defaults.clone());
        let server_data = server_data.filter(|data| !data.is_null());

        let (merged, provenance) = match self.usable_draft() {
            Some(draft) => (deep_merge(&base, &draft), Provenance::Draft),
            None => match server_data {
                Some(data) => (deep_merge(&base, data), Provenance::Server),
                None => (base, Provenance::Defaults),
            },
        };

        // A non-object server payload replaces the root; fall back to defaults.
        let form = match merged {
            Value::Object(form) => form,
            other => {
                tracing::warn!(
                    "Discarding non-object {:?} hydration source for {}: {}",
                    provenance,
                    self.key,
                    other
                );
                self.defaults.clone()
            }
        };

        tracing::debug!("Hydrated form {} from {:?}", self.key, provenance);
        self.state = HydrationState::Hydrated { form, provenance };
        true
    }

    fn usable_draft(&self) -> Option<Value> {
        if !self.options.prefer_draft {
            return None;
        }
        let record = self.store.get_draft(&self.key)?;

        if let Some(expected) = self.options.schema_version {
            if record.schema_version != Some(expected) {
                tracing::info!(
                    "Discarding draft {} written for schema {:?}, form expects {}",
                    self.key,
                    record.schema_version,
                    expected
                );
                self.store.clear_draft(&self.key);
                return None;
            }
        }

        if !record.value.is_object() {
            tracing::warn!("Discarding non-object draft {}: {}", self.key, record.value);
            self.store.clear_draft(&self.key);
            return None;
        }

        Some(record.value)
    }

    fn form_mut(&mut self) -> Result<&mut Map<String, Value>, FormError> {
        match &mut self.state {
            HydrationState::Hydrated { form, .. } => Ok(form),
            HydrationState::NotHydrated => Err(FormError::NotHydrated),
        }
    }

    /// Replace one top-level field.
    pub fn set_field(&mut self, key: &str, value: Value) -> Result<&Map<String, Value>, FormError> {
        self.form_mut()?.insert(key.to_string(), value);
        self.persist()
    }

    /// Replace the whole form value.
    pub fn set_all(&mut self, next: Value) -> Result<&Map<String, Value>, FormError> {
        let Value::Object(next) = next else {
            return Err(FormError::NotAnObject("form"));
        };
        *self.form_mut()? = next;
        self.persist()
    }

    /// Assign a value at a dot-separated path such as `redes_sociales.instagram`.
    ///
    /// Missing intermediate segments, and ones holding a non-object value, become
    /// empty objects.
    pub fn set_nested(
        &mut self,
        path: &str,
        value: Value,
    ) -> Result<&Map<String, Value>, FormError> {
        let segments = parse_path(path)?;
        assign_path(self.form_mut()?, &segments, value);
        self.persist()
    }

    /// Forget this form's draft after the server accepted a save.
    pub fn clear_draft(&self) -> bool {
        self.store.clear_draft(&self.key)
    }

    fn persist(&self) -> Result<&Map<String, Value>, FormError> {
        let HydrationState::Hydrated { form, .. } = &self.state else {
            return Err(FormError::NotHydrated);
        };
        self.store.set_versioned_draft(
            &self.key,
            Value::Object(form.clone()),
            self.options.schema_version,
        );
        Ok(form)
    }
}

fn parse_path(path: &str) -> Result<Vec<&str>, FormError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(FormError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn assign_path(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            map.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                assign_path(child, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Arc<DraftStore> {
        Arc::new(DraftStore::in_memory())
    }

    fn prefer_server() -> HydrateOptions {
        HydrateOptions {
            prefer_draft: false,
            ..HydrateOptions::default()
        }
    }

    #[test]
    fn test_empty_server_data_yields_defaults() {
        let defaults = json!({"nombre": "", "zonas": [], "redes": {"instagram": ""}});
        let form = HydrationController::mount(
            store(),
            "k",
            defaults.clone(),
            Some(&json!({})),
            HydrateOptions::default(),
        )
        .unwrap();

        assert_eq!(form.snapshot().unwrap(), defaults);
        assert_eq!(form.provenance(), Some(Provenance::Server));
    }

    #[test]
    fn test_defaults_when_no_sources() {
        let form = HydrationController::mount(
            store(),
            "k",
            json!({"a": 1}),
            None,
            HydrateOptions::default(),
        )
        .unwrap();

        assert_eq!(form.snapshot().unwrap(), json!({"a": 1}));
        assert_eq!(form.provenance(), Some(Provenance::Defaults));
    }

    #[test]
    fn test_draft_takes_precedence_over_server() {
        let store = store();
        store.set_draft("k", json!({"a": 5}));

        let form = HydrationController::mount(
            store.clone(),
            "k",
            json!({"a": 1, "b": 2}),
            Some(&json!({"a": 9})),
            HydrateOptions::default(),
        )
        .unwrap();
        assert_eq!(form.snapshot().unwrap(), json!({"a": 5, "b": 2}));
        assert_eq!(form.provenance(), Some(Provenance::Draft));

        let form = HydrationController::mount(
            store,
            "k",
            json!({"a": 1, "b": 2}),
            Some(&json!({"a": 9})),
            prefer_server(),
        )
        .unwrap();
        assert_eq!(form.snapshot().unwrap(), json!({"a": 9, "b": 2}));
    }

    #[test]
    fn test_server_used_when_no_draft() {
        let form = HydrationController::mount(
            store(),
            "k",
            json!({"a": 1, "b": 2}),
            Some(&json!({"a": 9})),
            HydrateOptions::default(),
        )
        .unwrap();
        assert_eq!(form.snapshot().unwrap(), json!({"a": 9, "b": 2}));
    }

    #[test]
    fn test_hydration_does_not_create_draft() {
        let store = store();
        let _form = HydrationController::mount(
            store.clone(),
            "k",
            json!({"a": 1}),
            Some(&json!({"a": 2})),
            HydrateOptions::default(),
        )
        .unwrap();
        assert!(store.get_draft("k").is_none());
    }

    #[test]
    fn test_hydrates_only_once() {
        let mut form = HydrationController::mount(
            store(),
            "k",
            json!({"nombre": "", "bio": ""}),
            Some(&json!({"nombre": "Server"})),
            HydrateOptions::default(),
        )
        .unwrap();

        form.set_field("nombre", json!("Typed")).unwrap();

        assert!(!form.hydrate(Some(&json!({"nombre": "Refetched", "bio": "new"}))));
        assert!(!form.hydrate(None));
        assert!(!form.hydrate(Some(&Value::Null)));
        assert_eq!(form.snapshot().unwrap(), json!({"nombre": "Typed", "bio": ""}));
    }

    #[test]
    fn test_deferred_hydration_ignores_null_server_data() {
        let mut form = HydrationController::new(
            store(),
            "k",
            json!({"a": 1}),
            HydrateOptions::default(),
        )
        .unwrap();
        assert!(!form.is_hydrated());
        assert!(form.form().is_none());

        assert!(form.hydrate(Some(&Value::Null)));
        assert_eq!(form.provenance(), Some(Provenance::Defaults));
        assert_eq!(form.snapshot().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_mutators_require_hydration() {
        let store = store();
        let mut form =
            HydrationController::new(store.clone(), "k", json!({}), HydrateOptions::default())
                .unwrap();

        assert_eq!(form.set_field("a", json!(1)).unwrap_err(), FormError::NotHydrated);
        assert_eq!(form.set_all(json!({})).unwrap_err(), FormError::NotHydrated);
        assert_eq!(
            form.set_nested("a.b", json!(1)).unwrap_err(),
            FormError::NotHydrated
        );
        assert!(store.get_draft("k").is_none());
    }

    #[test]
    fn test_defaults_must_be_object() {
        let result = HydrationController::new(store(), "k", json!([1]), HydrateOptions::default());
        assert_eq!(result.err(), Some(FormError::NotAnObject("defaults")));
    }

    #[test]
    fn test_set_field_persists_full_form() {
        let store = store();
        let mut form = HydrationController::mount(
            store.clone(),
            "draft:u1:academy",
            json!({"nombre": "", "zonas": []}),
            Some(&json!({"nombre": "Academia X", "zonas": [3, 7]})),
            HydrateOptions::default(),
        )
        .unwrap();

        form.set_field("nombre", json!("Academia Y")).unwrap();

        let record = store.get_draft("draft:u1:academy").unwrap();
        assert_eq!(record.value, json!({"nombre": "Academia Y", "zonas": [3, 7]}));
    }

    #[test]
    fn test_set_all_replaces_and_persists() {
        let store = store();
        let mut form = HydrationController::mount(
            store.clone(),
            "k",
            json!({"a": 1}),
            None,
            HydrateOptions::default(),
        )
        .unwrap();

        form.set_all(json!({"b": 2})).unwrap();
        assert_eq!(form.snapshot().unwrap(), json!({"b": 2}));
        assert_eq!(store.get_draft("k").unwrap().value, json!({"b": 2}));

        assert_eq!(
            form.set_all(json!("nope")).unwrap_err(),
            FormError::NotAnObject("form")
        );
    }

    #[test]
    fn test_set_nested_builds_missing_objects() {
        let mut form = HydrationController::mount(
            store(),
            "k",
            json!({}),
            None,
            HydrateOptions::default(),
        )
        .unwrap();
        let before = form.snapshot().unwrap();

        form.set_nested("redes.instagram.handle", json!("@x")).unwrap();

        assert_eq!(
            form.snapshot().unwrap(),
            json!({"redes": {"instagram": {"handle": "@x"}}})
        );
        assert_eq!(before, json!({}));
    }

    #[test]
    fn test_set_nested_keeps_siblings() {
        let mut form = HydrationController::mount(
            store(),
            "k",
            json!({"redes": {"instagram": "", "tiktok": "@t"}, "zonas": [1]}),
            None,
            HydrateOptions::default(),
        )
        .unwrap();

        form.set_nested("redes.instagram", json!("@i")).unwrap();
        assert_eq!(
            form.snapshot().unwrap(),
            json!({"redes": {"instagram": "@i", "tiktok": "@t"}, "zonas": [1]})
        );
    }

    #[test]
    fn test_set_nested_overwrites_scalar_segments() {
        let store = store();
        store.set_draft("k", json!({"redes": "legacy"}));
        let mut form = HydrationController::mount(
            store.clone(),
            "k",
            json!({}),
            None,
            HydrateOptions::default(),
        )
        .unwrap();

        form.set_nested("redes.web", json!("x.com")).unwrap();
        assert_eq!(store.get_draft("k").unwrap().value, json!({"redes": {"web": "x.com"}}));
    }

    #[test]
    fn test_set_nested_rejects_invalid_paths() {
        let mut form = HydrationController::mount(
            store(),
            "k",
            json!({}),
            None,
            HydrateOptions::default(),
        )
        .unwrap();

        for path in ["", "a..b", ".a", "a."] {
            assert_eq!(
                form.set_nested(path, json!(1)).unwrap_err(),
                FormError::InvalidPath(path.to_string())
            );
        }
        assert_eq!(form.snapshot().unwrap(), json!({}));
    }

    #[test]
    fn test_schema_mismatch_discards_draft() {
        let store = store();
        store.set_versioned_draft("k", json!({"a": 5}), Some(1));

        let form = HydrationController::mount(
            store.clone(),
            "k",
            json!({"a": 1}),
            Some(&json!({"a": 9})),
            HydrateOptions {
                schema_version: Some(2),
                ..HydrateOptions::default()
            },
        )
        .unwrap();

        assert_eq!(form.snapshot().unwrap(), json!({"a": 9}));
        assert_eq!(form.provenance(), Some(Provenance::Server));
        assert!(store.get_draft("k").is_none());
    }

    #[test]
    fn test_matching_schema_keeps_draft_and_tags_writes() {
        let store = store();
        store.set_versioned_draft("k", json!({"a": 5}), Some(2));
        let options = HydrateOptions {
            schema_version: Some(2),
            ..HydrateOptions::default()
        };

        let mut form =
            HydrationController::mount(store.clone(), "k", json!({"a": 1}), None, options).unwrap();
        assert_eq!(form.snapshot().unwrap(), json!({"a": 5}));

        form.set_field("a", json!(6)).unwrap();
        assert_eq!(store.get_draft("k").unwrap().schema_version, Some(2));
    }

    #[test]
    fn test_non_object_draft_falls_back_to_defaults() {
        let store = store();
        store.set_draft("k", json!("corrupt"));

        let form = HydrationController::mount(
            store,
            "k",
            json!({"a": 1}),
            None,
            HydrateOptions::default(),
        )
        .unwrap();
        assert_eq!(form.snapshot().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_non_object_draft_falls_back_to_server_data() {
        let store = store();
        store.set_draft("k", json!("corrupt"));

        let form = HydrationController::mount(
            store.clone(),
            "k",
            json!({"nombre": "", "zonas": []}),
            Some(&json!({"nombre": "Academia X", "zonas": [3, 7]})),
            HydrateOptions::default(),
        )
        .unwrap();

        assert_eq!(
            form.snapshot().unwrap(),
            json!({"nombre": "Academia X", "zonas": [3, 7]})
        );
        assert_eq!(form.provenance(), Some(Provenance::Server));
        assert!(store.get_draft("k").is_none());
    }

    #[test]
    fn test_non_object_server_data_falls_back_to_defaults() {
        let form = HydrationController::mount(
            store(),
            "k",
            json!({"a": 1}),
            Some(&json!([1, 2])),
            HydrateOptions::default(),
        )
        .unwrap();

        assert_eq!(form.snapshot().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_draft_extra_keys_carry_through() {
        let store = store();
        store.set_draft("k", json!({"a": 5, "legacy": true}));

        let form = HydrationController::mount(
            store,
            "k",
            json!({"a": 1, "b": 2}),
            None,
            HydrateOptions::default(),
        )
        .unwrap();
        assert_eq!(form.snapshot().unwrap(), json!({"a": 5, "b": 2, "legacy": true}));
    }

    #[test]
    fn test_clear_draft_after_save() {
        let store = store();
        let mut form = HydrationController::mount(
            store.clone(),
            "k",
            json!({"a": 1}),
            None,
            HydrateOptions::default(),
        )
        .unwrap();
        form.set_field("a", json!(2)).unwrap();

        assert!(form.clear_draft());
        assert!(store.get_draft("k").is_none());
        assert_eq!(form.snapshot().unwrap(), json!({"a": 2}));
    }
}
