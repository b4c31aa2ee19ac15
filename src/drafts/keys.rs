//! Draft key namespacing per user and role.

use serde::{Deserialize, Serialize};

/// Owner used when no user is signed in.
pub const ANON_OWNER: &str = "anon";

const KEY_PREFIX: &str = "draft";

/// Profile type a form edits. Each role has its own draft slot per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Organizer,
    Teacher,
    Academy,
    Brand,
}

/// Route segments that select a role, checked in order.
const ROUTE_ROLES: &[(&str, Role)] = &[
    ("organizer", Role::Organizer),
    ("organizador", Role::Organizer),
    ("teacher", Role::Teacher),
    ("maestro", Role::Teacher),
    ("academy", Role::Academy),
    ("academia", Role::Academy),
    ("brand", Role::Brand),
    ("marca", Role::Brand),
];

impl Role {
    pub const ALL: [Role; 5] = [
        Role::User,
        Role::Organizer,
        Role::Teacher,
        Role::Academy,
        Role::Brand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Organizer => "organizer",
            Role::Teacher => "teacher",
            Role::Academy => "academy",
            Role::Brand => "brand",
        }
    }

    /// Infer the active role from a route pathname, falling back to [`Role::User`].
    ///
    /// Matching is by whole path segment so `/brandon` does not select `brand`.
    pub fn from_path(pathname: &str) -> Self {
        let path = pathname.split(['?', '#']).next().unwrap_or_default();
        ROUTE_ROLES
            .iter()
            .find(|(segment, _)| {
                path.split('/')
                    .any(|part| part.eq_ignore_ascii_case(segment))
            })
            .map(|(_, role)| *role)
            .unwrap_or(Role::User)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace owner for a user id. Absent or blank ids share the anonymous owner;
/// any other id is used verbatim.
pub fn draft_owner(user_id: Option<&str>) -> &str {
    match user_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => ANON_OWNER,
    }
}

/// Storage key for a user's draft of one role's form.
///
/// The role is always the final `:`-separated segment, so keys stay distinct even
/// when a user id itself contains `:`.
pub fn draft_key(user_id: Option<&str>, role: Role) -> String {
    format!("{}:{}:{}", KEY_PREFIX, draft_owner(user_id), role.as_str())
}

/// Draft keys for every role of a user, in [`Role::ALL`] order.
pub fn all_role_keys(user_id: Option<&str>) -> Vec<String> {
    Role::ALL
        .into_iter()
        .map(|role| draft_key(user_id, role))
        .collect()
}
