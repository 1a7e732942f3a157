//! Identity, role, and profile types
//!
//! Rows are read from the backend's role and profile tables. Every column
//! of a present row is carried into the merged user view.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Fields present on every authenticated subject regardless of role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseIdentity {
    pub id: Uuid,
    pub email: String,
}

/// Role stored in the role table.
///
/// Unrecognized values are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Student,
    Parent,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Other(other) => other,
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            "student" => Role::Student,
            "parent" => Role::Parent,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per identity in the role table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: Uuid,
    pub role: Role,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoleRecord {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            extra: Map::new(),
        }
    }
}

/// Row in the admin profile table.
///
/// Kept as the raw row so a column with an unexpected type never loses the
/// rest of the profile; typed accessors read the known columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminProfile {
    pub fields: Map<String, Value>,
}

impl AdminProfile {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn full_name(&self) -> Option<&str> {
        text(&self.fields, "full_name")
    }

    pub fn position(&self) -> Option<&str> {
        text(&self.fields, "position")
    }

    pub fn department(&self) -> Option<&str> {
        text(&self.fields, "department")
    }

    pub fn phone(&self) -> Option<String> {
        text_or_number(&self.fields, "phone")
    }
}

/// Row in the student profile table, kept raw like [`AdminProfile`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentProfile {
    pub fields: Map<String, Value>,
}

impl StudentProfile {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn full_name(&self) -> Option<&str> {
        text(&self.fields, "full_name")
    }

    /// Stored as text or integer depending on the table; normalized to text
    pub fn grade(&self) -> Option<String> {
        text_or_number(&self.fields, "grade")
    }

    pub fn school(&self) -> Option<&str> {
        text(&self.fields, "school")
    }

    pub fn batch(&self) -> Option<String> {
        text_or_number(&self.fields, "batch")
    }

    pub fn phone(&self) -> Option<String> {
        text_or_number(&self.fields, "phone")
    }
}

fn text<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

fn text_or_number(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Role-aware user consumed by the rest of the application.
///
/// Built fresh by the resolver on every session change and replaced
/// wholesale; never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedUser {
    /// Role `admin`; `profile` is `None` when the admin row is missing
    Admin {
        identity: BaseIdentity,
        record: RoleRecord,
        profile: Option<AdminProfile>,
    },
    /// Role `student`; `profile` is `None` when the student row is missing
    Student {
        identity: BaseIdentity,
        record: RoleRecord,
        profile: Option<StudentProfile>,
    },
    /// Any other role (`parent` or unrecognized); no profile table
    Member {
        identity: BaseIdentity,
        record: RoleRecord,
    },
    /// Role lookup failed or found no row
    Unknown { identity: BaseIdentity },
}

impl ResolvedUser {
    pub fn identity(&self) -> &BaseIdentity {
        match self {
            ResolvedUser::Admin { identity, .. }
            | ResolvedUser::Student { identity, .. }
            | ResolvedUser::Member { identity, .. }
            | ResolvedUser::Unknown { identity } => identity,
        }
    }

    pub fn id(&self) -> Uuid {
        self.identity().id
    }

    pub fn email(&self) -> &str {
        &self.identity().email
    }

    pub fn record(&self) -> Option<&RoleRecord> {
        match self {
            ResolvedUser::Admin { record, .. }
            | ResolvedUser::Student { record, .. }
            | ResolvedUser::Member { record, .. } => Some(record),
            ResolvedUser::Unknown { .. } => None,
        }
    }

    /// Role from the role table, absent for a degraded identity
    pub fn role(&self) -> Option<&Role> {
        self.record().map(|r| &r.role)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, ResolvedUser::Admin { .. })
    }

    pub fn is_student(&self) -> bool {
        matches!(self, ResolvedUser::Student { .. })
    }

    /// Whether a role-specific profile row was merged in
    pub fn has_profile(&self) -> bool {
        match self {
            ResolvedUser::Admin { profile, .. } => profile.is_some(),
            ResolvedUser::Student { profile, .. } => profile.is_some(),
            ResolvedUser::Member { .. } | ResolvedUser::Unknown { .. } => false,
        }
    }

    pub fn admin_profile(&self) -> Option<&AdminProfile> {
        match self {
            ResolvedUser::Admin { profile, .. } => profile.as_ref(),
            _ => None,
        }
    }

    pub fn student_profile(&self) -> Option<&StudentProfile> {
        match self {
            ResolvedUser::Student { profile, .. } => profile.as_ref(),
            _ => None,
        }
    }

    /// Profile name when known, otherwise the email address
    pub fn display_name(&self) -> &str {
        let full_name = match self {
            ResolvedUser::Admin { profile, .. } => profile.as_ref().and_then(|p| p.full_name()),
            ResolvedUser::Student { profile, .. } => profile.as_ref().and_then(|p| p.full_name()),
            _ => None,
        };
        full_name.unwrap_or_else(|| self.email())
    }

    /// Flat view of identity, role record, and profile.
    ///
    /// Later layers shadow earlier ones on name collisions:
    /// profile > role record > identity. Null profile columns never shadow.
    pub fn merged(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        merged.insert("id".to_string(), Value::String(self.id().to_string()));
        merged.insert("email".to_string(), Value::String(self.email().to_string()));

        if let Some(record) = self.record() {
            match serde_json::to_value(record) {
                Ok(Value::Object(fields)) => overlay(&mut merged, &fields),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to serialize role record"),
            }
        }

        match self {
            ResolvedUser::Admin {
                profile: Some(profile),
                ..
            } => overlay(&mut merged, &profile.fields),
            ResolvedUser::Student {
                profile: Some(profile),
                ..
            } => overlay(&mut merged, &profile.fields),
            _ => {}
        }

        merged
    }
}

fn overlay(target: &mut Map<String, Value>, layer: &Map<String, Value>) {
    for (key, value) in layer {
        if !value.is_null() {
            target.insert(key.clone(), value.clone());
        }
    }
}

impl Serialize for ResolvedUser {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.merged().serialize(serializer)
    }
}
