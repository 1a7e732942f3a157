//! Role and profile table configuration

/// Table names consulted by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTables {
    /// One row per identity: `{ id, role }`
    pub roles: String,
    pub admins: String,
    pub students: String,
}

impl Default for ProfileTables {
    fn default() -> Self {
        Self {
            roles: "user_roles".to_string(),
            admins: "admins".to_string(),
            students: "students".to_string(),
        }
    }
}

impl ProfileTables {
    /// Load table names from `ROLE_TABLE`, `ADMIN_TABLE`, `STUDENT_TABLE`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            roles: std::env::var("ROLE_TABLE").unwrap_or(defaults.roles),
            admins: std::env::var("ADMIN_TABLE").unwrap_or(defaults.admins),
            students: std::env::var("STUDENT_TABLE").unwrap_or(defaults.students),
        }
    }
}
