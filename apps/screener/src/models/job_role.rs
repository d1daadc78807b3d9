use serde::{Deserialize, Serialize};

/// A job role profile that resumes are screened against.
/// Owned by the job role provider; a session only holds a shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRole {
    pub id: String,
    pub title: String,
    /// External reference to the requirements document (file name or URL).
    pub requirements_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRoleSummary {
    pub id: String,
    pub title: String,
}

impl From<&JobRole> for JobRoleSummary {
    fn from(role: &JobRole) -> Self {
        Self {
            id: role.id.clone(),
            title: role.title.clone(),
        }
    }
}
