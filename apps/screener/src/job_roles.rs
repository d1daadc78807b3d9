use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::job_role::{JobRole, JobRoleSummary};

/// Source of job role profiles. Read-only from the session's point of view.
#[async_trait]
pub trait JobRoleProvider: Send + Sync {
    async fn list_job_roles(&self) -> Result<Vec<JobRoleSummary>, AppError>;

    async fn get(&self, id: &str) -> Result<Option<Arc<JobRole>>, AppError>;
}

/// Fixed catalogue held in memory.
pub struct InMemoryJobRoles {
    roles: Vec<Arc<JobRole>>,
}

impl InMemoryJobRoles {
    pub fn new(roles: Vec<JobRole>) -> Self {
        Self {
            roles: roles.into_iter().map(Arc::new).collect(),
        }
    }

    /// The two demo roles available out of the box.
    pub fn seeded() -> Self {
        Self::new(vec![
            JobRole {
                id: "1".to_string(),
                title: "Frontend Developer".to_string(),
                requirements_ref: "frontend_requirements.pdf".to_string(),
            },
            JobRole {
                id: "2".to_string(),
                title: "Backend Engineer".to_string(),
                requirements_ref: "backend_specs.pdf".to_string(),
            },
        ])
    }
}

#[async_trait]
impl JobRoleProvider for InMemoryJobRoles {
    async fn list_job_roles(&self) -> Result<Vec<JobRoleSummary>, AppError> {
        Ok(self
            .roles
            .iter()
            .map(|r| JobRoleSummary::from(r.as_ref()))
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Arc<JobRole>>, AppError> {
        Ok(self.roles.iter().find(|r| r.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_roles_are_listed_in_order() {
        let roles = InMemoryJobRoles::seeded().list_job_roles().await.unwrap();
        let titles: Vec<_> = roles.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Frontend Developer", "Backend Engineer"]);
    }

    #[tokio::test]
    async fn test_get_returns_shared_role() {
        let provider = InMemoryJobRoles::seeded();
        let first = provider.get("2").await.unwrap().unwrap();
        let second = provider.get("2").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.requirements_ref, "backend_specs.pdf");
    }

    #[tokio::test]
    async fn test_unknown_role_is_none() {
        assert!(InMemoryJobRoles::seeded().get("99").await.unwrap().is_none());
    }
}
