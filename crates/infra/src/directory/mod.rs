//! Read-only adapters for the external directory service.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub mod dto;
pub mod http;
pub mod in_memory;

pub use dto::{
    DepartmentRecord, DirectoryBundle, FieldSecurityRecord, RoleDetail, RoleRecord,
    VisibilityRuleRecord, VisibilitySettingRecord,
};
pub use http::HttpDirectory;
pub use in_memory::InMemoryDirectory;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("network error: {0}")]
    Network(String),
    #[error("directory request timed out")]
    Timeout,
    #[error("directory API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Narrow read interface to the directory service.
///
/// Implementations never write; assignment changes are persisted by the
/// surrounding application.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// `GET /user-roles`
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, DirectoryError>;

    /// `GET /user-roles/{id}`
    async fn get_role(&self, id: &str) -> Result<RoleDetail, DirectoryError>;

    /// `GET /departments`
    async fn list_departments(&self) -> Result<Vec<DepartmentRecord>, DirectoryError>;

    /// `GET /settings/field-security`
    async fn field_security(&self) -> Result<Vec<FieldSecurityRecord>, DirectoryError>;

    /// `GET /settings/visibility-rules`
    async fn visibility_settings(&self) -> Result<Vec<VisibilitySettingRecord>, DirectoryError>;

    /// Fetch everything a snapshot is built from.
    async fn fetch_bundle(&self) -> Result<DirectoryBundle, DirectoryError> {
        let listed = self.list_roles().await?;
        let mut roles = Vec::with_capacity(listed.len());
        for role in &listed {
            roles.push(self.get_role(&role.id).await?);
        }
        Ok(DirectoryBundle {
            roles,
            departments: self.list_departments().await?,
            field_security: self.field_security().await?,
            visibility: self.visibility_settings().await?,
        })
    }
}

#[async_trait]
impl<S> DirectorySource for Arc<S>
where
    S: DirectorySource + ?Sized,
{
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, DirectoryError> {
        (**self).list_roles().await
    }

    async fn get_role(&self, id: &str) -> Result<RoleDetail, DirectoryError> {
        (**self).get_role(id).await
    }

    async fn list_departments(&self) -> Result<Vec<DepartmentRecord>, DirectoryError> {
        (**self).list_departments().await
    }

    async fn field_security(&self) -> Result<Vec<FieldSecurityRecord>, DirectoryError> {
        (**self).field_security().await
    }

    async fn visibility_settings(&self) -> Result<Vec<VisibilitySettingRecord>, DirectoryError> {
        (**self).visibility_settings().await
    }

    async fn fetch_bundle(&self) -> Result<DirectoryBundle, DirectoryError> {
        (**self).fetch_bundle().await
    }
}
