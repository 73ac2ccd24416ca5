//! In-memory directory for tests and local development.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    DepartmentRecord, DirectoryBundle, DirectoryError, DirectorySource, FieldSecurityRecord,
    RoleDetail, RoleRecord, VisibilitySettingRecord,
};

/// Directory backed by a [`DirectoryBundle`] held in memory.
///
/// Supports injecting failures and latency so loader retry, timeout and
/// stale-on-error paths can be exercised.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    bundle: RwLock<DirectoryBundle>,
    failures_remaining: AtomicU32,
    failure: RwLock<Option<DirectoryError>>,
    latency: RwLock<Option<Duration>>,
    role_list_calls: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new(bundle: DirectoryBundle) -> Self {
        Self {
            bundle: RwLock::new(bundle),
            ..Default::default()
        }
    }

    pub fn set_bundle(&self, bundle: DirectoryBundle) {
        if let Ok(mut current) = self.bundle.write() {
            *current = bundle;
        }
    }

    /// Fail the next `times` role listings with `error`.
    pub fn fail_next(&self, times: u32, error: DirectoryError) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(error);
        }
        self.failures_remaining.store(times, Ordering::SeqCst);
    }

    /// Delay every role listing by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut current) = self.latency.write() {
            *current = latency;
        }
    }

    /// Number of `list_roles` calls so far (one per fetch attempt).
    pub fn attempts(&self) -> usize {
        self.role_list_calls.load(Ordering::SeqCst)
    }

    fn read<T>(&self, f: impl FnOnce(&DirectoryBundle) -> T) -> Result<T, DirectoryError> {
        self.bundle
            .read()
            .map(|bundle| f(&*bundle))
            .map_err(|_| DirectoryError::Network("in-memory directory poisoned".to_string()))
    }

    fn injected_failure(&self) -> Option<DirectoryError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining == 0 {
            return None;
        }
        self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
        self.failure
            .read()
            .ok()
            .and_then(|f| f.clone())
            .or(Some(DirectoryError::Network("injected failure".to_string())))
    }
}

#[async_trait]
impl DirectorySource for InMemoryDirectory {
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, DirectoryError> {
        self.role_list_calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency.read().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }

        self.read(|b| b.roles.iter().map(|d| d.role.clone()).collect())
    }

    async fn get_role(&self, id: &str) -> Result<RoleDetail, DirectoryError> {
        self.read(|b| b.roles.iter().find(|d| d.role.id == id).cloned())?
            .ok_or_else(|| DirectoryError::Api(404, format!("role '{id}' not found")))
    }

    async fn list_departments(&self) -> Result<Vec<DepartmentRecord>, DirectoryError> {
        self.read(|b| b.departments.clone())
    }

    async fn field_security(&self) -> Result<Vec<FieldSecurityRecord>, DirectoryError> {
        self.read(|b| b.field_security.clone())
    }

    async fn visibility_settings(&self) -> Result<Vec<VisibilitySettingRecord>, DirectoryError> {
        self.read(|b| b.visibility.clone())
    }
}
