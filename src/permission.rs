//! L5 Permission service (spec §4.5).
//!
//! Bound to one request: [`crate::uow::UnitOfWork`] owns the memoization map
//! and hands out a [`PermissionService`] borrowing both it and the open
//! transaction, so repeated checks within a single command hit the cache
//! instead of re-querying `dataset_permissions`.

use dashmap::DashMap;
use sea_orm::DatabaseTransaction;
use uuid::Uuid;

use crate::domain::permission::PermissionLevel;
use crate::error::{CoreError, CoreResult};
use crate::store::job_store::JobStore;
use crate::store::permission_repo::PermissionRepo;

/// A checkable resource. Unifies spec §4.5's `(resource_type, resource_id)`
/// pair into one tagged value (SPEC_FULL §A / spec §9 "model as a tagged
/// sum") so a cache key and a match arm can't disagree about which type a
/// bare id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Dataset(i64),
    Job(Uuid),
}

impl Resource {
    fn type_name(&self) -> &'static str {
        match self {
            Resource::Dataset(_) => "dataset",
            Resource::Job(_) => "job",
        }
    }

    fn id_string(&self) -> String {
        match self {
            Resource::Dataset(id) => id.to_string(),
            Resource::Job(id) => id.to_string(),
        }
    }
}

type CacheKey = (Resource, i64, PermissionLevel);

pub struct PermissionService<'a> {
    txn: &'a DatabaseTransaction,
    cache: &'a DashMap<CacheKey, bool>,
}

impl<'a> PermissionService<'a> {
    pub fn new(txn: &'a DatabaseTransaction, cache: &'a DashMap<CacheKey, bool>) -> Self {
        Self { txn, cache }
    }

    /// Returns whether `user_id` holds at least `required` on `resource`,
    /// memoized for the lifetime of the owning [`crate::uow::UnitOfWork`].
    pub async fn has_permission(
        &self,
        resource: Resource,
        user_id: i64,
        required: PermissionLevel,
    ) -> CoreResult<bool> {
        let key = (resource, user_id, required);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(*cached);
        }
        let result = self.resolve(resource, user_id, required).await?;
        self.cache.insert(key, result);
        Ok(result)
    }

    /// Throws [`CoreError::PermissionDenied`] on failure (spec §4.5).
    pub async fn require(
        &self,
        resource: Resource,
        user_id: i64,
        required: PermissionLevel,
    ) -> CoreResult<()> {
        if self.has_permission(resource, user_id, required).await? {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied {
                resource_type: resource.type_name(),
                resource_id: resource.id_string(),
                user_id,
                required: required.as_str(),
            })
        }
    }

    /// All of `checks` must pass; fails with the first denial encountered.
    pub async fn require_all(
        &self,
        checks: &[(Resource, i64, PermissionLevel)],
    ) -> CoreResult<()> {
        for (resource, user_id, required) in checks.iter().copied() {
            self.require(resource, user_id, required).await?;
        }
        Ok(())
    }

    /// At least one of `checks` must pass; fails with the last denial if
    /// none do. `checks` must be non-empty.
    pub async fn require_any(
        &self,
        checks: &[(Resource, i64, PermissionLevel)],
    ) -> CoreResult<()> {
        let mut last_err = None;
        for (resource, user_id, required) in checks.iter().copied() {
            match self.require(resource, user_id, required).await {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            CoreError::Internal("require_any called with an empty check list".into())
        }))
    }

    async fn resolve(
        &self,
        resource: Resource,
        user_id: i64,
        required: PermissionLevel,
    ) -> CoreResult<bool> {
        match resource {
            Resource::Dataset(dataset_id) => {
                let repo = PermissionRepo::new(self.txn);
                Ok(repo
                    .get_permission(dataset_id, user_id)
                    .await?
                    .is_some_and(|level| level.satisfies(required)))
            }
            Resource::Job(job_id) => {
                // spec §4.5: "a user may act on a job if they own it *or*
                // have the requisite level on the job's dataset."
                let jobs = JobStore::new(self.txn);
                let job = jobs.require_job(job_id).await?;
                if job.user_id == user_id {
                    return Ok(true);
                }
                Box::pin(self.resolve(Resource::Dataset(job.dataset_id), user_id, required)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_names() {
        assert_eq!(Resource::Dataset(1).type_name(), "dataset");
        assert_eq!(Resource::Job(Uuid::nil()).type_name(), "job");
    }
}
