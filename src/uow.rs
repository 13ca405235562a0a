//! Unit-of-Work (spec §4.6): one transaction per command, with repository
//! handles scoped to it.
//!
//! A [`UnitOfWork`] wraps a single `sea_orm` transaction and hands out
//! borrowed repository views over it. Because every repository method takes
//! `&DatabaseTransaction` rather than owning a connection, cross-repository
//! work inside one [`UnitOfWork`] is automatically atomic — there is only
//! ever one open transaction to write through.

use dashmap::DashMap;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::domain::permission::PermissionLevel;
use crate::error::CoreResult;
use crate::permission::{PermissionService, Resource};
use crate::reader::TableReader;
use crate::store::{CommitStore, JobStore, RefStore, RowStore};

/// Scoped acquisition of a transaction, released on every exit path
/// (commit, rollback, or drop without either — which rolls back, matching
/// `sea_orm`'s `DatabaseTransaction::drop` semantics).
pub struct UnitOfWork {
    txn: DatabaseTransaction,
    /// Owned (not borrowed) so `PermissionService` can borrow it alongside
    /// `txn` without making `UnitOfWork` self-referential.
    permission_cache: DashMap<(Resource, i64, PermissionLevel), bool>,
}

impl UnitOfWork {
    /// Opens a new transaction against `conn`. Mirrors the "acquired and
    /// released with guaranteed release on all exit paths" discipline from
    /// spec §4.6: the caller must eventually call `commit` or `rollback`;
    /// dropping without either rolls back.
    pub async fn begin(conn: &DatabaseConnection) -> CoreResult<Self> {
        let txn = conn.begin().await?;
        Ok(Self { txn, permission_cache: DashMap::new() })
    }

    pub fn permissions(&self) -> PermissionService<'_> {
        PermissionService::new(&self.txn, &self.permission_cache)
    }

    pub fn rows(&self) -> RowStore<'_> {
        RowStore::new(&self.txn)
    }

    pub fn commits(&self) -> CommitStore<'_> {
        CommitStore::new(&self.txn)
    }

    pub fn refs(&self) -> RefStore<'_> {
        RefStore::new(&self.txn)
    }

    pub fn jobs(&self) -> JobStore<'_> {
        JobStore::new(&self.txn)
    }

    pub fn table_reader(&self) -> TableReader<'_> {
        TableReader::new(&self.txn)
    }

    /// Direct access to the transaction for repositories (dataset,
    /// permission) that are thin enough not to warrant their own store type.
    pub fn txn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> CoreResult<()> {
        self.txn.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> CoreResult<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
