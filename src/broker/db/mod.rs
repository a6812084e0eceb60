mod sqlite;

#[cfg(test)]
pub mod tests;

pub mod config;
pub mod factory;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, TryLockError};

use anyhow::{bail, Result};
use sqlite::{Sqlite, SqliteTransaction};

use crate::types::service::ServiceDefinition;

/// Database connection trait that can create transactions
pub trait Connection<'a, T>
where
    T: Transaction + 'a,
{
    /// Creates a new transaction from the connection
    fn transaction(&'a mut self) -> Result<T>;
}

/// Database transaction trait that defines all database operations
pub trait Transaction {
    // Service operations
    /// Creates a new service record
    fn create_service(&self, service: &ServiceDefinition) -> Result<()>;
    /// Retrieves a service by name
    fn get_service(&self, name: &str) -> Result<ServiceDefinition>;
    /// Lists all services, ordered by name
    fn list_services(&self) -> Result<Vec<ServiceDefinition>>;
    /// Checks if a service exists
    fn is_service_exists(&self, name: &str) -> Result<bool>;
    /// Overwrites every mutable field of an existing service
    fn update_service(&self, service: &ServiceDefinition) -> Result<()>;
    /// Deletes a service by name
    fn delete_service(&self, name: &str) -> Result<()>;

    // Role operations
    /// Creates a new role record
    fn create_role(&self, role: &RoleRecord) -> Result<()>;
    /// Retrieves a role by name
    fn get_role(&self, name: &str) -> Result<RoleRecord>;
    /// Lists all roles, ordered by name
    fn list_roles(&self) -> Result<Vec<RoleRecord>>;
    /// Checks if a role exists
    fn is_role_exists(&self, name: &str) -> Result<bool>;
    /// Replaces the policy attached to a role
    fn update_role_policy(&self, name: &str, policy: &str, update_time: u64) -> Result<()>;
    /// Deletes a role by name
    fn delete_role(&self, name: &str) -> Result<()>;

    /// Commits the transaction
    fn commit(self) -> Result<()>;
    /// Rolls back the transaction
    fn rollback(self) -> Result<()>;
}

/// Record of a role kept by the local provisioner.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRecord {
    /// Name of the service the role belongs to
    pub name: String,
    /// Role ARN handed to the credential issuer
    pub arn: String,
    /// JSON policy document attached to the role
    pub policy: String,
    /// Role creation timestamp
    pub create_time: u64,
    /// Last update timestamp
    pub update_time: u64,
}

/// Main database structure supporting multiple backend implementations
pub struct Database {
    ctx: Mutex<DatabaseContext>,
}

/// Enum representing different supported database connections
pub enum UnionConnection {
    /// SQLite database connection
    Sqlite(Sqlite),
}

enum UnionTransaction<'a> {
    Sqlite(SqliteTransaction<'a>),
}

struct DatabaseContext {
    /// `None` once the database is closed.
    conn: Option<UnionConnection>,
}

impl Database {
    pub fn new(conn: UnionConnection) -> Self {
        Self {
            ctx: Mutex::new(DatabaseContext { conn: Some(conn) }),
        }
    }

    /// An empty in-memory database.
    pub fn memory() -> Result<Self> {
        let sqlite = Sqlite::memory()?;
        Ok(Self::new(UnionConnection::Sqlite(sqlite)))
    }

    /// Executes a function within a transaction context.
    ///
    /// - If the function `f` succeeds, the transaction will be committed
    /// - If the function `f` fails (returns an error), the transaction will be rolled back
    /// - If the transaction operations (commit/rollback) fail, the error will be returned
    ///
    /// # Example
    /// ```ignore
    /// db.with_transaction(|tx| {
    ///     let service = tx.get_service("analytics")?;
    ///     tx.delete_role(&service.name)?;
    ///     Ok(service)
    /// })?;
    /// ```
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction) -> Result<T>,
    {
        self.run_transaction(None, f)
    }

    /// Like [`Database::with_transaction`], but the commit only happens if
    /// `gate` has not been cancelled by then. A cancelled transaction is
    /// rolled back and reported as an error.
    pub fn with_gated_transaction<T, F>(&self, gate: &CommitGate, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction) -> Result<T>,
    {
        self.run_transaction(Some(gate), f)
    }

    fn run_transaction<T, F>(&self, gate: Option<&CommitGate>, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction) -> Result<T>,
    {
        let mut ctx = match self.ctx.lock() {
            Ok(ctx) => ctx,
            Err(e) => bail!("failed to lock database: {e:#}"),
        };
        if gate.is_some_and(CommitGate::is_cancelled) {
            bail!("transaction cancelled before start");
        }
        let conn = match ctx.conn.as_mut() {
            Some(conn) => conn,
            None => bail!("database is closed"),
        };
        let tx = conn.transaction()?;

        let result = f(&tx);
        if result.is_err() {
            tx.rollback()?;
            return result;
        }
        if let Some(gate) = gate {
            if !gate.try_commit() {
                tx.rollback()?;
                bail!("transaction cancelled before commit");
            }
        }
        tx.commit()?;

        result
    }

    /// Change counter of the underlying store. It moves whenever another
    /// connection commits. `None` when the database is busy or closed.
    pub fn data_version(&self) -> Result<Option<i64>> {
        let ctx = match self.ctx.try_lock() {
            Ok(ctx) => ctx,
            Err(TryLockError::WouldBlock) => return Ok(None),
            Err(TryLockError::Poisoned(e)) => bail!("failed to lock database: {e:#}"),
        };
        match ctx.conn.as_ref() {
            Some(UnionConnection::Sqlite(sqlite)) => sqlite.data_version().map(Some),
            None => Ok(None),
        }
    }

    /// Drops the underlying connection. Every later transaction fails.
    pub fn close(&self) -> Result<()> {
        let mut ctx = match self.ctx.lock() {
            Ok(ctx) => ctx,
            Err(e) => bail!("failed to lock database: {e:#}"),
        };
        ctx.conn.take();
        Ok(())
    }
}

const GATE_PENDING: u8 = 0;
const GATE_COMMITTING: u8 = 1;
const GATE_CANCELLED: u8 = 2;

/// One-shot race between a transaction's commit and its caller giving up.
/// Exactly one of [`CommitGate::try_commit`] and [`CommitGate::cancel`] wins.
#[derive(Debug, Default)]
pub struct CommitGate {
    state: AtomicU8,
}

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the right to commit. Fails once the gate was cancelled.
    pub fn try_commit(&self) -> bool {
        self.state
            .compare_exchange(GATE_PENDING, GATE_COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Forbids the commit. Fails once the commit was claimed.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(GATE_PENDING, GATE_CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == GATE_CANCELLED
    }
}

impl<'a> Connection<'a, UnionTransaction<'a>> for UnionConnection {
    fn transaction(&'a mut self) -> Result<UnionTransaction<'a>> {
        match self {
            UnionConnection::Sqlite(sqlite) => sqlite.transaction().map(UnionTransaction::Sqlite),
        }
    }
}

impl Transaction for UnionTransaction<'_> {
    fn create_service(&self, service: &ServiceDefinition) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_service(service),
        }
    }

    fn get_service(&self, name: &str) -> Result<ServiceDefinition> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_service(name),
        }
    }

    fn list_services(&self) -> Result<Vec<ServiceDefinition>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_services(),
        }
    }

    fn is_service_exists(&self, name: &str) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.is_service_exists(name),
        }
    }

    fn update_service(&self, service: &ServiceDefinition) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_service(service),
        }
    }

    fn delete_service(&self, name: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_service(name),
        }
    }

    fn create_role(&self, role: &RoleRecord) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_role(role),
        }
    }

    fn get_role(&self, name: &str) -> Result<RoleRecord> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_role(name),
        }
    }

    fn list_roles(&self) -> Result<Vec<RoleRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_roles(),
        }
    }

    fn is_role_exists(&self, name: &str) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.is_role_exists(name),
        }
    }

    fn update_role_policy(&self, name: &str, policy: &str, update_time: u64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_role_policy(name, policy, update_time),
        }
    }

    fn delete_role(&self, name: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_role(name),
        }
    }

    fn commit(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.commit(),
        }
    }

    fn rollback(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.rollback(),
        }
    }
}
