mod role;
mod service;

pub mod config;
pub mod factory;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection as RawConnection;
use rusqlite::Transaction as RawTransaction;

use crate::types::service::ServiceDefinition;

use super::{Connection, RoleRecord, Transaction};

/// SQLite-based registry storage. Supports both file-based and in-memory
/// databases; the latter is meant for tests and throwaway brokers.
pub struct Sqlite {
    conn: RawConnection,
}

/// SQLite transaction for executing database operations
pub struct SqliteTransaction<'a> {
    tx: RawTransaction<'a>,
}

impl Sqlite {
    /// Opens a SQLite database file, creating it and its tables if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = RawConnection::open(path)
            .with_context(|| format!("open sqlite database '{}'", path.display()))?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Creates a new in-memory database. Content is lost when it is dropped.
    pub fn memory() -> Result<Self> {
        let conn = RawConnection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    pub fn data_version(&self) -> Result<i64> {
        let version = self
            .conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))
            .context("read data_version")?;
        Ok(version)
    }

    fn init_tables(db: &RawConnection) -> Result<()> {
        service::create_service_tables(db).context("init service table")?;
        role::create_role_tables(db).context("init role table")?;
        Ok(())
    }
}

impl<'a> Connection<'a, SqliteTransaction<'a>> for Sqlite {
    fn transaction(&'a mut self) -> Result<SqliteTransaction<'a>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn create_service(&self, service: &ServiceDefinition) -> Result<()> {
        service::create_service(&self.tx, service)
    }

    fn get_service(&self, name: &str) -> Result<ServiceDefinition> {
        service::get_service(&self.tx, name)
    }

    fn list_services(&self) -> Result<Vec<ServiceDefinition>> {
        service::list_services(&self.tx)
    }

    fn is_service_exists(&self, name: &str) -> Result<bool> {
        service::is_service_exists(&self.tx, name)
    }

    fn update_service(&self, service: &ServiceDefinition) -> Result<()> {
        service::update_service(&self.tx, service)
    }

    fn delete_service(&self, name: &str) -> Result<()> {
        service::delete_service(&self.tx, name)
    }

    fn create_role(&self, role: &RoleRecord) -> Result<()> {
        role::create_role(&self.tx, role)
    }

    fn get_role(&self, name: &str) -> Result<RoleRecord> {
        role::get_role(&self.tx, name)
    }

    fn list_roles(&self) -> Result<Vec<RoleRecord>> {
        role::list_roles(&self.tx)
    }

    fn is_role_exists(&self, name: &str) -> Result<bool> {
        role::is_role_exists(&self.tx, name)
    }

    fn update_role_policy(&self, name: &str, policy: &str, update_time: u64) -> Result<()> {
        role::update_role_policy(&self.tx, name, policy, update_time)
    }

    fn delete_role(&self, name: &str) -> Result<()> {
        role::delete_role(&self.tx, name)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::broker::db::tests::run_all_tests;
    use crate::broker::db::{Database, UnionConnection};

    use super::*;

    #[test]
    fn test_memory() {
        let sqlite = Sqlite::memory().unwrap();
        let conn = UnionConnection::Sqlite(sqlite);
        let db = Database::new(conn);

        run_all_tests(&db);
    }

    #[test]
    fn test_file() {
        let path = std::env::temp_dir().join(format!("test_s3bridge_{}.db", std::process::id()));
        let _ = fs::remove_file(&path);

        let sqlite = Sqlite::open(&path).unwrap();
        let conn = UnionConnection::Sqlite(sqlite);
        let db = Database::new(conn);

        run_all_tests(&db);

        db.close().unwrap();
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_data_version_moves_on_foreign_commit() {
        let path = std::env::temp_dir().join(format!("test_s3bridge_dv_{}.db", std::process::id()));
        let _ = fs::remove_file(&path);

        let reader = Database::new(UnionConnection::Sqlite(Sqlite::open(&path).unwrap()));
        let writer = Database::new(UnionConnection::Sqlite(Sqlite::open(&path).unwrap()));

        let role = |name: &str| RoleRecord {
            name: name.to_string(),
            arn: format!("arn:aws:iam::000000000000:role/{name}"),
            policy: String::from("{}"),
            create_time: 1,
            update_time: 1,
        };

        let before = reader.data_version().unwrap().unwrap();
        // Commits on the reader's own connection leave its counter alone.
        reader.with_transaction(|tx| tx.create_role(&role("own"))).unwrap();
        assert_eq!(reader.data_version().unwrap(), Some(before));

        writer.with_transaction(|tx| tx.create_role(&role("foreign"))).unwrap();
        assert_ne!(reader.data_version().unwrap(), Some(before));

        reader.close().unwrap();
        assert_eq!(reader.data_version().unwrap(), None);
        writer.close().unwrap();
        fs::remove_file(&path).unwrap();
    }
}
