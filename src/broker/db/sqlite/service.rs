use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use log::debug;
use rusqlite::{params, Connection, Row, Transaction};

use crate::types::service::{PermissionTier, ServiceDefinition};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS service (
    name TEXT PRIMARY KEY NOT NULL,
    buckets TEXT NOT NULL,
    permission TEXT NOT NULL,
    restricted_users TEXT NOT NULL,
    role TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);
"#;

const SELECT_COLUMNS: &str =
    "SELECT name, buckets, permission, restricted_users, role, create_time, update_time FROM service";

/// Raw column values; list columns are still JSON text.
struct ServiceRow {
    name: String,
    buckets: String,
    permission: String,
    restricted_users: String,
    role: String,
    create_time: u64,
    update_time: u64,
}

impl ServiceRow {
    fn read(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            buckets: row.get(1)?,
            permission: row.get(2)?,
            restricted_users: row.get(3)?,
            role: row.get(4)?,
            create_time: row.get(5)?,
            update_time: row.get(6)?,
        })
    }

    fn decode(self) -> Result<ServiceDefinition> {
        let bucket_patterns: Vec<String> = serde_json::from_str(&self.buckets)
            .with_context(|| format!("decode buckets of service '{}'", self.name))?;
        let restricted_users: BTreeSet<String> = serde_json::from_str(&self.restricted_users)
            .with_context(|| format!("decode restricted users of service '{}'", self.name))?;
        let permission = self
            .permission
            .parse::<PermissionTier>()
            .with_context(|| format!("decode permission of service '{}'", self.name))?;
        Ok(ServiceDefinition {
            name: self.name,
            bucket_patterns,
            permission,
            restricted_users,
            role: self.role,
            create_time: self.create_time,
            update_time: self.update_time,
        })
    }
}

pub fn create_service_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_service(tx: &Transaction, service: &ServiceDefinition) -> Result<()> {
    let sql = r#"
    INSERT INTO service (name, buckets, permission, restricted_users, role, create_time, update_time)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    "#;
    debug!("Database create_service: {}", service.name);
    tx.execute(
        sql,
        params![
            service.name,
            serde_json::to_string(&service.bucket_patterns)?,
            service.permission.as_str(),
            serde_json::to_string(&service.restricted_users)?,
            service.role,
            service.create_time,
            service.update_time,
        ],
    )?;
    Ok(())
}

pub fn get_service(tx: &Transaction, name: &str) -> Result<ServiceDefinition> {
    let sql = format!("{SELECT_COLUMNS} WHERE name = ?");
    let mut stmt = tx.prepare(&sql)?;
    let row = stmt.query_row(params![name], ServiceRow::read)?;
    row.decode()
}

pub fn list_services(tx: &Transaction) -> Result<Vec<ServiceDefinition>> {
    let sql = format!("{SELECT_COLUMNS} ORDER BY name");
    let mut stmt = tx.prepare(&sql)?;
    let rows = stmt
        .query_map([], ServiceRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(ServiceRow::decode).collect()
}

pub fn is_service_exists(tx: &Transaction, name: &str) -> Result<bool> {
    let mut stmt = tx.prepare("SELECT COUNT(*) FROM service WHERE name = ?")?;
    let count: i64 = stmt.query_row(params![name], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn update_service(tx: &Transaction, service: &ServiceDefinition) -> Result<()> {
    let sql = r#"
    UPDATE service
    SET buckets = ?, permission = ?, restricted_users = ?, role = ?, create_time = ?, update_time = ?
    WHERE name = ?
    "#;
    debug!("Database update_service: {}", service.name);
    let count = tx.execute(
        sql,
        params![
            serde_json::to_string(&service.bucket_patterns)?,
            service.permission.as_str(),
            serde_json::to_string(&service.restricted_users)?,
            service.role,
            service.create_time,
            service.update_time,
            service.name,
        ],
    )?;
    if count == 0 {
        bail!("service '{}' not found", service.name);
    }
    Ok(())
}

pub fn delete_service(tx: &Transaction, name: &str) -> Result<()> {
    debug!("Database delete_service: {name}");
    tx.execute("DELETE FROM service WHERE name = ?", params![name])?;
    Ok(())
}
