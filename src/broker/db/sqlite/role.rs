use anyhow::{bail, Result};
use log::debug;
use rusqlite::{params, Connection, Row, Transaction};

use crate::broker::db::RoleRecord;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS role (
    name TEXT PRIMARY KEY NOT NULL,
    arn TEXT NOT NULL,
    policy TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);
"#;

fn read_role(row: &Row) -> rusqlite::Result<RoleRecord> {
    Ok(RoleRecord {
        name: row.get(0)?,
        arn: row.get(1)?,
        policy: row.get(2)?,
        create_time: row.get(3)?,
        update_time: row.get(4)?,
    })
}

pub fn create_role_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_role(tx: &Transaction, role: &RoleRecord) -> Result<()> {
    debug!("Database create_role: {}", role.name);
    tx.execute(
        "INSERT INTO role (name, arn, policy, create_time, update_time) VALUES (?, ?, ?, ?, ?)",
        params![
            role.name,
            role.arn,
            role.policy,
            role.create_time,
            role.update_time
        ],
    )?;
    Ok(())
}

pub fn get_role(tx: &Transaction, name: &str) -> Result<RoleRecord> {
    let mut stmt =
        tx.prepare("SELECT name, arn, policy, create_time, update_time FROM role WHERE name = ?")?;
    let role = stmt.query_row(params![name], read_role)?;
    Ok(role)
}

pub fn list_roles(tx: &Transaction) -> Result<Vec<RoleRecord>> {
    let mut stmt =
        tx.prepare("SELECT name, arn, policy, create_time, update_time FROM role ORDER BY name")?;
    let roles = stmt
        .query_map([], read_role)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(roles)
}

pub fn is_role_exists(tx: &Transaction, name: &str) -> Result<bool> {
    let mut stmt = tx.prepare("SELECT COUNT(*) FROM role WHERE name = ?")?;
    let count: i64 = stmt.query_row(params![name], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn update_role_policy(tx: &Transaction, name: &str, policy: &str, update_time: u64) -> Result<()> {
    debug!("Database update_role_policy: {name}");
    let count = tx.execute(
        "UPDATE role SET policy = ?, update_time = ? WHERE name = ?",
        params![policy, update_time, name],
    )?;
    if count == 0 {
        bail!("role '{name}' not found");
    }
    Ok(())
}

pub fn delete_role(tx: &Transaction, name: &str) -> Result<()> {
    debug!("Database delete_role: {name}");
    tx.execute("DELETE FROM role WHERE name = ?", params![name])?;
    Ok(())
}
