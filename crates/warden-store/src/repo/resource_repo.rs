//! Generic row repository for resource kinds
//!
//! Statements are built from the kind's field catalogue. Table names are
//! interpolated into SQL text and are checked with `validate_table_name`
//! before every use; values are always bound parameters.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Transaction};
use warden_core::errors::{ExError, ExErrorKind};
use warden_core::mask::UpdatePlan;
use warden_core::model::{FieldType, Resource};
use warden_core::rules::validate_table_name;

use super::hydration::{hydrate, read_values, select_columns, to_sql_value};
use crate::errors::{from_rusqlite, Result};

fn checked_table(table: &str) -> Result<&str> {
    validate_table_name(table).map_err(ExError::from)?;
    Ok(table)
}

/// Attach scope and name to a unique-index failure
fn name_conflict(err: ExError, scope_id: &str, name: Option<&str>) -> ExError {
    if err.kind() != ExErrorKind::DuplicateName {
        return err;
    }
    let err = err.with_scope_id(scope_id).with_field("name");
    match name {
        Some(name) => err.with_message(format!("name {:?} already exists in scope", name)),
        None => err,
    }
}

/// DDL for a table holding resources of kind `R`
pub fn create_table_sql<R: Resource>(table: &str) -> String {
    let mut cols = vec!["public_id TEXT PRIMARY KEY".to_string()];
    for f in R::fields() {
        let ty = match f.ty {
            FieldType::Text => "TEXT",
            FieldType::U32 => "INTEGER",
        };
        let constraint = if f.required { " NOT NULL" } else { "" };
        cols.push(format!("{} {}{}", f.column, ty, constraint));
    }
    cols.push("create_time INTEGER NOT NULL".to_string());
    cols.push("update_time INTEGER NOT NULL".to_string());
    cols.push("version INTEGER NOT NULL DEFAULT 1".to_string());

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        table,
        cols.join(",\n    ")
    );
    if R::fields().iter().any(|f| f.column == "name") {
        sql.push_str(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {t}_scope_name_uq ON {t} (scope_id, name) \
             WHERE name IS NOT NULL AND name <> '';\n",
            t = table
        ));
    }
    sql
}

/// Row repository shared by every resource kind
pub struct ResourceRepo;

impl ResourceRepo {
    /// Insert a stamped resource into its table
    pub fn insert<R: Resource>(tx: &Transaction, resource: &R) -> Result<()> {
        let table = checked_table(resource.table_name())?;
        let cols = select_columns::<R>();
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{}", i)).collect();

        let mut values = Vec::with_capacity(cols.len());
        values.push(Value::Text(resource.public_id().to_string()));
        for f in R::fields() {
            values.push(to_sql_value(resource.field(f.column).as_ref(), false));
        }
        values.push(Value::Integer(millis(resource.create_time())));
        values.push(Value::Integer(millis(resource.update_time())));
        values.push(Value::Integer(i64::from(resource.version())));

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", ")
        );
        tx.execute(&sql, params_from_iter(values))
            .map_err(|e| name_conflict(from_rusqlite(e), resource.scope_id(), resource.name()))?;

        tracing::debug!(table, public_id = resource.public_id(), "row inserted");
        Ok(())
    }

    /// Load a resource by public id, optionally restricted to one scope
    pub fn get<R: Resource>(
        conn: &Connection,
        table: &str,
        public_id: &str,
        scope_id: Option<&str>,
    ) -> Result<Option<R>> {
        let table = checked_table(table)?;
        let cols = select_columns::<R>();
        let mut sql = format!(
            "SELECT {} FROM {} WHERE public_id = ?1",
            cols.join(", "),
            table
        );
        let mut params = vec![public_id.to_string()];
        if let Some(scope) = scope_id {
            sql.push_str(" AND scope_id = ?2");
            params.push(scope.to_string());
        }

        let values = conn
            .query_row(&sql, params_from_iter(params), |row| read_values(row, cols.len()))
            .optional()
            .map_err(from_rusqlite)?;

        match values {
            Some(values) => {
                let mut resource: R = hydrate(&values)?;
                if table != R::KIND.default_table() {
                    resource.set_table_name(table);
                }
                Ok(Some(resource))
            }
            None => Ok(None),
        }
    }

    /// Public id of the resource holding `name` in `scope_id`, if any
    pub fn find_by_name(
        conn: &Connection,
        table: &str,
        scope_id: &str,
        name: &str,
    ) -> Result<Option<String>> {
        let table = checked_table(table)?;
        let sql = format!(
            "SELECT public_id FROM {} WHERE scope_id = ?1 AND name = ?2",
            table
        );
        conn.query_row(&sql, [scope_id, name], |row| row.get(0))
            .optional()
            .map_err(from_rusqlite)
    }

    /// Apply `plan` to one row, bumping its version and stamping
    /// `update_time`.
    ///
    /// Matches on public id and the version the caller loaded, plus scope
    /// when given. Returns the number of rows changed.
    #[allow(clippy::too_many_arguments)]
    pub fn update<R: Resource>(
        tx: &Transaction,
        table: &str,
        public_id: &str,
        plan: &UpdatePlan,
        loaded_version: u32,
        update_time: DateTime<Utc>,
        scope_id: Option<&str>,
        conflict_scope: &str,
    ) -> Result<usize> {
        let table = checked_table(table)?;
        let mut sets = Vec::with_capacity(plan.len() + 2);
        let mut values = Vec::with_capacity(plan.len() + 5);
        for a in plan.assignments() {
            values.push(to_sql_value(a.value.as_ref(), true));
            sets.push(format!("{} = ?{}", a.field.column, values.len()));
        }
        values.push(Value::Integer(update_time.timestamp_millis()));
        sets.push(format!("update_time = ?{}", values.len()));
        sets.push("version = version + 1".to_string());

        values.push(Value::Text(public_id.to_string()));
        let mut sql = format!(
            "UPDATE {} SET {} WHERE public_id = ?{}",
            table,
            sets.join(", "),
            values.len()
        );
        values.push(Value::Integer(i64::from(loaded_version)));
        sql.push_str(&format!(" AND version = ?{}", values.len()));
        if let Some(scope) = scope_id {
            values.push(Value::Text(scope.to_string()));
            sql.push_str(&format!(" AND scope_id = ?{}", values.len()));
        }

        let planned_name = plan
            .get("name")
            .and_then(|a| a.value.as_ref())
            .and_then(|v| v.as_text())
            .map(str::to_string);
        let rows = tx
            .execute(&sql, params_from_iter(values))
            .map_err(|e| name_conflict(from_rusqlite(e), conflict_scope, planned_name.as_deref()))?;

        tracing::debug!(table, public_id, rows, "row updated");
        Ok(rows)
    }

    /// Delete one row by public id, optionally restricted to one scope
    pub fn delete(
        tx: &Transaction,
        table: &str,
        public_id: &str,
        scope_id: Option<&str>,
    ) -> Result<usize> {
        let table = checked_table(table)?;
        let rows = match scope_id {
            Some(scope) => tx.execute(
                &format!("DELETE FROM {} WHERE public_id = ?1 AND scope_id = ?2", table),
                [public_id, scope],
            ),
            None => tx.execute(
                &format!("DELETE FROM {} WHERE public_id = ?1", table),
                [public_id],
            ),
        }
        .map_err(from_rusqlite)?;

        tracing::debug!(table, public_id, rows, "row deleted");
        Ok(rows)
    }

    /// Create a table for kind `R` unless it already exists
    pub fn create_table<R: Resource>(conn: &Connection, table: &str) -> Result<()> {
        let table = checked_table(table)?;
        conn.execute_batch(&create_table_sql::<R>(table))
            .map_err(from_rusqlite)?;
        tracing::debug!(table, resource_kind = R::KIND.as_str(), "table provisioned");
        Ok(())
    }

    pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
        conn.query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(from_rusqlite)
    }
}

fn millis(t: Option<DateTime<Utc>>) -> i64 {
    t.map_or(0, |t| t.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::apply_migrations;
    use warden_core::mask::plan_update;
    use warden_core::model::{now_millis, Group, TcpTarget};

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn
    }

    fn stamped(name: &str) -> TcpTarget {
        let mut t = TcpTarget::new("o_1", name)
            .unwrap()
            .with_public_id(format!("ttcp_{}", name));
        let now = now_millis();
        t.meta.create_time = Some(now);
        t.meta.update_time = Some(now);
        t.meta.version = 1;
        t
    }

    #[test]
    fn test_insert_and_get() {
        let mut conn = conn();
        let t = stamped("web").with_default_port(22);
        let tx = conn.transaction().unwrap();
        ResourceRepo::insert(&tx, &t).unwrap();
        tx.commit().unwrap();

        let loaded: TcpTarget = ResourceRepo::get(&conn, "target_tcp", "ttcp_web", None)
            .unwrap()
            .unwrap();
        assert_eq!(loaded, t);

        let other_scope: Option<TcpTarget> =
            ResourceRepo::get(&conn, "target_tcp", "ttcp_web", Some("o_2")).unwrap();
        assert!(other_scope.is_none());
    }

    #[test]
    fn test_unset_optional_columns_are_null() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        ResourceRepo::insert(&tx, &stamped("web")).unwrap();
        tx.commit().unwrap();

        let (desc, port): (Option<String>, Option<i64>) = conn
            .query_row(
                "SELECT description, default_port FROM target_tcp WHERE public_id = 'ttcp_web'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert!(desc.is_none());
        assert!(port.is_none());
    }

    #[test]
    fn test_unique_index_is_backstop() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        ResourceRepo::insert(&tx, &stamped("web")).unwrap();
        let dup = stamped("web").with_public_id("ttcp_other");
        let err = ResourceRepo::insert(&tx, &dup).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::DuplicateName);
        assert_eq!(err.scope_id(), Some("o_1"));

        let same_id = stamped("web2").with_public_id("ttcp_web");
        let err = ResourceRepo::insert(&tx, &same_id).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::AlreadyExists);
    }

    #[test]
    fn test_update_applies_plan_and_bumps_version() {
        let mut conn = conn();
        let t = stamped("web").with_description("old");
        let tx = conn.transaction().unwrap();
        ResourceRepo::insert(&tx, &t).unwrap();

        let mut proposed = t.clone();
        proposed.name = "web-2".to_string();
        let plan = plan_update(&proposed, &["Name"], &["Description"]).unwrap();
        let later = now_millis() + chrono::Duration::milliseconds(5);
        let apply = || {
            ResourceRepo::update::<TcpTarget>(
                &tx,
                "target_tcp",
                "ttcp_web",
                &plan,
                1,
                later,
                None,
                "o_1",
            )
        };
        assert_eq!(apply().unwrap(), 1);

        let stale = apply().unwrap();
        assert_eq!(stale, 0);
        tx.commit().unwrap();

        let loaded: TcpTarget = ResourceRepo::get(&conn, "target_tcp", "ttcp_web", None)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.name, "web-2");
        assert_eq!(loaded.description, "");
        assert_eq!(loaded.version(), 2);
        assert_eq!(loaded.update_time(), Some(later));
        assert_eq!(loaded.create_time(), t.create_time());
    }

    #[test]
    fn test_find_by_name_and_delete() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        ResourceRepo::insert(&tx, &stamped("web")).unwrap();
        assert_eq!(
            ResourceRepo::find_by_name(&tx, "target_tcp", "o_1", "web").unwrap(),
            Some("ttcp_web".to_string())
        );
        assert_eq!(
            ResourceRepo::find_by_name(&tx, "target_tcp", "o_2", "web").unwrap(),
            None
        );
        assert_eq!(
            ResourceRepo::delete(&tx, "target_tcp", "ttcp_web", Some("o_2")).unwrap(),
            0
        );
        assert_eq!(ResourceRepo::delete(&tx, "target_tcp", "ttcp_web", None).unwrap(), 1);
        assert_eq!(ResourceRepo::delete(&tx, "target_tcp", "ttcp_web", None).unwrap(), 0);
    }

    #[test]
    fn test_provisioned_table_matches_default_shape() {
        let mut conn = conn();
        ResourceRepo::create_table::<Group>(&conn, "iam_group_archive").unwrap();
        assert!(ResourceRepo::table_exists(&conn, "iam_group_archive").unwrap());
        // idempotent
        ResourceRepo::create_table::<Group>(&conn, "iam_group_archive").unwrap();

        let mut g = Group::new("o_1").unwrap().with_name("admins");
        g.meta.public_id = "g_1".to_string();
        g.meta.create_time = Some(now_millis());
        g.meta.update_time = g.meta.create_time;
        g.meta.version = 1;
        g.set_table_name("iam_group_archive");

        let tx = conn.transaction().unwrap();
        ResourceRepo::insert(&tx, &g).unwrap();
        tx.commit().unwrap();

        let loaded: Group = ResourceRepo::get(&conn, "iam_group_archive", "g_1", None)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.table_name(), "iam_group_archive");
        assert_eq!(loaded.name, "admins");
        assert!(ResourceRepo::get::<Group>(&conn, "iam_group", "g_1", None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_rejects_unsafe_table_names() {
        let conn = conn();
        let err = ResourceRepo::get::<Group>(&conn, "iam_group; DROP TABLE x", "g_1", None)
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidParameter);
        assert!(ResourceRepo::create_table::<Group>(&conn, "bad-name").is_err());
    }
}
