//! Constraint enforcement inside the write transaction
//!
//! Immutability is checked first, then `(scope_id, name)` uniqueness. The
//! uniqueness lookup runs on the transaction's connection, so under
//! `BEGIN IMMEDIATE` no other writer can insert the same name between the
//! check and the write. The partial unique index on each table stays as a
//! backstop.

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use warden_core::errors::{ExError, WardenError};
use warden_core::mask::UpdatePlan;
use warden_core::model::Resource;
use warden_core::rules::check_immutable;
use warden_store::errors::Result;
use warden_store::ResourceRepo;

fn ensure_name_free(
    conn: &Connection,
    table: &str,
    scope_id: &str,
    name: &str,
    owner: &str,
) -> Result<()> {
    match ResourceRepo::find_by_name(conn, table, scope_id, name)? {
        Some(existing) if existing != owner => {
            tracing::debug!(table, scope_id, name, existing = %existing, "name already taken");
            Err(ExError::from(WardenError::DuplicateName {
                scope_id: scope_id.to_string(),
                name: name.to_string(),
            }))
        }
        _ => Ok(()),
    }
}

/// Constraints for a resource about to be inserted
pub fn check_create<R: Resource>(conn: &Connection, resource: &R) -> Result<()> {
    if let Some(name) = resource.name().filter(|n| !n.is_empty()) {
        ensure_name_free(
            conn,
            resource.table_name(),
            resource.scope_id(),
            name,
            resource.public_id(),
        )?;
    }
    Ok(())
}

/// Constraints for applying `plan` to the persisted `current`
pub fn check_update<R: Resource>(
    conn: &Connection,
    table: &str,
    current: &R,
    plan: &UpdatePlan,
) -> Result<()> {
    check_immutable(current, plan)?;

    let planned_name = plan
        .get("name")
        .and_then(|a| a.value.as_ref())
        .and_then(|v| v.as_text())
        .filter(|n| !n.is_empty());
    if let Some(name) = planned_name {
        ensure_name_free(conn, table, current.scope_id(), name, current.public_id())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::errors::ExErrorKind;
    use warden_core::mask::plan_update;
    use warden_core::model::{now_millis, TcpTarget};
    use warden_store::migrations::apply_migrations;

    fn seeded() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        let mut t = TcpTarget::new("o_1", "web")
            .unwrap()
            .with_public_id("ttcp_web");
        t.meta.create_time = Some(now_millis());
        t.meta.update_time = t.meta.create_time;
        t.meta.version = 1;
        let tx = conn.transaction().unwrap();
        ResourceRepo::insert(&tx, &t).unwrap();
        tx.commit().unwrap();
        conn
    }

    #[test]
    fn test_create_with_taken_name() {
        let conn = seeded();
        let dup = TcpTarget::new("o_1", "web").unwrap().with_public_id("ttcp_2");
        let err = check_create(&conn, &dup).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::DuplicateName);
        assert_eq!(err.scope_id(), Some("o_1"));

        let other_scope = TcpTarget::new("o_2", "web").unwrap().with_public_id("ttcp_3");
        assert!(check_create(&conn, &other_scope).is_ok());
    }

    #[test]
    fn test_update_keeping_own_name_is_allowed() {
        let conn = seeded();
        let current: TcpTarget = ResourceRepo::get(&conn, "target_tcp", "ttcp_web", None)
            .unwrap()
            .unwrap();
        let plan = plan_update(&current, &["Name"], &[]).unwrap();
        assert!(check_update(&conn, "target_tcp", &current, &plan).is_ok());
    }

    #[test]
    fn test_immutability_checked_before_uniqueness() {
        let conn = seeded();
        let current: TcpTarget = ResourceRepo::get(&conn, "target_tcp", "ttcp_web", None)
            .unwrap()
            .unwrap();
        let mut proposed = current.clone();
        proposed.scope_id = "o_2".to_string();
        let plan = plan_update(&proposed, &["ScopeId", "Name"], &[]).unwrap();
        let err = check_update(&conn, "target_tcp", &current, &plan).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::ImmutableFieldViolation);
    }
}
