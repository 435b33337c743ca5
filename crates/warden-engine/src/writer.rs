//! Mutation writer with boundary logging.
//!
//! Create, read, update and delete for any [`Resource`] kind, each mutation
//! committed in one `BEGIN IMMEDIATE` transaction together with its oplog
//! entry. Dropping the transaction on an early return rolls back both.
//!
//! ## Logging Ownership
//!
//! The writer owns lifecycle logging:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Lower layers (store, core) use only `tracing::debug!()` for internal details.

#![allow(clippy::result_large_err)]

use std::time::Instant;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use warden_core::errors::{ExError, ExErrorKind, WardenError};
use warden_core::mask::plan_update;
use warden_core::model::{
    next_update_time, now_millis, AuditEntry, FieldValue, OpType, OplogFilter, Resource,
};
use warden_core::rules::{validate_table_name, WriteOp};
use warden_core::{log_op_end, log_op_error, log_op_start};
use warden_core_types::schema::ops;
use warden_core_types::RequestContext;
use warden_store::errors::{context_error, from_rusqlite, Result};
use warden_store::oplog::{self, NewEntry};
use warden_store::{Pool, ResourceRepo, StoreConfig};

use crate::enforcer;
use crate::options::UpdateOptions;
use crate::scoped::ScopedWriter;

/// Fail fast once the caller's context is canceled or past its deadline
fn check(ctx: &RequestContext) -> Result<()> {
    match context_error(ctx) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn begin<'c>(conn: &'c mut Connection, ctx: &RequestContext) -> Result<Transaction<'c>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| context_error(ctx).unwrap_or_else(|| from_rusqlite(e)))
}

/// Commit unless the context went away while the transaction was open
fn commit(tx: Transaction<'_>, ctx: &RequestContext) -> Result<()> {
    check(ctx)?;
    tx.commit()
        .map_err(|e| context_error(ctx).unwrap_or_else(|| from_rusqlite(e)))
}

/// Attach the operation, resource id and correlation ids, keeping whatever
/// a lower layer already set.
fn enrich(err: ExError, op: &str, public_id: &str, ctx: &RequestContext) -> ExError {
    let err = if err.op().is_none() { err.with_op(op) } else { err };
    let err = if err.entity_id().is_none() && !public_id.is_empty() {
        err.with_entity_id(public_id)
    } else {
        err
    };
    err.with_context(ctx)
}

fn missing_public_id() -> ExError {
    ExError::from(WardenError::missing("PublicId", "public id"))
}

fn not_found<R: Resource>(public_id: &str) -> ExError {
    ExError::from(WardenError::NotFound {
        kind: R::KIND.label().to_string(),
        public_id: public_id.to_string(),
    })
}

/// Fill an empty scope with the acting one; reject a different one
fn qualify_scope<R: Resource>(resource: &mut R, scope: &str) -> Result<()> {
    if resource.scope_id().is_empty() {
        resource
            .set_field("scope_id", FieldValue::Text(scope.to_string()))
            .map_err(ExError::from)?;
        return Ok(());
    }
    if resource.scope_id() != scope {
        return Err(ExError::from(WardenError::InvalidParameter {
            field: "ScopeId".to_string(),
            reason: format!(
                "scope id {:?} does not match acting scope {:?}",
                resource.scope_id(),
                scope
            ),
        })
        .with_scope_id(scope));
    }
    Ok(())
}

/// Entry point for every resource mutation and audit query
///
/// `Send + Sync`; share it by reference or behind an `Arc`. Each call checks
/// out its own pooled connection.
pub struct Writer {
    pool: Pool,
}

impl Writer {
    /// Open a pool for `config` (running migrations) and wrap it
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` when the database cannot be opened, `Persistence`
    /// when a migration fails or its checksum changed.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Ok(Self::new(Pool::open(config)?))
    }

    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Calls qualified by an acting scope
    pub fn in_scope<'a>(&'a self, scope_id: &'a str) -> ScopedWriter<'a> {
        ScopedWriter::new(self, scope_id)
    }

    /// Persist a new resource and append its `CREATE` entry.
    ///
    /// An empty public id is replaced with a generated one. On success the
    /// caller's copy carries the id, timestamps and version 1.
    ///
    /// ## Returns
    ///
    /// Rows affected (always 1)
    ///
    /// ## Errors
    ///
    /// - `InvalidParameter`: a required field or the table name is invalid
    /// - `DuplicateName`: the name is taken in the scope
    /// - `AlreadyExists`: the public id is taken
    /// - `StoreUnavailable`: connection or lock failure (retryable)
    /// - `Canceled` / `Timeout`: the context ended first
    pub fn create<R: Resource>(&self, ctx: &RequestContext, resource: &mut R) -> Result<usize> {
        self.create_scoped(ctx, resource, None)
    }

    pub(crate) fn create_scoped<R: Resource>(
        &self,
        ctx: &RequestContext,
        resource: &mut R,
        scope: Option<&str>,
    ) -> Result<usize> {
        log_op_start!(
            ops::CREATE,
            request_id = ctx.request_id.as_str(),
            resource_kind = R::KIND.as_str(),
            table_name = resource.table_name()
        );
        let start = Instant::now();

        let created = self
            .create_impl(ctx, resource, scope)
            .map_err(|e| enrich(e, ops::CREATE, resource.public_id(), ctx))
            .map_err(|e| {
                log_op_error!(
                    ops::CREATE,
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str()
                );
                e
            })?;
        *resource = created;

        log_op_end!(
            ops::CREATE,
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str(),
            public_id = resource.public_id(),
            rows_affected = 1u64,
            version = resource.version()
        );
        Ok(1)
    }

    fn create_impl<R: Resource>(
        &self,
        ctx: &RequestContext,
        resource: &R,
        scope: Option<&str>,
    ) -> Result<R> {
        check(ctx)?;
        let mut work = resource.clone();
        if let Some(scope) = scope {
            qualify_scope(&mut work, scope)?;
        }
        if work.public_id().is_empty() {
            work.meta_mut().public_id = R::KIND.new_public_id();
        }
        work.validate(WriteOp::Create)?;

        let mut conn = self.pool.get(ctx)?;
        let tx = begin(&mut conn, ctx)?;
        enforcer::check_create(&tx, &work)?;

        let now = now_millis();
        let meta = work.meta_mut();
        meta.create_time = Some(now);
        meta.update_time = Some(now);
        meta.version = 1;

        check(ctx)?;
        ResourceRepo::insert(&tx, &work)?;
        let entry = oplog::append(
            &tx,
            NewEntry {
                op_type: OpType::Create,
                resource_kind: R::KIND.as_str(),
                table_name: work.table_name(),
                target_id: work.public_id(),
                scope_id: work.scope_id(),
                field_mask: Vec::new(),
                null_paths: Vec::new(),
                version: 1,
                data: work.snapshot()?,
                request_id: Some(ctx.request_id.as_str()),
            },
        )?;
        commit(tx, ctx)?;

        tracing::debug!(public_id = work.public_id(), oplog_seq = entry.seq, "created");
        Ok(work)
    }

    /// Load a resource from its kind's default table
    ///
    /// # Errors
    ///
    /// `NotFound` when no row matches, `InvalidParameter` on an empty id.
    pub fn read<R: Resource>(&self, ctx: &RequestContext, public_id: &str) -> Result<R> {
        self.read_scoped(ctx, R::KIND.default_table(), public_id, None)
    }

    /// Refresh `resource` from the table it names, keeping its table
    /// override
    ///
    /// # Errors
    ///
    /// As [`Writer::read`].
    pub fn lookup<R: Resource>(&self, ctx: &RequestContext, resource: &mut R) -> Result<()> {
        self.lookup_scoped(ctx, resource, None)
    }

    pub(crate) fn lookup_scoped<R: Resource>(
        &self,
        ctx: &RequestContext,
        resource: &mut R,
        scope: Option<&str>,
    ) -> Result<()> {
        let table = resource.table_name().to_string();
        let table_override = resource.table_override().map(str::to_string);
        let mut found: R = self.read_scoped(ctx, &table, resource.public_id(), scope)?;
        found.set_table_override(table_override);
        *resource = found;
        Ok(())
    }

    pub(crate) fn read_scoped<R: Resource>(
        &self,
        ctx: &RequestContext,
        table: &str,
        public_id: &str,
        scope: Option<&str>,
    ) -> Result<R> {
        log_op_start!(
            ops::READ,
            request_id = ctx.request_id.as_str(),
            resource_kind = R::KIND.as_str(),
            public_id = public_id
        );
        let start = Instant::now();

        let found = self
            .read_impl::<R>(ctx, table, public_id, scope)
            .map_err(|e| enrich(e, ops::READ, public_id, ctx))
            .map_err(|e| {
                log_op_error!(
                    ops::READ,
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str()
                );
                e
            })?;

        log_op_end!(
            ops::READ,
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str(),
            public_id = public_id,
            version = found.version()
        );
        Ok(found)
    }

    fn read_impl<R: Resource>(
        &self,
        ctx: &RequestContext,
        table: &str,
        public_id: &str,
        scope: Option<&str>,
    ) -> Result<R> {
        check(ctx)?;
        if public_id.is_empty() {
            return Err(missing_public_id());
        }
        let conn = self.pool.get(ctx)?;
        ResourceRepo::get::<R>(&conn, table, public_id, scope)?
            .ok_or_else(|| not_found::<R>(public_id))
    }

    /// Apply the named fields of `resource` to the persisted row.
    ///
    /// Only fields in `field_mask_paths` (set to the proposed value) and
    /// `null_paths` (cleared) are written. On success the caller's copy is
    /// replaced with the persisted row: new version, new update time.
    ///
    /// ## Returns
    ///
    /// Rows affected: 0 when no row has the public id, 1 otherwise.
    ///
    /// ## Errors
    ///
    /// - `EmptyFieldMask` / `AmbiguousUpdate` / `InvalidParameter`: bad request
    /// - `ImmutableFieldViolation`: the plan changes a fixed field
    /// - `DuplicateName`: the new name is taken in the scope
    /// - `Concurrency`: `opts.expected_version` differs from the persisted one
    /// - `StoreUnavailable`, `Canceled`, `Timeout`
    pub fn update<R: Resource>(
        &self,
        ctx: &RequestContext,
        resource: &mut R,
        field_mask_paths: &[&str],
        null_paths: &[&str],
        opts: UpdateOptions,
    ) -> Result<usize> {
        self.update_scoped(ctx, resource, field_mask_paths, null_paths, opts, None)
    }

    pub(crate) fn update_scoped<R: Resource>(
        &self,
        ctx: &RequestContext,
        resource: &mut R,
        field_mask_paths: &[&str],
        null_paths: &[&str],
        opts: UpdateOptions,
        scope: Option<&str>,
    ) -> Result<usize> {
        log_op_start!(
            ops::UPDATE,
            request_id = ctx.request_id.as_str(),
            resource_kind = R::KIND.as_str(),
            public_id = resource.public_id(),
            table_name = resource.table_name()
        );
        let start = Instant::now();

        let updated = self
            .update_impl(ctx, resource, field_mask_paths, null_paths, opts, scope)
            .map_err(|e| enrich(e, ops::UPDATE, resource.public_id(), ctx))
            .map_err(|e| {
                log_op_error!(
                    ops::UPDATE,
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str()
                );
                e
            })?;

        let rows = match updated {
            Some(mut row) => {
                row.set_table_override(resource.table_override().map(str::to_string));
                *resource = row;
                1
            }
            None => 0,
        };

        log_op_end!(
            ops::UPDATE,
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str(),
            public_id = resource.public_id(),
            rows_affected = rows as u64,
            version = resource.version()
        );
        Ok(rows)
    }

    fn update_impl<R: Resource>(
        &self,
        ctx: &RequestContext,
        resource: &R,
        field_mask_paths: &[&str],
        null_paths: &[&str],
        opts: UpdateOptions,
        scope: Option<&str>,
    ) -> Result<Option<R>> {
        check(ctx)?;
        let plan = plan_update(resource, field_mask_paths, null_paths)?;
        resource.validate(WriteOp::Update(&plan))?;

        let table = resource.table_name();
        let public_id = resource.public_id();
        let mut conn = self.pool.get(ctx)?;
        let tx = begin(&mut conn, ctx)?;

        let Some(current) = ResourceRepo::get::<R>(&tx, table, public_id, scope)? else {
            tracing::debug!(table, public_id, "nothing to update");
            return Ok(None);
        };
        if let Some(expected) = opts.expected_version {
            if expected != current.version() {
                return Err(ExError::from(WardenError::VersionMismatch {
                    expected,
                    actual: current.version(),
                }));
            }
        }
        enforcer::check_update(&tx, table, &current, &plan)?;

        check(ctx)?;
        let rows = ResourceRepo::update::<R>(
            &tx,
            table,
            public_id,
            &plan,
            current.version(),
            next_update_time(current.update_time()),
            scope,
            current.scope_id(),
        )?;
        if rows == 0 {
            // Version moved since the read; not expected under the write lock.
            return Ok(None);
        }

        let updated = ResourceRepo::get::<R>(&tx, table, public_id, None)?.ok_or_else(|| {
            ExError::new(ExErrorKind::Internal)
                .with_message("updated row not visible inside its transaction")
        })?;
        let entry = oplog::append(
            &tx,
            NewEntry {
                op_type: OpType::Update,
                resource_kind: R::KIND.as_str(),
                table_name: table,
                target_id: public_id,
                scope_id: updated.scope_id(),
                field_mask: plan.field_mask(),
                null_paths: plan.null_paths(),
                version: updated.version(),
                data: updated.snapshot()?,
                request_id: Some(ctx.request_id.as_str()),
            },
        )?;
        commit(tx, ctx)?;

        tracing::debug!(public_id, version = updated.version(), oplog_seq = entry.seq, "updated");
        Ok(Some(updated))
    }

    /// Remove the row named by `resource` and append its `DELETE` entry.
    ///
    /// ## Returns
    ///
    /// Rows affected: 0 (and no oplog entry) when no row has the public id.
    ///
    /// ## Errors
    ///
    /// `InvalidParameter` on an empty id or bad table name, plus the store
    /// and context errors of [`Writer::create`].
    pub fn delete<R: Resource>(&self, ctx: &RequestContext, resource: &R) -> Result<usize> {
        self.delete_scoped(ctx, resource, None)
    }

    pub(crate) fn delete_scoped<R: Resource>(
        &self,
        ctx: &RequestContext,
        resource: &R,
        scope: Option<&str>,
    ) -> Result<usize> {
        log_op_start!(
            ops::DELETE,
            request_id = ctx.request_id.as_str(),
            resource_kind = R::KIND.as_str(),
            public_id = resource.public_id(),
            table_name = resource.table_name()
        );
        let start = Instant::now();

        let rows = self
            .delete_impl(ctx, resource, scope)
            .map_err(|e| enrich(e, ops::DELETE, resource.public_id(), ctx))
            .map_err(|e| {
                log_op_error!(
                    ops::DELETE,
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str()
                );
                e
            })?;

        log_op_end!(
            ops::DELETE,
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str(),
            public_id = resource.public_id(),
            rows_affected = rows as u64
        );
        Ok(rows)
    }

    fn delete_impl<R: Resource>(
        &self,
        ctx: &RequestContext,
        resource: &R,
        scope: Option<&str>,
    ) -> Result<usize> {
        check(ctx)?;
        let public_id = resource.public_id();
        if public_id.is_empty() {
            return Err(missing_public_id());
        }
        let table = resource.table_name();
        validate_table_name(table).map_err(ExError::from)?;

        let mut conn = self.pool.get(ctx)?;
        let tx = begin(&mut conn, ctx)?;
        let Some(current) = ResourceRepo::get::<R>(&tx, table, public_id, scope)? else {
            tracing::debug!(table, public_id, "nothing to delete");
            return Ok(0);
        };

        check(ctx)?;
        let rows = ResourceRepo::delete(&tx, table, public_id, scope)?;
        oplog::append(
            &tx,
            NewEntry {
                op_type: OpType::Delete,
                resource_kind: R::KIND.as_str(),
                table_name: table,
                target_id: public_id,
                scope_id: current.scope_id(),
                field_mask: Vec::new(),
                null_paths: Vec::new(),
                version: current.version(),
                data: current.snapshot()?,
                request_id: Some(ctx.request_id.as_str()),
            },
        )?;
        commit(tx, ctx)?;
        Ok(rows)
    }

    /// Oplog entries for one resource, oldest first
    ///
    /// # Errors
    ///
    /// Store and context errors; `Serialization` for an undecodable entry.
    pub fn oplog(
        &self,
        ctx: &RequestContext,
        target_id: &str,
        filter: &OplogFilter,
    ) -> Result<Vec<AuditEntry>> {
        log_op_start!(
            ops::OPLOG_QUERY,
            request_id = ctx.request_id.as_str(),
            public_id = target_id
        );
        let start = Instant::now();

        let entries = self
            .oplog_impl(ctx, target_id, filter)
            .map_err(|e| enrich(e, ops::OPLOG_QUERY, target_id, ctx))
            .map_err(|e| {
                log_op_error!(
                    ops::OPLOG_QUERY,
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str()
                );
                e
            })?;

        log_op_end!(
            ops::OPLOG_QUERY,
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str(),
            entries = entries.len() as u64
        );
        Ok(entries)
    }

    fn oplog_impl(
        &self,
        ctx: &RequestContext,
        target_id: &str,
        filter: &OplogFilter,
    ) -> Result<Vec<AuditEntry>> {
        check(ctx)?;
        let conn = self.pool.get(ctx)?;
        oplog::query(&conn, target_id, filter)
    }

    /// Recompute the whole oplog hash chain
    ///
    /// ## Returns
    ///
    /// Number of entries verified
    ///
    /// ## Errors
    ///
    /// `TamperDetected` naming the first entry whose digest does not match.
    pub fn verify_oplog(&self, ctx: &RequestContext) -> Result<u64> {
        log_op_start!(ops::VERIFY_OPLOG, request_id = ctx.request_id.as_str());
        let start = Instant::now();

        let verified = check(ctx)
            .and_then(|_| self.pool.get(ctx))
            .and_then(|conn| oplog::verify_chain(&conn))
            .map_err(|e| enrich(e, ops::VERIFY_OPLOG, "", ctx))
            .map_err(|e| {
                log_op_error!(
                    ops::VERIFY_OPLOG,
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str()
                );
                e
            })?;

        log_op_end!(
            ops::VERIFY_OPLOG,
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str(),
            entries = verified
        );
        Ok(verified)
    }

    /// Create `table` with kind `R`'s schema unless it already exists.
    ///
    /// Resources whose table override names it are then written there.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` when `table` is not a plain identifier.
    pub fn provision_table<R: Resource>(&self, ctx: &RequestContext, table: &str) -> Result<()> {
        log_op_start!(
            ops::PROVISION_TABLE,
            request_id = ctx.request_id.as_str(),
            resource_kind = R::KIND.as_str(),
            table_name = table
        );
        let start = Instant::now();

        check(ctx)
            .and_then(|_| validate_table_name(table).map_err(ExError::from))
            .and_then(|_| self.pool.get(ctx))
            .and_then(|conn| ResourceRepo::create_table::<R>(&conn, table))
            .map_err(|e| enrich(e, ops::PROVISION_TABLE, "", ctx))
            .map_err(|e| {
                log_op_error!(
                    ops::PROVISION_TABLE,
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str()
                );
                e
            })?;

        log_op_end!(
            ops::PROVISION_TABLE,
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str(),
            table_name = table
        );
        Ok(())
    }
}
