//! Scope-qualified writer calls
//!
//! A [`ScopedWriter`] borrows the shared [`Writer`] and qualifies each call
//! by an acting scope. Nothing on the writer changes, so concurrent callers
//! can act in different scopes through the same writer.

#![allow(clippy::result_large_err)]

use warden_core::model::{AuditEntry, OplogFilter, Resource};
use warden_core_types::RequestContext;
use warden_store::errors::Result;

use crate::options::UpdateOptions;
use crate::writer::Writer;

/// Writer calls acting within one scope
#[derive(Clone, Copy)]
pub struct ScopedWriter<'a> {
    writer: &'a Writer,
    scope_id: &'a str,
}

impl<'a> ScopedWriter<'a> {
    pub fn new(writer: &'a Writer, scope_id: &'a str) -> Self {
        Self { writer, scope_id }
    }

    pub fn scope_id(&self) -> &str {
        self.scope_id
    }

    /// Create in the acting scope. An empty `scope_id` on the resource is
    /// filled in; a different one is `InvalidParameter`.
    ///
    /// # Errors
    ///
    /// As [`Writer::create`].
    pub fn create<R: Resource>(&self, ctx: &RequestContext, resource: &mut R) -> Result<usize> {
        self.writer.create_scoped(ctx, resource, Some(self.scope_id))
    }

    /// `NotFound` for a resource that lives in another scope
    ///
    /// # Errors
    ///
    /// As [`Writer::read`].
    pub fn read<R: Resource>(&self, ctx: &RequestContext, public_id: &str) -> Result<R> {
        self.writer
            .read_scoped(ctx, R::KIND.default_table(), public_id, Some(self.scope_id))
    }

    /// # Errors
    ///
    /// As [`Writer::lookup`].
    pub fn lookup<R: Resource>(&self, ctx: &RequestContext, resource: &mut R) -> Result<()> {
        self.writer.lookup_scoped(ctx, resource, Some(self.scope_id))
    }

    /// 0 rows for a resource that lives in another scope
    ///
    /// # Errors
    ///
    /// As [`Writer::update`].
    pub fn update<R: Resource>(
        &self,
        ctx: &RequestContext,
        resource: &mut R,
        field_mask_paths: &[&str],
        null_paths: &[&str],
        opts: UpdateOptions,
    ) -> Result<usize> {
        self.writer.update_scoped(
            ctx,
            resource,
            field_mask_paths,
            null_paths,
            opts,
            Some(self.scope_id),
        )
    }

    /// 0 rows for a resource that lives in another scope
    ///
    /// # Errors
    ///
    /// As [`Writer::delete`].
    pub fn delete<R: Resource>(&self, ctx: &RequestContext, resource: &R) -> Result<usize> {
        self.writer.delete_scoped(ctx, resource, Some(self.scope_id))
    }

    /// Oplog entries for `target_id` recorded in the acting scope
    ///
    /// # Errors
    ///
    /// As [`Writer::oplog`].
    pub fn oplog(
        &self,
        ctx: &RequestContext,
        target_id: &str,
        filter: &OplogFilter,
    ) -> Result<Vec<AuditEntry>> {
        let mut entries = self.writer.oplog(ctx, target_id, filter)?;
        entries.retain(|e| e.scope_id == self.scope_id);
        Ok(entries)
    }
}
