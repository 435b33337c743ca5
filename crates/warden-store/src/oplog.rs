//! Append-only audit trail (oplog).
//!
//! Every committed resource mutation writes one `oplog_entry` row inside the
//! same transaction as the row change. Entries are chained: each digest
//! covers the previous entry's digest plus the canonical JSON of the entry
//! body, so any edit, deletion or reordering of history is detectable with
//! [`verify_chain`].
//!
//! ## Digest
//!
//! `digest = sha256(prev_digest || canonical_json(body))`, hex-encoded. The
//! first entry chains from [`GENESIS_DIGEST`]. `serde_json` maps are ordered
//! by key, which makes the body serialization canonical.
//!
//! ## Append-only
//!
//! Store triggers abort any `UPDATE` or `DELETE` on `oplog_entry`; the
//! resulting error is classified as `AppendOnlyViolation`.

#![allow(clippy::result_large_err)]

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use warden_core::errors::{ExError, ExErrorKind};
use warden_core::model::{now_millis, AuditEntry, OpType, OplogFilter};

use crate::errors::{corrupt_row, from_rusqlite, tamper_detected, Result};
use crate::repo::hydration::millis_to_time;

/// `prev_digest` of the first entry
pub const GENESIS_DIGEST: &str = "0000000000000000000000000000000000000000000000000000000000000000";

const ENTRY_COLUMNS: &str = "seq, entry_id, op_type, resource_kind, table_name, target_id, \
     scope_id, field_mask, null_paths, version, data, request_id, create_time, prev_digest, digest";

/// A mutation to record
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub op_type: OpType,
    pub resource_kind: &'a str,
    pub table_name: &'a str,
    pub target_id: &'a str,
    pub scope_id: &'a str,
    pub field_mask: Vec<String>,
    pub null_paths: Vec<String>,
    pub version: u32,
    pub data: serde_json::Value,
    pub request_id: Option<&'a str>,
}

/// Hex SHA-256 over the previous digest and the body
pub fn compute_digest(prev_digest: &str, body: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_digest.as_bytes());
    hasher.update(body.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Everything an entry records except its sequence number and digests
fn entry_body(entry: &AuditEntry) -> serde_json::Value {
    serde_json::json!({
        "entry_id": entry.entry_id,
        "op_type": entry.op_type.as_str(),
        "resource_kind": entry.resource_kind,
        "table_name": entry.table_name,
        "target_id": entry.target_id,
        "scope_id": entry.scope_id,
        "field_mask": entry.field_mask,
        "null_paths": entry.null_paths,
        "version": entry.version,
        "data": entry.data,
        "request_id": entry.request_id,
        "create_time": entry.create_time.timestamp_millis(),
    })
}

fn serialization(op: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(op.to_string())
        .with_message(err.to_string())
}

/// Append an entry.
///
/// Takes a live transaction: the entry commits or rolls back together with
/// the row mutation it describes.
///
/// ## Errors
///
/// - `ExErrorKind::Serialization`: the snapshot could not be encoded
/// - any store error from the insert, classified by `from_rusqlite`
pub fn append(tx: &Transaction, entry: NewEntry<'_>) -> Result<AuditEntry> {
    let prev_digest: String = tx
        .query_row(
            "SELECT digest FROM oplog_entry ORDER BY seq DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?
        .unwrap_or_else(|| GENESIS_DIGEST.to_string());

    let mut record = AuditEntry {
        seq: 0,
        entry_id: Uuid::now_v7().to_string(),
        op_type: entry.op_type,
        resource_kind: entry.resource_kind.to_string(),
        table_name: entry.table_name.to_string(),
        target_id: entry.target_id.to_string(),
        scope_id: entry.scope_id.to_string(),
        field_mask: entry.field_mask,
        null_paths: entry.null_paths,
        version: entry.version,
        data: entry.data,
        request_id: entry.request_id.map(str::to_string),
        create_time: now_millis(),
        digest: String::new(),
        prev_digest,
    };
    record.digest = compute_digest(&record.prev_digest, &entry_body(&record));

    let field_mask =
        serde_json::to_string(&record.field_mask).map_err(|e| serialization("oplog_append", e))?;
    let null_paths =
        serde_json::to_string(&record.null_paths).map_err(|e| serialization("oplog_append", e))?;

    tx.execute(
        "INSERT INTO oplog_entry (entry_id, op_type, resource_kind, table_name, target_id, \
         scope_id, field_mask, null_paths, version, data, request_id, create_time, \
         prev_digest, digest) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            record.entry_id,
            record.op_type.as_str(),
            record.resource_kind,
            record.table_name,
            record.target_id,
            record.scope_id,
            field_mask,
            null_paths,
            record.version,
            record.data,
            record.request_id,
            record.create_time.timestamp_millis(),
            record.prev_digest,
            record.digest,
        ],
    )
    .map_err(from_rusqlite)?;
    record.seq = tx.last_insert_rowid();

    tracing::debug!(
        seq = record.seq,
        op_type = record.op_type.as_str(),
        target_id = %record.target_id,
        "oplog entry appended"
    );
    Ok(record)
}

/// Raw row as stored; decoded outside the rusqlite row callback
struct StoredEntry {
    seq: i64,
    entry_id: String,
    op_type: String,
    resource_kind: String,
    table_name: String,
    target_id: String,
    scope_id: String,
    field_mask: String,
    null_paths: String,
    version: u32,
    data: serde_json::Value,
    request_id: Option<String>,
    create_time: i64,
    prev_digest: String,
    digest: String,
}

impl StoredEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            entry_id: row.get(1)?,
            op_type: row.get(2)?,
            resource_kind: row.get(3)?,
            table_name: row.get(4)?,
            target_id: row.get(5)?,
            scope_id: row.get(6)?,
            field_mask: row.get(7)?,
            null_paths: row.get(8)?,
            version: row.get(9)?,
            data: row.get(10)?,
            request_id: row.get(11)?,
            create_time: row.get(12)?,
            prev_digest: row.get(13)?,
            digest: row.get(14)?,
        })
    }

    fn decode(self) -> Result<AuditEntry> {
        let paths = |what: &str, raw: &str| -> Result<Vec<String>> {
            serde_json::from_str(raw).map_err(|e| corrupt_row(what, e))
        };
        Ok(AuditEntry {
            seq: self.seq,
            entry_id: self.entry_id,
            op_type: self.op_type.parse().map_err(ExError::from)?,
            resource_kind: self.resource_kind,
            table_name: self.table_name,
            target_id: self.target_id,
            scope_id: self.scope_id,
            field_mask: paths("field_mask", &self.field_mask)?,
            null_paths: paths("null_paths", &self.null_paths)?,
            version: self.version,
            data: self.data,
            request_id: self.request_id,
            create_time: millis_to_time("create_time", self.create_time)?,
            prev_digest: self.prev_digest,
            digest: self.digest,
        })
    }
}

/// Entries recorded for `target_id`, oldest first.
///
/// Ordered by `create_time`, ties broken by `seq`.
///
/// ## Errors
///
/// - `ExErrorKind::Serialization`: a stored entry could not be decoded
/// - any store error, classified by `from_rusqlite`
pub fn query(conn: &Connection, target_id: &str, filter: &OplogFilter) -> Result<Vec<AuditEntry>> {
    let mut sql = format!(
        "SELECT {} FROM oplog_entry WHERE target_id = ?1",
        ENTRY_COLUMNS
    );
    let op_type = filter.op_type.map(|op| op.as_str());
    let not_before = filter.not_before.map(|t| t.timestamp_millis());
    sql.push_str(" AND (?2 IS NULL OR op_type = ?2)");
    sql.push_str(" AND (?3 IS NULL OR create_time >= ?3)");
    sql.push_str(" ORDER BY create_time ASC, seq ASC");

    let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
    let rows = stmt
        .query_map(params![target_id, op_type, not_before], StoredEntry::from_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    rows.into_iter().map(StoredEntry::decode).collect()
}

/// Number of entries recorded for `target_id`
pub fn count(conn: &Connection, target_id: &str) -> Result<usize> {
    let n: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM oplog_entry WHERE target_id = ?1",
            [target_id],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;
    Ok(usize::try_from(n).unwrap_or(0))
}

/// Recompute the whole chain in `seq` order.
///
/// ## Returns
///
/// The number of entries verified.
///
/// ## Errors
///
/// - `ExErrorKind::TamperDetected`: naming the first entry whose stored
///   `prev_digest` or `digest` does not match the recomputed chain
pub fn verify_chain(conn: &Connection) -> Result<u64> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM oplog_entry ORDER BY seq ASC",
            ENTRY_COLUMNS
        ))
        .map_err(from_rusqlite)?;
    let mut rows = stmt.query([]).map_err(from_rusqlite)?;

    let mut expected_prev = GENESIS_DIGEST.to_string();
    let mut verified = 0u64;
    while let Some(row) = rows.next().map_err(from_rusqlite)? {
        let stored = StoredEntry::from_row(row).map_err(from_rusqlite)?;
        let seq = stored.seq;
        let entry = stored.decode().map_err(|_| tamper_detected(seq))?;

        if entry.prev_digest != expected_prev
            || compute_digest(&entry.prev_digest, &entry_body(&entry)) != entry.digest
        {
            return Err(tamper_detected(seq));
        }
        expected_prev = entry.digest;
        verified += 1;
    }

    tracing::debug!(entries = verified, "oplog chain verified");
    Ok(verified)
}
