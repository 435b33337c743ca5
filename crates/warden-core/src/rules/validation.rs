use crate::errors::{Result, WardenError};
use crate::mask::UpdatePlan;
use crate::model::Resource;

/// Longest identifier accepted as a table name
pub const MAX_TABLE_NAME_LEN: usize = 63;

/// Purpose of a write being vetted
#[derive(Debug, Clone, Copy)]
pub enum WriteOp<'a> {
    Create,
    Update(&'a UpdatePlan),
}

/// Vet a resource before it is written.
///
/// Creation checks the public id and every required field. Update checks the
/// public id and only the fields the plan assigns.
///
/// # Errors
///
/// `InvalidParameter` naming the first offending field.
pub fn vet_for_write<R: Resource>(resource: &R, op: WriteOp<'_>) -> Result<()> {
    validate_table_name(resource.table_name())?;
    if resource.public_id().is_empty() {
        return Err(WardenError::missing("PublicId", "public id"));
    }
    match op {
        WriteOp::Create => validate_required(resource),
        WriteOp::Update(plan) => validate_plan(plan),
    }
}

/// Every required field holds a non-zero value, checked in catalogue order.
/// The public id is not inspected.
///
/// # Errors
///
/// `InvalidParameter` naming the first missing field.
pub fn validate_required<R: Resource>(resource: &R) -> Result<()> {
    for spec in R::fields().iter().filter(|f| f.required) {
        let missing = resource
            .field(spec.column)
            .map_or(true, |v| v.is_zero());
        if missing {
            return Err(WardenError::missing(spec.name, spec.label));
        }
    }
    Ok(())
}

/// The plan never leaves a required field empty.
///
/// # Errors
///
/// `InvalidParameter` when a required field is nulled or set to its zero value.
pub fn validate_plan(plan: &UpdatePlan) -> Result<()> {
    for a in plan.assignments().iter().filter(|a| a.field.required) {
        let reason = match &a.value {
            None => "required field cannot be set to null",
            Some(v) if v.is_zero() => "required field cannot be set to empty",
            Some(_) => continue,
        };
        return Err(WardenError::InvalidParameter {
            field: a.field.name.to_string(),
            reason: format!("{}: {}", reason, a.field.label),
        });
    }
    Ok(())
}

/// Table names end up in SQL text, so only plain identifiers are allowed.
///
/// # Errors
///
/// `InvalidParameter` on an empty, too long or non-identifier name.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid = valid_start
        && name.len() <= MAX_TABLE_NAME_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WardenError::InvalidParameter {
            field: "table name".to_string(),
            reason: format!("not a plain identifier: {:?}", name),
        })
    }
}
