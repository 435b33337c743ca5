use crate::errors::{Result, WardenError};
use crate::mask::UpdatePlan;
use crate::model::{same_value, Resource};

/// Reject a plan that changes an immutable field of the persisted record.
///
/// Setting an immutable field to its current value is allowed; null and the
/// zero value compare equal.
///
/// # Errors
///
/// `ImmutableFieldViolation` naming the first changed field.
pub fn check_immutable<R: Resource>(persisted: &R, plan: &UpdatePlan) -> Result<()> {
    for a in plan.assignments().iter().filter(|a| a.field.immutable) {
        let current = persisted.field(a.field.column);
        if !same_value(a.value.as_ref(), current.as_ref()) {
            tracing::debug!(
                resource_kind = R::KIND.as_str(),
                public_id = persisted.public_id(),
                field = a.field.name,
                "immutable field change rejected"
            );
            return Err(WardenError::ImmutableFieldViolation {
                field: a.field.name.to_string(),
            });
        }
    }
    Ok(())
}
