//! Field-mask update planning
//!
//! An update names the fields it touches in two lists: `field_mask_paths`
//! (copy the value from the proposed resource) and `null_paths` (set to null).
//! The planner resolves both against the kind's field catalogue and produces
//! the ordered assignments the repository applies. Fields outside both lists
//! are never touched.

use std::collections::HashSet;

use crate::errors::{Result, WardenError};
use crate::model::{FieldSpec, FieldValue, Resource};

/// One planned column write; `None` sets the column to null
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: &'static FieldSpec,
    pub value: Option<FieldValue>,
}

impl Assignment {
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// Ordered assignments: field-mask entries in caller order, then null paths
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePlan {
    assignments: Vec<Assignment>,
}

impl UpdatePlan {
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Assignment for a column, if the plan touches it
    pub fn get(&self, column: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.field.column == column)
    }

    pub fn touches(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Canonical names of the fields set to a value
    pub fn field_mask(&self) -> Vec<String> {
        self.names(|a| !a.is_null())
    }

    /// Canonical names of the fields set to null
    pub fn null_paths(&self) -> Vec<String> {
        self.names(Assignment::is_null)
    }

    fn names(&self, keep: impl Fn(&Assignment) -> bool) -> Vec<String> {
        self.assignments
            .iter()
            .filter(|a| keep(a))
            .map(|a| a.field.name.to_string())
            .collect()
    }

    /// Apply the plan to an in-memory resource. Null assignments become the
    /// field's zero value, which is how a null column reads back.
    ///
    /// # Errors
    ///
    /// `Internal` if an assignment does not fit the resource's fields.
    pub fn apply_to<R: Resource>(&self, target: &mut R) -> Result<()> {
        for a in &self.assignments {
            match &a.value {
                Some(v) => target.set_field(a.field.column, v.clone())?,
                None => target.clear_field(a.field.column)?,
            }
        }
        Ok(())
    }
}

fn resolve<R: Resource>(path: &str) -> Result<&'static FieldSpec> {
    R::field_spec(path).ok_or_else(|| WardenError::InvalidParameter {
        field: path.to_string(),
        reason: format!("unknown field for {}", R::KIND.label()),
    })
}

/// Resolve the two path lists against `R`'s field catalogue.
///
/// # Errors
///
/// - `EmptyFieldMask` when both lists are empty
/// - `InvalidParameter` for a path naming no field
/// - `AmbiguousUpdate` listing the fields named in both lists
pub fn plan_update<R: Resource, S: AsRef<str>>(
    proposed: &R,
    field_mask_paths: &[S],
    null_paths: &[S],
) -> Result<UpdatePlan> {
    if field_mask_paths.is_empty() && null_paths.is_empty() {
        return Err(WardenError::EmptyFieldMask);
    }

    let set_fields = dedup(
        field_mask_paths
            .iter()
            .map(|p| resolve::<R>(p.as_ref()))
            .collect::<Result<Vec<_>>>()?,
    );
    let null_fields = dedup(
        null_paths
            .iter()
            .map(|p| resolve::<R>(p.as_ref()))
            .collect::<Result<Vec<_>>>()?,
    );

    let nulled: HashSet<&str> = null_fields.iter().map(|f| f.column).collect();
    let both: Vec<String> = set_fields
        .iter()
        .filter(|f| nulled.contains(f.column))
        .map(|f| f.name.to_string())
        .collect();
    if !both.is_empty() {
        return Err(WardenError::AmbiguousUpdate { fields: both });
    }

    let mut assignments = Vec::with_capacity(set_fields.len() + null_fields.len());
    for field in set_fields {
        let value = proposed
            .field(field.column)
            .ok_or_else(|| WardenError::Internal {
                message: format!("{} does not expose column {}", R::KIND.label(), field.column),
            })?;
        assignments.push(Assignment {
            field,
            value: Some(value),
        });
    }
    assignments.extend(null_fields.into_iter().map(|field| Assignment { field, value: None }));

    Ok(UpdatePlan { assignments })
}

fn dedup(fields: Vec<&'static FieldSpec>) -> Vec<&'static FieldSpec> {
    let mut seen = HashSet::new();
    fields
        .into_iter()
        .filter(|f| seen.insert(f.column))
        .collect()
}
