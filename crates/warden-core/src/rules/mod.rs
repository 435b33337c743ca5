//! Pure write-path rules: creation/update vetting and immutability

pub mod immutability;
pub mod validation;

pub use immutability::check_immutable;
pub use validation::{validate_plan, validate_required, validate_table_name, vet_for_write, WriteOp};
