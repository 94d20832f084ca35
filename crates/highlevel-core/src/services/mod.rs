pub mod field_update;

pub use field_update::{FieldUpdateOutcome, FieldUpdateTask, DEFAULT_VALUE};
