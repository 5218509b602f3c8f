pub mod categorizer;
pub mod table;
pub mod validate;

pub use categorizer::{Categorizer, DEFAULT_CATEGORY, FALLBACK_CATEGORY};
pub use table::{CategoryDef, CategoryTable, TableError};
pub use validate::{ValidationReport, Validator};
