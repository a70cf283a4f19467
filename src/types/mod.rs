//! PostgreSQL column types
//!
//! Textual type expressions are parsed into a canonical structural form
//! ([`PgType`]) so that declared and observed types can be compared, and the
//! type-change policy decides which in-place conversions are safe.

mod normalize;
mod policy;

pub use normalize::{parse, PgType, TypeArgument};
pub use policy::is_widening_allowed;
