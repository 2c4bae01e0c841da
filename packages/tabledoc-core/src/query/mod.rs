//! Query model and compilation.
//!
//! Queries come from two sources: predicate trees, built directly or derived
//! from method names, which [`QueryCompiler`] turns into parameterized
//! statements; and literal statement text with named parameters.

mod compiler;
mod criteria;
mod descriptor;
mod literal;
mod method_name;

pub use compiler::{like_to_regex, CompiledQuery, QueryCompiler, LIMIT_PARAMETER, OFFSET_PARAMETER};
pub use criteria::{Criteria, Criterion, Junction, OperatorKind};
pub use descriptor::{Direction, Order, Pageable, QueryDescriptor, QueryMode, Sort};
pub use literal::LiteralQuery;
pub use method_name::{MethodQuery, Part};
