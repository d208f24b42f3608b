//! Filter Expressions
//!
//! Predicates applied to dimension values (subjects and group-by values):
//!
//! - **AST**: the `Filter` tree, its evaluator and `CompiledFilter`
//! - **Parser**: JSON text into `Filter`
//! - **Validate**: semantic checks on a parsed tree
//!
//! Parsing and validation are separate steps so callers can tell malformed
//! input from well-formed but unacceptable input.
//!
//! ```rust
//! use meterscope::filter::{parse_filter, validate_filter};
//!
//! let filter = parse_filter(r#"{"$in": ["acme", "globex"]}"#).unwrap();
//! validate_filter(&filter).unwrap();
//! assert!(filter.matches(Some("acme")));
//! ```

mod ast;
mod error;
mod parser;
mod validate;

pub use ast::{CompiledFilter, Filter};
pub use error::{FilterError, FilterResult};
pub use parser::{parse_filter, parse_value};
pub use validate::{validate_filter, MAX_FILTER_DEPTH};
