//! Foundation types: source tracking and the NWScript type lattice.

pub mod span;
pub mod types;

pub use span::{SourceFile, SourceMap, Span};
pub use types::{Constant, Type};
