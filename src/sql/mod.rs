//! Safe SQL builder: identifiers from settings only, values as parameters.

mod builder;
pub mod params;
pub mod predicate;
pub use builder::*;
pub use params::*;
pub use predicate::compile_where;
