pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;
pub mod relation;
pub mod generate;

pub use types::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
pub use relation::{RelationCardinality, RelationPresentation};
