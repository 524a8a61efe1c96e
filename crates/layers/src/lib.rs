pub mod filter;
pub mod index;
pub mod layer;
pub mod org_set;
pub mod query;
pub mod registry;
pub mod tokenize;

pub use layer::*;
pub use registry::*;
