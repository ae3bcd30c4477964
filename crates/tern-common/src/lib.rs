pub mod diagnostic;
pub mod error;
pub mod package_graph;
pub mod source;
pub mod span;
pub mod token;
