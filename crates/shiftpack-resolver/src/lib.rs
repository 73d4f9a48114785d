mod closure;
mod order;

pub use closure::{DependencyResolver, ReverseIndex, DEFAULT_MAX_DEPTH};
pub use order::{dependency_order, removal_order};
