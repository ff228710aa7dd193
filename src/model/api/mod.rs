mod id;
pub mod pagination;
pub mod results;
pub mod vote;

pub use id::ApiId;
