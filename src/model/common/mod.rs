pub mod election;
pub mod results;
