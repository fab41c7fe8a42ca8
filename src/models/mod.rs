pub mod release;
pub mod rollout;
pub mod runtime;
pub mod target;
