pub mod analysis;
pub mod ast;
pub mod coverage;
pub mod error;
pub mod metrics;
pub mod session;
pub mod tree;
