pub mod bridge;
pub mod host;
pub mod kernel;
