pub mod agent;
pub mod host;
