pub mod context;
pub mod parser;
pub mod runner;

#[cfg(test)]
mod tests;

pub use runner::AgentSession;
