pub mod fetcher;
pub mod job;
pub mod orchestrator;
pub mod preview;
pub mod scheduler;
pub mod session;

#[cfg(test)]
mod testing;
