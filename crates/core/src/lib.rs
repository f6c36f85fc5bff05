pub mod channels;
pub mod config;
pub mod messaging;
pub mod types;

#[cfg(test)]
mod channels_tests;
