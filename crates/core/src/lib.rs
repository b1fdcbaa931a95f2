pub mod types;
pub mod error;
pub mod logger;
pub mod sleep;
pub mod settings;
pub mod plan;
pub mod scaling;
pub mod matcher;
pub mod region;
pub mod dedupe;
pub mod templates;
pub mod gateway;
pub mod interpreter;
pub mod platform;

#[cfg(feature = "debug-capture")]
pub mod debug;

#[cfg(test)]
mod testkit;
