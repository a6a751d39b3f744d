mod engine_impl;
mod runtime_config;

pub use engine_impl::{Engine, EngineError};
pub use runtime_config::RuntimeConfig;
