//! Engine internals: model parsing, the matcher language and effect rules

pub mod builtins;
pub mod cache;
pub mod config;
pub mod effect;
pub mod error;
pub mod matcher;
pub mod model;
pub mod pattern;
pub mod policy;
