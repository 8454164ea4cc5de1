//! # enforcer-rs - Model-Driven Access Control
//!
//! `enforcer-rs` decides access requests against a declarative model and a
//! set of policy rows. The model is a small INI-like document naming the
//! request and policy tuples, optional role predicates, an effect rule and a
//! boolean matcher expression:
//!
//! - **Matcher language** compiled once into stack-machine instructions
//! - **Effect rules**: allow-override and deny-override
//! - **Role predicates** answered by pluggable resolvers
//! - **Built-ins**: `regex_match?`, `key_match?`, `glob_match?`
//!
//! ## Quick Start
//!
//! ```rust
//! use enforcer_rs::{Enforcer, Result};
//!
//! # fn main() -> Result<()> {
//! let model = "\
//! [request_definition]
//! r = sub, obj, act
//!
//! [policy_definition]
//! p = sub, obj, act
//!
//! [policy_effect]
//! e = some(where (p.eft == allow))
//!
//! [matchers]
//! m = r.sub == p.sub && key_match?(r.obj, p.obj) && r.act == p.act
//! ";
//!
//! let enforcer = Enforcer::new(model)?;
//! enforcer.add_policy("p", &["alice", "/data/*", "read"])?;
//!
//! assert!(enforcer.enforce(&["alice", "/data/report", "read"])?);
//! assert!(!enforcer.enforce(&["alice", "/data/report", "write"])?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Lower-level pieces
//!
//! Each stage is usable on its own: [`core::config`] parses model text,
//! [`core::matcher`] compiles and evaluates expressions, [`core::effect`]
//! combines matched rows into a decision.

pub mod core;
mod enforcer;

pub use crate::core::{
    config::{ConfigDocument, Section},
    effect::{decide, PolicyEffect, PolicyEffectRule},
    error::{
        ConfigSyntaxError, EnforcerError, EvalError, MatcherSyntaxError, ModelError, Position,
        Result,
    },
    matcher::{evaluate, CompiledMatcher, Environment, FunctionRegistry, Value},
    model::ModelDefinition,
    policy::{Effect, PolicyRow},
};
pub use enforcer::{Enforcer, EnforcerBuilder, RoleResolver};
