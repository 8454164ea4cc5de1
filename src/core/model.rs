//! Model definition: the typed view of a parsed model config
//!
//! A model names the request tuple, one or more policy tuples, optional role
//! predicates, the effect rule and the matcher expression:
//!
//! ```text
//! [request_definition]
//! r = sub, obj, act
//!
//! [policy_definition]
//! p = sub, obj, act, eft
//!
//! [role_definition]
//! g = _, _
//!
//! [policy_effect]
//! e = !some(where (p.eft == deny))
//!
//! [matchers]
//! m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
//! ```

use super::config::ConfigDocument;
use super::effect::PolicyEffect;
use super::error::ModelError;
use super::matcher::CompiledMatcher;
use super::policy::EFFECT_ATTR;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::info;

pub const REQUEST_SECTION: &str = "request_definition";
pub const POLICY_SECTION: &str = "policy_definition";
pub const ROLE_SECTION: &str = "role_definition";
pub const EFFECT_SECTION: &str = "policy_effect";
pub const MATCHER_SECTION: &str = "matchers";

/// `r = sub, obj, act`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDefinition {
    pub key: String,
    pub attrs: Vec<String>,
}

/// `p = sub, obj, act[, eft]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDefinition {
    pub key: String,
    pub attrs: Vec<String>,
}

impl PolicyDefinition {
    /// Column holding the row effect, if the definition declares one
    pub fn effect_index(&self) -> Option<usize> {
        self.attrs.iter().position(|a| a == EFFECT_ATTR)
    }

    pub fn has_effect_column(&self) -> bool {
        self.effect_index().is_some()
    }
}

/// `g = _, _`: a role predicate of fixed arity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub key: String,
    pub arity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition {
    request: RequestDefinition,
    policies: Vec<PolicyDefinition>,
    roles: Vec<RoleDefinition>,
    effect: PolicyEffect,
    matcher: String,
}

impl ModelDefinition {
    /// Parse and validate model text
    ///
    /// # Examples
    ///
    /// ```
    /// use enforcer_rs::core::model::ModelDefinition;
    ///
    /// let model = ModelDefinition::from_text(
    ///     "[request_definition]\nr = sub, obj\n\
    ///      [policy_definition]\np = sub, obj\n\
    ///      [policy_effect]\ne = some(where (p.eft == allow))\n\
    ///      [matchers]\nm = r.sub == p.sub && r.obj == p.obj\n",
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(model.request().attrs, ["sub", "obj"]);
    /// assert!(model.policy("p").is_some());
    /// ```
    pub fn from_text(text: &str) -> Result<Self, ModelError> {
        let document = ConfigDocument::parse(text)?;
        Self::from_document(&document)
    }

    pub fn from_document(document: &ConfigDocument) -> Result<Self, ModelError> {
        let mut symbols = HashSet::new();

        let (key, value) = single_entry(document, REQUEST_SECTION)?;
        let request = RequestDefinition {
            key: declare(&mut symbols, REQUEST_SECTION, key)?,
            attrs: attribute_list(REQUEST_SECTION, key, value)?,
        };

        let section = document
            .section(POLICY_SECTION)
            .ok_or(ModelError::MissingSection(POLICY_SECTION))?;
        let policies = section
            .entries()
            .iter()
            .map(|(key, value)| {
                Ok(PolicyDefinition {
                    key: declare(&mut symbols, POLICY_SECTION, key)?,
                    attrs: attribute_list(POLICY_SECTION, key, value)?,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let roles = match document.section(ROLE_SECTION) {
            Some(section) => section
                .entries()
                .iter()
                .map(|(key, value)| {
                    Ok(RoleDefinition {
                        key: declare(&mut symbols, ROLE_SECTION, key)?,
                        arity: role_arity(key, value)?,
                    })
                })
                .collect::<Result<Vec<_>, ModelError>>()?,
            None => Vec::new(),
        };

        let (key, value) = single_entry(document, EFFECT_SECTION)?;
        let effect: PolicyEffect = value.parse()?;
        if !policies.iter().any(|p| p.key == effect.policy_key) {
            return Err(invalid(
                EFFECT_SECTION,
                key,
                format!("'{}' is not a declared policy definition", effect.policy_key),
            ));
        }

        let (_, matcher) = single_entry(document, MATCHER_SECTION)?;

        let model = ModelDefinition {
            request,
            policies,
            roles,
            effect,
            matcher: matcher.to_string(),
        };
        info!(
            "Loaded model: request {} ({} attrs), {} policy definition(s), {} role definition(s), effect {}",
            model.request.key,
            model.request.attrs.len(),
            model.policies.len(),
            model.roles.len(),
            model.effect
        );
        Ok(model)
    }

    pub fn request(&self) -> &RequestDefinition {
        &self.request
    }

    pub fn policies(&self) -> &[PolicyDefinition] {
        &self.policies
    }

    pub fn policy(&self, key: &str) -> Option<&PolicyDefinition> {
        self.policies.iter().find(|p| p.key == key)
    }

    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }

    pub fn role(&self, key: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.key == key)
    }

    pub fn effect(&self) -> &PolicyEffect {
        &self.effect
    }

    /// The policy definition the effect rule reads
    pub fn effect_policy(&self) -> Option<&PolicyDefinition> {
        self.policy(&self.effect.policy_key)
    }

    pub fn matcher_source(&self) -> &str {
        &self.matcher
    }

    /// Compile the `[matchers]` expression with the given nesting bound
    pub fn compile_matcher(&self, max_depth: usize) -> Result<CompiledMatcher, ModelError> {
        Ok(CompiledMatcher::compile_with_depth(&self.matcher, max_depth)?)
    }
}

impl FromStr for ModelDefinition {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelDefinition::from_text(s)
    }
}

fn invalid(section: &'static str, key: &str, reason: impl Into<String>) -> ModelError {
    ModelError::InvalidDefinition {
        section,
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn single_entry<'d>(
    document: &'d ConfigDocument,
    section: &'static str,
) -> Result<(&'d str, &'d str), ModelError> {
    let found = document
        .section(section)
        .ok_or(ModelError::MissingSection(section))?;
    match found.entries() {
        [(key, value)] => Ok((key.as_str(), value.as_str())),
        entries => {
            let extra = entries.get(1).map(|(k, _)| k.as_str()).unwrap_or_default();
            Err(invalid(
                section,
                extra,
                format!("expected exactly one entry, found {}", entries.len()),
            ))
        }
    }
}

/// Register a definition symbol; symbols share one namespace in the matcher
fn declare(
    symbols: &mut HashSet<String>,
    section: &'static str,
    key: &str,
) -> Result<String, ModelError> {
    if !is_identifier(key) {
        return Err(invalid(section, key, "symbol must be an identifier"));
    }
    if !symbols.insert(key.to_string()) {
        return Err(invalid(section, key, "symbol already declared"));
    }
    Ok(key.to_string())
}

fn attribute_list(section: &'static str, key: &str, value: &str) -> Result<Vec<String>, ModelError> {
    let mut seen = HashSet::new();
    value
        .split(',')
        .map(str::trim)
        .map(|attr| {
            if !is_identifier(attr) {
                return Err(invalid(section, key, format!("invalid attribute '{}'", attr)));
            }
            if !seen.insert(attr) {
                return Err(invalid(section, key, format!("duplicate attribute '{}'", attr)));
            }
            Ok(attr.to_string())
        })
        .collect()
}

fn role_arity(key: &str, value: &str) -> Result<usize, ModelError> {
    let placeholders: Vec<&str> = value.split(',').map(str::trim).collect();
    if placeholders.iter().any(|p| *p != "_") {
        return Err(invalid(ROLE_SECTION, key, "role definitions list '_' placeholders"));
    }
    if placeholders.len() < 2 {
        return Err(invalid(ROLE_SECTION, key, "role definitions take at least two placeholders"));
    }
    Ok(placeholders.len())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
