//! Enforcer: model + policy rows + functions, answering access requests

use crate::core::cache::DecisionCache;
use crate::core::error::{EnforcerError, EvalError, Result};
use crate::core::matcher::{
    evaluate_bool, CompiledMatcher, Environment, Function, FunctionRegistry, Value,
    DEFAULT_MAX_DEPTH,
};
use crate::core::model::{ModelDefinition, PolicyDefinition};
use crate::core::policy::{Effect, PolicyRow};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Answers role predicates such as `g(r.sub, p.sub)`
///
/// Bound to a declared `[role_definition]` symbol; `names` always has the
/// definition's arity. Implemented for any `Fn(&[&str]) -> bool`.
pub trait RoleResolver: Send + Sync {
    fn has_link(&self, names: &[&str]) -> bool;
}

impl<F> RoleResolver for F
where
    F: Fn(&[&str]) -> bool + Send + Sync,
{
    fn has_link(&self, names: &[&str]) -> bool {
        self(names)
    }
}

/// Access-control enforcer
///
/// The model, compiled matcher and function registry are fixed at build
/// time. Policy rows live behind a read/write lock, so one `Enforcer` can be
/// shared across threads and mutated while serving requests.
///
/// # Examples
///
/// ```
/// use enforcer_rs::Enforcer;
///
/// # fn main() -> enforcer_rs::Result<()> {
/// let enforcer = Enforcer::new(
///     "[request_definition]\nr = sub, obj, act\n\
///      [policy_definition]\np = sub, obj, act\n\
///      [policy_effect]\ne = some(where (p.eft == allow))\n\
///      [matchers]\nm = r.sub == p.sub && r.obj == p.obj && r.act == p.act\n",
/// )?;
/// enforcer.add_policy("p", &["alice", "data1", "read"])?;
///
/// assert!(enforcer.enforce(&["alice", "data1", "read"])?);
/// assert!(!enforcer.enforce(&["alice", "data1", "write"])?);
/// # Ok(())
/// # }
/// ```
pub struct Enforcer {
    model: ModelDefinition,
    matcher: CompiledMatcher,
    functions: FunctionRegistry,
    policies: RwLock<Vec<PolicyRow>>,
    cache: Option<Mutex<DecisionCache>>,
}

impl Enforcer {
    /// Build an enforcer from model text with default settings
    pub fn new(model_text: &str) -> Result<Self> {
        EnforcerBuilder::new().model_text(model_text).build()
    }

    pub fn builder() -> EnforcerBuilder {
        EnforcerBuilder::new()
    }

    pub fn model(&self) -> &ModelDefinition {
        &self.model
    }

    pub fn matcher(&self) -> &CompiledMatcher {
        &self.matcher
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Decide a request
    ///
    /// `request` must have exactly as many values as the request definition
    /// has attributes. Any evaluation error aborts the whole decision and is
    /// returned; it is never treated as a deny or an allow.
    pub fn enforce(&self, request: &[&str]) -> Result<bool> {
        self.check_request(request)?;

        if let Some(cache) = &self.cache {
            if let Some(decision) = cache.lock().get(request) {
                trace!("Decision cache hit for {:?}", request);
                return Ok(decision);
            }
        }

        let rows = self.policies.read();
        let matched = self.matching_rows(&rows, request)?;
        let decision = self.model.effect().decide(matched.iter().copied());
        debug!(
            "Request {:?}: {} of {} row(s) matched, {}",
            request,
            matched.len(),
            rows.len(),
            if decision { "allowed" } else { "denied" }
        );

        // Still under the read lock, so no mutation can slip in between
        if let Some(cache) = &self.cache {
            cache.lock().put(request, decision);
        }
        Ok(decision)
    }

    /// Decide a request and return the rows whose matcher evaluated to `true`
    pub fn enforce_explained(&self, request: &[&str]) -> Result<(bool, Vec<PolicyRow>)> {
        self.check_request(request)?;

        let rows = self.policies.read();
        let matched = self.matching_rows(&rows, request)?;
        let decision = self.model.effect().decide(matched.iter().copied());
        Ok((decision, matched.into_iter().cloned().collect()))
    }

    fn check_request(&self, request: &[&str]) -> Result<()> {
        let expected = self.model.request().attrs.len();
        if request.len() != expected {
            return Err(EnforcerError::RequestArity {
                expected,
                found: request.len(),
            });
        }
        Ok(())
    }

    fn matching_rows<'r>(&self, rows: &'r [PolicyRow], request: &[&str]) -> Result<Vec<&'r PolicyRow>> {
        let definition = self.effect_definition()?;
        let req = self.model.request();

        let mut env = Environment::new(&self.functions);
        env.bind_record(&req.key, &req.attrs, request);

        let mut matched = Vec::new();
        for row in rows.iter().filter(|row| row.key == definition.key) {
            env.bind_record(&definition.key, &definition.attrs, &row.values);
            match evaluate_bool(&self.matcher, &env) {
                Ok(true) => {
                    trace!("Row {:?} matched {:?}", row.values, request);
                    matched.push(row);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Enforcement of {:?} aborted: {}", request, e);
                    return Err(e.into());
                }
            }
        }
        Ok(matched)
    }

    fn effect_definition(&self) -> Result<&PolicyDefinition> {
        let key = &self.model.effect().policy_key;
        self.model
            .policy(key)
            .ok_or_else(|| EnforcerError::UnknownPolicyKey(key.clone()))
    }

    /// Validate a row against its definition and derive its effect
    ///
    /// When the definition declares an `eft` column, that column decides the
    /// effect and must read `allow` or `deny`. Otherwise the row keeps the
    /// effect it was built with.
    fn normalize(&self, mut row: PolicyRow) -> Result<PolicyRow> {
        let definition = self
            .model
            .policy(&row.key)
            .ok_or_else(|| EnforcerError::UnknownPolicyKey(row.key.clone()))?;

        if row.values.len() != definition.attrs.len() {
            return Err(EnforcerError::PolicyArity {
                key: row.key,
                expected: definition.attrs.len(),
                found: row.values.len(),
            });
        }

        if let Some(index) = definition.effect_index() {
            row.effect = row.values[index]
                .parse::<Effect>()
                .map_err(EnforcerError::InvalidEffect)?;
        }
        Ok(row)
    }

    /// Add one row; returns `false` if an identical row already exists
    pub fn add_policy(&self, key: &str, values: &[&str]) -> Result<bool> {
        let row = self.normalize(PolicyRow::new(key, values.iter().copied()))?;

        let mut rows = self.policies.write();
        if rows.contains(&row) {
            return Ok(false);
        }
        debug!("Added policy {} {:?}", row.key, row.values);
        rows.push(row);
        self.invalidate_cache();
        Ok(true)
    }

    /// Add many rows at once; returns how many were new
    ///
    /// All rows are validated before any is inserted, so an invalid row
    /// leaves the policy set unchanged.
    pub fn add_policies<I>(&self, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = PolicyRow>,
    {
        let rows = rows
            .into_iter()
            .map(|row| self.normalize(row))
            .collect::<Result<Vec<_>>>()?;

        let mut stored = self.policies.write();
        let mut added = 0;
        for row in rows {
            if !stored.contains(&row) {
                stored.push(row);
                added += 1;
            }
        }
        if added > 0 {
            self.invalidate_cache();
        }
        debug!("Added {} policy row(s)", added);
        Ok(added)
    }

    /// Remove the row `key` = `values`; returns whether it existed
    pub fn remove_policy(&self, key: &str, values: &[&str]) -> Result<bool> {
        self.policy_definition(key)?;

        let mut rows = self.policies.write();
        let before = rows.len();
        rows.retain(|row| !(row.key == key && row.values == values));
        let removed = rows.len() != before;
        if removed {
            debug!("Removed policy {} {:?}", key, values);
            self.invalidate_cache();
        }
        Ok(removed)
    }

    /// Remove every `key` row whose columns starting at `field_index` equal
    /// `field_values`; an empty string matches any value
    pub fn remove_filtered_policy(
        &self,
        key: &str,
        field_index: usize,
        field_values: &[&str],
    ) -> Result<usize> {
        let width = self.policy_definition(key)?.attrs.len();
        let end = field_index.checked_add(field_values.len());
        if !end.is_some_and(|end| end <= width) {
            return Err(EnforcerError::PolicyArity {
                key: key.to_string(),
                expected: width,
                found: end.unwrap_or(usize::MAX),
            });
        }

        let matches = |row: &PolicyRow| {
            row.key == key
                && field_values
                    .iter()
                    .enumerate()
                    .all(|(i, v)| v.is_empty() || row.values[field_index + i] == *v)
        };

        let mut rows = self.policies.write();
        let before = rows.len();
        rows.retain(|row| !matches(row));
        let removed = before - rows.len();
        if removed > 0 {
            debug!("Removed {} {} row(s) by filter {:?}", removed, key, field_values);
            self.invalidate_cache();
        }
        Ok(removed)
    }

    pub fn clear_policies(&self) {
        self.policies.write().clear();
        self.invalidate_cache();
        debug!("Cleared all policies");
    }

    /// Snapshot of every stored row, in insertion order
    pub fn policies(&self) -> Vec<PolicyRow> {
        self.policies.read().clone()
    }

    /// Snapshot of the rows stored under `key`
    pub fn policies_for(&self, key: &str) -> Vec<PolicyRow> {
        self.policies
            .read()
            .iter()
            .filter(|row| row.key == key)
            .cloned()
            .collect()
    }

    /// Add rows from a JSON array of `{"key", "values", "effect"?}` objects
    pub fn load_policies_json(&self, json: &str) -> Result<usize> {
        let rows = PolicyRow::list_from_json(json)?;
        let added = self.add_policies(rows)?;
        info!("Loaded {} policy row(s) from JSON", added);
        Ok(added)
    }

    /// Read and load a JSON policy file
    pub fn load_policies_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let json = std::fs::read_to_string(path)?;
        self.load_policies_json(&json)
    }

    pub fn export_policies_json(&self) -> Result<String> {
        Ok(PolicyRow::list_to_json(&self.policies.read())?)
    }

    pub fn clear_cache(&self) {
        self.invalidate_cache();
    }

    fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }

    fn policy_definition(&self, key: &str) -> Result<&PolicyDefinition> {
        self.model
            .policy(key)
            .ok_or_else(|| EnforcerError::UnknownPolicyKey(key.to_string()))
    }
}

/// Builder for [`Enforcer`]
///
/// # Examples
///
/// ```
/// use enforcer_rs::EnforcerBuilder;
///
/// # fn main() -> enforcer_rs::Result<()> {
/// let enforcer = EnforcerBuilder::new()
///     .model_text(
///         "[request_definition]\nr = sub, obj\n\
///          [policy_definition]\np = sub, obj\n\
///          [role_definition]\ng = _, _\n\
///          [policy_effect]\ne = some(where (p.eft == allow))\n\
///          [matchers]\nm = g(r.sub, p.sub) && r.obj == p.obj\n",
///     )
///     .with_role_resolver("g", |names: &[&str]| names == ["alice", "admin"])
///     .with_decision_cache(1000)
///     .build()?;
///
/// enforcer.add_policy("p", &["admin", "data1"])?;
/// assert!(enforcer.enforce(&["alice", "data1"])?);
/// assert!(!enforcer.enforce(&["bob", "data1"])?);
/// # Ok(())
/// # }
/// ```
pub struct EnforcerBuilder {
    model_text: Option<String>,
    model_path: Option<PathBuf>,
    max_depth: usize,
    cache_capacity: Option<usize>,
    builtins: bool,
    functions: Vec<(String, usize, Function)>,
    resolvers: Vec<(String, Arc<dyn RoleResolver>)>,
}

impl EnforcerBuilder {
    pub fn new() -> Self {
        EnforcerBuilder {
            model_text: None,
            model_path: None,
            max_depth: DEFAULT_MAX_DEPTH,
            cache_capacity: None,
            builtins: true,
            functions: Vec::new(),
            resolvers: Vec::new(),
        }
    }

    /// Model config text; takes precedence over [`model_path`](Self::model_path)
    pub fn model_text<S: Into<String>>(mut self, text: S) -> Self {
        self.model_text = Some(text.into());
        self
    }

    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Bound on matcher expression nesting
    pub fn max_matcher_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Cache up to `capacity` decisions
    ///
    /// Only sound when every bound function is pure: the cache is cleared on
    /// policy changes, not when a resolver's answers change.
    pub fn with_decision_cache(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Bind a function callable from the matcher as `name(...)` with `arity` arguments
    pub fn with_function<F>(mut self, name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, EvalError> + Send + Sync + 'static,
    {
        let f: Function = Arc::new(f);
        self.functions.push((name.into(), arity, f));
        self
    }

    /// Answer the role predicate `key` with `resolver`
    pub fn with_role_resolver<R>(mut self, key: impl Into<String>, resolver: R) -> Self
    where
        R: RoleResolver + 'static,
    {
        let resolver: Arc<dyn RoleResolver> = Arc::new(resolver);
        self.resolvers.push((key.into(), resolver));
        self
    }

    /// Do not register `regex_match?`, `key_match?` and `glob_match?`
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    pub fn build(self) -> Result<Enforcer> {
        let text = match (self.model_text, &self.model_path) {
            (Some(text), _) => text,
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => return Err(EnforcerError::MissingModel),
        };

        let model = ModelDefinition::from_text(&text)?;
        let matcher = model.compile_matcher(self.max_depth)?;

        let mut functions = if self.builtins {
            FunctionRegistry::with_builtins()
        } else {
            FunctionRegistry::new()
        };
        for (name, arity, f) in self.functions {
            functions.insert(name, arity, f);
        }
        for (key, resolver) in self.resolvers {
            let role = model
                .role(&key)
                .ok_or_else(|| EnforcerError::UnknownRoleDefinition(key.clone()))?;
            functions.insert(key.clone(), role.arity, role_function(key, resolver));
        }

        info!(
            "Built enforcer: matcher {} instruction(s), {} function(s), cache {}",
            matcher.instructions().len(),
            functions.signatures().len(),
            match self.cache_capacity {
                Some(capacity) => format!("{} entries", capacity),
                None => "off".to_string(),
            }
        );

        Ok(Enforcer {
            model,
            matcher,
            functions,
            policies: RwLock::new(Vec::new()),
            cache: self
                .cache_capacity
                .map(|capacity| Mutex::new(DecisionCache::new(capacity))),
        })
    }
}

impl Default for EnforcerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn role_function(key: String, resolver: Arc<dyn RoleResolver>) -> Function {
    Arc::new(move |args: &[Value]| -> std::result::Result<Value, EvalError> {
        let names = args
            .iter()
            .map(|arg| {
                arg.as_str().ok_or_else(|| {
                    EvalError::type_error(
                        key.as_str(),
                        format!("role arguments must be strings, got {}", arg.type_name()),
                    )
                })
            })
            .collect::<std::result::Result<Vec<&str>, EvalError>>()?;
        Ok(Value::Bool(resolver.has_link(&names)))
    })
}
