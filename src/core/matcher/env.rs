//! Evaluation environment and the function registry
//!
//! Functions are resolved by exact name and arity. The registry is an
//! explicit object handed to each [`Environment`]; there is no global
//! function table.

use super::value::Value;
use crate::core::error::EvalError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A callable bound into the matcher language
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Name+arity keyed table of callables
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, HashMap<usize, Function>>,
}

impl FunctionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the built-in predicates
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::core::builtins::register_all(&mut registry);
        registry
    }

    /// Bind `name/arity`, replacing any previous binding
    pub fn register<F>(&mut self, name: impl Into<String>, arity: usize, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.insert(name, arity, Arc::new(f));
    }

    pub fn insert(&mut self, name: impl Into<String>, arity: usize, f: Function) {
        self.functions
            .entry(name.into())
            .or_default()
            .insert(arity, f);
    }

    pub fn get(&self, name: &str, arity: usize) -> Option<&Function> {
        self.functions.get(name).and_then(|by_arity| by_arity.get(&arity))
    }

    pub fn contains(&self, name: &str, arity: usize) -> bool {
        self.get(name, arity).is_some()
    }

    /// Invoke `name/arity`
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        match self.get(name, args.len()) {
            Some(f) => f(args),
            None => Err(EvalError::UndefinedFunction {
                name: name.to_string(),
                arity: args.len(),
            }),
        }
    }

    /// Registered `(name, arity)` pairs, sorted
    pub fn signatures(&self) -> Vec<(String, usize)> {
        let mut out: Vec<(String, usize)> = self
            .functions
            .iter()
            .flat_map(|(name, by_arity)| by_arity.keys().map(move |a| (name.clone(), *a)))
            .collect();
        out.sort();
        out
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.signatures())
            .finish()
    }
}

/// Per-call bindings seen by the VM
pub struct Environment<'a> {
    bindings: HashMap<String, Value>,
    functions: &'a FunctionRegistry,
}

impl<'a> Environment<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Environment {
            bindings: HashMap::new(),
            functions,
        }
    }

    /// Bind a symbol, returning the previous value
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.bindings.insert(name.into(), value.into())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind(name, value);
        self
    }

    /// Bind `symbol` to a map of `names[i] -> values[i]`
    pub fn bind_record<N, V>(&mut self, symbol: &str, names: &[N], values: &[V])
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let record = names
            .iter()
            .zip(values)
            .map(|(n, v)| (n.as_ref().to_string(), Value::from(v.as_ref())))
            .collect();
        self.bindings.insert(symbol.to_string(), Value::Map(record));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn functions(&self) -> &FunctionRegistry {
        self.functions
    }
}
