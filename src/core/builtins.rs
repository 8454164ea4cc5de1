//! Built-in predicates
//!
//! Registered by name and arity exactly like user-supplied functions:
//!
//! - `regex_match?(value, pattern)` - regular expression search
//! - `key_match?(value, pattern)` - `*` in the pattern matches any suffix
//! - `glob_match?(path, pattern)` - path-segment globbing, see [`PatternMatcher`]

use super::error::EvalError;
use super::matcher::{FunctionRegistry, Value};
use super::pattern::PatternMatcher;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub const REGEX_MATCH: &str = "regex_match?";
pub const KEY_MATCH: &str = "key_match?";
pub const GLOB_MATCH: &str = "glob_match?";

/// Compiled patterns kept per registry
const REGEX_CACHE_CAPACITY: usize = 128;

pub fn register_all(registry: &mut FunctionRegistry) {
    let cache = Arc::new(RegexCache::new(REGEX_CACHE_CAPACITY));
    registry.register(REGEX_MATCH, 2, move |args| {
        let (value, pattern) = string_args(REGEX_MATCH, args)?;
        cache.is_match(pattern, value).map(Value::Bool)
    });

    registry.register(KEY_MATCH, 2, |args| {
        let (value, pattern) = string_args(KEY_MATCH, args)?;
        Ok(Value::Bool(key_match(value, pattern)))
    });

    registry.register(GLOB_MATCH, 2, |args| {
        let (path, pattern) = string_args(GLOB_MATCH, args)?;
        Ok(Value::Bool(PatternMatcher::matches(pattern, path)))
    });
}

fn string_args<'a>(name: &str, args: &'a [Value]) -> Result<(&'a str, &'a str), EvalError> {
    match args {
        [Value::String(a), Value::String(b)] => Ok((a, b)),
        _ => Err(EvalError::type_error(
            name,
            format!(
                "expected (string, string), got ({})",
                args.iter()
                    .map(Value::type_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )),
    }
}

/// `value` equals `pattern`, or shares its prefix up to the first `*`
pub fn key_match(value: &str, pattern: &str) -> bool {
    match pattern.find('*') {
        None => value == pattern,
        Some(i) => value.get(..i) == Some(&pattern[..i]),
    }
}

/// LRU of compiled regular expressions
struct RegexCache {
    cache: Mutex<LruCache<String, Regex>>,
}

impl RegexCache {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        RegexCache {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The lock only covers lookup and insertion; compiling and matching
    /// run unlocked on a cloned `Regex`
    fn is_match(&self, pattern: &str, value: &str) -> Result<bool, EvalError> {
        let cached = self.cache.lock().get(pattern).cloned();
        let re = match cached {
            Some(re) => re,
            None => {
                let re = Regex::new(pattern).map_err(|e| EvalError::FunctionFailed {
                    name: REGEX_MATCH.to_string(),
                    reason: e.to_string(),
                })?;
                self.cache.lock().put(pattern.to_string(), re.clone());
                re
            }
        };
        Ok(re.is_match(value))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, a: &str, b: &str) -> Result<Value, EvalError> {
        FunctionRegistry::with_builtins().call(name, &[Value::from(a), Value::from(b)])
    }

    #[test]
    fn test_regex_match() {
        assert_eq!(call(REGEX_MATCH, "/data/1", "^/data/\\d+$"), Ok(Value::Bool(true)));
        assert_eq!(call(REGEX_MATCH, "/data/x", "^/data/\\d+$"), Ok(Value::Bool(false)));
        // Unanchored patterns search anywhere
        assert_eq!(call(REGEX_MATCH, "GET", "GET|POST"), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_regex_invalid_pattern() {
        assert!(matches!(
            call(REGEX_MATCH, "x", "("),
            Err(EvalError::FunctionFailed { .. })
        ));
    }

    #[test]
    fn test_regex_cache_reuse() {
        let cache = RegexCache::new(2);
        assert!(cache.is_match("^a", "abc").unwrap());
        assert!(cache.is_match("^a", "axe").unwrap());
        assert_eq!(cache.len(), 1);
        cache.is_match("^b", "b").unwrap();
        cache.is_match("^c", "c").unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_regex_cache_shared_across_threads() {
        let cache = Arc::new(RegexCache::new(4));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let pattern = format!("^p{}$", (t + i) % 6);
                        let value = format!("p{}", i % 6);
                        let expected = (t + i) % 6 == i % 6;
                        assert_eq!(cache.is_match(&pattern, &value).unwrap(), expected);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 4);
    }

    #[test]
    fn test_key_match() {
        assert!(key_match("/foo/bar", "/foo/*"));
        assert!(key_match("/foo", "/foo"));
        assert!(key_match("/foo/", "/foo/*"));
        assert!(!key_match("/foo", "/foo/*"));
        assert!(!key_match("/bar/foo", "/foo/*"));
        assert!(key_match("anything", "*"));
        assert!(!key_match("/foo/bar", "/foo"));
    }

    #[test]
    fn test_glob_match() {
        assert_eq!(call(GLOB_MATCH, "/docs/a/b.txt", "/docs/**"), Ok(Value::Bool(true)));
        assert_eq!(call(GLOB_MATCH, "/docs/a/b.txt", "/docs/*"), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_argument_types_checked() {
        let registry = FunctionRegistry::with_builtins();
        let err = registry
            .call(KEY_MATCH, &[Value::from("a"), Value::Number(1.0)])
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeError { .. }));
        assert!(err.to_string().contains("string, number"));
    }

    #[test]
    fn test_wrong_arity_is_undefined() {
        let registry = FunctionRegistry::with_builtins();
        assert!(matches!(
            registry.call(REGEX_MATCH, &[Value::from("a")]),
            Err(EvalError::UndefinedFunction { .. })
        ));
    }
}
