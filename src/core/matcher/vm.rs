//! Stack-machine evaluator for compiled matchers

use super::compiler::{CompiledMatcher, Instruction};
use super::env::Environment;
use super::value::Value;
use crate::core::error::EvalError;

/// Execute `matcher` against `env`
///
/// Single pass over the instruction sequence with an explicit operand stack.
/// Both operands of every operator are always evaluated, including `&&` and
/// `||`, so bound functions on either side are invoked on every run.
///
/// # Examples
///
/// ```
/// use enforcer_rs::core::matcher::{evaluate, CompiledMatcher, Environment, FunctionRegistry, Value};
///
/// let matcher = CompiledMatcher::compile("r.age >= 18 && r.name != \"root\"").unwrap();
/// let functions = FunctionRegistry::new();
/// let env = Environment::new(&functions).with(
///     "r",
///     Value::map([("age", Value::from(30i64)), ("name", Value::from("alice"))]),
/// );
///
/// assert_eq!(evaluate(&matcher, &env), Ok(Value::Bool(true)));
/// ```
pub fn evaluate(matcher: &CompiledMatcher, env: &Environment<'_>) -> Result<Value, EvalError> {
    let program = matcher.instructions();
    let mut stack: Vec<Value> = Vec::with_capacity(8);

    for (pc, instruction) in program.iter().enumerate() {
        match instruction {
            Instruction::PushConst(value) => stack.push(value.clone()),
            Instruction::FetchVar(name) => {
                let value = env
                    .get(name)
                    .ok_or_else(|| EvalError::UndefinedVariable(name.clone()))?;
                stack.push(value.clone());
            }
            Instruction::FetchAttr { key, path } => {
                stack.push(fetch_attr(env, key, path)?.clone());
            }
            Instruction::Unary(op) => {
                let operand = stack.pop().ok_or(EvalError::StackUnderflow(pc))?;
                stack.push(op.apply(operand)?);
            }
            Instruction::Binary(op) => {
                let rhs = stack.pop().ok_or(EvalError::StackUnderflow(pc))?;
                let lhs = stack.pop().ok_or(EvalError::StackUnderflow(pc))?;
                stack.push(op.apply(lhs, rhs)?);
            }
            Instruction::Call { name, arity } => {
                if stack.len() < *arity {
                    return Err(EvalError::StackUnderflow(pc));
                }
                let args = stack.split_off(stack.len() - arity);
                let function = env.functions().get(name, *arity).ok_or_else(|| {
                    EvalError::UndefinedFunction {
                        name: name.clone(),
                        arity: *arity,
                    }
                })?;
                stack.push(function(&args)?);
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(value), true) => Ok(value),
        _ => Err(EvalError::StackUnderflow(program.len())),
    }
}

/// Evaluate and require a boolean result
pub fn evaluate_bool(matcher: &CompiledMatcher, env: &Environment<'_>) -> Result<bool, EvalError> {
    match evaluate(matcher, env)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::type_error(
            matcher.source(),
            format!("matcher produced a {}, expected a boolean", other.type_name()),
        )),
    }
}

fn fetch_attr<'e>(env: &'e Environment<'_>, key: &str, path: &[String]) -> Result<&'e Value, EvalError> {
    let mut current = env
        .get(key)
        .ok_or_else(|| EvalError::UndefinedVariable(key.to_string()))?;
    let mut walked = key.to_string();

    for attr in path {
        current = current
            .as_map()
            .and_then(|map| map.get(attr))
            .ok_or_else(|| EvalError::UndefinedAttribute {
                path: walked.clone(),
                attr: attr.clone(),
            })?;
        walked.push('.');
        walked.push_str(attr);
    }
    Ok(current)
}
