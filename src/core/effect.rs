//! Policy effect: reduce matched rows into one decision

use super::error::ModelError;
use super::policy::{Effect, PolicyRow};
use std::fmt;
use std::str::FromStr;

/// How matched rows combine into a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyEffectRule {
    /// `some(where(p.eft == allow))`: any allow grants access
    AllowOverride,
    /// `!some(where(p.eft == deny))`: any deny refuses access
    DenyOverride,
}

impl PolicyEffectRule {
    /// Reduce the effects of matched rows into a decision
    pub fn decide<I>(self, effects: I) -> bool
    where
        I: IntoIterator<Item = Effect>,
    {
        let mut effects = effects.into_iter();
        match self {
            PolicyEffectRule::AllowOverride => effects.any(|e| e == Effect::Allow),
            PolicyEffectRule::DenyOverride => !effects.any(|e| e == Effect::Deny),
        }
    }
}

/// Reduce the rows whose matcher evaluated to `true` into a decision
///
/// # Examples
///
/// ```
/// use enforcer_rs::core::effect::{decide, PolicyEffectRule};
/// use enforcer_rs::core::policy::{Effect, PolicyRow};
///
/// let allow = PolicyRow::new("p", ["alice"]);
/// let deny = PolicyRow::new("p", ["alice"]).with_effect(Effect::Deny);
///
/// assert!(decide(PolicyEffectRule::AllowOverride, [&allow, &deny]));
/// assert!(!decide(PolicyEffectRule::DenyOverride, [&allow, &deny]));
/// ```
pub fn decide<'a, I>(rule: PolicyEffectRule, matched: I) -> bool
where
    I: IntoIterator<Item = &'a PolicyRow>,
{
    rule.decide(matched.into_iter().map(|row| row.effect))
}

/// A parsed `[policy_effect]` expression
///
/// Besides the rule, records which policy definition's `eft` the expression
/// inspects; only rows of that definition are evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEffect {
    pub rule: PolicyEffectRule,
    pub policy_key: String,
}

impl PolicyEffect {
    pub fn decide<'a, I>(&self, matched: I) -> bool
    where
        I: IntoIterator<Item = &'a PolicyRow>,
    {
        decide(self.rule, matched)
    }
}

impl FromStr for PolicyEffect {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();

        let parsed = if let Some(rest) = compact.strip_prefix("!some(where(") {
            rest.strip_suffix(".eft==deny))")
                .map(|key| (PolicyEffectRule::DenyOverride, key))
        } else if let Some(rest) = compact.strip_prefix("some(where(") {
            rest.strip_suffix(".eft==allow))")
                .map(|key| (PolicyEffectRule::AllowOverride, key))
        } else {
            None
        };

        match parsed {
            Some((rule, key)) if is_symbol(key) => Ok(PolicyEffect {
                rule,
                policy_key: key.to_string(),
            }),
            _ => Err(ModelError::UnsupportedEffect(s.to_string())),
        }
    }
}

impl fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule {
            PolicyEffectRule::AllowOverride => {
                write!(f, "some(where({}.eft==allow))", self.policy_key)
            }
            PolicyEffectRule::DenyOverride => {
                write!(f, "!some(where({}.eft==deny))", self.policy_key)
            }
        }
    }
}

fn is_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
