//! Cache key derivation.
//!
//! Defines [`CacheKey`], the pluggable [`KeyGenerator`] contract and the
//! default [`TemplateKeyGenerator`].
//!
//! ## Template syntax
//!
//! - `#arg0` or `#arg0.customer.id`: the whole key is that argument value
//!   (or a field of its JSON payload).
//! - `invoice:{arg0}` or `{arg1.region}-{arg0}`: literal text with
//!   placeholders.
//!
//! A reference that resolves to null makes the key absent. With an empty
//! expression the default key is the call name followed by `_<argument>` for
//! every argument, e.g. `getOrder_42`.

use std::fmt;

use thiserror::Error;

use crate::domain::types::Value;

use super::operation::CallContext;

const DEFAULT_KEY_SEPARATOR: char = '_';
const ARGUMENT_PREFIX: &str = "arg";

/// Key of one entry inside a cache region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Failure evaluating an explicitly configured key expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key expression `{expression}` references `arg{index}` but the call has {available} argument(s)")]
    UnknownArgument {
        expression: String,
        index: usize,
        available: usize,
    },
    #[error("key expression `{expression}`: field `{path}` not found on `arg{index}`")]
    MissingField {
        expression: String,
        index: usize,
        path: String,
    },
    #[error("malformed key expression `{expression}`: {reason}")]
    Malformed { expression: String, reason: String },
}

impl KeyError {
    fn malformed(expression: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// Derives cache keys from a configured expression and the call being made.
///
/// `Ok(None)` means "no key": callers skip caching for this call.
pub trait KeyGenerator: Send + Sync {
    fn generate_key(
        &self,
        expression: &str,
        call: &CallContext,
    ) -> Result<Option<CacheKey>, KeyError>;
}

/// Default key for a call: its name followed by `_<arg>` per argument.
pub fn default_key(call: &CallContext) -> CacheKey {
    let mut key = call.name.clone();
    for arg in &call.args {
        key.push(DEFAULT_KEY_SEPARATOR);
        key.push_str(&arg.to_string());
    }
    CacheKey(key)
}

/// Key generator understanding the template syntax described in the module
/// docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateKeyGenerator;

impl KeyGenerator for TemplateKeyGenerator {
    fn generate_key(
        &self,
        expression: &str,
        call: &CallContext,
    ) -> Result<Option<CacheKey>, KeyError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Ok(Some(default_key(call)));
        }

        if let Some(reference) = expression.strip_prefix('#') {
            let value = resolve(expression, reference, call)?;
            return Ok((!value.is_null()).then(|| CacheKey(value.to_string())));
        }

        render_template(expression, call)
    }
}

fn render_template(expression: &str, call: &CallContext) -> Result<Option<CacheKey>, KeyError> {
    let mut key = String::with_capacity(expression.len());
    let mut rest = expression;
    let mut absent = false;

    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err(KeyError::malformed(expression, "unmatched `}`"));
        }
        key.push_str(&rest[..open]);

        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| KeyError::malformed(expression, "unterminated `{`"))?;
        let reference = after[..close].trim();
        if reference.is_empty() {
            return Err(KeyError::malformed(expression, "empty placeholder `{}`"));
        }
        if reference.contains('{') {
            return Err(KeyError::malformed(expression, "nested `{` in placeholder"));
        }

        let value = resolve(expression, reference, call)?;
        if value.is_null() {
            absent = true;
        } else {
            key.push_str(&value.to_string());
        }
        rest = &after[close + 1..];
    }
    key.push_str(rest);

    Ok((!absent).then_some(CacheKey(key)))
}

/// Resolve `argN[.field...]` against the call arguments.
fn resolve(expression: &str, reference: &str, call: &CallContext) -> Result<Value, KeyError> {
    let mut segments = reference.split('.');
    let head = segments.next().unwrap_or_default();
    let index = head
        .strip_prefix(ARGUMENT_PREFIX)
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or_else(|| {
            KeyError::malformed(
                expression,
                format!("`{head}` is not an argument reference (expected `argN`)"),
            )
        })?;

    let argument = call.args.get(index).ok_or_else(|| KeyError::UnknownArgument {
        expression: expression.to_string(),
        index,
        available: call.args.len(),
    })?;

    let path: Vec<&str> = segments.collect();
    if path.iter().any(|segment| segment.is_empty()) {
        return Err(KeyError::malformed(expression, "empty field name"));
    }
    if path.is_empty() || argument.is_null() {
        return Ok(argument.clone());
    }

    argument.field(&path).ok_or_else(|| KeyError::MissingField {
        expression: expression.to_string(),
        index,
        path: path.join("."),
    })
}
