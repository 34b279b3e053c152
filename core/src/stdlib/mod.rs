//! Builtin operators.
//!
//! This module provides the operators installed in the system dictionary of
//! every state, grouped by concern:
//! - Stack: operand stack manipulation
//! - Literals: constants, marks and the array, block and dictionary builders
//! - Math: integer arithmetic, comparisons and logic
//! - Arrays: array and string access
//! - Dictionary: scopes and name binding
//! - Flow: execution, conditionals, loops and exception interception
//!
//! Every operator declares its operand signature (top of the stack first)
//! and samples that double as executable documentation and as conformance
//! checks.

use crate::errors::{Exception, Result};
use crate::values::{Operator, Value};
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

pub mod arrays;
pub mod dictionary;
pub mod flow;
pub mod literals;
pub mod math;
pub mod stack;

/// Operators by name, in registration order.
pub struct Registry {
    operators: Vec<Arc<Operator>>,
    by_name: HashMap<&'static str, usize>,
}

impl Registry {
    fn new() -> Self {
        Self {
            operators: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// # Panics
    ///
    /// Panics if an operator with the same name is already registered.
    pub fn register(&mut self, operator: Operator) {
        let name = operator.name();
        let previous = self.by_name.insert(name, self.operators.len());
        assert!(previous.is_none(), "operator {} registered twice", name);
        self.operators.push(Arc::new(operator));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Operator>> {
        self.by_name.get(name).map(|&index| &self.operators[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Operator>> {
        self.operators.iter()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::new();
    stack::register(&mut registry);
    literals::register(&mut registry);
    math::register(&mut registry);
    arrays::register(&mut registry);
    dictionary::register(&mut registry);
    flow::register(&mut registry);
    registry
});

/// The builtin operators.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

// ============================================================================
// Operand helpers
// ============================================================================

/// Matched operand `index` (0 is the top of the stack).
pub(crate) fn param(params: &[Value], index: usize) -> Result<&Value> {
    params
        .get(index)
        .ok_or_else(|| Exception::internal(format!("operand {} was not matched", index)))
}

pub(crate) fn integer_param(params: &[Value], index: usize) -> Result<i64> {
    param(params, index)?
        .as_integer()
        .ok_or_else(|| Exception::internal(format!("operand {} is not an integer", index)))
}

pub(crate) fn boolean_param(params: &[Value], index: usize) -> Result<bool> {
    param(params, index)?
        .as_boolean()
        .ok_or_else(|| Exception::internal(format!("operand {} is not a boolean", index)))
}

pub(crate) fn name_param(params: &[Value], index: usize) -> Result<&Arc<str>> {
    param(params, index)?
        .as_name()
        .ok_or_else(|| Exception::internal(format!("operand {} is not a name", index)))
}

/// A non-negative integer usable as a count or an index.
pub(crate) fn to_index(value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Exception::range_check(format!("{} must not be negative", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_are_unique_and_resolvable() {
        let registry = registry();
        assert!(!registry.is_empty());
        for operator in registry.iter() {
            let found = registry.get(operator.name()).unwrap();
            assert!(Arc::ptr_eq(found, operator));
        }
    }

    #[test]
    fn test_every_operator_has_samples() {
        for operator in registry().iter() {
            assert!(
                !operator.samples().is_empty(),
                "{} has no sample",
                operator.name()
            );
        }
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_registration_panics() {
        let mut registry = Registry::new();
        registry.register(Operator::constant("x", Value::NULL));
        registry.register(Operator::constant("x", Value::NULL));
    }
}
