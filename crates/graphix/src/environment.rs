//! The variable environment: one flat, insertion-ordered map of
//! identifier → binding.
//!
//! There are no nested scopes. `foreach` rebinds its loop variable in place
//! each iteration and the binding deliberately survives the loop, so a single
//! map owned by the interpreter is the whole story.

use indexmap::IndexMap;

use crate::{
    error::{ErrorKind, RunResult},
    value::{DeclaredType, ImageValue, Value},
};

/// A `(declared_type, value)` pair stored under an identifier.
///
/// `value` is `None` for declarations without an initializer; reading such a
/// binding yields no value, like reading an unbound name, but without the
/// warning.
#[derive(Debug, Clone)]
pub struct Binding {
    pub declared_type: DeclaredType,
    pub value: Option<Value>,
}

/// Storage for all variable bindings during execution.
///
/// This struct owns all binding data; the interpreter reaches values through
/// accessors that encode the failure policy once: resolving an image for an
/// operation raises `UnknownIdentifier`/`TypeMismatch`, while plain reads
/// return `Option` and leave warning behavior to the caller.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: IndexMap<String, Binding>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a binding from a declaration.
    pub fn declare(&mut self, identifier: &str, declared_type: DeclaredType, value: Option<Value>) {
        self.bindings
            .insert(identifier.to_owned(), Binding { declared_type, value });
    }

    /// Updates an existing binding's value, or creates an `Inferred`-typed
    /// binding when the name is unknown.
    pub fn assign(&mut self, identifier: &str, value: Option<Value>) {
        if let Some(binding) = self.bindings.get_mut(identifier) {
            binding.value = value;
        } else {
            self.bindings.insert(
                identifier.to_owned(),
                Binding {
                    declared_type: DeclaredType::Inferred,
                    value,
                },
            );
        }
    }

    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&Binding> {
        self.bindings.get(identifier)
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.bindings.contains_key(identifier)
    }

    /// Resolves an identifier that an operation requires to be a live image
    /// binding.
    pub fn image_mut(&mut self, identifier: &str) -> RunResult<&mut ImageValue> {
        match self.bindings.get_mut(identifier) {
            None => ErrorKind::UnknownIdentifier.err(format!("unknown image variable: {identifier}")),
            Some(binding) => match binding.value.as_mut() {
                Some(Value::Image(image)) => Ok(image),
                Some(other) => ErrorKind::TypeMismatch.err(format!(
                    "{identifier} is bound to a {}, not an image",
                    other.type_name()
                )),
                None => ErrorKind::TypeMismatch.err(format!("{identifier} has no value")),
            },
        }
    }

    /// Immutable image resolution, same failure policy as [`Self::image_mut`].
    pub fn image(&self, identifier: &str) -> RunResult<&ImageValue> {
        match self.bindings.get(identifier) {
            None => ErrorKind::UnknownIdentifier.err(format!("unknown image variable: {identifier}")),
            Some(binding) => match binding.value.as_ref() {
                Some(Value::Image(image)) => Ok(image),
                Some(other) => ErrorKind::TypeMismatch.err(format!(
                    "{identifier} is bound to a {}, not an image",
                    other.type_name()
                )),
                None => ErrorKind::TypeMismatch.err(format!("{identifier} has no value")),
            },
        }
    }

    /// Resolves an identifier that must name a batch, returning its paths.
    pub fn batch(&self, identifier: &str) -> RunResult<&[std::path::PathBuf]> {
        match self.bindings.get(identifier).and_then(|b| b.value.as_ref()) {
            Some(Value::Batch(paths)) => Ok(paths),
            Some(other) => ErrorKind::TypeMismatch.err(format!(
                "{identifier} is bound to a {}, not a batch",
                other.type_name()
            )),
            None => ErrorKind::UnknownIdentifier.err(format!("unknown batch identifier: {identifier}")),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
