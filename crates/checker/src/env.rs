//! Type environment
//!
//! Maps word names to their types and type names to the types they denote.
//! Scopes nest: lookups search from the innermost scope outwards.

use crate::error::{CheckResult, InternalError, TypeError};
use crate::substitution::Subst;
use crate::types::{Type, TypeVar};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
struct Scope {
    words: HashMap<String, Type>,
    types: HashMap<String, Type>,
}

#[derive(Debug, Clone)]
pub struct TypeEnvironment {
    scopes: Vec<Scope>,
}

impl Default for TypeEnvironment {
    fn default() -> Self {
        TypeEnvironment::new()
    }
}

impl TypeEnvironment {
    /// An environment with a single, empty root scope
    pub fn new() -> Self {
        TypeEnvironment {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) -> CheckResult<()> {
        if self.scopes.len() <= 1 {
            return Err(InternalError::new("attempted to pop the root scope").into());
        }
        self.scopes.pop();
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn innermost(&mut self) -> &mut Scope {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Bind a word name in the innermost scope, shadowing outer bindings
    pub fn bind(&mut self, name: &str, ty: Type) {
        self.innermost().words.insert(name.to_string(), ty);
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.words.get(name))
    }

    /// Like `lookup`, failing with `UndefinedNameError`
    pub fn require(&self, name: &str) -> Result<&Type, TypeError> {
        self.lookup(name)
            .ok_or_else(|| TypeError::undefined_name(name))
    }

    pub fn define_type(&mut self, name: &str, ty: Type) {
        self.innermost().types.insert(name.to_string(), ty);
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.types.get(name))
    }

    /// Variables free in any binding once `subst` is applied
    ///
    /// These must not be generalized when a word's type is closed over.
    pub fn free_variables(&self, subst: &Subst) -> Vec<TypeVar> {
        let mut out: Vec<TypeVar> = Vec::new();
        for scope in &self.scopes {
            for ty in scope.words.values() {
                for var in subst.apply_type(ty).free_variables() {
                    if !out.contains(&var) {
                        out.push(var);
                    }
                }
            }
        }
        out
    }
}
