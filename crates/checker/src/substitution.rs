//! Substitutions over type variables
//!
//! A [`Subst`] is triangular: a solution may mention other solved variables,
//! and `apply_*` chases them. Bindings are only ever added, never replaced,
//! which makes undoing a failed comparison a matter of truncating the trail.
//!
//! Every binding is kind-checked and occurs-checked before it is accepted.

use crate::error::TypeError;
use crate::types::{ForallType, StackEffect, StackType, Type, TypeVar, VarArena, VarId};
use std::collections::HashMap;
use tracing::trace;

/// Position in a substitution's history, for rolling back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot(usize);

#[derive(Debug, Clone, Default)]
pub struct Subst {
    bindings: HashMap<VarId, Type>,
    /// Variables in the order they were bound
    trail: Vec<VarId>,
}

impl Subst {
    /// Create an empty substitution
    pub fn empty() -> Self {
        Subst::default()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, var: &TypeVar) -> Option<&Type> {
        self.bindings.get(&var.id)
    }

    pub fn is_bound(&self, var: &TypeVar) -> bool {
        self.bindings.contains_key(&var.id)
    }

    /// Solve `var` to `ty`
    ///
    /// Rejects solutions of the wrong kind and solutions that would make
    /// the type recursive. Binding a variable to itself is a no-op.
    pub fn bind(&mut self, var: &TypeVar, ty: Type) -> Result<(), TypeError> {
        let ty = self.apply_type(&ty);
        if let Type::Var(other) = &ty {
            if other == var {
                return Ok(());
            }
        }
        if let Some(existing) = self.bindings.get(&var.id) {
            return Err(TypeError::subtype(
                &Type::Var(var.clone()),
                &ty,
                format!("{} is already solved to {}", var_display(var), existing),
            ));
        }
        if !ty.kind().is_subkind_of(&var.kind) {
            return Err(TypeError::kind_error(format!(
                "{} is being substituted by {}, which has the wrong kind ({} is not a subkind of {})",
                var_display(var),
                ty,
                ty.kind(),
                var.kind
            )));
        }
        if ty.occurs(var.id) {
            return Err(TypeError::subtype(
                &Type::Var(var.clone()),
                &ty,
                format!(
                    "{} cannot be a subtype of {} because it would form a recursive type",
                    var_display(var),
                    ty
                ),
            ));
        }
        trace!(var = %var_display(var), solution = %ty, "bind");
        self.bindings.insert(var.id, ty);
        self.trail.push(var.id);
        Ok(())
    }

    /// Follow solved variables at the head of `ty` (not inside it)
    pub fn resolve(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        // chains are acyclic thanks to the occurs check
        while let Type::Var(var) = &current {
            match self.bindings.get(&var.id) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Apply substitutions to a Type
    pub fn apply_type(&self, ty: &Type) -> Type {
        if self.bindings.is_empty() {
            return ty.clone();
        }
        ty.map_vars(&|var| self.bindings.get(&var.id).map(|t| self.apply_type(t)))
    }

    /// Apply substitutions to a StackType, splicing solved rest variables
    pub fn apply_stack(&self, stack: &StackType) -> StackType {
        if self.bindings.is_empty() {
            return stack.clone();
        }
        stack.map_vars(&|var| self.bindings.get(&var.id).map(|t| self.apply_type(t)))
    }

    pub fn apply_effect(&self, effect: &StackEffect) -> StackEffect {
        StackEffect {
            input: self.apply_stack(&effect.input),
            output: self.apply_stack(&effect.output),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.trail.len())
    }

    /// Forget every binding made since `snapshot`
    pub fn rollback_to(&mut self, snapshot: Snapshot) {
        for id in self.trail.drain(snapshot.0..) {
            self.bindings.remove(&id);
        }
    }

    /// Variables bound since `snapshot`, oldest first
    pub fn bound_since(&self, snapshot: Snapshot) -> &[VarId] {
        &self.trail[snapshot.0.min(self.trail.len())..]
    }
}

fn var_display(var: &TypeVar) -> String {
    Type::Var(var.clone()).to_string()
}

/// Replace each bound variable of `forall` with a fresh free variable of
/// the same kind
///
/// Returns the instantiated body and the old-to-new mapping.
pub fn freshen(vars: &mut VarArena, forall: &ForallType) -> (Type, Vec<(TypeVar, Type)>) {
    let mapping: Vec<(TypeVar, Type)> = forall
        .params
        .iter()
        .map(|param| {
            let fresh = vars.fresh(&param.name, param.kind.clone());
            (param.clone(), Type::Var(fresh))
        })
        .collect();
    (forall.body.rename(&mapping), mapping)
}

/// Instantiate only the first `count` bound variables of `forall`
///
/// The remaining parameters stay quantified; when none remain the plain body
/// is returned.
pub fn instantiate_prefix(vars: &mut VarArena, forall: &ForallType, count: usize) -> Type {
    let count = count.min(forall.params.len());
    let mapping: Vec<(TypeVar, Type)> = forall.params[..count]
        .iter()
        .map(|param| {
            let fresh = vars.fresh(&param.name, param.kind.clone());
            (param.clone(), Type::Var(fresh))
        })
        .collect();
    let body = forall.body.rename(&mapping);
    let remaining = forall.params[count..].to_vec();
    if remaining.is_empty() {
        body
    } else {
        Type::forall(remaining, body)
    }
}

/// Instantiate every quantifier at the head of `ty`
pub fn instantiate(vars: &mut VarArena, ty: &Type) -> Type {
    let mut current = ty.clone();
    while let Type::Forall(forall) = &current {
        let (body, _) = freshen(vars, forall);
        current = body;
    }
    current
}
