//! Lowering of written type annotations
//!
//! Turns a [`TypeExpr`] into a [`Type`], resolving type names against the
//! environment and checking kinds on the way.
//!
//! An annotation with an outermost `forall` must bind every variable it
//! uses, and so must a closed type such as a cast target. Otherwise any
//! unknown name is taken to be a type variable and the whole annotation is
//! quantified over the variables found. Either way, an
//! effect written with no rest variable on either side is given a shared one,
//! so `(int -- int)` works on top of any stack.

use crate::ast::{StackExpr, TypeExpr, TypeParam};
use crate::env::TypeEnvironment;
use crate::error::{CheckResult, TypeError};
use crate::kinds::Kind;
use crate::types::{StackType, Type, TypeVar, VarArena};
use std::collections::BTreeMap;

/// Lower an annotation to a type
pub fn lower(vars: &mut VarArena, env: &TypeEnvironment, expr: &TypeExpr) -> CheckResult<Type> {
    let explicit = matches!(expr, TypeExpr::Forall { .. });
    lower_with(vars, env, expr, explicit)
}

/// Lower a type that introduces no variables of its own, such as a cast
/// target or a field type: every name must already be defined
pub fn lower_closed(
    vars: &mut VarArena,
    env: &TypeEnvironment,
    expr: &TypeExpr,
) -> CheckResult<Type> {
    lower_with(vars, env, expr, true)
}

fn lower_with(
    vars: &mut VarArena,
    env: &TypeEnvironment,
    expr: &TypeExpr,
    explicit: bool,
) -> CheckResult<Type> {
    let mut lowering = Lowering {
        vars,
        env,
        scope: Vec::new(),
        explicit,
        implicit: Vec::new(),
        synthetic: Vec::new(),
    };
    let ty = lowering.lower(expr)?;
    let mut implicit = lowering.implicit;
    implicit.extend(lowering.synthetic);
    if implicit.is_empty() {
        return Ok(ty);
    }
    Ok(match ty {
        Type::Forall(forall) => {
            let mut params = forall.params.clone();
            params.extend(implicit);
            Type::forall(params, forall.body.clone())
        }
        other => Type::forall(implicit, other),
    })
}

struct Lowering<'a> {
    vars: &'a mut VarArena,
    env: &'a TypeEnvironment,
    /// Variables in scope, innermost last
    scope: Vec<(String, TypeVar)>,
    /// Whether unknown names are errors rather than new variables
    explicit: bool,
    /// Variables introduced without a binder, quantified at the top
    implicit: Vec<TypeVar>,
    /// Rest variables supplied for effects written without one
    synthetic: Vec<TypeVar>,
}

impl Lowering<'_> {
    fn lookup_var(&self, name: &str) -> Option<&TypeVar> {
        self.scope
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, var)| var)
    }

    fn introduce(&mut self, name: &str, kind: Kind) -> TypeVar {
        let var = self.vars.bound(name, kind);
        self.scope.push((name.to_string(), var.clone()));
        self.implicit.push(var.clone());
        var
    }

    fn lower(&mut self, expr: &TypeExpr) -> CheckResult<Type> {
        match expr {
            TypeExpr::Named { name, args } => self.lower_named(name, args),
            TypeExpr::Effect { input, output } => self.lower_effect(input, output),
            TypeExpr::Forall { params, body } => self.lower_forall(params, body),
            TypeExpr::Object { members } => {
                let mut lowered = BTreeMap::new();
                for (name, member) in members {
                    // each member is quantified over its own supplied rest
                    let mark = self.synthetic.len();
                    let ty = self.lower(member)?;
                    let local = self.synthetic.split_off(mark);
                    let ty = if local.is_empty() {
                        ty
                    } else {
                        Type::forall(local, ty)
                    };
                    if !ty.kind().is_item() {
                        return Err(not_an_item(&ty, &format!("member '{}'", name)).into());
                    }
                    lowered.insert(name.clone(), ty);
                }
                Ok(Type::structural(lowered))
            }
        }
    }

    fn lower_forall(&mut self, params: &[TypeParam], body: &TypeExpr) -> CheckResult<Type> {
        let depth = self.scope.len();
        let mut vars = Vec::with_capacity(params.len());
        for param in params {
            let var = self.vars.bound(&param.name, param.kind.clone());
            self.scope.push((param.name.clone(), var.clone()));
            vars.push(var);
        }
        let body = self.lower(body);
        self.scope.truncate(depth);
        Ok(Type::forall(vars, body?))
    }

    fn lower_named(&mut self, name: &str, args: &[TypeExpr]) -> CheckResult<Type> {
        let head = match self.lookup_var(name) {
            Some(var) => Type::Var(var.clone()),
            None => match self.env.lookup_type(name) {
                Some(ty) => ty.clone(),
                None if self.explicit => return Err(TypeError::undefined_name(name).into()),
                None => Type::Var(self.introduce(name, Kind::Item)),
            },
        };
        if args.is_empty() {
            return Ok(head);
        }

        let ctor = match &head {
            Type::Constructor(ctor) => ctor.clone(),
            Type::Var(var) => {
                return Err(TypeError::kind_error(format!(
                    "type variable {} of kind {} cannot be applied to arguments",
                    head, var.kind
                ))
                .into());
            }
            other => {
                return Err(TypeError::arity(
                    0,
                    args.len(),
                    format!(
                        "{} is not a generic type and takes no arguments, got {}",
                        other,
                        args.len()
                    ),
                )
                .into());
            }
        };
        if ctor.is_variadic() {
            // `tuple[int, str]`: the arguments are the items of one stack
            let mut items = Vec::with_capacity(args.len());
            for arg in args {
                let ty = self.lower(arg)?;
                if !ty.kind().is_item() {
                    return Err(not_an_item(&ty, &format!("an argument of {}", ctor.name)).into());
                }
                items.push(ty);
            }
            return Ok(Type::apply(ctor, vec![Type::Stack(StackType::new(None, items))]));
        }
        if args.len() != ctor.arity() {
            return Err(TypeError::arity(
                ctor.arity(),
                args.len(),
                format!(
                    "{} expects {} type arguments, got {}",
                    ctor.name,
                    ctor.arity(),
                    args.len()
                ),
            )
            .into());
        }
        let mut lowered = Vec::with_capacity(args.len());
        for (param, arg) in ctor.params.iter().zip(args) {
            let arg = self.lower(arg)?;
            if !arg.kind().is_subkind_of(&param.kind) {
                return Err(TypeError::kind_error(format!(
                    "the kind of {} ({}) is incompatible with the kind of parameter {} of {} ({})",
                    arg,
                    arg.kind(),
                    param.name,
                    ctor.name,
                    param.kind
                ))
                .into());
            }
            lowered.push(arg);
        }
        Ok(Type::apply(ctor, lowered))
    }

    fn lower_rest(&mut self, name: &str) -> CheckResult<TypeVar> {
        match self.lookup_var(name) {
            Some(var) if var.kind == Kind::Sequence => Ok(var.clone()),
            Some(var) => Err(TypeError::kind_error(format!(
                "{} is used as a rest variable but has kind {}",
                name, var.kind
            ))
            .into()),
            None if self.explicit => Err(TypeError::undefined_name(name).into()),
            None => Ok(self.introduce(name, Kind::Sequence)),
        }
    }

    fn lower_stack(&mut self, stack: &StackExpr, rest: Option<TypeVar>) -> CheckResult<StackType> {
        let mut items = Vec::with_capacity(stack.items.len());
        for item in &stack.items {
            let ty = self.lower(item)?;
            if !ty.kind().is_item() {
                return Err(not_an_item(&ty, "a stack item").into());
            }
            items.push(ty);
        }
        Ok(StackType::new(rest, items))
    }

    fn lower_effect(&mut self, input: &StackExpr, output: &StackExpr) -> CheckResult<Type> {
        let (input_rest, output_rest) = match (&input.rest, &output.rest) {
            (None, None) => {
                let rest = self.vars.bound("_", Kind::Sequence);
                self.synthetic.push(rest.clone());
                (Some(rest.clone()), Some(rest))
            }
            (input_rest, output_rest) => {
                let input_rest = input_rest
                    .as_deref()
                    .map(|name| self.lower_rest(name))
                    .transpose()?;
                let output_rest = output_rest
                    .as_deref()
                    .map(|name| self.lower_rest(name))
                    .transpose()?;
                (input_rest, output_rest)
            }
        };
        let input = self.lower_stack(input, input_rest)?;
        let output = self.lower_stack(output, output_rest)?;
        Ok(Type::effect(input, output))
    }
}

fn not_an_item(ty: &Type, what: &str) -> TypeError {
    TypeError::kind_error(format!(
        "{} has kind {}, which cannot be used as {}",
        ty,
        ty.kind(),
        what
    ))
}
