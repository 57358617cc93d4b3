//! Control-flow combinators
//!
//! `choose`, `if_then`, `if_not` and `loop` have ordinary signatures in the
//! prelude, but checking them through those signatures makes the first
//! branch decide the result and the second merely conform to it. Here the
//! branches are instead inferred from the same input and then joined, so
//! either may be the more general one. When a quotation's type is not yet
//! known the plain signature is used.

use crate::error::{CheckError, CheckResult, TypeError};
use crate::subsumption::Solver;
use crate::typechecker::TypeChecker;
use crate::types::{StackEffect, StackType, Type};
use tracing::debug;

impl TypeChecker {
    /// Check a combinator call, or return `None` if `name` is not one
    pub(crate) fn infer_combinator(
        &mut self,
        name: &str,
        stack: &StackType,
    ) -> CheckResult<Option<StackType>> {
        let result = match name {
            "choose" => self.infer_choose(stack)?,
            "if_then" | "if_not" => self.infer_conditional(name, stack)?,
            "loop" => self.infer_loop(stack)?,
            _ => return Ok(None),
        };
        match result {
            Some(stack) => Ok(Some(stack)),
            None => {
                debug!(combinator = name, "quotation type unknown, using signature");
                let ty = self.env.require(name)?.clone();
                self.apply_word(name, &ty, stack.clone()).map(Some)
            }
        }
    }

    /// `cond $(then) $(else) choose`
    fn infer_choose(&mut self, stack: &StackType) -> CheckResult<Option<StackType>> {
        let (rest, otherwise) = self.pop(stack.clone())?;
        let (rest, then) = self.pop(rest)?;
        let (Some(then), Some(otherwise)) = (self.quotation(&then), self.quotation(&otherwise))
        else {
            return Ok(None);
        };
        let (rest, condition) = self.pop(rest)?;
        self.require_condition(&condition)?;

        let then_output = self.apply_arm(&then, &rest)?;
        let otherwise_output = self.apply_arm(&otherwise, &rest)?;
        join_stacks(&mut self.solver, &then_output, &otherwise_output)
            .map(Some)
            .map_err(|err| {
                err.map_type(|err| err.context("the branches of choose leave incompatible stacks"))
            })
    }

    /// `cond $(body) if_then`: the body may run or not, so what it leaves
    /// must join with what was there before
    fn infer_conditional(&mut self, name: &str, stack: &StackType) -> CheckResult<Option<StackType>> {
        let (rest, body) = self.pop(stack.clone())?;
        let Some(body) = self.quotation(&body) else {
            return Ok(None);
        };
        let (rest, condition) = self.pop(rest)?;
        self.require_condition(&condition)?;

        let output = self.apply_arm(&body, &rest)?;
        let rest = self.solver.apply_stack(&rest);
        join_stacks(&mut self.solver, &output, &rest)
            .map(Some)
            .map_err(|err| {
                err.map_type(|err| {
                    err.context(format!(
                        "the body of {} must leave the stack as it found it",
                        name
                    ))
                })
            })
    }

    /// `$(body) loop`: the body runs again while it leaves True
    fn infer_loop(&mut self, stack: &StackType) -> CheckResult<Option<StackType>> {
        let (rest, body) = self.pop(stack.clone())?;
        let Some(body) = self.quotation(&body) else {
            return Ok(None);
        };
        let output = self.apply_arm(&body, &rest)?;
        let expected = self
            .solver
            .apply_stack(&rest)
            .push(self.prims.boolean.clone());
        self.solver
            .constrain_stacks(&output, &expected)
            .map_err(|err| {
                err.map_type(|err| {
                    err.context(
                        "the body of loop must leave the stack it was given with a bool on top",
                    )
                })
            })?;
        Ok(Some(self.solver.apply_stack(&rest)))
    }

    fn require_condition(&mut self, condition: &Type) -> CheckResult<()> {
        let boolean = self.prims.boolean.clone();
        self.solver.constrain(condition, &boolean).map_err(|err| {
            err.map_type(|err| err.context("the condition must be a bool"))
        })
    }

    /// The effect of a quotation on the stack, instantiated, if it is known
    fn quotation(&mut self, ty: &Type) -> Option<StackEffect> {
        let ty = self.solver.apply(ty);
        match self.solver.instantiate(&ty) {
            Type::Effect(effect) => Some((*effect).clone()),
            _ => None,
        }
    }

    /// Run one arm on `rest`, giving the stack it leaves
    fn apply_arm(&mut self, arm: &StackEffect, rest: &StackType) -> CheckResult<StackType> {
        let rest = self.solver.apply_stack(rest);
        self.solver.constrain_stacks(&rest, &arm.input)?;
        Ok(self.solver.apply_stack(&arm.output))
    }
}

/// The more general of two stacks, whichever way round that is
fn join_stacks(solver: &mut Solver, a: &StackType, b: &StackType) -> CheckResult<StackType> {
    let first = match solver.constrain_stacks(a, b) {
        Ok(()) => return Ok(solver.apply_stack(b)),
        Err(err) => err,
    };
    if solver.constrain_stacks(b, a).is_ok() {
        return Ok(solver.apply_stack(a));
    }
    Err(match first {
        CheckError::Type(err) => {
            let found = solver.apply_stack(a);
            let expected = solver.apply_stack(b);
            TypeError::subtype(
                &Type::Stack(found.clone()),
                &Type::Stack(expected.clone()),
                format!("{} and {} have no common supertype: {}", found, expected, err),
            )
            .into()
        }
        internal => internal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::Kind;
    use std::collections::BTreeMap;

    fn int() -> Type {
        Type::nominal("int", BTreeMap::new())
    }

    fn object() -> Type {
        Type::nominal("object", BTreeMap::new())
    }

    #[test]
    fn test_join_either_direction() {
        let mut solver = Solver::new();
        let narrow = StackType::empty().push(int());
        let wide = StackType::empty().push(object());
        assert_eq!(join_stacks(&mut solver, &narrow, &wide).unwrap(), wide);
        assert_eq!(join_stacks(&mut solver, &wide, &narrow).unwrap(), wide);
    }

    #[test]
    fn test_join_incompatible() {
        let mut solver = Solver::new();
        let one = StackType::empty().push(int());
        let two = StackType::empty().push(int()).push(int());
        let err = join_stacks(&mut solver, &one, &two).unwrap_err();
        assert_eq!(err.as_type_error().unwrap().label(), "SubtypeError");
        assert!(solver.subst.is_empty());
    }

    #[test]
    fn test_join_solves_rest_variables() {
        let mut solver = Solver::new();
        let s = solver.fresh("s", Kind::Sequence);
        let open = StackType::from_rest(s.clone());
        let closed = StackType::empty().push(int());
        assert_eq!(join_stacks(&mut solver, &open, &closed).unwrap(), closed);
        assert_eq!(
            solver.apply(&Type::Var(s)),
            Type::Stack(StackType::empty().push(int()))
        );
    }
}
