//! Subsumption ("regeneralization")
//!
//! [`Solver::constrain`] decides `sub <: sup` for arbitrary, possibly
//! polymorphic types, recording solutions for free variables in the
//! substitution as it goes. The cases, in order:
//!
//! 1. Both sides quantified: freshen `sub`'s parameters, make `sup`'s rigid
//!    for the duration, compare the bodies, and reject any rigid variable
//!    that leaked into a solution of a pre-existing variable.
//! 2. A free variable on either side absorbs the other type as-is when the
//!    kinds allow it (a polymorphic type may be the solution).
//! 3. Quantified `sub`: instantiate just enough leading parameters to match
//!    `sup`'s arity, leaving the rest quantified.
//! 4. Quantified `sup` only: treated as case 1 with an empty `sub` prefix.
//! 5. Everything else is structural. Stacks compare from the top down and
//!    whichever side runs out of items first has its rest variable solved to
//!    what remains of the other.

use crate::error::{CheckResult, InternalError, TypeError};
use crate::kinds::Kind;
use crate::protocols::MemberTable;
use crate::substitution::{Snapshot, Subst, freshen, instantiate, instantiate_prefix};
use crate::types::{
    ForallType, Role, StackEffect, StackType, Type, TypeConstructor, TypeVar, VarArena, VarId,
};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// Variable arena plus the substitution being built for one unit
#[derive(Debug, Default)]
pub struct Solver {
    pub vars: VarArena,
    pub subst: Subst,
    /// Members of nominal types, consulted when checking structural types
    pub members: MemberTable,
}

impl Solver {
    pub fn new() -> Self {
        Solver::default()
    }

    pub fn fresh(&mut self, hint: &str, kind: Kind) -> TypeVar {
        self.vars.fresh(hint, kind)
    }

    /// A stack consisting only of a fresh rest variable
    pub fn fresh_stack(&mut self, hint: &str) -> StackType {
        StackType::from_rest(self.vars.fresh(hint, Kind::Sequence))
    }

    pub fn instantiate(&mut self, ty: &Type) -> Type {
        instantiate(&mut self.vars, ty)
    }

    pub fn apply(&self, ty: &Type) -> Type {
        self.subst.apply_type(ty)
    }

    pub fn apply_stack(&self, stack: &StackType) -> StackType {
        self.subst.apply_stack(stack)
    }

    pub fn apply_effect(&self, effect: &StackEffect) -> StackEffect {
        self.subst.apply_effect(effect)
    }

    /// Require `sub <: sup`
    ///
    /// On success the substitution is extended with whatever solutions the
    /// comparison needed. On failure it is left exactly as it was.
    pub fn constrain(&mut self, sub: &Type, sup: &Type) -> CheckResult<()> {
        trace!(%sub, %sup, "constrain");
        let snapshot = self.subst.snapshot();
        let result = self.constrain_inner(sub, sup);
        if result.is_err() {
            self.subst.rollback_to(snapshot);
        }
        result
    }

    /// Require `sub <: sup` between two stack types
    pub fn constrain_stacks(&mut self, sub: &StackType, sup: &StackType) -> CheckResult<()> {
        trace!(%sub, %sup, "constrain stacks");
        let snapshot = self.subst.snapshot();
        let result = self.constrain_stack(sub, sup);
        if result.is_err() {
            self.subst.rollback_to(snapshot);
        }
        result
    }

    /// Require `a` and `b` to be mutual subtypes
    pub fn unify(&mut self, a: &Type, b: &Type) -> CheckResult<()> {
        let snapshot = self.subst.snapshot();
        let result = self
            .constrain_inner(a, b)
            .and_then(|()| self.constrain_inner(b, a));
        if result.is_err() {
            self.subst.rollback_to(snapshot);
        }
        result
    }

    /// Does `sub <: sup` hold? Leaves the substitution untouched either way.
    pub fn is_subtype(&mut self, sub: &Type, sup: &Type) -> bool {
        let snapshot = self.subst.snapshot();
        let holds = self.constrain_inner(sub, sup).is_ok();
        self.subst.rollback_to(snapshot);
        holds
    }

    fn bind(&mut self, var: &TypeVar, ty: &Type) -> CheckResult<()> {
        debug!(var = %Type::Var(var.clone()), solution = %ty, "solved variable");
        Ok(self.subst.bind(var, ty.clone())?)
    }

    fn is_free_var(&self, ty: &Type) -> Option<TypeVar> {
        match ty {
            Type::Var(var) if self.vars.is_free(var) => Some(var.clone()),
            _ => None,
        }
    }

    fn constrain_inner(&mut self, sub: &Type, sup: &Type) -> CheckResult<()> {
        let sub = self.subst.resolve(sub);
        let sup = self.subst.resolve(sup);
        if sub == sup {
            return Ok(());
        }

        if let (Type::Forall(a), Type::Forall(b)) = (&sub, &sup) {
            return self.regeneralize(a, b);
        }

        if let Some(var) = self.is_free_var(&sup) {
            if sub.kind().is_subkind_of(&var.kind) {
                return self.bind(&var, &sub);
            }
        }
        if let Some(var) = self.is_free_var(&sub) {
            if sup.kind().is_subkind_of(&var.kind) {
                return self.bind(&var, &sup);
            }
        }

        if let Type::Forall(a) = &sub {
            return self.instantiate_against(a, &sup);
        }
        if let Type::Forall(b) = &sup {
            let monomorphic = ForallType {
                params: Vec::new(),
                body: sub.clone(),
            };
            return self.regeneralize(&monomorphic, b);
        }

        if self.is_free_var(&sub).is_some() || self.is_free_var(&sup).is_some() {
            return Err(incompatible_kinds(&sub, &sup).into());
        }

        if sup.is_object() {
            return if sub.kind().is_item() {
                Ok(())
            } else {
                Err(incompatible_kinds(&sub, &sup).into())
            };
        }

        if let Some(required) = required_members(&sup) {
            if !sub.kind().is_item() {
                return Err(incompatible_kinds(&sub, &sup).into());
            }
            let provided = self.members.members_of(&sub).unwrap_or_default();
            return self.constrain_members(&sub, &provided, &sup, &required);
        }

        if let Type::Var(var) = &sub {
            return Err(rigid(var, &sup).into());
        }
        if let Type::Var(var) = &sup {
            return Err(rigid(var, &sub).into());
        }

        if !sub.kind().is_subkind_of(&sup.kind()) {
            return Err(incompatible_kinds(&sub, &sup).into());
        }

        match (&sub, &sup) {
            (Type::Stack(a), Type::Stack(b)) => self.constrain_stack(a, b),
            (Type::Effect(a), Type::Effect(b)) => self.constrain_effect(a, b),
            (Type::Individual(a), Type::Individual(b)) if !a.structural && a.name == b.name => {
                Ok(())
            }
            (Type::Apply(a), Type::Apply(b)) if a.constructor.name == b.constructor.name => {
                self.constrain_arguments(&a.constructor, &a.args, &b.args, &sub, &sup)
            }
            _ => Err(TypeError::not_subtype(&sub, &sup).into()),
        }
    }

    /// Compare two quantified types by freshening `a` and rigidifying `b`
    fn regeneralize(&mut self, a: &ForallType, b: &ForallType) -> CheckResult<()> {
        let a_type = Type::Forall(Rc::new(a.clone()));
        let b_type = Type::Forall(Rc::new(b.clone()));
        let a_free = a_type.free_variables();
        if let Some(captured) = b.params.iter().find(|p| a_free.contains(p)) {
            return Err(TypeError::subtype(
                &a_type,
                &b_type,
                format!(
                    "type parameter {} of {} cannot appear free in {}",
                    Type::Var(captured.clone()),
                    b_type,
                    a_type
                ),
            )
            .into());
        }

        let (body, mapping) = freshen(&mut self.vars, a);
        let freshened: Vec<VarId> = mapping
            .iter()
            .filter_map(|(_, ty)| match ty {
                Type::Var(var) => Some(var.id),
                _ => None,
            })
            .collect();
        let previous: Vec<Role> = b
            .params
            .iter()
            .map(|p| self.vars.set_role(p, Role::Rigid))
            .collect();
        let snapshot = self.subst.snapshot();

        let result = self
            .constrain_inner(&body, &b.body)
            .and_then(|()| self.find_escape(snapshot, &|id| freshened.contains(&id), &b.params));

        for (param, role) in b.params.iter().zip(previous) {
            self.vars.set_role(param, role);
        }
        result
    }

    /// Require that no variable allocated before `mark` has been solved,
    /// since `snapshot`, to a type mentioning one of the `rigid` variables
    ///
    /// Used once a body has been checked against a declared type whose
    /// parameters were held rigid.
    pub fn check_escape(&self, snapshot: Snapshot, mark: VarId, rigid: &[TypeVar]) -> CheckResult<()> {
        self.find_escape(snapshot, &|id| id >= mark, rigid)
    }

    /// No solution of a variable that existed before the comparison may
    /// mention one of the rigid parameters
    fn find_escape(
        &self,
        snapshot: Snapshot,
        is_local: &dyn Fn(VarId) -> bool,
        rigid: &[TypeVar],
    ) -> CheckResult<()> {
        if rigid.is_empty() {
            return Ok(());
        }
        for id in self.subst.bound_since(snapshot) {
            if is_local(*id) {
                continue;
            }
            let var = self.vars.get(*id).ok_or_else(|| {
                InternalError::new(format!("variable {:?} is missing from the arena", id))
            })?;
            let solution = self.subst.apply_type(&Type::Var(var.clone()));
            let mentioned = solution.free_variables();
            if let Some(escaped) = rigid.iter().find(|p| mentioned.contains(p)) {
                return Err(TypeError::subtype(
                    &Type::Var(var.clone()),
                    &solution,
                    format!(
                        "rigid variable {} would escape its scope through {}",
                        Type::Var(escaped.clone()),
                        Type::Var(var.clone())
                    ),
                )
                .into());
            }
        }
        Ok(())
    }

    /// A quantified `sub` against an unquantified `sup`
    fn instantiate_against(&mut self, a: &ForallType, sup: &Type) -> CheckResult<()> {
        let needed = sup.kind().arity();
        let sub = Type::Forall(Rc::new(a.clone()));
        if a.params.len() < needed {
            return Err(incompatible_kinds(&sub, sup).into());
        }
        let instantiated = instantiate_prefix(&mut self.vars, a, a.params.len() - needed);
        if needed == 0 {
            return self.constrain_inner(&instantiated, sup);
        }
        // both sides are constructors of the same arity: apply them to the
        // same fresh arguments and compare the results
        match (&instantiated, sup) {
            (Type::Forall(remaining), Type::Constructor(ctor)) => {
                let args: Vec<Type> = remaining
                    .params
                    .iter()
                    .map(|p| Type::Var(self.vars.fresh(&p.name, p.kind.clone())))
                    .collect();
                let mapping: Vec<(TypeVar, Type)> = remaining
                    .params
                    .iter()
                    .cloned()
                    .zip(args.iter().cloned())
                    .collect();
                let lhs = remaining.body.rename(&mapping);
                let rhs = Type::apply(ctor.clone(), args);
                self.constrain_inner(&lhs, &rhs)
            }
            (_, Type::Var(var)) => Err(rigid(var, &sub).into()),
            _ => Err(TypeError::not_subtype(&sub, sup).into()),
        }
    }

    fn constrain_effect(&mut self, sub: &StackEffect, sup: &StackEffect) -> CheckResult<()> {
        // inputs are contravariant
        self.constrain_stack(&sup.input, &sub.input)?;
        self.constrain_stack(&sub.output, &sup.output)
    }

    fn constrain_arguments(
        &mut self,
        ctor: &TypeConstructor,
        sub_args: &[Type],
        sup_args: &[Type],
        sub: &Type,
        sup: &Type,
    ) -> CheckResult<()> {
        if sub_args.len() != sup_args.len() {
            return Err(TypeError::arity(
                sup_args.len(),
                sub_args.len(),
                format!(
                    "a generic type expected to receive {} arguments, got {}",
                    sup_args.len(),
                    sub_args.len()
                ),
            )
            .into());
        }
        // arguments are compared invariantly
        for (i, (a, b)) in sub_args.iter().zip(sup_args).enumerate() {
            self.unify(a, b).map_err(|err| {
                err.map_type(|err| {
                    err.context(format!(
                        "argument {} of {} differs between {} and {}",
                        i + 1,
                        ctor.name,
                        sub,
                        sup
                    ))
                })
            })?;
        }
        Ok(())
    }

    /// Every member `sup` requires must be present on `sub` with a
    /// compatible type
    fn constrain_members(
        &mut self,
        sub: &Type,
        provided: &BTreeMap<String, Type>,
        sup: &Type,
        required: &BTreeMap<String, Type>,
    ) -> CheckResult<()> {
        for (name, required_type) in required {
            let Some(provided_type) = provided.get(name) else {
                return Err(TypeError::missing_member(sub, sup, name).into());
            };
            self.constrain_inner(provided_type, required_type)
                .map_err(|err| {
                    err.map_type(|err| {
                        err.in_member(name).context(format!(
                            "member '{}' of {} is incompatible with {}",
                            name, sub, sup
                        ))
                    })
                })?;
        }
        Ok(())
    }

    /// Stack types, compared from the top down
    fn constrain_stack(&mut self, sub: &StackType, sup: &StackType) -> CheckResult<()> {
        let original_sub = self.subst.apply_stack(sub);
        let original_sup = self.subst.apply_stack(sup);
        let mut sub = original_sub.clone();
        let mut sup = original_sup.clone();
        let mut depth = 0;

        while let (Some((sub_rest, sub_top)), Some((sup_rest, sup_top))) = (sub.pop(), sup.pop())
        {
            self.constrain_inner(&sub_top, &sup_top)
                .map_err(|err| err.map_type(|err| err.at_position(depth)))?;
            depth += 1;
            sub = self.subst.apply_stack(&sub_rest);
            sup = self.subst.apply_stack(&sup_rest);
        }

        let mismatch = |solver: &Solver| {
            TypeError::stack_mismatch(
                &solver.subst.apply_stack(&original_sub),
                &solver.subst.apply_stack(&original_sup),
            )
        };

        match (sub.items.is_empty(), sup.items.is_empty()) {
            (true, true) => match (&sub.rest, &sup.rest) {
                (None, None) => Ok(()),
                (Some(a), Some(b)) if a == b => Ok(()),
                (Some(a), _) if self.vars.is_free(a) => self.bind(a, &Type::Stack(sup.clone())),
                (_, Some(b)) if self.vars.is_free(b) => self.bind(b, &Type::Stack(sub.clone())),
                _ => Err(mismatch(self).into()),
            },
            // `sub` ran out while `sup` still requires items
            (true, false) => match &sub.rest {
                Some(a) if self.vars.is_free(a) => self.bind(a, &Type::Stack(sup.clone())),
                None => Err(TypeError::arity(
                    original_sup.len(),
                    original_sub.len(),
                    format!(
                        "not enough items on the stack: the stack here is {}, but {} was expected",
                        self.subst.apply_stack(&original_sub),
                        self.subst.apply_stack(&original_sup)
                    ),
                )
                .into()),
                Some(_) => Err(mismatch(self).into()),
            },
            // `sup` ran out while `sub` has items left over
            (false, true) => match &sup.rest {
                Some(b) if self.vars.is_free(b) => self.bind(b, &Type::Stack(sub.clone())),
                None => Err(TypeError::arity(
                    original_sup.len(),
                    original_sub.len(),
                    format!(
                        "too many items on the stack: the stack here is {}, but {} was expected",
                        self.subst.apply_stack(&original_sub),
                        self.subst.apply_stack(&original_sup)
                    ),
                )
                .into()),
                Some(_) => Err(mismatch(self).into()),
            },
            (false, false) => Err(InternalError::new(
                "stack comparison stopped with items left on both sides",
            )
            .into()),
        }
    }
}

/// The members a structural `sup` requires, or `None` for nominal types
fn required_members(sup: &Type) -> Option<BTreeMap<String, Type>> {
    match sup {
        Type::Individual(ind) if ind.structural => Some(ind.members.clone()),
        Type::Apply(app) if app.constructor.structural => Some(app.members()),
        _ => None,
    }
}

fn incompatible_kinds(sub: &Type, sup: &Type) -> TypeError {
    TypeError::kind_error(format!(
        "the kind of {} ({}) is incompatible with the kind of {} ({})",
        sub,
        sub.kind(),
        sup,
        sup.kind()
    ))
}

fn rigid(var: &TypeVar, other: &Type) -> TypeError {
    let var_type = Type::Var(var.clone());
    TypeError::subtype(
        &var_type,
        other,
        format!("{} is rigid and cannot be unified with {}", var_type, other),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CheckError, TypeErrorKind};

    fn int() -> Type {
        Type::nominal("int", BTreeMap::new())
    }

    fn boolean() -> Type {
        Type::nominal("bool", BTreeMap::new())
    }

    fn object() -> Type {
        Type::nominal("object", BTreeMap::new())
    }

    fn none() -> Type {
        Type::nominal("none", BTreeMap::new())
    }

    fn effect(input: StackType, output: StackType) -> Type {
        Type::effect(input, output)
    }

    fn kind_of_error(err: &CheckError) -> &'static str {
        err.as_type_error().map(|e| e.label()).unwrap_or("InternalError")
    }

    /// forall *s a. (*s a -- *s a a)
    fn dup_type(solver: &mut Solver) -> Type {
        let s = solver.vars.bound("s", Kind::Sequence);
        let a = solver.vars.bound("a", Kind::Item);
        Type::forall(
            vec![s.clone(), a.clone()],
            effect(
                StackType::from_rest(s.clone()).push(Type::Var(a.clone())),
                StackType::from_rest(s)
                    .push(Type::Var(a.clone()))
                    .push(Type::Var(a)),
            ),
        )
    }

    fn addable(solver: &mut Solver) -> Rc<TypeConstructor> {
        let other = solver.vars.bound("other", Kind::Individual);
        let result = solver.vars.bound("result", Kind::Individual);
        let mut members = BTreeMap::new();
        members.insert(
            "add".to_string(),
            effect(
                StackType::empty().push(Type::Var(other.clone())),
                StackType::empty().push(Type::Var(result.clone())),
            ),
        );
        Rc::new(TypeConstructor {
            name: Rc::from("addable"),
            params: vec![other, result],
            members,
            structural: true,
        })
    }

    fn int_with_add() -> Type {
        let mut members = BTreeMap::new();
        members.insert(
            "add".to_string(),
            effect(StackType::empty().push(int()), StackType::empty().push(int())),
        );
        Type::nominal("int", members)
    }

    #[test]
    fn test_reflexivity() {
        let mut solver = Solver::new();
        let s = solver.vars.bound("s", Kind::Sequence);
        let dup = dup_type(&mut solver);
        let addable = addable(&mut solver);
        let samples = vec![
            int(),
            object(),
            effect(StackType::empty(), StackType::empty().push(int())),
            Type::Stack(StackType::from_rest(s).push(boolean())),
            dup,
            Type::apply(addable, vec![int(), boolean()]),
            Type::structural(BTreeMap::new()),
        ];
        for ty in samples {
            assert!(solver.is_subtype(&ty, &ty), "{} should be a subtype of itself", ty);
        }
    }

    #[test]
    fn test_reflexivity_through_fresh_copies() {
        // two separately built but identical polymorphic types
        let mut solver = Solver::new();
        let first = dup_type(&mut solver);
        let second = dup_type(&mut solver);
        assert!(solver.is_subtype(&first, &second));
        assert!(solver.is_subtype(&second, &first));
    }

    #[test]
    fn test_forall_widening_extra_parameters() {
        // forall (). int <: forall a b. int
        let mut solver = Solver::new();
        let a = solver.vars.bound("a", Kind::Individual);
        let b = solver.vars.bound("b", Kind::Individual);
        let sub = Type::forall(vec![], int());
        let sup = Type::forall(vec![a, b], int());
        assert!(solver.is_subtype(&sub, &sup));
    }

    #[test]
    fn test_forall_no_kind_widening_onto_rigid() {
        // forall (a:Individual). a is not a subtype of forall (b:Item). b
        let mut solver = Solver::new();
        let a = solver.vars.bound("a", Kind::Individual);
        let b = solver.vars.bound("b", Kind::Item);
        let sub = Type::forall(vec![a.clone()], Type::Var(a));
        let sup = Type::forall(vec![b.clone()], Type::Var(b.clone()));
        assert!(!solver.is_subtype(&sub, &sup));
        // rigidity is only in force during the comparison
        assert_eq!(solver.vars.role(&b), Role::Bound);
    }

    #[test]
    fn test_rest_variable_absorption() {
        // current stack *s2 bool int, word (*s -- *s int)
        let mut solver = Solver::new();
        let s2 = solver.vars.bound("s2", Kind::Sequence);
        solver.vars.set_role(&s2, Role::Rigid);
        let s = solver.vars.fresh("s", Kind::Sequence);
        let current = StackType::from_rest(s2.clone()).push(boolean()).push(int());
        let word = StackEffect::new(
            StackType::from_rest(s.clone()),
            StackType::from_rest(s.clone()).push(int()),
        );
        solver.constrain_stacks(&current, &word.input).unwrap();
        let output = solver.apply_stack(&word.output);
        assert_eq!(
            output,
            StackType::from_rest(s2.clone())
                .push(boolean())
                .push(int())
                .push(int())
        );
        assert_eq!(output.to_string(), "*s2 bool int int");
        assert_eq!(
            solver.apply(&Type::Var(s)),
            Type::Stack(StackType::from_rest(s2).push(boolean()).push(int()))
        );
    }

    #[test]
    fn test_arity_mismatch_on_closed_stack() {
        let mut solver = Solver::new();
        let s = solver.vars.fresh("s", Kind::Sequence);
        let a = solver.vars.fresh("a", Kind::Item);
        let b = solver.vars.fresh("b", Kind::Item);
        let needs_two = StackType::from_rest(s)
            .push(Type::Var(a))
            .push(Type::Var(b));
        for current in [StackType::empty(), StackType::empty().push(int())] {
            let err = solver.constrain_stacks(&current, &needs_two).unwrap_err();
            assert_eq!(kind_of_error(&err), "ArityError");
        }
    }

    #[test]
    fn test_rigid_rest_variable_mismatch() {
        let mut solver = Solver::new();
        let s = solver.vars.bound("s", Kind::Sequence);
        solver.vars.set_role(&s, Role::Rigid);
        let inferred = StackType::from_rest(s.clone()).push(int()).push(int());
        let declared = StackType::from_rest(s).push(int());
        let err = solver.constrain_stacks(&inferred, &declared).unwrap_err();
        assert_eq!(kind_of_error(&err), "SubtypeError");
        assert!(err.to_string().contains("the stack here is *s int int"));
    }

    #[test]
    fn test_stack_item_position() {
        let mut solver = Solver::new();
        let current = StackType::empty().push(boolean()).push(int());
        let expected = StackType::empty().push(int()).push(int());
        let err = solver.constrain_stacks(&current, &expected).unwrap_err();
        match &err.as_type_error().unwrap().kind {
            TypeErrorKind::Subtype { position, .. } => assert_eq!(*position, Some(1)),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_failure_leaves_substitution_untouched() {
        let mut solver = Solver::new();
        let a = solver.vars.fresh("a", Kind::Item);
        let current = StackType::empty().push(boolean()).push(int());
        let expected = StackType::empty().push(int()).push(Type::Var(a.clone()));
        assert!(solver.constrain_stacks(&current, &expected).is_err());
        assert!(!solver.subst.is_bound(&a));
        assert!(solver.subst.is_empty());
    }

    #[test]
    fn test_polymorphic_word_is_subtype_of_instance() {
        let mut solver = Solver::new();
        let dup = dup_type(&mut solver);
        let int_dup = effect(
            StackType::empty().push(int()),
            StackType::empty().push(int()).push(int()),
        );
        assert!(solver.is_subtype(&dup, &int_dup));
        assert!(!solver.is_subtype(&int_dup, &dup));
    }

    #[test]
    fn test_effects_contravariant_in_input() {
        let mut solver = Solver::new();
        let wide = effect(StackType::empty().push(object()), StackType::empty().push(int()));
        let narrow = effect(StackType::empty().push(int()), StackType::empty().push(object()));
        assert!(solver.is_subtype(&wide, &narrow));
        assert!(!solver.is_subtype(&narrow, &wide));
    }

    #[test]
    fn test_everything_is_an_object() {
        let mut solver = Solver::new();
        let quotation = effect(StackType::empty(), StackType::empty());
        assert!(solver.is_subtype(&int(), &object()));
        assert!(solver.is_subtype(&quotation, &object()));
        assert!(!solver.is_subtype(&object(), &int()));
        let s = solver.vars.fresh("s", Kind::Sequence);
        let err = solver
            .constrain(&Type::Stack(StackType::from_rest(s)), &object())
            .unwrap_err();
        assert_eq!(kind_of_error(&err), "KindError");
    }

    #[test]
    fn test_protocol_member_satisfied() {
        let mut solver = Solver::new();
        let addable = addable(&mut solver);
        let result = solver.fresh("r", Kind::Individual);
        let requirement = Type::apply(addable, vec![int(), Type::Var(result.clone())]);
        solver.constrain(&int_with_add(), &requirement).unwrap();
        assert_eq!(solver.apply(&Type::Var(result)), int());
    }

    #[test]
    fn test_protocol_missing_member() {
        let mut solver = Solver::new();
        let addable = addable(&mut solver);
        let result = solver.fresh("r", Kind::Individual);
        let requirement = Type::apply(addable, vec![none(), Type::Var(result)]);
        let err = solver.constrain(&none(), &requirement).unwrap_err();
        match &err.as_type_error().unwrap().kind {
            TypeErrorKind::Subtype { member, message, .. } => {
                assert_eq!(member.as_deref(), Some("add"));
                assert!(message.contains("'add'"), "{}", message);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_protocol_member_incompatible() {
        let mut solver = Solver::new();
        let addable = addable(&mut solver);
        let result = solver.fresh("r", Kind::Individual);
        let requirement = Type::apply(addable, vec![boolean(), Type::Var(result)]);
        let err = solver.constrain(&int_with_add(), &requirement).unwrap_err();
        match &err.as_type_error().unwrap().kind {
            TypeErrorKind::Subtype { member, .. } => assert_eq!(member.as_deref(), Some("add")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_generic_arguments_invariant() {
        let mut solver = Solver::new();
        let a = solver.vars.bound("a", Kind::Individual);
        let list = Rc::new(TypeConstructor {
            name: Rc::from("list"),
            params: vec![a],
            members: BTreeMap::new(),
            structural: false,
        });
        let ints = Type::apply(list.clone(), vec![int()]);
        let objects = Type::apply(list.clone(), vec![object()]);
        assert!(!solver.is_subtype(&ints, &objects));
        assert!(!solver.is_subtype(&objects, &ints));

        let elem = solver.fresh("e", Kind::Individual);
        let unknown = Type::apply(list, vec![Type::Var(elem.clone())]);
        solver.constrain(&ints, &unknown).unwrap();
        assert_eq!(solver.apply(&Type::Var(elem)), int());
    }

    #[test]
    fn test_rigid_variable_cannot_escape() {
        let mut solver = Solver::new();
        let outer = solver.fresh("x", Kind::Individual);
        let a = solver.vars.bound("a", Kind::Individual);
        let poly = Type::forall(vec![a.clone()], Type::Var(a));
        let err = solver.constrain(&Type::Var(outer.clone()), &poly).unwrap_err();
        assert_eq!(kind_of_error(&err), "SubtypeError");
        assert!(!solver.subst.is_bound(&outer));
    }

    #[test]
    fn test_free_variable_takes_polymorphic_solution() {
        let mut solver = Solver::new();
        let dup = dup_type(&mut solver);
        let slot = solver.fresh("q", Kind::Item);
        solver.constrain(&dup, &Type::Var(slot.clone())).unwrap();
        assert!(matches!(solver.apply(&Type::Var(slot)), Type::Forall(_)));
    }

    #[test]
    fn test_polymorphic_value_into_individual_slot_instantiates() {
        let mut solver = Solver::new();
        let dup = dup_type(&mut solver);
        let slot = solver.fresh("q", Kind::Individual);
        solver.constrain(&dup, &Type::Var(slot.clone())).unwrap();
        assert!(matches!(solver.apply(&Type::Var(slot)), Type::Effect(_)));
    }

    #[test]
    fn test_recursive_stack_rejected() {
        let mut solver = Solver::new();
        let s = solver.fresh("s", Kind::Sequence);
        let sub = StackType::from_rest(s.clone());
        let sup = StackType::from_rest(s).push(int());
        let err = solver.constrain_stacks(&sub, &sup).unwrap_err();
        assert!(err.to_string().contains("recursive type"));
    }

    #[test]
    fn test_unify_is_symmetric() {
        let mut solver = Solver::new();
        let a = solver.fresh("a", Kind::Individual);
        solver.unify(&Type::Var(a.clone()), &int()).unwrap();
        assert_eq!(solver.apply(&Type::Var(a)), int());
        assert!(solver.unify(&int(), &object()).is_err());
    }

    fn constructor(solver: &mut Solver, name: &str, arity: usize) -> Rc<TypeConstructor> {
        let params = (0..arity)
            .map(|i| solver.vars.bound(&format!("p{}", i), Kind::Individual))
            .collect();
        Rc::new(TypeConstructor {
            name: Rc::from(name),
            params,
            members: BTreeMap::new(),
            structural: false,
        })
    }

    #[test]
    fn test_partial_instantiation_against_constructor() {
        // forall x y. list[y] stands for list once x is instantiated
        let mut solver = Solver::new();
        let list = constructor(&mut solver, "list", 1);
        let x = solver.vars.bound("x", Kind::Individual);
        let y = solver.vars.bound("y", Kind::Individual);
        let sub = Type::forall(vec![x, y.clone()], Type::apply(list.clone(), vec![Type::Var(y)]));
        assert!(solver.is_subtype(&sub, &Type::Constructor(list.clone())));
        assert!(solver.subst.is_empty());
    }

    #[test]
    fn test_partial_instantiation_compares_applied_bodies() {
        let mut solver = Solver::new();
        let list = constructor(&mut solver, "list", 1);
        let z = solver.vars.bound("z", Kind::Individual);
        let constant = Type::forall(vec![z], int());
        let err = solver
            .constrain(&constant, &Type::Constructor(list))
            .unwrap_err();
        assert_eq!(kind_of_error(&err), "SubtypeError");
        assert!(err.to_string().contains("int is not a subtype of list["), "{}", err);
    }

    #[test]
    fn test_too_few_parameters_for_constructor() {
        let mut solver = Solver::new();
        let list = constructor(&mut solver, "list", 1);
        let pair = constructor(&mut solver, "pair", 2);
        let w = solver.vars.bound("w", Kind::Individual);
        let one = Type::forall(vec![w.clone()], Type::apply(list, vec![Type::Var(w)]));
        let err = solver.constrain(&one, &Type::Constructor(pair)).unwrap_err();
        assert_eq!(kind_of_error(&err), "KindError");
    }

    #[test]
    fn test_escape_into_older_variable() {
        let mut solver = Solver::new();
        let outer = solver.fresh("o", Kind::Item);
        let a = solver.vars.bound("a", Kind::Item);
        solver.vars.set_role(&a, Role::Rigid);
        let snapshot = solver.subst.snapshot();
        let mark = solver.vars.mark();
        // a variable allocated during the check may take the rigid variable
        let local = solver.fresh("l", Kind::Item);
        solver.constrain(&Type::Var(a.clone()), &Type::Var(local)).unwrap();
        solver.check_escape(snapshot, mark, &[a.clone()]).unwrap();
        // one that existed before may not
        solver.constrain(&Type::Var(a.clone()), &Type::Var(outer)).unwrap();
        let err = solver.check_escape(snapshot, mark, &[a]).unwrap_err();
        assert_eq!(kind_of_error(&err), "SubtypeError");
        assert!(err.to_string().contains("would escape its scope"), "{}", err);
    }
}
