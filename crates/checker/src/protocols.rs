//! Operator protocols
//!
//! Binary operators are resolved structurally. `a b +` asks whether the type
//! of `a` has an `add` member accepting `b`; if so the member's result type
//! is what `+` leaves on the stack. Each operator names a protocol, a
//! structural type constructor `P[other, result]` with a single member:
//!
//! ```text
//! addable[other, result] = {add: (other -- result)}
//! ```
//!
//! Nominal types declare which members they provide in a [`MemberTable`],
//! which is also where members common to every value (`eq`, `ne`, `is`) live.

use crate::error::{CheckResult, InternalError};
use crate::kinds::Kind;
use crate::subsumption::Solver;
use crate::types::{GenericType, StackType, Type, TypeConstructor, VarArena};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::debug;

/// An operator word and the protocol member it dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    pub word: &'static str,
    pub protocol: &'static str,
    pub member: &'static str,
}

const fn op(word: &'static str, protocol: &'static str, member: &'static str) -> Operator {
    Operator {
        word,
        protocol,
        member,
    }
}

pub const OPERATORS: &[Operator] = &[
    op("+", "addable", "add"),
    op("-", "subtractable", "subtract"),
    op("*", "multipliable", "multiply"),
    op("==", "equatable", "eq"),
    op("!=", "inequatable", "ne"),
    op("<", "lt-comparable", "lt"),
    op("<=", "le-comparable", "le"),
    op(">", "gt-comparable", "gt"),
    op(">=", "ge-comparable", "ge"),
    op("and", "conjunctive", "and"),
    op("or", "disjunctive", "or"),
    op("is", "identifiable", "is"),
];

pub fn operator(word: &str) -> Option<&'static Operator> {
    OPERATORS.iter().find(|op| op.word == word)
}

/// `(other -- result)`, the shape of every binary operator member
pub fn binary_member(other: Type, result: Type) -> Type {
    Type::effect(StackType::empty().push(other), StackType::empty().push(result))
}

/// Members provided by nominal types, keyed by type name
///
/// Nominal member tables live here rather than inline on each type so that a
/// type's members may mention the type itself (`int` has `add: (int -- int)`).
#[derive(Debug, Default, Clone)]
pub struct MemberTable {
    nominal: HashMap<String, BTreeMap<String, Type>>,
    constructors: HashMap<String, Rc<TypeConstructor>>,
    universal: BTreeMap<String, Type>,
}

impl MemberTable {
    pub fn new() -> Self {
        MemberTable::default()
    }

    /// Declare members of the nominal type `name`, adding to any it has
    pub fn declare(&mut self, name: &str, members: BTreeMap<String, Type>) {
        self.nominal
            .entry(name.to_string())
            .or_default()
            .extend(members);
    }

    /// Register a nominal constructor whose members mention its parameters
    pub fn declare_constructor(&mut self, constructor: Rc<TypeConstructor>) {
        self.constructors
            .insert(constructor.name.to_string(), constructor);
    }

    /// Members every item has, whatever its type
    pub fn declare_universal(&mut self, members: BTreeMap<String, Type>) {
        self.universal.extend(members);
    }

    /// Members visible on a value of type `ty`
    ///
    /// Returns `None` for stack types, which are never values.
    pub fn members_of(&self, ty: &Type) -> Option<BTreeMap<String, Type>> {
        let mut members = self.universal.clone();
        match ty {
            Type::Individual(ind) if ind.structural => return Some(ind.members.clone()),
            Type::Individual(ind) => {
                if let Some(declared) = self.nominal.get(&*ind.name) {
                    members.extend(declared.clone());
                }
                members.extend(ind.members.clone());
            }
            Type::Apply(app) if app.constructor.structural => return Some(app.members()),
            Type::Apply(app) => {
                let constructor = self
                    .constructors
                    .get(&*app.constructor.name)
                    .cloned()
                    .unwrap_or_else(|| app.constructor.clone());
                let full = GenericType {
                    constructor,
                    args: app.args.clone(),
                };
                members.extend(full.members());
            }
            Type::Var(var) if var.kind.is_item() => {}
            Type::Effect(_) | Type::Forall(_) => {}
            Type::Var(_) | Type::Stack(_) | Type::Constructor(_) => return None,
        }
        Some(members)
    }

    pub fn member(&self, ty: &Type, name: &str) -> Option<Type> {
        self.members_of(ty)?.remove(name)
    }
}

/// The protocol constructors, one per operator
#[derive(Debug, Clone)]
pub struct ProtocolTable {
    constructors: HashMap<&'static str, Rc<TypeConstructor>>,
}

impl ProtocolTable {
    pub fn new(vars: &mut VarArena) -> Self {
        let mut constructors = HashMap::new();
        for op in OPERATORS {
            let other = vars.bound("other", Kind::Item);
            let result = vars.bound("result", Kind::Item);
            let mut members = BTreeMap::new();
            members.insert(
                op.member.to_string(),
                binary_member(Type::Var(other.clone()), Type::Var(result.clone())),
            );
            constructors.insert(
                op.protocol,
                Rc::new(TypeConstructor {
                    name: Rc::from(op.protocol),
                    params: vec![other, result],
                    members,
                    structural: true,
                }),
            );
        }
        ProtocolTable { constructors }
    }

    pub fn constructor(&self, protocol: &str) -> Option<&Rc<TypeConstructor>> {
        self.constructors.get(protocol)
    }

    /// All protocol constructors, for registering as type names
    pub fn constructors(&self) -> impl Iterator<Item = &Rc<TypeConstructor>> {
        self.constructors.values()
    }

    /// `P[other, result]` for the operator's protocol
    pub fn requirement(&self, op: &Operator, other: Type, result: Type) -> CheckResult<Type> {
        let protocol = self.constructors.get(op.protocol).ok_or_else(|| {
            InternalError::new(format!("no protocol registered for operator '{}'", op.word))
        })?;
        Ok(Type::apply(protocol.clone(), vec![other, result]))
    }

    /// Type of `first other op`: `first` must satisfy the operator's
    /// protocol applied to `other`; the member's result is returned
    pub fn resolve(
        &self,
        solver: &mut Solver,
        op: &Operator,
        first: &Type,
        other: &Type,
    ) -> CheckResult<Type> {
        let result = Type::Var(solver.fresh("result", Kind::Item));
        let requirement = self.requirement(op, other.clone(), result.clone())?;
        let first = solver.apply(first);
        let other = solver.apply(other);
        solver.constrain(&first, &requirement).map_err(|err| {
            err.map_type(|err| {
                err.context(format!(
                    "operator '{}' is not supported between {} and {}",
                    op.word, first, other
                ))
            })
        })?;
        let result = solver.apply(&result);
        debug!(operator = op.word, %first, %result, "resolved operator");
        Ok(result)
    }

    /// `forall *s other result. (*s P[other, result] other -- *s result)`
    ///
    /// The type an operator has when pushed as a value.
    pub fn signature(&self, vars: &mut VarArena, op: &Operator) -> CheckResult<Type> {
        let s = vars.bound("s", Kind::Sequence);
        let other = vars.bound("other", Kind::Item);
        let result = vars.bound("result", Kind::Item);
        let input = StackType::from_rest(s.clone())
            .push(self.requirement(op, Type::Var(other.clone()), Type::Var(result.clone()))?)
            .push(Type::Var(other.clone()));
        let output = StackType::from_rest(s.clone()).push(Type::Var(result.clone()));
        Ok(Type::forall(
            vec![s, other, result],
            Type::effect(input, output),
        ))
    }
}
