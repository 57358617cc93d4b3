//! Type representation for Concat
//!
//! Stack effects are written like `(*s int -- *s bool)`, where `*s` is a rest
//! variable standing for whatever lies beneath the items the word touches.
//!
//! Type variables are handles into a per-unit [`VarArena`]. A variable's
//! identity is its [`VarId`]; its name is only a display hint, so two
//! variables called `a` are still distinct. Whether a variable may be solved
//! is recorded on its arena record as a [`Role`] and changes while a
//! quantified type is being compared (see `subsumption`).

use crate::kinds::Kind;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// The distinguished top item type: every host object is an `object`
pub const OBJECT: &str = "object";

/// Identity of a type variable, unique within one checking run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

#[derive(Debug, Clone)]
pub struct TypeVar {
    pub id: VarId,
    pub kind: Kind,
    pub name: Rc<str>,
}

impl PartialEq for TypeVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeVar {}

impl std::hash::Hash for TypeVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl TypeVar {
    pub fn is_sequence(&self) -> bool {
        self.kind == Kind::Sequence
    }
}

/// Rigidity flag carried by every variable record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Unification variable; may be solved
    Free,
    /// Quantified by a `ForallType`; a placeholder awaiting instantiation
    Bound,
    /// Skolem: quantified, and its quantifier is currently under comparison
    Rigid,
}

#[derive(Debug, Clone)]
struct VarRecord {
    var: TypeVar,
    role: Role,
}

/// Arena of type variable records for one compilation unit
///
/// `alloc` is the only place variables come from, so identities are never
/// reused, even for structurally identical variables.
#[derive(Debug, Default)]
pub struct VarArena {
    records: Vec<VarRecord>,
}

impl VarArena {
    pub fn new() -> Self {
        VarArena::default()
    }

    pub fn alloc(&mut self, name: &str, kind: Kind, role: Role) -> TypeVar {
        let id = VarId(self.records.len() as u32);
        let var = TypeVar {
            id,
            kind,
            name: Rc::from(name),
        };
        self.records.push(VarRecord {
            var: var.clone(),
            role,
        });
        var
    }

    /// Allocate a free unification variable named after `hint`
    ///
    /// Fresh names look like `a$12`; a hint that is already a fresh name is
    /// stripped back to its base first.
    pub fn fresh(&mut self, hint: &str, kind: Kind) -> TypeVar {
        let base = hint.split('$').next().unwrap_or(hint);
        let base = if base.is_empty() { "t" } else { base };
        let name = format!("{}${}", base, self.records.len());
        self.alloc(&name, kind, Role::Free)
    }

    /// Allocate a quantified placeholder keeping its source name
    pub fn bound(&mut self, name: &str, kind: Kind) -> TypeVar {
        self.alloc(name, kind, Role::Bound)
    }

    pub fn role(&self, var: &TypeVar) -> Role {
        self.records
            .get(var.id.0 as usize)
            .map(|record| record.role)
            .unwrap_or(Role::Bound)
    }

    /// Change a variable's role, returning the previous one
    pub fn set_role(&mut self, var: &TypeVar, role: Role) -> Role {
        match self.records.get_mut(var.id.0 as usize) {
            Some(record) => std::mem::replace(&mut record.role, role),
            None => Role::Bound,
        }
    }

    pub fn is_free(&self, var: &TypeVar) -> bool {
        self.role(var) == Role::Free
    }

    pub fn is_rigid(&self, var: &TypeVar) -> bool {
        self.role(var) == Role::Rigid
    }

    pub fn get(&self, id: VarId) -> Option<&TypeVar> {
        self.records.get(id.0 as usize).map(|record| &record.var)
    }

    /// Identity the next allocated variable will get; every variable
    /// allocated from now on compares greater or equal
    pub fn mark(&self) -> VarId {
        VarId(self.records.len() as u32)
    }
}

/// A named nullary type
///
/// Nominal types (`int`, `object`) compare by name. Structural types carry a
/// requirement: anything exposing compatible members satisfies them.
#[derive(Debug, Clone, PartialEq)]
pub struct IndividualType {
    pub name: Rc<str>,
    pub members: BTreeMap<String, Type>,
    pub structural: bool,
}

impl IndividualType {
    pub fn member(&self, name: &str) -> Option<&Type> {
        self.members.get(name)
    }
}

/// A named type constructor such as `list` or the protocol `addable`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeConstructor {
    pub name: Rc<str>,
    /// Parameters, in application order; their kinds are the constructor's
    /// declared parameter kinds
    pub params: Vec<TypeVar>,
    /// Member table, mentioning `params`
    pub members: BTreeMap<String, Type>,
    pub structural: bool,
}

impl TypeConstructor {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn kind(&self) -> Kind {
        Kind::generic(self.params.iter().map(|p| p.kind.clone()))
    }

    /// A constructor whose only parameter is a sequence, such as `tuple`,
    /// is applied to any number of items at once
    pub fn is_variadic(&self) -> bool {
        matches!(self.params.as_slice(), [param] if param.kind == Kind::Sequence)
    }
}

/// A constructor applied to its arguments: `list[int]`, `addable[int, r]`
#[derive(Debug, Clone, PartialEq)]
pub struct GenericType {
    pub constructor: Rc<TypeConstructor>,
    pub args: Vec<Type>,
}

impl GenericType {
    /// The member table with the constructor's parameters replaced by `args`
    pub fn members(&self) -> BTreeMap<String, Type> {
        let mapping: Vec<(TypeVar, Type)> = self
            .constructor
            .params
            .iter()
            .cloned()
            .zip(self.args.iter().cloned())
            .collect();
        self.constructor
            .members
            .iter()
            .map(|(name, ty)| (name.clone(), ty.rename(&mapping)))
            .collect()
    }
}

/// Stack type: an optional rest variable at the bottom, then items
///
/// Items are stored bottom-to-top, so `items.last()` is the top of the stack.
/// The rest variable can only ever sit beneath every item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StackType {
    pub rest: Option<TypeVar>,
    pub items: Vec<Type>,
}

impl StackType {
    /// The empty, closed stack
    pub fn empty() -> Self {
        StackType::default()
    }

    /// Just a rest variable: any stack at all
    pub fn from_rest(rest: TypeVar) -> Self {
        StackType {
            rest: Some(rest),
            items: Vec::new(),
        }
    }

    pub fn new(rest: Option<TypeVar>, items: Vec<Type>) -> Self {
        StackType { rest, items }
    }

    /// Push a type onto the stack (returns new stack)
    pub fn push(mut self, ty: Type) -> Self {
        self.items.push(ty);
        self
    }

    /// Pop the top item (returns rest and top), if there is a concrete one
    pub fn pop(&self) -> Option<(StackType, Type)> {
        let (top, below) = self.items.split_last()?;
        Some((
            StackType {
                rest: self.rest.clone(),
                items: below.to_vec(),
            },
            top.clone(),
        ))
    }

    /// Number of concrete items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No rest variable and no items
    pub fn is_empty(&self) -> bool {
        self.rest.is_none() && self.items.is_empty()
    }
}

/// The type of a word or quotation
#[derive(Debug, Clone, PartialEq)]
pub struct StackEffect {
    pub input: StackType,
    pub output: StackType,
}

impl StackEffect {
    pub fn new(input: StackType, output: StackType) -> Self {
        StackEffect { input, output }
    }
}

/// A universally quantified type
#[derive(Debug, Clone, PartialEq)]
pub struct ForallType {
    pub params: Vec<TypeVar>,
    pub body: Type,
}

impl ForallType {
    pub fn kind(&self) -> Kind {
        if self.params.is_empty() {
            self.body.kind()
        } else {
            Kind::generic(self.params.iter().map(|p| p.kind.clone()))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Type variable of any kind
    Var(TypeVar),
    /// Nominal or structural nullary type
    Individual(Rc<IndividualType>),
    /// An unapplied type constructor
    Constructor(Rc<TypeConstructor>),
    /// A type constructor applied to arguments
    Apply(Rc<GenericType>),
    /// Stack type (kind `Sequence`)
    Stack(StackType),
    /// Stack effect; quotations on the stack have this type
    Effect(Rc<StackEffect>),
    /// Universally quantified type
    Forall(Rc<ForallType>),
}

impl Type {
    pub fn nominal(name: &str, members: BTreeMap<String, Type>) -> Type {
        Type::Individual(Rc::new(IndividualType {
            name: Rc::from(name),
            members,
            structural: false,
        }))
    }

    pub fn structural(members: BTreeMap<String, Type>) -> Type {
        Type::Individual(Rc::new(IndividualType {
            name: Rc::from(""),
            members,
            structural: true,
        }))
    }

    pub fn effect(input: StackType, output: StackType) -> Type {
        Type::Effect(Rc::new(StackEffect::new(input, output)))
    }

    pub fn forall(params: Vec<TypeVar>, body: Type) -> Type {
        Type::Forall(Rc::new(ForallType { params, body }))
    }

    pub fn apply(constructor: Rc<TypeConstructor>, args: Vec<Type>) -> Type {
        Type::Apply(Rc::new(GenericType { constructor, args }))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Type::Var(var) => var.kind.clone(),
            Type::Individual(_) | Type::Apply(_) | Type::Effect(_) => Kind::Individual,
            Type::Constructor(ctor) => ctor.kind(),
            Type::Stack(_) => Kind::Sequence,
            Type::Forall(forall) => forall.kind(),
        }
    }

    /// Is this the top item type `object`?
    pub fn is_object(&self) -> bool {
        matches!(self, Type::Individual(ind) if !ind.structural && &*ind.name == OBJECT)
    }

    /// Variables occurring free, in first-occurrence order
    pub fn free_variables(&self) -> Vec<TypeVar> {
        let mut out = Vec::new();
        self.collect_free(&mut Vec::new(), &mut out);
        out
    }

    pub fn occurs(&self, id: VarId) -> bool {
        self.free_variables().iter().any(|v| v.id == id)
    }

    fn collect_free(&self, bound: &mut Vec<VarId>, out: &mut Vec<TypeVar>) {
        match self {
            Type::Var(var) => {
                if !bound.contains(&var.id) && !out.contains(var) {
                    out.push(var.clone());
                }
            }
            Type::Individual(ind) => {
                for member in ind.members.values() {
                    member.collect_free(bound, out);
                }
            }
            // constructor members only mention the constructor's own parameters
            Type::Constructor(_) => {}
            Type::Apply(app) => {
                for arg in &app.args {
                    arg.collect_free(bound, out);
                }
            }
            Type::Stack(stack) => stack.collect_free(bound, out),
            Type::Effect(effect) => {
                effect.input.collect_free(bound, out);
                effect.output.collect_free(bound, out);
            }
            Type::Forall(forall) => {
                let depth = bound.len();
                bound.extend(forall.params.iter().map(|p| p.id));
                forall.body.collect_free(bound, out);
                bound.truncate(depth);
            }
        }
    }

    /// Rewrite variables through `lookup`, leaving quantified parameters of
    /// inner `Forall`s alone
    ///
    /// A rest variable mapped to a stack type is spliced into the enclosing
    /// stack, keeping the rest variable at the bottom.
    pub fn map_vars(&self, lookup: &dyn Fn(&TypeVar) -> Option<Type>) -> Type {
        self.map_vars_shadowed(lookup, &mut Vec::new())
    }

    fn map_vars_shadowed(
        &self,
        lookup: &dyn Fn(&TypeVar) -> Option<Type>,
        shadowed: &mut Vec<VarId>,
    ) -> Type {
        match self {
            Type::Var(var) => {
                if shadowed.contains(&var.id) {
                    return self.clone();
                }
                lookup(var).unwrap_or_else(|| self.clone())
            }
            Type::Individual(ind) => {
                if ind.members.is_empty() {
                    return self.clone();
                }
                Type::Individual(Rc::new(IndividualType {
                    name: ind.name.clone(),
                    members: ind
                        .members
                        .iter()
                        .map(|(k, v)| (k.clone(), v.map_vars_shadowed(lookup, shadowed)))
                        .collect(),
                    structural: ind.structural,
                }))
            }
            Type::Constructor(_) => self.clone(),
            Type::Apply(app) => Type::Apply(Rc::new(GenericType {
                constructor: app.constructor.clone(),
                args: app
                    .args
                    .iter()
                    .map(|arg| arg.map_vars_shadowed(lookup, shadowed))
                    .collect(),
            })),
            Type::Stack(stack) => Type::Stack(stack.map_vars_shadowed(lookup, shadowed)),
            Type::Effect(effect) => Type::Effect(Rc::new(StackEffect {
                input: effect.input.map_vars_shadowed(lookup, shadowed),
                output: effect.output.map_vars_shadowed(lookup, shadowed),
            })),
            Type::Forall(forall) => {
                let depth = shadowed.len();
                shadowed.extend(forall.params.iter().map(|p| p.id));
                let body = forall.body.map_vars_shadowed(lookup, shadowed);
                shadowed.truncate(depth);
                Type::Forall(Rc::new(ForallType {
                    params: forall.params.clone(),
                    body,
                }))
            }
        }
    }

    /// Replace variables according to an explicit mapping
    pub fn rename(&self, mapping: &[(TypeVar, Type)]) -> Type {
        if mapping.is_empty() {
            return self.clone();
        }
        self.map_vars(&|var| {
            mapping
                .iter()
                .find(|(from, _)| from == var)
                .map(|(_, to)| to.clone())
        })
    }
}

impl StackType {
    fn collect_free(&self, bound: &mut Vec<VarId>, out: &mut Vec<TypeVar>) {
        if let Some(rest) = &self.rest {
            Type::Var(rest.clone()).collect_free(bound, out);
        }
        for item in &self.items {
            item.collect_free(bound, out);
        }
    }

    fn map_vars_shadowed(
        &self,
        lookup: &dyn Fn(&TypeVar) -> Option<Type>,
        shadowed: &mut Vec<VarId>,
    ) -> StackType {
        let items: Vec<Type> = self
            .items
            .iter()
            .map(|item| item.map_vars_shadowed(lookup, shadowed))
            .collect();
        let rest = match &self.rest {
            Some(rest) if !shadowed.contains(&rest.id) => rest,
            _ => {
                return StackType {
                    rest: self.rest.clone(),
                    items,
                };
            }
        };
        match lookup(rest) {
            Some(Type::Stack(below)) => {
                let mut spliced = below.items;
                spliced.extend(items);
                StackType {
                    rest: below.rest,
                    items: spliced,
                }
            }
            Some(Type::Var(var)) if var.is_sequence() => StackType {
                rest: Some(var),
                items,
            },
            _ => StackType {
                rest: self.rest.clone(),
                items,
            },
        }
    }

    pub fn free_variables(&self) -> Vec<TypeVar> {
        let mut out = Vec::new();
        self.collect_free(&mut Vec::new(), &mut out);
        out
    }

    pub fn map_vars(&self, lookup: &dyn Fn(&TypeVar) -> Option<Type>) -> StackType {
        self.map_vars_shadowed(lookup, &mut Vec::new())
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, stack: &StackType) -> fmt::Result {
    let mut first = true;
    if let Some(rest) = &stack.rest {
        write!(f, "*{}", rest.name)?;
        first = false;
    }
    for item in &stack.items {
        if !first {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
        first = false;
    }
    Ok(())
}

impl fmt::Display for StackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<empty>");
        }
        write_items(f, self)
    }
}

impl fmt::Display for StackEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        write_items(f, &self.input)?;
        if self.input.rest.is_some() || !self.input.items.is_empty() {
            write!(f, " ")?;
        }
        write!(f, "--")?;
        if self.output.rest.is_some() || !self.output.items.is_empty() {
            write!(f, " ")?;
        }
        write_items(f, &self.output)?;
        write!(f, ")")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(var) if var.is_sequence() => write!(f, "*{}", var.name),
            Type::Var(var) => write!(f, "{}", var.name),
            Type::Individual(ind) if ind.structural && ind.name.is_empty() => {
                write!(f, "{{")?;
                for (i, (name, ty)) in ind.members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "}}")
            }
            Type::Individual(ind) => write!(f, "{}", ind.name),
            Type::Constructor(ctor) => write!(f, "{}", ctor.name),
            Type::Apply(app) if app.constructor.is_variadic() => {
                write!(f, "{}[", app.constructor.name)?;
                match app.args.as_slice() {
                    [Type::Stack(stack)] if stack.rest.is_none() => {
                        for (i, item) in stack.items.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", item)?;
                        }
                    }
                    args => {
                        for arg in args {
                            write!(f, "{}", arg)?;
                        }
                    }
                }
                write!(f, "]")
            }
            Type::Apply(app) => {
                write!(f, "{}[", app.constructor.name)?;
                for (i, arg) in app.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "]")
            }
            Type::Stack(stack) => write!(f, "{}", stack),
            Type::Effect(effect) => write!(f, "{}", effect),
            Type::Forall(forall) => {
                write!(f, "forall")?;
                for param in &forall.params {
                    write!(f, " {}", Type::Var(param.clone()))?;
                }
                write!(f, ". {}", forall.body)
            }
        }
    }
}
