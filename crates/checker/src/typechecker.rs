//! Stack-effect inference for Concat programs
//!
//! Every word is a function from stacks to stacks. The checker threads a
//! stack type through each body from left to right: a literal pushes its
//! type, a call requires the current stack to be a subtype of the callee's
//! input and replaces it with the callee's output, a quotation pushes the
//! effect inferred for its body.
//!
//! Annotated words are checked against their declaration, with the
//! declaration's type variables rigid while the body is checked. Unannotated
//! words are inferred and then generalized over the variables nothing else
//! constrains. Bodies are checked in scopes of their own, so nested
//! definitions stay local to the body that holds them. The first error ends
//! the check.
//!
//! Classes declare a nominal type (a constructor when they take
//! parameters), a word building an instance from the fields, and members
//! reached with `.name`.

use crate::annotations::{lower, lower_closed};
use crate::ast::{ClassDef, Item, Literal, Program, Span, TypeExpr, Word, WordDef};
use crate::builtins::{Primitives, install_prelude, lower_signature};
use crate::config::CheckerConfig;
use crate::env::TypeEnvironment;
use crate::error::{CheckResult, InternalError, TypeError};
use crate::kinds::Kind;
use crate::protocols::{ProtocolTable, operator};
use crate::signature::parse_signature;
use crate::subsumption::Solver;
use crate::types::{ForallType, Role, StackEffect, StackType, Type, TypeConstructor, TypeVar};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;
use std::rc::Rc;
use tracing::{debug, info, trace};

/// Types found for a program
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypedProgram {
    pub definitions: Vec<TypedDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<TypedClass>,
    /// Stacks through top-level code, in program order
    pub code: Vec<TypedWord>,
}

impl TypedProgram {
    pub fn definition(&self, name: &str) -> Option<&TypedDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn class(&self, name: &str) -> Option<&TypedClass> {
        self.classes.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TypedDefinition {
    pub name: String,
    /// Declared or inferred type, after any decorators
    #[serde(rename = "type", serialize_with = "display")]
    pub ty: Type,
    pub inferred: bool,
    pub words: Vec<TypedWord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypedClass {
    pub name: String,
    /// Type of an instance
    #[serde(rename = "type", serialize_with = "display")]
    pub ty: Type,
    /// Type of the word that builds an instance
    #[serde(serialize_with = "display")]
    pub constructor: Type,
    pub members: Vec<TypedDefinition>,
}

/// The stack as it is after a word
///
/// Words with bodies of their own (quotations, list and tuple elements,
/// nested definitions) keep the stacks through those bodies as children.
#[derive(Debug, Clone, Serialize)]
pub struct TypedWord {
    pub word: String,
    pub span: Span,
    #[serde(serialize_with = "display")]
    pub stack: StackType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TypedWord>,
}

fn display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Stacks recorded while checking one body, resolved once it is done
pub(crate) type Trace = Vec<TypedWord>;

/// A declared class and the members known for it so far
#[derive(Debug, Clone)]
struct ClassInfo {
    params: Vec<TypeVar>,
    instance: Type,
    /// Set for classes with parameters
    constructor: Option<Rc<TypeConstructor>>,
    members: BTreeMap<String, Type>,
}

pub struct TypeChecker {
    pub(crate) solver: Solver,
    pub(crate) env: TypeEnvironment,
    pub(crate) protocols: ProtocolTable,
    pub(crate) prims: Primitives,
    pub(crate) config: CheckerConfig,
    /// Words defined by the program, which shadow builtin special cases
    defined: HashSet<String>,
    classes: HashMap<String, ClassInfo>,
}

impl TypeChecker {
    /// A checker with the prelude and the words and types of `config`
    pub fn new(config: CheckerConfig) -> CheckResult<Self> {
        let mut solver = Solver::new();
        let mut env = TypeEnvironment::new();
        let protocols = ProtocolTable::new(&mut solver.vars);
        let prims = install_prelude(&mut solver, &mut env, &protocols)?;
        let mut checker = TypeChecker {
            solver,
            env,
            protocols,
            prims,
            config,
            defined: HashSet::new(),
            classes: HashMap::new(),
        };
        checker.install_config()?;
        Ok(checker)
    }

    fn install_config(&mut self) -> CheckResult<()> {
        let types = self.config.types.clone();
        for decl in &types {
            self.env
                .define_type(&decl.name, Type::nominal(&decl.name, BTreeMap::new()));
        }
        for decl in &types {
            let mut members = BTreeMap::new();
            for (member, signature) in &decl.members {
                let name = format!("{}.{}", decl.name, member);
                let ty = lower_signature(&mut self.solver.vars, &self.env, &name, signature)?;
                members.insert(member.clone(), ty);
            }
            self.solver.members.declare(&decl.name, members);
        }
        let words = self.config.words.clone();
        for word in &words {
            let ty = lower_signature(&mut self.solver.vars, &self.env, &word.name, &word.signature)?;
            self.env.bind(&word.name, ty);
        }
        debug!(
            types = types.len(),
            words = words.len(),
            "installed configured types and words"
        );
        Ok(())
    }

    /// The type a word name currently has, with solutions applied
    pub fn word_type(&self, name: &str) -> Option<Type> {
        self.env.lookup(name).map(|ty| self.solver.apply(ty))
    }

    /// Parse and lower a signature against the names this checker knows
    pub fn parse_type(&mut self, text: &str) -> Result<Type, String> {
        let expr = parse_signature(text)?;
        lower(&mut self.solver.vars, &self.env, &expr).map_err(|e| e.to_string())
    }

    /// Check a whole program, stopping at the first error
    pub fn check_program(&mut self, program: &Program) -> CheckResult<TypedProgram> {
        // Class names first, so any signature may mention them
        for item in &program.items {
            if let Item::Class(class) = item {
                self.declare_class(class);
            }
        }
        // Declared signatures, class interfaces and imports are visible
        // everywhere
        for item in &program.items {
            match item {
                Item::Definition(def) => self.declare_definition(def)?,
                Item::Class(class) => self.declare_class_interface(class)?,
                Item::Import { module, names, .. } => {
                    self.defined.extend(names.iter().cloned());
                    if names.is_empty() {
                        self.defined.insert(module.clone());
                    }
                }
                Item::Code { .. } => {}
            }
        }

        let mut typed = TypedProgram::default();
        for item in &program.items {
            match item {
                Item::Definition(def) => {
                    let definition = self.check_definition(def)?;
                    typed.definitions.push(definition);
                }
                Item::Class(class) => {
                    let class = self.check_class(class)?;
                    typed.classes.push(class);
                }
                Item::Import { module, names, span } => self.check_import(module, names, *span)?,
                Item::Code { body, .. } => {
                    let mut trace = Trace::new();
                    self.infer_words(body, StackType::empty(), &mut trace)?;
                    typed.code.extend(self.resolve_words(trace));
                }
            }
        }
        info!(
            definitions = typed.definitions.len(),
            classes = typed.classes.len(),
            "program type checked"
        );
        Ok(typed)
    }

    fn check_import(&mut self, module: &str, names: &[String], span: Span) -> CheckResult<()> {
        let bound: Vec<&str> = if names.is_empty() {
            vec![module]
        } else {
            names.iter().map(String::as_str).collect()
        };
        for name in bound {
            let ty = lower_signature(&mut self.solver.vars, &self.env, name, "(*s -- *s object)")
                .map_err(|e| e.with_span_if_missing(span))?;
            self.env.bind(name, ty);
        }
        Ok(())
    }

    /// Run `f` in a new innermost scope, which is gone again afterwards
    /// whether or not `f` succeeds
    pub(crate) fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> CheckResult<T>,
    ) -> CheckResult<T> {
        self.env.push_scope();
        trace!(depth = self.env.depth(), "entered scope");
        let result = f(self);
        self.env.pop_scope()?;
        result
    }

    /// Make a definition's name known, binding its declared type if it has
    /// one
    fn declare_definition(&mut self, def: &WordDef) -> CheckResult<()> {
        self.defined.insert(def.name.clone());
        if let Some(signature) = &def.signature {
            let ty = lower(&mut self.solver.vars, &self.env, signature)
                .map_err(|e| e.with_span_if_missing(def.span))?;
            self.env.bind(&def.name, ty);
        }
        Ok(())
    }

    fn check_definition(&mut self, def: &WordDef) -> CheckResult<TypedDefinition> {
        debug!(word = %def.name, annotated = def.signature.is_some(), "checking definition");
        let mut trace = Trace::new();
        let (ty, inferred) = if def.signature.is_some() {
            let declared = self
                .env
                .lookup(&def.name)
                .cloned()
                .ok_or_else(|| InternalError::new(format!("signature of '{}' was not bound", def.name)))?;
            self.check_against_declaration(def, &declared, &mut trace)?;
            (declared, false)
        } else {
            (self.infer_definition(def, &mut trace)?, true)
        };
        let ty = self.decorate(def, ty)?;
        self.env.bind(&def.name, ty.clone());
        Ok(TypedDefinition {
            name: def.name.clone(),
            ty,
            inferred,
            words: self.resolve_words(trace),
        })
    }

    /// Check a body against the declared type, with the declared type's
    /// variables held rigid
    fn check_against_declaration(
        &mut self,
        def: &WordDef,
        declared: &Type,
        trace: &mut Trace,
    ) -> CheckResult<()> {
        let (params, effect) = split_effect(declared).ok_or_else(|| {
            TypeError::kind_error(format!(
                "the declared type of {} ({}) is not a stack effect",
                def.name, declared
            ))
            .with_span_if_missing(def.span)
        })?;
        let previous = self.make_rigid(&params);
        let snapshot = self.solver.subst.snapshot();
        let mark = self.solver.vars.mark();
        let result = self.scoped(|checker| {
            let inferred = checker.infer_words(&def.body, effect.input.clone(), trace)?;
            let inferred_effect = StackEffect::new(effect.input.clone(), inferred.clone());
            checker
                .solver
                .constrain_stacks(&inferred, &effect.output)
                .map_err(|err| {
                    err.map_type(|err| {
                        err.context(format!(
                            "declared type of {} ({}) is not compatible with inferred type ({})",
                            def.name,
                            declared,
                            checker.solver.apply_effect(&inferred_effect)
                        ))
                        .with_span_if_missing(def.span)
                    })
                })?;
            checker
                .solver
                .check_escape(snapshot, mark, &params)
                .map_err(|e| e.with_span_if_missing(def.span))
        });
        self.restore_roles(&params, previous);
        result
    }

    fn infer_definition(&mut self, def: &WordDef, trace: &mut Trace) -> CheckResult<Type> {
        let input = self.solver.fresh_stack("i");
        let output = self.solver.fresh_stack("o");
        self.scoped(|checker| {
            // monomorphic placeholder so the body may call the word recursively
            checker
                .env
                .bind(&def.name, Type::effect(input.clone(), output.clone()));
            let inferred = checker.infer_words(&def.body, input.clone(), trace)?;
            checker
                .solver
                .constrain_stacks(&inferred, &output)
                .map_err(|e| e.with_span_if_missing(def.span))
        })?;

        let effect = self.solver.apply(&Type::effect(input, output));
        let ty = self.generalize(&effect);
        debug!(word = %def.name, ty = %ty, "inferred type");
        Ok(ty)
    }

    /// Apply a definition's decorators, innermost first
    ///
    /// The decorators run as ordinary words on a stack holding only the
    /// decorated word, and must leave exactly one item: the word's new type.
    fn decorate(&mut self, def: &WordDef, ty: Type) -> CheckResult<Type> {
        if def.decorators.is_empty() {
            return Ok(ty);
        }
        let mut trace = Trace::new();
        let stack = self.infer_words(&def.decorators, StackType::empty().push(ty), &mut trace)?;
        let stack = self.solver.apply_stack(&stack);
        let decorated = match stack.pop() {
            Some((rest, top)) if rest.rest.is_none() && rest.is_empty() => top,
            _ => {
                return Err(TypeError::arity(
                    1,
                    stack.len(),
                    format!(
                        "decorators of {} must leave exactly one item, but leave {}",
                        def.name, stack
                    ),
                )
                .with_span_if_missing(def.span)
                .into());
            }
        };
        let decorated = match decorated {
            Type::Effect(_) => self.generalize(&decorated),
            other => other,
        };
        debug!(word = %def.name, ty = %decorated, "decorated");
        Ok(decorated)
    }

    /// Quantify `ty` over its free variables that the environment does not
    /// mention, giving them readable names
    fn generalize(&mut self, ty: &Type) -> Type {
        let env_free = self.env.free_variables(&self.solver.subst);
        let generalizable: Vec<TypeVar> = ty
            .free_variables()
            .into_iter()
            .filter(|v| self.solver.vars.is_free(v) && !env_free.contains(v))
            .collect();
        if generalizable.is_empty() {
            return ty.clone();
        }
        let mut names = VarNames::default();
        let mapping: Vec<(TypeVar, Type)> = generalizable
            .iter()
            .map(|var| {
                let name = names.next(&var.kind);
                (var.clone(), Type::Var(self.solver.vars.bound(&name, var.kind.clone())))
            })
            .collect();
        let params = mapping
            .iter()
            .filter_map(|(_, ty)| match ty {
                Type::Var(var) => Some(var.clone()),
                _ => None,
            })
            .collect();
        Type::forall(params, ty.rename(&mapping))
    }

    pub(crate) fn make_rigid(&mut self, params: &[TypeVar]) -> Vec<Role> {
        params
            .iter()
            .map(|p| self.solver.vars.set_role(p, Role::Rigid))
            .collect()
    }

    pub(crate) fn restore_roles(&mut self, params: &[TypeVar], previous: Vec<Role>) {
        for (param, role) in params.iter().zip(previous) {
            self.solver.vars.set_role(param, role);
        }
    }

    /// Define a class's type name
    fn declare_class(&mut self, class: &ClassDef) {
        self.defined.insert(class.name.clone());
        let params: Vec<TypeVar> = class
            .type_params
            .iter()
            .map(|p| self.solver.vars.bound(&p.name, p.kind.clone()))
            .collect();
        let (instance, constructor) = if params.is_empty() {
            let instance = Type::nominal(&class.name, BTreeMap::new());
            self.env.define_type(&class.name, instance.clone());
            (instance, None)
        } else {
            let ctor = Rc::new(TypeConstructor {
                name: Rc::from(class.name.as_str()),
                params: params.clone(),
                members: BTreeMap::new(),
                structural: false,
            });
            self.env
                .define_type(&class.name, Type::Constructor(ctor.clone()));
            let args = params.iter().cloned().map(Type::Var).collect();
            (Type::apply(ctor.clone(), args), Some(ctor))
        };
        self.classes.insert(
            class.name.clone(),
            ClassInfo {
                params,
                instance,
                constructor,
                members: BTreeMap::new(),
            },
        );
    }

    fn class_info(&self, name: &str) -> CheckResult<ClassInfo> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| InternalError::new(format!("class '{}' was not declared", name)).into())
    }

    /// Make a class's parameters usable as type names in the current scope
    fn define_class_params(&mut self, info: &ClassInfo) {
        for param in &info.params {
            self.env.define_type(&param.name, Type::Var(param.clone()));
        }
    }

    /// Lower a class's fields and member signatures, and bind the word that
    /// builds an instance
    fn declare_class_interface(&mut self, class: &ClassDef) -> CheckResult<()> {
        let info = self.class_info(&class.name)?;
        let (fields, members) = self.scoped(|checker| {
            checker.define_class_params(&info);
            let mut fields = Vec::with_capacity(class.fields.len());
            for field in &class.fields {
                let ty = lower_closed(&mut checker.solver.vars, &checker.env, &field.ty)
                    .map_err(|e| e.with_span_if_missing(field.span))?;
                if !ty.kind().is_item() {
                    return Err(TypeError::kind_error(format!(
                        "field {} of {} cannot have type {}, which has kind {}",
                        field.name,
                        class.name,
                        ty,
                        ty.kind()
                    ))
                    .with_span_if_missing(field.span)
                    .into());
                }
                fields.push((field.name.clone(), ty));
            }
            let mut members = BTreeMap::new();
            for member in &class.members {
                if let Some(signature) = &member.signature {
                    let ty = lower(&mut checker.solver.vars, &checker.env, signature)
                        .map_err(|e| e.with_span_if_missing(member.span))?;
                    members.insert(member.name.clone(), ty);
                }
            }
            Ok((fields, members))
        })?;

        let s = self.solver.vars.bound("s", Kind::Sequence);
        let input = fields
            .iter()
            .fold(StackType::from_rest(s.clone()), |stack, (_, ty)| stack.push(ty.clone()));
        let output = StackType::from_rest(s.clone()).push(info.instance.clone());
        let mut params = vec![s];
        params.extend(info.params.iter().cloned());
        let constructor = Type::forall(params, Type::effect(input, output));
        debug!(class = %class.name, constructor = %constructor, "declared class");
        self.env.bind(&class.name, constructor);

        let mut interface: BTreeMap<String, Type> = fields.into_iter().collect();
        interface.extend(members);
        self.register_members(&class.name, interface)
    }

    /// Add to the members an instance of `class` has
    fn register_members(&mut self, class: &str, members: BTreeMap<String, Type>) -> CheckResult<()> {
        let info = self
            .classes
            .get_mut(class)
            .ok_or_else(|| InternalError::new(format!("class '{}' was not declared", class)))?;
        info.members.extend(members.clone());
        match &info.constructor {
            Some(ctor) => self.solver.members.declare_constructor(Rc::new(TypeConstructor {
                members: info.members.clone(),
                ..(**ctor).clone()
            })),
            None => self.solver.members.declare(class, members),
        }
        Ok(())
    }

    /// Check a class's member words, with `self` pushing the receiver
    fn check_class(&mut self, class: &ClassDef) -> CheckResult<TypedClass> {
        debug!(class = %class.name, members = class.members.len(), "checking class");
        let info = self.class_info(&class.name)?;
        let members = self.scoped(|checker| {
            checker.define_class_params(&info);
            let s = checker.solver.vars.bound("s", Kind::Sequence);
            let receiver = Type::effect(
                StackType::from_rest(s.clone()),
                StackType::from_rest(s.clone()).push(info.instance.clone()),
            );
            checker.env.bind("self", Type::forall(vec![s], receiver));
            for member in &class.members {
                if let Some(declared) = info.members.get(&member.name) {
                    if member.signature.is_some() {
                        checker.env.bind(&member.name, declared.clone());
                    }
                }
            }

            let mut typed = Vec::with_capacity(class.members.len());
            for member in &class.members {
                let definition = checker.check_definition(member)?;
                let mut registered = BTreeMap::new();
                registered.insert(member.name.clone(), definition.ty.clone());
                checker.register_members(&class.name, registered)?;
                typed.push(definition);
            }
            Ok(typed)
        })?;
        let constructor = self.env.require(&class.name)?.clone();
        Ok(TypedClass {
            name: class.name.clone(),
            ty: info.instance,
            constructor,
            members,
        })
    }

    /// Thread `stack` through `words`, recording the stack after each one
    pub(crate) fn infer_words(
        &mut self,
        words: &[Word],
        stack: StackType,
        trace: &mut Trace,
    ) -> CheckResult<StackType> {
        let mut stack = stack;
        for word in words {
            let mut children = Trace::new();
            stack = self
                .infer_word(word, stack, &mut children)
                .map_err(|e| e.with_span_if_missing(word.span()))?;
            trace!(word = %word.describe(), %stack, "after word");
            trace.push(TypedWord {
                word: word.describe(),
                span: word.span(),
                stack: stack.clone(),
                children,
            });
        }
        Ok(stack)
    }

    fn infer_word(
        &mut self,
        word: &Word,
        stack: StackType,
        trace: &mut Trace,
    ) -> CheckResult<StackType> {
        match word {
            Word::Literal { value, .. } => Ok(stack.push(self.literal_type(value))),
            Word::Call { name, .. } => self.infer_call(name, stack),
            Word::Push { name, .. } => {
                let ty = match operator(name).filter(|_| !self.defined.contains(name)) {
                    Some(op) => self.protocols.signature(&mut self.solver.vars, op)?,
                    None => self.env.require(name)?.clone(),
                };
                Ok(stack.push(ty))
            }
            Word::Quotation {
                annotation, body, ..
            } => {
                let ty = match annotation {
                    Some(annotation) => self.check_annotated_quotation(annotation, body, trace)?,
                    None => {
                        let input = self.solver.fresh_stack("q");
                        let output =
                            self.scoped(|checker| checker.infer_words(body, input.clone(), trace))?;
                        Type::effect(input, output)
                    }
                };
                Ok(stack.push(ty))
            }
            Word::Attribute { name, .. } => self.infer_attribute(name, stack),
            Word::Cast { target, .. } => {
                let target = lower_closed(&mut self.solver.vars, &self.env, target)?;
                if !target.kind().is_item() {
                    return Err(TypeError::kind_error(format!(
                        "cannot cast to {}, which has kind {}",
                        target,
                        target.kind()
                    ))
                    .into());
                }
                let (rest, _) = self.pop(stack)?;
                Ok(rest.push(target))
            }
            Word::List { elements, .. } => self.infer_list(elements, stack, trace),
            Word::Tuple { elements, .. } => {
                let items = self.infer_elements(elements, &stack, "tuple", trace)?;
                let items = items.iter().map(|ty| self.solver.apply(ty)).collect();
                Ok(self.solver.apply_stack(&stack).push(self.prims.tuple_of(items)))
            }
            Word::Definition(def) => {
                self.declare_definition(def)?;
                let definition = self.check_definition(def)?;
                trace.extend(definition.words);
                Ok(stack)
            }
        }
    }

    fn literal_type(&self, value: &Literal) -> Type {
        match value {
            Literal::Int(_) => self.prims.int.clone(),
            Literal::Float(_) => self.prims.float.clone(),
            Literal::Str(_) => self.prims.string.clone(),
            Literal::Bool(_) => self.prims.boolean.clone(),
            Literal::None => self.prims.none.clone(),
        }
    }

    fn infer_call(&mut self, name: &str, stack: StackType) -> CheckResult<StackType> {
        if !self.defined.contains(name) {
            if let Some(op) = operator(name) {
                let (rest, other) = self.pop(stack)?;
                let (rest, first) = self.pop(rest)?;
                let result = self.protocols.resolve(&mut self.solver, op, &first, &other)?;
                return Ok(rest.push(result));
            }
            if let Some(result) = self.infer_combinator(name, &stack)? {
                return Ok(result);
            }
        }
        let ty = self.env.require(name)?.clone();
        self.apply_word(name, &ty, stack)
    }

    /// Apply a word's type to the stack: the stack must be a subtype of the
    /// word's input, and is replaced by its output
    pub(crate) fn apply_word(
        &mut self,
        name: &str,
        ty: &Type,
        stack: StackType,
    ) -> CheckResult<StackType> {
        let ty = self.solver.apply(ty);
        let ty = self.solver.instantiate(&ty);
        let Type::Effect(effect) = ty else {
            return Err(InternalError::new(format!(
                "word '{}' has type {}, which is not a stack effect",
                name, ty
            ))
            .into());
        };
        self.solver.constrain_stacks(&stack, &effect.input)?;
        Ok(self.solver.apply_stack(&effect.output))
    }

    fn check_annotated_quotation(
        &mut self,
        annotation: &TypeExpr,
        body: &[Word],
        trace: &mut Trace,
    ) -> CheckResult<Type> {
        let declared = lower(&mut self.solver.vars, &self.env, annotation)?;
        let (params, effect) = split_effect(&declared).ok_or_else(|| {
            TypeError::kind_error(format!(
                "a quotation cannot have type {}, which is not a stack effect",
                declared
            ))
        })?;
        let previous = self.make_rigid(&params);
        let snapshot = self.solver.subst.snapshot();
        let mark = self.solver.vars.mark();
        let result = self.scoped(|checker| {
            let output = checker.infer_words(body, effect.input.clone(), trace)?;
            checker
                .solver
                .constrain_stacks(&output, &effect.output)
                .map_err(|err| {
                    err.map_type(|err| {
                        err.context(format!("quotation does not have declared type {}", declared))
                    })
                })?;
            checker.solver.check_escape(snapshot, mark, &params)
        });
        self.restore_roles(&params, previous);
        result.map(|()| declared)
    }

    fn infer_attribute(&mut self, name: &str, stack: StackType) -> CheckResult<StackType> {
        let (rest, receiver) = self.pop(stack)?;
        let receiver = self.solver.apply(&receiver);
        let unknown = matches!(&receiver, Type::Var(var) if self.solver.vars.is_free(var));
        match self.solver.members.member(&receiver, name) {
            Some(member) if !unknown => {
                let member = self.solver.instantiate(&member);
                let Type::Effect(effect) = &member else {
                    // a plain attribute is pushed as is
                    return Ok(rest.push(member));
                };
                let effect = self.open_effect(effect);
                self.solver.constrain_stacks(&rest, &effect.input)?;
                Ok(self.solver.apply_stack(&effect.output))
            }
            _ if self.config.gradual_attributes && (receiver.is_object() || unknown) => {
                Ok(rest.push(self.prims.object.clone()))
            }
            _ => Err(TypeError::subtype(
                &receiver,
                &Type::structural(BTreeMap::new()),
                format!(
                    "object of type {} does not have member '{}'",
                    receiver, name
                ),
            )
            .in_member(name)
            .into()),
        }
    }

    /// Give an effect with no rest variable a shared fresh one, so it applies
    /// on top of whatever the stack holds
    fn open_effect(&mut self, effect: &StackEffect) -> StackEffect {
        if effect.input.rest.is_some() || effect.output.rest.is_some() {
            return effect.clone();
        }
        let rest = self.solver.fresh("s", Kind::Sequence);
        StackEffect::new(
            StackType::new(Some(rest.clone()), effect.input.items.clone()),
            StackType::new(Some(rest), effect.output.items.clone()),
        )
    }

    /// Check each element of a list or tuple literal against `stack`; each
    /// must leave exactly one item on it
    fn infer_elements(
        &mut self,
        elements: &[Vec<Word>],
        stack: &StackType,
        what: &str,
        trace: &mut Trace,
    ) -> CheckResult<Vec<Type>> {
        let mut types = Vec::with_capacity(elements.len());
        for element in elements {
            let slot = Type::Var(self.solver.fresh("e", Kind::Item));
            let output = self.infer_words(element, stack.clone(), trace)?;
            let expected = stack.clone().push(slot.clone());
            self.solver.constrain_stacks(&output, &expected).map_err(|err| {
                err.map_type(|err| {
                    err.context(format!("each {} element must leave exactly one item", what))
                })
            })?;
            types.push(self.solver.apply(&slot));
        }
        Ok(types)
    }

    fn infer_list(
        &mut self,
        elements: &[Vec<Word>],
        stack: StackType,
        trace: &mut Trace,
    ) -> CheckResult<StackType> {
        let mut element_type: Option<Type> = None;
        for ty in self.infer_elements(elements, &stack, "list", trace)? {
            element_type = Some(match element_type {
                None => ty,
                Some(joined) => self.join(&joined, &ty)?,
            });
        }
        let element_type = match element_type {
            Some(ty) => ty,
            None => Type::Var(self.solver.fresh("e", Kind::Item)),
        };
        Ok(self.solver.apply_stack(&stack).push(self.prims.list_of(element_type)))
    }

    /// The least of `a` and `b` that both are subtypes of, falling back to
    /// `object`
    fn join(&mut self, a: &Type, b: &Type) -> CheckResult<Type> {
        if self.solver.constrain(a, b).is_ok() {
            return Ok(self.solver.apply(b));
        }
        if self.solver.constrain(b, a).is_ok() {
            return Ok(self.solver.apply(a));
        }
        Ok(self.prims.object.clone())
    }

    /// Split off the top item, requiring one to be there
    pub(crate) fn pop(&mut self, stack: StackType) -> CheckResult<(StackType, Type)> {
        let stack = self.require_items(stack, 1)?;
        stack
            .pop()
            .ok_or_else(|| InternalError::new("required item missing from the stack").into())
    }

    /// Make sure `stack` has at least `count` concrete items, solving its
    /// rest variable if need be
    pub(crate) fn require_items(&mut self, stack: StackType, count: usize) -> CheckResult<StackType> {
        let stack = self.solver.apply_stack(&stack);
        if stack.len() >= count {
            return Ok(stack);
        }
        let mut expected = self.solver.fresh_stack("s");
        for _ in 0..count {
            expected = expected.push(Type::Var(self.solver.fresh("a", Kind::Item)));
        }
        self.solver.constrain_stacks(&stack, &expected)?;
        Ok(self.solver.apply_stack(&expected))
    }

    /// Apply the solutions found so far to every recorded stack
    fn resolve_words(&self, words: Trace) -> Vec<TypedWord> {
        words
            .into_iter()
            .map(|TypedWord { word, span, stack, children }| TypedWord {
                word,
                span,
                stack: self.solver.apply_stack(&stack),
                children: self.resolve_words(children),
            })
            .collect()
    }
}

/// Split a possibly quantified effect type into its parameters and effect
pub(crate) fn split_effect(ty: &Type) -> Option<(Vec<TypeVar>, StackEffect)> {
    match ty {
        Type::Effect(effect) => Some((Vec::new(), (**effect).clone())),
        Type::Forall(forall) => {
            let ForallType { params, body } = &**forall;
            let (mut inner, effect) = split_effect(body)?;
            let mut all = params.clone();
            all.append(&mut inner);
            Some((all, effect))
        }
        _ => None,
    }
}

/// Readable names for generalized variables: `s t u ...` for rest
/// variables, `a b c ...` for items
#[derive(Default)]
struct VarNames {
    rests: usize,
    items: usize,
}

impl VarNames {
    fn next(&mut self, kind: &Kind) -> String {
        let (counter, alphabet) = if *kind == Kind::Sequence {
            (&mut self.rests, "stuvw")
        } else {
            (&mut self.items, "abcdefgh")
        };
        let n = *counter;
        *counter += 1;
        match alphabet.chars().nth(n) {
            Some(c) => c.to_string(),
            None => format!("{}{}", alphabet.chars().next().unwrap_or('t'), n),
        }
    }
}

/// Check `program` with a fresh checker and the default configuration
pub fn check_program(program: &Program) -> CheckResult<TypedProgram> {
    let config = CheckerConfig::default_config().map_err(InternalError::new)?;
    TypeChecker::new(config)?.check_program(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassDef, Field, TypeParam};
    use crate::config::WordDecl;
    use crate::diagnostics::Diagnostic;
    use crate::error::CheckError;

    fn at(column: usize) -> Span {
        Span::new(1, column)
    }

    fn call(name: &str) -> Word {
        Word::call(name, at(0))
    }

    fn int(value: i64) -> Word {
        Word::int(value, at(0))
    }

    fn quote(body: Vec<Word>) -> Word {
        Word::quotation(body, at(0))
    }

    fn cast(target: &str) -> Word {
        Word::Cast {
            target: TypeExpr::named(target),
            span: at(0),
        }
    }

    fn attribute(name: &str) -> Word {
        Word::Attribute {
            name: name.to_string(),
            span: at(0),
        }
    }

    fn none() -> Word {
        Word::Literal {
            value: Literal::None,
            span: at(0),
        }
    }

    fn word_def(name: &str, signature: Option<&str>, body: Vec<Word>) -> WordDef {
        WordDef::new(
            name,
            signature.map(|text| parse_signature(text).unwrap()),
            body,
            at(0),
        )
    }

    fn define(name: &str, signature: Option<&str>, body: Vec<Word>) -> Item {
        Item::Definition(word_def(name, signature, body))
    }

    fn nested(name: &str, signature: Option<&str>, body: Vec<Word>) -> Word {
        Word::Definition(word_def(name, signature, body))
    }

    fn code(body: Vec<Word>) -> Item {
        Item::Code { body, span: at(0) }
    }

    fn check(items: Vec<Item>) -> CheckResult<TypedProgram> {
        check_program(&Program { items })
    }

    fn check_with(config: CheckerConfig, items: Vec<Item>) -> CheckResult<TypedProgram> {
        TypeChecker::new(config)
            .unwrap()
            .check_program(&Program { items })
    }

    /// The stack left by the last top-level word
    fn final_stack(items: Vec<Item>) -> String {
        let typed = check(items).unwrap();
        typed.code.last().unwrap().stack.to_string()
    }

    fn type_error(result: CheckResult<TypedProgram>) -> TypeError {
        match result {
            Err(CheckError::Type(err)) => err,
            Err(CheckError::Internal(err)) => panic!("internal error: {}", err),
            Ok(typed) => panic!("expected a type error, got {:?}", typed),
        }
    }

    #[test]
    fn test_literals_push_their_types() {
        let body = vec![
            int(1),
            Word::string("a", at(2)),
            Word::boolean(true, at(6)),
            none(),
        ];
        assert_eq!(final_stack(vec![code(body)]), "int str bool none");
    }

    #[test]
    fn test_inferred_definition_is_generalized() {
        let typed = check(vec![define("dup2", None, vec![call("dup"), call("dup")])]).unwrap();
        let definition = typed.definition("dup2").unwrap();
        assert!(definition.inferred);
        assert_eq!(definition.ty.to_string(), "forall *s a. (*s a -- *s a a a)");
        assert_eq!(definition.words.len(), 2);
    }

    #[test]
    fn test_generalized_word_used_at_different_types() {
        let items = vec![
            define("twice", None, vec![call("dup")]),
            code(vec![
                int(1),
                call("twice"),
                Word::string("a", at(8)),
                call("twice"),
            ]),
        ];
        assert_eq!(final_stack(items), "int int str str");
    }

    #[test]
    fn test_rest_of_stack_is_left_alone() {
        let items = vec![
            define("discard", None, vec![call("drop")]),
            code(vec![int(1), int(2), int(3), call("discard")]),
        ];
        let typed = check(items).unwrap();
        assert_eq!(
            typed.definition("discard").unwrap().ty.to_string(),
            "forall *s a. (*s a -- *s)"
        );
        assert_eq!(typed.code.last().unwrap().stack.to_string(), "int int");
    }

    #[test]
    fn test_recursive_definition() {
        let typed = check(vec![define("forever", None, vec![call("forever")])]).unwrap();
        assert_eq!(
            typed.definition("forever").unwrap().ty.to_string(),
            "forall *s *t. (*s -- *t)"
        );
    }

    #[test]
    fn test_declared_type_checked() {
        let typed = check(vec![define(
            "double",
            Some("(int -- int)"),
            vec![call("dup"), call("+")],
        )])
        .unwrap();
        let definition = typed.definition("double").unwrap();
        assert!(!definition.inferred);
        assert_eq!(definition.ty.to_string(), "forall *_. (*_ int -- *_ int)");
    }

    #[test]
    fn test_declared_type_mismatch() {
        let err = type_error(check(vec![define("f", Some("(int -- str)"), vec![])]));
        assert_eq!(err.label(), "SubtypeError");
        let message = err.to_string();
        assert!(
            message.starts_with("declared type of f (forall *_. (*_ int -- *_ str))"),
            "{}",
            message
        );
        assert!(message.contains("is not compatible with inferred type"), "{}", message);
    }

    #[test]
    fn test_declared_variables_are_rigid() {
        // a body that only works for ints cannot claim to work for any a
        let err = type_error(check(vec![define(
            "f",
            Some("(*s a -- *s a)"),
            vec![call("dup"), call("+")],
        )]));
        assert_eq!(err.label(), "SubtypeError");
    }

    #[test]
    fn test_declared_words_visible_before_definition() {
        let items = vec![
            code(vec![int(1), call("later")]),
            define("later", Some("(int -- str)"), vec![call("drop"), Word::string("x", at(0))]),
        ];
        assert_eq!(final_stack(items), "str");
    }

    #[test]
    fn test_undefined_name_located_at_word() {
        let frob = Word::call("frob", Span::new(2, 4));
        let err = type_error(check(vec![define("f", None, vec![int(1), frob])]));
        assert_eq!(err.label(), "UndefinedNameError");
        assert_eq!(err.span, Some(Span::new(2, 4)));
        let rendered = Diagnostic::from_error(&err, "def f: 1\n    frob\n").render();
        assert!(rendered.ends_with("    frob\n    ^"), "{}", rendered);
    }

    #[test]
    fn test_not_enough_items_at_top_level() {
        let err = type_error(check(vec![code(vec![int(1), call("swap")])]));
        assert_eq!(err.label(), "ArityError");
    }

    #[test]
    fn test_operator_on_ints() {
        let body = vec![int(1), int(2), call("+"), int(3), call("<")];
        assert_eq!(final_stack(vec![code(body)]), "bool");
    }

    #[test]
    fn test_operator_missing_member() {
        let err = type_error(check(vec![code(vec![none(), none(), call("+")])]));
        assert_eq!(err.label(), "SubtypeError");
        let message = err.to_string();
        assert!(message.contains("operator '+'"), "{}", message);
        assert!(message.contains("member 'add'"), "{}", message);
    }

    #[test]
    fn test_equality_on_any_values() {
        let body = vec![none(), int(1), call("==")];
        assert_eq!(final_stack(vec![code(body)]), "bool");
    }

    #[test]
    fn test_user_definition_shadows_operator() {
        let items = vec![
            define("+", Some("(none none -- str)"), vec![call("drop"), call("drop"), Word::string("", at(0))]),
            code(vec![none(), none(), call("+")]),
        ];
        assert_eq!(final_stack(items), "str");
    }

    #[test]
    fn test_choose_joins_branches() {
        let body = vec![
            Word::boolean(true, at(0)),
            quote(vec![int(1)]),
            quote(vec![int(1), cast("object")]),
            call("choose"),
        ];
        assert_eq!(final_stack(vec![code(body)]), "object");
    }

    #[test]
    fn test_choose_branches_must_converge() {
        let body = vec![
            Word::boolean(true, at(0)),
            quote(vec![int(1)]),
            quote(vec![Word::string("a", at(0))]),
            Word::call("choose", Span::new(1, 17)),
        ];
        let err = type_error(check(vec![code(body)]));
        assert_eq!(err.label(), "SubtypeError");
        assert_eq!(err.span, Some(Span::new(1, 17)));
        assert!(
            err.to_string().starts_with("the branches of choose leave incompatible stacks"),
            "{}",
            err
        );
    }

    #[test]
    fn test_choose_requires_bool_condition() {
        let body = vec![int(1), quote(vec![]), quote(vec![]), call("choose")];
        let err = type_error(check(vec![code(body)]));
        assert!(err.to_string().contains("the condition must be a bool"), "{}", err);
    }

    #[test]
    fn test_if_then_keeps_stack_shape() {
        let body = vec![
            int(1),
            Word::boolean(true, at(0)),
            quote(vec![call("drop"), int(2)]),
            call("if_then"),
        ];
        assert_eq!(final_stack(vec![code(body)]), "int");
    }

    #[test]
    fn test_if_then_body_must_not_grow_stack() {
        let body = vec![Word::boolean(true, at(0)), quote(vec![int(1)]), call("if_then")];
        let err = type_error(check(vec![code(body)]));
        assert!(
            err.to_string()
                .starts_with("the body of if_then must leave the stack as it found it"),
            "{}",
            err
        );
    }

    #[test]
    fn test_loop() {
        let body = vec![quote(vec![Word::boolean(false, at(0))]), call("loop")];
        assert_eq!(final_stack(vec![code(body)]), "<empty>");
    }

    #[test]
    fn test_call_applies_quotation() {
        let body = vec![int(1), quote(vec![call("dup")]), call("call")];
        assert_eq!(final_stack(vec![code(body)]), "int int");
    }

    #[test]
    fn test_pushed_word_is_a_value() {
        let body = vec![int(1), Word::push("dup", at(2)), call("call")];
        assert_eq!(final_stack(vec![code(body)]), "int int");
    }

    #[test]
    fn test_member_invocation() {
        let body = vec![Word::string("abc", at(0)), attribute("upper"), attribute("length")];
        assert_eq!(final_stack(vec![code(body)]), "int");
    }

    #[test]
    fn test_missing_member() {
        let err = type_error(check(vec![code(vec![int(1), attribute("frob")])]));
        assert_eq!(err.label(), "SubtypeError");
        assert_eq!(
            err.to_string(),
            "object of type int does not have member 'frob'"
        );
    }

    #[test]
    fn test_gradual_attribute_on_object() {
        let body = vec![int(1), cast("object"), attribute("frob")];
        assert_eq!(final_stack(vec![code(body.clone())]), "object");

        let strict = CheckerConfig::new().with_gradual_attributes(false);
        let err = type_error(check_with(strict, vec![code(body)]));
        assert_eq!(err.label(), "SubtypeError");
    }

    #[test]
    fn test_cast_to_non_item_kind() {
        let err = type_error(check(vec![code(vec![int(1), cast("list")])]));
        assert_eq!(err.label(), "KindError");
    }

    #[test]
    fn test_list_literals() {
        let list = |elements: Vec<Vec<Word>>| Word::List {
            elements,
            span: at(0),
        };
        assert_eq!(
            final_stack(vec![code(vec![list(vec![vec![int(1)], vec![int(2)]])])]),
            "list[int]"
        );
        assert_eq!(
            final_stack(vec![code(vec![list(vec![
                vec![int(1)],
                vec![Word::string("a", at(0))]
            ])])]),
            "list[object]"
        );
        let err = type_error(check(vec![code(vec![list(vec![vec![int(1), int(2)]])])]));
        assert_eq!(err.label(), "ArityError");
        assert!(
            err.to_string().starts_with("each list element must leave exactly one item"),
            "{}",
            err
        );
    }

    #[test]
    fn test_imports_push_objects() {
        let items = vec![
            Item::Import {
                module: "os".to_string(),
                names: Vec::new(),
                span: at(0),
            },
            Item::Import {
                module: "os.path".to_string(),
                names: vec!["join".to_string()],
                span: Span::new(2, 0),
            },
            code(vec![call("os"), call("join")]),
        ];
        assert_eq!(final_stack(items), "object object");
    }

    #[test]
    fn test_configured_types_and_words() {
        let config = CheckerConfig::new()
            .with_type("path", &[("exists", "(-- bool)")])
            .with_word(WordDecl::new("cwd", "(*s -- *s path)"));
        let typed = check_with(config, vec![code(vec![call("cwd"), attribute("exists")])]).unwrap();
        assert_eq!(typed.code[0].stack.to_string(), "path");
        assert_eq!(typed.code[1].stack.to_string(), "bool");
    }

    #[test]
    fn test_interop_words_available_by_default() {
        let checker = TypeChecker::new(CheckerConfig::default_config().unwrap()).unwrap();
        assert!(checker.word_type("host-call").is_some());
        assert!(checker.word_type("dup").is_some());
    }

    #[test]
    fn test_parse_type() {
        let mut checker = TypeChecker::new(CheckerConfig::new()).unwrap();
        assert_eq!(
            checker.parse_type("(*s a -- *s a a)").unwrap().to_string(),
            "forall *s a. (*s a -- *s a a)"
        );
        assert!(checker.parse_type("(*s --").is_err());
    }

    #[test]
    fn test_typed_output_serializes() {
        let typed = check(vec![define("f", None, vec![call("dup")])]).unwrap();
        let json = serde_json::to_value(&typed).unwrap();
        assert_eq!(json["definitions"][0]["type"], "forall *s a. (*s a -- *s a a)");
        assert_eq!(json["definitions"][0]["words"][0]["word"], "dup");
        assert!(json.get("classes").is_none());

        let typed = check(vec![code(vec![int(1), quote(vec![call("dup")]), call("call")])]).unwrap();
        let json = serde_json::to_value(&typed).unwrap();
        assert_eq!(json["code"][1]["children"][0]["stack"], "int int");
        assert!(json["code"][0].get("children").is_none());
        assert_eq!(json["code"][2]["stack"], "int int");
    }

    #[test]
    fn test_quotation_bodies_nest_in_typed_output() {
        let typed = check(vec![code(vec![int(1), quote(vec![call("dup")]), call("call")])]).unwrap();
        let quotation = &typed.code[1];
        assert_eq!(quotation.word, "$(...)");
        assert_eq!(quotation.children.len(), 1);
        assert_eq!(quotation.children[0].word, "dup");
        assert_eq!(quotation.children[0].stack.to_string(), "int int");
        assert!(typed.code[2].children.is_empty());
    }

    #[test]
    fn test_cast_target_names_must_exist() {
        let misspelled = Word::Cast {
            target: TypeExpr::named("strr"),
            span: at(5),
        };
        let err = type_error(check(vec![code(vec![none(), misspelled, none(), call("+")])]));
        assert_eq!(err.label(), "UndefinedNameError");
        assert_eq!(err.span, Some(at(5)));

        let effect = Word::Cast {
            target: parse_signature("(*s int -- *s)").unwrap(),
            span: at(2),
        };
        let err = type_error(check(vec![code(vec![int(1), effect])]));
        assert_eq!(err.label(), "UndefinedNameError");
    }

    #[test]
    fn test_failed_definition_leaves_no_scope_behind() {
        let mut checker = TypeChecker::new(CheckerConfig::new()).unwrap();
        let program = Program {
            items: vec![define("broken", None, vec![int(1), call("frob")])],
        };
        assert!(checker.check_program(&program).is_err());
        assert_eq!(checker.env.depth(), 1);
        assert!(checker.word_type("broken").is_none());
    }

    #[test]
    fn test_nested_definition_is_local() {
        let items = vec![define(
            "outer",
            None,
            vec![nested("one", None, vec![int(1)]), call("one"), call("one")],
        )];
        let mut checker = TypeChecker::new(CheckerConfig::new()).unwrap();
        let typed = checker.check_program(&Program { items }).unwrap();
        let outer = typed.definition("outer").unwrap();
        assert_eq!(outer.ty.to_string(), "forall *s. (*s -- *s int int)");
        assert_eq!(outer.words[0].word, "def one");
        assert_eq!(outer.words[0].children.len(), 1);
        assert!(checker.word_type("one").is_none());
        assert!(checker.word_type("outer").is_some());

        let err = type_error(check(vec![
            define("outer", None, vec![nested("one", None, vec![int(1)])]),
            code(vec![call("one")]),
        ]));
        assert_eq!(err.label(), "UndefinedNameError");
    }

    #[test]
    fn test_declared_output_variable_is_rigid() {
        assert!(check(vec![define("f", Some("(*s a -- *s int)"), vec![call("drop"), int(1)])]).is_ok());
        let err = type_error(check(vec![define(
            "g",
            Some("(*s a -- *s b)"),
            vec![call("drop"), int(1)],
        )]));
        assert_eq!(err.label(), "SubtypeError");
    }

    #[test]
    fn test_declared_variables_cannot_escape_into_enclosing_word() {
        // inner's stack would become outer's input, carrying inner's variables
        let inner = nested("inner", Some("(*t a -- *t)"), vec![call("outer")]);
        let err = type_error(check(vec![define("outer", None, vec![inner])]));
        assert_eq!(err.label(), "SubtypeError");
        assert!(err.to_string().contains("would escape its scope"), "{}", err);
    }

    #[test]
    fn test_tuple_literals() {
        let tuple = |elements: Vec<Vec<Word>>| Word::Tuple {
            elements,
            span: at(0),
        };
        let pair = tuple(vec![vec![int(1)], vec![Word::string("a", at(3))]]);
        assert_eq!(final_stack(vec![code(vec![pair.clone()])]), "tuple[int, str]");
        assert_eq!(final_stack(vec![code(vec![pair, attribute("length")])]), "int");
        assert_eq!(final_stack(vec![code(vec![tuple(Vec::new())])]), "tuple[]");

        let err = type_error(check(vec![code(vec![tuple(vec![vec![int(1), int(2)]])])]));
        assert_eq!(err.label(), "ArityError");
        assert!(
            err.to_string().starts_with("each tuple element must leave exactly one item"),
            "{}",
            err
        );
    }

    fn class(name: &str, params: &[&str], fields: &[(&str, &str)], members: Vec<WordDef>) -> Item {
        Item::Class(ClassDef {
            name: name.to_string(),
            type_params: params
                .iter()
                .map(|p| TypeParam {
                    name: p.to_string(),
                    kind: Kind::Item,
                })
                .collect(),
            fields: fields
                .iter()
                .map(|(name, ty)| Field {
                    name: name.to_string(),
                    ty: parse_signature(ty).unwrap(),
                    span: at(0),
                })
                .collect(),
            members,
            span: at(0),
        })
    }

    #[test]
    fn test_class_fields_and_members() {
        let norm = word_def(
            "norm",
            None,
            vec![call("self"), attribute("x"), call("self"), attribute("y"), call("+")],
        );
        let items = vec![
            class("point", &[], &[("x", "int"), ("y", "int")], vec![norm]),
            define("origin", Some("(-- point)"), vec![int(0), int(0), call("point")]),
            code(vec![
                int(1),
                int(2),
                call("point"),
                call("dup"),
                attribute("x"),
                call("swap"),
                attribute("norm"),
                call("+"),
            ]),
        ];
        let typed = check(items).unwrap();
        let point = typed.class("point").unwrap();
        assert_eq!(point.ty.to_string(), "point");
        assert_eq!(point.constructor.to_string(), "forall *s. (*s int int -- *s point)");
        assert_eq!(point.members[0].ty.to_string(), "forall *s. (*s -- *s int)");
        assert_eq!(typed.code.last().unwrap().stack.to_string(), "int");
    }

    #[test]
    fn test_generic_class() {
        let get = word_def("get", Some("(-- a)"), vec![call("self"), attribute("value")]);
        let items = vec![
            class("box", &["a"], &[("value", "a")], vec![get]),
            code(vec![int(5), call("box"), attribute("get")]),
        ];
        let typed = check(items).unwrap();
        let class = typed.class("box").unwrap();
        assert_eq!(class.ty.to_string(), "box[a]");
        assert_eq!(class.constructor.to_string(), "forall *s a. (*s a -- *s box[a])");
        assert_eq!(typed.code.last().unwrap().stack.to_string(), "int");
    }

    #[test]
    fn test_class_field_types_must_exist() {
        let err = type_error(check(vec![class("broken", &[], &[("x", "strr")], vec![])]));
        assert_eq!(err.label(), "UndefinedNameError");
    }

    #[test]
    fn test_decorators_replace_the_type() {
        let mut f = word_def("f", None, vec![call("drop")]);
        f.decorators = vec![call("drop"), Word::push("swap", at(0))];
        let items = vec![
            Item::Definition(f),
            code(vec![int(1), Word::string("a", at(2)), call("f")]),
        ];
        let typed = check(items).unwrap();
        assert_eq!(
            typed.definition("f").unwrap().ty.to_string(),
            "forall *s a b. (*s a b -- *s b a)"
        );
        assert_eq!(typed.code.last().unwrap().stack.to_string(), "str int");
    }

    #[test]
    fn test_decorators_must_leave_one_item() {
        let mut g = word_def("g", None, Vec::new());
        g.decorators = vec![call("dup")];
        let err = type_error(check(vec![Item::Definition(g)]));
        assert_eq!(err.label(), "ArityError");
        assert!(
            err.to_string().starts_with("decorators of g must leave exactly one item"),
            "{}",
            err
        );
    }
}
