//! Built-in types and word signatures for Concat
//!
//! Signatures are written in the notation of [`crate::signature`] and
//! lowered once per checking run, so every run gets its own variables.
//! Without a `forall`, every variable in a signature is quantified.

use crate::annotations::lower;
use crate::env::TypeEnvironment;
use crate::error::{CheckResult, InternalError};
use crate::kinds::Kind;
use crate::protocols::{MemberTable, ProtocolTable, binary_member};
use crate::signature::parse_signature;
use crate::subsumption::Solver;
use crate::types::{OBJECT, StackType, Type, TypeConstructor, VarArena};
use std::collections::BTreeMap;
use std::rc::Rc;

/// A built-in word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    pub name: &'static str,
    pub signature: &'static str,
    pub doc: &'static str,
}

/// Define the builtin table
///
/// Usage: `"name" => "(*s a -- *s a a)", "doc";`
macro_rules! builtins {
    ($($name:literal => $signature:literal, $doc:literal;)*) => {
        pub const BUILTINS: &[Builtin] = &[
            $(Builtin {
                name: $name,
                signature: $signature,
                doc: $doc,
            },)*
        ];
    };
}

builtins! {
    // =========================================================================
    // Stack shuffling
    // =========================================================================
    "dup" => "(*s a -- *s a a)", "Duplicate the top item";
    "drop" => "(*s a -- *s)", "Discard the top item";
    "swap" => "(*s a b -- *s b a)", "Exchange the top two items";
    "over" => "(*s a b -- *s a b a)", "Copy the second item to the top";
    "nip" => "(*s a b -- *s b)", "Discard the second item";
    "rot" => "(*s a b c -- *s b c a)", "Rotate the third item to the top";
    "pick" => "(*s a b c -- *s a b c a)", "Copy the third item to the top";

    // =========================================================================
    // Combinators
    // =========================================================================
    "call" => "(*a (*a -- *b) -- *b)", "Apply the quotation on top of the stack";
    "curry" => "(*r a (*s a -- *t) -- *r (*s -- *t))", "Partially apply a quotation to a value";
    "choose" => "(*r bool (*r -- *s) (*r -- *s) -- *s)", "Apply the first quotation if the condition holds, otherwise the second";
    "if_then" => "(*r bool (*r -- *r) -- *r)", "Apply the quotation if the condition holds";
    "if_not" => "(*r bool (*r -- *r) -- *r)", "Apply the quotation unless the condition holds";
    "loop" => "(*s (*s -- *s bool) -- *s)", "Apply the quotation until it leaves False";

    // =========================================================================
    // Values
    // =========================================================================
    "not" => "(*s object -- *s bool)", "Logical negation of any value's truthiness";
    "list-push" => "(*s list[a] a -- *s list[a])", "Append an item to a list";
    "list-len" => "(*s list[a] -- *s int)", "Number of items in a list";
}

pub fn builtin(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Handles on the primitive types
#[derive(Debug, Clone)]
pub struct Primitives {
    pub int: Type,
    pub float: Type,
    pub string: Type,
    pub boolean: Type,
    pub none: Type,
    pub object: Type,
    pub list: Rc<TypeConstructor>,
    /// Variadic: `tuple[int, str]` applies it to the stack `int str`
    pub tuple: Rc<TypeConstructor>,
}

impl Primitives {
    pub fn new(vars: &mut VarArena) -> Self {
        let nominal = |name: &str| Type::nominal(name, BTreeMap::new());
        let element = vars.bound("a", Kind::Item);
        let items = vars.bound("items", Kind::Sequence);
        Primitives {
            int: nominal("int"),
            float: nominal("float"),
            string: nominal("str"),
            boolean: nominal("bool"),
            none: nominal("none"),
            object: nominal(OBJECT),
            list: Rc::new(TypeConstructor {
                name: Rc::from("list"),
                params: vec![element],
                members: BTreeMap::new(),
                structural: false,
            }),
            tuple: Rc::new(TypeConstructor {
                name: Rc::from("tuple"),
                params: vec![items],
                members: BTreeMap::new(),
                structural: false,
            }),
        }
    }

    pub fn list_of(&self, element: Type) -> Type {
        Type::apply(self.list.clone(), vec![element])
    }

    pub fn tuple_of(&self, items: Vec<Type>) -> Type {
        Type::apply(
            self.tuple.clone(),
            vec![Type::Stack(StackType::new(None, items))],
        )
    }

    fn nominal_types(&self) -> [&Type; 6] {
        [
            &self.int,
            &self.float,
            &self.string,
            &self.boolean,
            &self.none,
            &self.object,
        ]
    }

    /// Member tables of the primitive types
    fn declare_members(&self, table: &mut MemberTable) {
        let mut universal = BTreeMap::new();
        for name in ["eq", "ne", "is"] {
            universal.insert(
                name.to_string(),
                binary_member(self.object.clone(), self.boolean.clone()),
            );
        }
        table.declare_universal(universal);

        let ordered = |ty: &Type, result: &Type, arithmetic: &[&str]| {
            let mut members = BTreeMap::new();
            for name in arithmetic {
                members.insert(name.to_string(), binary_member(ty.clone(), result.clone()));
            }
            for name in ["lt", "le", "gt", "ge"] {
                members.insert(
                    name.to_string(),
                    binary_member(ty.clone(), self.boolean.clone()),
                );
            }
            members
        };

        table.declare("int", ordered(&self.int, &self.int, &["add", "subtract", "multiply"]));
        table.declare(
            "float",
            ordered(&self.float, &self.float, &["add", "subtract", "multiply"]),
        );

        let mut string = ordered(&self.string, &self.string, &["add"]);
        string.insert(
            "multiply".to_string(),
            binary_member(self.int.clone(), self.string.clone()),
        );
        string.insert("upper".to_string(), nullary(self.string.clone()));
        string.insert("length".to_string(), nullary(self.int.clone()));
        table.declare("str", string);

        let mut boolean = BTreeMap::new();
        for name in ["and", "or"] {
            boolean.insert(
                name.to_string(),
                binary_member(self.boolean.clone(), self.boolean.clone()),
            );
        }
        table.declare("bool", boolean);

        let element = Type::Var(self.list.params[0].clone());
        let this = self.list_of(element);
        let mut list_members = BTreeMap::new();
        list_members.insert("add".to_string(), binary_member(this.clone(), this.clone()));
        list_members.insert("multiply".to_string(), binary_member(self.int.clone(), this));
        list_members.insert("length".to_string(), nullary(self.int.clone()));
        table.declare_constructor(Rc::new(TypeConstructor {
            members: list_members,
            ..(*self.list).clone()
        }));

        let mut tuple_members = BTreeMap::new();
        tuple_members.insert("length".to_string(), nullary(self.int.clone()));
        table.declare_constructor(Rc::new(TypeConstructor {
            members: tuple_members,
            ..(*self.tuple).clone()
        }));
    }
}

/// `(-- result)`: a member taking nothing beyond its receiver
fn nullary(result: Type) -> Type {
    Type::effect(StackType::empty(), StackType::empty().push(result))
}

/// Lower a written signature, attributing failures to the checker itself
pub fn lower_signature(
    vars: &mut VarArena,
    env: &TypeEnvironment,
    name: &str,
    text: &str,
) -> CheckResult<Type> {
    let expr = parse_signature(text)
        .map_err(|e| InternalError::new(format!("signature of '{}' is malformed: {}", name, e)))?;
    lower(vars, env, &expr)
}

/// Populate a fresh environment with the primitive types, the protocols and
/// every builtin word
pub fn install_prelude(
    solver: &mut Solver,
    env: &mut TypeEnvironment,
    protocols: &ProtocolTable,
) -> CheckResult<Primitives> {
    let prims = Primitives::new(&mut solver.vars);
    for ty in prims.nominal_types() {
        env.define_type(&ty.to_string(), ty.clone());
    }
    env.define_type("list", Type::Constructor(prims.list.clone()));
    env.define_type("tuple", Type::Constructor(prims.tuple.clone()));
    for ctor in protocols.constructors() {
        env.define_type(&ctor.name, Type::Constructor(ctor.clone()));
    }
    prims.declare_members(&mut solver.members);

    for builtin in BUILTINS {
        let ty = lower_signature(&mut solver.vars, env, builtin.name, builtin.signature)
            .map_err(|e| {
                InternalError::new(format!("builtin '{}' does not lower: {}", builtin.name, e))
            })?;
        env.bind(builtin.name, ty);
    }
    Ok(prims)
}
