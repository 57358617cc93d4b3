//! Abstract Syntax Tree for Concat
//!
//! The parser produces these trees; the checker only reads them. Every node
//! can be deserialized from JSON so the command-line front end can check a
//! tree written out by an external parser.

use crate::kinds::Kind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source position of a node
///
/// `line` is 1-indexed. `column` counts the characters preceding the node on
/// its line, so a caret under the node is `column` spaces followed by `^`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Span { line, column }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum Item {
    /// `def name (signature): body`
    Definition(WordDef),
    /// `import module` (binds `module`) or `from module import a, b` (binds
    /// `a` and `b`)
    Import {
        module: String,
        #[serde(default)]
        names: Vec<String>,
        span: Span,
    },
    /// `class name[params]: fields and members`
    Class(ClassDef),
    /// Top-level statements, run against the empty stack
    Code { body: Vec<Word>, span: Span },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordDef {
    pub name: String,
    /// Declared type; unannotated words have their type inferred
    #[serde(default)]
    pub signature: Option<TypeExpr>,
    pub body: Vec<Word>,
    /// `@word`s applied to the defined word, innermost first
    #[serde(default)]
    pub decorators: Vec<Word>,
    pub span: Span,
}

impl WordDef {
    pub fn new(name: &str, signature: Option<TypeExpr>, body: Vec<Word>, span: Span) -> Self {
        WordDef {
            name: name.to_string(),
            signature,
            body,
            decorators: Vec::new(),
            span,
        }
    }
}

/// A program-defined nominal type
///
/// Declaring a class also declares a word of the same name that builds an
/// instance from the fields, taken from the stack in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    /// Parameters of a generic class: `class box[a]`
    #[serde(default)]
    pub type_params: Vec<TypeParam>,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Member words, invoked as `.name` on an instance
    #[serde(default)]
    pub members: Vec<WordDef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "value", content = "literal", rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "word", rename_all = "snake_case")]
pub enum Word {
    Literal {
        value: Literal,
        span: Span,
    },
    /// Apply a named word to the stack
    Call {
        name: String,
        span: Span,
    },
    /// `$name`: push a named word as a value without applying it
    Push {
        name: String,
        span: Span,
    },
    /// `$( body )`, optionally annotated with its type
    Quotation {
        #[serde(default)]
        annotation: Option<TypeExpr>,
        body: Vec<Word>,
        span: Span,
    },
    /// `.name`: invoke a member of the top item
    Attribute {
        name: String,
        span: Span,
    },
    /// `(type)`: assert the type of the top item
    Cast {
        target: TypeExpr,
        span: Span,
    },
    /// `[a, b, ...]`: each element leaves one item on the stack
    List {
        elements: Vec<Vec<Word>>,
        span: Span,
    },
    /// `(a, b, ...)`: like a list, but each element keeps its own type
    Tuple {
        elements: Vec<Vec<Word>>,
        span: Span,
    },
    /// A definition inside a body, visible to the rest of that body
    Definition(WordDef),
}

impl Word {
    pub fn span(&self) -> Span {
        match self {
            Word::Literal { span, .. }
            | Word::Call { span, .. }
            | Word::Push { span, .. }
            | Word::Quotation { span, .. }
            | Word::Attribute { span, .. }
            | Word::Cast { span, .. }
            | Word::List { span, .. }
            | Word::Tuple { span, .. } => *span,
            Word::Definition(def) => def.span,
        }
    }

    /// Short human-readable description used in typed output
    pub fn describe(&self) -> String {
        match self {
            Word::Literal { value, .. } => match value {
                Literal::Int(n) => n.to_string(),
                Literal::Float(x) => x.to_string(),
                Literal::Str(s) => format!("{:?}", s),
                Literal::Bool(true) => "True".to_string(),
                Literal::Bool(false) => "False".to_string(),
                Literal::None => "None".to_string(),
            },
            Word::Call { name, .. } => name.clone(),
            Word::Push { name, .. } => format!("${}", name),
            Word::Quotation { .. } => "$(...)".to_string(),
            Word::Attribute { name, .. } => format!(".{}", name),
            Word::Cast { .. } => "(cast)".to_string(),
            Word::List { elements, .. } => format!("[{} elements]", elements.len()),
            Word::Tuple { elements, .. } => format!("({} elements)", elements.len()),
            Word::Definition(def) => format!("def {}", def.name),
        }
    }

    pub fn call(name: &str, span: Span) -> Self {
        Word::Call {
            name: name.to_string(),
            span,
        }
    }

    pub fn push(name: &str, span: Span) -> Self {
        Word::Push {
            name: name.to_string(),
            span,
        }
    }

    pub fn int(value: i64, span: Span) -> Self {
        Word::Literal {
            value: Literal::Int(value),
            span,
        }
    }

    pub fn string(value: &str, span: Span) -> Self {
        Word::Literal {
            value: Literal::Str(value.to_string()),
            span,
        }
    }

    pub fn boolean(value: bool, span: Span) -> Self {
        Word::Literal {
            value: Literal::Bool(value),
            span,
        }
    }

    pub fn quotation(body: Vec<Word>, span: Span) -> Self {
        Word::Quotation {
            annotation: None,
            body,
            span,
        }
    }
}

/// Type annotations as written in source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeExpr {
    /// A type name or variable, possibly applied: `int`, `a`, `list[int]`
    Named {
        name: String,
        #[serde(default)]
        args: Vec<TypeExpr>,
    },
    /// `(*s a -- *s a a)`
    Effect { input: StackExpr, output: StackExpr },
    /// `forall *s (a:Item). body`
    Forall {
        params: Vec<TypeParam>,
        body: Box<TypeExpr>,
    },
    /// `{add: (int -- int)}`: a structural requirement
    Object { members: BTreeMap<String, TypeExpr> },
}

impl TypeExpr {
    pub fn named(name: &str) -> Self {
        TypeExpr::Named {
            name: name.to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StackExpr {
    /// Name of the rest variable, without the leading `*`
    #[serde(default)]
    pub rest: Option<String>,
    #[serde(default)]
    pub items: Vec<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub kind: Kind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_spans() {
        let word = Word::call("dup", Span::new(3, 7));
        assert_eq!(word.span(), Span::new(3, 7));
        assert_eq!(word.describe(), "dup");
        assert_eq!(Word::push("swap", Span::default()).describe(), "$swap");
    }

    #[test]
    fn test_span_display_is_one_based() {
        assert_eq!(Span::new(2, 0).to_string(), "line 2, column 1");
    }

    #[test]
    fn test_program_from_json() {
        let json = r#"{
            "items": [
                {
                    "item": "definition",
                    "name": "double",
                    "signature": {
                        "type": "effect",
                        "input": {"rest": "s", "items": [{"type": "named", "name": "int"}]},
                        "output": {"rest": "s", "items": [{"type": "named", "name": "int"}]}
                    },
                    "body": [
                        {"word": "call", "name": "dup", "span": {"line": 1, "column": 30}},
                        {"word": "call", "name": "+", "span": {"line": 1, "column": 34}}
                    ],
                    "span": {"line": 1, "column": 0}
                },
                {
                    "item": "code",
                    "body": [
                        {"word": "literal", "value": {"value": "int", "literal": 21}, "span": {"line": 2, "column": 0}},
                        {"word": "call", "name": "double", "span": {"line": 2, "column": 3}}
                    ],
                    "span": {"line": 2, "column": 0}
                }
            ]
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(program.items.len(), 2);
        match &program.items[0] {
            Item::Definition(def) => {
                assert_eq!(def.name, "double");
                assert!(def.signature.is_some());
                assert_eq!(def.body[1], Word::call("+", Span::new(1, 34)));
            }
            other => panic!("expected a definition, got {:?}", other),
        }
        match &program.items[1] {
            Item::Code { body, .. } => assert_eq!(body[0], Word::int(21, Span::new(2, 0))),
            other => panic!("expected code, got {:?}", other),
        }
    }

    #[test]
    fn test_kind_annotations_deserialize() {
        let json = r#"{"name": "f", "kind": {"generic": ["individual", "item"]}}"#;
        let param: TypeParam = serde_json::from_str(json).unwrap();
        assert_eq!(param.kind, Kind::generic([Kind::Individual, Kind::Item]));
    }

    #[test]
    fn test_class_and_tuple_from_json() {
        let json = r#"{
            "items": [
                {
                    "item": "class",
                    "name": "box",
                    "type_params": [{"name": "a", "kind": "item"}],
                    "fields": [
                        {"name": "value", "type": {"type": "named", "name": "a"}, "span": {"line": 2, "column": 4}}
                    ],
                    "members": [
                        {"name": "get", "body": [{"word": "call", "name": "self", "span": {"line": 3, "column": 13}}],
                         "span": {"line": 3, "column": 4}}
                    ],
                    "span": {"line": 1, "column": 0}
                },
                {
                    "item": "code",
                    "body": [
                        {"word": "tuple", "elements": [
                            [{"word": "literal", "value": {"value": "int", "literal": 1}, "span": {"line": 4, "column": 1}}],
                            [{"word": "literal", "value": {"value": "none"}, "span": {"line": 4, "column": 4}}]
                        ], "span": {"line": 4, "column": 0}},
                        {"word": "definition", "name": "twice", "body": [], "span": {"line": 5, "column": 0}}
                    ],
                    "span": {"line": 4, "column": 0}
                }
            ]
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        match &program.items[0] {
            Item::Class(class) => {
                assert_eq!(class.name, "box");
                assert_eq!(class.type_params[0].kind, Kind::Item);
                assert_eq!(class.fields[0].ty, TypeExpr::named("a"));
                assert!(class.members[0].decorators.is_empty());
            }
            other => panic!("expected a class, got {:?}", other),
        }
        match &program.items[1] {
            Item::Code { body, .. } => {
                assert_eq!(body[0].describe(), "(2 elements)");
                assert_eq!(body[1].describe(), "def twice");
                assert_eq!(body[1].span(), Span::new(5, 0));
            }
            other => panic!("expected code, got {:?}", other),
        }
    }
}
