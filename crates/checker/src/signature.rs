//! Parser for written type signatures
//!
//! Builtin words, interop primitives and configuration files declare their
//! types as text. This parses that text into a [`TypeExpr`]:
//!
//! ```text
//! forall *s a. (*s a -- *s a a)        quantified effect
//! (*s list[int] -- *s int)             applied constructor
//! {add: (int -- int)}                  structural type
//! forall (f:Generic[Item]). f          kind annotation
//! ```
//!
//! `*name` is a rest variable. Quantified item variables default to kind
//! `Item` unless annotated.

use crate::ast::{StackExpr, TypeExpr, TypeParam};
use crate::kinds::Kind;
use std::collections::BTreeMap;

/// Parse a complete signature
pub fn parse_signature(text: &str) -> Result<TypeExpr, String> {
    let tokens = tokenize(text)?;
    let mut parser = SignatureParser { tokens, pos: 0 };
    let ty = parser.parse_type()?;
    if let Some(extra) = parser.peek() {
        return Err(format!(
            "Unexpected '{}' after the end of signature '{}'",
            extra, text
        ));
    }
    Ok(ty)
}

struct SignatureParser {
    tokens: Vec<String>,
    pos: usize,
}

impl SignatureParser {
    fn parse_type(&mut self) -> Result<TypeExpr, String> {
        match self.peek() {
            Some("forall") => self.parse_forall(),
            Some("(") => self.parse_effect(),
            Some("{") => self.parse_object(),
            Some(token) if is_name(token) => self.parse_named(),
            Some(token) => Err(format!("Expected a type, found '{}'", token)),
            None => Err("Expected a type, found end of signature".to_string()),
        }
    }

    fn parse_forall(&mut self) -> Result<TypeExpr, String> {
        self.expect("forall")?;
        let mut params = Vec::new();
        while !self.consume(".") {
            params.push(self.parse_param()?);
        }
        if params.is_empty() {
            return Err("Expected at least one type parameter after 'forall'".to_string());
        }
        let body = self.parse_type()?;
        Ok(TypeExpr::Forall {
            params,
            body: Box::new(body),
        })
    }

    fn parse_param(&mut self) -> Result<TypeParam, String> {
        if self.consume("*") {
            let name = self.expect_name("rest variable name")?;
            return Ok(TypeParam {
                name,
                kind: Kind::Sequence,
            });
        }
        // `(a:Kind)` and `a:Kind` are both accepted
        let parenthesized = self.consume("(");
        let name = self.expect_name("type parameter")?;
        let kind = if self.consume(":") {
            self.parse_kind()?
        } else {
            Kind::Item
        };
        if parenthesized {
            self.expect(")")?;
        }
        Ok(TypeParam { name, kind })
    }

    fn parse_kind(&mut self) -> Result<Kind, String> {
        let name = self.expect_name("kind")?;
        match name.as_str() {
            "Individual" => Ok(Kind::Individual),
            "Item" => Ok(Kind::Item),
            "Sequence" => Ok(Kind::Sequence),
            "Generic" => {
                self.expect("[")?;
                let mut params = vec![self.parse_kind()?];
                while self.consume(",") {
                    params.push(self.parse_kind()?);
                }
                self.expect("]")?;
                Ok(Kind::Generic(params))
            }
            other => Err(format!("Unknown kind '{}'", other)),
        }
    }

    fn parse_effect(&mut self) -> Result<TypeExpr, String> {
        self.expect("(")?;
        let input = self.parse_stack(&["--"])?;
        self.expect("--")?;
        let output = self.parse_stack(&[")"])?;
        self.expect(")")?;
        Ok(TypeExpr::Effect { input, output })
    }

    fn parse_stack(&mut self, terminators: &[&str]) -> Result<StackExpr, String> {
        let rest = if self.consume("*") {
            Some(self.expect_name("rest variable name")?)
        } else {
            None
        };
        let mut items = Vec::new();
        while let Some(token) = self.peek() {
            if terminators.contains(&token) {
                break;
            }
            if token == "*" {
                return Err("A rest variable may only appear at the bottom of a stack".to_string());
            }
            items.push(self.parse_type()?);
        }
        Ok(StackExpr { rest, items })
    }

    fn parse_object(&mut self) -> Result<TypeExpr, String> {
        self.expect("{")?;
        let mut members = BTreeMap::new();
        if !self.consume("}") {
            loop {
                let name = self.expect_name("member name")?;
                self.expect(":")?;
                let ty = self.parse_type()?;
                if members.insert(name.clone(), ty).is_some() {
                    return Err(format!("Member '{}' is declared twice", name));
                }
                if self.consume("}") {
                    break;
                }
                self.expect(",")?;
            }
        }
        Ok(TypeExpr::Object { members })
    }

    fn parse_named(&mut self) -> Result<TypeExpr, String> {
        let name = self.expect_name("type name")?;
        let mut args = Vec::new();
        if self.consume("[") {
            args.push(self.parse_type()?);
            while self.consume(",") {
                args.push(self.parse_type()?);
            }
            self.expect("]")?;
        }
        Ok(TypeExpr::Named { name, args })
    }

    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn consume(&mut self, expected: &str) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &str) -> Result<(), String> {
        match self.peek() {
            Some(token) if token == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => Err(format!("Expected '{}', found '{}'", expected, token)),
            None => Err(format!("Expected '{}', found end of signature", expected)),
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String, String> {
        match self.peek() {
            Some(token) if is_name(token) => {
                let name = token.to_string();
                self.pos += 1;
                Ok(name)
            }
            Some(token) => Err(format!("Expected {}, found '{}'", what, token)),
            None => Err(format!("Expected {}, found end of signature", what)),
        }
    }
}

fn is_name(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '$'
}

fn tokenize(text: &str) -> Result<Vec<String>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && chars.get(i + 1) == Some(&'-') {
            tokens.push("--".to_string());
            i += 2;
        } else if "()[]{},:.*".contains(c) {
            tokens.push(c.to_string());
            i += 1;
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && is_name_char(chars[i]) {
                // a name never swallows the `--` separator
                if chars[i] == '-' && chars.get(i + 1) == Some(&'-') {
                    break;
                }
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else {
            return Err(format!("Unexpected character '{}' in signature", c));
        }
    }
    Ok(tokens)
}
