//! Checker configuration
//!
//! Lets a project declare the host objects and words it relies on without
//! modifying the checker, as a TOML file:
//!
//! ```toml
//! gradual_attributes = true
//!
//! [[types]]
//! name = "path"
//! members = { exists = "(-- bool)", join = "(str -- path)" }
//!
//! [[words]]
//! name = "cwd"
//! signature = "(*s -- *s path)"
//! doc = "The current working directory"
//! ```
//!
//! The interop primitives shipped with the checker use the same format and
//! are loaded by [`CheckerConfig::default_config`].

use crate::signature::parse_signature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Embedded interop word signatures
pub static DEFAULT_CONFIG: &str = include_str!("interop.toml");

/// A word provided from outside the program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDecl {
    pub name: String,
    /// Type signature, e.g. `(*s str -- *s object)`
    pub signature: String,
    #[serde(default)]
    pub doc: String,
}

impl WordDecl {
    pub fn new(name: impl Into<String>, signature: impl Into<String>) -> Self {
        WordDecl {
            name: name.into(),
            signature: signature.into(),
            doc: String::new(),
        }
    }
}

/// A nominal host type and the members its values have
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    /// Member name to member signature
    #[serde(default)]
    pub members: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Member access on `object` is allowed and produces `object`
    pub gradual_attributes: bool,

    pub types: Vec<TypeDecl>,

    pub words: Vec<WordDecl>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            gradual_attributes: true,
            types: Vec::new(),
            words: Vec::new(),
        }
    }
}

impl CheckerConfig {
    /// An empty configuration: no extra types or words
    pub fn new() -> Self {
        CheckerConfig::default()
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let config: CheckerConfig = toml::from_str(toml_str)
            .map_err(|e| format!("Failed to parse checker config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded interop words
    pub fn default_config() -> Result<Self, String> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Read a configuration file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config '{}': {}", path.display(), e))?;
        Self::from_toml(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    /// Merge another config into this one; entries of `other` replace
    /// entries with the same name
    pub fn merge(&mut self, other: CheckerConfig) {
        self.gradual_attributes = other.gradual_attributes;
        for word in other.words {
            if let Some(existing) = self.words.iter_mut().find(|w| w.name == word.name) {
                *existing = word;
            } else {
                self.words.push(word);
            }
        }
        for ty in other.types {
            if let Some(existing) = self.types.iter_mut().find(|t| t.name == ty.name) {
                existing.members.extend(ty.members);
            } else {
                self.types.push(ty);
            }
        }
    }

    /// Add a word (builder pattern)
    pub fn with_word(mut self, word: WordDecl) -> Self {
        self.words.push(word);
        self
    }

    /// Add a host type (builder pattern)
    pub fn with_type(mut self, name: &str, members: &[(&str, &str)]) -> Self {
        self.types.push(TypeDecl {
            name: name.to_string(),
            members: members
                .iter()
                .map(|(member, signature)| (member.to_string(), signature.to_string()))
                .collect(),
        });
        self
    }

    pub fn with_gradual_attributes(mut self, enabled: bool) -> Self {
        self.gradual_attributes = enabled;
        self
    }

    /// Check names are present and every signature parses
    fn validate(&self) -> Result<(), String> {
        for (idx, word) in self.words.iter().enumerate() {
            if word.name.trim().is_empty() {
                return Err(format!("Word {} has an empty name", idx + 1));
            }
            parse_signature(&word.signature)
                .map_err(|e| format!("Signature of word '{}': {}", word.name, e))?;
        }
        for (idx, ty) in self.types.iter().enumerate() {
            if ty.name.trim().is_empty() {
                return Err(format!("Type {} has an empty name", idx + 1));
            }
            for (member, signature) in &ty.members {
                parse_signature(signature).map_err(|e| {
                    format!("Signature of member '{}' of '{}': {}", member, ty.name, e)
                })?;
            }
        }
        Ok(())
    }
}
