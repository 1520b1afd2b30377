//! Context and label expressions
//!
//! A changeset declares a context *expression* (`"dev and !load-test"`) that is
//! evaluated against the contexts supplied at runtime. Labels work the other way
//! around: the changeset carries a plain label set and the caller supplies the
//! expression. Both sides share [`Expression`] and [`NameSet`].
//!
//! Grammar (case-insensitive keywords):
//!
//! ```text
//! expr  := and { ("or" | ",") and }
//! and   := unary { "and" unary }
//! unary := ("!" | "not") unary | "(" expr ")" | NAME
//! ```

use crate::error::{ChangeguardError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[()!,]|[^\s()!,]+").expect("token pattern is a valid regex"));

/// A normalized (trimmed, lowercase) set of context or label names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameSet {
    names: BTreeSet<String>,
}

/// Contexts supplied by the caller for a run
pub type Contexts = NameSet;

/// Labels declared on a changeset
pub type Labels = NameSet;

impl NameSet {
    /// Parse a comma separated list, e.g. `"dev, QA"`
    pub fn parse(value: &str) -> Self {
        value.split(',').collect()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.trim().to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let names = iter
            .into_iter()
            .map(|name| name.as_ref().trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }
}

impl fmt::Display for NameSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Name(String),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

impl Node {
    fn eval(&self, names: &NameSet) -> bool {
        match self {
            Node::Name(name) => names.contains(name),
            Node::Not(inner) => !inner.eval(names),
            Node::And(left, right) => left.eval(names) && right.eval(names),
            Node::Or(left, right) => left.eval(names) || right.eval(names),
        }
    }
}

/// A parsed boolean expression over context or label names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expression {
    source: String,
    root: Option<Node>,
}

/// Context expression declared on a changeset
pub type ContextExpression = Expression;

/// Label filter expression supplied by the caller
pub type LabelExpression = Expression;

impl Expression {
    /// Parse an expression; blank input yields the empty expression
    pub fn parse(source: &str) -> Result<Self> {
        let tokens: Vec<&str> = TOKEN_PATTERN
            .find_iter(source)
            .map(|m| m.as_str())
            .collect();

        if tokens.is_empty() {
            return Ok(Self::empty());
        }

        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let root = parser.parse_or()?;
        if let Some(extra) = parser.peek() {
            return Err(parser.error(format!("unexpected '{extra}'")));
        }

        Ok(Self {
            source: source.trim().to_string(),
            root: Some(root),
        })
    }

    /// The expression that matches everything
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Evaluate against a set of names; the empty expression always matches
    pub fn matches(&self, names: &NameSet) -> bool {
        match &self.root {
            Some(root) => root.eval(names),
            None => true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<&'a str> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, reason: String) -> ChangeguardError {
        ChangeguardError::Expression {
            expression: self.source.to_string(),
            reason,
        }
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut left = self.parse_and()?;
        while let Some(token) = self.peek() {
            if token != "," && !token.eq_ignore_ascii_case("or") {
                break;
            }
            self.pos += 1;
            let right = self.parse_and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;
        while let Some(token) = self.peek() {
            if !token.eq_ignore_ascii_case("and") {
                break;
            }
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let token = self
            .next()
            .ok_or_else(|| self.error("unexpected end of expression".to_string()))?;

        match token {
            "!" => Ok(Node::Not(Box::new(self.parse_unary()?))),
            t if t.eq_ignore_ascii_case("not") => Ok(Node::Not(Box::new(self.parse_unary()?))),
            "(" => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(")") => Ok(inner),
                    _ => Err(self.error("missing closing parenthesis".to_string())),
                }
            }
            ")" | "," => Err(self.error(format!("unexpected '{token}'"))),
            t if t.eq_ignore_ascii_case("and") || t.eq_ignore_ascii_case("or") => {
                Err(self.error(format!("unexpected keyword '{t}'")))
            }
            name => Ok(Node::Name(name.to_lowercase())),
        }
    }
}
