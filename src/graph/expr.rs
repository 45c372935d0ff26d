// Copyright (c) 2025 - Cowboy AI, Inc.
//! Interpolation expressions
//!
//! An [`Expr`] is a string template made of literal text and references to
//! attributes of declared resources. References remember which stack declared
//! the resource, so synthesis can turn a reference into a local interpolation
//! (`${aws_vpc.main.id}`) or a remote-state lookup when it crosses stacks.

use std::fmt;

use crate::domain::StackId;

/// Attribute of a resource declared in some stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    origin: StackId,
    address: String,
    attribute: String,
}

impl Reference {
    pub(crate) fn new(origin: StackId, address: String, attribute: impl Into<String>) -> Self {
        Self {
            origin,
            address,
            attribute: attribute.into(),
        }
    }

    /// Stack that declared the resource
    pub fn origin(&self) -> &StackId {
        &self.origin
    }

    /// Engine address, e.g. `aws_vpc.main` or `data.aws_ecr_authorization_token.auth`
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Attribute path, e.g. `id` or `identity[0].oidc[0].issuer`
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// `address.attribute`, the body of a local interpolation
    pub fn traversal(&self) -> String {
        format!("{}.{}", self.address, self.attribute)
    }
}

/// One piece of an [`Expr`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    Reference(Reference),
}

/// String template of literals and attribute references
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expr {
    parts: Vec<Part>,
}

impl Expr {
    /// Plain text, no references
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            parts: vec![Part::Literal(text)],
        }
    }

    pub(crate) fn reference(reference: Reference) -> Self {
        Self {
            parts: vec![Part::Reference(reference)],
        }
    }

    /// Join expressions end to end
    ///
    /// ```rust
    /// use cim_infrastructure_aws::graph::Expr;
    ///
    /// let tag = Expr::concat([Expr::literal("registry"), Expr::literal(":latest")]);
    /// assert_eq!(tag.as_literal(), Some("registry:latest".to_string()));
    /// ```
    pub fn concat(exprs: impl IntoIterator<Item = Expr>) -> Self {
        let mut joined = Self::default();
        for expr in exprs {
            for part in expr.parts {
                joined.push(part);
            }
        }
        joined
    }

    /// Append literal text
    pub fn push_str(&mut self, text: &str) {
        if !text.is_empty() {
            self.push(Part::Literal(text.to_string()));
        }
    }

    /// Append another expression
    pub fn append(mut self, other: impl Into<Expr>) -> Self {
        for part in other.into().parts {
            self.push(part);
        }
        self
    }

    fn push(&mut self, part: Part) {
        match (self.parts.last_mut(), part) {
            (Some(Part::Literal(tail)), Part::Literal(text)) => tail.push_str(&text),
            (_, part) => self.parts.push(part),
        }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// All references in order of appearance
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.parts.iter().filter_map(|part| match part {
            Part::Reference(reference) => Some(reference),
            Part::Literal(_) => None,
        })
    }

    /// The text, when the expression holds no references
    pub fn as_literal(&self) -> Option<String> {
        let mut text = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(literal) => text.push_str(literal),
                Part::Reference(_) => return None,
            }
        }
        Some(text)
    }

    /// Render with a caller-supplied resolution for each reference
    ///
    /// The resolver returns the traversal to place inside `${...}`. Literal
    /// text is escaped so the engine never reads it as a template.
    pub fn render<E>(
        &self,
        resolve: &mut dyn FnMut(&Reference) -> Result<String, E>,
    ) -> Result<String, E> {
        let mut rendered = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => rendered.push_str(&escape_template(text)),
                Part::Reference(reference) => {
                    rendered.push_str("${");
                    rendered.push_str(&resolve(reference)?);
                    rendered.push('}');
                }
            }
        }
        Ok(rendered)
    }
}

/// Escape template sequences in literal text
///
/// ```rust
/// use cim_infrastructure_aws::graph::expr::escape_template;
///
/// assert_eq!(escape_template("${var.secret}"), "$${var.secret}");
/// assert_eq!(escape_template("%{ if x }"), "%%{ if x }");
/// assert_eq!(escape_template("$HOME 50%"), "$HOME 50%");
/// ```
pub fn escape_template(text: &str) -> String {
    text.replace("${", "$${").replace("%{", "%%{")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                Part::Literal(text) => f.write_str(text)?,
                Part::Reference(reference) => write!(f, "${{{}}}", reference.traversal())?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::literal(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::literal(value)
    }
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}
