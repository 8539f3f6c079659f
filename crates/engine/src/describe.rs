//! Canonical command strings produced by [`Field::describe`](crate::Field::describe).
//!
//! The format is `<type> field <name> (<param> <value>...)*`. Tokens are
//! separated by single spaces; a name is double-quoted when it is empty or
//! contains whitespace, a quote, a backslash or `#`. Numbers use Rust's
//! shortest round-tripping `Display` form, so parsing a described command
//! reproduces every parameter bit for bit.

use std::fmt::Display;

/// Incremental builder for one command line.
#[derive(Debug)]
pub struct CommandBuilder {
    tokens: Vec<String>,
}

impl CommandBuilder {
    /// Start a `<kind> field <name>` command.
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            tokens: vec![kind.to_string(), "field".to_string(), quote(name)],
        }
    }

    /// Append a bare parameter keyword.
    pub fn keyword(&mut self, keyword: &str) -> &mut Self {
        self.tokens.push(keyword.to_string());
        self
    }

    /// Append a name (field, curve, time keeper), quoted when needed.
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.tokens.push(quote(name));
        self
    }

    /// Append `keyword name`.
    pub fn named(&mut self, keyword: &str, name: &str) -> &mut Self {
        self.keyword(keyword).name(name)
    }

    /// Append one plain value.
    pub fn value(&mut self, value: impl Display) -> &mut Self {
        self.tokens.push(value.to_string());
        self
    }

    /// Append `keyword v1 v2 ...`.
    pub fn values<T: Display>(&mut self, keyword: &str, values: &[T]) -> &mut Self {
        self.keyword(keyword);
        for v in values {
            self.value(v);
        }
        self
    }

    pub fn finish(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Quote `name` if it would not survive whitespace tokenizing unchanged.
pub fn quote(name: &str) -> String {
    let needs_quotes = name.is_empty()
        || name
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\' || c == '#');
    if !needs_quotes {
        return name.to_string();
    }
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
