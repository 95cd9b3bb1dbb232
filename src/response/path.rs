//! Path expressions locating values inside provider responses.
//!
//! Grammar: dot-separated property names, each optionally followed by one or
//! more bracketed indices, e.g. `choices[0].message.content` or
//! `candidates[0].content.parts[0].text`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// A single step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Object property lookup.
    Key(String),
    /// Array element lookup.
    Index(usize),
}

/// Errors raised when a path expression is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The expression is empty.
    #[error("Path expression is empty")]
    Empty,
    /// A segment between dots is empty.
    #[error("Empty segment in path '{0}'")]
    EmptySegment(String),
    /// A bracket is unbalanced or its contents are not a non-negative integer.
    #[error("Invalid index in path segment '{0}'")]
    InvalidIndex(String),
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePath {
    steps: Vec<PathStep>,
}

impl ResponsePath {
    /// Parses a path expression.
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(PathError::Empty);
        }

        let mut steps = Vec::new();
        for segment in expr.split('.') {
            parse_segment(segment, expr, &mut steps)?;
        }
        Ok(Self { steps })
    }

    /// Returns the parsed steps.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Walks `value` along this path. Any missing key, out-of-range index or
    /// type mismatch yields `None`.
    pub fn resolve<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.steps
            .iter()
            .try_fold(value, |current, step| match step {
                PathStep::Key(key) => current.get(key.as_str()),
                PathStep::Index(index) => current.get(*index),
            })
    }
}

fn parse_segment(segment: &str, expr: &str, steps: &mut Vec<PathStep>) -> Result<(), PathError> {
    let (name, mut brackets) = match segment.find('[') {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };

    if name.is_empty() && brackets.is_empty() {
        return Err(PathError::EmptySegment(expr.to_string()));
    }
    if name.contains(']') {
        return Err(PathError::InvalidIndex(segment.to_string()));
    }
    if !name.is_empty() {
        steps.push(PathStep::Key(name.to_string()));
    }

    while !brackets.is_empty() {
        let inner = brackets
            .strip_prefix('[')
            .and_then(|b| b.split_once(']'))
            .ok_or_else(|| PathError::InvalidIndex(segment.to_string()))?;
        let index = inner
            .0
            .trim()
            .parse::<usize>()
            .map_err(|_| PathError::InvalidIndex(segment.to_string()))?;
        steps.push(PathStep::Index(index));
        brackets = inner.1;
    }

    Ok(())
}

impl FromStr for ResponsePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Key(key) if i == 0 => write!(f, "{key}")?,
                PathStep::Key(key) => write!(f, ".{key}")?,
                PathStep::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
