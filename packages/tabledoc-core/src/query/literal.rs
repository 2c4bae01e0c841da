//! Literal query text with named parameters.

use std::collections::{BTreeMap, BTreeSet};

use super::compiler::CompiledQuery;
use crate::convert::RowConverter;
use crate::error::DbError;
use crate::mapping::MappingContext;
use crate::types::{FieldType, ObjectValue};

/// A query written as text, with `$name` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralQuery {
    text: String,
    /// Referenced parameter names, with the `$` prefix
    parameters: BTreeSet<String>,
}

impl LiteralQuery {
    /// Scans `text` for its parameters.
    ///
    /// # Returns
    /// The query, or `DbError::InvalidQuery` if the text uses positional
    /// `?` placeholders.
    pub fn parse(text: impl Into<String>) -> Result<Self, DbError> {
        let text = text.into();
        let mut parameters = BTreeSet::new();
        let mut quote: Option<char> = None;
        let mut chars = text.char_indices().peekable();

        while let Some((at, c)) = chars.next() {
            if let Some(open) = quote {
                if c == open {
                    quote = None;
                }
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '?' => {
                    return Err(DbError::invalid_query(format!(
                        "positional parameter at offset {} is not supported, use $name",
                        at
                    )))
                }
                '$' => {
                    let mut name = String::from("$");
                    while let Some(&(_, next)) = chars.peek() {
                        if next.is_ascii_alphanumeric() || next == '_' {
                            name.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.len() > 1 {
                        parameters.insert(name);
                    }
                }
                _ => {}
            }
        }

        Ok(Self { text, parameters })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parameter names referenced by the text, `$`-prefixed and sorted.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(String::as_str)
    }

    /// Binds named arguments.
    ///
    /// # Arguments
    /// * `converter` - Encodes argument values the way documents store them
    /// * `arguments` - `(name, value)` pairs; names may omit the `$` prefix
    ///
    /// # Returns
    /// The bound query. Fails if an argument is unnamed or unknown, or if a
    /// referenced parameter has no argument.
    pub fn bind(
        &self,
        converter: &RowConverter<'_>,
        arguments: Vec<(Option<String>, ObjectValue)>,
    ) -> Result<CompiledQuery, DbError> {
        let mut bound = BTreeMap::new();
        for (index, (name, value)) in arguments.into_iter().enumerate() {
            let name = name.ok_or_else(|| {
                DbError::invalid_query(format!(
                    "argument {} has no name; literal queries bind by name only",
                    index
                ))
            })?;
            let name = match name.starts_with('$') {
                true => name,
                false => format!("${}", name),
            };
            if !self.parameters.contains(&name) {
                return Err(DbError::invalid_query(format!(
                    "argument '{}' does not appear in query: {}",
                    name, self.text
                )));
            }
            let encoded = converter.encode(&name[1..], &FieldType::Any, &value)?;
            bound.insert(name, encoded);
        }

        if let Some(missing) = self.parameters.iter().find(|p| !bound.contains_key(*p)) {
            return Err(DbError::invalid_query(format!(
                "parameter '{}' has no argument",
                missing
            )));
        }

        Ok(CompiledQuery {
            text: self.text.clone(),
            parameters: bound,
        })
    }

    /// Parses `text` and binds `arguments` in one step.
    pub fn compile(
        context: &MappingContext,
        text: &str,
        arguments: Vec<(Option<String>, ObjectValue)>,
    ) -> Result<CompiledQuery, DbError> {
        Self::parse(text)?.bind(&RowConverter::new(context), arguments)
    }
}
