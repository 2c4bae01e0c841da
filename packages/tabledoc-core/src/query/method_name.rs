//! Query derivation from repository-style method names.
//!
//! `findDistinctTop3ByLastNameAndAgeGreaterThanOrderByAgeDesc` selects up
//! to three distinct rows whose `lastName` equals the first argument and
//! whose `age` exceeds the second, oldest first. `And` binds tighter than
//! `Or`; nested properties are separated by `_` (`Address_City`).

use super::criteria::{Criteria, OperatorKind};
use super::descriptor::{Direction, QueryDescriptor, QueryMode, Sort};
use crate::error::DbError;
use crate::mapping::{EntityDescriptor, TypeRegistry};
use crate::types::{FieldType, ObjectValue};

const SELECT_PREFIXES: [&str; 6] = ["find", "read", "get", "query", "search", "stream"];

/// Operator keywords as camel-case word sequences. Longer sequences are
/// tried first, so `IsNotNull` wins over `NotNull` and `Null`.
const KEYWORDS: &[(&[&str], OperatorKind)] = &[
    (&["Is", "Not", "Null"], OperatorKind::IsNotNull),
    (&["Is", "Not", "In"], OperatorKind::NotIn),
    (&["Is", "Not", "Like"], OperatorKind::NotLike),
    (&["Less", "Than", "Equal"], OperatorKind::LessThanEqual),
    (&["Greater", "Than", "Equal"], OperatorKind::GreaterThanEqual),
    (&["Not", "Containing"], OperatorKind::NotContaining),
    (&["Not", "Null"], OperatorKind::IsNotNull),
    (&["Not", "In"], OperatorKind::NotIn),
    (&["Not", "Like"], OperatorKind::NotLike),
    (&["Is", "Not"], OperatorKind::NotEqual),
    (&["Is", "Null"], OperatorKind::IsNull),
    (&["Is", "True"], OperatorKind::True),
    (&["Is", "False"], OperatorKind::False),
    (&["Is", "In"], OperatorKind::In),
    (&["Less", "Than"], OperatorKind::LessThan),
    (&["Greater", "Than"], OperatorKind::GreaterThan),
    (&["Starting", "With"], OperatorKind::StartingWith),
    (&["Starts", "With"], OperatorKind::StartingWith),
    (&["Ending", "With"], OperatorKind::EndingWith),
    (&["Ends", "With"], OperatorKind::EndingWith),
    (&["Is", "Between"], OperatorKind::Between),
    (&["Is", "Before"], OperatorKind::Before),
    (&["Is", "After"], OperatorKind::After),
    (&["Equals"], OperatorKind::Equal),
    (&["Is"], OperatorKind::Equal),
    (&["Not"], OperatorKind::NotEqual),
    (&["Null"], OperatorKind::IsNull),
    (&["Before"], OperatorKind::Before),
    (&["After"], OperatorKind::After),
    (&["In"], OperatorKind::In),
    (&["Containing"], OperatorKind::Containing),
    (&["Contains"], OperatorKind::Containing),
    (&["Matches"], OperatorKind::Regex),
    (&["Regex"], OperatorKind::Regex),
    (&["Like"], OperatorKind::Like),
    (&["Between"], OperatorKind::Between),
    (&["Exists"], OperatorKind::Exists),
    (&["Near"], OperatorKind::Near),
    (&["Within"], OperatorKind::Within),
    (&["True"], OperatorKind::True),
    (&["False"], OperatorKind::False),
];

/// One predicate of a method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Dotted property path
    pub path: String,
    pub kind: OperatorKind,
    pub ignore_case: bool,
}

/// A parsed method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodQuery {
    pub mode: QueryMode,
    pub distinct: bool,
    pub limit: Option<u64>,
    /// Alternatives joined by `Or`, each a conjunction of parts
    pub alternatives: Vec<Vec<Part>>,
    pub sort: Sort,
}

impl MethodQuery {
    /// Parses a method name.
    ///
    /// # Returns
    /// The parsed query, or `DbError::InvalidQuery` if the name does not
    /// follow the grammar.
    pub fn parse(name: &str) -> Result<Self, DbError> {
        let invalid = |reason: &str| DbError::invalid_query(format!("method '{}': {}", name, reason));

        let (mode, rest) = split_prefix(name).ok_or_else(|| invalid("unknown prefix"))?;
        let (subject, predicate) = match find_word(rest, "By") {
            Some(at) => (&rest[..at], Some(&rest[at + 2..])),
            None => (rest, None),
        };

        let distinct = subject.contains("Distinct");
        let limit = parse_limit(subject).map_err(|reason| invalid(&reason))?;

        let mut query = MethodQuery {
            mode,
            distinct,
            limit,
            alternatives: Vec::new(),
            sort: Sort::unsorted(),
        };
        let Some(mut predicate) = predicate else {
            return Ok(query);
        };

        let mut all_ignore_case = false;
        for suffix in ["AllIgnoreCase", "AllIgnoringCase"] {
            if let Some(stripped) = predicate.strip_suffix(suffix) {
                predicate = stripped;
                all_ignore_case = true;
            }
        }

        if let Some(at) = find_word(predicate, "OrderBy") {
            query.sort = parse_sort(&predicate[at + 7..]).map_err(|reason| invalid(&reason))?;
            predicate = &predicate[..at];
        }

        let words = camel_words(predicate);
        for alternative in words.split(|w| *w == "Or") {
            let mut parts = Vec::new();
            for part in alternative.split(|w| *w == "And") {
                parts.push(parse_part(part, all_ignore_case).map_err(|reason| invalid(&reason))?);
            }
            query.alternatives.push(parts);
        }
        Ok(query)
    }

    /// Number of arguments the query consumes.
    pub fn argument_count(&self) -> usize {
        self.parts().map(|p| p.kind.arity()).sum()
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.alternatives.iter().flatten()
    }

    /// Checks that every path resolves on `entity`.
    pub fn validate(&self, entity: &EntityDescriptor, registry: &TypeRegistry) -> Result<(), DbError> {
        let sort_paths = self.sort.orders().iter().map(|o| o.path.as_str());
        for path in self.parts().map(|p| p.path.as_str()).chain(sort_paths) {
            entity.resolve_path(path, registry)?;
        }
        Ok(())
    }

    /// Builds the descriptor for one invocation.
    ///
    /// # Arguments
    /// * `entity` - Entity the method queries
    /// * `registry` - Registry used to validate paths
    /// * `arguments` - Invocation arguments, consumed positionally per
    ///   operator arity
    pub fn to_descriptor(
        &self,
        entity: &EntityDescriptor,
        registry: &TypeRegistry,
        arguments: Vec<ObjectValue>,
    ) -> Result<QueryDescriptor, DbError> {
        self.validate(entity, registry)?;
        let expected = self.argument_count();
        if arguments.len() != expected {
            return Err(DbError::invalid_query(format!(
                "query on '{}' takes {} argument(s), got {}",
                entity.type_name(),
                expected,
                arguments.len()
            )));
        }

        let mut arguments = arguments.into_iter();
        let mut criteria: Option<Criteria> = None;
        for alternative in &self.alternatives {
            let mut conjunction: Option<Criteria> = None;
            for part in alternative {
                let values: Vec<ObjectValue> = arguments.by_ref().take(part.kind.arity()).collect();
                let mut leaf = Criteria::leaf(part.kind, part.path.clone(), values);
                if part.ignore_case {
                    leaf = leaf.ignoring_case();
                }
                conjunction = Some(match conjunction {
                    Some(left) => left.and(leaf),
                    None => leaf,
                });
            }
            if let Some(conjunction) = conjunction {
                criteria = Some(match criteria {
                    Some(left) => left.or(conjunction),
                    None => conjunction,
                });
            }
        }

        Ok(QueryDescriptor {
            criteria,
            sort: self.sort.clone(),
            limit: self.limit,
            pageable: None,
            distinct: self.distinct,
            mode: self.mode,
            projection: None,
        })
    }

    /// Clears `ignore_case` on parts whose property is not textual, the
    /// way `AllIgnoreCase` only applies where case exists.
    pub fn restrict_ignore_case(&mut self, entity: &EntityDescriptor, registry: &TypeRegistry) {
        for part in self.alternatives.iter_mut().flatten() {
            let textual = entity
                .resolve_path(&part.path, registry)
                .map(|resolved| {
                    let field_type = resolved.field_type();
                    let field_type = field_type.element_type().unwrap_or(field_type);
                    matches!(field_type, FieldType::String | FieldType::Enum | FieldType::Any)
                })
                .unwrap_or(false);
            if !textual {
                part.ignore_case = false;
            }
        }
    }
}

fn split_prefix(name: &str) -> Option<(QueryMode, &str)> {
    let prefixes = SELECT_PREFIXES
        .iter()
        .map(|p| (*p, QueryMode::Select))
        .chain([
            ("count", QueryMode::Count),
            ("exists", QueryMode::Exists),
            ("delete", QueryMode::Delete),
            ("remove", QueryMode::Delete),
        ]);
    for (prefix, mode) in prefixes {
        if let Some(rest) = name.strip_prefix(prefix) {
            if rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                return Some((mode, rest));
            }
        }
    }
    None
}

/// Finds `word` where it starts a camel-case word and is followed by an
/// upper-case letter or the end of the text.
fn find_word(text: &str, word: &str) -> Option<usize> {
    text.match_indices(word)
        .map(|(at, _)| at)
        .find(|&at| {
            let after = &text[at + word.len()..];
            after.is_empty() || after.starts_with(|c: char| c.is_ascii_uppercase() || c == '_')
        })
}

fn parse_limit(subject: &str) -> Result<Option<u64>, String> {
    for keyword in ["First", "Top"] {
        let Some(at) = find_limit_keyword(subject, keyword) else {
            continue;
        };
        let digits: String = subject[at + keyword.len()..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if digits.is_empty() {
            return Ok(Some(1));
        }
        let limit: u64 = digits
            .parse()
            .map_err(|_| format!("invalid limit '{}'", digits))?;
        if limit == 0 {
            return Err("limit must be positive".to_string());
        }
        return Ok(Some(limit));
    }
    Ok(None)
}

fn find_limit_keyword(subject: &str, keyword: &str) -> Option<usize> {
    subject.match_indices(keyword).map(|(at, _)| at).find(|&at| {
        let after = &subject[at + keyword.len()..];
        after.is_empty()
            || after.starts_with(|c: char| c.is_ascii_digit() || c.is_ascii_uppercase())
    })
}

fn parse_sort(clause: &str) -> Result<Sort, String> {
    let mut sort = Sort::unsorted();
    let mut property: Vec<&str> = Vec::new();
    for word in camel_words(clause) {
        let direction = match word {
            "Asc" => Direction::Asc,
            "Desc" => Direction::Desc,
            other => {
                property.push(other);
                continue;
            }
        };
        if property.is_empty() {
            return Err("sort direction without property".to_string());
        }
        sort = sort.then(property_path(&property)?, direction);
        property.clear();
    }
    if !property.is_empty() {
        sort = sort.then(property_path(&property)?, Direction::Asc);
    }
    if sort.is_empty() {
        return Err("empty OrderBy clause".to_string());
    }
    Ok(sort)
}

fn parse_part(words: &[&str], all_ignore_case: bool) -> Result<Part, String> {
    let mut words = words;
    let mut ignore_case = all_ignore_case;
    for suffix in [["Ignore", "Case"], ["Ignoring", "Case"]] {
        if let Some(stripped) = words.strip_suffix(&suffix[..]) {
            words = stripped;
            ignore_case = true;
        }
    }

    let (kind, property) = KEYWORDS
        .iter()
        .find_map(|(keyword, kind)| {
            words
                .strip_suffix(*keyword)
                .filter(|property| !property.is_empty())
                .map(|property| (*kind, property))
        })
        .unwrap_or((OperatorKind::Equal, words));

    Ok(Part {
        path: property_path(property)?,
        kind,
        ignore_case,
    })
}

/// Joins camel-case words into a dotted path of lower-camel segments.
fn property_path(words: &[&str]) -> Result<String, String> {
    if words.is_empty() {
        return Err("missing property".to_string());
    }
    let mut segments = Vec::new();
    for segment in words.split(|w| *w == "_") {
        if segment.is_empty() {
            return Err("empty nested property segment".to_string());
        }
        let joined = segment.concat();
        let mut chars = joined.chars();
        let segment = match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        segments.push(segment);
    }
    Ok(segments.join("."))
}

/// Splits camel-case text into words; `_` becomes a word of its own and
/// digits stay with the preceding word.
fn camel_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = 0;
    for (at, c) in text.char_indices() {
        if c == '_' {
            if start < at {
                words.push(&text[start..at]);
            }
            words.push("_");
            start = at + 1;
        } else if c.is_ascii_uppercase() && at > start {
            words.push(&text[start..at]);
            start = at;
        }
    }
    if start < text.len() {
        words.push(&text[start..]);
    }
    words
}
