//! Compilation of query descriptors into parameterized statements.

use std::collections::BTreeMap;

use super::criteria::{Criteria, Criterion, OperatorKind};
use super::descriptor::{Direction, Pageable, QueryDescriptor, QueryMode};
use crate::convert::{sql_type_of, RowConverter};
use crate::error::DbError;
use crate::mapping::{EntityDescriptor, MappingContext, ResolvedPath, DOCUMENT_COLUMN};
use crate::types::{FieldValue, ObjectValue};

/// Name of the page size parameter.
pub const LIMIT_PARAMETER: &str = "$kv_limit";
/// Name of the page offset parameter.
pub const OFFSET_PARAMETER: &str = "$kv_offset";

const TABLE_ALIAS: &str = "t";

/// Statement text plus the values of its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    /// Parameter values by `$`-prefixed name
    pub parameters: BTreeMap<String, FieldValue>,
}

/// Compiles query descriptors against entity descriptors.
///
/// Stateless apart from the context; each call compiles independently, so
/// compiling the same descriptor twice yields the same text and parameters.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    context: &'a MappingContext,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(context: &'a MappingContext) -> Self {
        Self { context }
    }

    /// Compiles a descriptor into a statement over the table of `entity`.
    ///
    /// # Arguments
    /// * `entity` - Entity whose table is queried
    /// * `descriptor` - Filter, sort, paging, mode and projection
    ///
    /// # Returns
    /// The statement, or `DbError::InvalidQuery`/`UnknownProperty` when the
    /// descriptor does not fit the entity.
    pub fn compile(
        &self,
        entity: &EntityDescriptor,
        descriptor: &QueryDescriptor,
    ) -> Result<CompiledQuery, DbError> {
        let mut compilation = Compilation::new(self.context, entity);

        let select = match descriptor.mode {
            QueryMode::Count if descriptor.distinct => {
                return Err(DbError::invalid_query(format!(
                    "distinct rows of '{}' cannot be counted",
                    entity.type_name()
                )))
            }
            QueryMode::Count => "SELECT count(*) AS count".to_string(),
            _ => compilation.select_list(descriptor)?,
        };
        let mut body = format!("{} FROM {} {}", select, entity.table_name(), TABLE_ALIAS);

        if let Some(criteria) = &descriptor.criteria {
            let condition = compilation.criteria(criteria)?;
            body.push_str(" WHERE ");
            body.push_str(&condition);
        }

        if descriptor.mode != QueryMode::Count {
            let sort = descriptor.effective_sort();
            if !sort.is_empty() {
                let orders = sort
                    .orders()
                    .iter()
                    .map(|order| {
                        let (field, _) = compilation.field(&order.path)?;
                        Ok(match order.direction {
                            Direction::Asc => format!("{} ASC", field),
                            Direction::Desc => format!("{} DESC", field),
                        })
                    })
                    .collect::<Result<Vec<_>, DbError>>()?;
                body.push_str(" ORDER BY ");
                body.push_str(&orders.join(", "));
            }

            if descriptor.mode == QueryMode::Exists {
                body.push_str(" LIMIT 1");
            } else {
                compilation.paging(descriptor, &mut body);
            }
        }

        let text = match compilation.declarations.is_empty() {
            true => body,
            false => {
                let declarations: Vec<String> = compilation
                    .declarations
                    .iter()
                    .map(|(name, sql_type)| format!("{} {};", name, sql_type))
                    .collect();
                format!("DECLARE {} {}", declarations.join(" "), body)
            }
        };
        tracing::debug!("Compiled query for '{}': {}", entity.type_name(), text);

        Ok(CompiledQuery {
            text,
            parameters: compilation.parameters,
        })
    }

    /// Compiles only a predicate tree into a condition.
    pub fn compile_criteria(
        &self,
        entity: &EntityDescriptor,
        criteria: &Criteria,
    ) -> Result<CompiledQuery, DbError> {
        let mut compilation = Compilation::new(self.context, entity);
        let text = compilation.criteria(criteria)?;
        Ok(CompiledQuery {
            text,
            parameters: compilation.parameters,
        })
    }
}

/// State of one compilation.
struct Compilation<'c> {
    context: &'c MappingContext,
    entity: &'c EntityDescriptor,
    parameters: BTreeMap<String, FieldValue>,
    /// Parameter declarations, in order of first use
    declarations: Vec<(String, String)>,
}

impl<'c> Compilation<'c> {
    fn new(context: &'c MappingContext, entity: &'c EntityDescriptor) -> Self {
        Self {
            context,
            entity,
            parameters: BTreeMap::new(),
            declarations: Vec::new(),
        }
    }

    fn select_list(&self, descriptor: &QueryDescriptor) -> Result<String, DbError> {
        let distinct = if descriptor.distinct { "DISTINCT " } else { "" };
        let projection = descriptor
            .projection
            .as_deref()
            .filter(|name| *name != self.entity.type_name());
        let Some(projection) = projection else {
            return Ok(format!("SELECT {}*", distinct));
        };

        let registry = self.context.registry();
        let info = registry
            .get(projection)
            .ok_or_else(|| DbError::UnregisteredType(projection.to_string()))?;

        let mut columns = Vec::new();
        let mut document = Vec::new();
        for property in info.properties().iter().filter(|p| !p.is_transient()) {
            if property.name() == self.entity.id().name && self.entity.is_composite() {
                for column in self.entity.key_columns() {
                    columns.push(format!("{}.{}", TABLE_ALIAS, column.name));
                }
                continue;
            }
            match self.entity.resolve_path(property.name(), registry) {
                Ok(ResolvedPath::Key { column, .. }) => {
                    columns.push(format!("{}.{}", TABLE_ALIAS, column));
                }
                Ok(ResolvedPath::Document { path, .. }) => document.push(format!(
                    "\"{}\": {}.{}.{}",
                    property.name(),
                    TABLE_ALIAS,
                    DOCUMENT_COLUMN,
                    path
                )),
                Err(_) => tracing::debug!(
                    "Projection property '{}' of '{}' is not a property of '{}'",
                    property.name(),
                    projection,
                    self.entity.type_name()
                ),
            }
        }

        if columns.is_empty() && document.is_empty() {
            return Err(DbError::invalid_query(format!(
                "no property of projection '{}' resolves on entity '{}'",
                projection,
                self.entity.type_name()
            )));
        }
        if !document.is_empty() {
            columns.push(format!("{{{}}} AS {}", document.join(", "), DOCUMENT_COLUMN));
        }
        Ok(format!("SELECT {}{}", distinct, columns.join(", ")))
    }

    fn paging(&mut self, descriptor: &QueryDescriptor, body: &mut String) {
        let limit = match (&descriptor.pageable, descriptor.limit) {
            (Some(pageable), Some(limit)) => Some(pageable.size.min(limit)),
            (Some(pageable), None) => Some(pageable.size),
            (None, limit) => limit,
        };
        if let Some(limit) = limit {
            self.declare(LIMIT_PARAMETER, long(limit));
            body.push_str(&format!(" LIMIT {}", LIMIT_PARAMETER));
        }
        if let Some(pageable) = &descriptor.pageable {
            self.declare(OFFSET_PARAMETER, long(Pageable::offset(pageable)));
            body.push_str(&format!(" OFFSET {}", OFFSET_PARAMETER));
        }
    }

    fn criteria(&mut self, criteria: &Criteria) -> Result<String, DbError> {
        match criteria {
            Criteria::Leaf(leaf) => self.leaf(leaf),
            Criteria::Composite {
                junction,
                left,
                right,
            } => {
                let left = self.criteria(left)?;
                let right = self.criteria(right)?;
                Ok(format!("({} {} {})", left, junction, right))
            }
        }
    }

    /// Resolves a path to its field reference.
    fn field(&self, path: &str) -> Result<(String, ResolvedPath<'c>), DbError> {
        let resolved = self.context.resolve_path(self.entity, path)?;
        let reference = match &resolved {
            ResolvedPath::Key { column, .. } => format!("{}.{}", TABLE_ALIAS, column),
            ResolvedPath::Document { path, .. } => {
                format!("{}.{}.{}", TABLE_ALIAS, DOCUMENT_COLUMN, path)
            }
        };
        Ok((reference, resolved))
    }

    fn leaf(&mut self, leaf: &Criterion) -> Result<String, DbError> {
        let arity = leaf.kind.arity();
        if leaf.values.len() != arity {
            return Err(DbError::invalid_query(format!(
                "{:?} on '{}' takes {} value(s), got {}",
                leaf.kind,
                leaf.path,
                arity,
                leaf.values.len()
            )));
        }
        if leaf.kind == OperatorKind::All {
            return Ok("true".to_string());
        }

        let (field, resolved) = self.field(&leaf.path)?;
        let ignore_case = leaf.ignore_case;
        let fragment = match leaf.kind {
            OperatorKind::Equal
            | OperatorKind::NotEqual
            | OperatorKind::Before
            | OperatorKind::After
            | OperatorKind::LessThan
            | OperatorKind::LessThanEqual
            | OperatorKind::GreaterThan
            | OperatorKind::GreaterThanEqual => {
                let parameter = self.bind_value(leaf, &resolved, 0)?;
                let (field, parameter) = comparable(&resolved, ignore_case, field, parameter);
                format!("{} {} {}", field, comparison(leaf.kind), parameter)
            }
            OperatorKind::Between => {
                let low = self.bind_value(leaf, &resolved, 0)?;
                let high = self.bind_value(leaf, &resolved, 1)?;
                let (field, low) = comparable(&resolved, ignore_case, field, low);
                let (_, high) = comparable(&resolved, ignore_case, String::new(), high);
                format!("({} >= {} AND {} <= {})", field, low, field, high)
            }
            OperatorKind::In | OperatorKind::NotIn => {
                if !matches!(leaf.values[0], ObjectValue::List(_)) {
                    return Err(DbError::invalid_query(format!(
                        "{:?} on '{}' requires a collection value, got {}",
                        leaf.kind,
                        leaf.path,
                        leaf.values[0].kind_name()
                    )));
                }
                let parameter = self.bind_value(leaf, &resolved, 0)?;
                let membership = match ignore_case {
                    true => format!(
                        "lower({}) =any seq_transform({}[], lower($))",
                        field, parameter
                    ),
                    false => format!("{} =any {}[]", field, parameter),
                };
                negate_if(leaf.kind == OperatorKind::NotIn, membership)
            }
            OperatorKind::IsNull => format!("{} IS NULL", field),
            OperatorKind::IsNotNull => format!("{} IS NOT NULL", field),
            OperatorKind::StartingWith | OperatorKind::EndingWith => {
                let parameter = self.bind_value(leaf, &resolved, 0)?;
                let (field, parameter) = lowered(ignore_case, field, parameter);
                let function = match leaf.kind {
                    OperatorKind::StartingWith => "starts_with",
                    _ => "ends_with",
                };
                format!("{}({}, {})", function, field, parameter)
            }
            OperatorKind::Containing | OperatorKind::NotContaining => {
                let parameter = self.bind_value(leaf, &resolved, 0)?;
                let containment = match (resolved.field_type().is_sequence(), ignore_case) {
                    (true, true) => format!(
                        "lower({}) =any seq_transform({}[], lower($))",
                        parameter, field
                    ),
                    (true, false) => format!("{} =any {}[]", parameter, field),
                    (false, _) => {
                        let (field, parameter) = lowered(ignore_case, field, parameter);
                        format!("contains({}, {})", field, parameter)
                    }
                };
                negate_if(leaf.kind == OperatorKind::NotContaining, containment)
            }
            OperatorKind::Regex | OperatorKind::Like | OperatorKind::NotLike => {
                let pattern = match &leaf.values[0] {
                    ObjectValue::String(pattern) => pattern,
                    other => {
                        return Err(DbError::invalid_query(format!(
                            "{:?} on '{}' requires a string pattern, got {}",
                            leaf.kind,
                            leaf.path,
                            other.kind_name()
                        )))
                    }
                };
                let regex = match leaf.kind {
                    OperatorKind::Regex => pattern.clone(),
                    _ => like_to_regex(pattern),
                };
                let parameter = self.bind(&leaf.path, FieldValue::String(regex));
                let matching = match ignore_case {
                    true => format!("regex_like({}, {}, \"i\")", field, parameter),
                    false => format!("regex_like({}, {})", field, parameter),
                };
                negate_if(leaf.kind == OperatorKind::NotLike, matching)
            }
            OperatorKind::Exists => format!("EXISTS {}", field),
            OperatorKind::Near => {
                let center = self.bind_shape(leaf, 0)?;
                let radius = match &leaf.values[1] {
                    ObjectValue::Double(v) => *v,
                    ObjectValue::Float(v) => f64::from(*v),
                    ObjectValue::Int(v) => f64::from(*v),
                    ObjectValue::Long(v) => *v as f64,
                    other => {
                        return Err(DbError::invalid_query(format!(
                            "Near on '{}' requires a numeric radius, got {}",
                            leaf.path,
                            other.kind_name()
                        )))
                    }
                };
                let radius = self.bind(&leaf.path, FieldValue::Double(radius));
                format!("geo_near({}, {}, {})", field, center, radius)
            }
            OperatorKind::Within => {
                let shape = self.bind_shape(leaf, 0)?;
                format!("geo_inside({}, {})", field, shape)
            }
            OperatorKind::True => format!("{} = true", field),
            OperatorKind::False => format!("{} = false", field),
            OperatorKind::All => "true".to_string(),
        };
        Ok(fragment)
    }

    /// Encodes the `index`th value of a leaf for its path and binds it.
    fn bind_value(
        &mut self,
        leaf: &Criterion,
        resolved: &ResolvedPath<'_>,
        index: usize,
    ) -> Result<String, DbError> {
        let converter = RowConverter::new(self.context);
        let value = converter.to_bind_value(resolved, &leaf.values[index])?;
        Ok(self.bind(&leaf.path, value))
    }

    /// Binds the `index`th value of a geo leaf as the shape it holds, which
    /// need not be the shape the property is declared with.
    fn bind_shape(&mut self, leaf: &Criterion, index: usize) -> Result<String, DbError> {
        let value = match &leaf.values[index] {
            ObjectValue::Point(point) => point.to_field_value(),
            ObjectValue::Polygon(polygon) => polygon.to_field_value(),
            other => {
                return Err(DbError::invalid_query(format!(
                    "{:?} on '{}' requires a geo shape, got {}",
                    leaf.kind,
                    leaf.path,
                    other.kind_name()
                )))
            }
        };
        Ok(self.bind(&leaf.path, value))
    }

    /// Adds a fresh `$p_<path>` parameter, suffixing a counter on collision.
    fn bind(&mut self, path: &str, value: FieldValue) -> String {
        let base: String = format!("$p_{}", path)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '$' { c } else { '_' })
            .collect();
        let mut name = base.clone();
        let mut counter = 1;
        while self.parameters.contains_key(&name) {
            name = format!("{}{}", base, counter);
            counter += 1;
        }
        self.declare(&name, value);
        name
    }

    fn declare(&mut self, name: &str, value: FieldValue) {
        self.declarations
            .push((name.to_string(), sql_type_of(&value)));
        self.parameters.insert(name.to_string(), value);
    }
}

fn comparison(kind: OperatorKind) -> &'static str {
    match kind {
        OperatorKind::NotEqual => "!=",
        OperatorKind::Before | OperatorKind::LessThan => "<",
        OperatorKind::LessThanEqual => "<=",
        OperatorKind::After | OperatorKind::GreaterThan => ">",
        OperatorKind::GreaterThanEqual => ">=",
        _ => "=",
    }
}

/// Applies the timestamp cast of temporal document fields, then case
/// folding.
fn comparable(
    resolved: &ResolvedPath<'_>,
    ignore_case: bool,
    field: String,
    parameter: String,
) -> (String, String) {
    let (field, parameter) = match resolved {
        ResolvedPath::Document { field_type, .. } if field_type.is_temporal() => (
            format!("CAST({} AS TIMESTAMP)", field),
            format!("CAST({} AS TIMESTAMP)", parameter),
        ),
        _ => (field, parameter),
    };
    lowered(ignore_case, field, parameter)
}

fn lowered(ignore_case: bool, field: String, parameter: String) -> (String, String) {
    match ignore_case {
        true => (format!("lower({})", field), format!("lower({})", parameter)),
        false => (field, parameter),
    }
}

fn negate_if(negate: bool, condition: String) -> String {
    match negate {
        true => format!("NOT ({})", condition),
        false => condition,
    }
}

fn long(value: u64) -> FieldValue {
    FieldValue::Long(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Converts a SQL `LIKE` pattern to an anchored-free regular expression.
///
/// `%` matches any run, `_` any single character and `\` escapes the next
/// character.
pub fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    push_literal(&mut regex, escaped);
                }
            }
            other => push_literal(&mut regex, other),
        }
    }
    regex
}

fn push_literal(regex: &mut String, c: char) {
    if "\\.+*?()|[]{}^$".contains(c) {
        regex.push('\\');
    }
    regex.push(c);
}
