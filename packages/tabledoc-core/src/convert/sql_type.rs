use crate::types::FieldValue;

/// Returns the type name a bind variable holding `value` is declared with.
///
/// Arrays declare their element type; empty or mixed arrays fall back to
/// `ARRAY(ANY)`.
pub fn sql_type_of(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "ANY".to_string(),
        FieldValue::Integer(_) => "INTEGER".to_string(),
        FieldValue::Long(_) => "LONG".to_string(),
        FieldValue::Float(_) => "FLOAT".to_string(),
        FieldValue::Double(_) => "DOUBLE".to_string(),
        FieldValue::Number(_) | FieldValue::BigNumber(_) => "NUMBER".to_string(),
        FieldValue::String(_) => "STRING".to_string(),
        FieldValue::Boolean(_) => "BOOLEAN".to_string(),
        FieldValue::Binary(_) => "BINARY".to_string(),
        FieldValue::Timestamp(_) => "TIMESTAMP(9)".to_string(),
        FieldValue::Map(_) => "JSON".to_string(),
        FieldValue::Array(items) => format!("ARRAY({})", element_type(items)),
    }
}

fn element_type(items: &[FieldValue]) -> String {
    let mut types = items.iter().map(sql_type_of);
    let Some(first) = types.next() else {
        tracing::debug!("Empty array parameter, declaring ARRAY(ANY)");
        return "ANY".to_string();
    };
    if types.any(|t| t != first) {
        tracing::debug!("Heterogeneous array parameter, declaring ARRAY(ANY)");
        return "ANY".to_string();
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_scalar_types() {
        assert_eq!(sql_type_of(&FieldValue::from("x")), "STRING");
        assert_eq!(sql_type_of(&FieldValue::from(1i32)), "INTEGER");
        assert_eq!(sql_type_of(&FieldValue::from(1i64)), "LONG");
        assert_eq!(sql_type_of(&FieldValue::Binary(vec![1])), "BINARY");
        assert_eq!(sql_type_of(&FieldValue::Map(BTreeMap::new())), "JSON");
    }

    #[test]
    fn test_array_types() {
        let strings = FieldValue::Array(vec![FieldValue::from("a"), FieldValue::from("b")]);
        assert_eq!(sql_type_of(&strings), "ARRAY(STRING)");

        let mixed = FieldValue::Array(vec![FieldValue::from("a"), FieldValue::from(1i64)]);
        assert_eq!(sql_type_of(&mixed), "ARRAY(ANY)");

        assert_eq!(sql_type_of(&FieldValue::Array(Vec::new())), "ARRAY(ANY)");

        let nested = FieldValue::Array(vec![strings.clone(), strings]);
        assert_eq!(sql_type_of(&nested), "ARRAY(ARRAY(STRING))");
    }
}
