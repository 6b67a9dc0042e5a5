//! JSON Schema validation for boundary shapes

use crate::contract::ValidationErrors;
use jsonschema::Validator;
use serde_json::Value;

/// Validate `data` against `schema`, collecting every violation
///
/// An uncompilable schema is reported as a single error on `$`.
pub fn collect_schema_errors(data: &Value, schema: &Value) -> ValidationErrors {
    let validator = match Validator::new(schema) {
        Ok(validator) => validator,
        Err(e) => return ValidationErrors::single("$", format!("invalid JSON Schema: {e}")),
    };

    let mut errors = ValidationErrors::new();
    for error in validator.iter_errors(data) {
        let message = error.to_string();
        let field = field_name(&error.instance_path.to_string(), &message);
        errors.push(field, message);
    }
    errors
}

/// `/a/b` becomes `a.b`. Root-level errors name the property when the
/// message starts with a quoted one (missing required properties), else `$`.
fn field_name(pointer: &str, message: &str) -> String {
    let path = pointer.trim_start_matches('/');
    if !path.is_empty() {
        return path.replace('/', ".");
    }

    message
        .strip_prefix('"')
        .and_then(|rest| rest.split_once('"'))
        .map(|(property, _)| property.to_string())
        .unwrap_or_else(|| "$".to_string())
}
