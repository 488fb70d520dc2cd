//! Per-field type coercion applied to fact-source rows before they're
//! compared against the remote snapshot (`COMMIT_DEFS[key]['type']` in the
//! original agent).

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Int,
    Float,
    Uuid,
}

impl Coercion {
    /// Coerces `value` in place. A value that's already the target shape
    /// (e.g. a JSON number where an int is wanted) is left untouched;
    /// numeric strings and booleans-as-ints from the fact tool's JSON
    /// output are converted.
    pub fn apply(self, value: &Value) -> Value {
        match self {
            Coercion::Int => value
                .as_i64()
                .map(Value::from)
                .or_else(|| value.as_str().and_then(|s| s.parse::<i64>().ok()).map(Value::from))
                .unwrap_or_else(|| value.clone()),
            Coercion::Float => value
                .as_f64()
                .map(Value::from)
                .or_else(|| value.as_str().and_then(|s| s.parse::<f64>().ok()).map(Value::from))
                .unwrap_or_else(|| value.clone()),
            Coercion::Uuid => value
                .as_str()
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
                .map(|u| Value::from(u.to_string()))
                .unwrap_or_else(|| value.clone()),
        }
    }
}

/// Applies a def's coercion table to every row, mutating matching fields.
pub fn coerce_rows(rows: &mut [Value], coercions: &[(&str, Coercion)]) {
    for row in rows.iter_mut() {
        let Some(obj) = row.as_object_mut() else { continue };
        for (field, coercion) in coercions {
            if let Some(v) = obj.get(*field) {
                let coerced = coercion.apply(v);
                obj.insert((*field).to_string(), coerced);
            }
        }
    }
}
