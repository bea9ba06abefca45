use std::collections::BTreeMap;

use rhai::{Array, Dynamic, EvalAltResult, ImmutableString, Map, FLOAT, INT};
use vg_core::VizError;

pub(crate) fn fields_to_map(fields: &BTreeMap<String, String>) -> Map {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert(key.as_str().into(), Dynamic::from(value.clone()));
    }
    map
}

/// Render output as text. Strings pass through, scalars and collections use
/// their script representation.
pub(crate) fn dynamic_to_text(value: Dynamic) -> Result<String, VizError> {
    if value.is::<ImmutableString>() {
        return Ok(value.cast::<ImmutableString>().to_string());
    }
    if value.is_unit() {
        return Err(VizError::new(
            "BACKEND_EXECUTION",
            "Runtime returned no output.",
        ));
    }
    if value.is::<bool>() || value.is::<INT>() || value.is::<FLOAT>() {
        return Ok(value.to_string());
    }
    if value.is::<Array>() || value.is::<Map>() {
        return Ok(value.to_string());
    }

    Err(VizError::new(
        "BACKEND_EXECUTION",
        format!("Unsupported runtime output type \"{}\".", value.type_name()),
    ))
}

/// Message of a script error; thrown values are reported as-is.
pub(crate) fn eval_error_message(error: &EvalAltResult) -> String {
    match error {
        EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => eval_error_message(inner),
        other => other.to_string(),
    }
}
