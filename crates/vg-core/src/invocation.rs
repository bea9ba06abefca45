use std::borrow::Cow;

use crate::types::{Engine, EngineRequest, Format, VizjsOptions};

/// Sources starting with this prefix are already complete invocations.
pub const PREBUILT_INVOCATION_PREFIX: &str = "Viz(";

/// Escapes `src` for a single-quoted literal. Backslashes are doubled before
/// quotes are escaped so the inserted backslashes stay single.
pub fn escape_source(src: &str) -> String {
    src.replace('\n', " ")
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
}

pub fn build_invocation(
    src: &str,
    engine: Engine,
    format: Format,
    options: Option<&VizjsOptions>,
) -> String {
    let total_memory = options
        .and_then(|options| options.total_memory)
        .map(|total_memory| format!(",totalMemory:'{}'", total_memory))
        .unwrap_or_default();

    format!(
        "Viz('{}',{{format:'{}',engine:'{}'{}}});",
        escape_source(src),
        format.as_str().to_lowercase(),
        engine.as_str().to_lowercase(),
        total_memory
    )
}

pub fn is_prebuilt_invocation(src: &str) -> bool {
    src.starts_with(PREBUILT_INVOCATION_PREFIX)
}

/// Invocation handed to the backend for `request`.
pub fn invocation_for(request: &EngineRequest) -> Cow<'_, str> {
    if is_prebuilt_invocation(&request.src) {
        return Cow::Borrowed(request.src.as_str());
    }
    Cow::Owned(build_invocation(
        &request.src,
        request.engine,
        request.format,
        request.options.as_ref(),
    ))
}
