use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use vg_core::VizError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedInvocation {
    pub(crate) src: String,
    pub(crate) fields: BTreeMap<String, String>,
}

impl DecodedInvocation {
    pub(crate) fn total_memory(&self) -> Result<Option<usize>, VizError> {
        let Some(raw) = self.fields.get("totalMemory") else {
            return Ok(None);
        };
        raw.trim().parse::<usize>().map(Some).map_err(|_| {
            VizError::new(
                "BACKEND_INVOCATION_SYNTAX",
                format!("totalMemory \"{}\" is not a byte count.", raw),
            )
        })
    }
}

/// Parses `Viz('<src>',{key:'value',...});` back into its parts.
pub(crate) fn decode_invocation(call: &str) -> Result<DecodedInvocation, VizError> {
    let captures = call_regex()
        .captures(call)
        .ok_or_else(|| syntax_error("Invocation is not a Viz(...) call."))?;

    let src = unescape_literal(&captures[1]);
    let mut fields = BTreeMap::new();
    let mut rest = captures.get(2).map(|body| body.as_str()).unwrap_or("");
    while !rest.trim().is_empty() {
        let field = field_regex()
            .captures(rest)
            .ok_or_else(|| syntax_error(format!("Unexpected option text \"{}\".", rest.trim())))?;
        fields.insert(field[1].to_string(), unescape_literal(&field[2]));
        rest = &rest[field[0].len()..];
    }

    Ok(DecodedInvocation { src, fields })
}

pub(crate) fn unescape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(escaped) => out.push(escaped),
            None => out.push('\\'),
        }
    }
    out
}

fn syntax_error(message: impl Into<String>) -> VizError {
    VizError::new("BACKEND_INVOCATION_SYNTAX", message)
}

fn call_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?s)^\s*Viz\(\s*'((?:\\.|[^'\\])*)'\s*(?:,\s*\{(.*)\}\s*)?\)\s*;?\s*$")
            .expect("viz call regex must compile")
    })
}

fn field_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*:\s*'((?:\\.|[^'\\])*)'\s*(?:,|$)")
            .expect("viz option field regex must compile")
    })
}
