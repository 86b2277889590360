//! Labeled-line extraction and call-syntax helpers shared by the grammars.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ParseFailure;
use crate::grammar::Narrative;

pub const SUMMARY_PLACEHOLDER: &str = "No summary available";
pub const DOCUMENTATION_PLACEHOLDER: &str = "No documentation available";

fn label_regex(label: &str) -> Regex {
    // Label must start the line (leading blanks allowed); value runs to end of line.
    Regex::new(&format!(r"(?m)^[ \t]*{label}:[ \t]*(.*)$")).expect("static label pattern")
}

pub static OBSERVATION: LazyLock<Regex> = LazyLock::new(|| label_regex("Observation"));
pub static THOUGHT: LazyLock<Regex> = LazyLock::new(|| label_regex("Thought"));
pub static ACTION: LazyLock<Regex> = LazyLock::new(|| label_regex("Action"));
pub static SUMMARY: LazyLock<Regex> = LazyLock::new(|| label_regex("Summary"));
pub static DECISION: LazyLock<Regex> = LazyLock::new(|| label_regex("Decision"));
pub static DOCUMENTATION: LazyLock<Regex> = LazyLock::new(|| label_regex("Documentation"));

/// Value of the first line carrying the label, trimmed.
pub fn field(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

pub fn required(re: &Regex, label: &str, text: &str) -> Result<String, ParseFailure> {
    field(re, text).ok_or_else(|| {
        tracing::error!(label, "no '{label}:' found in model response");
        ParseFailure::new(format!("missing '{label}:'"))
    })
}

/// Observation, Thought, Action (mandatory) and Summary (placeholder when absent).
pub fn narrative(text: &str) -> Result<Narrative, ParseFailure> {
    let observation = required(&OBSERVATION, "Observation", text)?;
    let thought = required(&THOUGHT, "Thought", text)?;
    let action = required(&ACTION, "Action", text)?;
    let summary = field(&SUMMARY, text).unwrap_or_else(|| {
        tracing::warn!("no 'Summary:' found, using placeholder");
        SUMMARY_PLACEHOLDER.to_string()
    });

    tracing::info!(observation = %observation, "Observation");
    tracing::info!(thought = %thought, "Thought");
    tracing::info!(action = %action, "Action");
    tracing::info!(summary = %summary, "Summary");

    Ok(Narrative {
        observation,
        thought,
        action,
        summary,
    })
}

/// `FINISH`, optionally wrapped in backticks or quotes and followed by a period.
pub fn is_finish(action: &str) -> bool {
    let bare = action
        .trim()
        .trim_end_matches('.')
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim_end_matches('.');
    bare == "FINISH"
}

/// Split `name(args)` into its name and the text between the first `(` and
/// the last `)`. A bare `name` yields no argument text.
pub fn split_call(action: &str) -> Result<(&str, Option<&str>), ParseFailure> {
    let Some(open) = action.find('(') else {
        return Ok((action.trim(), None));
    };
    let close = action
        .rfind(')')
        .filter(|&close| close > open)
        .ok_or_else(|| ParseFailure::new(format!("unbalanced call syntax: {action}")))?;
    Ok((action[..open].trim(), Some(&action[open + 1..close])))
}

/// Remove one pair of matching enclosing quotes, if present.
pub fn strip_quotes(raw: &str) -> String {
    let s = raw.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

pub fn integer(raw: &str) -> Result<u32, ParseFailure> {
    raw.trim()
        .parse::<u32>()
        .map_err(|e| ParseFailure::new(format!("bad area index '{}': {e}", raw.trim())))
}

/// Split call arguments on commas, requiring exactly `n` of them.
pub fn args_exact<'a>(args: Option<&'a str>, n: usize, name: &str) -> Result<Vec<&'a str>, ParseFailure> {
    let args = args.ok_or_else(|| ParseFailure::new(format!("{name} needs arguments")))?;
    let parts: Vec<&str> = if n == 1 { vec![args] } else { args.split(',').collect() };
    if parts.len() != n {
        return Err(ParseFailure::new(format!(
            "{name} expects {n} arguments, got {}",
            parts.len()
        )));
    }
    Ok(parts)
}

/// Log the raw response alongside a failure before handing it back.
pub fn report(failure: ParseFailure, text: &str) -> ParseFailure {
    tracing::error!(error = %failure, raw = %text, "failed to parse model response");
    failure
}
