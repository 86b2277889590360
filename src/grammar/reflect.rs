use serde::Serialize;

use crate::errors::ParseFailure;
use crate::grammar::fields::{self, DECISION, DOCUMENTATION, DOCUMENTATION_PLACEHOLDER, THOUGHT};

/// Trimmed responses shorter than this are rejected before field extraction.
pub const MIN_REFLECT_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReflectDecision {
    /// The action changed nothing; no documentation is recorded.
    Ineffective,
    Back { documentation: String },
    Continue { documentation: String },
    Success { documentation: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectCommand {
    pub decision: ReflectDecision,
    pub thought: String,
}

pub fn parse_reflect(text: &str) -> Result<ReflectCommand, ParseFailure> {
    decode(text).map_err(|e| fields::report(e, text))
}

fn decode(text: &str) -> Result<ReflectCommand, ParseFailure> {
    if text.trim().chars().count() < MIN_REFLECT_LEN {
        return Err(ParseFailure::new("response is empty or too short"));
    }

    let decision = fields::required(&DECISION, "Decision", text)?;
    let thought = fields::required(&THOUGHT, "Thought", text)?;
    tracing::info!(decision = %decision, "Decision");
    tracing::info!(thought = %thought, "Thought");

    let documentation = || {
        let doc = fields::field(&DOCUMENTATION, text).unwrap_or_else(|| {
            tracing::warn!("no 'Documentation:' found, using placeholder");
            DOCUMENTATION_PLACEHOLDER.to_string()
        });
        tracing::info!(documentation = %doc, "Documentation");
        doc
    };

    let decision = match decision.as_str() {
        "INEFFECTIVE" => ReflectDecision::Ineffective,
        "BACK" => ReflectDecision::Back {
            documentation: documentation(),
        },
        "CONTINUE" => ReflectDecision::Continue {
            documentation: documentation(),
        },
        "SUCCESS" => ReflectDecision::Success {
            documentation: documentation(),
        },
        other => return Err(ParseFailure::new(format!("undefined decision '{other}'"))),
    };

    Ok(ReflectCommand { decision, thought })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ineffective_ignores_documentation() {
        let text = "Decision: INEFFECTIVE\nThought: nothing changed\nDocumentation: should be ignored";
        let cmd = parse_reflect(text).unwrap();
        assert_eq!(cmd.decision, ReflectDecision::Ineffective);
        assert_eq!(cmd.thought, "nothing changed");
    }

    #[test]
    fn documented_decisions_carry_text() {
        let text = "Decision: SUCCESS\nThought: settings opened\nDocumentation: opens the settings page";
        assert_eq!(
            parse_reflect(text).unwrap().decision,
            ReflectDecision::Success {
                documentation: "opens the settings page".into()
            }
        );

        let text = "Thought: went to a different app\nDecision: BACK\nDocumentation: launches the store";
        assert_eq!(
            parse_reflect(text).unwrap().decision,
            ReflectDecision::Back {
                documentation: "launches the store".into()
            }
        );
    }

    #[test]
    fn missing_documentation_uses_placeholder() {
        let cmd = parse_reflect("Decision: CONTINUE\nThought: progress but not done").unwrap();
        assert_eq!(
            cmd.decision,
            ReflectDecision::Continue {
                documentation: DOCUMENTATION_PLACEHOLDER.into()
            }
        );
    }

    #[test]
    fn unknown_decision_fails() {
        assert!(parse_reflect("Decision: MAYBE\nThought: unsure about this").is_err());
    }

    #[test]
    fn short_response_fails() {
        assert!(parse_reflect("").is_err());
        assert!(parse_reflect("   SUCCESS  ").is_err());
    }

    #[test]
    fn missing_mandatory_fields_fail() {
        assert!(parse_reflect("Decision: SUCCESS\nDocumentation: d").is_err());
        assert!(parse_reflect("Thought: t is long enough\nDocumentation: d").is_err());
    }
}
