use serde::Serialize;

use crate::errors::ParseFailure;
use crate::grammar::fields::{self, args_exact, integer, strip_quotes};
use crate::grammar::Narrative;

/// Action decoded from the explore grammar. Areas are numeric element labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExploreAction {
    Finish,
    Tap { area: u32 },
    Text { input: String },
    LongPress { area: u32 },
    Swipe { area: u32, direction: String, distance: String },
    /// Switch to grid addressing.
    Grid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExploreCommand {
    pub action: ExploreAction,
    pub narrative: Narrative,
}

pub fn parse_explore(text: &str) -> Result<ExploreCommand, ParseFailure> {
    decode(text).map_err(|e| fields::report(e, text))
}

fn decode(text: &str) -> Result<ExploreCommand, ParseFailure> {
    let narrative = fields::narrative(text)?;
    let action = decode_action(&narrative.action)?;
    Ok(ExploreCommand { action, narrative })
}

fn decode_action(act: &str) -> Result<ExploreAction, ParseFailure> {
    if fields::is_finish(act) {
        return Ok(ExploreAction::Finish);
    }

    let (name, args) = fields::split_call(act)?;
    match name {
        "tap" => {
            let a = args_exact(args, 1, name)?;
            Ok(ExploreAction::Tap { area: integer(a[0])? })
        }
        "text" => {
            let a = args_exact(args, 1, name)?;
            Ok(ExploreAction::Text {
                input: strip_quotes(a[0]),
            })
        }
        "long_press" => {
            let a = args_exact(args, 1, name)?;
            Ok(ExploreAction::LongPress { area: integer(a[0])? })
        }
        "swipe" => {
            let a = args_exact(args, 3, name)?;
            Ok(ExploreAction::Swipe {
                area: integer(a[0])?,
                direction: strip_quotes(a[1]),
                distance: strip_quotes(a[2]),
            })
        }
        "grid" => Ok(ExploreAction::Grid),
        other => Err(ParseFailure::new(format!("undefined action '{other}'"))),
    }
}
