use serde::Serialize;

use crate::errors::ParseFailure;
use crate::grammar::fields::{self, args_exact, integer, strip_quotes};
use crate::grammar::Narrative;

/// A grid region plus a sub-cell label such as `"top-left"` or `"center"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub area: u32,
    pub subarea: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridAction {
    Finish,
    Tap { cell: GridCell },
    Text { input: String },
    LongPress { cell: GridCell },
    Swipe { start: GridCell, end: GridCell },
    /// Leave grid mode.
    Grid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCommand {
    pub action: GridAction,
    pub narrative: Narrative,
}

pub fn parse_grid(text: &str) -> Result<GridCommand, ParseFailure> {
    decode(text).map_err(|e| fields::report(e, text))
}

fn decode(text: &str) -> Result<GridCommand, ParseFailure> {
    let narrative = fields::narrative(text)?;
    let action = decode_action(&narrative.action)?;
    Ok(GridCommand { action, narrative })
}

fn cell(area: &str, subarea: &str) -> Result<GridCell, ParseFailure> {
    Ok(GridCell {
        area: integer(area)?,
        subarea: strip_quotes(subarea),
    })
}

fn decode_action(act: &str) -> Result<GridAction, ParseFailure> {
    if fields::is_finish(act) {
        return Ok(GridAction::Finish);
    }

    let (name, args) = fields::split_call(act)?;
    match name {
        "tap" => {
            let a = args_exact(args, 2, name)?;
            Ok(GridAction::Tap { cell: cell(a[0], a[1])? })
        }
        "text" => {
            let a = args_exact(args, 1, name)?;
            Ok(GridAction::Text {
                input: strip_quotes(a[0]),
            })
        }
        "long_press" => {
            let a = args_exact(args, 2, name)?;
            Ok(GridAction::LongPress { cell: cell(a[0], a[1])? })
        }
        "swipe" => {
            let a = args_exact(args, 4, name)?;
            Ok(GridAction::Swipe {
                start: cell(a[0], a[1])?,
                end: cell(a[2], a[3])?,
            })
        }
        "grid" => Ok(GridAction::Grid),
        other => Err(ParseFailure::new(format!("undefined grid action '{other}'"))),
    }
}
