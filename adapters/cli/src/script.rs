//! Walking scripts: one glyph per actor request.

use std::{error::Error, fmt};

use strata_core::{ActorId, Command, Direction};

/// A single scripted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScriptStep {
    /// Step in a direction.
    Move(Direction),
    /// Turn in place.
    Turn(Direction),
    /// Hop forward one cell.
    Jump,
    /// Turn towards a random direction.
    RandomTurn,
}

impl ScriptStep {
    /// Command issuing the request for `actor`.
    pub(crate) const fn command(self, actor: ActorId) -> Command {
        match self {
            Self::Move(direction) => Command::Move { actor, direction },
            Self::Turn(direction) => Command::Turn { actor, direction },
            Self::Jump => Command::JumpForward { actor, tiles: 1 },
            Self::RandomTurn => Command::RandomTurn { actor },
        }
    }
}

/// Parses a script. Whitespace separates nothing and is ignored.
pub(crate) fn parse(script: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    script
        .chars()
        .enumerate()
        .filter(|(_, glyph)| !glyph.is_whitespace())
        .map(|(position, glyph)| {
            let step = match glyph {
                'U' => ScriptStep::Move(Direction::Up),
                'D' => ScriptStep::Move(Direction::Down),
                'L' => ScriptStep::Move(Direction::Left),
                'R' => ScriptStep::Move(Direction::Right),
                'u' => ScriptStep::Turn(Direction::Up),
                'd' => ScriptStep::Turn(Direction::Down),
                'l' => ScriptStep::Turn(Direction::Left),
                'r' => ScriptStep::Turn(Direction::Right),
                'J' => ScriptStep::Jump,
                '?' => ScriptStep::RandomTurn,
                other => {
                    return Err(ScriptError::UnknownGlyph {
                        glyph: other,
                        position,
                    })
                }
            };
            Ok(step)
        })
        .collect()
}

/// Errors raised while parsing a script.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ScriptError {
    /// The script contains a glyph with no meaning.
    UnknownGlyph {
        /// Offending character.
        glyph: char,
        /// Character offset within the script.
        position: usize,
    },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGlyph { glyph, position } => {
                write!(f, "unknown script glyph `{glyph}` at offset {position}")
            }
        }
    }
}

impl Error for ScriptError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyphs_map_to_requests() {
        let steps = parse("UR d J ?").expect("valid script");
        assert_eq!(
            steps,
            vec![
                ScriptStep::Move(Direction::Up),
                ScriptStep::Move(Direction::Right),
                ScriptStep::Turn(Direction::Down),
                ScriptStep::Jump,
                ScriptStep::RandomTurn,
            ]
        );
    }

    #[test]
    fn unknown_glyph_reports_its_offset() {
        assert_eq!(
            parse("UUx"),
            Err(ScriptError::UnknownGlyph {
                glyph: 'x',
                position: 2
            })
        );
    }

    #[test]
    fn jump_commands_hop_a_single_cell() {
        let actor = ActorId::new(3);
        assert_eq!(
            ScriptStep::Jump.command(actor),
            Command::JumpForward { actor, tiles: 1 }
        );
    }
}
