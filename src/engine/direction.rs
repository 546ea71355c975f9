use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Dot;

/// One of the four cardinal directions. Serialized in the single-letter wire
/// form used by snake commands and mouse views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "n")]
    North,
    #[serde(rename = "e")]
    East,
    #[serde(rename = "s")]
    South,
    #[serde(rename = "w")]
    West,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrDirection {
    #[error("dots are not axis-aligned neighbors")]
    NotNeighbors,
    #[error("unknown direction command")]
    UnknownCommand,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Screen coordinates: y grows southwards.
    pub(crate) fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        match rng.gen_range(0..4) {
            0 => Direction::North,
            1 => Direction::East,
            2 => Direction::South,
            _ => Direction::West,
        }
    }

    pub fn from_command(command: &str) -> Result<Self, ErrDirection> {
        match command {
            "n" => Ok(Direction::North),
            "e" => Ok(Direction::East),
            "s" => Ok(Direction::South),
            "w" => Ok(Direction::West),
            _ => Err(ErrDirection::UnknownCommand),
        }
    }
}

/// Direction of the step from `from` to `to`. The dots must be axis-aligned
/// immediate neighbors; wrapped steps across the border are not recognized.
pub fn calculate_direction(from: Dot, to: Dot) -> Result<Direction, ErrDirection> {
    let dx = i32::from(to.x) - i32::from(from.x);
    let dy = i32::from(to.y) - i32::from(from.y);
    match (dx, dy) {
        (0, -1) => Ok(Direction::North),
        (1, 0) => Ok(Direction::East),
        (0, 1) => Ok(Direction::South),
        (-1, 0) => Ok(Direction::West),
        _ => Err(ErrDirection::NotNeighbors),
    }
}
