use anyhow::{Context, Result};
use std::path::Path;

use super::types::{InputKind, Room};
use crate::error::GameError;

const BUILTIN_ROOMS: [&str; 3] = [
    include_str!("../../puzzles/hub/room_01_logistics.toml"),
    include_str!("../../puzzles/hub/room_02_simulator.toml"),
    include_str!("../../puzzles/hub/room_03_quality.toml"),
];

pub fn parse_puzzle(content: &str) -> Result<Room> {
    let room: Room = toml::from_str(content)?;
    check_room(&room)?;
    Ok(room)
}

pub fn load_puzzle(path: &Path) -> Result<Room> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_puzzle(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Every `room_*.toml` in `floor_dir`, in file name order.
pub fn load_floor(floor_dir: &Path) -> Result<Vec<Room>> {
    let pattern = floor_dir.join("room_*.toml");
    let mut paths = glob::glob(&pattern.to_string_lossy())?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // room_01, room_02, room_03
    paths.sort();

    let rooms = paths
        .iter()
        .map(|path| load_puzzle(path))
        .collect::<Result<Vec<_>>>()?;
    check_floor(&rooms)?;
    Ok(rooms)
}

/// The three hub rooms compiled into the binary.
pub fn builtin_rooms() -> Result<Vec<Room>> {
    let rooms = BUILTIN_ROOMS
        .iter()
        .map(|content| parse_puzzle(content))
        .collect::<Result<Vec<_>>>()?;
    check_floor(&rooms)?;
    Ok(rooms)
}

fn check_room(room: &Room) -> Result<(), GameError> {
    let id = &room.meta.id;
    if room.challenge.fields.is_empty() {
        return Err(GameError::InvalidContent(format!("{id} has no answer fields")));
    }
    for field in &room.challenge.fields {
        if field.input == InputKind::Choice && !field.options.contains(&field.expected) {
            return Err(GameError::InvalidContent(format!(
                "{id}: expected value of {} is not one of its options",
                field.name
            )));
        }
    }
    Ok(())
}

fn check_floor(rooms: &[Room]) -> Result<(), GameError> {
    if rooms.is_empty() {
        return Err(GameError::InvalidContent("no rooms found".into()));
    }
    for (i, room) in rooms.iter().enumerate() {
        if rooms[..i].iter().any(|other| other.meta.id == room.meta.id) {
            return Err(GameError::InvalidContent(format!(
                "duplicate room id {}",
                room.meta.id
            )));
        }
    }
    Ok(())
}
