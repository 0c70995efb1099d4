//! Migration naming protocol
//!
//! A migration group lives in a directory named `<epochMillis>-<name>` and its
//! scripts are named `<epochMillis>-<name>-<up|down>.sql`. The timestamp is
//! zero-padded to a fixed width so that sorting names as strings sorts them
//! chronologically.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MigrateError, MigrateResult};

/// Separates the positional fields of an encoded name
pub const SEPARATOR: char = '-';

/// Replaces [`RESERVED`] characters inside user supplied names
pub const PLACEHOLDER: char = '_';

/// Characters a name may not carry into a path segment: the field separator,
/// the extension dot and both path separators
pub const RESERVED: &[char] = &[SEPARATOR, '.', '/', '\\'];

/// Suffix of script files
pub const EXTENSION: &str = ".sql";

/// Digits in an encoded timestamp; covers every instant from 1970 to 2286
pub const TIMESTAMP_WIDTH: usize = 13;

/// Whether a script applies or reverts its migration group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Token used for this direction inside filenames
    pub fn token(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Direction {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(MigrateError::invalid_filename(
                other,
                "expected direction 'up' or 'down'",
            )),
        }
    }
}

/// A migration group, or one script of a group when `direction` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub direction: Option<Direction>,
}

impl Migration {
    /// Create a migration group
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at,
            direction: None,
        }
    }

    /// The script of this group running in `direction`
    pub fn script(&self, direction: Direction) -> Self {
        Self {
            direction: Some(direction),
            ..self.clone()
        }
    }

    /// Whether this value identifies a group rather than a script
    pub fn is_group(&self) -> bool {
        self.direction.is_none()
    }

    pub fn encode(&self) -> String {
        encode(self)
    }
}

/// Replace reserved characters inside a user supplied name
pub fn sanitize(name: &str) -> String {
    name.replace(RESERVED, &PLACEHOLDER.to_string())
}

/// Encode a migration into a directory name (group) or filename (script)
pub fn encode(migration: &Migration) -> String {
    let mut encoded = format!(
        "{:0width$}{}{}",
        migration.created_at.timestamp_millis(),
        SEPARATOR,
        sanitize(&migration.name),
        width = TIMESTAMP_WIDTH
    );

    if let Some(direction) = migration.direction {
        encoded.push(SEPARATOR);
        encoded.push_str(direction.token());
        encoded.push_str(EXTENSION);
    }

    encoded
}

/// Decode a directory name or script filename
pub fn decode(input: &str) -> MigrateResult<Migration> {
    let (stem, has_extension) = match input.strip_suffix(EXTENSION) {
        Some(stem) => (stem, true),
        None => (input, false),
    };
    let mut fields = stem.split(SEPARATOR);

    let date = fields.next().unwrap_or_default();
    let millis: i64 = date
        .parse()
        .map_err(|_| MigrateError::invalid_filename(input, "timestamp is not a number"))?;
    let created_at = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| MigrateError::invalid_filename(input, "timestamp is out of range"))?;

    let name = fields
        .next()
        .ok_or_else(|| MigrateError::invalid_filename(input, "missing migration name"))?;
    if name.is_empty() || name.contains(RESERVED) {
        return Err(MigrateError::invalid_filename(
            input,
            "migration name is empty or contains a reserved character",
        ));
    }

    let direction = fields
        .next()
        .map(|token| {
            token
                .parse::<Direction>()
                .map_err(|_| MigrateError::invalid_filename(input, "unknown direction"))
        })
        .transpose()?;

    if fields.next().is_some() {
        return Err(MigrateError::invalid_filename(input, "unexpected trailing field"));
    }

    // Scripts carry the extension, group directories never do
    if direction.is_some() != has_extension {
        return Err(MigrateError::invalid_filename(
            input,
            "extension does not match the kind of name",
        ));
    }

    Ok(Migration {
        name: name.to_string(),
        created_at,
        direction,
    })
}
