//! Log level definitions
//!
//! Levels form an open set: the built-in names below plus any custom level a
//! caller registers with a priority. Ordering comes from a [`LevelRegistry`],
//! not from the level value itself.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Priority assigned to a level nobody registered.
///
/// Unknown levels always pass the threshold (fail open).
pub const UNKNOWN_LEVEL_PRIORITY: u32 = 999;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(Cow<'static, str>);

impl Level {
    /// Sentinel level, never emitted
    pub const SILENT: Level = Level(Cow::Borrowed("silent"));
    pub const BORING: Level = Level(Cow::Borrowed("boring"));
    pub const DEBUG: Level = Level(Cow::Borrowed("debug"));
    pub const INFO: Level = Level(Cow::Borrowed("info"));
    pub const WARN: Level = Level(Cow::Borrowed("warn"));
    pub const ERROR: Level = Level(Cow::Borrowed("error"));

    const BUILTIN: [(&'static str, u32); 6] = [
        ("silent", 0),
        ("boring", 1),
        ("debug", 2),
        ("info", 3),
        ("warn", 4),
        ("error", 5),
    ];

    /// Create a level by name (built-in or custom)
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        match Self::BUILTIN.iter().find(|(builtin, _)| *builtin == name) {
            Some((builtin, _)) => Level(Cow::Borrowed(builtin)),
            None => Level(Cow::Owned(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_silent(&self) -> bool {
        self.0 == "silent"
    }

    /// Priority of a built-in level, `None` for custom names
    pub fn builtin_priority(&self) -> Option<u32> {
        Self::BUILTIN
            .iter()
            .find(|(name, _)| *name == self.as_str())
            .map(|(_, priority)| *priority)
    }

    /// Default color name used when colorizing this level
    pub fn default_color(&self) -> Option<&'static str> {
        match self.as_str() {
            "boring" => Some("white"),
            "debug" => Some("cyan"),
            "info" => Some("green"),
            "warn" => Some("yellow"),
            "error" => Some("red"),
            _ => None,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Level::new(s))
    }
}

impl From<&str> for Level {
    fn from(name: &str) -> Self {
        Level::new(name)
    }
}

impl From<String> for Level {
    fn from(name: String) -> Self {
        Level::new(name)
    }
}

/// Priority map over built-in and caller-registered levels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelRegistry {
    custom: HashMap<String, u32>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-prioritize) a custom level
    pub fn register(&mut self, name: impl Into<String>, priority: u32) {
        self.custom.insert(name.into(), priority);
    }

    #[must_use]
    pub fn with_level(mut self, name: impl Into<String>, priority: u32) -> Self {
        self.register(name, priority);
        self
    }

    /// Resolve the priority of a level; custom registrations shadow built-ins
    pub fn priority(&self, level: &Level) -> u32 {
        self.custom
            .get(level.as_str())
            .copied()
            .or_else(|| level.builtin_priority())
            .unwrap_or(UNKNOWN_LEVEL_PRIORITY)
    }

    /// Whether a record at `level` passes `threshold`
    pub fn passes(&self, level: &Level, threshold: &Level) -> bool {
        !level.is_silent() && self.priority(level) >= self.priority(threshold)
    }

    pub fn custom_levels(&self) -> &HashMap<String, u32> {
        &self.custom
    }

    /// Merge another registry over this one; `other` wins on conflicts
    #[must_use]
    pub fn merged(&self, other: &LevelRegistry) -> LevelRegistry {
        let mut custom = self.custom.clone();
        custom.extend(other.custom.iter().map(|(k, v)| (k.clone(), *v)));
        LevelRegistry { custom }
    }
}
