use std::fmt;
use std::str::FromStr;

/// Difficulty tier of a question. The tiers are totally ordered:
/// `Easy < Medium < Hard`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Level {
    /// Next difficulty after an answer, one step along the ladder.
    ///
    /// `None` means no follow-up question should be generated for the word
    /// right now: either the user answered correctly at the ceiling (mastery)
    /// or incorrectly at the floor.
    pub fn adjust(self, was_correct: bool) -> Option<Level> {
        match (self, was_correct) {
            (Level::Easy, true) => Some(Level::Medium),
            (Level::Medium, true) => Some(Level::Hard),
            (Level::Hard, true) => None,
            (Level::Easy, false) => None,
            (Level::Medium, false) => Some(Level::Easy),
            (Level::Hard, false) => Some(Level::Medium),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Easy => "easy",
            Level::Medium => "medium",
            Level::Hard => "hard",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Level::Easy),
            "medium" => Ok(Level::Medium),
            "hard" => Ok(Level::Hard),
            _ => Err(()),
        }
    }
}
