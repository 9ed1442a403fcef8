//! Participant attributes used to split the data into comparison groups.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::collated::ParticipantRecord;
use crate::error::AnalysisError;

/// Value of a grouping attribute for one participant
#[derive(Debug, Clone)]
pub enum Category {
    /// The attribute was not recorded
    Missing,
    Number(f64),
    Text(String),
}

impl Category {
    pub fn is_missing(&self) -> bool {
        matches!(self, Category::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Category::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Category::Missing => 0,
            Category::Number(_) => 1,
            Category::Text(_) => 2,
        }
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Category {}

impl PartialOrd for Category {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Category {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Category::Number(a), Category::Number(b)) => a.total_cmp(b),
            (Category::Text(a), Category::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Missing => write!(f, "None"),
            Category::Number(n) => write!(f, "{}", n),
            Category::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Category::Missing => serializer.serialize_none(),
            Category::Number(n) => serializer.serialize_f64(*n),
            Category::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Category::Text(s.to_string())
    }
}

impl From<Option<f64>> for Category {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Category::Missing, Category::Number)
    }
}

/// Attribute to group participants by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    /// Every participant in one group
    All,
    EyeColour,
    EyesBlue,
    EyesDark,
    Correction,
    Panto,
    /// Near vergence posture
    Posture33cm,
    /// Distance vergence posture
    Posture3m,
}

impl GroupingKey {
    pub const ALL_KEYS: [GroupingKey; 8] = [
        GroupingKey::All,
        GroupingKey::EyeColour,
        GroupingKey::EyesBlue,
        GroupingKey::EyesDark,
        GroupingKey::Correction,
        GroupingKey::Panto,
        GroupingKey::Posture33cm,
        GroupingKey::Posture3m,
    ];

    /// Keys compared when none are requested
    pub const DEFAULT_KEYS: [GroupingKey; 6] = [
        GroupingKey::All,
        GroupingKey::EyesDark,
        GroupingKey::Correction,
        GroupingKey::Panto,
        GroupingKey::Posture33cm,
        GroupingKey::Posture3m,
    ];

    pub fn category(&self, participant: &ParticipantRecord) -> Category {
        match self {
            GroupingKey::All => Category::from("all"),
            GroupingKey::EyeColour => Category::from(participant.eye_colour.as_str()),
            GroupingKey::EyesBlue => Category::from(participant.eyes_blue()),
            GroupingKey::EyesDark => Category::from(participant.eyes_dark()),
            GroupingKey::Correction => Category::from(participant.correction.as_str()),
            GroupingKey::Panto => Category::from(participant.panto),
            GroupingKey::Posture33cm => Category::Number(participant.posture_33cm),
            GroupingKey::Posture3m => Category::Number(participant.posture_3m),
        }
    }

    /// Axis label for plots
    pub fn axis_label(&self) -> &'static str {
        match self {
            GroupingKey::All => "<unknown>",
            GroupingKey::EyeColour => "Eye colour",
            GroupingKey::EyesBlue => "Blue eyes",
            GroupingKey::EyesDark => "Eye Darkness",
            GroupingKey::Correction => "Spectacle type",
            GroupingKey::Panto => "Pantoscopic tilt in degrees",
            GroupingKey::Posture33cm => "Vergence posture at 33cm",
            GroupingKey::Posture3m => "Vergence posture at 3m",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            GroupingKey::All => "Eye tracker performance - all data",
            GroupingKey::EyeColour => "Eye tracker performance in relation to eye colour",
            GroupingKey::EyesBlue => "Eye tracker performance in relation to eye blueness",
            GroupingKey::EyesDark => "Eye tracker performance in relation to eye darkness",
            GroupingKey::Correction => "Eye tracker performance in relation to vision correction",
            GroupingKey::Panto => "Eye tracker performance in relation to pantoscopic tilt",
            GroupingKey::Posture33cm => "Eye tracker performance in relation to near vergence",
            GroupingKey::Posture3m => "Eye tracker performance in relation to distance vergence",
        }
    }

    /// Name used on the command line and in output file names
    pub fn name(&self) -> &'static str {
        match self {
            GroupingKey::All => "all",
            GroupingKey::EyeColour => "eye_colour",
            GroupingKey::EyesBlue => "eyes_blue",
            GroupingKey::EyesDark => "eyes_dark",
            GroupingKey::Correction => "correction",
            GroupingKey::Panto => "panto",
            GroupingKey::Posture33cm => "posture_33cm",
            GroupingKey::Posture3m => "posture_3m",
        }
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GroupingKey {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GroupingKey::ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| AnalysisError::invalid_field("grouping key", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order() {
        let mut categories = vec![
            Category::from("b"),
            Category::Number(2.0),
            Category::Missing,
            Category::Number(-1.5),
            Category::from("a"),
        ];
        categories.sort();
        assert_eq!(
            categories,
            vec![
                Category::Missing,
                Category::Number(-1.5),
                Category::Number(2.0),
                Category::from("a"),
                Category::from("b"),
            ]
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Number(4.0).to_string(), "4");
        assert_eq!(Category::Number(-2.5).to_string(), "-2.5");
        assert_eq!(Category::Missing.to_string(), "None");
        assert_eq!(Category::from(None).as_number(), None);
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in GroupingKey::ALL_KEYS {
            assert_eq!(key.name().parse::<GroupingKey>().unwrap(), key);
        }
        assert!("shoe_size".parse::<GroupingKey>().is_err());
    }
}
