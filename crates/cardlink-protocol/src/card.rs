//! Card values as they appear on the wire.
//!
//! The server names every card with a short token:
//!
//! | token    | card                  |
//! |----------|-----------------------|
//! | `R7`     | red seven             |
//! | `Gskip`  | green skip            |
//! | `Brev`   | blue reverse          |
//! | `Y+2`    | yellow draw two       |
//! | `wild`   | wild                  |
//! | `wild+4` | wild draw four        |
//!
//! Tokens are parsed once, at decode time, into [`Card`]. A token that
//! doesn't name a card makes the whole frame fail to decode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// One of the four card colors, keyed on the wire by its initial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Color {
    /// All colors, in the order the wire lists them.
    pub const ALL: [Color; 4] = [Color::Red, Color::Green, Color::Blue, Color::Yellow];

    /// The single-letter wire key (`R`, `G`, `B`, `Y`).
    pub fn key(self) -> char {
        match self {
            Self::Red => 'R',
            Self::Green => 'G',
            Self::Blue => 'B',
            Self::Yellow => 'Y',
        }
    }

    fn from_key(key: char) -> Option<Self> {
        match key {
            'R' => Some(Self::Red),
            'G' => Some(Self::Green),
            'B' => Some(Self::Blue),
            'Y' => Some(Self::Yellow),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Color {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next().and_then(Self::from_key), chars.next()) {
            (Some(color), None) => Ok(color),
            _ => Err(ProtocolError::InvalidColor(s.to_string())),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

/// The face of a colored card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rank {
    /// A plain number card, `0..=9`.
    Number(u8),
    Skip,
    Reverse,
    DrawTwo,
}

/// A single card. Immutable and compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Card {
    Colored { color: Color, rank: Rank },
    Wild,
    WildDrawFour,
}

impl Card {
    /// Shorthand for a colored card.
    pub fn colored(color: Color, rank: Rank) -> Self {
        Self::Colored { color, rank }
    }

    /// `true` for `wild` and `wild+4`.
    pub fn is_wild(&self) -> bool {
        matches!(self, Self::Wild | Self::WildDrawFour)
    }

    /// The printed color; `None` for wild cards.
    pub fn color(&self) -> Option<Color> {
        match self {
            Self::Colored { color, .. } => Some(*color),
            Self::Wild | Self::WildDrawFour => None,
        }
    }

    /// The rank of a colored card; `None` for wild cards.
    pub fn rank(&self) -> Option<Rank> {
        match self {
            Self::Colored { rank, .. } => Some(*rank),
            Self::Wild | Self::WildDrawFour => None,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Colored { color, rank } => match rank {
                Rank::Number(n) => write!(f, "{color}{n}"),
                Rank::Skip => write!(f, "{color}skip"),
                Rank::Reverse => write!(f, "{color}rev"),
                Rank::DrawTwo => write!(f, "{color}+2"),
            },
            Self::Wild => f.write_str("wild"),
            Self::WildDrawFour => f.write_str("wild+4"),
        }
    }
}

impl FromStr for Card {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidCard(s.to_string());

        match s {
            "wild" => return Ok(Self::Wild),
            "wild+4" => return Ok(Self::WildDrawFour),
            _ => {}
        }

        let mut chars = s.chars();
        let color = chars.next().and_then(Color::from_key).ok_or_else(invalid)?;
        let rank = match chars.as_str() {
            "skip" => Rank::Skip,
            "rev" | "reverse" => Rank::Reverse,
            "+2" => Rank::DrawTwo,
            digit if digit.len() == 1 => {
                let n = digit.chars().next().and_then(|c| c.to_digit(10)).ok_or_else(invalid)?;
                Rank::Number(n as u8)
            }
            _ => return Err(invalid()),
        };
        Ok(Self::Colored { color, rank })
    }
}

impl TryFrom<String> for Card {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Card> for String {
    fn from(value: Card) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_parse_every_face() {
        assert_eq!("R7".parse::<Card>().unwrap(), Card::colored(Color::Red, Rank::Number(7)));
        assert_eq!("G0".parse::<Card>().unwrap(), Card::colored(Color::Green, Rank::Number(0)));
        assert_eq!("Gskip".parse::<Card>().unwrap(), Card::colored(Color::Green, Rank::Skip));
        assert_eq!("Brev".parse::<Card>().unwrap(), Card::colored(Color::Blue, Rank::Reverse));
        assert_eq!("Y+2".parse::<Card>().unwrap(), Card::colored(Color::Yellow, Rank::DrawTwo));
        assert_eq!("wild".parse::<Card>().unwrap(), Card::Wild);
        assert_eq!("wild+4".parse::<Card>().unwrap(), Card::WildDrawFour);
    }

    #[test]
    fn test_card_parse_accepts_long_reverse_spelling() {
        assert_eq!("Rreverse".parse::<Card>().unwrap(), Card::colored(Color::Red, Rank::Reverse));
    }

    #[test]
    fn test_card_parse_rejects_unknown_tokens() {
        for token in ["", "X5", "R", "R10", "Rx", "wild+2", "r5", "R+4"] {
            assert!(
                matches!(token.parse::<Card>(), Err(ProtocolError::InvalidCard(_))),
                "{token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_card_display_uses_wire_spelling() {
        assert_eq!(Card::colored(Color::Blue, Rank::Reverse).to_string(), "Brev");
        assert_eq!(Card::colored(Color::Yellow, Rank::DrawTwo).to_string(), "Y+2");
        assert_eq!(Card::WildDrawFour.to_string(), "wild+4");
    }

    #[test]
    fn test_card_serializes_as_token() {
        let json = serde_json::to_string(&Card::colored(Color::Green, Rank::Number(3))).unwrap();
        assert_eq!(json, "\"G3\"");
        let card: Card = serde_json::from_str("\"Rskip\"").unwrap();
        assert_eq!(card, Card::colored(Color::Red, Rank::Skip));
    }

    #[test]
    fn test_card_color_and_rank_accessors() {
        let card: Card = "Y9".parse().unwrap();
        assert_eq!(card.color(), Some(Color::Yellow));
        assert_eq!(card.rank(), Some(Rank::Number(9)));
        assert!(!card.is_wild());

        assert_eq!(Card::Wild.color(), None);
        assert_eq!(Card::Wild.rank(), None);
        assert!(Card::WildDrawFour.is_wild());
    }

    #[test]
    fn test_color_parse_single_key_only() {
        assert_eq!("G".parse::<Color>().unwrap(), Color::Green);
        assert!("GG".parse::<Color>().is_err());
        assert!("".parse::<Color>().is_err());
        assert!("g".parse::<Color>().is_err());
    }
}
