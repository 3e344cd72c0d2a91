use crate::data::model::HorseId;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::HashSet;
use std::fmt;

/// Canonical betting market identifier.
///
/// Parsing folds the user-facing vocabulary (English labels and their Japanese synonyms) into
/// one canonical form, so `"単勝"` and `"win"` identify the same market. Labels outside the
/// standard vocabulary are preserved via [`BetType::Other`] and settle by set equality.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum BetType {
    Win,
    Place,
    BracketQuinella,
    Quinella,
    Exacta,
    QuinellaPlace,
    TrifectaBox,
    TrifectaExact,
    Other(SmolStr),
}

impl BetType {
    /// Canonicalise a user-supplied bet type label.
    pub fn parse(label: &str) -> Self {
        let normalised = label.trim().to_lowercase();
        match normalised.as_str() {
            "win" | "単勝" => Self::Win,
            "place" | "複勝" => Self::Place,
            "bracket_quinella" | "枠連" => Self::BracketQuinella,
            "quinella" | "馬連" => Self::Quinella,
            "exacta" | "馬単" => Self::Exacta,
            "quinella_place" | "ワイド" | "wide" => Self::QuinellaPlace,
            "trifecta_box" | "三連複" => Self::TrifectaBox,
            "trifecta_exact" | "三連単" => Self::TrifectaExact,
            _ => Self::Other(SmolStr::from(normalised)),
        }
    }

    /// Canonical label, used on the wire and in persisted bet histories.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Win => "win",
            Self::Place => "place",
            Self::BracketQuinella => "bracket_quinella",
            Self::Quinella => "quinella",
            Self::Exacta => "exacta",
            Self::QuinellaPlace => "quinella_place",
            Self::TrifectaBox => "trifecta_box",
            Self::TrifectaExact => "trifecta_exact",
            Self::Other(label) => label,
        }
    }

    /// Whether runner ordering matters when matching combinations.
    pub fn is_order_sensitive(&self) -> bool {
        matches!(self, Self::Exacta | Self::TrifectaExact)
    }

    /// Whether `bet` matches the winning `result` combination for this market.
    ///
    /// * Order-sensitive markets compare tuples.
    /// * `win` compares the leading runner only.
    /// * `place` requires every backed runner to appear in the result.
    /// * Everything else, including unknown markets, compares as sets.
    pub fn combinations_match(&self, bet: &[HorseId], result: &[HorseId]) -> bool {
        if self.is_order_sensitive() {
            return bet == result;
        }
        match self {
            Self::Win => matches!((bet.first(), result.first()), (Some(a), Some(b)) if a == b),
            Self::Place => bet.iter().all(|horse| result.contains(horse)),
            _ => {
                let bet: HashSet<&HorseId> = bet.iter().collect();
                let result: HashSet<&HorseId> = result.iter().collect();
                bet == result
            }
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for BetType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for BetType {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<BetType> for String {
    fn from(value: BetType) -> Self {
        value.as_str().to_string()
    }
}
