//! Directional stance derived from correlated-asset return agreement.

use serde::{Deserialize, Serialize};

/// Directional mode of the strategy.
///
/// `Long` requires both correlated-pair returns positive, `Short` requires
/// both negative. Mixed sign or a zero leg resolves to `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Neutral,
    Long,
    Short,
}

impl Mode {
    pub fn is_directional(self) -> bool {
        self != Mode::Neutral
    }

    /// Sign of a favorable move: +1 for long, -1 for short, 0 for neutral.
    pub fn direction(self) -> f64 {
        match self {
            Mode::Long => 1.0,
            Mode::Short => -1.0,
            Mode::Neutral => 0.0,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Neutral => "NEUTRAL",
            Mode::Long => "LONG",
            Mode::Short => "SHORT",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_is_not_directional() {
        assert!(!Mode::Neutral.is_directional());
        assert!(Mode::Long.is_directional());
        assert!(Mode::Short.is_directional());
    }

    #[test]
    fn direction_signs() {
        assert_eq!(Mode::Long.direction(), 1.0);
        assert_eq!(Mode::Short.direction(), -1.0);
        assert_eq!(Mode::Neutral.direction(), 0.0);
    }
}
