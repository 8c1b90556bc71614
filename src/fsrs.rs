// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The memory model: pure functions over a fixed weight vector. Nothing here
//! touches the clock or the database.

use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::fail_with;

/// Retrievability: the probability of recall, in [0, 1].
pub type Retrievability = f64;

/// Stability: days until retrievability falls to the target retention.
pub type Stability = f64;

/// Difficulty: a scalar in [1, 10].
pub type Difficulty = f64;

/// A length of time, in (fractional) days.
pub type Days = f64;

/// Number of model weights.
pub const WEIGHT_COUNT: usize = 17;

pub type Weights = [f64; WEIGHT_COUNT];

/// The reference FSRS v4 weights.
pub const DEFAULT_WEIGHTS: Weights = [
    0.4, 0.6, 2.4, 5.8, 4.93, 0.94, 0.86, 0.01, 1.49, 0.14, 0.94, 2.18, 0.05, 0.34, 1.26, 0.29,
    2.61,
];

pub const MIN_DIFFICULTY: Difficulty = 1.0;
pub const MAX_DIFFICULTY: Difficulty = 10.0;

/// The learner's self-assessment of how well they recalled a card.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Again=0, Hard=1, Good=2, Easy=3.
    pub fn severity(self) -> usize {
        match self {
            Rating::Again => 0,
            Rating::Hard => 1,
            Rating::Good => 2,
            Rating::Easy => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    /// Whether the rating counts as a correct answer for the item's
    /// aggregate counters.
    pub fn is_correct(self) -> bool {
        self != Rating::Again
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rating {
    type Err = ErrorReport;

    /// Accepts the rating name in any case, or the button number 1-4.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "again" | "1" => Ok(Rating::Again),
            "hard" | "2" => Ok(Rating::Hard),
            "good" | "3" => Ok(Rating::Good),
            "easy" | "4" => Ok(Rating::Easy),
            _ => fail_with(ErrorKind::InvalidRating, format!("invalid rating: {value}")),
        }
    }
}

impl ToSql for Rating {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Rating {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        string
            .parse::<Rating>()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

fn g(rating: Rating) -> f64 {
    rating.severity() as f64
}

/// Clamped to [1, 10]; the raw formula can leave the domain for Easy.
pub fn initial_difficulty(w: &Weights, rating: Rating) -> Difficulty {
    let d = w[4] - (w[5] * (g(rating) - 1.0)).exp() + 1.0;
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

pub fn initial_stability(w: &Weights, rating: Rating) -> Stability {
    w[rating.severity()]
}

/// Callers must ensure `stability > 0`.
pub fn retrievability(elapsed: Days, stability: Stability) -> Retrievability {
    1.0 / (1.0 + elapsed / (9.0 * stability))
}

pub fn next_difficulty(w: &Weights, difficulty: Difficulty, rating: Rating) -> Difficulty {
    let d = difficulty + w[6] * (g(rating) - 3.0);
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Callers must ensure `stability > 0`.
pub fn next_stability(
    w: &Weights,
    difficulty: Difficulty,
    stability: Stability,
    retrievability: Retrievability,
    rating: Rating,
) -> Stability {
    match rating {
        Rating::Again => {
            w[11]
                * difficulty.powf(-w[12])
                * ((stability + 1.0).powf(w[13]) - 1.0)
                * (w[14] * (1.0 - retrievability)).exp()
        }
        _ => {
            let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
            let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };
            stability
                * (1.0
                    + w[8].exp()
                        * (11.0 - difficulty)
                        * stability.powf(-w[9])
                        * ((w[10] * (1.0 - retrievability)).exp() - 1.0)
                        * hard_penalty
                        * easy_bonus)
        }
    }
}

/// The interval, in whole days, after which retrievability falls to
/// `request_retention`, capped at `maximum_interval`.
pub fn next_interval(stability: Stability, request_retention: f64, maximum_interval: u32) -> u32 {
    let raw = (stability * 9.0 * (1.0 / request_retention - 1.0)).round();
    let capped = raw.min(maximum_interval as f64);
    capped.max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: Weights = DEFAULT_WEIGHTS;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rating_parse() {
        assert_eq!("Good".parse::<Rating>(), Ok(Rating::Good));
        assert_eq!("1".parse::<Rating>(), Ok(Rating::Again));
        let err = "perfect".parse::<Rating>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRating);
        assert!("0".parse::<Rating>().is_err());
        assert!("5".parse::<Rating>().is_err());
    }

    #[test]
    fn test_initial_stability_is_a_lookup() {
        assert_eq!(initial_stability(&W, Rating::Again), 0.4);
        assert_eq!(initial_stability(&W, Rating::Hard), 0.6);
        assert_eq!(initial_stability(&W, Rating::Good), 2.4);
        assert_eq!(initial_stability(&W, Rating::Easy), 5.8);
    }

    #[test]
    fn test_initial_difficulty() {
        // w4 - e^(w5 * -1) + 1
        let expected = 4.93 - (-0.94f64).exp() + 1.0;
        assert!(approx(initial_difficulty(&W, Rating::Again), expected));
        let expected = 4.93 - 1.0 + 1.0;
        assert!(approx(initial_difficulty(&W, Rating::Hard), expected));
        // The raw value for Easy is negative, so it clamps.
        assert_eq!(initial_difficulty(&W, Rating::Easy), MIN_DIFFICULTY);
    }

    #[test]
    fn test_retrievability() {
        assert!(approx(retrievability(0.0, 10.0), 1.0));
        // At t = S the model gives 0.9 by construction.
        assert!(approx(retrievability(10.0, 10.0), 0.9));
        let mut last = 1.0;
        for t in 1..100 {
            let r = retrievability(t as f64, 3.0);
            assert!(r < last);
            assert!(r > 0.0);
            last = r;
        }
    }

    #[test]
    fn test_next_difficulty_follows_formula() {
        assert!(approx(next_difficulty(&W, 5.0, Rating::Easy), 5.0));
        assert!(approx(next_difficulty(&W, 5.0, Rating::Good), 5.0 - 0.86));
        assert!(approx(next_difficulty(&W, 5.0, Rating::Again), 5.0 - 3.0 * 0.86));
    }

    #[test]
    fn test_next_difficulty_bounds() {
        for rating in Rating::ALL {
            for d in [1.0, 1.5, 5.0, 9.9, 10.0] {
                let next = next_difficulty(&W, d, rating);
                assert!((MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&next));
            }
        }
    }

    #[test]
    fn test_next_stability_lapse() {
        let s = next_stability(&W, 5.0, 10.0, 0.9, Rating::Again);
        let expected =
            2.18 * 5.0f64.powf(-0.05) * (11.0f64.powf(0.34) - 1.0) * (1.26f64 * 0.1).exp();
        assert!(approx(s, expected));
        assert!(s < 10.0);
    }

    #[test]
    fn test_next_stability_growth_ordering() {
        let hard = next_stability(&W, 5.0, 10.0, 0.9, Rating::Hard);
        let good = next_stability(&W, 5.0, 10.0, 0.9, Rating::Good);
        let easy = next_stability(&W, 5.0, 10.0, 0.9, Rating::Easy);
        assert!(10.0 < hard);
        assert!(hard < good);
        assert!(good < easy);
    }

    #[test]
    fn test_next_interval() {
        // With retention 0.9 the factor 9 * (1/0.9 - 1) is 1.
        assert_eq!(next_interval(2.4, 0.9, 36500), 2);
        assert_eq!(next_interval(5.8, 0.9, 36500), 6);
        assert_eq!(next_interval(1_000_000.0, 0.9, 36500), 36500);
    }

    #[test]
    fn test_next_interval_never_exceeds_cap() {
        for cap in [1, 30, 365, 36500] {
            let mut s = 0.01;
            while s < 1e7 {
                assert!(next_interval(s, 0.9, cap) <= cap);
                assert!(next_interval(s, 0.7, cap) <= cap);
                s *= 1.7;
            }
        }
    }
}
