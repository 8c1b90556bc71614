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

use serde::Deserialize;
use serde::Serialize;

use crate::fsrs::Days;
use crate::fsrs::Difficulty;
use crate::fsrs::Stability;
use crate::types::card_id::CardId;
use crate::types::card_state::CardState;
use crate::types::language::Language;
use crate::types::timestamp::Timestamp;

/// A learner's scheduling record for one memorized item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub user_id: String,
    pub item_id: String,
    /// Denormalized from the item. `None` on cards stored before the
    /// column existed.
    pub language: Option<Language>,
    pub state: CardState,
    /// When the card is next due.
    pub due: Timestamp,
    pub stability: Stability,
    pub difficulty: Difficulty,
    /// Days between the previous review and the last one. Diagnostic only.
    pub elapsed_days: Days,
    /// The delay chosen at the last review. Diagnostic only.
    pub scheduled_days: Days,
    pub reps: u32,
    pub lapses: u32,
    pub last_review: Option<Timestamp>,
}

impl Card {
    /// A card that has never been reviewed, due immediately.
    pub fn new(user_id: &str, item_id: &str, language: Option<Language>, now: Timestamp) -> Self {
        Self {
            id: CardId::derive(user_id, item_id),
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            language,
            state: CardState::New,
            due: now,
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0.0,
            scheduled_days: 0.0,
            reps: 0,
            lapses: 0,
            last_review: None,
        }
    }

    pub fn snapshot(&self) -> CardSnapshot {
        CardSnapshot {
            state: self.state,
            due: self.due,
            stability: self.stability,
            difficulty: self.difficulty,
            elapsed_days: self.elapsed_days,
            scheduled_days: self.scheduled_days,
            reps: self.reps,
            lapses: self.lapses,
            last_review: self.last_review,
        }
    }

    /// Overwrite the scheduling fields with `snapshot`, verbatim.
    pub fn restore(&mut self, snapshot: &CardSnapshot) {
        self.state = snapshot.state;
        self.due = snapshot.due;
        self.stability = snapshot.stability;
        self.difficulty = snapshot.difficulty;
        self.elapsed_days = snapshot.elapsed_days;
        self.scheduled_days = snapshot.scheduled_days;
        self.reps = snapshot.reps;
        self.lapses = snapshot.lapses;
        self.last_review = snapshot.last_review;
    }
}

/// The scheduling fields of a card, as held by a client so that it can
/// undo a review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSnapshot {
    pub state: CardState,
    pub due: Timestamp,
    pub stability: Stability,
    pub difficulty: Difficulty,
    pub elapsed_days: Days,
    pub scheduled_days: Days,
    pub reps: u32,
    pub lapses: u32,
    pub last_review: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_card() {
        let now = Timestamp::from_millis(1_000);
        let card = Card::new("alice", "word:1", Some(Language::Japanese), now);
        assert_eq!(card.state, CardState::New);
        assert_eq!(card.due, now);
        assert_eq!(card.reps, 0);
        assert_eq!(card.stability, 0.0);
        assert_eq!(card.difficulty, 0.0);
        assert_eq!(card.last_review, None);
        assert_eq!(card.id, CardId::derive("alice", "word:1"));
    }

    #[test]
    fn test_snapshot_restore() {
        let now = Timestamp::from_millis(1_000);
        let original = Card::new("alice", "word:1", None, now);
        let snapshot = original.snapshot();
        let mut card = original.clone();
        card.state = CardState::Review;
        card.reps = 3;
        card.stability = 4.2;
        card.last_review = Some(now);
        card.restore(&snapshot);
        assert_eq!(card, original);
    }

    #[test]
    fn test_snapshot_json_is_exact() -> crate::error::Fallible<()> {
        let mut card = Card::new("alice", "word:1", None, Timestamp::from_millis(7));
        card.stability = 0.1 + 0.2;
        card.difficulty = 1.0 / 3.0;
        let json = serde_json::to_string(&card.snapshot())?;
        let back: CardSnapshot = serde_json::from_str(&json)?;
        assert_eq!(back.stability.to_bits(), card.stability.to_bits());
        assert_eq!(back.difficulty.to_bits(), card.difficulty.to_bits());
        Ok(())
    }

    #[test]
    fn test_snapshot_json_is_exact_for_arbitrary_floats() -> crate::error::Fallible<()> {
        let mut card = Card::new("alice", "word:1", None, Timestamp::from_millis(7));
        // xorshift64, so the sequence is the same on every run.
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        for _ in 0..20_000 {
            card.stability = (next() >> 11) as f64 / (1u64 << 53) as f64 * 36500.0;
            card.difficulty = 1.0 + (next() >> 11) as f64 / (1u64 << 53) as f64 * 9.0;
            card.elapsed_days = (next() >> 11) as f64 / (1u64 << 40) as f64;
            let json = serde_json::to_string(&card.snapshot())?;
            let back: CardSnapshot = serde_json::from_str(&json)?;
            assert_eq!(back.stability.to_bits(), card.stability.to_bits(), "{json}");
            assert_eq!(back.difficulty.to_bits(), card.difficulty.to_bits(), "{json}");
            assert_eq!(back.elapsed_days.to_bits(), card.elapsed_days.to_bits(), "{json}");
        }
        Ok(())
    }
}
