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

//! The card lifecycle: New → Learning/Review → Relearning ⇄ Review.

use crate::config::SchedulingParameters;
use crate::config::Steps;
use crate::fsrs::Days;
use crate::fsrs::Rating;
use crate::fsrs::initial_difficulty;
use crate::fsrs::initial_stability;
use crate::fsrs::next_difficulty;
use crate::fsrs::next_interval;
use crate::fsrs::next_stability;
use crate::fsrs::retrievability;
use crate::policy::forgiven_stability;
use crate::policy::forgiveness_applies;
use crate::types::card::Card;
use crate::types::card_state::CardState;
use crate::types::timestamp::Timestamp;

/// The result of rating a card.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// The card after the review.
    pub card: Card,
    pub previous_state: CardState,
    /// Whether the forgiveness override chose the new schedule.
    pub forgiven: bool,
}

/// Compute the card's next state. `card` is not modified.
pub fn schedule(
    params: &SchedulingParameters,
    card: &Card,
    rating: Rating,
    forgiveness_mode: bool,
    now: Timestamp,
) -> Outcome {
    let w = &params.w;
    let interval = |stability| {
        next_interval(stability, params.request_retention, params.maximum_interval) as Days
    };
    let elapsed: Days = match card.last_review {
        Some(last) => now.days_since(last).max(0.0),
        None => 0.0,
    };

    let mut next = card.clone();
    let mut forgiven = false;
    let delay: Days = match card.state {
        CardState::New => {
            next.difficulty = initial_difficulty(w, rating);
            next.stability = initial_stability(w, rating);
            match rating {
                Rating::Again => {
                    next.state = CardState::Learning;
                    params.step_days(Steps::Learning, 0)
                }
                Rating::Hard => {
                    next.state = CardState::Learning;
                    params.step_days(Steps::Learning, 1)
                }
                Rating::Good | Rating::Easy => {
                    next.state = CardState::Review;
                    interval(next.stability)
                }
            }
        }
        CardState::Learning | CardState::Relearning => {
            let steps = if card.state == CardState::Learning {
                Steps::Learning
            } else {
                Steps::Relearning
            };
            match rating {
                Rating::Again => {
                    if card.state == CardState::Relearning {
                        next.lapses += 1;
                    }
                    params.step_days(steps, 0)
                }
                Rating::Hard => params.step_days(steps, 1),
                Rating::Good | Rating::Easy => {
                    // Graduation restarts from the cold-start stability.
                    next.state = CardState::Review;
                    next.stability = initial_stability(w, rating);
                    interval(next.stability)
                }
            }
        }
        CardState::Review => {
            if forgiveness_applies(params, forgiveness_mode, card, rating, now) {
                forgiven = true;
                next.stability = forgiven_stability(params, rating);
                interval(next.stability)
            } else {
                let r = retrievability(elapsed, card.stability);
                next.difficulty = next_difficulty(w, card.difficulty, rating);
                next.stability = next_stability(w, card.difficulty, card.stability, r, rating);
                match rating {
                    Rating::Again => {
                        next.state = CardState::Relearning;
                        next.lapses += 1;
                        params.step_days(Steps::Relearning, 0)
                    }
                    Rating::Hard | Rating::Good | Rating::Easy => interval(next.stability),
                }
            }
        }
    };

    next.due = now.plus_days(delay);
    next.reps += 1;
    next.last_review = Some(now);
    next.elapsed_days = elapsed;
    next.scheduled_days = delay;

    Outcome {
        card: next,
        previous_state: card.state,
        forgiven,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsrs::DEFAULT_WEIGHTS;
    use crate::fsrs::MAX_DIFFICULTY;
    use crate::fsrs::MIN_DIFFICULTY;
    use crate::types::timestamp::MS_PER_DAY;

    fn params() -> SchedulingParameters {
        SchedulingParameters::default()
    }

    fn now() -> Timestamp {
        Timestamp::from_millis(1_000 * MS_PER_DAY)
    }

    fn new_card() -> Card {
        Card::new("alice", "word:1", None, now())
    }

    fn review_card(days_ago: i64) -> Card {
        let mut card = new_card();
        card.state = CardState::Review;
        card.stability = 10.0;
        card.difficulty = 5.0;
        card.reps = 4;
        card.due = now().plus_whole_days(-days_ago);
        card.last_review = Some(now().plus_whole_days(-days_ago));
        card
    }

    #[test]
    fn test_new_good_graduates() {
        let outcome = schedule(&params(), &new_card(), Rating::Good, true, now());
        let card = outcome.card;
        assert_eq!(outcome.previous_state, CardState::New);
        assert_eq!(card.state, CardState::Review);
        let expected = next_interval(DEFAULT_WEIGHTS[2], 0.9, 36500) as f64;
        assert_eq!(card.scheduled_days, expected);
        assert_eq!(card.scheduled_days, 2.0);
        assert_eq!(card.due, now().plus_whole_days(2));
        assert_eq!(card.reps, 1);
        assert_eq!(card.lapses, 0);
        assert_eq!(card.stability, 2.4);
        assert_eq!(card.last_review, Some(now()));
        assert_eq!(card.elapsed_days, 0.0);
    }

    #[test]
    fn test_new_again_and_hard_enter_learning() {
        let again = schedule(&params(), &new_card(), Rating::Again, true, now()).card;
        assert_eq!(again.state, CardState::Learning);
        assert_eq!(again.scheduled_days, 1.0 / 1440.0);
        assert_eq!(again.due.as_millis(), now().as_millis() + 60_000);

        let hard = schedule(&params(), &new_card(), Rating::Hard, true, now()).card;
        assert_eq!(hard.state, CardState::Learning);
        assert_eq!(hard.due.as_millis(), now().as_millis() + 600_000);
        assert_eq!(hard.stability, 0.6);
    }

    #[test]
    fn test_learning_steps_keep_memory_state() {
        let learning = schedule(&params(), &new_card(), Rating::Again, true, now()).card;
        let later = now().plus_days(0.01);
        let again = schedule(&params(), &learning, Rating::Again, true, later).card;
        assert_eq!(again.state, CardState::Learning);
        assert_eq!(again.stability, learning.stability);
        assert_eq!(again.difficulty, learning.difficulty);
        assert_eq!(again.lapses, 0);
        assert_eq!(again.reps, 2);

        let easy = schedule(&params(), &again, Rating::Easy, true, later).card;
        assert_eq!(easy.state, CardState::Review);
        assert_eq!(easy.stability, 5.8);
        assert_eq!(easy.difficulty, learning.difficulty);
        assert_eq!(easy.scheduled_days, 6.0);
    }

    #[test]
    fn test_relearning_again_counts_a_lapse() {
        let mut card = review_card(3);
        card.state = CardState::Relearning;
        card.lapses = 1;
        let next = schedule(&params(), &card, Rating::Again, true, now()).card;
        assert_eq!(next.state, CardState::Relearning);
        assert_eq!(next.lapses, 2);
        assert_eq!(next.scheduled_days, 10.0 / 1440.0);

        let hard = schedule(&params(), &card, Rating::Hard, true, now()).card;
        assert_eq!(hard.state, CardState::Relearning);
        assert_eq!(hard.lapses, 1);
    }

    #[test]
    fn test_review_again_lapses() {
        let card = review_card(10);
        let outcome = schedule(&params(), &card, Rating::Again, true, now());
        let next = outcome.card;
        assert!(!outcome.forgiven);
        assert_eq!(next.state, CardState::Relearning);
        assert_eq!(next.lapses, 1);
        assert_eq!(next.scheduled_days, params().step_days(Steps::Relearning, 0));
        assert_eq!(next.elapsed_days, 10.0);
        let r = retrievability(10.0, 10.0);
        assert_eq!(
            next.stability,
            next_stability(&DEFAULT_WEIGHTS, 5.0, 10.0, r, Rating::Again)
        );
        assert_eq!(
            next.difficulty,
            next_difficulty(&DEFAULT_WEIGHTS, 5.0, Rating::Again)
        );
    }

    #[test]
    fn test_review_good_grows_stability() {
        let card = review_card(10);
        let next = schedule(&params(), &card, Rating::Good, true, now()).card;
        assert_eq!(next.state, CardState::Review);
        assert!(next.stability > card.stability);
        assert_eq!(
            next.scheduled_days,
            next_interval(next.stability, 0.9, 36500) as f64
        );
        assert_eq!(next.lapses, 0);
    }

    #[test]
    fn test_forgiveness_for_overdue_easy() {
        // Reviewed 18 days ago, due 8 days ago.
        let mut card = review_card(18);
        card.due = now().plus_whole_days(-8);
        let outcome = schedule(&params(), &card, Rating::Easy, true, now());
        assert!(outcome.forgiven);
        assert_eq!(outcome.card.state, CardState::Review);
        assert_eq!(outcome.card.stability, 5.8 * 1.5);
        assert_eq!(outcome.card.difficulty, card.difficulty);
        assert_eq!(outcome.card.scheduled_days, 9.0);
    }

    #[test]
    fn test_forgiveness_disabled_uses_decay() {
        let mut card = review_card(18);
        card.due = now().plus_whole_days(-8);
        let outcome = schedule(&params(), &card, Rating::Easy, false, now());
        assert!(!outcome.forgiven);
        assert_ne!(outcome.card.stability, 5.8 * 1.5);
    }

    #[test]
    fn test_again_is_never_forgiven() {
        let card = review_card(30);
        let outcome = schedule(&params(), &card, Rating::Again, true, now());
        assert!(!outcome.forgiven);
        assert_eq!(outcome.card.state, CardState::Relearning);
        assert_eq!(outcome.card.lapses, card.lapses + 1);
    }

    #[test]
    fn test_reps_increase_by_one_per_review() {
        let ratings = [
            Rating::Again,
            Rating::Hard,
            Rating::Good,
            Rating::Again,
            Rating::Good,
            Rating::Easy,
            Rating::Hard,
        ];
        let mut card = new_card();
        let mut t = now();
        for (i, rating) in ratings.into_iter().enumerate() {
            card = schedule(&params(), &card, rating, true, t).card;
            assert_eq!(card.reps as usize, i + 1);
            t = card.due;
        }
    }

    #[test]
    fn test_difficulty_stays_in_bounds() {
        // A deterministic walk over every rating pattern of length 6.
        for pattern in 0..4usize.pow(6) {
            let mut card = new_card();
            let mut t = now();
            let mut p = pattern;
            for _ in 0..6 {
                let rating = Rating::ALL[p % 4];
                p /= 4;
                card = schedule(&params(), &card, rating, true, t).card;
                assert!((MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&card.difficulty));
                assert!(card.scheduled_days <= 36500.0);
                t = card.due.plus_days(1.0);
            }
        }
    }
}
