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

//! Policy overrides that sit beside the state machine: forgiveness for
//! long-overdue review cards, and the due-date shift when a learner comes
//! back from vacation.

use crate::config::SchedulingParameters;
use crate::fsrs::Rating;
use crate::fsrs::Stability;
use crate::fsrs::initial_stability;
use crate::types::card::Card;
use crate::types::card_state::CardState;
use crate::types::timestamp::Timestamp;

/// Whether a review of `card` with `rating` at `now` goes through the
/// forgiveness path instead of the decay-based one. Again never does.
pub fn forgiveness_applies(
    params: &SchedulingParameters,
    forgiveness_mode: bool,
    card: &Card,
    rating: Rating,
    now: Timestamp,
) -> bool {
    forgiveness_mode
        && card.state == CardState::Review
        && rating != Rating::Again
        && now.days_since(card.due) >= params.forgiveness.threshold_days
}

/// The stability a forgiven card restarts from.
pub fn forgiven_stability(params: &SchedulingParameters, rating: Rating) -> Stability {
    initial_stability(&params.w, rating) * params.forgiveness.bonus(rating)
}

/// Whole days spent on vacation. Zero or negative means there is nothing
/// to shift.
pub fn vacation_days(started_at: Timestamp, now: Timestamp) -> i64 {
    now.whole_days_since(started_at)
}

/// Push `card` back by `days`. Nothing but the due date changes.
pub fn shift_due(card: &mut Card, days: i64) {
    card.due = card.due.plus_whole_days(days);
}
