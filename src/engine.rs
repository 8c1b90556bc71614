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

//! The operations exposed to callers. Every operation that writes runs as a
//! single database transaction.

use serde::Serialize;

use crate::config::SchedulingParameters;
use crate::db::Database;
use crate::db::append_review_record;
use crate::db::count_cards_by_state;
use crate::db::count_due_cards;
use crate::db::count_reviews_since;
use crate::db::delete_card;
use crate::db::delete_item;
use crate::db::delete_most_recent_review_record;
use crate::db::get_card;
use crate::db::get_item;
use crate::db::get_item_aggregates;
use crate::db::get_user_srs_settings;
use crate::db::list_all_cards;
use crate::db::list_due_cards;
use crate::db::list_new_cards;
use crate::db::list_review_records;
use crate::db::put_card;
use crate::db::put_item;
use crate::db::put_item_aggregates;
use crate::db::put_user_srs_settings;
use crate::db::set_card_language;
use crate::error::ErrorKind;
use crate::error::Fallible;
use crate::error::fail_with;
use crate::fsrs::Days;
use crate::fsrs::Rating;
use crate::policy::shift_due;
use crate::policy::vacation_days;
use crate::schedule::schedule;
use crate::types::card::Card;
use crate::types::card::CardSnapshot;
use crate::types::card_id::CardId;
use crate::types::card_state::CardState;
use crate::types::item::Item;
use crate::types::item::ItemAggregates;
use crate::types::language::Language;
use crate::types::review::ReviewRecord;
use crate::types::settings::SrsSettingsPatch;
use crate::types::settings::UserSrsSettings;
use crate::types::timestamp::Timestamp;

pub const DEFAULT_DUE_LIMIT: usize = 100;
pub const DEFAULT_NEW_LIMIT: usize = 20;

#[derive(Clone)]
pub struct Engine {
    db: Database,
    params: SchedulingParameters,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub new_state: CardState,
    pub scheduled_days: Days,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VacationStatus {
    pub vacation_mode: bool,
    /// Days every card was pushed back by. Zero unless vacation just ended.
    pub shifted_days: i64,
    pub shifted_cards: usize,
}

/// What a rating would do to a card.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub rating: Rating,
    pub new_state: CardState,
    pub scheduled_days: Days,
    pub due: Timestamp,
    pub forgiven: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub new_cards: usize,
    pub learning_cards: usize,
    pub review_cards: usize,
    pub relearning_cards: usize,
    pub due_now: usize,
    pub reviews_last_day: usize,
}

impl Engine {
    pub fn new(db: Database, params: SchedulingParameters) -> Fallible<Self> {
        params.validate()?;
        Ok(Self { db, params })
    }

    pub fn params(&self) -> &SchedulingParameters {
        &self.params
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Register a memorized item, or change its language. An item belongs
    /// to the learner who first registered it; anyone else gets
    /// `ItemNotFound`.
    pub fn register_item(&self, item: &Item) -> Fallible<()> {
        log::debug!("Registering item {} ({})", item.item_id, item.language);
        self.db.transaction(|tx| {
            let existing = get_item(tx, &item.item_id)?;
            if let Some(existing) = &existing {
                if existing.user_id != item.user_id {
                    return fail_with(
                        ErrorKind::ItemNotFound,
                        format!("item {} not found for user {}", item.item_id, item.user_id),
                    );
                }
            }
            put_item(tx, item)?;
            if let Some(existing) = existing {
                if existing.language != item.language {
                    let count = set_card_language(tx, &item.item_id, item.language)?;
                    log::debug!("Retagged {count} cards of {} as {}", item.item_id, item.language);
                }
            }
            Ok(())
        })
    }

    /// Delete an item together with its card and review history.
    pub fn delete_item(&self, item_id: &str) -> Fallible<bool> {
        self.db.transaction(|tx| {
            let Some(item) = get_item(tx, item_id)? else {
                return Ok(false);
            };
            delete_card(tx, CardId::derive(&item.user_id, item_id))?;
            delete_item(tx, item_id)
        })
    }

    /// Create the card for an item. Idempotent: if the card exists, its id
    /// is returned and nothing changes.
    pub fn create_card(&self, user_id: &str, item_id: &str, now: Timestamp) -> Fallible<CardId> {
        self.db.transaction(|tx| {
            let item = match get_item(tx, item_id)? {
                Some(item) if item.user_id == user_id => item,
                _ => {
                    return fail_with(
                        ErrorKind::ItemNotFound,
                        format!("item {item_id} not found for user {user_id}"),
                    );
                }
            };
            let card_id = CardId::derive(user_id, item_id);
            if get_card(tx, card_id)?.is_none() {
                log::debug!("Adding new card: {card_id}");
                let card = Card::new(user_id, item_id, Some(item.language), now);
                put_card(tx, &card)?;
            }
            Ok(card_id)
        })
    }

    pub fn get_card(&self, card_id: CardId) -> Fallible<Card> {
        self.db.read(|conn| require_card(conn, card_id))
    }

    /// Rate a card. The card, its review record, and its item's counters
    /// are written in one transaction.
    pub fn review(
        &self,
        card_id: CardId,
        rating: Rating,
        latency_ms: Option<u64>,
        now: Timestamp,
    ) -> Fallible<ReviewResult> {
        self.db.transaction(|tx| {
            let card = require_card(tx, card_id)?;
            let settings = get_user_srs_settings(tx, &card.user_id)?.unwrap_or_default();
            let outcome = schedule(&self.params, &card, rating, settings.forgiveness_mode, now);
            let next = outcome.card;

            log::debug!(
                "{} {} {}->{} S={:.2}d D={:.2} due={}{}",
                &card_id.to_hex()[..8],
                rating,
                outcome.previous_state,
                next.state,
                next.stability,
                next.difficulty,
                next.due,
                if outcome.forgiven { " (forgiven)" } else { "" }
            );

            put_card(tx, &next)?;
            append_review_record(
                tx,
                &ReviewRecord {
                    card_id,
                    rating,
                    previous_state: outcome.previous_state,
                    new_state: next.state,
                    latency_ms,
                    reviewed_at: now,
                },
            )?;
            let mut aggregates = require_aggregates(tx, &card.item_id)?;
            aggregates.times_reviewed += 1;
            if rating.is_correct() {
                aggregates.times_correct += 1;
            }
            aggregates.last_reviewed_at = Some(now);
            put_item_aggregates(tx, &card.item_id, &aggregates)?;

            Ok(ReviewResult {
                new_state: next.state,
                scheduled_days: next.scheduled_days,
            })
        })
    }

    /// Restore a card and its item's counters to values the caller held
    /// before the last review, and drop that review's record. Nothing is
    /// recomputed.
    pub fn undo_review(
        &self,
        card_id: CardId,
        previous: &CardSnapshot,
        previous_aggregates: &ItemAggregates,
    ) -> Fallible<()> {
        self.db.transaction(|tx| {
            let mut card = require_card(tx, card_id)?;
            card.restore(previous);
            put_card(tx, &card)?;
            if !put_item_aggregates(tx, &card.item_id, previous_aggregates)? {
                return fail_with(
                    ErrorKind::ItemNotFound,
                    format!("item {} not found", card.item_id),
                );
            }
            if !delete_most_recent_review_record(tx, card_id)? {
                log::debug!("Undo on {card_id} found no review record to delete");
            }
            log::debug!("Undid last review of {card_id}");
            Ok(())
        })
    }

    /// The outcome of each rating, without changing anything.
    pub fn preview(&self, card_id: CardId, now: Timestamp) -> Fallible<Vec<Preview>> {
        self.db.read(|conn| {
            let card = require_card(conn, card_id)?;
            let settings = get_user_srs_settings(conn, &card.user_id)?.unwrap_or_default();
            let previews = Rating::ALL
                .into_iter()
                .map(|rating| {
                    let outcome =
                        schedule(&self.params, &card, rating, settings.forgiveness_mode, now);
                    Preview {
                        rating,
                        new_state: outcome.card.state,
                        scheduled_days: outcome.card.scheduled_days,
                        due: outcome.card.due,
                        forgiven: outcome.forgiven,
                    }
                })
                .collect();
            Ok(previews)
        })
    }

    /// An item's counters. Clients read these before a review so that they
    /// can undo it.
    pub fn get_item_aggregates(&self, item_id: &str) -> Fallible<ItemAggregates> {
        self.db.read(|conn| require_aggregates(conn, item_id))
    }

    /// A card's review history, most recent first.
    pub fn history(&self, card_id: CardId) -> Fallible<Vec<ReviewRecord>> {
        self.db.read(|conn| {
            require_card(conn, card_id)?;
            list_review_records(conn, card_id)
        })
    }

    /// The learner's settings, or the defaults if they have none stored.
    /// Nothing is written.
    pub fn get_or_create_settings(&self, user_id: &str) -> Fallible<UserSrsSettings> {
        self.db
            .read(|conn| Ok(get_user_srs_settings(conn, user_id)?.unwrap_or_default()))
    }

    pub fn update_srs_settings(
        &self,
        user_id: &str,
        patch: &SrsSettingsPatch,
    ) -> Fallible<UserSrsSettings> {
        self.db.transaction(|tx| {
            let current = get_user_srs_settings(tx, user_id)?.unwrap_or_default();
            let merged = current.merge(patch);
            put_user_srs_settings(tx, user_id, &merged)?;
            Ok(merged)
        })
    }

    /// Turn vacation mode on or off. Turning it off pushes every one of the
    /// learner's cards back by the whole days spent away, in the same
    /// transaction that clears the flag, so the shift happens exactly once.
    pub fn toggle_vacation_mode(
        &self,
        user_id: &str,
        enabled: bool,
        now: Timestamp,
    ) -> Fallible<VacationStatus> {
        self.db.transaction(|tx| {
            let mut settings = get_user_srs_settings(tx, user_id)?.unwrap_or_default();
            let mut status = VacationStatus {
                vacation_mode: enabled,
                shifted_days: 0,
                shifted_cards: 0,
            };
            match (settings.vacation_mode, enabled) {
                (false, true) => {
                    settings.vacation_mode = true;
                    settings.vacation_started_at = Some(now);
                    put_user_srs_settings(tx, user_id, &settings)?;
                    log::info!("Vacation mode on for {user_id}");
                }
                (true, false) => {
                    let days = settings
                        .vacation_started_at
                        .map(|start| vacation_days(start, now))
                        .unwrap_or(0);
                    if days > 0 {
                        let cards = list_all_cards(tx, user_id)?;
                        for mut card in cards {
                            shift_due(&mut card, days);
                            put_card(tx, &card)?;
                            status.shifted_cards += 1;
                        }
                        status.shifted_days = days;
                    }
                    settings.vacation_mode = false;
                    settings.vacation_started_at = None;
                    put_user_srs_settings(tx, user_id, &settings)?;
                    log::info!(
                        "Vacation mode off for {user_id}: shifted {} cards by {days} days",
                        status.shifted_cards
                    );
                }
                // Already in the requested mode.
                _ => {}
            }
            Ok(status)
        })
    }

    /// Cards due at `now`, earliest first.
    pub fn get_due_cards(
        &self,
        user_id: &str,
        language: Option<Language>,
        limit: Option<usize>,
        now: Timestamp,
    ) -> Fallible<Vec<Card>> {
        let limit = limit.unwrap_or(DEFAULT_DUE_LIMIT);
        self.db.read(|conn| {
            #[allow(unused_mut)]
            let mut cards = list_due_cards(conn, user_id, language, now, limit)?;
            #[cfg(feature = "legacy-language-fallback")]
            crate::legacy::fill_due(conn, &mut cards, user_id, language, now, limit)?;
            Ok(cards)
        })
    }

    /// Cards never reviewed, oldest first.
    pub fn get_new_cards(
        &self,
        user_id: &str,
        language: Option<Language>,
        limit: Option<usize>,
    ) -> Fallible<Vec<Card>> {
        let limit = limit.unwrap_or(DEFAULT_NEW_LIMIT);
        self.db.read(|conn| {
            #[allow(unused_mut)]
            let mut cards = list_new_cards(conn, user_id, language, limit)?;
            #[cfg(feature = "legacy-language-fallback")]
            crate::legacy::fill_new(conn, &mut cards, user_id, language, limit)?;
            Ok(cards)
        })
    }

    pub fn stats(&self, user_id: &str, now: Timestamp) -> Fallible<Stats> {
        self.db.read(|conn| {
            let mut stats = Stats::default();
            for (state, count) in count_cards_by_state(conn, user_id)? {
                match state {
                    CardState::New => stats.new_cards = count,
                    CardState::Learning => stats.learning_cards = count,
                    CardState::Review => stats.review_cards = count,
                    CardState::Relearning => stats.relearning_cards = count,
                }
            }
            stats.due_now = count_due_cards(conn, user_id, now)?;
            stats.reviews_last_day = count_reviews_since(conn, user_id, now.plus_whole_days(-1))?;
            Ok(stats)
        })
    }
}

fn require_card(conn: &rusqlite::Connection, card_id: CardId) -> Fallible<Card> {
    match get_card(conn, card_id)? {
        Some(card) => Ok(card),
        None => fail_with(ErrorKind::CardNotFound, format!("card {card_id} not found")),
    }
}

fn require_aggregates(conn: &rusqlite::Connection, item_id: &str) -> Fallible<ItemAggregates> {
    match get_item_aggregates(conn, item_id)? {
        Some(aggregates) => Ok(aggregates),
        None => fail_with(ErrorKind::ItemNotFound, format!("item {item_id} not found")),
    }
}
