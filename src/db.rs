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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use rusqlite::config::DbConfig;

use crate::error::Fallible;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::card_state::CardState;
use crate::types::item::Item;
use crate::types::item::ItemAggregates;
use crate::types::language::Language;
use crate::types::review::ReviewRecord;
use crate::types::settings::UserSrsSettings;
use crate::types::timestamp::Timestamp;

/// The persistent store. Cloning shares the underlying connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(database_path: &str) -> Fallible<Self> {
        let conn = Connection::open(database_path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Fallible<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Fallible<Self> {
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { conn })
    }

    /// Run `f` inside a write transaction. The transaction commits if `f`
    /// returns `Ok`, and rolls back otherwise, so either every write in `f`
    /// is applied or none is.
    ///
    /// The transaction takes the write lock up front, so two transactions
    /// can never interleave a read-modify-write of the same row.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction) -> Fallible<T>) -> Fallible<T> {
        let mut conn = self.acquire();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `f` against the connection without opening a transaction.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Fallible<T>) -> Fallible<T> {
        let conn = self.acquire();
        f(&conn)
    }

    fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["cards"], |row| row.get(0))?;
    Ok(count > 0)
}

// Cards.

pub(crate) const CARD_COLUMNS: &str = "c.card_id, c.user_id, c.item_id, c.language, c.state, c.due, c.stability, c.difficulty, c.elapsed_days, c.scheduled_days, c.reps, c.lapses, c.last_review";

pub(crate) fn card_from_row(row: &Row) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        user_id: row.get(1)?,
        item_id: row.get(2)?,
        language: row.get(3)?,
        state: row.get(4)?,
        due: row.get(5)?,
        stability: row.get(6)?,
        difficulty: row.get(7)?,
        elapsed_days: row.get(8)?,
        scheduled_days: row.get(9)?,
        reps: row.get(10)?,
        lapses: row.get(11)?,
        last_review: row.get(12)?,
    })
}

pub fn get_card(conn: &Connection, card_id: CardId) -> Fallible<Option<Card>> {
    let sql = format!("select {CARD_COLUMNS} from cards c where c.card_id = ?;");
    let card = conn
        .query_row(&sql, [card_id], card_from_row)
        .optional()?;
    Ok(card)
}

/// Insert or overwrite a card.
pub fn put_card(conn: &Connection, card: &Card) -> Fallible<()> {
    let sql = "insert into cards (card_id, user_id, item_id, language, state, due, stability, difficulty, elapsed_days, scheduled_days, reps, lapses, last_review) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) on conflict (card_id) do update set language = excluded.language, state = excluded.state, due = excluded.due, stability = excluded.stability, difficulty = excluded.difficulty, elapsed_days = excluded.elapsed_days, scheduled_days = excluded.scheduled_days, reps = excluded.reps, lapses = excluded.lapses, last_review = excluded.last_review;";
    conn.execute(
        sql,
        (
            card.id,
            &card.user_id,
            &card.item_id,
            card.language,
            card.state,
            card.due,
            card.stability,
            card.difficulty,
            card.elapsed_days,
            card.scheduled_days,
            card.reps,
            card.lapses,
            card.last_review,
        ),
    )?;
    Ok(())
}

/// Returns whether a card was deleted.
pub fn delete_card(conn: &Connection, card_id: CardId) -> Fallible<bool> {
    let count = conn.execute("delete from cards where card_id = ?;", [card_id])?;
    Ok(count > 0)
}

/// Cards due at `now`, in any state, earliest first. A new card is due
/// from the moment it is created.
pub fn list_due_cards(
    conn: &Connection,
    user_id: &str,
    language: Option<Language>,
    now: Timestamp,
    limit: usize,
) -> Fallible<Vec<Card>> {
    let sql = format!(
        "select {CARD_COLUMNS} from cards c where c.user_id = ?1 and c.due <= ?2 and (?3 is null or c.language = ?3) order by c.due limit ?4;"
    );
    let mut stmt = conn.prepare(&sql)?;
    let cards = stmt
        .query_map((user_id, now, language, limit as i64), card_from_row)?
        .collect::<rusqlite::Result<Vec<Card>>>()?;
    Ok(cards)
}

/// Never-reviewed cards, in the order they were created.
pub fn list_new_cards(
    conn: &Connection,
    user_id: &str,
    language: Option<Language>,
    limit: usize,
) -> Fallible<Vec<Card>> {
    let sql = format!(
        "select {CARD_COLUMNS} from cards c where c.user_id = ?1 and c.state = 'new' and (?2 is null or c.language = ?2) order by c.rowid limit ?3;"
    );
    let mut stmt = conn.prepare(&sql)?;
    let cards = stmt
        .query_map((user_id, language, limit as i64), card_from_row)?
        .collect::<rusqlite::Result<Vec<Card>>>()?;
    Ok(cards)
}

pub fn list_all_cards(conn: &Connection, user_id: &str) -> Fallible<Vec<Card>> {
    let sql = format!("select {CARD_COLUMNS} from cards c where c.user_id = ? order by c.rowid;");
    let mut stmt = conn.prepare(&sql)?;
    let cards = stmt
        .query_map([user_id], card_from_row)?
        .collect::<rusqlite::Result<Vec<Card>>>()?;
    Ok(cards)
}

/// The number of a learner's cards in each state.
pub fn count_cards_by_state(conn: &Connection, user_id: &str) -> Fallible<Vec<(CardState, usize)>> {
    let sql = "select state, count(*) from cards where user_id = ? group by state;";
    let mut stmt = conn.prepare(sql)?;
    let counts = stmt
        .query_map([user_id], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as usize)))?
        .collect::<rusqlite::Result<Vec<(CardState, usize)>>>()?;
    Ok(counts)
}

/// The number of a learner's cards due at `now`.
pub fn count_due_cards(conn: &Connection, user_id: &str, now: Timestamp) -> Fallible<usize> {
    let sql = "select count(*) from cards where user_id = ? and due <= ?;";
    let count: i64 = conn.query_row(sql, (user_id, now), |row| row.get(0))?;
    Ok(count as usize)
}

// Review history.

pub fn append_review_record(conn: &Connection, record: &ReviewRecord) -> Fallible<()> {
    let sql = "insert into reviews (card_id, rating, previous_state, new_state, latency_ms, reviewed_at) values (?, ?, ?, ?, ?, ?);";
    conn.execute(
        sql,
        (
            record.card_id,
            record.rating,
            record.previous_state,
            record.new_state,
            record.latency_ms.map(|ms| ms as i64),
            record.reviewed_at,
        ),
    )?;
    Ok(())
}

/// Delete the card's latest review record. Returns whether one existed.
pub fn delete_most_recent_review_record(conn: &Connection, card_id: CardId) -> Fallible<bool> {
    let sql = "delete from reviews where review_id = (select review_id from reviews where card_id = ? order by reviewed_at desc, review_id desc limit 1);";
    let count = conn.execute(sql, [card_id])?;
    Ok(count > 0)
}

/// A card's review history, most recent first.
pub fn list_review_records(conn: &Connection, card_id: CardId) -> Fallible<Vec<ReviewRecord>> {
    let sql = "select card_id, rating, previous_state, new_state, latency_ms, reviewed_at from reviews where card_id = ? order by reviewed_at desc, review_id desc;";
    let mut stmt = conn.prepare(sql)?;
    let records = stmt
        .query_map([card_id], |row| {
            Ok(ReviewRecord {
                card_id: row.get(0)?,
                rating: row.get(1)?,
                previous_state: row.get(2)?,
                new_state: row.get(3)?,
                latency_ms: row.get::<_, Option<i64>>(4)?.map(|ms| ms as u64),
                reviewed_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<ReviewRecord>>>()?;
    Ok(records)
}

/// The number of reviews of a learner's cards since `since`.
pub fn count_reviews_since(conn: &Connection, user_id: &str, since: Timestamp) -> Fallible<usize> {
    let sql = "select count(*) from reviews r join cards c on c.card_id = r.card_id where c.user_id = ? and r.reviewed_at >= ?;";
    let count: i64 = conn.query_row(sql, (user_id, since), |row| row.get(0))?;
    Ok(count as usize)
}

// Items.

/// Register an item, or update its language if it exists. The owner and
/// the aggregate counters are left alone.
pub fn put_item(conn: &Connection, item: &Item) -> Fallible<()> {
    let sql = "insert into items (item_id, user_id, language) values (?, ?, ?) on conflict (item_id) do update set language = excluded.language;";
    conn.execute(sql, (&item.item_id, &item.user_id, item.language))?;
    Ok(())
}

/// Retag the cards of an item with a new language. Returns the number of
/// cards changed.
pub fn set_card_language(conn: &Connection, item_id: &str, language: Language) -> Fallible<usize> {
    let sql = "update cards set language = ? where item_id = ?;";
    let count = conn.execute(sql, (language, item_id))?;
    Ok(count)
}

pub fn get_item(conn: &Connection, item_id: &str) -> Fallible<Option<Item>> {
    let sql = "select item_id, user_id, language from items where item_id = ?;";
    let item = conn
        .query_row(sql, [item_id], |row| {
            Ok(Item {
                item_id: row.get(0)?,
                user_id: row.get(1)?,
                language: row.get(2)?,
            })
        })
        .optional()?;
    Ok(item)
}

/// Returns whether an item was deleted. Its card and review history go
/// with it.
pub fn delete_item(conn: &Connection, item_id: &str) -> Fallible<bool> {
    let count = conn.execute("delete from items where item_id = ?;", [item_id])?;
    Ok(count > 0)
}

pub fn get_item_aggregates(conn: &Connection, item_id: &str) -> Fallible<Option<ItemAggregates>> {
    let sql = "select times_reviewed, times_correct, last_reviewed_at from items where item_id = ?;";
    let aggregates = conn
        .query_row(sql, [item_id], |row| {
            Ok(ItemAggregates {
                times_reviewed: row.get(0)?,
                times_correct: row.get(1)?,
                last_reviewed_at: row.get(2)?,
            })
        })
        .optional()?;
    Ok(aggregates)
}

/// Returns whether the item exists.
pub fn put_item_aggregates(
    conn: &Connection,
    item_id: &str,
    aggregates: &ItemAggregates,
) -> Fallible<bool> {
    let sql = "update items set times_reviewed = ?, times_correct = ?, last_reviewed_at = ? where item_id = ?;";
    let count = conn.execute(
        sql,
        (
            aggregates.times_reviewed,
            aggregates.times_correct,
            aggregates.last_reviewed_at,
            item_id,
        ),
    )?;
    Ok(count > 0)
}

// Settings.

pub fn get_user_srs_settings(
    conn: &Connection,
    user_id: &str,
) -> Fallible<Option<UserSrsSettings>> {
    let sql = "select vacation_mode, vacation_started_at, forgiveness_mode, max_reviews_per_session, daily_review_goal, daily_new_card_goal from srs_settings where user_id = ?;";
    let settings = conn
        .query_row(sql, [user_id], |row| {
            Ok(UserSrsSettings {
                vacation_mode: row.get(0)?,
                vacation_started_at: row.get(1)?,
                forgiveness_mode: row.get(2)?,
                max_reviews_per_session: row.get(3)?,
                daily_review_goal: row.get(4)?,
                daily_new_card_goal: row.get(5)?,
            })
        })
        .optional()?;
    Ok(settings)
}

pub fn put_user_srs_settings(
    conn: &Connection,
    user_id: &str,
    settings: &UserSrsSettings,
) -> Fallible<()> {
    let sql = "insert into srs_settings (user_id, vacation_mode, vacation_started_at, forgiveness_mode, max_reviews_per_session, daily_review_goal, daily_new_card_goal) values (?, ?, ?, ?, ?, ?, ?) on conflict (user_id) do update set vacation_mode = excluded.vacation_mode, vacation_started_at = excluded.vacation_started_at, forgiveness_mode = excluded.forgiveness_mode, max_reviews_per_session = excluded.max_reviews_per_session, daily_review_goal = excluded.daily_review_goal, daily_new_card_goal = excluded.daily_new_card_goal;";
    conn.execute(
        sql,
        (
            user_id,
            settings.vacation_mode,
            settings.vacation_started_at,
            settings.forgiveness_mode,
            settings.max_reviews_per_session,
            settings.daily_review_goal,
            settings.daily_new_card_goal,
        ),
    )?;
    Ok(())
}
