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

//! Compatibility for cards stored before cards carried their own language.
//! Such cards have a null language, so a language-filtered query can't see
//! them; here we resolve their language through the owning item instead.

use rusqlite::Connection;

use crate::db::CARD_COLUMNS;
use crate::db::card_from_row;
use crate::error::Fallible;
use crate::types::card::Card;
use crate::types::language::Language;
use crate::types::timestamp::Timestamp;

/// Top up a language-filtered due list with matching untagged cards.
pub fn fill_due(
    conn: &Connection,
    cards: &mut Vec<Card>,
    user_id: &str,
    language: Option<Language>,
    now: Timestamp,
    limit: usize,
) -> Fallible<()> {
    if let Some(language) = language {
        if cards.len() < limit {
            let extra = list_legacy_due_cards(conn, user_id, language, now, limit - cards.len())?;
            top_up(cards, extra, limit);
        }
    }
    Ok(())
}

/// Top up a language-filtered new-card list with matching untagged cards.
pub fn fill_new(
    conn: &Connection,
    cards: &mut Vec<Card>,
    user_id: &str,
    language: Option<Language>,
    limit: usize,
) -> Fallible<()> {
    if let Some(language) = language {
        if cards.len() < limit {
            let extra = list_legacy_new_cards(conn, user_id, language, limit - cards.len())?;
            top_up(cards, extra, limit);
        }
    }
    Ok(())
}

/// Untagged due cards whose item is in `language`, earliest first.
fn list_legacy_due_cards(
    conn: &Connection,
    user_id: &str,
    language: Language,
    now: Timestamp,
    limit: usize,
) -> Fallible<Vec<Card>> {
    let sql = format!(
        "select {CARD_COLUMNS} from cards c join items i on i.item_id = c.item_id where c.user_id = ?1 and c.language is null and c.due <= ?2 and i.language = ?3 order by c.due limit ?4;"
    );
    let mut stmt = conn.prepare(&sql)?;
    let cards = stmt
        .query_map((user_id, now, language, limit as i64), card_from_row)?
        .collect::<rusqlite::Result<Vec<Card>>>()?;
    Ok(cards)
}

/// Untagged new cards whose item is in `language`, oldest first.
fn list_legacy_new_cards(
    conn: &Connection,
    user_id: &str,
    language: Language,
    limit: usize,
) -> Fallible<Vec<Card>> {
    let sql = format!(
        "select {CARD_COLUMNS} from cards c join items i on i.item_id = c.item_id where c.user_id = ?1 and c.language is null and c.state = 'new' and i.language = ?2 order by c.rowid limit ?3;"
    );
    let mut stmt = conn.prepare(&sql)?;
    let cards = stmt
        .query_map((user_id, language, limit as i64), card_from_row)?
        .collect::<rusqlite::Result<Vec<Card>>>()?;
    Ok(cards)
}

/// Append `extra` to `cards` until `limit` is reached.
fn top_up(cards: &mut Vec<Card>, extra: Vec<Card>, limit: usize) {
    let room = limit.saturating_sub(cards.len());
    cards.extend(extra.into_iter().take(room));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::card_state::CardState;

    fn card(item_id: &str) -> Card {
        Card::new("alice", item_id, None, Timestamp::from_millis(0))
    }

    #[test]
    fn test_top_up_respects_limit() {
        let mut cards = vec![card("a")];
        top_up(&mut cards, vec![card("b"), card("c"), card("d")], 3);
        let ids: Vec<&str> = cards.iter().map(|c| c.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_top_up_when_full() {
        let mut cards = vec![card("a"), card("b")];
        top_up(&mut cards, vec![card("c")], 2);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].state, CardState::New);
    }
}
