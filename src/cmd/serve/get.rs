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

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use serde::Deserialize;

use crate::cmd::serve::state::ApiResult;
use crate::cmd::serve::state::ServerState;
use crate::engine::Preview;
use crate::engine::Stats;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::item::ItemAggregates;
use crate::types::language::Language;
use crate::types::review::ReviewRecord;
use crate::types::settings::UserSrsSettings;
use crate::types::timestamp::Timestamp;

#[derive(Deserialize)]
pub struct SelectionQuery {
    language: Option<String>,
    limit: Option<usize>,
}

impl SelectionQuery {
    fn language(&self) -> crate::error::Fallible<Option<Language>> {
        self.language.as_deref().map(str::parse::<Language>).transpose()
    }
}

pub async fn get_card(
    State(state): State<ServerState>,
    Path(card_id): Path<String>,
) -> ApiResult<Card> {
    let card_id = CardId::from_hex(&card_id)?;
    Ok(Json(state.engine.get_card(card_id)?))
}

pub async fn get_history(
    State(state): State<ServerState>,
    Path(card_id): Path<String>,
) -> ApiResult<Vec<ReviewRecord>> {
    let card_id = CardId::from_hex(&card_id)?;
    Ok(Json(state.engine.history(card_id)?))
}

pub async fn get_preview(
    State(state): State<ServerState>,
    Path(card_id): Path<String>,
) -> ApiResult<Vec<Preview>> {
    let card_id = CardId::from_hex(&card_id)?;
    Ok(Json(state.engine.preview(card_id, Timestamp::now())?))
}

pub async fn get_item_aggregates(
    State(state): State<ServerState>,
    Path(item_id): Path<String>,
) -> ApiResult<ItemAggregates> {
    Ok(Json(state.engine.get_item_aggregates(&item_id)?))
}

pub async fn get_due(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
    Query(query): Query<SelectionQuery>,
) -> ApiResult<Vec<Card>> {
    let language = query.language()?;
    let cards = state
        .engine
        .get_due_cards(&user_id, language, query.limit, Timestamp::now())?;
    Ok(Json(cards))
}

pub async fn get_new(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
    Query(query): Query<SelectionQuery>,
) -> ApiResult<Vec<Card>> {
    let language = query.language()?;
    let cards = state.engine.get_new_cards(&user_id, language, query.limit)?;
    Ok(Json(cards))
}

pub async fn get_settings(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserSrsSettings> {
    Ok(Json(state.engine.get_or_create_settings(&user_id)?))
}

pub async fn get_stats(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
) -> ApiResult<Stats> {
    Ok(Json(state.engine.stats(&user_id, Timestamp::now())?))
}
