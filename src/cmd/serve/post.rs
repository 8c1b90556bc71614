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
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use crate::cmd::serve::state::ApiError;
use crate::cmd::serve::state::ApiResult;
use crate::cmd::serve::state::ServerState;
use crate::engine::ReviewResult;
use crate::engine::VacationStatus;
use crate::fsrs::Rating;
use crate::types::card::CardSnapshot;
use crate::types::card_id::CardId;
use crate::types::item::Item;
use crate::types::item::ItemAggregates;
use crate::types::settings::SrsSettingsPatch;
use crate::types::settings::UserSrsSettings;
use crate::types::timestamp::Timestamp;

pub async fn post_item(
    State(state): State<ServerState>,
    Json(item): Json<Item>,
) -> Result<StatusCode, ApiError> {
    state.engine.register_item(&item)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_item(
    State(state): State<ServerState>,
    Path(item_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.engine.delete_item(&item_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCard {
    user_id: String,
    item_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    card_id: CardId,
}

pub async fn post_card(
    State(state): State<ServerState>,
    Json(form): Json<CreateCard>,
) -> ApiResult<Created> {
    let card_id = state
        .engine
        .create_card(&form.user_id, &form.item_id, Timestamp::now())?;
    Ok(Json(Created { card_id }))
}

/// The rating arrives as a string so that unknown values are reported as
/// invalid ratings rather than as malformed JSON.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewForm {
    rating: String,
    latency_ms: Option<u64>,
}

pub async fn post_review(
    State(state): State<ServerState>,
    Path(card_id): Path<String>,
    Json(form): Json<ReviewForm>,
) -> ApiResult<ReviewResult> {
    let rating: Rating = form.rating.parse()?;
    let card_id = CardId::from_hex(&card_id)?;
    let result = state
        .engine
        .review(card_id, rating, form.latency_ms, Timestamp::now())?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoForm {
    previous: CardSnapshot,
    previous_aggregates: ItemAggregates,
}

pub async fn post_undo(
    State(state): State<ServerState>,
    Path(card_id): Path<String>,
    Json(form): Json<UndoForm>,
) -> Result<StatusCode, ApiError> {
    let card_id = CardId::from_hex(&card_id)?;
    state
        .engine
        .undo_review(card_id, &form.previous, &form.previous_aggregates)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn patch_settings(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
    Json(patch): Json<SrsSettingsPatch>,
) -> ApiResult<UserSrsSettings> {
    Ok(Json(state.engine.update_srs_settings(&user_id, &patch)?))
}

#[derive(Deserialize)]
pub struct VacationForm {
    enabled: bool,
}

pub async fn post_vacation(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
    Json(form): Json<VacationForm>,
) -> ApiResult<VacationStatus> {
    let status = state
        .engine
        .toggle_vacation_mode(&user_id, form.enabled, Timestamp::now())?;
    Ok(Json(status))
}
