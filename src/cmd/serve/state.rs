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
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::json;

use crate::engine::Engine;
use crate::error::ErrorKind;
use crate::error::ErrorReport;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Engine,
}

/// An engine error on its way out as an HTTP response.
pub struct ApiError(pub ErrorReport);

impl From<ErrorReport> for ApiError {
    fn from(value: ErrorReport) -> Self {
        ApiError(value)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::CardNotFound | ErrorKind::ItemNotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidRating | ErrorKind::InvalidLanguage => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self.0);
        }
        let body = Json(json!({ "error": self.0.message() }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
