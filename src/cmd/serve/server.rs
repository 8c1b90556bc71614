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

use std::path::PathBuf;

use axum::Router;
use axum::routing::get;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::signal;

use crate::cmd::open_engine;
use crate::cmd::serve::get::get_card;
use crate::cmd::serve::get::get_due;
use crate::cmd::serve::get::get_history;
use crate::cmd::serve::get::get_item_aggregates;
use crate::cmd::serve::get::get_new;
use crate::cmd::serve::get::get_preview;
use crate::cmd::serve::get::get_settings;
use crate::cmd::serve::get::get_stats;
use crate::cmd::serve::post::delete_item;
use crate::cmd::serve::post::patch_settings;
use crate::cmd::serve::post::post_card;
use crate::cmd::serve::post::post_item;
use crate::cmd::serve::post::post_review;
use crate::cmd::serve::post::post_undo;
use crate::cmd::serve::post::post_vacation;
use crate::cmd::serve::state::ServerState;
use crate::error::Fallible;

pub struct ServeOptions {
    pub db_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

pub async fn start_server(options: ServeOptions) -> Fallible<()> {
    let engine = open_engine(&options.db_path, options.config_path.as_deref())?;
    log::debug!(
        "Scheduling with parameters {}",
        engine.params().version
    );

    let app = router(ServerState { engine });
    let bind = format!("{}:{}", options.host, options.port);
    log::debug!("Starting server on {bind}");
    let listener = TcpListener::bind(&bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/items", post(post_item))
        .route("/items/{item_id}", axum::routing::delete(delete_item))
        .route("/items/{item_id}/aggregates", get(get_item_aggregates))
        .route("/cards", post(post_card))
        .route("/cards/{card_id}", get(get_card))
        .route("/cards/{card_id}/history", get(get_history))
        .route("/cards/{card_id}/preview", get(get_preview))
        .route("/cards/{card_id}/review", post(post_review))
        .route("/cards/{card_id}/undo", post(post_undo))
        .route("/users/{user_id}/due", get(get_due))
        .route("/users/{user_id}/new", get(get_new))
        .route(
            "/users/{user_id}/settings",
            get(get_settings).patch(patch_settings),
        )
        .route("/users/{user_id}/vacation", post(post_vacation))
        .route("/users/{user_id}/stats", get(get_stats))
        .with_state(state)
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => log::debug!("Shutting down"),
        Err(e) => log::error!("Failed to listen for shutdown signal: {e}"),
    }
}
