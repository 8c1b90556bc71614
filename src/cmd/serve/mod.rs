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

mod get;
mod post;
pub mod server;
mod state;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use reqwest::StatusCode;
    use serde_json::Value;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::net::TcpStream;
    use tokio::spawn;
    use tokio::time::sleep;

    use crate::cmd::serve::server::ServeOptions;
    use crate::cmd::serve::server::start_server;
    use crate::db::Database;
    use crate::db::get_card;
    use crate::error::ErrorReport;
    use crate::error::Fallible;
    use crate::types::card_id::CardId;

    impl From<reqwest::Error> for ErrorReport {
        fn from(value: reqwest::Error) -> Self {
            ErrorReport::new(format!("HTTP error: {value}"))
        }
    }

    /// Start a server on a free port and wait until it accepts connections.
    async fn start(dir: &TempDir) -> String {
        let port = portpicker::pick_unused_port().unwrap();
        let options = ServeOptions {
            db_path: dir.path().join("kioku.db"),
            config_path: None,
            host: "127.0.0.1".to_string(),
            port,
        };
        spawn(async move { start_server(options).await });
        let bind = format!("127.0.0.1:{port}");
        loop {
            if let Ok(stream) = TcpStream::connect(&bind).await {
                drop(stream);
                break;
            }
            sleep(Duration::from_millis(1)).await;
        }
        format!("http://{bind}")
    }

    async fn setup_card(client: &reqwest::Client, base: &str) -> Fallible<String> {
        let response = client
            .post(format!("{base}/items"))
            .json(&json!({ "itemId": "word:1", "userId": "alice", "language": "japanese" }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = client
            .post(format!("{base}/cards"))
            .json(&json!({ "userId": "alice", "itemId": "word:1" }))
            .send()
            .await?;
        assert!(response.status().is_success());
        let body: Value = response.json().await?;
        Ok(body["cardId"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_start_server_with_bad_config() -> Fallible<()> {
        let options = ServeOptions {
            db_path: PathBuf::from(":memory:"),
            config_path: Some(PathBuf::from("./does-not-exist.toml")),
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        assert!(start_server(options).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_review_and_undo() -> Fallible<()> {
        let dir = tempfile::tempdir()?;
        let base = start(&dir).await;
        let db_path = dir.path().join("kioku.db");
        let client = reqwest::Client::new();
        let card_id = setup_card(&client, &base).await?;

        // Creating the card again gives the same id.
        assert_eq!(setup_card(&client, &base).await?, card_id);

        // The new card shows up in the new queue.
        let new: Value = client
            .get(format!("{base}/users/alice/new?language=ja"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(new.as_array().unwrap().len(), 1);

        // Review once so the snapshot carries non-trivial floats.
        let response = client
            .post(format!("{base}/cards/{card_id}/review"))
            .json(&json!({ "rating": "good" }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let result: Value = response.json().await?;
        assert_eq!(result["newState"], "review");
        assert_eq!(result["scheduledDays"], 2.0);
        let stored = Database::new(db_path.to_str().unwrap())?;
        let id = CardId::from_hex(&card_id)?;
        let stored_before = stored.read(|conn| get_card(conn, id))?.unwrap();

        // Snapshot, review, undo.
        let before: Value = client
            .get(format!("{base}/cards/{card_id}"))
            .send()
            .await?
            .json()
            .await?;
        let aggregates: Value = client
            .get(format!("{base}/items/word:1/aggregates"))
            .send()
            .await?
            .json()
            .await?;
        let response = client
            .post(format!("{base}/cards/{card_id}/review"))
            .json(&json!({ "rating": "hard", "latencyMs": 1500 }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let history: Value = client
            .get(format!("{base}/cards/{card_id}/history"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(history.as_array().unwrap().len(), 2);

        let snapshot = json!({
            "state": before["state"],
            "due": before["due"],
            "stability": before["stability"],
            "difficulty": before["difficulty"],
            "elapsedDays": before["elapsedDays"],
            "scheduledDays": before["scheduledDays"],
            "reps": before["reps"],
            "lapses": before["lapses"],
            "lastReview": before["lastReview"],
        });
        let response = client
            .post(format!("{base}/cards/{card_id}/undo"))
            .json(&json!({ "previous": snapshot, "previousAggregates": aggregates }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let after: Value = client
            .get(format!("{base}/cards/{card_id}"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(after, before);
        let stored_after = stored.read(|conn| get_card(conn, id))?.unwrap();
        assert_eq!(stored_after.stability.to_bits(), stored_before.stability.to_bits());
        assert_eq!(stored_after.difficulty.to_bits(), stored_before.difficulty.to_bits());
        assert_eq!(stored_after, stored_before);
        let history: Value = client
            .get(format!("{base}/cards/{card_id}/history"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(history.as_array().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_error_statuses() -> Fallible<()> {
        let dir = tempfile::tempdir()?;
        let base = start(&dir).await;
        let client = reqwest::Client::new();
        let card_id = setup_card(&client, &base).await?;

        let response = client
            .post(format!("{base}/cards/{card_id}/review"))
            .json(&json!({ "rating": "perfect" }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json().await?;
        assert_eq!(body["error"], "invalid rating: perfect");

        let missing = "0".repeat(64);
        let response = client
            .post(format!("{base}/cards/{missing}/review"))
            .json(&json!({ "rating": "good" }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = client
            .get(format!("{base}/users/alice/due?language=klingon"))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = client
            .post(format!("{base}/cards"))
            .json(&json!({ "userId": "alice", "itemId": "word:404" }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_settings_and_vacation() -> Fallible<()> {
        let dir = tempfile::tempdir()?;
        let base = start(&dir).await;
        let client = reqwest::Client::new();

        let settings: Value = client
            .get(format!("{base}/users/alice/settings"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(settings["forgivenessMode"], true);
        assert_eq!(settings["maxReviewsPerSession"], 20);

        let settings: Value = client
            .patch(format!("{base}/users/alice/settings"))
            .json(&json!({ "maxReviewsPerSession": 5 }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(settings["maxReviewsPerSession"], 10);

        let status: Value = client
            .post(format!("{base}/users/alice/vacation"))
            .json(&json!({ "enabled": true }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(status["vacationMode"], true);

        let status: Value = client
            .post(format!("{base}/users/alice/vacation"))
            .json(&json!({ "enabled": false }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(status["vacationMode"], false);
        assert_eq!(status["shiftedDays"], 0);
        Ok(())
    }
}
