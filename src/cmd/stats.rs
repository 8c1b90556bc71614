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

use std::fmt::Display;
use std::fmt::Formatter;

use clap::ValueEnum;

use crate::engine::Engine;
use crate::engine::Stats;
use crate::error::Fallible;
use crate::types::timestamp::Timestamp;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum StatsFormat {
    /// Plain text, one count per line.
    Text,
    /// JSON output.
    Json,
}

impl Display for StatsFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsFormat::Text => write!(f, "text"),
            StatsFormat::Json => write!(f, "json"),
        }
    }
}

pub fn print_user_stats(engine: &Engine, user_id: &str, format: StatsFormat) -> Fallible<()> {
    let stats = engine.stats(user_id, Timestamp::now())?;
    println!("{}", render_stats(&stats, format)?);
    Ok(())
}

fn render_stats(stats: &Stats, format: StatsFormat) -> Fallible<String> {
    match format {
        StatsFormat::Text => {
            let lines = [
                format!("new: {}", stats.new_cards),
                format!("learning: {}", stats.learning_cards),
                format!("review: {}", stats.review_cards),
                format!("relearning: {}", stats.relearning_cards),
                format!("due now: {}", stats.due_now),
                format!("reviews in the last day: {}", stats.reviews_last_day),
            ];
            Ok(lines.join("\n"))
        }
        StatsFormat::Json => Ok(serde_json::to_string_pretty(stats)?),
    }
}
