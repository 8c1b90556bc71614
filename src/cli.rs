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

use clap::Args;
use clap::Parser;
use clap::ValueEnum;
use serde::Serialize;

use crate::cmd::open_engine;
use crate::cmd::serve::server::ServeOptions;
use crate::cmd::serve::server::start_server;
use crate::cmd::stats::StatsFormat;
use crate::cmd::stats::print_user_stats;
use crate::engine::Engine;
use crate::error::Fallible;
use crate::fsrs::Rating;
use crate::types::card_id::CardId;
use crate::types::item::Item;
use crate::types::language::Language;
use crate::types::timestamp::Timestamp;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Serve the scheduling API over HTTP.
    Serve {
        #[command(flatten)]
        store: StoreArgs,
        /// The host address to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// The port to use for the server.
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Register a vocabulary item for a learner.
    RegisterItem {
        #[command(flatten)]
        store: StoreArgs,
        user_id: String,
        item_id: String,
        /// Content language, e.g. `japanese` or `ja`.
        language: String,
    },
    /// Create the card for a registered item. Prints the card id.
    CreateCard {
        #[command(flatten)]
        store: StoreArgs,
        user_id: String,
        item_id: String,
    },
    /// Grade a card.
    Review {
        #[command(flatten)]
        store: StoreArgs,
        card_id: String,
        /// One of again, hard, good, easy (or 1 to 4).
        rating: String,
        /// How long the learner took to answer, in milliseconds.
        #[arg(long)]
        latency_ms: Option<u64>,
    },
    /// List the cards that are due for review.
    Due {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// List cards that have never been reviewed.
    New {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Turn vacation mode on or off.
    Vacation {
        #[command(flatten)]
        store: StoreArgs,
        user_id: String,
        toggle: Toggle,
    },
    /// Print card counts for a learner.
    Stats {
        #[command(flatten)]
        store: StoreArgs,
        user_id: String,
        /// Output format.
        #[arg(long, default_value_t = StatsFormat::Text)]
        format: StatsFormat,
    },
}

#[derive(Args)]
struct StoreArgs {
    /// Path to the SQLite database.
    #[arg(long, default_value = "kioku.db")]
    db: PathBuf,
    /// Optional path to a TOML file with scheduling parameters.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl StoreArgs {
    fn engine(&self) -> Fallible<Engine> {
        open_engine(&self.db, self.config.as_deref())
    }
}

#[derive(Args)]
struct SelectionArgs {
    user_id: String,
    /// Only return cards in this language.
    #[arg(long)]
    language: Option<String>,
    /// Maximum number of cards to return.
    #[arg(long)]
    limit: Option<usize>,
}

impl SelectionArgs {
    fn language(&self) -> Fallible<Option<Language>> {
        self.language.as_deref().map(str::parse::<Language>).transpose()
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum Toggle {
    On,
    Off,
}

fn print_json<T: Serialize>(value: &T) -> Fallible<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Serve { store, host, port } => {
            let options = ServeOptions {
                db_path: store.db,
                config_path: store.config,
                host,
                port,
            };
            start_server(options).await
        }
        Command::RegisterItem {
            store,
            user_id,
            item_id,
            language,
        } => {
            let item = Item {
                item_id,
                user_id,
                language: language.parse()?,
            };
            store.engine()?.register_item(&item)
        }
        Command::CreateCard {
            store,
            user_id,
            item_id,
        } => {
            let card_id = store
                .engine()?
                .create_card(&user_id, &item_id, Timestamp::now())?;
            println!("{card_id}");
            Ok(())
        }
        Command::Review {
            store,
            card_id,
            rating,
            latency_ms,
        } => {
            let rating: Rating = rating.parse()?;
            let card_id = CardId::from_hex(&card_id)?;
            let result = store
                .engine()?
                .review(card_id, rating, latency_ms, Timestamp::now())?;
            print_json(&result)
        }
        Command::Due { store, selection } => {
            let cards = store.engine()?.get_due_cards(
                &selection.user_id,
                selection.language()?,
                selection.limit,
                Timestamp::now(),
            )?;
            print_json(&cards)
        }
        Command::New { store, selection } => {
            let cards = store.engine()?.get_new_cards(
                &selection.user_id,
                selection.language()?,
                selection.limit,
            )?;
            print_json(&cards)
        }
        Command::Vacation {
            store,
            user_id,
            toggle,
        } => {
            let enabled = matches!(toggle, Toggle::On);
            let status = store
                .engine()?
                .toggle_vacation_mode(&user_id, enabled, Timestamp::now())?;
            print_json(&status)
        }
        Command::Stats {
            store,
            user_id,
            format,
        } => print_user_stats(&store.engine()?, &user_id, format),
    }
}
