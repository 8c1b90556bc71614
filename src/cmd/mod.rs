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

use std::path::Path;

use crate::config::Config;
use crate::db::Database;
use crate::engine::Engine;
use crate::error::ErrorReport;
use crate::error::Fallible;

pub mod serve;
pub mod stats;

/// Open the database at `db_path` and build an engine from the
/// configuration file, if one is given.
pub fn open_engine(db_path: &Path, config_path: Option<&Path>) -> Fallible<Engine> {
    let config = Config::load(config_path)?;
    let db_path: &str = db_path
        .to_str()
        .ok_or_else(|| ErrorReport::new("invalid path"))?;
    let db = Database::new(db_path)?;
    Engine::new(db, config.scheduling)
}
