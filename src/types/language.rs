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
use std::str::FromStr;

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::fail_with;

/// The language a learner is studying. This is the language of the
/// content, not of the interface.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Japanese,
    English,
    French,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Japanese => "japanese",
            Language::English => "english",
            Language::French => "french",
        }
    }

    pub fn iso_code(&self) -> &'static str {
        match self {
            Language::Japanese => "ja",
            Language::English => "en",
            Language::French => "fr",
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Language {
    type Err = ErrorReport;

    /// Accepts either the language code or its ISO 639-1 code.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "japanese" | "ja" => Ok(Language::Japanese),
            "english" | "en" => Ok(Language::English),
            "french" | "fr" => Ok(Language::French),
            _ => fail_with(
                ErrorKind::InvalidLanguage,
                format!("Invalid language: {value}"),
            ),
        }
    }
}

impl ToSql for Language {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Language {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        string
            .parse::<Language>()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
