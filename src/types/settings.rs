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

use serde::Deserialize;
use serde::Serialize;

use crate::types::timestamp::Timestamp;

pub const MIN_REVIEWS_PER_SESSION: u32 = 10;
pub const MAX_REVIEWS_PER_SESSION: u32 = 100;
pub const DEFAULT_REVIEWS_PER_SESSION: u32 = 20;

/// A learner's scheduling preferences. A learner with no stored settings
/// has the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSrsSettings {
    pub vacation_mode: bool,
    /// Set iff `vacation_mode` is on.
    pub vacation_started_at: Option<Timestamp>,
    pub forgiveness_mode: bool,
    /// Always within [10, 100].
    pub max_reviews_per_session: u32,
    pub daily_review_goal: Option<u32>,
    pub daily_new_card_goal: Option<u32>,
}

impl Default for UserSrsSettings {
    fn default() -> Self {
        Self {
            vacation_mode: false,
            vacation_started_at: None,
            forgiveness_mode: true,
            max_reviews_per_session: DEFAULT_REVIEWS_PER_SESSION,
            daily_review_goal: None,
            daily_new_card_goal: None,
        }
    }
}

/// A partial update to [`UserSrsSettings`]. Absent fields keep their
/// current value. Vacation mode is deliberately missing: it changes only
/// through the vacation toggle, which also shifts due dates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SrsSettingsPatch {
    pub forgiveness_mode: Option<bool>,
    pub max_reviews_per_session: Option<u32>,
    /// `Some(None)` clears the goal.
    #[serde(default, with = "double_option")]
    pub daily_review_goal: Option<Option<u32>>,
    #[serde(default, with = "double_option")]
    pub daily_new_card_goal: Option<Option<u32>>,
}

impl UserSrsSettings {
    /// Apply `patch` on top of `self`: the patch value wins, else the
    /// existing value. Out-of-range session sizes are clamped.
    pub fn merge(&self, patch: &SrsSettingsPatch) -> Self {
        let max_reviews_per_session = patch
            .max_reviews_per_session
            .unwrap_or(self.max_reviews_per_session);
        Self {
            vacation_mode: self.vacation_mode,
            vacation_started_at: self.vacation_started_at,
            forgiveness_mode: patch.forgiveness_mode.unwrap_or(self.forgiveness_mode),
            max_reviews_per_session: clamp_reviews_per_session(max_reviews_per_session),
            daily_review_goal: patch.daily_review_goal.unwrap_or(self.daily_review_goal),
            daily_new_card_goal: patch.daily_new_card_goal.unwrap_or(self.daily_new_card_goal),
        }
    }
}

pub fn clamp_reviews_per_session(n: u32) -> u32 {
    n.clamp(MIN_REVIEWS_PER_SESSION, MAX_REVIEWS_PER_SESSION)
}

/// Distinguishes a missing field from an explicit `null`.
mod double_option {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serialize;
    use serde::Serializer;

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Some(Option::deserialize(deserializer)?))
    }
}
