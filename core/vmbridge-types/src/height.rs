// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// Where a block height sits relative to a module's activation height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightPhase {
    Before,
    At,
    After,
}

impl HeightPhase {
    /// True at or after activation.
    pub fn is_live(self) -> bool {
        !matches!(self, HeightPhase::Before)
    }
}

/// Block height at which a module becomes live. Set once, never changed.
///
/// Every height-gated decision (bridge entry points, store commit, prune and
/// version filters) goes through [`ActivationHeight::phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "i64")]
pub enum ActivationHeight {
    /// The module has never been activated.
    #[default]
    Unset,
    At(u64),
}

impl ActivationHeight {
    /// Build from the raw form where zero or a negative value means "unset".
    pub fn from_raw(raw: i64) -> Self {
        if raw <= 0 {
            ActivationHeight::Unset
        } else {
            ActivationHeight::At(raw as u64)
        }
    }

    /// Raw form, `-1` when unset.
    pub fn to_raw(self) -> i64 {
        match self {
            ActivationHeight::Unset => -1,
            ActivationHeight::At(h) => h as i64,
        }
    }

    pub fn height(self) -> Option<u64> {
        match self {
            ActivationHeight::Unset => None,
            ActivationHeight::At(h) => Some(h),
        }
    }

    pub fn is_set(self) -> bool {
        matches!(self, ActivationHeight::At(_))
    }

    /// An unset activation height keeps every height in `Before`.
    pub fn phase(self, height: u64) -> HeightPhase {
        match self {
            ActivationHeight::Unset => HeightPhase::Before,
            ActivationHeight::At(h) if height < h => HeightPhase::Before,
            ActivationHeight::At(h) if height == h => HeightPhase::At,
            ActivationHeight::At(_) => HeightPhase::After,
        }
    }
}

/// Raw serialized form; `null` and values `<= 0` are unset.
impl From<Option<i64>> for ActivationHeight {
    fn from(value: Option<i64>) -> Self {
        value.map_or(ActivationHeight::Unset, ActivationHeight::from_raw)
    }
}

impl From<ActivationHeight> for i64 {
    fn from(value: ActivationHeight) -> Self {
        value.to_raw()
    }
}
