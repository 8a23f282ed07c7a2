//! Per-denomination drip amounts and daily caps.

use std::collections::BTreeMap;

/// One micro-denominated unit of a whole coin
pub const MICRO_UNIT: u64 = 1_000_000;

/// Denominations dispensed by default
pub const DEFAULT_DENOMS: [&str; 8] = [
    "uluna", "ukrw", "uusd", "usdr", "ugbp", "ueur", "ujpy", "ucny",
];

/// Drip amount and window cap for one denomination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenomLimit {
    pub drip_amount: u64,
    pub window_cap: u64,
}

/// Static denomination table, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenomLimits {
    limits: BTreeMap<String, DenomLimit>,
}

impl DenomLimits {
    /// Build the table from drip amounts; each cap is `window_multiplier` drips.
    pub fn new<I, S>(amounts: I, window_multiplier: u64) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let limits = amounts
            .into_iter()
            .map(|(denom, drip_amount)| {
                (
                    denom.into(),
                    DenomLimit {
                        drip_amount,
                        window_cap: drip_amount.saturating_mul(window_multiplier),
                    },
                )
            })
            .collect();

        Self { limits }
    }

    pub fn get(&self, denom: &str) -> Option<DenomLimit> {
        self.limits.get(denom).copied()
    }

    pub fn drip_amount(&self, denom: &str) -> Option<u64> {
        self.get(denom).map(|limit| limit.drip_amount)
    }

    pub fn contains(&self, denom: &str) -> bool {
        self.limits.contains_key(denom)
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DenomLimit)> {
        self.limits.iter().map(|(denom, limit)| (denom.as_str(), limit))
    }
}

impl Default for DenomLimits {
    fn default() -> Self {
        Self::new(DEFAULT_DENOMS.iter().map(|d| (*d, 10 * MICRO_UNIT)), 10)
    }
}
