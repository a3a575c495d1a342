// Convert venue instrument ids into canonical asset symbols.

use std::collections::HashSet;

/// Assets some venues quote in thousand-unit contracts (e.g. `1000PEPE`).
pub const THOUSAND_UNIT_ASSETS: [&str; 4] = ["BONK", "FLOKI", "PEPE", "SHIB"];

const THOUSAND_PREFIX: &str = "1000";

#[derive(Debug, Clone)]
pub struct SymbolNormaliser {
    thousand_unit: HashSet<String>,
}

impl Default for SymbolNormaliser {
    fn default() -> Self {
        Self::new(THOUSAND_UNIT_ASSETS)
    }
}

impl SymbolNormaliser {
    pub fn new<I, S>(thousand_unit: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { thousand_unit: thousand_unit.into_iter().map(Into::into).collect() }
    }

    /// Canonical symbol for a venue instrument id such as `"PEPE-USDT-SWAP"`.
    ///
    /// The leading token before the first `-`, `_` or `/` is the asset. Ids
    /// without a separator are already canonical and pass through.
    pub fn canonical(&self, inst_id: &str) -> Option<String> {
        let asset = inst_id
            .trim()
            .split(['-', '_', '/'])
            .next()
            .filter(|token| !token.is_empty())?;

        if self.thousand_unit.contains(asset) {
            Some(format!("{THOUSAND_PREFIX}{asset}"))
        } else {
            Some(asset.to_string())
        }
    }
}
