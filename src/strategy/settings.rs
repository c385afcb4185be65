use serde::Deserialize;

/// An allow-listed asset, matched by address or symbol
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AssetRef {
    pub address: String,
    pub symbol: String,
}

impl AssetRef {
    pub fn matches(&self, token_address: &str, symbol: &str) -> bool {
        self.address.eq_ignore_ascii_case(token_address) || self.symbol.eq_ignore_ascii_case(symbol)
    }
}

/// Strategy inputs that are configuration rather than market state
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySettings {
    /// Yield-bearing assets scanned by the yield strategy
    #[serde(default = "default_yield_assets")]
    pub yield_assets: Vec<AssetRef>,
    /// Assets accumulated by the DCA strategy
    #[serde(default = "default_dca_assets")]
    pub dca_assets: Vec<AssetRef>,
    /// Stablecoin the hedge strategy rotates into
    #[serde(default = "default_stablecoin")]
    pub stablecoin: AssetRef,
    /// Additional symbols treated as stable by the hedge strategy
    #[serde(default = "default_stable_symbols")]
    pub stable_symbols: Vec<String>,
    /// Minimum token age before buys are allowed
    #[serde(default = "default_min_token_age_blocks")]
    pub min_token_age_blocks: u64,
}

fn default_yield_assets() -> Vec<AssetRef> {
    vec![
        AssetRef {
            address: "0xe1d2439b75fb9746e7bc6cb777ae10aa7f7ef9c5".to_string(),
            symbol: "sMON".to_string(),
        },
        AssetRef {
            address: "0xaeef2f6b429cb59c9b2d7bb2141ada993e8571c3".to_string(),
            symbol: "gMON".to_string(),
        },
        AssetRef {
            address: "0x3a98250f98dd388c211206983453837c8365bdc1".to_string(),
            symbol: "shMON".to_string(),
        },
    ]
}

fn default_dca_assets() -> Vec<AssetRef> {
    vec![
        AssetRef {
            address: "0x760afe86e5de5fa0ee542fc7b7b713e1c5425701".to_string(),
            symbol: "WMON".to_string(),
        },
        AssetRef {
            address: "0xb5a30b0fdc5ea94a52fdc42e3e9760cb8449fb37".to_string(),
            symbol: "WETH".to_string(),
        },
        AssetRef {
            address: "0xcf5a6076cfa32686c0df13abada2b40dec133f1d".to_string(),
            symbol: "WBTC".to_string(),
        },
    ]
}

fn default_stablecoin() -> AssetRef {
    AssetRef {
        address: "0xf817257fed379853cde0fa4f97ab987181b1e5ea".to_string(),
        symbol: "USDC".to_string(),
    }
}

fn default_stable_symbols() -> Vec<String> {
    ["USDC", "USDT", "DAI", "USDe"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_token_age_blocks() -> u64 {
    50
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            yield_assets: default_yield_assets(),
            dca_assets: default_dca_assets(),
            stablecoin: default_stablecoin(),
            stable_symbols: default_stable_symbols(),
            min_token_age_blocks: default_min_token_age_blocks(),
        }
    }
}

impl StrategySettings {
    pub fn is_stable(&self, token_address: &str, symbol: &str) -> bool {
        self.stablecoin.matches(token_address, symbol)
            || self
                .stable_symbols
                .iter()
                .any(|s| s.eq_ignore_ascii_case(symbol))
    }
}
