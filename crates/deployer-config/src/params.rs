//! Compiled contract parameters.
//!
//! Field order in every struct is the order the contracts expect; the
//! [`CalldataEncode`] impls flatten fields in that order.

use serde::Serialize;

use deployer_types::{Address, ByteArray, CalldataEncode, Felt, ShortString, U256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetParams {
    pub asset: Address,
    pub floor: u128,
    pub initial_rate_accumulator: u128,
    pub initial_full_utilization_rate: u128,
    pub max_utilization: u128,
    pub is_legacy: bool,
    pub fee_rate: u128,
}

impl CalldataEncode for AssetParams {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.asset.encode(out);
        U256::from(self.floor).encode(out);
        U256::from(self.initial_rate_accumulator).encode(out);
        U256::from(self.initial_full_utilization_rate).encode(out);
        U256::from(self.max_utilization).encode(out);
        self.is_legacy.encode(out);
        U256::from(self.fee_rate).encode(out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VTokenParams {
    pub v_token_name: String,
    pub v_token_symbol: String,
    pub debt_asset: Address,
}

impl CalldataEncode for VTokenParams {
    fn encode(&self, out: &mut Vec<Felt>) {
        ByteArray::new(self.v_token_name.clone()).encode(out);
        ByteArray::new(self.v_token_symbol.clone()).encode(out);
        self.debt_asset.encode(out);
    }
}

/// Interest rate model parameters. Utilizations use `UTILIZATION_SCALE`,
/// rates use `SCALE`, `rate_half_life` is seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterestRateConfig {
    pub min_target_utilization: u128,
    pub max_target_utilization: u128,
    pub target_utilization: u128,
    pub min_full_utilization_rate: u128,
    pub max_full_utilization_rate: u128,
    pub zero_utilization_rate: u128,
    pub rate_half_life: u64,
    pub target_rate_percent: u128,
}

impl InterestRateConfig {
    /// Values in calldata order, as returned by `interest_rate_config`.
    pub fn fields(&self) -> [(&'static str, u128); 8] {
        [
            ("min_target_utilization", self.min_target_utilization),
            ("max_target_utilization", self.max_target_utilization),
            ("target_utilization", self.target_utilization),
            ("min_full_utilization_rate", self.min_full_utilization_rate),
            ("max_full_utilization_rate", self.max_full_utilization_rate),
            ("zero_utilization_rate", self.zero_utilization_rate),
            ("rate_half_life", u128::from(self.rate_half_life)),
            ("target_rate_percent", self.target_rate_percent),
        ]
    }
}

impl CalldataEncode for InterestRateConfig {
    fn encode(&self, out: &mut Vec<Felt>) {
        for (_, value) in self.fields() {
            U256::from(value).encode(out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    Median,
    Mean,
}

impl AggregationMode {
    /// Case-insensitive `median`/`mean`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "median" => Some(Self::Median),
            "mean" => Some(Self::Mean),
            _ => None,
        }
    }

    pub fn variant_index(&self) -> u8 {
        match self {
            Self::Median => 0,
            Self::Mean => 1,
        }
    }
}

impl CalldataEncode for AggregationMode {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.variant_index().encode(out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PragmaOracleParams {
    pub asset: Address,
    pub pragma_key: ShortString,
    pub timeout: u64,
    pub number_of_sources: u32,
    pub start_time_offset: u64,
    pub time_window: u64,
    pub aggregation_mode: AggregationMode,
}

impl PragmaOracleParams {
    /// Oracle config struct without the asset, as passed to `add_asset`.
    pub fn config_calldata(&self) -> Vec<Felt> {
        let mut out = Vec::new();
        self.pragma_key.encode(&mut out);
        self.timeout.encode(&mut out);
        self.number_of_sources.encode(&mut out);
        self.start_time_offset.encode(&mut out);
        self.time_window.encode(&mut out);
        self.aggregation_mode.encode(&mut out);
        out
    }
}

impl CalldataEncode for PragmaOracleParams {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.asset.encode(out);
        out.extend(self.config_calldata());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairParams {
    pub collateral_asset_index: u32,
    pub debt_asset_index: u32,
    pub max_ltv: u128,
    pub liquidation_factor: u128,
    pub debt_cap: u128,
}

impl CalldataEncode for PairParams {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.collateral_asset_index.encode(out);
        self.debt_asset_index.encode(out);
        self.max_ltv.encode(out);
        self.liquidation_factor.encode(out);
        self.debt_cap.encode(out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LtvParams {
    pub collateral_asset_index: u32,
    pub debt_asset_index: u32,
    pub max_ltv: u128,
}

impl CalldataEncode for LtvParams {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.collateral_asset_index.encode(out);
        self.debt_asset_index.encode(out);
        self.max_ltv.encode(out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownParams {
    /// Seconds.
    pub recovery_period: u64,
    /// Seconds.
    pub subscription_period: u64,
    pub ltv_params: Vec<LtvParams>,
}

impl CalldataEncode for ShutdownParams {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.recovery_period.encode(out);
        self.subscription_period.encode(out);
        self.ltv_params.encode(out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeParams {
    pub fee_recipient: Address,
}

/// Everything needed to create and check one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPool {
    /// Key of the pool in the config document.
    pub key: String,
    pub name: ShortString,
    pub owner: Address,
    pub curator: Address,
    pub fee_params: FeeParams,
    pub asset_params: Vec<AssetParams>,
    pub v_token_params: Vec<VTokenParams>,
    pub interest_rate_configs: Vec<InterestRateConfig>,
    pub pragma_oracle_params: Vec<PragmaOracleParams>,
    pub pair_params: Vec<PairParams>,
    pub shutdown_params: ShutdownParams,
}

impl CompiledPool {
    /// Arguments of `create_pool` after the oracle address.
    ///
    /// `create_pool(name, curator, oracle, fee_recipient, asset_params,
    /// v_token_params, interest_rate_configs, pair_params)`
    pub fn create_pool_calldata(&self, oracle: Address) -> Vec<Felt> {
        let mut out = Vec::new();
        self.name.encode(&mut out);
        self.curator.encode(&mut out);
        oracle.encode(&mut out);
        self.fee_params.fee_recipient.encode(&mut out);
        self.asset_params.encode(&mut out);
        self.v_token_params.encode(&mut out);
        self.interest_rate_configs.encode(&mut out);
        self.pair_params.encode(&mut out);
        out
    }

    pub fn assets(&self) -> Vec<Address> {
        self.asset_params.iter().map(|p| p.asset).collect()
    }
}

/// Constructor arguments of a mock token plus its mock oracle price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockAssetParams {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Base units (`initial_supply * 10^decimals`).
    pub initial_supply: u128,
    pub pragma_key: ShortString,
    /// Price scaled by `SCALE`.
    pub price: u128,
    pub is_legacy: bool,
}

impl MockAssetParams {
    /// `constructor(name, symbol, decimals, initial_supply, recipient)`
    pub fn constructor_calldata(&self, recipient: Address) -> Vec<Felt> {
        let mut out = Vec::new();
        ByteArray::new(self.name.clone()).encode(&mut out);
        ByteArray::new(self.symbol.clone()).encode(&mut out);
        self.decimals.encode(&mut out);
        U256::from(self.initial_supply).encode(&mut out);
        recipient.encode(&mut out);
        out
    }
}
