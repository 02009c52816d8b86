use serde::Serialize;

/// Closed set of asset classes a portfolio can be allocated across.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AssetClass {
    Stocks,
    Bonds,
    Cash,
    RealEstate,
    Crypto,
    RetirementAccount,
    Alternatives,
    StartupEquity,
    Other,
}

impl AssetClass {
    pub const ALL: [AssetClass; 9] = [
        AssetClass::Stocks,
        AssetClass::Bonds,
        AssetClass::Cash,
        AssetClass::RealEstate,
        AssetClass::Crypto,
        AssetClass::RetirementAccount,
        AssetClass::Alternatives,
        AssetClass::StartupEquity,
        AssetClass::Other,
    ];

    pub fn key(self) -> &'static str {
        match self {
            AssetClass::Stocks => "stocks",
            AssetClass::Bonds => "bonds",
            AssetClass::Cash => "cash",
            AssetClass::RealEstate => "realEstate",
            AssetClass::Crypto => "crypto",
            AssetClass::RetirementAccount => "retirementAccount",
            AssetClass::Alternatives => "alternatives",
            AssetClass::StartupEquity => "startupEquity",
            AssetClass::Other => "other",
        }
    }
}

/// Static per-class return assumptions. Defined once, never user-editable.
#[derive(Copy, Clone, Debug)]
pub struct AssetAssumption {
    pub annual_return: f64,
    pub annual_volatility: f64,
}

/// Indexed in the same order as `AssetClass::ALL`.
pub const ASSET_ASSUMPTIONS: [AssetAssumption; 9] = [
    // stocks
    AssetAssumption {
        annual_return: 0.10,
        annual_volatility: 0.18,
    },
    // bonds
    AssetAssumption {
        annual_return: 0.04,
        annual_volatility: 0.06,
    },
    // cash
    AssetAssumption {
        annual_return: 0.02,
        annual_volatility: 0.01,
    },
    // real estate
    AssetAssumption {
        annual_return: 0.07,
        annual_volatility: 0.12,
    },
    // crypto
    AssetAssumption {
        annual_return: 0.15,
        annual_volatility: 0.60,
    },
    // employer retirement account
    AssetAssumption {
        annual_return: 0.08,
        annual_volatility: 0.14,
    },
    // alternative investments
    AssetAssumption {
        annual_return: 0.06,
        annual_volatility: 0.15,
    },
    // startup equity
    AssetAssumption {
        annual_return: 0.20,
        annual_volatility: 0.75,
    },
    // other
    AssetAssumption {
        annual_return: 0.05,
        annual_volatility: 0.10,
    },
];

/// Per-class weights, either percentages or absolute currency amounts
/// depending on `InputMode`. A fixed-size record keeps the simulation loop
/// branch-free; absent classes are simply zero.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AssetAllocation {
    pub stocks: f64,
    pub bonds: f64,
    pub cash: f64,
    pub real_estate: f64,
    pub crypto: f64,
    pub retirement_account: f64,
    pub alternatives: f64,
    pub startup_equity: f64,
    pub other: f64,
}

impl AssetAllocation {
    /// Raw entries in `AssetClass::ALL` order.
    pub fn entries(&self) -> [f64; 9] {
        [
            self.stocks,
            self.bonds,
            self.cash,
            self.real_estate,
            self.crypto,
            self.retirement_account,
            self.alternatives,
            self.startup_equity,
            self.other,
        ]
    }

    pub fn total(&self) -> f64 {
        self.entries().iter().sum()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InputMode {
    Percent,
    Dollar,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Goal {
    Preservation,
    Income,
    Growth,
}

impl Goal {
    /// (return multiplier, risk multiplier) applied to the blended portfolio.
    pub fn modifiers(self) -> (f64, f64) {
        match self {
            Goal::Preservation => (0.6, 0.5),
            Goal::Income => (0.8, 0.7),
            Goal::Growth => (1.0, 1.0),
        }
    }

    /// Unrecognized goal strings fall back to growth rather than erroring.
    pub fn parse_or_growth(value: &str) -> Goal {
        match value {
            "preservation" => Goal::Preservation,
            "income" => Goal::Income,
            _ => Goal::Growth,
        }
    }
}

/// The sole input to the projection engine. No identity, no lifecycle beyond
/// a single invocation.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub allocation: AssetAllocation,
    pub horizon_years: u32,
    pub annual_contribution: f64,
    pub initial_principal: f64,
    pub input_mode: InputMode,
    pub goal: Goal,
    pub simulations: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearProjection {
    pub year: u32,
    pub p10: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub expected: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub final_median: f64,
    pub final_p10: f64,
    pub final_p90: f64,
    pub final_expected: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub yearly_series: Vec<YearProjection>,
    pub summary: SummaryStats,
}
