use serde::Serialize;

/// Rates closer together than this are treated as equal when the
/// growing-annuity denominator would otherwise vanish.
const RATE_EPSILON: f64 = 1e-9;

/// Deterministic retirement projection: geometric contribution growth up to
/// retirement, then a level-annuity drawdown through the horizon age.
#[derive(Debug, Clone)]
pub struct RetirementInputs {
    pub current_age: u32,
    pub retirement_age: u32,
    pub horizon_age: u32,
    pub current_savings: f64,
    pub annual_contribution: f64,
    pub contribution_growth_rate: f64,
    pub pre_retirement_return: f64,
    pub post_retirement_return: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementYear {
    pub age: u32,
    pub balance: f64,
    pub contribution: f64,
    pub withdrawal: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementResult {
    pub pot_at_retirement: f64,
    pub sustainable_annual_income: f64,
    pub yearly_series: Vec<RetirementYear>,
}

/// Future value of a growing annuity: `C * ((1+r)^n - (1+g)^n) / (r - g)`,
/// collapsing to `C * n * (1+r)^(n-1)` when the rates coincide.
pub fn growing_annuity_future_value(contribution: f64, rate: f64, growth: f64, years: u32) -> f64 {
    let n = years as f64;
    if (rate - growth).abs() < RATE_EPSILON {
        return contribution * n * (1.0 + rate).powf(n - 1.0);
    }
    contribution * ((1.0 + rate).powf(n) - (1.0 + growth).powf(n)) / (rate - growth)
}

/// Level annuity payment that exhausts `principal` over `years` at `rate`;
/// a near-zero rate degrades to straight division.
pub fn annuity_payment(principal: f64, rate: f64, years: u32) -> f64 {
    if years == 0 {
        return 0.0;
    }
    if rate.abs() < RATE_EPSILON {
        return principal / years as f64;
    }
    principal * rate / (1.0 - (1.0 + rate).powf(-(years as f64)))
}

pub fn run_retirement_projection(inputs: &RetirementInputs) -> RetirementResult {
    let accumulation_years = inputs.retirement_age.saturating_sub(inputs.current_age);
    let drawdown_years = inputs.horizon_age.saturating_sub(inputs.retirement_age);

    let mut yearly_series =
        Vec::with_capacity((accumulation_years + drawdown_years) as usize + 1);
    let mut balance = inputs.current_savings.max(0.0);
    let mut contribution = inputs.annual_contribution.max(0.0);

    yearly_series.push(RetirementYear {
        age: inputs.current_age,
        balance: balance.round(),
        contribution: 0.0,
        withdrawal: 0.0,
    });

    // Growth first, then the year's contribution lands at year end.
    for offset in 0..accumulation_years {
        balance = balance * (1.0 + inputs.pre_retirement_return) + contribution;
        balance = balance.max(0.0);
        yearly_series.push(RetirementYear {
            age: inputs.current_age + offset + 1,
            balance: balance.round(),
            contribution: contribution.round(),
            withdrawal: 0.0,
        });
        contribution *= 1.0 + inputs.contribution_growth_rate;
    }

    let pot_at_retirement = balance;
    let sustainable_annual_income =
        annuity_payment(pot_at_retirement, inputs.post_retirement_return, drawdown_years);

    for offset in 0..drawdown_years {
        balance = balance * (1.0 + inputs.post_retirement_return) - sustainable_annual_income;
        balance = balance.max(0.0);
        yearly_series.push(RetirementYear {
            age: inputs.retirement_age + offset + 1,
            balance: balance.round(),
            contribution: 0.0,
            withdrawal: sustainable_annual_income.round(),
        });
    }

    RetirementResult {
        pot_at_retirement: pot_at_retirement.round(),
        sustainable_annual_income: sustainable_annual_income.round(),
        yearly_series,
    }
}
