mod engine;
mod retirement;
mod types;

pub use engine::{UniformSource, Xorshift, run_projection, run_projection_with_source};
pub use retirement::{
    RetirementInputs, RetirementResult, RetirementYear, annuity_payment,
    growing_annuity_future_value, run_retirement_projection,
};
pub use types::{
    ASSET_ASSUMPTIONS, AssetAllocation, AssetAssumption, AssetClass, Goal, InputMode, Inputs,
    ProjectionResult, SummaryStats, YearProjection,
};
