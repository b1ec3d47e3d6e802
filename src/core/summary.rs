use super::error::InputError;
use super::types::{RetirementSummary, SimulationParams};

/// Share of the retirement pot assumed withdrawable each year.
const SAFE_WITHDRAWAL_RATE: f64 = 0.04;

/// Savings at retirement plus the income they would support.
///
/// A quick estimate next to [`project`](super::project): there is no
/// decumulation phase and the numbers are not meant to reconcile with it.
pub fn summarize(params: &SimulationParams) -> Result<RetirementSummary, InputError> {
    params.validate()?;

    let years = params.effective_retirement_age() - params.current_age;
    let months = years * 12;
    let monthly_rate = params.expected_yearly_roi / 100.0 / 12.0;
    let inflation_factor = (1.0 + params.inflation_rate / 100.0).powf(years as f64);

    let lump_sum = params.current_savings * (1.0 + monthly_rate).powf(months as f64);
    let contributions = future_value_of_contributions(params, months, monthly_rate);

    let total_savings = lump_sum + contributions;
    let monthly_income = total_savings * SAFE_WITHDRAWAL_RATE / 12.0;

    Ok(RetirementSummary {
        years_to_grow: years,
        total_savings: round_to_cents(total_savings),
        real_total_savings: round_to_cents(total_savings / inflation_factor),
        monthly_income_in_retirement: round_to_cents(monthly_income),
        after_tax_monthly_income: round_to_cents(monthly_income * (1.0 - params.tax_rate / 100.0)),
        future_yearly_spending: round_to_cents(params.expected_yearly_spending * inflation_factor),
    })
}

fn future_value_of_contributions(params: &SimulationParams, months: u32, monthly_rate: f64) -> f64 {
    let mut contribution = params.monthly_contribution;
    let mut value = 0.0;
    for month in 1..=months {
        value = (value + contribution) * (1.0 + monthly_rate);
        if month % 12 == 0 {
            contribution *= 1.0 + params.contribution_increase_rate / 100.0;
        }
    }
    value
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> SimulationParams {
        SimulationParams {
            current_age: 30,
            retirement_age: 31,
            inflation_rate: 0.0,
            current_savings: 1_000.0,
            monthly_contribution: 100.0,
            contribution_increase_rate: 0.0,
            expected_yearly_roi: 0.0,
            expected_yearly_spending: 50_000.0,
            tax_rate: 25.0,
        }
    }

    #[test]
    fn zero_return_summary_matches_hand_calculation() {
        let summary = summarize(&base_params()).expect("valid params");
        assert_eq!(
            summary,
            RetirementSummary {
                years_to_grow: 1,
                total_savings: 2_200.0,
                real_total_savings: 2_200.0,
                monthly_income_in_retirement: 7.33,
                after_tax_monthly_income: 5.5,
                future_yearly_spending: 50_000.0,
            }
        );
    }

    #[test]
    fn contribution_growth_and_inflation_apply_per_year() {
        let mut params = base_params();
        params.retirement_age = 32;
        params.current_savings = 0.0;
        params.contribution_increase_rate = 50.0;
        params.inflation_rate = 10.0;
        params.expected_yearly_spending = 1_000.0;
        params.tax_rate = 20.0;

        let summary = summarize(&params).expect("valid params");
        assert_eq!(summary.years_to_grow, 2);
        assert_eq!(summary.total_savings, 3_000.0);
        assert_eq!(summary.real_total_savings, 2_479.34);
        assert_eq!(summary.monthly_income_in_retirement, 10.0);
        assert_eq!(summary.after_tax_monthly_income, 8.0);
        assert_eq!(summary.future_yearly_spending, 1_210.0);
    }

    #[test]
    fn lump_sum_compounds_monthly() {
        let mut params = base_params();
        params.monthly_contribution = 0.0;
        params.expected_yearly_roi = 12.0;

        let summary = summarize(&params).expect("valid params");
        assert_eq!(summary.total_savings, 1_126.83);
    }

    #[test]
    fn past_retirement_age_has_nothing_to_grow() {
        let mut params = base_params();
        params.current_age = 40;
        params.retirement_age = 30;

        let summary = summarize(&params).expect("valid params");
        assert_eq!(summary.years_to_grow, 0);
        assert_eq!(summary.total_savings, 1_000.0);
        assert_eq!(summary.future_yearly_spending, 50_000.0);
    }

    #[test]
    fn rejects_full_tax_rate() {
        let mut params = base_params();
        params.tax_rate = 100.0;
        assert_eq!(summarize(&params), Err(InputError::TaxRate(100.0)));
    }
}
