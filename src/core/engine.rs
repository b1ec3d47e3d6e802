use super::error::InputError;
use super::types::{HORIZON_AGE, ProjectionSample, SimulationParams};

const MONTHS_PER_YEAR: u32 = 12;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    Accumulation,
    Decumulation,
}

impl Phase {
    fn for_age(age: u32, retirement_age: f64) -> Self {
        if (age as f64) < retirement_age {
            Phase::Accumulation
        } else {
            Phase::Decumulation
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Rates {
    monthly_growth: f64,
    contribution_growth: f64,
    inflation_growth: f64,
}

impl Rates {
    fn from_params(params: &SimulationParams) -> Self {
        let monthly_roi = params.expected_yearly_roi / 100.0 / MONTHS_PER_YEAR as f64;
        Self {
            monthly_growth: 1.0 + monthly_roi,
            contribution_growth: 1.0 + params.contribution_increase_rate / 100.0,
            inflation_growth: 1.0 + params.inflation_rate / 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ProjectionState {
    net_worth: f64,
    monthly_contribution: f64,
    yearly_withdrawal: f64,
    depleted: bool,
}

/// Year-by-year net worth from `current_age` through age 100 inclusive.
///
/// Each sample is the balance at the start of that age-year. Internal state
/// keeps full precision; only the emitted samples are truncated to cents.
pub fn project(params: &SimulationParams) -> Result<Vec<ProjectionSample>, InputError> {
    params.validate()?;
    Ok(run_projection(params))
}

/// Projection without validation. Callers must have validated `params`.
pub(crate) fn run_projection(params: &SimulationParams) -> Vec<ProjectionSample> {
    run_projection_retiring_at(params, params.effective_retirement_age() as f64)
}

/// Projection with a possibly fractional retirement age, overriding
/// `params.retirement_age`.
///
/// Ages strictly below `retirement_age` accumulate, so `61.2` draws down
/// from 62. The first withdrawal is still inflated over the fractional
/// `retirement_age - current_age` years.
pub(crate) fn run_projection_retiring_at(
    params: &SimulationParams,
    retirement_age: f64,
) -> Vec<ProjectionSample> {
    let retirement_age = retirement_age.max(params.current_age as f64);
    let rates = Rates::from_params(params);
    let mut state = ProjectionState {
        net_worth: params.current_savings,
        monthly_contribution: params.monthly_contribution,
        yearly_withdrawal: initial_yearly_withdrawal(params, retirement_age),
        depleted: false,
    };

    let mut samples = Vec::with_capacity((HORIZON_AGE + 1 - params.current_age) as usize);
    for age in params.current_age..=HORIZON_AGE {
        samples.push(ProjectionSample {
            age,
            net_worth: truncate_to_cents(state.net_worth),
        });
        if age == HORIZON_AGE {
            break;
        }
        advance_year(&mut state, Phase::for_age(age, retirement_age), &rates);
    }
    samples
}

/// First-year withdrawal: today's spending inflated to the retirement year,
/// grossed up so the post-tax amount matches it.
fn initial_yearly_withdrawal(params: &SimulationParams, retirement_age: f64) -> f64 {
    let years_to_retirement = retirement_age - params.current_age as f64;
    let inflated = params.expected_yearly_spending
        * (1.0 + params.inflation_rate / 100.0).powf(years_to_retirement);
    inflated * (100.0 / (100.0 - params.tax_rate))
}

fn advance_year(state: &mut ProjectionState, phase: Phase, rates: &Rates) {
    match phase {
        Phase::Accumulation => {
            for _ in 0..MONTHS_PER_YEAR {
                state.net_worth =
                    (state.net_worth + state.monthly_contribution) * rates.monthly_growth;
            }
            state.monthly_contribution *= rates.contribution_growth;
        }
        Phase::Decumulation => {
            let monthly_withdrawal = state.yearly_withdrawal / MONTHS_PER_YEAR as f64;
            for _ in 0..MONTHS_PER_YEAR {
                if state.depleted {
                    break;
                }
                state.net_worth = state.net_worth * rates.monthly_growth - monthly_withdrawal;
                if state.net_worth < 0.0 {
                    state.net_worth = 0.0;
                    state.depleted = true;
                }
            }
            state.yearly_withdrawal *= rates.inflation_growth;
        }
    }
}

fn truncate_to_cents(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}
