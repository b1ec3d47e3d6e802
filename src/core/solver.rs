use super::engine::{run_projection, run_projection_retiring_at};
use super::error::InputError;
use super::types::{
    HORIZON_AGE, SOLVENCY_CHECK_AGE, SearchDirection, SimulationParams, SolveOutcome,
    SolveRequest, SolveTrial, SolveVariable,
};

pub const MAX_ITERATIONS: u32 = 20;
pub const CONVERGENCE_TOLERANCE: f64 = 1e-6;

/// Smallest age-99 balance that counts as solvent. Kept above zero so
/// floating point residue is not mistaken for a funded plan.
pub const SOLVENCY_THRESHOLD: f64 = 1.0;

/// Bisects `[search_min, search_max]` for the value of `request.variable`
/// that keeps the age-99 balance at or above [`SOLVENCY_THRESHOLD`].
///
/// Most variables look for the smallest sufficient value. Spending looks for
/// the largest affordable one. Assumes the age-99 balance is monotonic in the
/// variable; the result is meaningless otherwise.
pub fn solve(request: &SolveRequest) -> Result<SolveOutcome, InputError> {
    validate_request(request)?;

    let variable = request.variable;
    let direction = variable.direction();
    let mut lo = request.search_min;
    let mut hi = request.search_max;
    let mut best = None;
    let mut trials = Vec::with_capacity(MAX_ITERATIONS as usize);

    for iteration in 1..=MAX_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        let eval = evaluate_candidate(&request.params, variable, mid);
        trials.push(SolveTrial {
            iteration,
            lower_bound: lo,
            upper_bound: hi,
            candidate_value: variable.applied_value(mid),
            net_worth_at_check_age: eval.net_worth,
            solvent: eval.solvent,
        });
        tracing::debug!(
            variable = variable.name(),
            iteration,
            candidate = mid,
            net_worth = eval.net_worth,
            solvent = eval.solvent,
            "solver trial"
        );

        match (eval.solvent, direction) {
            (true, SearchDirection::Minimize) => {
                best = Some(variable.applied_value(mid));
                hi = mid;
            }
            (true, SearchDirection::Maximize) => {
                best = Some(variable.applied_value(mid));
                lo = mid;
            }
            (false, SearchDirection::Minimize) => lo = mid,
            (false, SearchDirection::Maximize) => hi = mid,
        }

        if hi - lo < CONVERGENCE_TOLERANCE {
            break;
        }
    }

    Ok(SolveOutcome {
        variable,
        value: best,
        trials,
    })
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    net_worth: f64,
    solvent: bool,
}

fn evaluate_candidate(
    base: &SimulationParams,
    variable: SolveVariable,
    candidate: f64,
) -> CandidateEval {
    let samples = match variable {
        SolveVariable::RetirementAge => run_projection_retiring_at(base, candidate),
        _ => run_projection(&variable.substitute(base, candidate)),
    };
    let net_worth = samples
        .get((SOLVENCY_CHECK_AGE - base.current_age) as usize)
        .map_or(0.0, |sample| sample.net_worth);
    CandidateEval {
        net_worth,
        solvent: net_worth >= SOLVENCY_THRESHOLD,
    }
}

fn validate_request(request: &SolveRequest) -> Result<(), InputError> {
    request.params.validate()?;

    if request.params.current_age > SOLVENCY_CHECK_AGE {
        return Err(InputError::NoSolvencySample {
            current_age: request.params.current_age,
            check_age: SOLVENCY_CHECK_AGE,
        });
    }

    let (min, max) = (request.search_min, request.search_max);
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(InputError::SearchBounds { min, max });
    }

    if request.variable == SolveVariable::RetirementAge {
        for bound in [min, max] {
            if !(0.0..=HORIZON_AGE as f64).contains(&bound) {
                return Err(InputError::RetirementAgeBound {
                    bound,
                    max: HORIZON_AGE,
                });
            }
        }
    }

    // Every midpoint lies between the bounds, so checking both ends covers
    // every trial the search can run.
    for bound in [min, max] {
        request
            .variable
            .substitute(&request.params, bound)
            .validate()
            .map_err(|source| InputError::BoundOutsideDomain {
                variable: request.variable.name(),
                bound,
                source: Box::new(source),
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project;
    use proptest::prelude::{prop_assert, proptest};

    fn net_worth_at_check_age(params: &SimulationParams) -> f64 {
        project(params)
            .expect("valid params")
            .into_iter()
            .find(|s| s.age == SOLVENCY_CHECK_AGE)
            .map(|s| s.net_worth)
            .expect("sample for check age")
    }

    fn underfunded_inputs() -> SimulationParams {
        SimulationParams {
            current_age: 30,
            retirement_age: 60,
            inflation_rate: 3.0,
            current_savings: 100_000.0,
            monthly_contribution: 1_000.0,
            contribution_increase_rate: 0.0,
            expected_yearly_roi: 7.0,
            expected_yearly_spending: 60_000.0,
            tax_rate: 20.0,
        }
    }

    fn request(variable: SolveVariable, search_min: f64, search_max: f64) -> SolveRequest {
        SolveRequest {
            variable,
            search_min,
            search_max,
            params: underfunded_inputs(),
        }
    }

    fn final_bracket_width(search_min: f64, search_max: f64) -> f64 {
        (search_max - search_min) / 2f64.powi(MAX_ITERATIONS as i32)
    }

    #[test]
    fn roi_solver_finds_smallest_sufficient_return() {
        let req = request(SolveVariable::ExpectedYearlyRoi, 0.0, 30.0);
        let outcome = solve(&req).expect("must solve");
        let roi = outcome.value.expect("solvable within range");
        assert!(roi > 0.0 && roi < 30.0);

        let mut params = req.params;
        params.expected_yearly_roi = roi;
        assert!(net_worth_at_check_age(&params) >= SOLVENCY_THRESHOLD);

        params.expected_yearly_roi = roi - final_bracket_width(0.0, 30.0) * 1.05;
        assert!(net_worth_at_check_age(&params) < SOLVENCY_THRESHOLD);
    }

    #[test]
    fn contribution_solver_finds_smallest_sufficient_contribution() {
        let req = request(SolveVariable::MonthlyContribution, 0.0, 20_000.0);
        let outcome = solve(&req).expect("must solve");
        let contribution = outcome.value.expect("solvable within range");

        let mut params = req.params;
        params.monthly_contribution = contribution;
        assert!(net_worth_at_check_age(&params) >= SOLVENCY_THRESHOLD);

        params.monthly_contribution = contribution - final_bracket_width(0.0, 20_000.0) * 1.05;
        assert!(net_worth_at_check_age(&params) < SOLVENCY_THRESHOLD);
    }

    #[test]
    fn retirement_age_solver_reports_first_drawdown_age() {
        let req = request(SolveVariable::RetirementAge, 30.0, 100.0);
        let outcome = solve(&req).expect("must solve");
        assert_eq!(outcome.value, Some(70.0));

        // Drawing down from 69 runs dry before the check age.
        let early = run_projection_retiring_at(&req.params, 69.0);
        assert!(early[(SOLVENCY_CHECK_AGE - 30) as usize].net_worth < SOLVENCY_THRESHOLD);
    }

    #[test]
    fn retirement_trials_inflate_spending_over_fractional_years() {
        let mut params = SimulationParams {
            current_age: 30,
            retirement_age: 60,
            inflation_rate: 6.0,
            current_savings: 50_000.0,
            monthly_contribution: 1_500.0,
            contribution_increase_rate: 3.0,
            expected_yearly_roi: 9.0,
            expected_yearly_spending: 30_000.0,
            tax_rate: 25.0,
        };
        let solve_age = |params: SimulationParams| {
            solve(&SolveRequest {
                variable: SolveVariable::RetirementAge,
                search_min: 31.0,
                search_max: 100.0,
                params,
            })
            .expect("must solve")
            .value
        };

        assert_eq!(solve_age(params), Some(62.0));
        // A whole-year retirement at 62 carries one more year of inflation
        // into the first withdrawal and does not last.
        let whole_year = run_projection_retiring_at(&params, 62.0);
        assert!(whole_year[(SOLVENCY_CHECK_AGE - 30) as usize].net_worth < SOLVENCY_THRESHOLD);

        params.expected_yearly_spending = 60_000.0;
        assert_eq!(solve_age(params), Some(74.0));
    }

    #[test]
    fn spending_solver_finds_largest_affordable_spending() {
        let req = request(SolveVariable::ExpectedYearlySpending, 0.0, 500_000.0);
        let outcome = solve(&req).expect("must solve");
        let spending = outcome.value.expect("solvable within range");
        assert!(spending > 0.0 && spending < 500_000.0);

        let mut params = req.params;
        params.expected_yearly_spending = spending;
        assert!(net_worth_at_check_age(&params) >= SOLVENCY_THRESHOLD);

        params.expected_yearly_spending =
            spending + final_bracket_width(0.0, 500_000.0) * 1.05;
        assert!(net_worth_at_check_age(&params) < SOLVENCY_THRESHOLD);
    }

    #[test]
    fn unreachable_goal_returns_none() {
        let mut req = request(SolveVariable::MonthlyContribution, 0.0, 1.0);
        req.params.current_savings = 0.0;
        req.params.expected_yearly_spending = 1e9;

        let outcome = solve(&req).expect("must return outcome");
        assert_eq!(outcome.value, None);
        assert!(!outcome.trials.is_empty());
        assert!(outcome.trials.iter().all(|t| !t.solvent));
    }

    #[test]
    fn search_stops_after_iteration_cap() {
        let outcome = solve(&request(SolveVariable::ExpectedYearlyRoi, 0.0, 30.0))
            .expect("must solve");
        assert_eq!(outcome.trials.len(), MAX_ITERATIONS as usize);
    }

    #[test]
    fn narrow_range_converges_early() {
        let outcome = solve(&request(SolveVariable::ExpectedYearlyRoi, 10.0, 10.000_001))
            .expect("must solve");
        assert!(outcome.trials.len() < MAX_ITERATIONS as usize);
    }

    #[test]
    fn trials_narrow_the_bracket_monotonically() {
        let outcome = solve(&request(SolveVariable::MonthlyContribution, 0.0, 20_000.0))
            .expect("must solve");
        for pair in outcome.trials.windows(2) {
            let width_before = pair[0].upper_bound - pair[0].lower_bound;
            let width_after = pair[1].upper_bound - pair[1].lower_bound;
            assert!(width_after < width_before);
        }
    }

    #[test]
    fn unknown_variable_name_is_rejected() {
        let err = "not_a_real_variable"
            .parse::<SolveVariable>()
            .expect_err("must reject unknown variable");
        assert_eq!(
            err,
            InputError::UnknownVariable("not_a_real_variable".to_string())
        );
    }

    #[test]
    fn wire_names_parse_to_variables() {
        for variable in SolveVariable::ALL {
            assert_eq!(variable.name().parse::<SolveVariable>(), Ok(variable));
        }
        assert_eq!("roi".parse::<SolveVariable>(), Ok(SolveVariable::ExpectedYearlyRoi));
        assert_eq!(
            "expected_roi".parse::<SolveVariable>(),
            Ok(SolveVariable::ExpectedYearlyRoi)
        );
        assert_eq!(
            "contribution".parse::<SolveVariable>(),
            Ok(SolveVariable::MonthlyContribution)
        );
        assert_eq!("spending".parse::<SolveVariable>(), Ok(SolveVariable::ExpectedYearlySpending));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = solve(&request(SolveVariable::ExpectedYearlyRoi, 10.0, 5.0))
            .expect_err("must reject inverted bounds");
        assert!(matches!(err, InputError::SearchBounds { .. }));
    }

    #[test]
    fn rejects_bounds_that_make_invalid_params() {
        let err = solve(&request(SolveVariable::ExpectedYearlyRoi, 0.0, 150.0))
            .expect_err("must reject roi above 100");
        assert!(matches!(
            err,
            InputError::BoundOutsideDomain {
                variable: "expected_yearly_roi",
                ..
            }
        ));

        let err = solve(&request(SolveVariable::RetirementAge, -5.0, 70.0))
            .expect_err("must reject negative age");
        assert!(matches!(err, InputError::RetirementAgeBound { .. }));
    }

    #[test]
    fn rejects_invalid_base_params() {
        let mut req = request(SolveVariable::ExpectedYearlyRoi, 0.0, 30.0);
        req.params.tax_rate = 100.0;
        assert_eq!(solve(&req), Err(InputError::TaxRate(100.0)));

        let mut req = request(SolveVariable::ExpectedYearlyRoi, 0.0, 30.0);
        req.params.current_age = 100;
        req.params.retirement_age = 100;
        assert!(matches!(
            solve(&req),
            Err(InputError::NoSolvencySample { .. })
        ));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(16))]

        #[test]
        fn prop_solved_value_keeps_plan_solvent(
            variable_idx in 0usize..4,
            current_age in 25u32..60,
            savings in 0u32..500_000,
            contribution in 0u32..5_000,
            spending in 10_000u32..120_000
        ) {
            let variable = SolveVariable::ALL[variable_idx];
            let (search_min, search_max) = match variable {
                SolveVariable::ExpectedYearlyRoi => (0.0, 30.0),
                SolveVariable::MonthlyContribution => (0.0, 50_000.0),
                SolveVariable::RetirementAge => (current_age as f64, 100.0),
                SolveVariable::ExpectedYearlySpending => (0.0, 1_000_000.0),
            };
            let mut params = underfunded_inputs();
            params.current_age = current_age;
            params.retirement_age = current_age + 20;
            params.current_savings = savings as f64;
            params.monthly_contribution = contribution as f64;
            params.expected_yearly_spending = spending as f64;

            let req = SolveRequest { variable, search_min, search_max, params };
            let outcome = solve(&req).expect("generated request is valid");
            prop_assert!(outcome.trials.len() <= MAX_ITERATIONS as usize);
            if let Some(value) = outcome.value {
                prop_assert!(value >= search_min && value <= search_max);
                prop_assert!(outcome
                    .trials
                    .iter()
                    .any(|t| t.solvent && t.candidate_value == value));
                if variable != SolveVariable::RetirementAge {
                    let solved = variable.substitute(&params, value);
                    prop_assert!(net_worth_at_check_age(&solved) >= SOLVENCY_THRESHOLD);
                }
            }
        }
    }
}
