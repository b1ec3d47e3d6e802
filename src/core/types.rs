use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::InputError;

/// Last age covered by every projection.
pub const HORIZON_AGE: u32 = 100;

/// Age whose sample decides whether a solver trial counts as solvent.
pub const SOLVENCY_CHECK_AGE: u32 = 99;

/// Inputs shared by the projection, the solver and the summary.
///
/// Rates are plain percentages (`6.0` means 6%). Money fields share one
/// caller-chosen currency unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub current_age: u32,
    pub retirement_age: u32,
    pub inflation_rate: f64,
    pub current_savings: f64,
    pub monthly_contribution: f64,
    pub contribution_increase_rate: f64,
    pub expected_yearly_roi: f64,
    pub expected_yearly_spending: f64,
    pub tax_rate: f64,
}

impl SimulationParams {
    /// Retirement age clamped so it never precedes the current age.
    pub fn effective_retirement_age(&self) -> u32 {
        self.retirement_age.max(self.current_age)
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.current_age > HORIZON_AGE {
            return Err(InputError::CurrentAgeBeyondHorizon {
                current_age: self.current_age,
                horizon: HORIZON_AGE,
            });
        }

        for (field, value) in [
            ("inflation_rate", self.inflation_rate),
            ("current_savings", self.current_savings),
            ("monthly_contribution", self.monthly_contribution),
            ("contribution_increase_rate", self.contribution_increase_rate),
            ("expected_yearly_roi", self.expected_yearly_roi),
            ("expected_yearly_spending", self.expected_yearly_spending),
            ("tax_rate", self.tax_rate),
        ] {
            if !value.is_finite() {
                return Err(InputError::NotFinite { field, value });
            }
        }

        if !(0.0..100.0).contains(&self.tax_rate) {
            return Err(InputError::TaxRate(self.tax_rate));
        }

        for (field, value) in [
            ("inflation_rate", self.inflation_rate),
            ("contribution_increase_rate", self.contribution_increase_rate),
            ("expected_yearly_roi", self.expected_yearly_roi),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(InputError::PercentOutOfRange { field, value });
            }
        }

        for (field, value) in [
            ("current_savings", self.current_savings),
            ("monthly_contribution", self.monthly_contribution),
            ("expected_yearly_spending", self.expected_yearly_spending),
        ] {
            if value < 0.0 {
                return Err(InputError::NegativeAmount { field, value });
            }
        }

        Ok(())
    }
}

/// Net worth at the start of one age-year, truncated to cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSample {
    pub age: u32,
    pub net_worth: f64,
}

/// Inputs the solver knows how to search over. Parsed only through
/// [`FromStr`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveVariable {
    ExpectedYearlyRoi,
    MonthlyContribution,
    RetirementAge,
    ExpectedYearlySpending,
}

/// Which end of the search range a solvent trial pushes toward.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SearchDirection {
    /// Smallest value that still keeps the plan solvent.
    Minimize,
    /// Largest value the plan can still afford.
    Maximize,
}

impl SolveVariable {
    pub const ALL: [SolveVariable; 4] = [
        SolveVariable::ExpectedYearlyRoi,
        SolveVariable::MonthlyContribution,
        SolveVariable::RetirementAge,
        SolveVariable::ExpectedYearlySpending,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SolveVariable::ExpectedYearlyRoi => "expected_yearly_roi",
            SolveVariable::MonthlyContribution => "monthly_contribution",
            SolveVariable::RetirementAge => "retirement_age",
            SolveVariable::ExpectedYearlySpending => "expected_yearly_spending",
        }
    }

    pub fn direction(self) -> SearchDirection {
        match self {
            SolveVariable::ExpectedYearlySpending => SearchDirection::Maximize,
            SolveVariable::ExpectedYearlyRoi
            | SolveVariable::MonthlyContribution
            | SolveVariable::RetirementAge => SearchDirection::Minimize,
        }
    }

    /// Copy of `base` with this variable set to `candidate`.
    ///
    /// `retirement_age` only holds whole years, so the candidate is rounded
    /// up. The solver itself projects retirement trials at the fractional
    /// candidate.
    pub fn substitute(self, base: &SimulationParams, candidate: f64) -> SimulationParams {
        let mut params = *base;
        match self {
            SolveVariable::ExpectedYearlyRoi => params.expected_yearly_roi = candidate,
            SolveVariable::MonthlyContribution => params.monthly_contribution = candidate,
            SolveVariable::RetirementAge => params.retirement_age = candidate.ceil() as u32,
            SolveVariable::ExpectedYearlySpending => {
                params.expected_yearly_spending = candidate
            }
        }
        params
    }

    /// The value reported back for a trial. For retirement age this is the
    /// first age that draws down.
    pub fn applied_value(self, candidate: f64) -> f64 {
        match self {
            SolveVariable::RetirementAge => candidate.ceil(),
            _ => candidate,
        }
    }
}

impl fmt::Display for SolveVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolveVariable {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "expected_yearly_roi" | "expected_roi" | "roi" => Ok(SolveVariable::ExpectedYearlyRoi),
            "monthly_contribution" | "contribution" => Ok(SolveVariable::MonthlyContribution),
            "retirement_age" => Ok(SolveVariable::RetirementAge),
            "expected_yearly_spending" | "spending" => Ok(SolveVariable::ExpectedYearlySpending),
            other => Err(InputError::UnknownVariable(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SolveRequest {
    pub variable: SolveVariable,
    pub search_min: f64,
    pub search_max: f64,
    pub params: SimulationParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveTrial {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub net_worth_at_check_age: f64,
    pub solvent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub variable: SolveVariable,
    /// `None` when no trial in the range kept the plan solvent.
    pub value: Option<f64>,
    pub trials: Vec<SolveTrial>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementSummary {
    pub years_to_grow: u32,
    pub total_savings: f64,
    pub real_total_savings: f64,
    pub monthly_income_in_retirement: f64,
    pub after_tax_monthly_income: f64,
    pub future_yearly_spending: f64,
}
