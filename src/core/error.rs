/// Rejected inputs. Raised before any simulation runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("current_age {current_age} is past the projection horizon of {horizon}")]
    CurrentAgeBeyondHorizon { current_age: u32, horizon: u32 },

    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("tax_rate must be >= 0 and < 100, got {0}")]
    TaxRate(f64),

    #[error("{field} must be between 0 and 100, got {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be >= 0, got {value}")]
    NegativeAmount { field: &'static str, value: f64 },

    #[error("unknown variable_to_solve: {0}")]
    UnknownVariable(String),

    #[error("search bounds must be finite with search_min <= search_max, got [{min}, {max}]")]
    SearchBounds { min: f64, max: f64 },

    #[error("search bound {bound} is not a valid {variable}: {source}")]
    BoundOutsideDomain {
        variable: &'static str,
        bound: f64,
        #[source]
        source: Box<InputError>,
    },

    #[error("retirement_age search bound must be between 0 and {max}, got {bound}")]
    RetirementAgeBound { bound: f64, max: u32 },

    #[error("current_age must be <= {check_age} to solve, got {current_age}")]
    NoSolvencySample { current_age: u32, check_age: u32 },
}
