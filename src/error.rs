use thiserror::Error;

/// Fatal conditions that stop a simulation run
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid parameter {field} = {value}: {reason}")]
    InvalidParams {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error(
        "Series is not contiguous at position {index}: expected sequence_index {expected}, got {actual}"
    )]
    DataIntegrity {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Not enough records to simulate. Need {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("Invalid close price on day {index}: {value}")]
    InvalidPrice { index: usize, value: f64 },
    #[error("Day 0 has no previous close; simulated days start at 1")]
    NoPreviousDay,
    #[error("Simulation run for buy threshold {buy_threshold} did not complete")]
    RunAborted { buy_threshold: f64 },
}

/// Failures while reading a delimited price table
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("No price column found (expected 'Adj Close' or 'Close'), headers: {0}")]
    MissingPriceColumn(String),
    #[error("Line {line}: invalid {column} value '{value}'")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },
    #[error("Line {line}: {column} must be positive, got {value}")]
    NonPositivePrice { line: u64, column: String, value: f64 },
    #[error("Price table is empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_integrity_message_has_context() {
        let err = SimulationError::DataIntegrity {
            index: 7,
            expected: 6,
            actual: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("position 7"));
        assert!(msg.contains("expected sequence_index 6"));
        assert!(msg.contains("got 9"));
    }

    #[test]
    fn test_invalid_price_message() {
        let err = SimulationError::InvalidPrice {
            index: 3,
            value: 0.0,
        };
        assert_eq!(err.to_string(), "Invalid close price on day 3: 0");
    }

    #[test]
    fn test_invalid_params_message() {
        let err = SimulationError::InvalidParams {
            field: "starting_cash",
            value: -1.0,
            reason: "must be positive",
        };
        assert_eq!(
            err.to_string(),
            "Invalid parameter starting_cash = -1: must be positive"
        );
    }
}
