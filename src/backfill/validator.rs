use crate::error::SimulationError;
use crate::models::DailyRecord;
use crate::Result;

/// Validates a daily series before it is simulated
pub struct SeriesValidator {
    min_records: usize,
}

impl SeriesValidator {
    pub fn new() -> Self {
        Self { min_records: 2 }
    }

    /// Validate the whole series: length, ordering, and every record
    pub fn validate(&self, records: &[DailyRecord]) -> Result<()> {
        if records.len() < self.min_records {
            return Err(SimulationError::InsufficientData {
                required: self.min_records,
                actual: records.len(),
            }
            .into());
        }

        for (i, record) in records.iter().enumerate() {
            if record.sequence_index != i {
                return Err(SimulationError::DataIntegrity {
                    index: i,
                    expected: i,
                    actual: record.sequence_index,
                }
                .into());
            }
            self.validate_record(record)?;
        }

        self.validate_dates(records)?;
        Ok(())
    }

    /// Validate a single record's prices
    pub fn validate_record(&self, record: &DailyRecord) -> Result<()> {
        let price = record.close_price();
        if !price.is_finite() || price <= 0.0 {
            return Err(SimulationError::InvalidPrice {
                index: record.sequence_index,
                value: price,
            }
            .into());
        }

        // High must be >= low
        if record.high < record.low {
            return Err(format!(
                "High ({}) is less than low ({}) on day {}",
                record.high, record.low, record.sequence_index
            )
            .into());
        }

        if record.volume < 0.0 {
            return Err(format!(
                "Invalid volume on day {}: {}",
                record.sequence_index, record.volume
            )
            .into());
        }

        Ok(())
    }

    /// Dates, when present, must strictly increase
    fn validate_dates(&self, records: &[DailyRecord]) -> Result<()> {
        for pair in records.windows(2) {
            if let (Some(prev), Some(curr)) = (pair[0].date, pair[1].date) {
                if curr == prev {
                    return Err(format!(
                        "Duplicate trading day {} at day {}",
                        curr, pair[1].sequence_index
                    )
                    .into());
                }
                if curr < prev {
                    return Err(format!(
                        "Series is not in chronological order: {} follows {} at day {}",
                        curr, prev, pair[1].sequence_index
                    )
                    .into());
                }
            }
        }
        Ok(())
    }
}

impl Default for SeriesValidator {
    fn default() -> Self {
        Self::new()
    }
}
