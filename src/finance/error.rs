// Error types for the finance aggregator

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinanceError {
    /// Any storage failure aborts the summary
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid {field} '{value}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate { field: &'static str, value: String },

    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_date_display() {
        let error = FinanceError::InvalidDate {
            field: "start_date",
            value: "yesterday".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid start_date 'yesterday': expected YYYY-MM-DD or an RFC 3339 timestamp"
        );
    }
}
