//! Validation utilities

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

use crate::import::RawRecord;
use crate::traits::*;
use crate::types::*;

/// Parse a date in strict `YYYY-MM-DD` form
pub fn parse_iso_date(value: &str) -> ReconResult<NaiveDate> {
    let value = value.trim();
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

    if !well_formed {
        return Err(ReconError::Validation(format!(
            "Date '{}' is not in YYYY-MM-DD format",
            value
        )));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ReconError::Validation(format!("Date '{}' is not a calendar date", value)))
}

/// Largest number of decimal places accepted in an amount
pub const MAX_AMOUNT_SCALE: i64 = 18;

/// Parse a decimal amount in plain notation
pub fn parse_amount(value: &str) -> ReconResult<BigDecimal> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ReconError::Validation("Amount cannot be empty".to_string()));
    }

    if value.contains(['e', 'E']) {
        return Err(ReconError::Validation(format!(
            "Amount '{}' must be a plain decimal",
            value
        )));
    }

    let amount = BigDecimal::from_str(value)
        .map_err(|_| ReconError::Validation(format!("Amount '{}' is not numeric", value)))?;

    let (_, scale) = amount.as_bigint_and_exponent();
    if !(-MAX_AMOUNT_SCALE..=MAX_AMOUNT_SCALE).contains(&scale) {
        return Err(ReconError::Validation(format!(
            "Amount '{}' has more than {} decimal places",
            value, MAX_AMOUNT_SCALE
        )));
    }

    Ok(amount)
}

/// Validate that a record or user ID is usable
pub fn validate_record_id(id: &str) -> ReconResult<()> {
    if id.trim().is_empty() {
        return Err(ReconError::Validation("ID cannot be empty".to_string()));
    }

    if id.len() > 64 {
        return Err(ReconError::Validation(
            "ID cannot exceed 64 characters".to_string(),
        ));
    }

    // Alphanumeric plus the separators bank exports commonly use
    if !id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '/')
    {
        return Err(ReconError::Validation(format!(
            "ID '{}' can only contain alphanumeric characters, dashes, underscores, dots and slashes",
            id
        )));
    }

    Ok(())
}

/// Validate that a description is usable
pub fn validate_description(description: &str) -> ReconResult<()> {
    if description.trim().is_empty() {
        return Err(ReconError::Validation(
            "Description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(ReconError::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a display name is usable
pub fn validate_name(name: &str) -> ReconResult<()> {
    if name.trim().is_empty() {
        return Err(ReconError::Validation("Name cannot be empty".to_string()));
    }

    if name.len() > 100 {
        return Err(ReconError::Validation(
            "Name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Stricter row validator for feeds that are known to be clean
///
/// On top of the default checks it enforces ID format and description length
/// and rejects zero amounts, which bank exports use for informational lines.
pub struct StrictRecordValidator;

impl RecordValidator for StrictRecordValidator {
    fn validate_record(&self, record: &RawRecord, side: Side) -> ReconResult<Transaction> {
        let transaction = DefaultRecordValidator.validate_record(record, side)?;

        validate_record_id(&transaction.id)?;
        validate_description(&transaction.description)?;

        if transaction.amount == BigDecimal::from(0) {
            return Err(ReconError::Validation(format!(
                "Record '{}' has a zero amount",
                transaction.id
            )));
        }

        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(
            parse_iso_date("2024-06-30").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
        );
        assert!(parse_iso_date("2024-6-30").is_err());
        assert!(parse_iso_date("2024/06/30").is_err());
        assert!(parse_iso_date("2024-13-01").is_err());
        assert!(parse_iso_date("").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("95").unwrap(), BigDecimal::from(95));
        assert_eq!(
            parse_amount(" -0.50 ").unwrap(),
            BigDecimal::new((-50).into(), 2)
        );
        assert!(parse_amount("").is_err());
        assert!(parse_amount("12,00").is_err());
    }

    #[test]
    fn test_parse_amount_rejects_exponents_and_long_fractions() {
        assert!(parse_amount("1e2000000").is_err());
        assert!(parse_amount("1E-3").is_err());
        assert!(parse_amount(&format!("0.{}1", "0".repeat(18))).is_err());
        assert_eq!(
            parse_amount("0.000000000000000001").unwrap(),
            BigDecimal::new(1.into(), 18)
        );
    }

    #[test]
    fn test_validate_record_id() {
        assert!(validate_record_id("BANK-2024/07.001").is_ok());
        assert!(validate_record_id("   ").is_err());
        assert!(validate_record_id("has space").is_err());
        assert!(validate_record_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_strict_validator_rejects_zero_amounts() {
        let record = RawRecord {
            id: "R1".to_string(),
            date: "2024-07-01".to_string(),
            description: "Balance brought forward".to_string(),
            amount: "0.00".to_string(),
            reference: None,
        };
        assert!(DefaultRecordValidator
            .validate_record(&record, Side::Right)
            .is_ok());
        assert!(StrictRecordValidator
            .validate_record(&record, Side::Right)
            .is_err());
    }
}
