use crate::errors::CoreError;

/// Longest accepted currency or ticker code.
pub const MAX_CODE_LEN: usize = 10;

/// History windows accepted by `get_historical_data`, in days.
pub const MIN_HISTORY_DAYS: u32 = 1;
pub const MAX_HISTORY_DAYS: u32 = 365;

/// A code must be 1..=10 ASCII letters or digits (`BTC`, `usd`, `1INCH`).
pub fn validate_code(field: &str, code: &str) -> Result<(), CoreError> {
    if code.is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {MAX_CODE_LEN} characters, got '{code}'"
        )));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::Validation(format!(
            "{field} must be alphanumeric, got '{code}'"
        )));
    }
    Ok(())
}

pub fn validate_amount(amount: f64) -> Result<(), CoreError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CoreError::Validation(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    Ok(())
}

pub fn validate_days(days: u32) -> Result<(), CoreError> {
    if !(MIN_HISTORY_DAYS..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(CoreError::Validation(format!(
            "days must be between {MIN_HISTORY_DAYS} and {MAX_HISTORY_DAYS}, got {days}"
        )));
    }
    Ok(())
}

pub fn validate_pair(from: &str, to: &str) -> Result<(), CoreError> {
    validate_code("from", from)?;
    validate_code("to", to)
}

/// Checks done before a conversion touches any provider.
pub fn validate_conversion(from: &str, to: &str, amount: f64) -> Result<(), CoreError> {
    validate_pair(from, to)?;
    validate_amount(amount)
}

/// Checks done before a history request touches any provider.
pub fn validate_history(symbol: &str, quote: &str, days: u32) -> Result<(), CoreError> {
    validate_code("symbol", symbol)?;
    validate_code("quote", quote)?;
    validate_days(days)
}

/// A market overview needs at least one symbol, each a valid code.
pub fn validate_symbols(symbols: &[String]) -> Result<(), CoreError> {
    if symbols.is_empty() {
        return Err(CoreError::Validation("symbols must not be empty".to_string()));
    }
    symbols.iter().try_for_each(|s| validate_code("symbol", s))
}
