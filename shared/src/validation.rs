//! Validation and normalization of identifiers typed in at the counter
//!
//! Chassis, engine and DC numbers arrive from scanners, OEM manifests and hand entry with
//! stray whitespace and mixed case. Everything is stored trimmed and uppercase.

use crate::error::{DomainError, DomainResult};

const CHASSIS_MIN_LEN: usize = 3;
const CHASSIS_MAX_LEN: usize = 25;
const TEXT_MAX_LEN: usize = 120;
const CODE_MAX_LEN: usize = 30;

// ============================================================================
// Vehicle Identifiers
// ============================================================================

/// Normalize a chassis (VIN) number: trimmed, uppercase, 3-25 ASCII alphanumerics
pub fn normalize_chassis(raw: &str) -> DomainResult<String> {
    let chassis = raw.trim().to_uppercase();
    if chassis.len() < CHASSIS_MIN_LEN || chassis.len() > CHASSIS_MAX_LEN {
        return Err(DomainError::validation(
            "chassis_no",
            format!(
                "chassis number must be {}-{} characters",
                CHASSIS_MIN_LEN, CHASSIS_MAX_LEN
            ),
        ));
    }
    if !chassis.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::validation(
            "chassis_no",
            "chassis number must be alphanumeric",
        ));
    }
    Ok(chassis)
}

/// Normalize an optional document code (engine or DC number).
///
/// Blank input means "not provided". Letters, digits, `-` and `/` are accepted.
pub fn normalize_optional_code(field: &str, raw: Option<&str>) -> DomainResult<Option<String>> {
    let code = match raw.map(str::trim) {
        Some(code) if !code.is_empty() => code.to_uppercase(),
        _ => return Ok(None),
    };
    if code.len() > CODE_MAX_LEN {
        return Err(DomainError::validation(
            field,
            format!("must be at most {} characters", CODE_MAX_LEN),
        ));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/')
    {
        return Err(DomainError::validation(field, "contains invalid characters"));
    }
    Ok(Some(code))
}

// ============================================================================
// Branches
// ============================================================================

/// Branch code printed on load references: 2-10 uppercase alphanumerics
pub fn normalize_branch_code(raw: &str) -> DomainResult<String> {
    let code = raw.trim().to_uppercase();
    if code.len() < 2 || code.len() > 10 {
        return Err(DomainError::validation(
            "code",
            "branch code must be 2-10 characters",
        ));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::validation(
            "code",
            "branch code must be alphanumeric only",
        ));
    }
    Ok(code)
}

// ============================================================================
// General Validations
// ============================================================================

/// Trimmed, non-empty free text such as names and model descriptions
pub fn require_text(field: &str, raw: &str) -> DomainResult<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    if text.chars().count() > TEXT_MAX_LEN {
        return Err(DomainError::validation(
            field,
            format!("must be at most {} characters", TEXT_MAX_LEN),
        ));
    }
    Ok(text.to_string())
}

/// Validate an Indian mobile number and return its 10 significant digits.
/// Accepts: 9845012345, 098450 12345, +91 98450 12345
pub fn validate_phone(phone: &str) -> DomainResult<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let local = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('0') => &digits[1..],
        12 if digits.starts_with("91") => &digits[2..],
        _ => return Err(DomainError::validation("customer_phone", "invalid phone number")),
    };
    if !local.starts_with(|c: char| ('6'..='9').contains(&c)) {
        return Err(DomainError::validation("customer_phone", "invalid phone number"));
    }
    Ok(local.to_string())
}

/// Free-text search query: trimmed, at least two characters
pub fn normalize_search_query(raw: &str) -> DomainResult<String> {
    let query = raw.trim();
    if query.chars().count() < 2 {
        return Err(DomainError::validation(
            "q",
            "search query must be at least 2 characters",
        ));
    }
    Ok(query.to_string())
}
