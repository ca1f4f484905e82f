//! Phone number canonicalization.
//!
//! Every phone is stored and looked up in one canonical form, `+380XXXXXXXXX`.

/// Country calling code every canonical phone starts with.
pub const COUNTRY_PREFIX: &str = "+380";

/// Mobile operator codes (with the national trunk `0`) accepted by [`validate_phone`].
pub const MOBILE_OPERATOR_CODES: &[&str] = &[
    "039", "050", "063", "066", "067", "068", "073", "089", "091", "092", "093", "094", "095",
    "096", "097", "098", "099",
];

/// Reasons a phone is rejected by [`validate_phone`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number has an unrecognized format")]
    InvalidFormat,
    #[error("unsupported mobile operator code: {0}")]
    UnknownOperator(String),
}

/// Canonicalize raw phone input into `+380XXXXXXXXX`.
///
/// Accepts the local 10-digit form (`0501234567`), the 9-digit form without the
/// trunk zero (`501234567`) and the international form with or without `+`.
/// Separators (spaces, dashes, parentheses) are ignored.
///
/// Input matching none of those shapes is returned as a best-effort
/// `+`-prefixed digit string; callers that need a guarantee use [`validate_phone`].
///
/// ```
/// use bazaar_domain::phone::normalize_phone;
///
/// assert_eq!(normalize_phone("050 123-45-67"), "+380501234567");
/// assert_eq!(normalize_phone("+38 (050) 123 45 67"), "+380501234567");
/// ```
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        12 if digits.starts_with("380") => format!("+{digits}"),
        10 if digits.starts_with('0') => format!("+38{digits}"),
        9 => format!("{COUNTRY_PREFIX}{digits}"),
        _ => format!("+{digits}"),
    }
}

/// Normalize and check that the result is a Ukrainian mobile number.
pub fn validate_phone(raw: &str) -> Result<String, PhoneError> {
    let canonical = normalize_phone(raw);
    let operator = operator_code(&canonical).ok_or(PhoneError::InvalidFormat)?;
    if !MOBILE_OPERATOR_CODES.contains(&operator.as_str()) {
        return Err(PhoneError::UnknownOperator(operator));
    }
    Ok(canonical)
}

/// Three-digit operator code (`050`) of a canonical phone, or `None` if it is not canonical.
pub fn operator_code(canonical: &str) -> Option<String> {
    let national = canonical.strip_prefix(COUNTRY_PREFIX)?;
    if national.len() != 9 || !national.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("0{}", &national[..2]))
}

/// Render a canonical phone as `+380 50 123 45 67`. Non-canonical input is returned as-is.
pub fn format_display(canonical: &str) -> String {
    match canonical.strip_prefix(COUNTRY_PREFIX) {
        Some(n) if operator_code(canonical).is_some() => format!(
            "{COUNTRY_PREFIX} {} {} {} {}",
            &n[..2],
            &n[2..5],
            &n[5..7],
            &n[7..]
        ),
        _ => canonical.to_owned(),
    }
}

/// Hide everything but the last four digits, for log fields.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let tail: String = digits[digits.len() - 4..].iter().collect();
    if phone.starts_with(COUNTRY_PREFIX) && digits.len() >= 7 {
        format!("{COUNTRY_PREFIX}{}{tail}", "*".repeat(digits.len() - 7))
    } else {
        format!("{}{tail}", "*".repeat(digits.len() - 4))
    }
}
