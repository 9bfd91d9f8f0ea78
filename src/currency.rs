//! Currency code normalization
//!
//! Maps recognized alphabetic currency codes to their canonical numeric
//! form. Codes already numeric, or unrecognized, pass through unchanged
//! apart from trimming and uppercasing. Pure function, no I/O.

/// Normalize a currency code to its canonical numeric form
pub fn normalize(code: &str) -> String {
    let c = code.trim().to_uppercase();
    match c.as_str() {
        "USD" => "840".to_string(),
        "EUR" => "978".to_string(),
        "GBP" => "826".to_string(),
        "AED" => "784".to_string(),
        "LBP" => "422".to_string(),
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_alphabetic_codes() {
        assert_eq!(normalize("USD"), "840");
        assert_eq!(normalize("eur"), "978");
        assert_eq!(normalize(" gbp "), "826");
    }

    #[test]
    fn numeric_codes_pass_through() {
        assert_eq!(normalize("840"), "840");
        assert_eq!(normalize("978"), "978");
    }

    #[test]
    fn unrecognized_codes_are_trimmed_and_uppercased() {
        assert_eq!(normalize(" xau "), "XAU");
        assert_eq!(normalize(""), "");
    }
}
