//! Logo number syntax, shared by the lexer and word/number coercion.

/// Parse an entire string as a Logo number. The whole input must be
/// consumed; partial parses return `None` so words like `3x` stay words.
///
/// Accepted forms: optional sign, decimal digits with optional fraction,
/// optional exponent `e`/`E` with optional sign, and the small-exponent
/// alias `n` for a negative exponent (`1n3` is `1e-3`).
pub fn parse_number(text: &str) -> Option<f32> {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let mut i = 0;
    if bytes[i] == b'+' || bytes[i] == b'-' {
        i += 1;
    }
    let mantissa_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    // Must have at least one digit in the mantissa.
    if !bytes[mantissa_start..i].iter().any(u8::is_ascii_digit) {
        return None;
    }
    let mantissa: f32 = text[..i].parse().ok()?;
    if i == bytes.len() {
        return Some(mantissa);
    }

    let negative_exp = match bytes[i] {
        b'e' | b'E' => false,
        b'n' | b'N' => true,
        _ => return None,
    };
    i += 1;
    let mut exp_sign = if negative_exp { -1i32 } else { 1i32 };
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        if bytes[i] == b'-' {
            exp_sign = -exp_sign;
        }
        i += 1;
    }
    let exp_digits = &text[i..];
    if exp_digits.is_empty() || !exp_digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let exp: i32 = exp_digits.parse().ok()?;
    Some(mantissa * 10f32.powi(exp_sign * exp))
}

/// Format a number the way Logo prints it: integers without a decimal
/// point, everything else in the shortest round-trip form.
pub fn format_number(n: f32) -> String {
    if n == n.trunc() && n.abs() < 1.0e9 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_integers() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("-7"), Some(-7.0));
        assert_eq!(parse_number("+3"), Some(3.0));
    }

    #[test]
    fn test_fractions() {
        assert_eq!(parse_number("3.25"), Some(3.25));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("10."), Some(10.0));
    }

    #[test]
    fn test_exponents() {
        assert_eq!(parse_number("2e3"), Some(2000.0));
        assert_eq!(parse_number("2E3"), Some(2000.0));
        assert_eq!(parse_number("1e-2"), Some(0.01));
        assert_eq!(parse_number("1.5e+2"), Some(150.0));
    }

    #[test]
    fn test_n_exponent_alias() {
        assert_eq!(parse_number("1n3"), Some(0.001));
        assert_eq!(parse_number("25n1"), Some(2.5));
    }

    #[test]
    fn test_rejects_partial_parses() {
        assert_eq!(parse_number("3x"), None);
        assert_eq!(parse_number("x3"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("."), None);
        assert_eq!(parse_number("1e"), None);
        assert_eq!(parse_number("1e+"), None);
    }

    #[test]
    fn test_format_integers_without_point() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(-120.0), "-120");
        assert_eq!(format_number(2.5), "2.5");
    }
}
