use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

const BINARY_SUFFIXES: [&str; 6] = ["Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
const DECIMAL_SUFFIXES: [&str; 10] =
    ["n", "u", "m", "k", "M", "G", "T", "P", "E", ""];

/// Parse a storage request (e.g. "10Gi", "500M", "1e9") into a `Quantity`.
///
/// Follows the Kubernetes quantity grammar: an optionally signed decimal
/// number followed by a binary SI suffix, a decimal SI suffix or a decimal
/// exponent. Storage requests must also be strictly positive.
pub fn parse_storage_quantity(s: &str) -> Result<Quantity, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty quantity".to_string());
    }

    let split = s
        .char_indices()
        .find(|(i, c)| {
            !(c.is_ascii_digit()
                || *c == '.'
                || (*i == 0 && matches!(*c, '+' | '-')))
        })
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);

    let digits = number.trim_start_matches(['+', '-']);
    if !digits.chars().any(|c| c.is_ascii_digit())
        || digits.matches('.').count() > 1
    {
        return Err(format!("invalid number {:?}", number));
    }
    if !valid_suffix(suffix) {
        return Err(format!("invalid suffix {:?}", suffix));
    }

    let value: f64 = number
        .parse()
        .map_err(|e| format!("invalid number {:?}: {}", number, e))?;
    if value <= 0.0 {
        return Err("storage size must be greater than zero".to_string());
    }
    Ok(Quantity(s.to_string()))
}

/// Numeric value of a quantity in base units, or `None` when malformed.
pub fn quantity_value(s: &str) -> Option<f64> {
    let s = s.trim();
    let split = s
        .char_indices()
        .find(|(i, c)| {
            !(c.is_ascii_digit()
                || *c == '.'
                || (*i == 0 && matches!(*c, '+' | '-')))
        })
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);
    let value: f64 = number.parse().ok()?;
    Some(value * suffix_multiplier(suffix)?)
}

fn suffix_multiplier(suffix: &str) -> Option<f64> {
    if let Some(pos) = BINARY_SUFFIXES.iter().position(|s| *s == suffix) {
        return Some(1024f64.powi(pos as i32 + 1));
    }
    let exp = match suffix {
        "n" => -9,
        "u" => -6,
        "m" => -3,
        "" => 0,
        "k" => 3,
        "M" => 6,
        "G" => 9,
        "T" => 12,
        "P" => 15,
        "E" => 18,
        _ => {
            let exp = suffix.strip_prefix(['e', 'E'])?;
            return exp.parse::<i32>().ok().map(|e| 10f64.powi(e));
        }
    };
    Some(10f64.powi(exp))
}

/// Whether two quantities denote the same amount, regardless of how the
/// API server chose to spell them ("0.5" and "500m", "1.5Gi" and "1536Mi").
pub fn same_quantity(a: &Quantity, b: &Quantity) -> bool {
    if a.0 == b.0 {
        return true;
    }
    match (quantity_value(&a.0), quantity_value(&b.0)) {
        (Some(x), Some(y)) => {
            (x - y).abs() <= f64::EPSILON * 8.0 * x.abs().max(y.abs())
        }
        _ => false,
    }
}

fn valid_suffix(suffix: &str) -> bool {
    if BINARY_SUFFIXES.contains(&suffix) || DECIMAL_SUFFIXES.contains(&suffix)
    {
        return true;
    }
    // decimal exponent: e|E followed by an optionally signed integer
    let Some(exp) = suffix.strip_prefix(['e', 'E']) else {
        return false;
    };
    let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
    !exp.is_empty() && exp.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_storage_sizes() {
        for s in ["10Gi", "500Mi", "1", "1.5Gi", "2T", "1e9", "3E", " 8Gi "] {
            assert!(parse_storage_quantity(s).is_ok(), "{s} should parse");
        }
        assert_eq!(parse_storage_quantity(" 8Gi ").unwrap().0, "8Gi");
    }

    #[test]
    fn equal_amounts_match_across_spellings() {
        let q = |s: &str| Quantity(s.to_string());
        assert!(same_quantity(&q("0.5"), &q("500m")));
        assert!(same_quantity(&q("1.5Gi"), &q("1536Mi")));
        assert!(same_quantity(&q("1e3"), &q("1k")));
        assert!(same_quantity(&q("2G"), &q("2000M")));
        assert!(!same_quantity(&q("1Gi"), &q("1G")));
        assert!(!same_quantity(&q("100m"), &q("1")));
        assert!(!same_quantity(&q("bogus"), &q("1")));
    }

    #[test]
    fn rejects_malformed_sizes() {
        for s in ["", "Gi", "ten", "10GB", "1.2.3Gi", "10 Gi", "1e", "-1Gi", "0"]
        {
            assert!(parse_storage_quantity(s).is_err(), "{s} should fail");
        }
    }
}
