//! Off-exchange inference (§4.2): maps a venue code to a name and
//! pattern-matches for FINRA/TRF/ADF/OTC substrings.

use std::collections::HashMap;

const OFF_EXCHANGE_PATTERNS: &[&str] = &[
    "FINRA",
    "TRF",
    "ADF",
    "OTC",
    "TRADE REPORTING FACILITY",
    "ALTERNATIVE DISPLAY FACILITY",
];

/// Conservative fallback code used when the venue map itself is empty.
const FALLBACK_OFF_EXCHANGE_CODE: &str = "D";

/// Infers `off_exchange_flag` from a venue `code` using a code→name map.
///
/// An empty map falls back to treating only the literal code `"D"` as
/// off-exchange. A non-empty map resolves the code to a name and checks it
/// against the known off-exchange substrings; an unresolved code is treated
/// as on-exchange (`false`).
pub fn infer_off_exchange(code: &str, venue_map: &HashMap<String, String>) -> bool {
    if code.is_empty() {
        return false;
    }
    if venue_map.is_empty() {
        return code == FALLBACK_OFF_EXCHANGE_CODE;
    }
    match venue_map.get(code) {
        Some(name) => {
            let upper = name.to_uppercase();
            OFF_EXCHANGE_PATTERNS.iter().any(|pattern| upper.contains(pattern))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> HashMap<String, String> {
        HashMap::from([
            ("D".to_string(), "FINRA / Nasdaq TRF".to_string()),
            ("Q".to_string(), "NASDAQ".to_string()),
        ])
    }

    #[test]
    fn resolves_finra_trf_code_as_off_exchange() {
        assert!(infer_off_exchange("D", &sample_map()));
    }

    #[test]
    fn resolves_lit_exchange_code_as_on_exchange() {
        assert!(!infer_off_exchange("Q", &sample_map()));
    }

    #[test]
    fn missing_code_is_on_exchange() {
        assert!(!infer_off_exchange("Z", &sample_map()));
    }

    #[test]
    fn empty_map_falls_back_to_code_d() {
        let empty = HashMap::new();
        assert!(infer_off_exchange("D", &empty));
        assert!(!infer_off_exchange("N", &empty));
    }

    #[test]
    fn empty_code_is_on_exchange() {
        assert!(!infer_off_exchange("", &sample_map()));
    }
}
