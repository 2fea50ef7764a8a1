//! Address → city heuristic.
//!
//! Listing addresses are free text such as `"Ksfc Layout,Bangalore"`. The city
//! is taken to be the last comma-separated part with a few locality words
//! removed. The heuristic is lossy: multi-word localities, misspellings and
//! addresses without a city all come out wrong or as the unknown label, and
//! that is accepted.

use crate::utils::title_case;

/// Locality words removed verbatim (case-sensitive) from the candidate city.
const LOCALITY_WORDS: [&str; 3] = ["Road", "Nagar", "Colony"];

/// Extract a city name from a free-text address.
pub fn extract_city_from_address(address: Option<&str>, unknown_label: &str) -> String {
    let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) else {
        return unknown_label.to_string();
    };

    let candidate = match address.rsplit_once(',') {
        Some((_, last)) => last,
        None => address,
    };

    let mut city = candidate.trim().to_string();
    for word in LOCALITY_WORDS {
        city = city.replace(word, "");
    }
    let city = city.trim();

    if city.is_empty() {
        unknown_label.to_string()
    } else {
        title_case(city)
    }
}

/// Whether a city value counts as "not set" for the extraction threshold.
pub fn is_unset_city(value: Option<&str>, unknown_label: &str) -> bool {
    match value.map(str::trim) {
        None => true,
        Some(v) => v.is_empty() || v == unknown_label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_part_is_city() {
        assert_eq!(
            extract_city_from_address(Some("Ksfc Layout,Bangalore"), "Unknown"),
            "Bangalore"
        );
        assert_eq!(
            extract_city_from_address(Some("Sector 5, Salt Lake,  kolkata "), "Unknown"),
            "Kolkata"
        );
    }

    #[test]
    fn test_no_comma_uses_whole_address() {
        assert_eq!(extract_city_from_address(Some("jaipur"), "Unknown"), "Jaipur");
    }

    #[test]
    fn test_locality_words_removed() {
        assert_eq!(
            extract_city_from_address(Some("Plot 7, Gandhi Nagar"), "Unknown"),
            "Gandhi"
        );
        assert_eq!(extract_city_from_address(Some("Plot 4, Road"), "Unknown"), "Unknown");
    }

    #[test]
    fn test_missing_or_blank_address() {
        assert_eq!(extract_city_from_address(None, "Unknown"), "Unknown");
        assert_eq!(extract_city_from_address(Some("   "), "Unknown"), "Unknown");
        assert_eq!(extract_city_from_address(Some("Andheri,"), "Unknown"), "Unknown");
    }

    #[test]
    fn test_is_unset_city() {
        assert!(is_unset_city(None, "Unknown"));
        assert!(is_unset_city(Some(""), "Unknown"));
        assert!(is_unset_city(Some("Unknown"), "Unknown"));
        assert!(!is_unset_city(Some("Mumbai"), "Unknown"));
    }
}
