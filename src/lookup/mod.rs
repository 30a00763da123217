pub mod geo;

pub use geo::{GeoCache, GeoResolver};

/// Sanitize a string for safe terminal display by removing control characters.
///
/// Provider-supplied strings (org names, city names) end up in terminal
/// output and CSV files; control characters could inject escape sequences.
pub(crate) fn sanitize_display(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}
