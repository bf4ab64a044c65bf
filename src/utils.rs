/// Case-insensitive equality by Unicode lowercase comparison, independent of the process locale.
/// This is simple lowercasing, not full case folding: `STRASSE` and `straße` differ.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}
