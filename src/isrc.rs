// 🔖 ISRC Normalization - One definition shared by loader and matcher
//
// Registry rows and catalog tracks spell the same code differently
// (" usrc17607839 ", "USRC17607839"). Both sides go through `normalize`
// before any comparison.

/// Shortest code we accept as a real ISRC
pub const MIN_ISRC_LEN: usize = 10;

/// Textual placeholder some exports use for a missing value
pub const MISSING_PLACEHOLDER: &str = "NAN";

/// Trim surrounding whitespace and upper-case.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Whether an already-normalized code may enter the index.
pub fn is_indexable(normalized: &str) -> bool {
    !normalized.is_empty()
        && normalized != MISSING_PLACEHOLDER
        && normalized.chars().count() >= MIN_ISRC_LEN
}

/// Normalize and filter in one step. `None` means the code is rejected.
pub fn normalize_indexable(code: &str) -> Option<String> {
    let normalized = normalize(code);
    if is_indexable(&normalized) {
        Some(normalized)
    } else {
        None
    }
}
