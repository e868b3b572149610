//! Family-token heuristic shared by the normalizer and the alternatives
//! ranker.
//! See ARCHITECTURE.md §7 (family matching)

/// Extract a short family token from free text: the first
/// whitespace-delimited token, cut at its first dot, lowercased.
///
/// "t3.micro on Linux" → "t3", "n1-standard-1" → "n1-standard-1".
/// Best-effort: prose descriptions yield their first word as the token.
pub fn family_token(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or("")
        .split('.')
        .next()
        .unwrap_or("")
        .to_lowercase()
}
