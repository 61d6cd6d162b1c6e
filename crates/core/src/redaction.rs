/// Replacement text written in place of a masked secret.
pub const MASK: &str = "********";

const PREVIEW_CHARS: usize = 8;

/// Returns a short, log-safe prefix of a bearer token.
#[must_use]
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(PREVIEW_CHARS).collect();
    if prefix.is_empty() {
        return "<empty>".to_owned();
    }

    format!("{prefix}...")
}

/// Replaces every occurrence of each non-empty secret in `text` with [`MASK`].
///
/// Longer secrets are masked first so that a secret containing another one
/// is not left partially visible.
#[must_use]
pub fn mask_secrets<S: AsRef<str>>(text: &str, secrets: &[S]) -> String {
    let mut ordered: Vec<&str> = secrets
        .iter()
        .map(AsRef::as_ref)
        .filter(|secret| !secret.trim().is_empty())
        .collect();
    ordered.sort_by_key(|secret| std::cmp::Reverse(secret.len()));

    let mut masked = text.to_owned();
    for secret in ordered {
        masked = masked.replace(secret, MASK);
    }

    masked
}
