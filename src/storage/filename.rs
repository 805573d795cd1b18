//! Filesystem-safe, length-bounded result filenames.

use sha2::{Digest, Sha256};

/// Hex characters of the content hash appended to over-length names.
const HASH_LEN: usize = 8;

/// Replace every character outside `[A-Za-z0-9_\-. ]` with `_`.
///
/// One output byte per input character, so the result is pure ASCII and its
/// length equals the input's character count.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// First [`HASH_LEN`] lowercase hex digits of the SHA-256 of `raw`.
pub fn content_hash(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(&digest[..HASH_LEN / 2])
}

/// Sanitize `raw_base`, bound it to `max_len` including `.extension`, and
/// append a hash of the untruncated input when it had to be shortened.
///
/// `max_len` must leave room for the extension, the hash and its separator.
pub fn bounded_filename(raw_base: &str, extension: &str, max_len: usize) -> String {
    let suffix = if extension.is_empty() {
        String::new()
    } else {
        format!(".{extension}")
    };
    let budget = max_len.saturating_sub(suffix.len());
    let mut base = sanitize(raw_base);
    if base.len() > budget {
        let keep = budget.saturating_sub(HASH_LEN + 1);
        base.truncate(keep);
        base.push('_');
        base.push_str(&content_hash(raw_base));
    }
    base.push_str(&suffix);
    base
}

/// `<action>_<label>_<command>` run through [`bounded_filename`].
pub fn result_filename(
    action: &str,
    label: &str,
    command: &str,
    extension: &str,
    max_len: usize,
) -> String {
    bounded_filename(&format!("{action}_{label}_{command}"), extension, max_len)
}

/// Smallest `max_len` that still leaves one base character beside the hash.
pub fn min_filename_len(extension: &str) -> usize {
    let suffix = if extension.is_empty() { 0 } else { extension.len() + 1 };
    suffix + HASH_LEN + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_disallowed_characters() {
        assert_eq!(
            sanitize("freqtrade --config /a/b.json --pairs LTC/USDT"),
            "freqtrade --config _a_b.json --pairs LTC_USDT"
        );
        assert_eq!(sanitize("ok_name-1.2 x"), "ok_name-1.2 x");
        // multi-byte characters collapse to a single underscore each
        assert_eq!(sanitize("é€"), "__");
    }

    #[test]
    fn short_names_only_get_substitution() {
        let base = "a".repeat(176);
        let name = bounded_filename(&base, "txt", 180);
        assert_eq!(name, format!("{base}.txt"));
        assert_eq!(name.len(), 180);

        let name = bounded_filename("Plot_alpha_x/y", "txt", 180);
        assert_eq!(name, "Plot_alpha_x_y.txt");
    }

    #[test]
    fn long_names_are_bounded_and_hashed() {
        let base = "b".repeat(177);
        let name = bounded_filename(&base, "txt", 180);
        assert_eq!(name.len(), 180);
        assert!(name.ends_with(&format!("_{}.txt", content_hash(&base))));
        assert!(name.starts_with(&"b".repeat(167)));
    }

    #[test]
    fn shared_prefix_inputs_do_not_collide() {
        let prefix = "x".repeat(200);
        let a = bounded_filename(&format!("{prefix}alpha"), "txt", 180);
        let b = bounded_filename(&format!("{prefix}beta"), "txt", 180);
        assert_eq!(a.len(), 180);
        assert_eq!(b.len(), 180);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_eight_lowercase_hex_digits() {
        let h = content_hash("anything");
        assert_eq!(h.len(), 8);
        assert!(h.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn result_filename_layout() {
        let name = result_filename(
            "BacktestAll",
            "alpha",
            "freqtrade backtesting --strategy alpha",
            "txt",
            180,
        );
        assert_eq!(name, "BacktestAll_alpha_freqtrade backtesting --strategy alpha.txt");
    }

    #[test]
    fn empty_extension_has_no_dot() {
        assert_eq!(bounded_filename("abc", "", 180), "abc");
        assert_eq!(bounded_filename(&"z".repeat(300), "", 180).len(), 180);
        assert_eq!(min_filename_len(""), 10);
        assert_eq!(min_filename_len("txt"), 14);
    }
}
