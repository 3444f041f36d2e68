//! Canonical case identifiers.
//!
//! Coded files are named after the case with hyphens only, because the
//! court's slash does not survive as a filename character:
//!
//! - `C-817-19_coded.md` → `C-817/19`
//! - `T-557-20_coded.md` → `T-557/20`
//!
//! The canonical slash form is the join key shared with every other dataset
//! in the study (composition data, rapporteur tables).

use std::sync::LazyLock;

use regex::Regex;

static CASE_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)([CT])-([0-9]{1,4})-([0-9]{2}|[0-9]{4})$").expect("case slug pattern compiles")
});

/// Convert a hyphen-joined slug (`C-17-22`) into the canonical form (`C-17/22`).
///
/// Number and year digits are kept as written, so `C-040-17` stays `C-040/17`.
/// Returns `None` when the slug is not a prefix/number/year triplet.
pub fn normalize_case_id(slug: &str) -> Option<String> {
    let caps = CASE_SLUG.captures(slug.trim())?;
    let prefix = caps[1].to_ascii_uppercase();
    Some(format!("{prefix}-{}/{}", &caps[2], &caps[3]))
}

/// Strip the coded-file suffix (or, failing that, the extension) from a file name.
///
/// `C-817-19_coded.md` with suffix `_coded.md` → `C-817-19`.
pub fn case_slug<'a>(file_name: &'a str, suffix: &str) -> &'a str {
    if let Some(slug) = file_name.strip_suffix(suffix) {
        return slug;
    }
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}
