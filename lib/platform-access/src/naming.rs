//! Candidate generators for unique display names and synthetic emails.
//!
//! Provider member names need not be unique, but local display names and
//! contact emails must be. Stores walk these candidates in order and take
//! the first one nobody holds.

use unicode_normalization::UnicodeNormalization;

/// Display name candidates: `raw`, `raw 2`, `raw 3`, ...
pub fn display_name_candidates(raw: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(raw.to_string()).chain((2u32..).map(move |n| format!("{raw} {n}")))
}

/// Synthetic email candidates: `{slug}@user.{domain}`, then with the slug
/// of `raw 2`, `raw 3`, ...
pub fn email_candidates<'a>(raw: &'a str, domain: &'a str) -> impl Iterator<Item = String> + 'a {
    display_name_candidates(raw).map(move |name| make_email(&name, domain))
}

/// Builds the synthetic address for one name.
#[must_use]
pub fn make_email(name: &str, domain: &str) -> String {
    format!("{}@user.{domain}", slugify(name))
}

/// Folds to ASCII (NFKD, then drops whatever is left outside ASCII),
/// lowercases, keeps alphanumerics, `-` and `_`, turns runs of whitespace
/// or hyphens into a single `-` and strips leading and trailing `-`/`_`.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.nfkd().filter(char::is_ascii) {
        if ch.is_whitespace() || ch == '-' {
            pending_dash = !slug.is_empty();
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash {
                slug.push('-');
                pending_dash = false;
            }
            slug.push(ch.to_ascii_lowercase());
        }
    }
    slug.trim_matches(['-', '_']).to_string()
}
