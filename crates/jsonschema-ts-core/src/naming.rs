//! Identifier sanitization and collision-free name generation.
//!
//! Every declaration name in the output goes through [`sanitize_identifier`];
//! names assigned by the parser additionally go through
//! [`generate_unique_name`] so that no two nodes of one compile share a name.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Names already handed out during one compile.
pub type UsedNames = HashSet<String>;

/// Base used when a raw name sanitizes to nothing.
pub const FALLBACK_NAME: &str = "Unnamed";

static LEADING_INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^A-Za-z_$]+").unwrap());
static INVALID_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z_$0-9]").unwrap());
static LEADING_UNDERSCORE_LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^_[a-z]").unwrap());
static UNDERSCORE_LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"_[a-z]").unwrap());
static AFTER_DIGIT_OR_DOLLAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9$]+[a-zA-Z]").unwrap());
static AFTER_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([a-zA-Z])").unwrap());
static SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s").unwrap());

/// Convert an arbitrary string into a PascalCase TypeScript identifier.
///
/// Diacritics are folded to their base letters, characters that cannot
/// appear in an identifier become word boundaries, and each word after a
/// boundary, an underscore, a digit or a `$` is capitalised.
///
/// The whole run of leading characters that cannot start an identifier is
/// dropped, digits included: `"22ab"` becomes `"Ab"`, not `"2Ab"`. Every
/// result is a valid identifier and sanitizing it again is a no-op.
///
/// # Example
/// ```
/// use jsonschema_ts_core::sanitize_identifier;
/// assert_eq!(sanitize_identifier("foo bar-baz"), "FooBarBaz");
/// assert_eq!(sanitize_identifier("foo_bar"), "FooBar");
/// assert_eq!(sanitize_identifier("22ab"), "Ab");
/// ```
pub fn sanitize_identifier(raw: &str) -> String {
    let folded = deburr(raw);
    let s = LEADING_INVALID.replace(&folded, " ");
    let s = INVALID_CHAR.replace_all(&s, " ");
    let s = LEADING_UNDERSCORE_LOWER.replace(&s, |caps: &Captures| caps[0].to_uppercase());
    let s = UNDERSCORE_LOWER.replace_all(&s, |caps: &Captures| caps[0][1..].to_uppercase());
    let s = AFTER_DIGIT_OR_DOLLAR.replace_all(&s, |caps: &Captures| caps[0].to_uppercase());
    let s = AFTER_SEPARATOR.replace_all(&s, |caps: &Captures| caps[1].to_uppercase());
    let s = SEPARATOR.replace_all(&s, "");
    upper_first(&s)
}

/// Sanitize `raw` and make it unique against `used_names`, registering the
/// result.
///
/// Collisions are resolved by appending `1`, `2`, … to the sanitized base.
/// The search always terminates because `used_names` is finite.
pub fn generate_unique_name(raw: &str, used_names: &mut UsedNames) -> String {
    let mut base = sanitize_identifier(raw);
    if base.is_empty() {
        base = FALLBACK_NAME.to_string();
    }

    let mut name = base.clone();
    let mut counter: u64 = 1;
    while used_names.contains(&name) {
        name = format!("{base}{counter}");
        counter += 1;
    }

    used_names.insert(name.clone());
    name
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Fold Latin-1 and Latin Extended-A letters to plain ASCII and drop
/// combining diacritical marks.
fn deburr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if ('\u{300}'..='\u{36f}').contains(&c) {
            continue;
        }
        match deburr_char(c) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

fn deburr_char(c: char) -> Option<&'static str> {
    let replacement = match c {
        'À'..='Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'à'..='å' | 'ā' | 'ă' | 'ą' => "a",
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "C",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'Ð' | 'Ď' | 'Đ' => "D",
        'ð' | 'ď' | 'đ' => "d",
        'È'..='Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => "E",
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => "G",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'Ĥ' | 'Ħ' => "H",
        'ĥ' | 'ħ' => "h",
        'Ì'..='Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => "I",
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'Ĵ' => "J",
        'ĵ' => "j",
        'Ķ' => "K",
        'ķ' | 'ĸ' => "k",
        'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => "L",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' | 'Ŋ' => "N",
        'ñ' | 'ń' | 'ņ' | 'ň' | 'ŋ' => "n",
        'Ò'..='Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => "O",
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'Ŕ' | 'Ŗ' | 'Ř' => "R",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => "S",
        'ś' | 'ŝ' | 'ş' | 'š' | 'ſ' => "s",
        'Ţ' | 'Ť' | 'Ŧ' => "T",
        'ţ' | 'ť' | 'ŧ' => "t",
        'Ù'..='Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'Ŵ' => "W",
        'ŵ' => "w",
        'Ý' | 'Ŷ' | 'Ÿ' => "Y",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'ź' | 'ż' | 'ž' => "z",
        'Æ' => "Ae",
        'æ' => "ae",
        'Þ' => "Th",
        'þ' => "th",
        'ß' => "ss",
        'Ĳ' => "IJ",
        'ĳ' => "ij",
        'Œ' => "Oe",
        'œ' => "oe",
        'ŉ' => "'n",
        _ => return None,
    };
    Some(replacement)
}
