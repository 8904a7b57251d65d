//! Resource naming: dasherized mount paths and English plurals for envelope keys.

use heck::ToKebabCase;
use regex::Regex;
use std::sync::OnceLock;

/// Convert an identifier to a dashed path segment.
/// e.g. "blogPosts" -> "blog-posts", "user_accounts" -> "user-accounts"
pub fn dasherize(s: &str) -> String {
    s.to_kebab_case()
}

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "moose",
    "deer",
    "news",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
];

/// Suffix rules, most specific first. First match wins.
const RULES: &[(&str, &str)] = &[
    (r"(?i)(quiz)$", "${1}zes"),
    (r"(?i)^(ox)$", "${1}en"),
    (r"(?i)([ml])ouse$", "${1}ice"),
    (r"(?i)(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
    (r"(?i)(x|ch|ss|sh)$", "${1}es"),
    (r"(?i)([^aeiouy]|qu)y$", "${1}ies"),
    (r"(?i)(hive)$", "${1}s"),
    (r"(?i)([^f])fe$", "${1}ves"),
    (r"(?i)([lr])f$", "${1}ves"),
    (r"(?i)sis$", "ses"),
    (r"(?i)([ti])um$", "${1}a"),
    (r"(?i)(buffal|tomat|potat)o$", "${1}oes"),
    (r"(?i)(bu)s$", "${1}ses"),
    (r"(?i)(alias|status)$", "${1}es"),
    (r"(?i)(octop|vir)us$", "${1}i"),
    (r"(?i)(ax|test)is$", "${1}es"),
    (r"(?i)s$", "s"),
];

fn rules() -> &'static [(Regex, &'static str)] {
    static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, *replacement)))
            .collect()
    })
}

/// Plural form of an English word. Words already ending in `s` are left as-is.
/// e.g. "post" -> "posts", "category" -> "categories", "person" -> "people"
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if word.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    for (singular, plural) in IRREGULAR {
        if lower == *singular {
            let mut out = String::with_capacity(plural.len());
            let mut chars = word.chars();
            if let Some(first) = chars.next().filter(|c| c.is_uppercase()) {
                out.extend(first.to_uppercase());
                out.push_str(&plural[1..]);
                return out;
            }
            return (*plural).to_string();
        }
    }
    for (re, replacement) in rules() {
        if re.is_match(word) {
            return re.replace(word, *replacement).into_owned();
        }
    }
    format!("{}s", word)
}
