
use std::borrow::Cow;

use itertools::Itertools;
use scraper::Html;

/// Accented Latin letters kept by the normalizer, besides ASCII letters and digits
const ACCENTED_LETTERS: &str = "àâéèêëîïôùûüçÀÂÉÈÊËÎÏÔÙÛÜÇ";

/// Punctuation kept by the normalizer
const ALLOWED_PUNCTUATION: &str = ".,'?!-";

/// Normalize a single field value.
///
/// Markup is stripped (text nodes are joined by a space so adjacent tags do not glue
/// words together), every character outside the allow-set is replaced by a space,
/// and whitespace runs are collapsed to one ASCII space with the ends trimmed.
/// Never fails, and `normalize(&normalize(s)) == normalize(s)`.
#[inline]
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = strip_markup(raw);
    let filtered: String = text
        .chars()
        .map(|c| if is_allowed_char(c) { c } else { ' ' })
        .collect();

    filtered.split_whitespace().join(" ")
}

/// Whether a character survives normalization untouched
#[inline]
pub fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || ALLOWED_PUNCTUATION.contains(c)
        || ACCENTED_LETTERS.contains(c)
}

/// Return the textual content of an HTML fragment, one space between text nodes
fn strip_markup(raw: &str) -> String {
    if !raw.contains('<') && !raw.contains('&') {
        return raw.to_string();
    }

    let fragment = Html::parse_fragment(&escape_stray_brackets(raw));
    fragment.root_element().text().join(" ")
}

/// Escape every `<` that cannot open a tag so the parser keeps the text after it.
///
/// A `<` opens a tag only when a `>` closes it before the next `<`. Comments run to
/// their `-->` terminator.
fn escape_stray_brackets(raw: &str) -> Cow<'_, str> {
    let mut escaped = String::with_capacity(raw.len());
    let mut changed = false;
    let mut rest = raw;

    while let Some(pos) = rest.find('<') {
        let (before, tail) = rest.split_at(pos);
        escaped.push_str(before);
        let (_, after) = tail.split_at(1);

        if after.starts_with("!--") {
            if let Some(end) = after.find("-->") {
                let (comment, remaining) = after.split_at(end);
                escaped.push('<');
                escaped.push_str(comment);
                rest = remaining;
                continue;
            }
        }

        let opens_tag = match (after.find('>'), after.find('<')) {
            (Some(close), Some(next_open)) => close < next_open,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if opens_tag {
            escaped.push('<');
        } else {
            escaped.push_str("&lt;");
            changed = true;
        }
        rest = after;
    }

    if !changed {
        return Cow::Borrowed(raw);
    }
    escaped.push_str(rest);
    Cow::Owned(escaped)
}
