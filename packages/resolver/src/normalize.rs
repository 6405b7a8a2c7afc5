//! Place-name normalization for QuickFacts path segments.

/// Lowercases `input`, folds accented Latin letters to ASCII, and drops
/// everything that is not an ASCII letter or digit.
///
/// `"Prince George's"` becomes `"princegeorges"`, `"Doña Ana"` becomes
/// `"donaana"`, `"St. Louis"` becomes `"stlouis"`.
#[must_use]
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Strips a trailing ` <word>` (ASCII case-insensitive) from `name`.
///
/// Returns `None` if `name` does not end with the word or if nothing would
/// be left before it.
#[must_use]
pub fn strip_suffix_word<'a>(name: &'a str, word: &str) -> Option<&'a str> {
    let trimmed = name.trim_end();
    let split = trimmed.len().checked_sub(word.len() + 1)?;
    if !trimmed.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = trimmed.split_at(split);
    let tail = tail.strip_prefix(' ')?;
    if !tail.eq_ignore_ascii_case(word) {
        return None;
    }
    let head = head.trim_end();
    if head.is_empty() { None } else { Some(head) }
}

const fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ñ' => 'n',
        'ç' => 'c',
        _ => c,
    }
}
