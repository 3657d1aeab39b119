//! Deterministic munging of free text into catalog names and tags.
//!
//! Both functions are lossy, pure, and idempotent: munging an already munged
//! string returns it unchanged.

const NAME_MIN_LENGTH: usize = 2;
const NAME_MAX_LENGTH: usize = 100;
const TAG_MIN_LENGTH: usize = 2;
const TAG_MAX_LENGTH: usize = 100;

/// Converts text into a catalog record name (`[a-z0-9_-]`, 2..=100 chars).
///
/// ```rust
/// use neat_sync::munge::munge_name;
///
/// assert_eq!(munge_name("docA/doc"), "doca-doc");
/// assert_eq!(munge_name("Zürich 2011.03"), "zurich-2011-03");
/// ```
pub fn munge_name(text: &str) -> String {
    let ascii = substitute_ascii_equivalents(text);
    let name: String = ascii
        .chars()
        .map(|c| if matches!(c, ' ' | '.' | ':' | '/') { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    fit_length(name, NAME_MIN_LENGTH, NAME_MAX_LENGTH)
}

/// Converts text into a tag (`[a-z0-9-]`, 2..=100 chars).
///
/// Returns `None` when no character survives.
pub fn munge_tag(text: &str) -> Option<String> {
    let ascii = substitute_ascii_equivalents(text).to_lowercase();
    let tag: String = ascii
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ' ')
        .map(|c| if c == ' ' { '-' } else { c })
        .collect();
    if tag.is_empty() {
        return None;
    }
    Some(fit_length(tag, TAG_MIN_LENGTH, TAG_MAX_LENGTH))
}

fn fit_length(mut s: String, min: usize, max: usize) -> String {
    // Only ASCII remains at this point, so byte length equals char count.
    while s.len() < min {
        s.push('_');
    }
    s.truncate(max);
    s
}

/// Replaces common Latin accented letters with plain ASCII.
///
/// Characters without an equivalent are passed through and dropped later by
/// the character filters.
pub fn substitute_ascii_equivalents(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => out.push('A'),
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => out.push('a'),
            'Æ' => out.push_str("AE"),
            'æ' => out.push_str("ae"),
            'Ç' => out.push('C'),
            'ç' => out.push('c'),
            'È' | 'É' | 'Ê' | 'Ë' => out.push('E'),
            'è' | 'é' | 'ê' | 'ë' => out.push('e'),
            'Ì' | 'Í' | 'Î' | 'Ï' => out.push('I'),
            'ì' | 'í' | 'î' | 'ï' => out.push('i'),
            'Ð' => out.push('D'),
            'ð' => out.push('d'),
            'Ñ' => out.push('N'),
            'ñ' => out.push('n'),
            'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => out.push('O'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => out.push('o'),
            'Œ' => out.push_str("OE"),
            'œ' => out.push_str("oe"),
            'Ù' | 'Ú' | 'Û' | 'Ü' => out.push('U'),
            'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
            'Ý' => out.push('Y'),
            'ý' | 'ÿ' => out.push('y'),
            'Þ' => out.push_str("Th"),
            'þ' => out.push_str("th"),
            'ß' => out.push_str("ss"),
            _ => out.push(c),
        }
    }
    out
}
