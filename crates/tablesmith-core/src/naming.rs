//! Conventional model-to-table naming.

/// Default table name for a model: snake_case, pluralized.
pub fn model_name_to_table_name(model: &str) -> String {
    pluralize(&camel_to_snake_case(model))
}

/// Convert `CamelCase` / `camelCase` to `snake_case`.
///
/// Acronyms are split before their last capital when a lower-case letter
/// follows it, so `XMLHttpRequest` becomes `xml_http_request`.
pub fn camel_to_snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);

    for (idx, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() && idx > 0 {
            let prev = chars[idx - 1];
            let next = chars.get(idx + 1).copied();
            let after_lower = prev.is_ascii_lowercase() || prev.is_ascii_digit();
            let acronym_end =
                prev.is_ascii_uppercase() && next.is_some_and(|next| next.is_ascii_lowercase());
            if after_lower || acronym_end {
                out.push('_');
            }
        }
        out.push(ch.to_ascii_lowercase());
    }

    out
}

/// Naive English pluralization, good enough for table names.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let word = word.to_lowercase();

    if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
    {
        return format!("{word}es");
    }

    if let Some(stem) = word.strip_suffix('y') {
        if stem.chars().last().is_some_and(|prev| !is_vowel(prev)) {
            return format!("{stem}ies");
        }
    }

    if let Some(stem) = word.strip_suffix('f') {
        return format!("{stem}ves");
    }

    if let Some(stem) = word.strip_suffix("fe") {
        return format!("{stem}ves");
    }

    format!("{word}s")
}

fn is_vowel(ch: char) -> bool {
    matches!(ch.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}
