/// Punctuation that separates terms in addition to whitespace. ASCII
/// punctuation plus the common marks of Devanagari, CJK, Arabic and
/// typographic quoting.
const EXTRA_PUNCTUATION: &[char] = &[
    '।', '॥', '、', '。', '，', '．', '！', '？', '：', '；', '「', '」', '『', '』', '（', '）', '【', '】',
    '“', '”', '‘', '’', '«', '»', '…', '–', '—', '¡', '¿', '·', '،', '؛', '؟', '・', '〈', '〉', '《', '》',
];

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_punctuation() || EXTRA_PUNCTUATION.contains(&c)
}

/// Split `text` into lowercased terms.
///
/// A term is a maximal run of characters that are neither whitespace nor
/// punctuation, kept only if it is longer than one character. Letters of
/// any script, digits and combining marks stay inside the term.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(is_separator)
        .filter(|run| run.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_ascii_punctuation() {
        assert_eq!(tokenize("Apple-pie, (recipe)!"), vec!["apple", "pie", "recipe"]);
    }

    #[test]
    fn keeps_combining_marks_inside_terms() {
        // "हिन्दी भाषा।" : the virama and vowel signs must not split the words.
        assert_eq!(tokenize("हिन्दी भाषा।"), vec!["हिन्दी", "भाषा"]);
    }

    #[test]
    fn drops_single_character_runs() {
        assert_eq!(tokenize("a b cd e"), vec!["cd"]);
        assert!(tokenize("?!. ,").is_empty());
    }
}
