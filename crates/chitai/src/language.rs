//! Text preparation and syllable splitting.
//!
//! Everything here is pure: words and syllables are derived from item text on
//! demand and never stored.

use chitai_protocol::Language;

/// Punctuation stripped before splitting text into words. Dashes are kept so
/// compound words survive.
const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\''];

/// Remove punctuation from text, preserving dashes.
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| !PUNCTUATION.contains(c)).collect()
}

/// Split text into words on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Displayable words of an item's text.
pub fn words(text: &str) -> Vec<String> {
    tokenize(&sanitize(text))
}

/// Split a word into syllables.
///
/// Hyphenated compounds are split into their parts with the dash kept as its
/// own element (`как-нибудь` → `как`, `-`, `ни`, `будь`). Words without a
/// vowel of the language come back whole.
pub fn syllabify(word: &str, language: Language) -> Vec<String> {
    if word.contains('-') {
        let mut out = Vec::new();
        for (i, part) in word.split('-').enumerate() {
            if i > 0 {
                out.push("-".to_string());
            }
            if !part.is_empty() {
                out.extend(syllabify_part(part, language));
            }
        }
        return out;
    }
    syllabify_part(word, language)
}

fn syllabify_part(part: &str, language: Language) -> Vec<String> {
    let chars: Vec<char> = part.chars().collect();
    let vowels: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|(_, c)| is_vowel(**c, language))
        .map(|(i, _)| i)
        .collect();

    if vowels.len() < 2 {
        return vec![part.to_string()];
    }

    let mut boundaries = Vec::with_capacity(vowels.len() - 1);
    for pair in vowels.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        let consonants = right - left - 1;
        // A lone consonant opens the next syllable; clusters split after
        // their first consonant.
        let mut split = if consonants <= 1 { left + 1 } else { left + 2 };
        while split < right && sticks_to_previous(chars[split], language) {
            split += 1;
        }
        boundaries.push(split);
    }

    let mut syllables = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for end in boundaries {
        syllables.push(chars[start..end].iter().collect());
        start = end;
    }
    syllables.push(chars[start..].iter().collect());
    syllables
}

fn is_vowel(c: char, language: Language) -> bool {
    let lower = c.to_lowercase().next().unwrap_or(c);
    match language {
        Language::Ru => "аеёиоуыэюя".contains(lower),
        Language::De => "aeiouyäöü".contains(lower),
        Language::En => "aeiouy".contains(lower),
    }
}

/// Letters that never start a syllable.
fn sticks_to_previous(c: char, language: Language) -> bool {
    match language {
        Language::Ru => matches!(c.to_lowercase().next().unwrap_or(c), 'й' | 'ь' | 'ъ'),
        Language::De | Language::En => false,
    }
}
