//! Rule-based Latin → Devanagari transliteration.
//!
//! Letters are matched greedily against consonant and vowel tables (longest match first).
//! Consecutive consonants are joined with a virama, vowels following a consonant become vowel
//! signs, and any other vowel is written in its independent form. The inherent `a` is dropped
//! at the end of a word. Characters other than ASCII letters pass through untouched, so the
//! output never contains Latin letters.

const VIRAMA: char = '\u{094D}';

const CONSONANTS: &[(&str, &str)] = &[
    ("ksh", "क्ष"),
    ("chh", "छ"),
    ("kh", "ख"),
    ("gh", "घ"),
    ("ch", "च"),
    ("jh", "झ"),
    ("th", "थ"),
    ("dh", "ध"),
    ("ph", "फ"),
    ("bh", "भ"),
    ("sh", "श"),
    ("k", "क"),
    ("g", "ग"),
    ("c", "क"),
    ("j", "ज"),
    ("t", "त"),
    ("d", "द"),
    ("n", "न"),
    ("p", "प"),
    ("b", "ब"),
    ("m", "म"),
    ("y", "य"),
    ("r", "र"),
    ("l", "ल"),
    ("v", "व"),
    ("w", "व"),
    ("s", "स"),
    ("h", "ह"),
    ("f", "\u{095E}"),
    ("z", "\u{095B}"),
    ("q", "\u{0958}"),
    ("x", "क्स"),
];

/// `(latin, independent form, vowel sign)`.
const VOWELS: &[(&str, &str, &str)] = &[
    ("aa", "आ", "ा"),
    ("ai", "ऐ", "ै"),
    ("au", "औ", "ौ"),
    ("ee", "ई", "ी"),
    ("ii", "ई", "ी"),
    ("oo", "ऊ", "ू"),
    ("uu", "ऊ", "ू"),
    ("a", "अ", ""),
    ("i", "इ", "ि"),
    ("u", "उ", "ु"),
    ("e", "ए", "े"),
    ("o", "ओ", "ो"),
];

const MAX_UNIT: usize = 3;

enum Unit {
    Consonant(&'static str),
    Vowel {
        independent: &'static str,
        sign: &'static str,
    },
}

/// Deterministic transliterator from romanized Hindi/English to Devanagari.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transliterator;

impl Transliterator {
    /// Create a transliterator.
    pub const fn new() -> Self {
        Self
    }

    /// Transliterate a token if it contains Latin letters; otherwise return it unchanged.
    pub fn transliterate(&self, token: &str) -> String {
        if !token.chars().any(|c| c.is_ascii_alphabetic()) {
            return token.to_string();
        }

        let chars: Vec<char> = token.chars().collect();
        let mut output = String::with_capacity(token.len() * 3);
        let mut after_consonant = false;
        let mut index = 0;

        while index < chars.len() {
            let Some((unit, width)) = match_unit(&chars[index..]) else {
                output.push(chars[index]);
                after_consonant = false;
                index += 1;
                continue;
            };

            match unit {
                Unit::Consonant(letter) => {
                    if after_consonant {
                        output.push(VIRAMA);
                    }
                    output.push_str(letter);
                    after_consonant = true;
                }
                Unit::Vowel { independent, sign } => {
                    output.push_str(if after_consonant { sign } else { independent });
                    after_consonant = false;
                }
            }
            index += width;
        }

        output
    }
}

fn match_unit(chars: &[char]) -> Option<(Unit, usize)> {
    let letters = chars
        .iter()
        .take(MAX_UNIT)
        .take_while(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect::<String>();

    for width in (1..=letters.len()).rev() {
        let candidate = &letters[..width];
        if let Some(&(_, independent, sign)) =
            VOWELS.iter().find(|(latin, _, _)| *latin == candidate)
        {
            return Some((Unit::Vowel { independent, sign }, width));
        }
        if let Some(&(_, letter)) = CONSONANTS.iter().find(|(latin, _)| *latin == candidate) {
            return Some((Unit::Consonant(letter), width));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transliterates_common_words() {
        let t = Transliterator::new();
        assert_eq!(t.transliterate("namaste"), "नमस्ते");
        assert_eq!(t.transliterate("Bharat"), "भरत");
        assert_eq!(t.transliterate("kitaab"), "किताब");
        assert_eq!(t.transliterate("aam"), "आम");
    }

    #[test]
    fn leaves_non_latin_tokens_untouched() {
        let t = Transliterator::new();
        assert_eq!(t.transliterate("भारत"), "भारत");
        assert_eq!(t.transliterate("१२३"), "१२३");
        assert_eq!(t.transliterate("***"), "***");
    }

    #[test]
    fn keeps_punctuation_and_never_emits_latin() {
        let t = Transliterator::new();
        let out = t.transliterate("(Parliament),");
        assert!(out.starts_with('('));
        assert!(out.ends_with("),"));
        assert!(!out.chars().any(|c| c.is_ascii_alphabetic()));

        let every_letter = t.transliterate("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert!(!every_letter.chars().any(|c| c.is_ascii_alphabetic()));
        assert!(every_letter.chars().all(|c| ('\u{0900}'..='\u{097F}').contains(&c)));
    }

    #[test]
    fn output_is_stable_under_repeat() {
        let t = Transliterator::new();
        let once = t.transliterate("Session2023");
        assert_eq!(t.transliterate(&once), once);
    }
}
