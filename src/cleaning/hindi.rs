//! Hindi-specific line filtering and normalization.

use super::{badwords::MASK, transliterate::Transliterator};

/// Minimum share of Devanagari, digit and whitespace characters for a line to count as Hindi.
const HINDI_RATIO_THRESHOLD: f64 = 0.7;
/// Lines with fewer words are dropped.
const MIN_WORDS: usize = 3;

/// Keeps predominantly Hindi lines and normalizes them.
#[derive(Debug, Clone)]
pub struct HindiTextCleaner {
    transliterator: Option<Transliterator>,
    remove_non_hindi: bool,
}

impl HindiTextCleaner {
    /// Create a cleaner; `transliterate` enables Latin → Devanagari conversion of tokens.
    pub fn new(transliterate: bool) -> Self {
        Self {
            transliterator: transliterate.then(Transliterator::new),
            remove_non_hindi: true,
        }
    }

    /// Keep lines regardless of their script mix.
    pub fn keep_non_hindi(mut self) -> Self {
        self.remove_non_hindi = false;
        self
    }

    /// Clean every line of `text`, dropping those that do not qualify.
    pub fn clean(&self, text: &str) -> String {
        text.split('\n')
            .filter_map(|line| self.clean_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn clean_line(&self, line: &str) -> Option<String> {
        let printable = remove_non_printable(line);
        let words: Vec<&str> = printable.split_whitespace().collect();
        if words.len() < MIN_WORDS {
            return None;
        }

        let line = words.join(" ");
        if self.remove_non_hindi && !is_predominantly_hindi(&line) {
            return None;
        }

        let line = to_devanagari_digits(&line);
        match &self.transliterator {
            Some(transliterator) => Some(
                line.split(' ')
                    .map(|token| transliterator.transliterate(token))
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            None => Some(line),
        }
    }
}

/// Drop everything outside printable ASCII, tab/newline/CR and the Devanagari block.
pub fn remove_non_printable(text: &str) -> String {
    text.chars()
        .filter(|c| {
            matches!(c, '\x20'..='\x7E' | '\t' | '\n' | '\r' | '\u{0900}'..='\u{097F}')
        })
        .collect()
}

/// Whether at least 70% of the characters are Devanagari, ASCII digits or whitespace.
/// Masked characters are not counted.
pub fn is_predominantly_hindi(line: &str) -> bool {
    let counted = line.chars().filter(|&c| c != MASK);
    let (hindi, total) = counted.fold((0usize, 0usize), |(hindi, total), c| {
        let is_hindi =
            ('\u{0900}'..='\u{097F}').contains(&c) || c.is_ascii_digit() || c.is_whitespace();
        (hindi + usize::from(is_hindi), total + 1)
    });
    if total == 0 {
        return false;
    }
    hindi as f64 / total as f64 >= HINDI_RATIO_THRESHOLD
}

/// Replace ASCII digits with Devanagari digits.
pub fn to_devanagari_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c.to_digit(10) {
            Some(digit) if c.is_ascii_digit() => char::from_u32(0x0966 + digit).unwrap_or(c),
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_non_hindi_lines_are_dropped() {
        let cleaner = HindiTextCleaner::new(false);
        let text = "This line has less than three words.\nदो शब्द\nयह एक हिंदी वाक्य है।\nThis line is mostly English text here";
        assert_eq!(cleaner.clean(text), "यह एक हिंदी वाक्य है।");
    }

    #[test]
    fn digits_are_converted() {
        assert_eq!(to_devanagari_digits("12345 को"), "१२३४५ को");
        let cleaner = HindiTextCleaner::new(false);
        assert_eq!(
            cleaner.clean("12345 को १२३४५ में परिवर्तित किया"),
            "१२३४५ को १२३४५ में परिवर्तित किया"
        );
    }

    #[test]
    fn non_printable_characters_are_removed() {
        assert_eq!(remove_non_printable("क\u{200B}ख “quoted”"), "कख quoted");
    }

    #[test]
    fn transliteration_applies_to_latin_tokens() {
        let cleaner = HindiTextCleaner::new(true);
        let out = cleaner.clean("संसद के विशेष सत्र में PM मोदी ने भाषण दिया");
        assert!(!out.chars().any(|c| c.is_ascii_alphabetic()));
        assert!(out.starts_with("संसद के विशेष सत्र में "));
    }

    #[test]
    fn ratio_threshold() {
        assert!(is_predominantly_hindi("यह वाक्य 2023 में"));
        assert!(!is_predominantly_hindi("Mostly english यह"));
        assert!(!is_predominantly_hindi(""));
        assert!(is_predominantly_hindi("वह **** ****** यहाँ आया"));
    }

    #[test]
    fn keep_non_hindi_skips_ratio_check() {
        let cleaner = HindiTextCleaner::new(false).keep_non_hindi();
        assert_eq!(cleaner.clean("plain english words here"), "plain english words here");
    }
}
