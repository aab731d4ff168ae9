//! Master cleaning pipeline for Hindi/Indic documents.
//!
//! Single-line LaTeX (`` `…` ``, `$$…$$`, `$…$`) is swapped for placeholders before any
//! cleaning so formulas survive verbatim. Markdown table rows and separators are kept as-is.
//! Lines carrying LaTeX only get the safe clean. Every other line is masked for bad words,
//! cleaned and filtered by the Hindi cleaner, then masked again to catch words that only appear
//! after whitespace normalization or transliteration.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::{
    CleanOptions,
    badwords::BadWords,
    hindi::{HindiTextCleaner, remove_non_printable},
    text_cleaner::TextCleaner,
};

const PLACEHOLDER_PREFIX: &str = "__LTX_";

static LATEX_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"`[^\n]*?`").expect("inline code pattern"),
        Regex::new(r"\$\$[^\n]*?\$\$").expect("display math pattern"),
        Regex::new(r"\$[^\n$]+\$").expect("inline math pattern"),
    ]
});
static TABLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s|\-:]+$").expect("table separator pattern"));
static PARENTHESIZED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([a-zA-Z]+\)").expect("parenthesized word pattern"));
static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("newline pattern"));

/// Cleans whole documents according to [`CleanOptions`].
#[derive(Debug, Clone)]
pub struct CleaningPipeline {
    options: CleanOptions,
    text_cleaner: TextCleaner,
    hindi_cleaner: HindiTextCleaner,
    bad_words: Arc<BadWords>,
}

impl CleaningPipeline {
    /// Build a pipeline sharing `bad_words` with other pipelines.
    pub fn new(options: CleanOptions, bad_words: Arc<BadWords>) -> Self {
        Self {
            options,
            text_cleaner: TextCleaner::standard(),
            hindi_cleaner: HindiTextCleaner::new(options.transliterate),
            bad_words,
        }
    }

    /// Clean a document. Empty input yields empty output.
    pub fn clean_text(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let (protected, latex) = protect_latex(text);

        let mut cleaned_lines = Vec::new();
        for line in protected.split('\n') {
            let stripped = line.trim();
            if is_table_line(stripped) {
                cleaned_lines.push(line.to_string());
                continue;
            }

            let cleaned = if line.contains(PLACEHOLDER_PREFIX) {
                self.safe_clean(line)
            } else {
                self.clean_prose_line(line)
            };
            if !cleaned.trim().is_empty() {
                cleaned_lines.push(cleaned);
            }
        }

        let mut text = cleaned_lines.join("\n");
        for (placeholder, original) in latex.iter().rev() {
            text = text.replace(placeholder.as_str(), original);
        }
        EXCESS_NEWLINES
            .replace_all(&text, "\n\n")
            .trim()
            .to_string()
    }

    fn clean_prose_line(&self, line: &str) -> String {
        let line = self.mask(strip_math_noise(&remove_non_printable(line)));
        let line = self
            .text_cleaner
            .clean(&line, self.options.filter_punctuation);
        if line.is_empty() {
            return line;
        }
        self.mask(self.hindi_cleaner.clean(&line))
    }

    fn mask(&self, line: String) -> String {
        if self.options.filter_badwords {
            self.bad_words.mask(&line)
        } else {
            line
        }
    }

    fn safe_clean(&self, line: &str) -> String {
        let line = strip_math_noise(line);
        self.text_cleaner
            .clean(&line, self.options.filter_punctuation)
    }
}

/// Drop stray `$` and parenthesized Latin words, repeating until nothing changes.
fn strip_math_noise(line: &str) -> String {
    let mut current = line.replace('$', "");
    loop {
        let next = PARENTHESIZED_WORD.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn is_table_line(stripped: &str) -> bool {
    let is_separator = TABLE_SEPARATOR.is_match(stripped)
        && stripped.contains('|')
        && stripped.contains('-');
    let is_row = stripped.starts_with('|') && stripped.ends_with('|');
    is_separator || is_row
}

fn protect_latex(text: &str) -> (String, Vec<(String, String)>) {
    let mut stash = Vec::new();
    let mut current = text.to_string();
    for pattern in LATEX_PATTERNS.iter() {
        current = pattern
            .replace_all(&current, |captures: &regex::Captures<'_>| {
                let placeholder = format!("{PLACEHOLDER_PREFIX}{}__", stash.len());
                stash.push((placeholder.clone(), captures[0].to_string()));
                placeholder
            })
            .into_owned();
    }
    (current, stash)
}
