//! Bad-word detection and in-place masking.

use std::path::Path;

const BUNDLED: &str = include_str!("badwords.txt");
/// Character written over masked bad words.
pub const MASK: char = '*';

/// Case-insensitive bad-word list.
#[derive(Debug, Clone, Default)]
pub struct BadWords {
    /// Lower-cased entries as characters, longest first.
    entries: Vec<Vec<char>>,
}

impl BadWords {
    /// The list shipped with the crate.
    pub fn bundled() -> Self {
        Self::from_lines(BUNDLED.lines())
    }

    /// Bundled list extended with the entries of `path`, when given.
    pub fn load(path: Option<&Path>) -> std::io::Result<Self> {
        let mut words = Self::bundled();
        if let Some(path) = path {
            let extra = std::fs::read_to_string(path)?;
            words.extend(extra.lines());
            tracing::debug!(path = %path.display(), total = words.len(), "Loaded extra bad words");
        }
        Ok(words)
    }

    /// Build a list from raw lines. Blank lines, `#` comments and one-character entries are
    /// skipped.
    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut words = Self::default();
        words.extend(lines);
        words
    }

    fn extend<'a, I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for line in lines {
            let entry = line.trim();
            if entry.starts_with('#') || entry.chars().count() <= 1 {
                continue;
            }
            let lowered = fold_chars(entry);
            if !self.entries.contains(&lowered) {
                self.entries.push(lowered);
            }
        }
        self.entries
            .sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `text` contains any entry.
    pub fn contains_any(&self, text: &str) -> bool {
        let haystack = fold_chars(text);
        self.entries
            .iter()
            .any(|entry| find_from(&haystack, entry, 0).is_some())
    }

    /// Replace every occurrence of every entry with `*` of the same length. Whitespace inside a
    /// multi-word entry is kept so word boundaries survive masking.
    pub fn mask(&self, text: &str) -> String {
        if self.entries.is_empty() || text.is_empty() {
            return text.to_string();
        }

        let mut original: Vec<char> = text.chars().collect();
        let mut folded = fold_chars(text);
        let mut changed = false;

        for entry in &self.entries {
            let mut start = 0;
            while let Some(index) = find_from(&folded, entry, start) {
                let end = index + entry.len();
                for position in index..end {
                    if !original[position].is_whitespace() {
                        original[position] = MASK;
                        folded[position] = MASK;
                    }
                }
                changed = true;
                start = end;
            }
        }

        if changed {
            original.into_iter().collect()
        } else {
            text.to_string()
        }
    }
}

/// Lower-case character by character, keeping a one-to-one mapping with the input.
fn fold_chars(text: &str) -> Vec<char> {
    text.chars()
        .map(|c| {
            let mut lower = c.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(single), None) => single,
                _ => c,
            }
        })
        .collect()
}

fn find_from(haystack: &[char], needle: &[char], start: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (start..=haystack.len() - needle.len()).find(|&index| haystack[index..].starts_with(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_list_is_loaded_without_comments() {
        let words = BadWords::bundled();
        assert!(!words.is_empty());
        assert!(words.contains_any("what the SHIT"));
        assert!(!words.contains_any("# Bundled bad-word list"));
    }

    #[test]
    fn short_entries_and_duplicates_are_ignored() {
        let words = BadWords::from_lines(["a", " ", "bad", "BAD", "  worse  "]);
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn masking_preserves_length_and_surroundings() {
        let words = BadWords::from_lines(["darn", "कमीना"]);
        assert_eq!(words.mask("Oh DARN it, darn!"), "Oh **** it, ****!");
        assert_eq!(words.mask("वह कमीना है"), "वह ***** है");
        assert_eq!(words.mask("clean text"), "clean text");
    }

    #[test]
    fn multi_word_entries_keep_their_spaces() {
        let words = BadWords::from_lines(["साला कुत्ता"]);
        assert_eq!(words.mask("वह साला कुत्ता था"), "वह **** ****** था");
    }

    #[test]
    fn masking_is_stable() {
        let words = BadWords::bundled();
        let once = words.mask("this bullshit is kamina stuff");
        assert_eq!(words.mask(&once), once);
        assert!(!words.contains_any(&once));
    }

    #[test]
    fn load_merges_extra_file() {
        let path = std::env::temp_dir()
            .join(format!("indusnlp-badwords-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "# extra\nfrobnicate\n").expect("write");
        let words = BadWords::load(Some(&path)).expect("load");
        std::fs::remove_file(&path).ok();
        assert!(words.contains_any("please FROBNICATE now"));
        assert!(words.len() > BadWords::bundled().len());
    }
}
