//! Configurable line-oriented text cleaner.
//!
//! A [`TextCleaner`] applies an ordered list of [`CleanStep`]s. Lines are always trimmed first;
//! the remaining steps run in configuration order and processing stops as soon as the text
//! becomes empty.

use regex::Regex;
use std::collections::HashSet;

/// Hindi and Latin sentence terminators accepted by the punctuation filter.
const SENTENCE_TERMINATORS: [char; 5] = ['।', '॥', '?', ',', '.'];

/// One cleaning operation.
#[derive(Debug, Clone)]
pub enum CleanStep {
    /// Trim leading and trailing whitespace from every line.
    HandleWhitespace,
    /// Drop repeated lines, keeping the first occurrence.
    RemoveRedundantLines,
    /// Drop lines that are empty after trimming.
    RemoveBlankLines,
    /// Drop lines consisting of exactly one word.
    RemoveSingleWordLines,
    /// Drop lines containing any keyword.
    RemoveLineWithKeyword(Vec<String>),
    /// Drop lines starting with any keyword.
    RemoveLinesStartingWith(Vec<String>),
    /// Drop lines containing a keyword together with the preceding line.
    RemoveLineAndBefore(Vec<String>),
    /// Drop lines containing a keyword together with the following line.
    RemoveLineAndAfter(Vec<String>),
    /// Drop a keyword line and every line above it.
    RemoveLineAndAbove(Vec<String>),
    /// Drop a keyword line and every line below it.
    RemoveLineAndBelow(Vec<String>),
    /// Truncate each line at the earliest keyword occurrence.
    RemoveAfterKeyword(Vec<String>),
    /// Drop lines containing any substring repeated at least this many times back to back.
    RemoveLinesWithRepeatedSeqs(usize),
    /// Delete every match of the patterns (dot matches newline).
    RemovePatterns(Vec<Regex>),
    /// Delete matches of the patterns with `^`/`$` anchored per line.
    RemoveLineWithPattern(Vec<Regex>),
}

impl CleanStep {
    /// Build a [`CleanStep::RemovePatterns`] step from raw patterns.
    pub fn remove_patterns(patterns: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self::RemovePatterns(compile(patterns, "(?s)")?))
    }

    /// Build a [`CleanStep::RemoveLineWithPattern`] step from raw patterns.
    pub fn remove_line_with_pattern(patterns: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self::RemoveLineWithPattern(compile(patterns, "(?m)")?))
    }

    fn apply(&self, text: &str) -> String {
        match self {
            Self::HandleWhitespace => map_lines(text, |line| Some(line.trim().to_string())),
            Self::RemoveRedundantLines => {
                let mut seen = HashSet::new();
                map_lines(text, |line| seen.insert(line).then(|| line.to_string()))
            }
            Self::RemoveBlankLines => {
                map_lines(text, |line| (!line.trim().is_empty()).then(|| line.to_string()))
            }
            Self::RemoveSingleWordLines => map_lines(text, |line| {
                (line.split_whitespace().count() != 1).then(|| line.to_string())
            }),
            Self::RemoveLineWithKeyword(keywords) => map_lines(text, |line| {
                (!keywords.iter().any(|keyword| line.contains(keyword.as_str())))
                    .then(|| line.to_string())
            }),
            Self::RemoveLinesStartingWith(keywords) => map_lines(text, |line| {
                (!keywords.iter().any(|keyword| line.starts_with(keyword.as_str())))
                    .then(|| line.to_string())
            }),
            Self::RemoveLineAndBefore(keywords) => {
                remove_neighbours(text, keywords, Neighbour::Before)
            }
            Self::RemoveLineAndAfter(keywords) => {
                remove_neighbours(text, keywords, Neighbour::After)
            }
            Self::RemoveLineAndAbove(keywords) => remove_spans(text, keywords, Neighbour::Before),
            Self::RemoveLineAndBelow(keywords) => remove_spans(text, keywords, Neighbour::After),
            Self::RemoveAfterKeyword(keywords) => map_lines(text, |line| {
                let cut = keywords
                    .iter()
                    .filter_map(|keyword| line.find(keyword.as_str()))
                    .min();
                Some(match cut {
                    Some(index) => line[..index].trim().to_string(),
                    None => line.to_string(),
                })
            }),
            Self::RemoveLinesWithRepeatedSeqs(min_repeat) => map_lines(text, |line| {
                (!has_repeated_substring(line, *min_repeat)).then(|| line.to_string())
            }),
            Self::RemovePatterns(patterns) | Self::RemoveLineWithPattern(patterns) => patterns
                .iter()
                .fold(text.to_string(), |acc, pattern| {
                    pattern.replace_all(&acc, "").into_owned()
                }),
        }
    }
}

/// Ordered cleaning configuration applied to whole texts.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    steps: Vec<CleanStep>,
}

impl TextCleaner {
    /// Create a cleaner running `steps` in order.
    pub fn new(steps: Vec<CleanStep>) -> Self {
        Self { steps }
    }

    /// Cleaner used by the master pipeline: trim, dedupe, drop blank lines.
    pub fn standard() -> Self {
        Self::new(vec![
            CleanStep::HandleWhitespace,
            CleanStep::RemoveRedundantLines,
            CleanStep::RemoveBlankLines,
        ])
    }

    /// Clean `text`, optionally keeping only lines that end with a sentence terminator.
    pub fn clean(&self, text: &str, filter_punctuation: bool) -> String {
        let mut text = CleanStep::HandleWhitespace.apply(text);

        if filter_punctuation {
            text = filter_punctuated_lines(&text);
            if text.is_empty() {
                return text;
            }
        }

        for step in &self.steps {
            text = step.apply(&text);
            if text.is_empty() {
                return text;
            }
        }
        text
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::standard()
    }
}

/// Keep only lines ending with `।`, `॥`, `?`, `,` or `.`.
pub fn filter_punctuated_lines(text: &str) -> String {
    map_lines(text, |line| {
        line.ends_with(SENTENCE_TERMINATORS)
            .then(|| line.to_string())
    })
}

/// Whether `line` contains some substring repeated `min_repeat` times consecutively.
pub fn has_repeated_substring(line: &str, min_repeat: usize) -> bool {
    if min_repeat == 0 {
        return false;
    }
    let chars: Vec<char> = line.chars().collect();
    let mut checked = HashSet::new();
    for width in 1..=chars.len() / min_repeat {
        for start in 0..width {
            let unit: String = chars[start..start + width].iter().collect();
            if !checked.insert(unit.clone()) {
                continue;
            }
            if line.contains(&unit.repeat(min_repeat)) {
                return true;
            }
        }
    }
    false
}

fn compile(patterns: &[&str], flags: &str) -> Result<Vec<Regex>, regex::Error> {
    patterns
        .iter()
        .map(|pattern| Regex::new(&format!("{flags}{pattern}")))
        .collect()
}

fn map_lines<'a, F>(text: &'a str, mut keep: F) -> String
where
    F: FnMut(&'a str) -> Option<String>,
{
    text.split('\n')
        .filter_map(|line| keep(line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Copy)]
enum Neighbour {
    Before,
    After,
}

fn remove_neighbours(text: &str, keywords: &[String], neighbour: Neighbour) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut doomed = HashSet::new();
    for (index, line) in lines.iter().enumerate() {
        if !keywords.iter().any(|keyword| line.contains(keyword.as_str())) {
            continue;
        }
        doomed.insert(index);
        match neighbour {
            Neighbour::Before if index > 0 => {
                doomed.insert(index - 1);
            }
            Neighbour::After if index + 1 < lines.len() => {
                doomed.insert(index + 1);
            }
            _ => {}
        }
    }
    lines
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !doomed.contains(index))
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_spans(text: &str, keywords: &[String], direction: Neighbour) -> String {
    let mut lines: Vec<&str> = text.split('\n').collect();
    for keyword in keywords {
        let hits: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(keyword.as_str()))
            .map(|(index, _)| index)
            .collect();
        let keep_range = match (direction, hits.first(), hits.last()) {
            (_, None, _) | (_, _, None) => continue,
            (Neighbour::Before, _, Some(&last)) => (last + 1)..lines.len(),
            (Neighbour::After, Some(&first), _) => 0..first,
        };
        lines = lines[keep_range].to_vec();
    }
    lines.join("\n")
}
