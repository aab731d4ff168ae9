//! Text cleaning for Hindi/Indic documents.

pub mod badwords;
pub mod hindi;
pub mod pipeline;
pub mod text_cleaner;
pub mod transliterate;

pub use badwords::BadWords;
pub use pipeline::CleaningPipeline;
pub use text_cleaner::{CleanStep, TextCleaner};
pub use transliterate::Transliterator;

/// Switches controlling the master cleaning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    /// Convert Latin tokens to Devanagari.
    pub transliterate: bool,
    /// Mask entries of the bad-word list.
    pub filter_badwords: bool,
    /// Keep only lines ending with a sentence terminator.
    pub filter_punctuation: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            transliterate: true,
            filter_badwords: true,
            filter_punctuation: false,
        }
    }
}
