// File loaders for the moderation filters.

pub mod filter_files;

pub use filter_files::{load_spam_model, load_word_filter};
