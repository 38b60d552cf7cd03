// Small helpers shared by several features.

pub mod text;
pub mod time_parse;

pub use text::*;
pub use time_parse::*;
