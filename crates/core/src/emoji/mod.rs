pub mod cache;
pub mod table;

pub use cache::{AliasCache, EmojiSource};
pub use table::{normalize_alias, AliasTable};
