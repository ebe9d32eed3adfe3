pub mod emoji;
pub mod reaction;
pub mod stats;
