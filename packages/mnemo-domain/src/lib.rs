pub mod filter;
pub mod merge;
pub mod mmr;

pub use filter::{FilterError, MetadataFilter, Predicate};
pub use merge::merge_metadata;
pub use mmr::Similarity;
