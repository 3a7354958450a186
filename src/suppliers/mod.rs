
pub mod animepahe;

pub use animepahe::AnimePaheSources;
