pub mod events;
pub mod image;
pub mod ratios;
pub mod summary;
pub mod variants;
