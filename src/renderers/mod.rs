//! Frame renderer implementations

pub mod placeholder;

pub use placeholder::PlaceholderRenderer;
