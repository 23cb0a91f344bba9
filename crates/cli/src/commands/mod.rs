//! Command handlers for the Citewise CLI.

pub mod ask;
pub mod lookup;
pub mod search;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use lookup::LookupCommand;
pub use search::SearchCommand;
