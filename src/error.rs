use thiserror::Error;

/// Errors raised while building a [`Machine`](crate::Machine)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("No keywords provided")]
    EmptyDictionary,

    #[error("Trie construction failed: {0}")]
    TrieConstruction(#[from] TrieError),
}

/// Errors raised while packing keywords into the double-array trie
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    #[error("Keyword {index} is empty")]
    EmptyKeyword { index: usize },

    #[error("Symbol code {code:#x} in keyword {index} is out of range")]
    SymbolOutOfRange { index: usize, code: u32 },

    #[error("Keyword too long: {length} symbols (max: {max})")]
    KeywordTooLong { length: usize, max: usize },

    #[error("Transition table overflow: {size} slots (max: {max})")]
    TableOverflow { size: usize, max: usize },
}

/// Result type for machine construction
pub type Result<T> = std::result::Result<T, Error>;
