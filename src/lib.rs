//! Aho-Corasick multi-pattern matching over a double-array trie.
//!
//! A [`Machine`] is built once from a keyword dictionary and then scans input
//! in a single pass, reporting every occurrence of every keyword, overlapping
//! and nested ones included. Each keyword may carry an opaque payload.
//!
//! ```
//! use darts_aho_corasick::Machine;
//!
//! let machine = Machine::build(["he", "she", "his", "hers"]).unwrap();
//! let found: Vec<_> = machine
//!     .search("ushers", false)
//!     .into_iter()
//!     .map(|m| (m.word.iter().collect::<String>(), m.position))
//!     .collect();
//!
//! assert_eq!(
//!     found,
//!     [("she".to_string(), 1), ("he".to_string(), 2), ("hers".to_string(), 2)]
//! );
//! ```

use std::hash::Hash;

mod dump;
mod error;
mod machine;
mod trie;

pub use dump::AutomationDump;
pub use error::{Error, Result, TrieError};
pub use machine::{Machine, MachineBuilder, MachineSearch, Match, Matches, PatternRecord};
pub use trie::{DoubleArrayTrie, LinkedTrie, State, TrieNode, ROOT_STATE};

/// A single element of the matching alphabet.
///
/// The trie only ever sees `code()`; `from_code` is the inverse, used when
/// rendering transitions back into symbols.
pub trait Symbol: Copy + Eq + Hash {
    fn code(&self) -> u32;

    fn from_code(code: u32) -> Option<Self>;
}

impl Symbol for char {
    fn code(&self) -> u32 {
        *self as u32
    }

    fn from_code(code: u32) -> Option<Self> {
        char::from_u32(code)
    }
}

impl Symbol for u8 {
    fn code(&self) -> u32 {
        u32::from(*self)
    }

    fn from_code(code: u32) -> Option<Self> {
        u8::try_from(code).ok()
    }
}

impl Symbol for u16 {
    fn code(&self) -> u32 {
        u32::from(*self)
    }

    fn from_code(code: u32) -> Option<Self> {
        u16::try_from(code).ok()
    }
}

impl Symbol for u32 {
    fn code(&self) -> u32 {
        *self
    }

    fn from_code(code: u32) -> Option<Self> {
        Some(code)
    }
}

/// A sequence of symbols: a keyword, or content to scan.
pub trait Pattern {
    type Symbol: Symbol;

    fn iter(&self) -> impl Iterator<Item = Self::Symbol>;

    fn to_symbols(&self) -> Vec<Self::Symbol> {
        self.iter().collect()
    }
}

impl Pattern for str {
    type Symbol = char;

    fn iter(&self) -> impl Iterator<Item = Self::Symbol> {
        self.chars()
    }
}

impl Pattern for String {
    type Symbol = char;

    fn iter(&self) -> impl Iterator<Item = Self::Symbol> {
        self.chars()
    }
}

impl<S: Symbol> Pattern for [S] {
    type Symbol = S;

    fn iter(&self) -> impl Iterator<Item = Self::Symbol> {
        <[S]>::iter(self).copied()
    }
}

impl<S: Symbol> Pattern for Vec<S> {
    type Symbol = S;

    fn iter(&self) -> impl Iterator<Item = Self::Symbol> {
        self.as_slice().iter().copied()
    }
}

impl<P: Pattern + ?Sized> Pattern for &P {
    type Symbol = P::Symbol;

    fn iter(&self) -> impl Iterator<Item = Self::Symbol> {
        (**self).iter()
    }
}

/// Limits enforced while the trie is packed.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Maximum keyword length in symbols (0 = unlimited)
    pub max_keyword_length: usize,

    /// Maximum number of transition table slots
    pub max_table_size: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_keyword_length: 0,
            max_table_size: i32::MAX as usize,
        }
    }
}

impl BuildConfig {
    pub fn with_max_keyword_length(mut self, max: usize) -> Self {
        self.max_keyword_length = max;
        self
    }

    pub fn with_max_table_size(mut self, max: usize) -> Self {
        self.max_table_size = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = BuildConfig::default();
        assert_eq!(config.max_keyword_length, 0);
        assert_eq!(config.max_table_size, i32::MAX as usize);
    }

    #[test]
    fn test_symbol_codes_roundtrip_through_from_code() {
        assert_eq!('a'.code(), 97);
        assert_eq!(char::from_code(0x4e2d), Some('中'));
        assert_eq!(char::from_code(0xd800), None);
        assert_eq!(u8::from_code(256), None);
        assert_eq!(u16::from_code(65_535), Some(u16::MAX));
    }

    #[test]
    fn test_patterns_yield_symbols() {
        assert_eq!("hé".to_symbols(), vec!['h', 'é']);
        assert_eq!(String::from("ab").to_symbols(), vec!['a', 'b']);
        assert_eq!([1u8, 2, 3][..].to_symbols(), vec![1, 2, 3]);
        assert_eq!(vec![7u32].to_symbols(), vec![7]);
        assert_eq!((&"xy").to_symbols(), vec!['x', 'y']);
    }
}
