//! Double-array trie used as the goto skeleton of the machine.
//!
//! A state is the `base` offset of a node. The transition from state `s` on a
//! symbol with code `c` lives in slot `s + c + 1`, valid when `check` at that
//! slot holds `s`. Slot `s + 0` is the end marker of a keyword-terminating
//! node; its `base` stores `-(keyword + 1)`.

use std::collections::VecDeque;

use tracing::trace;

use crate::{BuildConfig, Symbol, TrieError};

/// Index into the transition table.
pub type State = u32;

/// Start state. Every symbol without a transition from here loops back to it.
pub const ROOT_STATE: State = 1;

const END_OFFSET: usize = 0;

// Slots 0 and 1 never hold transitions.
const FIRST_FREE_SLOT: usize = 2;

// Share of occupied slots past which the first-fit search stops revisiting
// the front of the table.
const DENSE_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct TrieNode {
    code: u32,
    state: State,
    depth: usize,
    children: Vec<usize>,
    keyword: Option<usize>,
}

impl TrieNode {
    fn new(code: u32, depth: usize) -> Self {
        Self {
            code,
            state: 0,
            depth,
            children: Vec::new(),
            keyword: None,
        }
    }

    /// Code of the symbol on the edge into this node.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Table offset of this node, i.e. its state.
    pub fn state(&self) -> State {
        self.state
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Node indices of the children, ordered by symbol code.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// Id of the keyword ending at this node.
    pub fn keyword(&self) -> Option<usize> {
        self.keyword
    }
}

/// The same trie as a tree of nodes, for level-order walks at build time.
#[derive(Debug, Clone)]
pub struct LinkedTrie {
    nodes: Vec<TrieNode>,
}

impl LinkedTrie {
    fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new(0, 0)],
        }
    }

    pub fn root(&self) -> &TrieNode {
        &self.nodes[0]
    }

    pub fn node(&self, idx: usize) -> &TrieNode {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `(state, keyword id)` for every node that terminates a keyword.
    pub fn terminals(&self) -> impl Iterator<Item = (State, usize)> + '_ {
        self.nodes
            .iter()
            .filter_map(|node| node.keyword.map(|keyword| (node.state, keyword)))
    }

    fn insert(&mut self, codes: &[u32], keyword: usize) {
        let mut idx = 0;

        for (depth, &code) in codes.iter().enumerate() {
            let children = &self.nodes[idx].children;
            idx = match children.binary_search_by_key(&code, |&c| self.nodes[c].code) {
                Ok(pos) => children[pos],
                Err(pos) => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::new(code, depth + 1));
                    self.nodes[idx].children.insert(pos, child);
                    child
                }
            };
        }

        // A repeated keyword keeps the id it was first inserted with.
        self.nodes[idx].keyword.get_or_insert(keyword);
    }

    /// Slot offsets used below `idx`, ascending: end marker first.
    fn offsets(&self, idx: usize) -> Vec<usize> {
        let node = &self.nodes[idx];
        let mut offsets = Vec::with_capacity(node.children.len() + 1);

        if node.keyword.is_some() {
            offsets.push(END_OFFSET);
        }
        offsets.extend(
            node.children
                .iter()
                .map(|&child| self.nodes[child].code as usize + 1),
        );

        offsets
    }
}

/// Two parallel arrays: `base` per slot and the `check` parent back-pointer.
#[derive(Debug, Clone)]
pub struct DoubleArrayTrie {
    base: Vec<i32>,
    check: Vec<State>,
}

impl DoubleArrayTrie {
    /// Packs `keywords` and returns the table together with its node tree.
    ///
    /// Keyword ids are indices into `keywords`.
    pub fn build<S: Symbol>(
        keywords: &[Vec<S>],
        config: &BuildConfig,
    ) -> Result<(Self, LinkedTrie), TrieError> {
        let mut linked = LinkedTrie::new();

        for (index, keyword) in keywords.iter().enumerate() {
            if keyword.is_empty() {
                return Err(TrieError::EmptyKeyword { index });
            }
            if config.max_keyword_length > 0 && keyword.len() > config.max_keyword_length {
                return Err(TrieError::KeywordTooLong {
                    length: keyword.len(),
                    max: config.max_keyword_length,
                });
            }

            let codes = keyword
                .iter()
                .map(|symbol| match symbol.code() {
                    u32::MAX => Err(TrieError::SymbolOutOfRange {
                        index,
                        code: u32::MAX,
                    }),
                    code => Ok(code),
                })
                .collect::<Result<Vec<_>, _>>()?;

            linked.insert(&codes, index);
        }

        let mut packer = Packer::new(config.max_table_size.min(i32::MAX as usize));
        packer.pack(&mut linked)?;

        let trie = Self {
            base: packer.base,
            check: packer.check,
        };

        Ok((trie, linked))
    }

    pub fn base(&self) -> &[i32] {
        &self.base
    }

    pub fn check(&self) -> &[State] {
        &self.check
    }

    /// Number of slots in the table.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Id of the keyword equal to the whole of `content`, if stored.
    pub fn exact_match_search<S: Symbol>(
        &self,
        content: impl IntoIterator<Item = S>,
    ) -> Option<usize> {
        let mut state = ROOT_STATE as usize;

        for symbol in content {
            let slot = state.checked_add(symbol.code() as usize)?.checked_add(1)?;
            match (self.check.get(slot), self.base.get(slot)) {
                (Some(&parent), Some(&child)) if parent as usize == state && child > 0 => {
                    state = child as usize;
                }
                _ => return None,
            }
        }

        let end = state + END_OFFSET;
        match (self.check.get(end), self.base.get(end)) {
            (Some(&parent), Some(&value)) if parent as usize == state && value < 0 => {
                Some((-value - 1) as usize)
            }
            _ => None,
        }
    }

    /// Every goto edge as `(from, symbol code, to)`.
    pub fn transitions(&self) -> impl Iterator<Item = (State, u32, State)> + '_ {
        self.check
            .iter()
            .zip(&self.base)
            .enumerate()
            .filter(|&(_, (&parent, &child))| parent != 0 && child > 0)
            .map(|(slot, (&parent, &child))| {
                let code = (slot - parent as usize - 1) as u32;
                (parent, code, child as State)
            })
    }
}

/// First-fit placement of each node's sibling group.
struct Packer {
    base: Vec<i32>,
    check: Vec<State>,
    used: Vec<bool>,
    next_check_pos: usize,
    max_size: usize,
}

impl Packer {
    fn new(max_size: usize) -> Self {
        Self {
            base: Vec::new(),
            check: Vec::new(),
            used: Vec::new(),
            next_check_pos: FIRST_FREE_SLOT,
            max_size,
        }
    }

    fn pack(&mut self, linked: &mut LinkedTrie) -> Result<(), TrieError> {
        // (node, slot holding the edge into it)
        let mut queue = VecDeque::from([(0usize, None::<usize>)]);

        while let Some((idx, slot)) = queue.pop_front() {
            let offsets = linked.offsets(idx);
            let begin = match slot {
                None => ROOT_STATE as usize,
                Some(_) => self.find_begin(&offsets),
            };

            let last = offsets.last().copied().unwrap_or(END_OFFSET);
            self.reserve(begin + last + 1)?;
            self.used[begin] = true;

            for &offset in &offsets {
                self.check[begin + offset] = begin as State;
            }
            if let Some(slot) = slot {
                self.base[slot] = begin as i32;
            }

            let node = &mut linked.nodes[idx];
            node.state = begin as State;
            if let Some(keyword) = node.keyword {
                // Ids are bounded by the slot count, itself capped at i32::MAX.
                self.base[begin + END_OFFSET] = -(keyword as i32) - 1;
            }

            trace!(node = idx, state = begin, "Placed trie node");

            for &child in &linked.nodes[idx].children {
                let child_slot = begin + linked.nodes[child].code as usize + 1;
                queue.push_back((child, Some(child_slot)));
            }

            self.advance_next_check_pos();
        }

        Ok(())
    }

    fn find_begin(&mut self, offsets: &[usize]) -> usize {
        let first = offsets.first().copied().unwrap_or(END_OFFSET);
        let mut pos = self.next_check_pos.max(first + 1);
        let mut occupied = 0usize;

        loop {
            if !self.is_free(pos) {
                occupied += 1;
                pos += 1;
                continue;
            }

            let begin = pos - first;
            if self.used.get(begin).copied().unwrap_or(false) {
                pos += 1;
                continue;
            }

            if offsets.iter().skip(1).all(|&offset| self.is_free(begin + offset)) {
                let scanned = (pos - self.next_check_pos + 1) as f64;
                if occupied as f64 / scanned >= DENSE_THRESHOLD {
                    self.next_check_pos = pos;
                }
                return begin;
            }

            pos += 1;
        }
    }

    fn is_free(&self, slot: usize) -> bool {
        self.check.get(slot).map_or(true, |&parent| parent == 0)
    }

    fn advance_next_check_pos(&mut self) {
        while self.next_check_pos < self.check.len() && self.check[self.next_check_pos] != 0 {
            self.next_check_pos += 1;
        }
    }

    fn reserve(&mut self, size: usize) -> Result<(), TrieError> {
        if size > self.max_size {
            return Err(TrieError::TableOverflow {
                size,
                max: self.max_size,
            });
        }
        if size > self.base.len() {
            self.base.resize(size, 0);
            self.check.resize(size, 0);
            self.used.resize(size, false);
        }

        Ok(())
    }
}
