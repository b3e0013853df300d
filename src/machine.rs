use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace, warn};

use crate::{
    AutomationDump, BuildConfig, DoubleArrayTrie, Error, LinkedTrie, Pattern, Result, State,
    Symbol, ROOT_STATE,
};

/// A keyword owned by the machine, with its optional payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRecord<S, D> {
    pattern: Vec<S>,
    payload: Option<D>,
}

impl<S, D> PatternRecord<S, D> {
    pub fn pattern(&self) -> &[S] {
        &self.pattern
    }

    pub fn payload(&self) -> Option<&D> {
        self.payload.as_ref()
    }
}

/// One keyword occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a, S, D> {
    /// Start offset, in symbols
    pub position: usize,

    /// The matched keyword
    pub word: &'a [S],

    /// Payload bound to the keyword
    pub payload: Option<&'a D>,
}

impl<'a, S, D> Match<'a, S, D> {
    fn new(position: usize, record: &'a PatternRecord<S, D>) -> Self {
        Self {
            position,
            word: &record.pattern,
            payload: record.payload.as_ref(),
        }
    }

    /// Offset one past the last matched symbol.
    pub fn end(&self) -> usize {
        self.position + self.word.len()
    }
}

/// Builds a [`Machine`] with payloads and construction limits.
#[derive(Debug, Clone)]
pub struct MachineBuilder<S, D = ()> {
    config: BuildConfig,
    payloads: HashMap<Vec<S>, D>,
}

impl<S: Symbol, D> Default for MachineBuilder<S, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Symbol, D> MachineBuilder<S, D> {
    pub fn new() -> Self {
        Self {
            config: BuildConfig::default(),
            payloads: HashMap::new(),
        }
    }

    pub fn config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds `payload` to the keyword equal to `keyword`. A later binding
    /// for the same keyword replaces an earlier one.
    pub fn payload<P>(mut self, keyword: &P, payload: D) -> Self
    where
        P: Pattern<Symbol = S> + ?Sized,
    {
        self.payloads.insert(keyword.to_symbols(), payload);
        self
    }

    pub fn payloads(mut self, payloads: HashMap<Vec<S>, D>) -> Self {
        self.payloads.extend(payloads);
        self
    }

    pub fn build<I, P>(self, keywords: I) -> Result<Machine<S, D>>
    where
        I: IntoIterator<Item = P>,
        P: Pattern<Symbol = S>,
    {
        let mut seen = HashSet::new();
        let keywords: Vec<Vec<S>> = keywords
            .into_iter()
            .map(|keyword| keyword.to_symbols())
            .filter(|keyword| seen.insert(keyword.clone()))
            .collect();

        if keywords.is_empty() {
            return Err(Error::EmptyDictionary);
        }

        debug!(keywords = keywords.len(), "Building double-array trie");
        let (trie, linked) = DoubleArrayTrie::build(&keywords, &self.config)?;

        let mut payloads = self.payloads;
        let records: Vec<PatternRecord<S, D>> = keywords
            .into_iter()
            .map(|pattern| {
                let payload = payloads.remove(&pattern);
                PatternRecord { pattern, payload }
            })
            .collect();

        if !payloads.is_empty() {
            warn!(
                unmatched = payloads.len(),
                "Payload keys matched no keyword and were dropped"
            );
        }

        let mut machine = Machine {
            failure: vec![ROOT_STATE; trie.len()],
            output: linked.terminals().map(|(state, id)| (state, vec![id])).collect(),
            trie,
            records,
        };
        machine.build_failure(&linked);

        debug!(
            states = linked.len(),
            slots = machine.trie.len(),
            patterns = machine.records.len(),
            "Built Aho-Corasick machine"
        );

        Ok(machine)
    }
}

/// Aho-Corasick automaton over a double-array trie.
///
/// Immutable once built; searches keep their scan state in their own cursor,
/// so a shared `&Machine` serves any number of concurrent searches.
#[derive(Debug, Clone)]
pub struct Machine<S, D = ()> {
    trie: DoubleArrayTrie,
    failure: Vec<State>,
    output: HashMap<State, Vec<usize>>,
    records: Vec<PatternRecord<S, D>>,
}

impl<S: Symbol> Machine<S> {
    /// Builds a machine whose keywords carry no payload.
    pub fn build<I, P>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Pattern<Symbol = S>,
    {
        MachineBuilder::new().build(keywords)
    }
}

impl<S: Symbol, D> Machine<S, D> {
    /// Builds a machine, binding each payload to the keyword with the same
    /// symbols. Keys equal to no keyword are ignored.
    pub fn build_with_payloads<I, P>(keywords: I, payloads: HashMap<Vec<S>, D>) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Pattern<Symbol = S>,
    {
        MachineBuilder::new().payloads(payloads).build(keywords)
    }

    /// Level-order walk assigning each node its failure link and merging the
    /// outputs of that link after the node's own.
    fn build_failure(&mut self, linked: &LinkedTrie) {
        let root = linked.root();
        let mut queue = VecDeque::new();

        for &child in root.children() {
            self.failure[linked.node(child).state() as usize] = ROOT_STATE;
            queue.push_back(child);
        }

        while let Some(node_idx) = queue.pop_front() {
            let node = linked.node(node_idx);

            for &child_idx in node.children() {
                let child = linked.node(child_idx);
                let mut in_state = self.failure[node.state() as usize];

                // Each retry moves to a strictly shallower state and ROOT
                // never fails, so this runs at most `child.depth()` times.
                let out_state = loop {
                    match self.goto(in_state, child.code()) {
                        Some(state) => break state,
                        None => in_state = self.failure[in_state as usize],
                    }
                };

                self.failure[child.state() as usize] = out_state;

                if let Some(inherited) = self.output.get(&out_state).cloned() {
                    self.output
                        .entry(child.state())
                        .or_default()
                        .extend(inherited);
                }

                trace!(
                    state = child.state(),
                    failure = out_state,
                    depth = child.depth(),
                    "Linked failure"
                );

                queue.push_back(child_idx);
            }
        }
    }

    /// Goto function: the state reached from `state` on the symbol with
    /// `code`, or `None` (FAIL). ROOT never fails.
    pub fn goto(&self, state: State, code: u32) -> Option<State> {
        let (base, check) = (self.trie.base(), self.trie.check());
        let slot = state as u64 + code as u64 + 1;

        let next = usize::try_from(slot)
            .ok()
            .filter(|&slot| slot < base.len())
            .filter(|&slot| check[slot] == state && base[slot] > 0)
            .map(|slot| base[slot] as State);

        match next {
            Some(next) => Some(next),
            None if state == ROOT_STATE => Some(ROOT_STATE),
            None => None,
        }
    }

    /// Failure link of `state`. `None` for slots that are not states.
    pub fn failure(&self, state: State) -> Option<State> {
        self.failure.get(state as usize).copied()
    }

    /// Records reported when the scan is in `state`, in emission order.
    pub fn outputs(&self, state: State) -> impl Iterator<Item = &PatternRecord<S, D>> + '_ {
        self.output_ids(state)
            .iter()
            .map(move |&id| &self.records[id])
    }

    /// Indices into [`patterns`](Self::patterns) reported in `state`.
    pub(crate) fn output_ids(&self, state: State) -> &[usize] {
        self.output.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct keywords in first-seen order.
    pub fn patterns(&self) -> &[PatternRecord<S, D>] {
        &self.records
    }

    pub fn trie(&self) -> &DoubleArrayTrie {
        &self.trie
    }

    pub fn dump(&self) -> AutomationDump
    where
        S: ToString,
    {
        AutomationDump::create(self)
    }

    /// A cursor for feeding input one symbol at a time.
    pub fn cursor(&self) -> MachineSearch<'_, S, D> {
        MachineSearch::new(self)
    }

    /// Lazily yields every match in `content`, in the order `search` reports them.
    pub fn find_iter<I>(&self, content: I) -> Matches<'_, I::IntoIter, S, D>
    where
        I: IntoIterator<Item = S>,
    {
        Matches {
            cursor: self.cursor(),
            symbols: content.into_iter().enumerate(),
            pending: (&[] as &[usize]).iter(),
            end: 0,
        }
    }

    /// Scans `content` once and returns the matches ordered by end position,
    /// a state's own keyword ahead of those inherited through failure links.
    /// With `stop_at_first` the scan ends at the first match.
    pub fn search<P>(&self, content: &P, stop_at_first: bool) -> Vec<Match<'_, S, D>>
    where
        P: Pattern<Symbol = S> + ?Sized,
    {
        let mut matches = self.find_iter(content.iter());

        if stop_at_first {
            matches.next().into_iter().collect()
        } else {
            matches.collect()
        }
    }

    /// Whole-input lookup in the trie; the failure links play no part.
    pub fn exact_match<P>(&self, content: &P) -> Option<Match<'_, S, D>>
    where
        P: Pattern<Symbol = S> + ?Sized,
    {
        let id = self.trie.exact_match_search(content.iter())?;
        self.records.get(id).map(|record| Match::new(0, record))
    }
}

/// Scan state of one search.
#[derive(Debug, Clone)]
pub struct MachineSearch<'a, S, D> {
    machine: &'a Machine<S, D>,
    current: State,
}

impl<'a, S: Symbol, D> MachineSearch<'a, S, D> {
    pub fn new(machine: &'a Machine<S, D>) -> Self {
        Self {
            machine,
            current: ROOT_STATE,
        }
    }

    pub fn state(&self) -> State {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = ROOT_STATE;
    }

    /// Consumes `symbol` and returns the keywords ending at it.
    pub fn next(&mut self, symbol: S) -> impl Iterator<Item = &'a PatternRecord<S, D>> {
        let machine = self.machine;
        self.step(symbol)
            .iter()
            .map(move |&id| &machine.records[id])
    }

    fn step(&mut self, symbol: S) -> &'a [usize] {
        let machine = self.machine;
        let code = symbol.code();

        self.current = loop {
            match machine.goto(self.current, code) {
                Some(state) => break state,
                None => self.current = machine.failure[self.current as usize],
            }
        };

        machine.output_ids(self.current)
    }
}

/// Iterator returned by [`Machine::find_iter`].
#[derive(Debug)]
pub struct Matches<'a, I, S, D> {
    cursor: MachineSearch<'a, S, D>,
    symbols: std::iter::Enumerate<I>,
    pending: std::slice::Iter<'a, usize>,
    end: usize,
}

impl<'a, I, S, D> Iterator for Matches<'a, I, S, D>
where
    I: Iterator<Item = S>,
    S: Symbol,
{
    type Item = Match<'a, S, D>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(&id) = self.pending.next() {
                let machine = self.cursor.machine;
                let record = &machine.records[id];
                return Some(Match::new(self.end + 1 - record.pattern.len(), record));
            }

            let (pos, symbol) = self.symbols.next()?;
            self.end = pos;
            self.pending = self.cursor.step(symbol).iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrieError;

    fn words<'a, S, D>(matches: &[Match<'a, S, D>]) -> Vec<(String, usize)>
    where
        S: Symbol + ToString,
    {
        matches
            .iter()
            .map(|m| (m.word.iter().map(S::to_string).collect(), m.position))
            .collect()
    }

    fn owned(pairs: &[(&str, usize)]) -> Vec<(String, usize)> {
        pairs.iter().map(|&(w, p)| (w.to_string(), p)).collect()
    }

    /// Every (keyword, start) found by brute force, ordered like the machine.
    fn naive(keywords: &[&str], content: &str) -> Vec<(String, usize)> {
        let content: Vec<char> = content.chars().collect();
        let mut found = Vec::new();

        for end in 1..=content.len() {
            let mut here: Vec<&str> = keywords
                .iter()
                .copied()
                .filter(|k| {
                    let k: Vec<char> = k.chars().collect();
                    k.len() <= end && content[end - k.len()..end] == k[..]
                })
                .collect();
            here.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
            here.dedup();
            found.extend(here.into_iter().map(|k| (k.to_string(), end - k.chars().count())));
        }

        found
    }

    #[test]
    fn test_ushers_reference_scenario() {
        let machine = Machine::build(["he", "she", "his", "hers"]).unwrap();
        let matches = machine.search("ushers", false);

        assert_eq!(
            words(&matches),
            owned(&[("she", 1), ("he", 2), ("hers", 2)])
        );
    }

    #[test]
    fn test_stop_at_first_returns_head_of_full_scan() {
        let machine = Machine::build(["he", "she", "his", "hers"]).unwrap();
        let all = machine.search("ushers", false);
        let first = machine.search("ushers", true);

        assert_eq!(first.len(), 1);
        assert_eq!(first[0], all[0]);
        assert_eq!(words(&first), owned(&[("she", 1)]));
    }

    #[test]
    fn test_repeated_searches_are_identical() {
        let machine = Machine::build(["a", "ab", "bab", "bc", "bca", "c", "caa"]).unwrap();

        let first = machine.search("abccab", false);
        for _ in 0..3 {
            assert_eq!(machine.search("abccab", false), first);
        }
    }

    #[test]
    fn test_every_keyword_found_at_zero() {
        let keywords = ["he", "she", "his", "hers", "h", "中文", "文"];
        let machine = Machine::build(keywords).unwrap();

        for keyword in keywords {
            let matches = machine.search(keyword, false);
            assert!(
                matches
                    .iter()
                    .any(|m| m.position == 0 && m.word == keyword.to_symbols()),
                "{keyword}"
            );
        }
    }

    #[test]
    fn test_every_keyword_is_terminal() {
        let keywords = ["ab", "abc", "bc", "c"];
        let machine = Machine::build(keywords).unwrap();

        for keyword in keywords {
            let mut state = ROOT_STATE;
            for c in keyword.chars() {
                state = machine.goto(state, c as u32).unwrap();
            }
            let own = machine.outputs(state).next().unwrap();
            assert_eq!(own.pattern(), keyword.to_symbols().as_slice());
        }
    }

    #[test]
    fn test_exact_match_is_whole_input_only() {
        let machine = Machine::build(["cat"]).unwrap();

        assert!(machine.exact_match("category").is_none());
        assert_eq!(words(&machine.search("category", false)), owned(&[("cat", 0)]));

        let hit = machine.exact_match("cat").unwrap();
        assert_eq!(hit.position, 0);
        assert_eq!(hit.end(), 3);
        assert_eq!(hit.word, ['c', 'a', 't']);
    }

    #[test]
    fn test_empty_dictionary_fails() {
        let err = Machine::<char>::build(Vec::<String>::new()).unwrap_err();
        assert_eq!(err, Error::EmptyDictionary);
    }

    #[test]
    fn test_trie_errors_pass_through() {
        let err = Machine::build(["ok", ""]).unwrap_err();
        assert_eq!(err, Error::TrieConstruction(TrieError::EmptyKeyword { index: 1 }));

        let err = MachineBuilder::<char>::new()
            .config(BuildConfig::default().with_max_keyword_length(2))
            .build(["abc"])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TrieConstruction(TrieError::KeywordTooLong { length: 3, max: 2 })
        ));
    }

    #[test]
    fn test_payloads_follow_their_keyword() {
        let machine = MachineBuilder::new()
            .payload("he", 1)
            .payload("hers", 4)
            .payload("hers", 40)
            .payload("nobody", 0)
            .build(["he", "she", "his", "hers"])
            .unwrap();

        let found: Vec<_> = machine
            .search("ushers", false)
            .into_iter()
            .map(|m| (m.word.iter().collect::<String>(), m.payload.copied()))
            .collect();

        assert_eq!(
            found,
            vec![
                ("she".to_string(), None),
                ("he".to_string(), Some(1)),
                ("hers".to_string(), Some(40)),
            ]
        );
        assert_eq!(machine.exact_match("he").unwrap().payload, Some(&1));
        assert_eq!(machine.exact_match("she").unwrap().payload, None);
    }

    #[test]
    fn test_build_with_payload_map() {
        let mut payloads = HashMap::new();
        payloads.insert(vec![1u8, 2], "one-two");

        let machine = Machine::build_with_payloads([vec![1u8, 2], vec![2u8]], payloads).unwrap();
        let matches = machine.search(&[0u8, 1, 2, 2][..], false);

        let found: Vec<_> = matches.iter().map(|m| (m.position, m.payload)).collect();
        assert_eq!(found, vec![(1, Some(&"one-two")), (2, None), (3, None)]);
    }

    #[test]
    fn test_duplicate_keywords_report_once() {
        let machine = Machine::build(["ab", "ab", "b"]).unwrap();

        assert_eq!(machine.patterns().len(), 2);
        assert_eq!(
            words(&machine.search("ab", false)),
            owned(&[("ab", 0), ("b", 1)])
        );
    }

    #[test]
    fn test_failure_links_are_shallower() {
        let keywords = ["abcd", "bcd", "cd", "d", "bca", "ca", "aab"];
        let machine = Machine::build(keywords).unwrap();
        let (_, linked) = DoubleArrayTrie::build(
            &keywords.iter().map(|k| k.to_symbols()).collect::<Vec<_>>(),
            &BuildConfig::default(),
        )
        .unwrap();

        let depth: HashMap<State, usize> = (0..linked.len())
            .map(|i| (linked.node(i).state(), linked.node(i).depth()))
            .collect();

        for (&state, &d) in &depth {
            if state == ROOT_STATE {
                continue;
            }
            let failure = machine.failure(state).unwrap();
            assert!(depth[&failure] < d, "state {state} fails to {failure}");
        }
    }

    #[test]
    fn test_goto_root_swallows_unknown_symbols() {
        let machine = Machine::build(["ab"]).unwrap();
        let a = machine.goto(ROOT_STATE, 'a' as u32).unwrap();

        assert_eq!(machine.goto(ROOT_STATE, 'z' as u32), Some(ROOT_STATE));
        assert_eq!(machine.goto(ROOT_STATE, u32::MAX), Some(ROOT_STATE));
        assert_eq!(machine.goto(a, 'z' as u32), None);
        assert_eq!(machine.goto(a, u32::MAX), None);
        assert!(machine.goto(a, 'b' as u32).is_some());
    }

    #[test]
    fn test_empty_content_yields_nothing() {
        let machine = Machine::build(["a"]).unwrap();

        assert!(machine.search("", false).is_empty());
        assert!(machine.exact_match("").is_none());
    }

    #[test]
    fn test_cursor_streams_across_chunks() {
        let machine = Machine::build(["hers", "she"]).unwrap();
        let mut cursor = machine.cursor();
        let mut found = Vec::new();

        for chunk in ["us", "he", "rs"] {
            for c in chunk.chars() {
                found.extend(cursor.next(c).map(|r| r.pattern().iter().collect::<String>()));
            }
        }
        assert_eq!(found, vec!["she", "hers"]);

        cursor.reset();
        assert_eq!(cursor.state(), ROOT_STATE);
    }

    #[test]
    fn test_matches_agree_with_naive_scan() {
        let keywords = ["a", "ab", "ba", "aab", "bab", "bb", "abba"];
        let machine = Machine::build(keywords).unwrap();

        // Every string over {a, b} up to length 7.
        for len in 0..=7 {
            for bits in 0..(1u32 << len) {
                let content: String = (0..len)
                    .map(|i| if bits >> i & 1 == 1 { 'b' } else { 'a' })
                    .collect();

                let found = words(&machine.search(content.as_str(), false));
                assert_eq!(found, naive(&keywords, &content), "{content}");

                let lazy: Vec<_> = machine.find_iter(content.chars()).collect();
                assert_eq!(lazy, machine.search(content.as_str(), false));
            }
        }
    }

    #[test]
    fn test_machine_is_shareable_across_threads() {
        let machine = Machine::build(["he", "she", "his", "hers"]).unwrap();
        let expected = machine.search("ushers", false);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| assert_eq!(machine.search("ushers", false), expected));
            }
        });
    }
}
