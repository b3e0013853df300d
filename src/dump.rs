use std::collections::BTreeMap;
use std::fmt::Write;

use crate::{Machine, State, Symbol, ROOT_STATE};

#[derive(Clone)]
struct AutomationDumpNode {
    node: String,
    failure: State,
    outputs: Vec<usize>,
}

#[derive(Clone)]
enum EdTarget {
    Goto(State),
    Failure(State),
}

type EdgeDesc = (State, EdTarget);

/// Snapshot of a machine's goto, failure and output tables.
pub struct AutomationDump {
    nodes: BTreeMap<State, AutomationDumpNode>,
    edges: Vec<EdgeDesc>,
    outputs: Vec<String>,
}

impl AutomationDump {
    pub fn create<S, D>(machine: &Machine<S, D>) -> Self
    where
        S: Symbol + ToString,
    {
        let outputs = machine
            .patterns()
            .iter()
            .map(|record| record.pattern().iter().map(S::to_string).collect())
            .collect();

        let node = |state: State| AutomationDumpNode {
            node: String::new(),
            failure: machine.failure(state).unwrap_or(ROOT_STATE),
            outputs: machine.output_ids(state).to_vec(),
        };

        let mut nodes = BTreeMap::new();
        nodes.insert(ROOT_STATE, node(ROOT_STATE));

        let mut edges = Vec::new();
        for (from, code, to) in machine.trie().transitions() {
            let mut to_node = node(to);
            to_node.node = S::from_code(code)
                .map(|symbol| symbol.to_string())
                .unwrap_or_else(|| format!("#{}", code));
            nodes.insert(to, to_node);
            edges.push((from, EdTarget::Goto(to)));
        }

        for (&state, node) in &nodes {
            if state != ROOT_STATE {
                edges.push((state, EdTarget::Failure(node.failure)));
            }
        }

        Self {
            nodes,
            edges,
            outputs,
        }
    }

    /// `state | failure` rows for every state but the root.
    pub fn failure_table(&self) -> String {
        let mut s = String::new();
        let rule = "+-----+-----+\n";

        s.push_str(rule);
        let _ = writeln!(s, "|{:>5}|{:>5}|", "index", "value");
        s.push_str(rule);
        for (state, node) in self.nodes.iter().filter(|(state, _)| **state != ROOT_STATE) {
            let _ = writeln!(s, "|{:>5}|{:>5}|", state, node.failure);
        }
        s.push_str(rule);

        s
    }

    /// `state | keywords` rows for every state with a non-empty output.
    pub fn output_table(&self) -> String {
        let mut s = String::new();
        let rule = "+-----+----------+\n";

        s.push_str(rule);
        let _ = writeln!(s, "|{:>5}|{:>10}|", "index", "value");
        s.push_str(rule);
        for (state, node) in self.nodes.iter().filter(|(_, n)| !n.outputs.is_empty()) {
            let value: String = node
                .outputs
                .iter()
                .map(|&output| format!(" {}", self.outputs[output]))
                .collect();
            let _ = writeln!(s, "|{:>5}|{:>10}|", state, value);
        }
        s.push_str(rule);

        s
    }
}

#[cfg(feature = "dot")]
mod dotdump {
    use std::io;

    use super::{AutomationDump, EdTarget};
    use crate::State;

    type Nd = State;
    type Ed = super::EdgeDesc;

    impl AutomationDump {
        pub fn to_dot(&self) -> io::Result<String> {
            let mut out = Vec::new();
            dot::render(self, &mut out)?;
            String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        }
    }

    impl<'a> dot::Labeller<'a, Nd, Ed> for AutomationDump {
        fn graph_id(&'a self) -> dot::Id<'a> {
            dot::Id::new("machine").unwrap()
        }

        fn node_id(&'a self, n: &Nd) -> dot::Id<'a> {
            dot::Id::new(format!("S{}", n)).unwrap()
        }

        fn node_label(&'a self, n: &Nd) -> dot::LabelText<'a> {
            let node = &self.nodes[n];
            let mut s = node.node.clone();

            if !node.outputs.is_empty() {
                s.push_str(r#"<font point-size="10">"#);

                for &output in &node.outputs {
                    s.push_str("<br/>");
                    s.push_str(&self.outputs[output]);
                }

                s.push_str("</font>");
            }

            if s.is_empty() {
                dot::LabelText::label("")
            } else {
                dot::LabelText::html(s)
            }
        }

        fn edge_style(&'a self, e: &Ed) -> dot::Style {
            match &e.1 {
                EdTarget::Goto(_) => dot::Style::Solid,
                EdTarget::Failure(_) => dot::Style::Dashed,
            }
        }
    }

    impl<'a> dot::GraphWalk<'a, Nd, Ed> for AutomationDump {
        fn nodes(&'a self) -> dot::Nodes<'a, Nd> {
            dot::Nodes::Owned(self.nodes.keys().copied().collect())
        }

        fn edges(&'a self) -> dot::Edges<'a, Ed> {
            dot::Edges::Borrowed(&self.edges)
        }

        fn source(&'a self, edge: &Ed) -> Nd {
            edge.0
        }

        fn target(&'a self, edge: &Ed) -> Nd {
            match &edge.1 {
                EdTarget::Goto(state) => *state,
                EdTarget::Failure(state) => *state,
            }
        }
    }
}
