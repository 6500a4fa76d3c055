use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::Bfs;
use petgraph::{Directed, Direction};
use hybrid_protocol::{Sentence, TokenId};
use std::collections::HashMap;

use crate::error::OracleError;

/// The gold dependency tree of a sentence, head -> dependent.
pub struct GoldTree {
    graph: Graph<TokenId, (), Directed>,
    index_map: HashMap<TokenId, NodeIndex>,
}

impl GoldTree {
    /// Builds the tree and checks it is one connected, acyclic structure hanging off the root.
    pub fn from_sentence(sentence: &Sentence) -> Result<Self, OracleError> {
        let mut graph = Graph::new();
        let mut index_map = HashMap::new();
        for token in sentence.tokens() {
            let idx = graph.add_node(token.id);
            index_map.insert(token.id, idx);
        }

        for token in sentence.words() {
            let head = token.head.ok_or(OracleError::Unannotated(token.id))?;
            let from = *index_map
                .get(&head)
                .ok_or(OracleError::UnknownHead { token: token.id, head })?;
            let to = index_map[&token.id];
            graph.add_edge(from, to, ());
        }

        if is_cyclic_directed(&graph) {
            return Err(OracleError::Cycle);
        }

        let tree = Self { graph, index_map };
        let root = tree.index_map[&TokenId::ROOT];
        let mut reached = vec![false; sentence.tokens().len()];
        let mut bfs = Bfs::new(&tree.graph, root);
        while let Some(idx) = bfs.next(&tree.graph) {
            reached[tree.graph[idx].index()] = true;
        }
        if let Some(lost) = reached.iter().position(|r| !r) {
            return Err(OracleError::Unreachable(TokenId(lost as u32)));
        }

        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Gold dependents of `id`, ascending.
    pub fn children(&self, id: TokenId) -> Vec<TokenId> {
        let mut out: Vec<TokenId> = match self.index_map.get(&id) {
            Some(idx) => self
                .graph
                .neighbors_directed(*idx, Direction::Outgoing)
                .map(|n| self.graph[n])
                .collect(),
            None => Vec::new(),
        };
        out.sort();
        out
    }

    /// In-order traversal of the tree from the root: left dependents, the head,
    /// then right dependents. Indexed by token id.
    pub fn projective_order(&self) -> Vec<usize> {
        let mut sequence = Vec::with_capacity(self.len());
        self.inorder(TokenId::ROOT, &mut sequence);

        let mut order = vec![0; self.len()];
        for (position, id) in sequence.into_iter().enumerate() {
            order[id.index()] = position;
        }
        order
    }

    fn inorder(&self, id: TokenId, out: &mut Vec<TokenId>) {
        let children = self.children(id);
        let (left, right): (Vec<TokenId>, Vec<TokenId>) =
            children.into_iter().partition(|c| *c < id);
        for child in left {
            self.inorder(child, out);
        }
        out.push(id);
        for child in right {
            self.inorder(child, out);
        }
    }
}

/// True when the gold tree can be built by attaching adjacent subtrees only,
/// i.e. it has no crossing arcs.
///
/// Repeatedly looks for two neighbouring roots of the forest where one is the
/// gold head of the other and the dependent has collected all of its own
/// dependents, and attaches them.
pub fn is_projective(sentence: &Sentence) -> bool {
    let tokens = sentence.tokens();
    let mut forest: Vec<TokenId> = tokens.iter().map(|t| t.id).collect();
    let mut unassigned: Vec<usize> = tokens
        .iter()
        .map(|t| sentence.words().iter().filter(|w| w.head == Some(t.id)).count())
        .collect();
    let head_of = |id: TokenId| tokens[id.index()].head;

    for _ in 0..tokens.len() {
        for i in 0..forest.len().saturating_sub(1) {
            let (a, b) = (forest[i], forest[i + 1]);
            if head_of(a) == Some(b) && unassigned[a.index()] == 0 {
                unassigned[b.index()] -= 1;
                forest.remove(i);
                break;
            }
            if head_of(b) == Some(a) && unassigned[b.index()] == 0 {
                unassigned[a.index()] -= 1;
                forest.remove(i + 1);
                break;
            }
        }
    }

    forest.len() == 1
}
