//! Document tree for parsed WML.
//!
//! The document is an arena: a `StableDiGraph` owns every node, edges go
//! parent → child, and each node also records its parent's index. Nothing
//! is reference counted; dropping the `Document` drops the whole tree.
//! Attribute values are raw strings at this stage; typing happens in
//! [`crate::coerce`].

use crate::id::TagName;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use std::collections::BTreeMap;

// ─── Node ────────────────────────────────────────────────────────────────

/// One opened tag: `[name] ... [/name]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: TagName,
    /// Raw attribute values keyed by attribute name; last write wins.
    pub attributes: BTreeMap<String, String>,
    /// Index of the enclosing node; `None` only for the document root.
    pub parent: Option<NodeIndex>,
    /// Line of the opening tag (0 for the root).
    pub line: usize,
}

impl Node {
    pub fn new(name: TagName) -> Self {
        Self {
            name,
            attributes: BTreeMap::new(),
            parent: None,
            line: 0,
        }
    }

    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Set an attribute, returning the value it replaced.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.attributes.insert(key.into(), value.into())
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

// ─── Traversal ───────────────────────────────────────────────────────────

/// Two-phase visitor for [`Document::walk`].
///
/// `enter` runs before a node's children, `exit` after all of them, which
/// lets a consumer build nested output bottom-up with its own stack.
pub trait Visitor {
    type Error;

    fn enter(&mut self, doc: &Document, idx: NodeIndex) -> Result<(), Self::Error>;
    fn exit(&mut self, doc: &Document, idx: NodeIndex) -> Result<(), Self::Error>;
}

// ─── Document ────────────────────────────────────────────────────────────

/// A parsed document: an anonymous root whose children are the top-level
/// tags.
#[derive(Debug, Clone)]
pub struct Document {
    /// The underlying directed graph.
    pub graph: StableDiGraph<Node, ()>,

    /// The root node index.
    pub root: NodeIndex,
}

impl Document {
    /// Create an empty document holding only the root.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(Node::new(TagName::root()));
        Self { graph, root }
    }

    /// Add a node as the last child of `parent`. Returns the new index.
    pub fn add_node(&mut self, parent: NodeIndex, mut node: Node) -> NodeIndex {
        node.parent = Some(parent);
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        idx
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut Node {
        &mut self.graph[idx]
    }

    /// Parent index of a node (`None` for the root).
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph[idx].parent
    }

    /// Children of a node in document (insertion) order.
    ///
    /// Nodes are never removed, so `NodeIndex` order is creation order.
    /// Sorting keeps the result independent of how petgraph iterates its
    /// adjacency lists.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .collect();
        children.sort();
        children
    }

    /// Children of `idx` whose tag is `name`, in document order.
    pub fn find_children(&self, idx: NodeIndex, name: &str) -> Vec<NodeIndex> {
        let name = TagName::intern(name);
        self.children(idx)
            .into_iter()
            .filter(|&c| self.graph[c].name == name)
            .collect()
    }

    /// Total nodes, root included.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Pre-order traversal from the root. `visit` returns `false` to stop;
    /// the return value tells whether the walk ran to completion.
    pub fn pre_order<F>(&self, mut visit: F) -> bool
    where
        F: FnMut(NodeIndex, &Node) -> bool,
    {
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            if !visit(idx, &self.graph[idx]) {
                return false;
            }
            stack.extend(self.children(idx).into_iter().rev());
        }
        true
    }

    /// Depth-first walk from the root with enter/exit callbacks.
    /// Iterative, so deep documents cannot overflow the call stack.
    pub fn walk<V: Visitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        enum Step {
            Enter(NodeIndex),
            Exit(NodeIndex),
        }

        let mut stack = vec![Step::Enter(self.root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(idx) => {
                    visitor.enter(self, idx)?;
                    stack.push(Step::Exit(idx));
                    stack.extend(self.children(idx).into_iter().rev().map(Step::Enter));
                }
                Step::Exit(idx) => visitor.exit(self, idx)?,
            }
        }
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn sample() -> Document {
        let mut doc = Document::new();
        let tg = doc.add_node(doc.root, Node::new(TagName::intern("terrain_graphics")));
        let t1 = doc.add_node(tg, Node::new(TagName::intern("tile")));
        doc.add_node(tg, Node::new(TagName::intern("image")));
        doc.add_node(t1, Node::new(TagName::intern("image")));
        doc
    }

    #[test]
    fn document_basics() {
        let doc = sample();
        assert_eq!(doc.node_count(), 5);
        let top = doc.children(doc.root);
        assert_eq!(top.len(), 1);
        assert_eq!(doc.parent(top[0]), Some(doc.root));
        assert_eq!(doc.parent(doc.root), None);
        assert_eq!(doc.find_children(top[0], "image").len(), 1);
        assert_eq!(doc.find_children(top[0], "tile").len(), 1);
    }

    #[test]
    fn set_attr_overwrites() {
        let mut node = Node::new(TagName::intern("tile"));
        assert_eq!(node.set_attr("type", "Gg"), None);
        assert_eq!(node.set_attr("type", "Ww").as_deref(), Some("Gg"));
        assert_eq!(node.attr("type"), Some("Ww"));
    }

    #[test]
    fn pre_order_visits_in_document_order_and_stops_early() {
        let doc = sample();
        let mut names = Vec::new();
        assert!(doc.pre_order(|_, n| {
            names.push(n.name.as_str().to_string());
            true
        }));
        assert_eq!(names, ["", "terrain_graphics", "tile", "image", "image"]);

        let mut seen = 0;
        assert!(!doc.pre_order(|_, _| {
            seen += 1;
            seen < 2
        }));
        assert_eq!(seen, 2);
    }

    struct Trace(Vec<String>);

    impl Visitor for Trace {
        type Error = Infallible;

        fn enter(&mut self, doc: &Document, idx: NodeIndex) -> Result<(), Infallible> {
            self.0.push(format!("+{}", doc.node(idx).name));
            Ok(())
        }

        fn exit(&mut self, doc: &Document, idx: NodeIndex) -> Result<(), Infallible> {
            self.0.push(format!("-{}", doc.node(idx).name));
            Ok(())
        }
    }

    #[test]
    fn walk_brackets_children_between_enter_and_exit() {
        let doc = sample();
        let mut trace = Trace(Vec::new());
        doc.walk(&mut trace).unwrap();
        assert_eq!(
            trace.0,
            [
                "+",
                "+terrain_graphics",
                "+tile",
                "+image",
                "-image",
                "-tile",
                "+image",
                "-image",
                "-terrain_graphics",
                "-",
            ]
        );
    }
}
