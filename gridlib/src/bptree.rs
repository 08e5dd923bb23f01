//! B+Tree keyed by timestamps, used to store the consumption history.
//!
//! Nodes live in an arena (`Vec`) and refer to each other by index, which lets every leaf keep
//! a `next` link to its right sibling. Range scans locate the first candidate leaf once and then
//! follow that chain.
//!
//! Duplicate keys are kept. A new entry is always placed after the existing entries with the same
//! key, so equal keys come back in insertion order.
use crate::types::Timestamp;
use crate::{GridError, Result};

use serde::{Deserialize, Serialize};


type NodeIndex = usize;

#[derive(Clone, Debug)]
enum NodeKind<V> {
    Leaf {
        values: Vec<V>,
        next: Option<NodeIndex>,
    },
    Internal {
        children: Vec<NodeIndex>,
    },
}

#[derive(Clone, Debug)]
struct Node<V> {
    keys: Vec<Timestamp>,
    kind: NodeKind<V>,
}

impl<V> Node<V> {
    fn leaf() -> Self {
        Node {
            keys: Vec::new(),
            kind: NodeKind::Leaf {
                values: Vec::new(),
                next: None,
            },
        }
    }

    fn internal(children: Vec<NodeIndex>) -> Self {
        Node {
            keys: Vec::new(),
            kind: NodeKind::Internal { children },
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}

/// A key and its value, as returned by range queries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeyValue<V> {
    pub key: Timestamp,
    pub value: V,
}

/// Serialized form of a node. Leaves carry `values`, internal nodes carry `children`.
/// Leaf links are not stored; they are rebuilt on load.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode<V> {
    pub is_leaf: bool,
    pub keys: Vec<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<V>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SerializedNode<V>>>,
}

/// Serialized form of a whole tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BPlusTreeSnapshot<V> {
    pub order: usize,
    pub root: Option<SerializedNode<V>>,
}

/// Nested view of the tree for visualization.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeStructureNode<V> {
    pub is_leaf: bool,
    pub keys: Vec<Timestamp>,
    pub key_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<KeyValue<V>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeStructureNode<V>>>,
}

/// Summary of the tree shape.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub order: usize,
    /// Keys stored in all nodes, separators included.
    pub total_keys: usize,
    pub height: usize,
    pub leaf_count: usize,
}

/// Order-preserving index from timestamps to values.
#[derive(Clone, Debug)]
pub struct BPlusTree<V> {
    order: usize,
    root: Option<NodeIndex>,
    nodes: Vec<Node<V>>,
}

impl<V> BPlusTree<V> {
    /// Creates an empty tree whose root is an empty leaf.
    ///
    /// Nodes split once they hold `order` keys, so `order` must be at least 2.
    pub fn new(order: usize) -> Result<Self> {
        if order < 2 {
            return Err(GridError::InvalidOrder(order));
        }
        Ok(BPlusTree {
            order,
            root: Some(0),
            nodes: vec![Node::leaf()],
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of stored entries (leaf keys).
    pub fn len(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.is_leaf())
            .map(|node| node.keys.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn alloc(&mut self, node: Node<V>) -> NodeIndex {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Inserts an entry. Equal keys are not merged.
    pub fn insert(&mut self, key: Timestamp, value: V) {
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = self.alloc(Node::leaf());
                self.root = Some(root);
                root
            }
        };

        let root = if self.nodes[root].keys.len() >= self.order {
            // Grow by one level
            let new_root = self.alloc(Node::internal(vec![root]));
            self.split_child(new_root, 0);
            self.root = Some(new_root);
            new_root
        } else {
            root
        };

        self.insert_non_full(root, key, value);
    }

    fn insert_non_full(&mut self, mut index: NodeIndex, key: Timestamp, value: V) {
        loop {
            // Number of keys <= key. Equal keys go to the right so that duplicates keep their
            // insertion order.
            let node = &mut self.nodes[index];
            let mut position = node.keys.partition_point(|&k| k <= key);
            let child = match &mut node.kind {
                NodeKind::Leaf { values, .. } => {
                    node.keys.insert(position, key);
                    values.insert(position, value);
                    return;
                }
                NodeKind::Internal { children } => children[position],
            };

            let child = if self.nodes[child].keys.len() >= self.order {
                self.split_child(index, position);
                if self.nodes[index].keys[position] <= key {
                    position += 1;
                }
                match &self.nodes[index].kind {
                    NodeKind::Internal { children } => children[position],
                    NodeKind::Leaf { .. } => unreachable!("split parent is always internal"),
                }
            } else {
                child
            };
            index = child;
        }
    }

    /// Splits the full child at `position` of the internal node `parent`.
    ///
    /// Leaves copy their middle key up and keep it in the new right leaf. Internal nodes move
    /// their middle key up and drop it from both halves.
    fn split_child(&mut self, parent: NodeIndex, position: usize) {
        let child = match &self.nodes[parent].kind {
            NodeKind::Internal { children } => children[position],
            NodeKind::Leaf { .. } => return,
        };
        let mid = self.order / 2;
        let new_index = self.nodes.len();

        let node = &mut self.nodes[child];
        let (separator, sibling) = match &mut node.kind {
            NodeKind::Leaf { values, next } => {
                let right_keys = node.keys.split_off(mid);
                let right_values = values.split_off(mid);
                let separator = right_keys[0];
                let sibling = Node {
                    keys: right_keys,
                    kind: NodeKind::Leaf {
                        values: right_values,
                        next: next.replace(new_index),
                    },
                };
                (separator, sibling)
            }
            NodeKind::Internal { children } => {
                let separator = node.keys[mid];
                let right_keys = node.keys.split_off(mid + 1);
                node.keys.truncate(mid);
                let right_children = children.split_off(mid + 1);
                let sibling = Node {
                    keys: right_keys,
                    kind: NodeKind::Internal {
                        children: right_children,
                    },
                };
                (separator, sibling)
            }
        };

        let new_index = self.alloc(sibling);
        let parent = &mut self.nodes[parent];
        parent.keys.insert(position, separator);
        if let NodeKind::Internal { children } = &mut parent.kind {
            children.insert(position + 1, new_index);
        }
    }

    /// Returns the leftmost leaf that may contain `key`.
    fn find_leaf(&self, key: Timestamp) -> Option<NodeIndex> {
        let mut index = self.root?;
        loop {
            let node = &self.nodes[index];
            match &node.kind {
                NodeKind::Leaf { .. } => return Some(index),
                NodeKind::Internal { children } => {
                    let position = node.keys.partition_point(|&k| k < key);
                    index = *children.get(position)?;
                }
            }
        }
    }

    /// Iterates over the leaf chain starting at the leaf that may contain `from`.
    fn entries_from(&self, from: Timestamp) -> LeafChainIter<'_, V> {
        LeafChainIter {
            tree: self,
            leaf: self.find_leaf(from),
            position: 0,
        }
    }

    /// Returns the first (earliest inserted) value stored at `key`.
    pub fn search(&self, key: Timestamp) -> Option<&V> {
        self.entries_from(key)
            .skip_while(|(k, _)| *k < key)
            .take_while(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .next()
    }

    /// Returns every entry with `min <= key <= max` in ascending key order.
    pub fn range_query(&self, min: Timestamp, max: Timestamp) -> Vec<KeyValue<V>>
    where
        V: Clone,
    {
        self.entries_from(min)
            .skip_while(|(k, _)| *k < min)
            .take_while(|(k, _)| *k <= max)
            .map(|(key, value)| KeyValue {
                key,
                value: value.clone(),
            })
            .collect()
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            order: self.order,
            total_keys: 0,
            height: 0,
            leaf_count: 0,
        };
        if let Some(root) = self.root {
            self.collect_stats(root, 1, &mut stats);
        }
        stats
    }

    fn collect_stats(&self, index: NodeIndex, depth: usize, stats: &mut TreeStats) {
        let node = &self.nodes[index];
        stats.height = stats.height.max(depth);
        stats.total_keys += node.keys.len();
        match &node.kind {
            NodeKind::Leaf { .. } => stats.leaf_count += 1,
            NodeKind::Internal { children } => {
                for &child in children {
                    self.collect_stats(child, depth + 1, stats);
                }
            }
        }
    }

    /// Nested view of the tree, `None` if there is no root.
    pub fn tree_structure(&self) -> Option<TreeStructureNode<V>>
    where
        V: Clone,
    {
        self.root.map(|root| self.node_structure(root))
    }

    fn node_structure(&self, index: NodeIndex) -> TreeStructureNode<V>
    where
        V: Clone,
    {
        let node = &self.nodes[index];
        let (values, children) = match &node.kind {
            NodeKind::Leaf { values, .. } => (
                Some(
                    node.keys
                        .iter()
                        .zip(values.iter())
                        .map(|(&key, value)| KeyValue {
                            key,
                            value: value.clone(),
                        })
                        .collect(),
                ),
                None,
            ),
            NodeKind::Internal { children } => (
                None,
                Some(children.iter().map(|&c| self.node_structure(c)).collect()),
            ),
        };
        TreeStructureNode {
            is_leaf: node.is_leaf(),
            keys: node.keys.clone(),
            key_count: node.keys.len(),
            values,
            children,
        }
    }

    pub fn serialize(&self) -> BPlusTreeSnapshot<V>
    where
        V: Clone,
    {
        BPlusTreeSnapshot {
            order: self.order,
            root: self.root.map(|root| self.serialize_node(root)),
        }
    }

    fn serialize_node(&self, index: NodeIndex) -> SerializedNode<V>
    where
        V: Clone,
    {
        let node = &self.nodes[index];
        match &node.kind {
            NodeKind::Leaf { values, .. } => SerializedNode {
                is_leaf: true,
                keys: node.keys.clone(),
                values: Some(values.clone()),
                children: None,
            },
            NodeKind::Internal { children } => SerializedNode {
                is_leaf: false,
                keys: node.keys.clone(),
                values: None,
                children: Some(children.iter().map(|&c| self.serialize_node(c)).collect()),
            },
        }
    }

    /// Rebuilds a tree from its serialized form and relinks the leaf chain.
    pub fn deserialize(snapshot: BPlusTreeSnapshot<V>) -> Result<Self> {
        let mut tree = BPlusTree::new(snapshot.order)?;
        tree.nodes.clear();
        tree.root = match snapshot.root {
            Some(root) => Some(tree.load_node(root)?),
            None => None,
        };

        let mut leaves = Vec::new();
        if let Some(root) = tree.root {
            tree.collect_leaves(root, &mut leaves);
        }
        for pair in leaves.windows(2) {
            if let NodeKind::Leaf { next, .. } = &mut tree.nodes[pair[0]].kind {
                *next = Some(pair[1]);
            }
        }
        Ok(tree)
    }

    fn load_node(&mut self, node: SerializedNode<V>) -> Result<NodeIndex> {
        let SerializedNode {
            is_leaf,
            keys,
            values,
            children,
        } = node;
        if keys.windows(2).any(|w| w[0] > w[1]) {
            return Err(GridError::InvalidSnapshot("node keys are not sorted".into()));
        }
        if is_leaf {
            let values = values.unwrap_or_default();
            if values.len() != keys.len() {
                return Err(GridError::InvalidSnapshot(format!(
                    "leaf has {} keys but {} values",
                    keys.len(),
                    values.len()
                )));
            }
            Ok(self.alloc(Node {
                keys,
                kind: NodeKind::Leaf { values, next: None },
            }))
        } else {
            let children = children.unwrap_or_default();
            if children.len() != keys.len() + 1 {
                return Err(GridError::InvalidSnapshot(format!(
                    "internal node has {} keys but {} children",
                    keys.len(),
                    children.len()
                )));
            }
            let children = children
                .into_iter()
                .map(|child| self.load_node(child))
                .collect::<Result<Vec<NodeIndex>>>()?;
            Ok(self.alloc(Node {
                keys,
                kind: NodeKind::Internal { children },
            }))
        }
    }

    fn collect_leaves(&self, index: NodeIndex, leaves: &mut Vec<NodeIndex>) {
        match &self.nodes[index].kind {
            NodeKind::Leaf { .. } => leaves.push(index),
            NodeKind::Internal { children } => {
                for &child in children {
                    self.collect_leaves(child, leaves);
                }
            }
        }
    }
}

/// Walks the leaf chain entry by entry.
struct LeafChainIter<'a, V> {
    tree: &'a BPlusTree<V>,
    leaf: Option<NodeIndex>,
    position: usize,
}

impl<'a, V> Iterator for LeafChainIter<'a, V> {
    type Item = (Timestamp, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = &self.tree.nodes[self.leaf?];
            let (values, next) = match &node.kind {
                NodeKind::Leaf { values, next } => (values, *next),
                NodeKind::Internal { .. } => return None,
            };
            if self.position < node.keys.len() {
                let item = (node.keys[self.position], &values[self.position]);
                self.position += 1;
                return Some(item);
            }
            self.leaf = next;
            self.position = 0;
        }
    }
}
