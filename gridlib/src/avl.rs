//! Height-balanced binary search tree.
//!
//! Used by the network graph to index nodes by utilization. The tree only grows: the graph
//! discards and rebuilds it instead of deleting entries.
use std::cmp::Ordering;

type Link<K, V> = Option<Box<AvlNode<K, V>>>;

/// A single entry of an [`AvlTree`].
#[derive(Clone, Debug)]
pub struct AvlNode<K, V> {
    key: K,
    value: V,
    height: usize,
    left: Link<K, V>,
    right: Link<K, V>,
}

impl<K, V> AvlNode<K, V> {
    fn new(key: K, value: V) -> Self {
        AvlNode {
            key,
            value,
            height: 1,
            left: None,
            right: None,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn left(&self) -> Option<&AvlNode<K, V>> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&AvlNode<K, V>> {
        self.right.as_deref()
    }

    /// Height of the subtree rooted at this node. Leaves have height 1.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Height of the left subtree minus the height of the right subtree.
    pub fn balance_factor(&self) -> isize {
        height(&self.left) as isize - height(&self.right) as isize
    }

    fn update_height(&mut self) {
        self.height = 1 + std::cmp::max(height(&self.left), height(&self.right));
    }
}

fn height<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.height)
}

/// Rotates the subtree to the right. The left child becomes the new subtree root.
fn rotate_right<K, V>(mut y: Box<AvlNode<K, V>>) -> Box<AvlNode<K, V>> {
    let mut x = match y.left.take() {
        Some(x) => x,
        None => return y,
    };
    y.left = x.right.take();
    y.update_height();
    x.right = Some(y);
    x.update_height();
    x
}

/// Rotates the subtree to the left. The right child becomes the new subtree root.
fn rotate_left<K, V>(mut x: Box<AvlNode<K, V>>) -> Box<AvlNode<K, V>> {
    let mut y = match x.right.take() {
        Some(y) => y,
        None => return x,
    };
    x.right = y.left.take();
    x.update_height();
    y.left = Some(x);
    y.update_height();
    y
}

/// Restores the balance of a subtree whose children are balanced and differ in height by at
/// most 2.
fn rebalance<K, V>(mut node: Box<AvlNode<K, V>>) -> Box<AvlNode<K, V>> {
    node.update_height();
    let balance = node.balance_factor();
    if balance > 1 {
        // Left-right case
        if node.left.as_ref().map_or(0, |l| l.balance_factor()) < 0 {
            node.left = node.left.take().map(rotate_left);
        }
        rotate_right(node)
    } else if balance < -1 {
        // Right-left case
        if node.right.as_ref().map_or(0, |r| r.balance_factor()) > 0 {
            node.right = node.right.take().map(rotate_right);
        }
        rotate_left(node)
    } else {
        node
    }
}

fn insert_node<K: Ord, V>(
    link: Link<K, V>,
    key: K,
    value: V,
    replaced: &mut Option<V>,
) -> Box<AvlNode<K, V>> {
    let mut node = match link {
        Some(node) => node,
        None => return Box::new(AvlNode::new(key, value)),
    };
    match key.cmp(&node.key) {
        Ordering::Less => {
            node.left = Some(insert_node(node.left.take(), key, value, replaced));
        }
        Ordering::Greater => {
            node.right = Some(insert_node(node.right.take(), key, value, replaced));
        }
        Ordering::Equal => {
            // Existing key: overwrite, shape is unchanged.
            *replaced = Some(std::mem::replace(&mut node.value, value));
            return node;
        }
    }
    rebalance(node)
}

/// AVL tree mapping ordered keys to values.
#[derive(Clone, Debug)]
pub struct AvlTree<K, V> {
    root: Link<K, V>,
    len: usize,
}

impl<K, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        AvlTree { root: None, len: 0 }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` at `key`, rebalancing with rotations on the way up.
    ///
    /// If `key` is already present its value is overwritten and the old value is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let mut replaced = None;
        self.root = Some(insert_node(self.root.take(), key, value, &mut replaced));
        if replaced.is_none() {
            self.len += 1;
        }
        replaced
    }

    /// Returns the value stored at `key`, if any.
    pub fn search(&self, key: &K) -> Option<&V> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match key.cmp(&node.key) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            };
        }
        None
    }

    pub fn root(&self) -> Option<&AvlNode<K, V>> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree, 0 for an empty tree.
    pub fn height(&self) -> usize {
        height(&self.root)
    }

    /// In-order iterator over `(key, value)` pairs.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }
}

/// In-order iterator over an [`AvlTree`].
pub struct Iter<'a, K, V> {
    stack: Vec<&'a AvlNode<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut node: Option<&'a AvlNode<K, V>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some((&node.key, &node.value))
    }
}
