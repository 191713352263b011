//! Query/mutation/resolver handler trees
//!
//! Plugins contribute handlers under dotted paths ("catalog.products.create").
//! Trees from later-registered plugins deep-merge into the shared tree with
//! last-writer-wins semantics on leaf collisions.

use crate::context::HostContext;
use coral_core::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Async handler invoked with the shared context and caller-supplied arguments
pub type HandlerFn = Arc<dyn Fn(Arc<HostContext>, Value) -> BoxFuture<anyhow::Result<Value>> + Send + Sync>;

/// Wrap a plain async closure into a [`HandlerFn`]
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Arc<HostContext>, Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |ctx, args| Box::pin(f(ctx, args)))
}

#[derive(Clone)]
enum HandlerNode {
    Map(HashMap<String, HandlerNode>),
    Leaf(HandlerFn),
}

/// A deep-mergeable tree of named handlers
#[derive(Clone, Default)]
pub struct HandlerMap {
    root: HashMap<String, HandlerNode>,
}

impl HandlerMap {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handler under a dotted path, replacing anything already there
    pub fn insert(&mut self, path: &str, handler: HandlerFn) {
        let mut segments = path.split('.').peekable();
        let mut current = &mut self.root;

        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                current.insert(segment.to_string(), HandlerNode::Leaf(handler));
                return;
            }

            let entry = current
                .entry(segment.to_string())
                .and_modify(|node| {
                    if matches!(node, HandlerNode::Leaf(_)) {
                        *node = HandlerNode::Map(HashMap::new());
                    }
                })
                .or_insert_with(|| HandlerNode::Map(HashMap::new()));

            match entry {
                HandlerNode::Map(map) => current = map,
                HandlerNode::Leaf(_) => unreachable!("leaf replaced above"),
            }
        }
    }

    /// Look up a handler by dotted path
    pub fn get(&self, path: &str) -> Option<&HandlerFn> {
        let mut current = &self.root;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            match current.get(segment)? {
                HandlerNode::Leaf(handler) if segments.peek().is_none() => return Some(handler),
                HandlerNode::Map(map) if segments.peek().is_some() => current = map,
                _ => return None,
            }
        }
        None
    }

    /// Deep-merge `other` into this tree; on collision the incoming side wins
    pub fn merge(&mut self, other: HandlerMap) {
        merge_level(&mut self.root, other.root);
    }

    /// Number of handlers (leaves) in the tree
    pub fn len(&self) -> usize {
        count_leaves(&self.root)
    }

    /// Whether the tree holds no handlers
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn merge_level(base: &mut HashMap<String, HandlerNode>, incoming: HashMap<String, HandlerNode>) {
    use std::collections::hash_map::Entry;

    for (key, incoming_node) in incoming {
        match base.entry(key) {
            Entry::Occupied(mut occupied) => {
                let key_name = occupied.key().clone();
                match (occupied.get_mut(), incoming_node) {
                    (HandlerNode::Map(base_map), HandlerNode::Map(incoming_map)) => {
                        merge_level(base_map, incoming_map);
                    }
                    (existing, incoming_node) => {
                        trace!(key = %key_name, "Handler overwritten by later-registered plugin");
                        *existing = incoming_node;
                    }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(incoming_node);
            }
        }
    }
}

fn count_leaves(level: &HashMap<String, HandlerNode>) -> usize {
    level
        .values()
        .map(|node| match node {
            HandlerNode::Leaf(_) => 1,
            HandlerNode::Map(map) => count_leaves(map),
        })
        .sum()
}

impl fmt::Debug for HandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMap")
            .field("handlers", &self.len())
            .finish()
    }
}
