use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// A thread-safe segment trie for route pattern matching.
///
/// Patterns and paths use `/` as the segment separator. Empty segments are
/// ignored, so `/users/`, `users` and `//users` are the same path.
///
/// Pattern segments:
/// - `users` matches the literal segment
/// - `:id` matches exactly one segment and captures it
/// - `*` (last segment only) matches one or more remaining segments and
///   captures them joined with `/`
///
/// Each pattern holds one value; inserting a pattern of the same shape again
/// replaces it. Parameter names are not part of the shape: `/:a` and `/:b`
/// occupy the same slot.
///
/// # Examples
///
/// ```ignore
/// let trie = RouteTrie::new();
/// trie.insert("/users/:id", 1);
/// trie.insert("/users/me", 2);
///
/// assert_eq!(trie.match_path("/users/me"), Some((2, vec![])));
/// assert_eq!(trie.match_path("/users/7"), Some((1, vec!["7".into()])));
/// ```
pub struct RouteTrie<T> {
    root: RwLock<TrieNode<T>>,
}

struct TrieNode<T> {
    /// Literal children, keyed by segment.
    children: HashMap<String, TrieNode<T>>,
    /// `:name` child: matches any one segment.
    param: Option<Box<TrieNode<T>>>,
    /// `*` child: matches the remaining segments.
    catch_all: Option<Box<TrieNode<T>>>,
    /// Value stored when a pattern terminates here.
    value: Option<T>,
}

impl<T> Default for TrieNode<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            param: None,
            catch_all: None,
            value: None,
        }
    }
}

/// One parsed pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
    CatchAll,
}

/// Split a pattern into segments.
///
/// A `*` that is not the last segment is a literal.
pub fn parse_pattern(pattern: &str) -> Vec<Segment<'_>> {
    let raw: Vec<&str> = split_segments(pattern).collect();
    let last = raw.len().saturating_sub(1);
    raw.iter()
        .enumerate()
        .map(|(i, seg)| match *seg {
            "*" if i == last => Segment::CatchAll,
            s if s.len() > 1 && s.starts_with(':') => Segment::Param(&s[1..]),
            s => Segment::Literal(s),
        })
        .collect()
}

/// Non-empty `/`-separated segments of a path.
pub fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl<T: Clone> RouteTrie<T> {
    /// Create a new empty trie.
    pub fn new() -> Self {
        Self {
            root: RwLock::new(TrieNode::default()),
        }
    }

    /// Insert a value at the given pattern, returning the value it replaced.
    pub fn insert(&self, pattern: &str, value: T) -> Option<T> {
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        root.insert(&parse_pattern(pattern), value)
    }

    /// Match a concrete path, returning the value and the captured segments
    /// in pattern order.
    ///
    /// Literal segments win over `:param`, which wins over `*`. A literal
    /// branch that dead-ends falls back to the parameter branch.
    pub fn match_path(&self, path: &str) -> Option<(T, Vec<String>)> {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        let segments: Vec<&str> = split_segments(path).collect();
        let mut captured = Vec::new();
        root.find(&segments, &mut captured)
            .map(|value| (value.clone(), captured))
    }

    /// Value stored at the exact pattern shape, without matching.
    pub fn get(&self, pattern: &str) -> Option<T> {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        root.lookup(&parse_pattern(pattern)).cloned()
    }

    /// Check if a value is stored at the exact pattern shape.
    pub fn has_pattern(&self, pattern: &str) -> bool {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        root.lookup(&parse_pattern(pattern)).is_some()
    }
}

impl<T: Clone> Default for RouteTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TrieNode<T> {
    fn insert(&mut self, pattern: &[Segment<'_>], value: T) -> Option<T> {
        let Some((first, rest)) = pattern.split_first() else {
            return self.value.replace(value);
        };
        let child = match first {
            Segment::Literal(seg) => self.children.entry(seg.to_string()).or_default(),
            Segment::Param(_) => self.param.get_or_insert_with(Box::default).as_mut(),
            Segment::CatchAll => self.catch_all.get_or_insert_with(Box::default).as_mut(),
        };
        child.insert(rest, value)
    }

    fn find(&self, segments: &[&str], captured: &mut Vec<String>) -> Option<&T> {
        let Some((first, rest)) = segments.split_first() else {
            return self.value.as_ref();
        };

        if let Some(child) = self.children.get(*first) {
            if let Some(value) = child.find(rest, captured) {
                return Some(value);
            }
        }

        if let Some(ref param) = self.param {
            captured.push((*first).to_string());
            if let Some(value) = param.find(rest, captured) {
                return Some(value);
            }
            captured.pop();
        }

        if let Some(value) = self.catch_all.as_ref().and_then(|c| c.value.as_ref()) {
            captured.push(segments.join("/"));
            return Some(value);
        }

        None
    }

    fn lookup(&self, pattern: &[Segment<'_>]) -> Option<&T> {
        let Some((first, rest)) = pattern.split_first() else {
            return self.value.as_ref();
        };
        match first {
            Segment::Literal(seg) => self.children.get(*seg)?.lookup(rest),
            Segment::Param(_) => self.param.as_ref()?.lookup(rest),
            Segment::CatchAll => self.catch_all.as_ref()?.lookup(rest),
        }
    }
}
