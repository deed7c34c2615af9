/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Pattern trie: a dotted-segment trie with AMQP-style `*`/`#`
//! wildcards, subscriber CRUD, matching, and codec-backed persistence.

use crate::error::{Error, Result};
use crate::varint::tagged;
use std::collections::HashSet;

const MAX_PATTERN_LEN: usize = 512;
const MAX_SUBSCRIBERS_PER_NODE: usize = 4096;
const MAGIC: &[u8; 4] = b"TRIE";
const VERSION: u8 = 1;

/// One registered listener on a terminal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Literal = 0,
    Star = 1,
    Hash = 2,
}

impl SegmentKind {
    fn of(segment: &str) -> Self {
        match segment {
            "*" => SegmentKind::Star,
            "#" => SegmentKind::Hash,
            _ => SegmentKind::Literal,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => SegmentKind::Literal,
            1 => SegmentKind::Star,
            2 => SegmentKind::Hash,
            _ => return Err(Error::invalid_input("trie: unknown segment kind")),
        })
    }
}

struct Node {
    segment: String,
    kind: SegmentKind,
    terminal: bool,
    subscribers: Vec<Subscriber>,
    children: Vec<Node>,
}

impl Node {
    fn root() -> Self {
        Self { segment: String::new(), kind: SegmentKind::Literal, terminal: false, subscribers: Vec::new(), children: Vec::new() }
    }

    fn leaf(segment: &str) -> Self {
        Self {
            kind: SegmentKind::of(segment),
            segment: segment.to_string(),
            terminal: false,
            subscribers: Vec::new(),
            children: Vec::new(),
        }
    }

    fn child_mut(&mut self, segment: &str) -> &mut Node {
        let kind = SegmentKind::of(segment);
        if let Some(pos) = self.children.iter().position(|c| c.kind == kind && c.segment == segment) {
            return &mut self.children[pos];
        }
        self.children.push(Node::leaf(segment));
        self.children.last_mut().unwrap()
    }

    fn find_child(&self, segment: &str) -> Option<&Node> {
        let kind = SegmentKind::of(segment);
        self.children.iter().find(|c| c.kind == kind && c.segment == segment)
    }

    fn find_child_mut(&mut self, segment: &str) -> Option<&mut Node> {
        let kind = SegmentKind::of(segment);
        self.children.iter_mut().find(|c| c.kind == kind && c.segment == segment)
    }

    fn count_nodes(&self) -> usize {
        1 + self.children.iter().map(Node::count_nodes).sum::<usize>()
    }

    fn count_subscribers(&self) -> usize {
        self.subscribers.len() + self.children.iter().map(Node::count_subscribers).sum::<usize>()
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        let flags = (self.terminal as u8) | ((self.kind as u8) << 1);
        out.push(flags);
        let mut buf = [0u8; 9];
        let w = tagged::put(&mut buf, self.segment.len() as u64) as usize;
        out.extend_from_slice(&buf[..w]);
        out.extend_from_slice(self.segment.as_bytes());

        let w = tagged::put(&mut buf, self.subscribers.len() as u64) as usize;
        out.extend_from_slice(&buf[..w]);
        for sub in &self.subscribers {
            let w = tagged::put(&mut buf, sub.id) as usize;
            out.extend_from_slice(&buf[..w]);
            let w = tagged::put(&mut buf, sub.name.len() as u64) as usize;
            out.extend_from_slice(&buf[..w]);
            out.extend_from_slice(sub.name.as_bytes());
        }

        let w = tagged::put(&mut buf, self.children.len() as u64) as usize;
        out.extend_from_slice(&buf[..w]);
        for child in &self.children {
            child.serialize_into(out);
        }
    }

    fn parse(src: &[u8], off: &mut usize) -> Result<Self> {
        let flags = *src.get(*off).ok_or_else(|| Error::invalid_input("trie: truncated node flags"))?;
        *off += 1;
        let terminal = flags & 1 != 0;
        let kind = SegmentKind::from_code((flags >> 1) & 0b11)?;

        let (seg_len, w) = tagged::get(&src[*off..])?;
        *off += w as usize;
        let seg_len = seg_len as usize;
        if src.len() < *off + seg_len {
            return Err(Error::invalid_input("trie: truncated segment"));
        }
        let segment = String::from_utf8(src[*off..*off + seg_len].to_vec()).map_err(|_| Error::invalid_input("trie: segment is not UTF-8"))?;
        *off += seg_len;

        let (sub_count, w) = tagged::get(&src[*off..])?;
        *off += w as usize;
        let mut subscribers = Vec::with_capacity(sub_count as usize);
        for _ in 0..sub_count {
            let (id, w) = tagged::get(&src[*off..])?;
            *off += w as usize;
            let (name_len, w) = tagged::get(&src[*off..])?;
            *off += w as usize;
            let name_len = name_len as usize;
            if src.len() < *off + name_len {
                return Err(Error::invalid_input("trie: truncated subscriber name"));
            }
            let name = String::from_utf8(src[*off..*off + name_len].to_vec()).map_err(|_| Error::invalid_input("trie: name is not UTF-8"))?;
            *off += name_len;
            subscribers.push(Subscriber { id, name });
        }

        let (child_count, w) = tagged::get(&src[*off..])?;
        *off += w as usize;
        let mut children = Vec::with_capacity(child_count as usize);
        for _ in 0..child_count {
            children.push(Node::parse(src, off)?);
        }

        Ok(Self { segment, kind, terminal, subscribers, children })
    }
}

fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(Error::invalid_input("trie: pattern must be non-empty"));
    }
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(Error::capacity_exceeded("trie: pattern exceeds maximum length"));
    }
    if !pattern.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '*' | '#' | '_' | '-')) {
        return Err(Error::invalid_input("trie: pattern contains an invalid character"));
    }
    Ok(())
}

/// A dotted-segment pub/sub routing trie.
pub struct Trie {
    root: Node,
    patterns: HashSet<String>,
}

impl Trie {
    #[must_use]
    pub fn new() -> Self {
        Self { root: Node::root(), patterns: HashSet::new() }
    }

    /// Registers `subscriber_id`/`name` on `pattern`, creating any
    /// missing trie nodes along the way.
    pub fn insert(&mut self, pattern: &str, subscriber_id: u64, name: &str) -> Result<()> {
        validate_pattern(pattern)?;
        let segments: Vec<&str> = pattern.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::invalid_input("trie: pattern has an empty segment"));
        }
        let mut node = &mut self.root;
        for segment in &segments {
            node = node.child_mut(segment);
        }
        if node.subscribers.len() >= MAX_SUBSCRIBERS_PER_NODE {
            return Err(Error::capacity_exceeded("trie: subscriber list is full"));
        }
        if !node.subscribers.iter().any(|s| s.id == subscriber_id) {
            node.subscribers.push(Subscriber { id: subscriber_id, name: name.to_string() });
        }
        node.terminal = true;
        self.patterns.insert(pattern.to_string());
        Ok(())
    }

    /// Alias for [`Trie::insert`].
    pub fn subscribe(&mut self, pattern: &str, subscriber_id: u64, name: &str) -> Result<()> {
        self.insert(pattern, subscriber_id, name)
    }

    /// Removes `subscriber_id` from `pattern`'s terminal node. The node
    /// structure is retained (lazy deletion) so the operation is
    /// `O(path length)`.
    pub fn remove(&mut self, pattern: &str, subscriber_id: u64) -> Result<()> {
        validate_pattern(pattern)?;
        let segments: Vec<&str> = pattern.split('.').collect();
        let mut node = &mut self.root;
        for segment in &segments {
            node = node.find_child_mut(segment).ok_or_else(|| Error::invalid_input("trie: pattern not found"))?;
        }
        let before = node.subscribers.len();
        node.subscribers.retain(|s| s.id != subscriber_id);
        if node.subscribers.len() == before {
            return Err(Error::invalid_input("trie: subscriber not found on pattern"));
        }
        node.terminal = !node.subscribers.is_empty();
        Ok(())
    }

    /// Alias for [`Trie::remove`].
    pub fn unsubscribe(&mut self, pattern: &str, subscriber_id: u64) -> Result<()> {
        self.remove(pattern, subscriber_id)
    }

    /// Matches `input` against every registered pattern, returning the
    /// union of matched subscribers, deduplicated by id.
    pub fn match_input(&self, input: &str) -> Result<Vec<Subscriber>> {
        if input.is_empty() {
            return Err(Error::invalid_input("trie: match input must be non-empty"));
        }
        let segments: Vec<&str> = input.split('.').collect();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        Self::match_rec(&self.root, &segments, 0, &mut seen, &mut out);
        Ok(out)
    }

    fn match_rec(node: &Node, segments: &[&str], i: usize, seen: &mut HashSet<u64>, out: &mut Vec<Subscriber>) {
        if i == segments.len() {
            if node.terminal {
                for sub in &node.subscribers {
                    if seen.insert(sub.id) {
                        out.push(sub.clone());
                    }
                }
            }
            return;
        }
        for child in &node.children {
            match child.kind {
                SegmentKind::Literal => {
                    if child.segment == segments[i] {
                        Self::match_rec(child, segments, i + 1, seen, out);
                    }
                }
                SegmentKind::Star => {
                    Self::match_rec(child, segments, i + 1, seen, out);
                }
                SegmentKind::Hash => {
                    Self::match_rec(child, segments, i, seen, out);
                    for j in i..segments.len() {
                        Self::match_rec(child, segments, j + 1, seen, out);
                    }
                }
            }
        }
    }

    /// Lists every registered pattern and its current subscribers.
    #[must_use]
    pub fn list(&self) -> Vec<(String, Vec<Subscriber>)> {
        let mut out = Vec::new();
        Self::list_rec(&self.root, String::new(), &mut out);
        out
    }

    fn list_rec(node: &Node, prefix: String, out: &mut Vec<(String, Vec<Subscriber>)>) {
        if node.terminal && !prefix.is_empty() {
            out.push((prefix.clone(), node.subscribers.clone()));
        }
        for child in &node.children {
            let next = if prefix.is_empty() { child.segment.clone() } else { format!("{prefix}.{}", child.segment) };
            Self::list_rec(child, next, out);
        }
    }

    /// `(pattern_count, node_count, subscriber_count)`.
    #[must_use]
    pub fn stats(&self) -> (usize, usize, usize) {
        (self.patterns.len(), self.root.count_nodes(), self.root.count_subscribers())
    }

    /// Serializes as `"TRIE" || version || tagged(patterns) ||
    /// tagged(nodes) || tagged(subscribers) || root_node`.
    #[must_use]
    pub fn save(&self) -> Vec<u8> {
        let (pattern_count, node_count, subscriber_count) = self.stats();
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        let mut buf = [0u8; 9];
        let w = tagged::put(&mut buf, pattern_count as u64) as usize;
        out.extend_from_slice(&buf[..w]);
        let w = tagged::put(&mut buf, node_count as u64) as usize;
        out.extend_from_slice(&buf[..w]);
        let w = tagged::put(&mut buf, subscriber_count as u64) as usize;
        out.extend_from_slice(&buf[..w]);
        self.root.serialize_into(&mut out);
        out
    }

    /// Loads a trie saved with [`Trie::save`], rejecting any stream
    /// whose magic, version, or decoded counts disagree.
    pub fn load(src: &[u8]) -> Result<Self> {
        if src.len() < 5 || &src[0..4] != MAGIC {
            return Err(Error::invalid_input("trie: bad magic"));
        }
        if src[4] != VERSION {
            return Err(Error::invalid_input("trie: unsupported version"));
        }
        let mut off = 5;
        let (pattern_count, w) = tagged::get(&src[off..])?;
        off += w as usize;
        let (node_count, w) = tagged::get(&src[off..])?;
        off += w as usize;
        let (subscriber_count, w) = tagged::get(&src[off..])?;
        off += w as usize;

        let root = Node::parse(src, &mut off)?;
        if root.count_nodes() as u64 != node_count {
            return Err(Error::invalid_input("trie: node count mismatch"));
        }
        if root.count_subscribers() as u64 != subscriber_count {
            return Err(Error::invalid_input("trie: subscriber count mismatch"));
        }

        let mut patterns = HashSet::new();
        Self::collect_patterns(&root, String::new(), &mut patterns);
        if patterns.len() as u64 != pattern_count {
            return Err(Error::invalid_input("trie: pattern count mismatch"));
        }
        Ok(Self { root, patterns })
    }

    fn collect_patterns(node: &Node, prefix: String, out: &mut HashSet<String>) {
        if node.terminal && !prefix.is_empty() {
            out.insert(prefix.clone());
        }
        for child in &node.children {
            let next = if prefix.is_empty() { child.segment.clone() } else { format!("{prefix}.{}", child.segment) };
            Self::collect_patterns(child, next, out);
        }
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_matches_exact_input_only() {
        let mut t = Trie::new();
        t.insert("stock.aapl", 1, "alice").unwrap();
        assert_eq!(t.match_input("stock.aapl").unwrap().len(), 1);
        assert!(t.match_input("stock.goog").unwrap().is_empty());
    }

    #[test]
    fn scenario_wildcard_match() {
        let mut t = Trie::new();
        t.insert("stock.*.aapl", 1, "a").unwrap();
        t.insert("stock.#", 2, "b").unwrap();
        t.insert("stock.nasdaq.aapl", 3, "c").unwrap();

        let mut ids: Vec<u64> = t.match_input("stock.nasdaq.aapl").unwrap().into_iter().map(|s| s.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);

        let ids2: Vec<u64> = t.match_input("stock.nasdaq.aapl.trade").unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids2, vec![2]);
    }

    #[test]
    fn scenario_trie_roundtrip_is_deterministic() {
        let mut t = Trie::new();
        t.insert("stock.nasdaq.aapl", 1, "a").unwrap();
        t.insert("stock.*.goog", 2, "b").unwrap();
        t.insert("forex.#", 3, "c").unwrap();
        t.insert("forex.#", 4, "d").unwrap();

        let save1 = t.save();
        let save2 = t.save();
        assert_eq!(save1, save2);

        let loaded = Trie::load(&save1).unwrap();
        assert_eq!(loaded.stats(), t.stats());
        let ids: Vec<u64> = loaded.match_input("forex.usd").unwrap().into_iter().map(|s| s.id).collect();
        let mut ids = ids;
        ids.sort_unstable();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn remove_clears_terminal_when_empty() {
        let mut t = Trie::new();
        t.insert("a.b", 1, "x").unwrap();
        t.remove("a.b", 1).unwrap();
        assert!(t.match_input("a.b").unwrap().is_empty());
    }

    #[test]
    fn remove_missing_subscriber_is_rejected() {
        let mut t = Trie::new();
        t.insert("a.b", 1, "x").unwrap();
        assert!(t.remove("a.b", 999).is_err());
        assert!(t.remove("a.c", 1).is_err());
    }

    #[test]
    fn rejects_invalid_patterns() {
        let mut t = Trie::new();
        assert!(t.insert("", 1, "x").is_err());
        assert!(t.insert("a..b", 1, "x").is_err());
        assert!(t.insert("a b", 1, "x").is_err());
    }
}
