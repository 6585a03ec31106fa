//! Ketama consistent hash ring.
//!
//! Every node owns `base_spots * weight` ticks on a 32-bit ring. A tick's
//! point is taken from the SHA-1 digest of `"<name>:<i>"`; a key maps to the
//! first tick at or after the key's own point, wrapping to the start of the
//! ring. Points are compatible with other ketama implementations that read
//! the last four digest bytes as a big-endian integer.

use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Tick {
    point: u32,
    node: Arc<str>,
}

/// A consistent hash ring.
///
/// Nodes are added with [`add_node`](Self::add_node), then the ring is
/// [`bake`](Self::bake)d before lookups. A baked ring is never modified in
/// place; to change membership build a new ring.
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    base_spots: usize,
    ticks: Vec<Tick>,
    len: usize,
}

impl HashRing {
    /// Create an empty ring with `base_spots` ticks per unit of weight.
    pub fn new(base_spots: usize) -> Self {
        Self {
            base_spots,
            ticks: Vec::new(),
            len: 0,
        }
    }

    /// Add `base_spots * weight` ticks for `name`.
    ///
    /// The ring must be baked again before the new ticks are visible.
    pub fn add_node(&mut self, name: &str, weight: usize) {
        let spots = self.base_spots * weight;
        let node: Arc<str> = Arc::from(name);

        self.ticks.reserve(spots);
        for i in 1..=spots {
            let point = hash_point(format!("{name}:{i}").as_bytes());
            self.ticks.push(Tick {
                point,
                node: node.clone(),
            });
        }
        self.len = 0;
    }

    /// Sort the ticks and make the ring available for lookups.
    ///
    /// Ticks with equal points are ordered by node name so the result does
    /// not depend on the order nodes were added.
    pub fn bake(&mut self) {
        self.ticks
            .sort_unstable_by(|a, b| a.point.cmp(&b.point).then_with(|| a.node.cmp(&b.node)));
        self.len = self.ticks.len();
    }

    /// Find the node owning `key`.
    ///
    /// Returns `None` when the ring has no ticks or has not been baked.
    pub fn hash(&self, key: &[u8]) -> Option<&str> {
        if self.len == 0 {
            return None;
        }

        let point = hash_point(key);
        let mut idx = self.ticks[..self.len].partition_point(|tick| tick.point < point);
        if idx == self.len {
            idx = 0;
        }

        Some(&self.ticks[idx].node)
    }

    /// Number of ticks visible to lookups.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base ticks per unit of weight.
    pub fn base_spots(&self) -> usize {
        self.base_spots
    }

    /// Tick count per node.
    pub fn nodes(&self) -> BTreeMap<&str, usize> {
        let mut nodes = BTreeMap::new();
        for tick in &self.ticks {
            *nodes.entry(&*tick.node).or_insert(0) += 1;
        }
        nodes
    }
}

/// The ring point for `data`: the last four bytes of its SHA-1 digest,
/// big-endian.
pub fn hash_point(data: &[u8]) -> u32 {
    let digest = Sha1::digest(data);
    let n = digest.len();

    u32::from(digest[n - 1])
        | u32::from(digest[n - 2]) << 8
        | u32::from(digest[n - 3]) << 16
        | u32::from(digest[n - 4]) << 24
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(nodes: &[(&str, usize)], spots: usize) -> HashRing {
        let mut ring = HashRing::new(spots);
        for (name, weight) in nodes {
            ring.add_node(name, *weight);
        }
        ring.bake();
        ring
    }

    #[test]
    fn point_uses_last_digest_bytes() {
        // sha1("key1") = 1073ab6cda4b991cd29f9e83a307f34004ae9327
        assert_eq!(hash_point(b"key1"), 0x04ae_9327);
        // sha1("node1:1") = 4d4ad1f59dc6fb2e611df79ac51eeae03efe7213
        assert_eq!(hash_point(b"node1:1"), 0x3efe_7213);
        // sha1("") = da39a3ee5e6b4b0d3255bfef95601890afd80709
        assert_eq!(hash_point(b""), 0xafd8_0709);
    }

    #[test]
    fn static_assignment() {
        let ring = ring(&[("node1", 1), ("node2", 1), ("node3", 1)], 100);

        assert_eq!(ring.len(), 300);
        assert_eq!(ring.hash(b"key1"), Some("node1"));
        assert_eq!(ring.hash(b"keyd"), Some("node2"));
        assert_eq!(ring.hash(b"key2"), Some("node3"));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = ring(&[("node1", 1), ("node2", 1), ("node3", 1)], 100);
        let b = ring(&[("node1", 1), ("node3", 1), ("node2", 1)], 100);
        let c = ring(&[("node3", 1), ("node2", 1), ("node1", 1)], 100);

        assert_eq!(b.hash(b"key1"), Some("node1"));
        assert_eq!(b.hash(b"keyd"), Some("node2"));
        assert_eq!(b.hash(b"key2"), Some("node3"));

        for i in 0..1000 {
            let key = format!("key-{i}");
            assert_eq!(a.hash(key.as_bytes()), b.hash(key.as_bytes()));
            assert_eq!(a.hash(key.as_bytes()), c.hash(key.as_bytes()));
        }
    }

    #[test]
    fn removed_node_keys_redistribute() {
        let ring = ring(&[("node1", 1), ("node2", 1)], 100);

        assert_eq!(ring.hash(b"key1"), Some("node1"));
        assert_eq!(ring.hash(b"keyd"), Some("node2"));
        assert_eq!(ring.hash(b"key2"), Some("node1"));
    }

    #[test]
    fn removing_a_node_only_moves_its_keys() {
        let before = ring(&[("a", 1), ("b", 1), ("c", 1)], 100);
        let after = ring(&[("a", 1), ("b", 1)], 100);

        let mut moved = 0;
        for i in 0..2000 {
            let key = format!("key-{i}");
            let old = before.hash(key.as_bytes()).unwrap();
            let new = after.hash(key.as_bytes()).unwrap();
            if old == "c" {
                assert_ne!(new, "c");
                moved += 1;
            } else {
                assert_eq!(old, new, "key {key} moved off a surviving node");
            }
        }
        assert!(moved > 0);
    }

    #[test]
    fn wraps_to_first_tick() {
        let ring = ring(&[("node1", 1), ("node2", 1), ("node3", 1)], 100);
        let last = ring.ticks[ring.len() - 1].point;

        let key = (0..1_000_000)
            .map(|i| format!("wrap-{i}"))
            .find(|key| hash_point(key.as_bytes()) > last)
            .unwrap();

        assert_eq!(ring.hash(key.as_bytes()), Some(&*ring.ticks[0].node));
    }

    #[test]
    fn exact_point_maps_to_its_tick() {
        let ring = ring(&[("node1", 1), ("node2", 1)], 10);
        // "node2:3" lands exactly on one of node2's ticks
        assert_eq!(ring.hash(b"node2:3"), Some("node2"));
        assert_eq!(ring.hash(b"node1:7"), Some("node1"));
    }

    #[test]
    fn weight_scales_share() {
        let ring = ring(&[("heavy", 2), ("light", 1)], 100);

        let nodes = ring.nodes();
        assert_eq!(ring.base_spots(), 100);
        assert_eq!(nodes["heavy"], 2 * ring.base_spots());
        assert_eq!(nodes["light"], ring.base_spots());
        assert_eq!(ring.len(), 3 * ring.base_spots());

        let mut heavy = 0;
        let mut light = 0;
        for i in 0..10_000 {
            match ring.hash(format!("key-{i}").as_bytes()) {
                Some("heavy") => heavy += 1,
                Some("light") => light += 1,
                other => panic!("unexpected node {other:?}"),
            }
        }

        let ratio = heavy as f64 / light as f64;
        assert!((1.6..2.7).contains(&ratio), "heavy/light ratio {ratio}");
    }

    #[test]
    fn empty_ring_has_no_owner() {
        let ring = ring(&[], 100);
        assert!(ring.is_empty());
        assert_eq!(ring.hash(b"key"), None);
    }

    #[test]
    fn unbaked_ring_has_no_owner() {
        let mut ring = HashRing::new(100);
        ring.add_node("node1", 1);
        assert_eq!(ring.hash(b"key1"), None);

        ring.bake();
        assert_eq!(ring.hash(b"key1"), Some("node1"));

        ring.add_node("node2", 1);
        assert_eq!(ring.hash(b"key1"), None);
    }
}
