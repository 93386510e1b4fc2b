use crate::RingError;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fmt;

/// Number of virtual nodes placed on the ring per physical token.
pub const DEFAULT_VNODES: usize = 20;

/// A position on the ring: a 160-bit SHA-1 digest, compared as a big-endian
/// byte sequence.
pub type RingPoint = [u8; 20];

/// Consistent-hashing ring over 160-bit points.
///
/// Each registered token contributes `vnodes` points at
/// `sha1(token + "$" + index)`; a key is owned by the token of the first ring
/// point strictly greater than the key's hash, wrapping around at the top of
/// the key space. Lookups are `O(log n)`; membership changes re-sort the ring,
/// which is fine because they are rare relative to lookups.
///
/// The ring is a plain data structure. Callers that share it across tasks
/// guard it together with whatever owner map they keep alongside (see
/// [`crate::exchange::Router`]).
pub struct RingHasher {
    ring: Vec<RingPoint>,
    owners: HashMap<RingPoint, String>,
    vnodes: usize,
}

impl RingHasher {
    /// Creates an empty ring with [`DEFAULT_VNODES`] virtual nodes per token.
    pub fn new() -> Self {
        Self::with_vnodes(DEFAULT_VNODES)
    }

    /// Creates an empty ring with a custom virtual-node count.
    pub fn with_vnodes(vnodes: usize) -> Self {
        Self {
            ring: Vec::new(),
            owners: HashMap::new(),
            vnodes,
        }
    }

    /// Registers a token, inserting all of its virtual-node points.
    ///
    /// Adding the same token twice doubles its share of the ring; callers are
    /// expected to track membership themselves.
    pub fn add(&mut self, token: &str) {
        for i in 0..self.vnodes {
            let point = hash_point(&vnode_id(token, i));
            self.owners.insert(point, token.to_string());
        }
        self.rebuild();
    }

    /// Removes all of a token's virtual-node points.
    pub fn remove(&mut self, token: &str) {
        for i in 0..self.vnodes {
            let point = hash_point(&vnode_id(token, i));
            self.owners.remove(&point);
        }
        self.rebuild();
    }

    /// Returns the token that owns `key`.
    ///
    /// The owner is the token of the first ring point strictly greater than
    /// `sha1(key)`, wrapping to the lowest point when the key hashes above
    /// every registered point.
    pub fn get(&self, key: &str) -> Result<&str, RingError> {
        if self.ring.is_empty() {
            return Err(RingError::EmptyRing);
        }

        let idx = self.search(&hash_point(key));
        // every ring point has an owner entry by construction
        Ok(self.owners[&self.ring[idx]].as_str())
    }

    /// Number of points currently on the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Virtual nodes per token.
    pub fn vnodes(&self) -> usize {
        self.vnodes
    }

    /// Index of the first ring point strictly greater than `point`, wrapping
    /// to 0 past the end.
    fn search(&self, point: &RingPoint) -> usize {
        let idx = self.ring.partition_point(|p| p <= point);
        if idx >= self.ring.len() {
            0
        } else {
            idx
        }
    }

    fn rebuild(&mut self) {
        self.ring.clear();
        self.ring.extend(self.owners.keys().copied());
        self.ring.sort_unstable();
    }
}

impl Default for RingHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RingHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingHasher")
            .field("points", &self.ring.len())
            .field("vnodes", &self.vnodes)
            .finish()
    }
}

fn vnode_id(token: &str, index: usize) -> String {
    format!("{}${}", token, index)
}

fn hash_point(key: &str) -> RingPoint {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}
