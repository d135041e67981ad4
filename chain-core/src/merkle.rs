//! Binary Keccak merkle commitment over an ordered list of hashes
//!
//! Leaves and inner nodes are hashed under different one-byte prefixes so an
//! inner node can never be replayed as a leaf. An odd node at the end of a
//! level is promoted unchanged rather than duplicated, which keeps
//! `[a, b, c]` and `[a, b, c, c]` distinct.

use crate::{keccak256, Hash};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

fn hash_leaf(leaf: &Hash) -> Hash {
    let mut buf = Vec::with_capacity(33);
    buf.push(LEAF_PREFIX);
    buf.extend_from_slice(leaf.as_bytes());
    keccak256(&buf)
}

fn hash_node(left: &Hash, right: &Hash) -> Hash {
    let mut buf = Vec::with_capacity(65);
    buf.push(NODE_PREFIX);
    buf.extend_from_slice(left.as_bytes());
    buf.extend_from_slice(right.as_bytes());
    keccak256(&buf)
}

/// Merkle root of `leaves` in order. The empty list commits to the zero hash.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::zero();
    }

    let mut level: Vec<Hash> = leaves.iter().map(hash_leaf).collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_node(left, right),
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }
    level[0]
}
