//
// Copyright 2022 The slsa-builder Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Inclusion-proof verification against an RFC 6962 Merkle tree, following
//! the decomposition used by the transparency-dev reference verifier: the
//! audit path splits into an "inner" part (sibling choice depends on the
//! leaf index bits) and a "border" part (always left siblings).

use hex::ToHex;

use super::rfc6962::{hash_children, Hash};
use crate::errors::MerkleProofError;

/// Verifies the correctness of the inclusion proof for the leaf with the
/// given `leaf_hash` and `index`, relative to the tree of `tree_size`
/// entries with the given `root_hash`. Requires `0 <= index < tree_size`.
pub fn verify_inclusion(
    index: u64,
    leaf_hash: &Hash,
    tree_size: u64,
    proof_hashes: &[Hash],
    root_hash: &Hash,
) -> Result<(), MerkleProofError> {
    let computed = root_from_inclusion_proof(index, leaf_hash, tree_size, proof_hashes)?;
    if &computed != root_hash {
        return Err(MerkleProofError::RootMismatch {
            computed: computed.encode_hex(),
            expected: root_hash.encode_hex(),
        });
    }
    Ok(())
}

/// Calculates the root hash implied by a leaf and its audit path.
fn root_from_inclusion_proof(
    index: u64,
    leaf_hash: &Hash,
    tree_size: u64,
    proof_hashes: &[Hash],
) -> Result<Hash, MerkleProofError> {
    if index >= tree_size {
        return Err(MerkleProofError::IndexOutOfBounds { index, tree_size });
    }

    let (inner, border) = decompose_inclusion_proof(index, tree_size);
    if proof_hashes.len() != inner + border {
        return Err(MerkleProofError::WrongProofSize {
            got: proof_hashes.len(),
            want: inner + border,
        });
    }

    let inner_root = chain_inner(leaf_hash, &proof_hashes[..inner], index);
    Ok(chain_border_right(&inner_root, &proof_hashes[inner..]))
}

/// Splits the audit path of `index` in a tree of `tree_size` leaves into
/// the sizes of its inner and border parts.
fn decompose_inclusion_proof(index: u64, tree_size: u64) -> (usize, usize) {
    let inner = inner_proof_size(index, tree_size);
    let border = (index >> inner).count_ones() as usize;
    (inner, border)
}

fn inner_proof_size(index: u64, tree_size: u64) -> usize {
    (u64::BITS - (index ^ (tree_size - 1)).leading_zeros()) as usize
}

/// Walks the inner part of the path: bit `i` of the index decides whether
/// the sibling sits to the left or to the right.
fn chain_inner(seed: &Hash, proof_hashes: &[Hash], index: u64) -> Hash {
    proof_hashes
        .iter()
        .enumerate()
        .fold(*seed, |seed, (i, sibling)| {
            if (index >> i) & 1 == 0 {
                hash_children(seed, sibling)
            } else {
                hash_children(sibling, seed)
            }
        })
}

/// Walks the border part of the path, where every sibling is on the left.
fn chain_border_right(seed: &Hash, proof_hashes: &[Hash]) -> Hash {
    proof_hashes
        .iter()
        .fold(*seed, |seed, sibling| hash_children(sibling, seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::merkle::rfc6962::hash_leaf;

    /// Builds a full RFC 6962 tree over the given leaves and returns
    /// (root, audit path for `index`).
    fn reference_tree(leaves: &[&[u8]], index: usize) -> (Hash, Vec<Hash>) {
        fn subtree_root(hashes: &[Hash]) -> Hash {
            match hashes {
                [single] => *single,
                _ => {
                    let split = hashes.len().next_power_of_two() / 2;
                    hash_children(
                        subtree_root(&hashes[..split]),
                        subtree_root(&hashes[split..]),
                    )
                }
            }
        }

        fn audit_path(hashes: &[Hash], index: usize) -> Vec<Hash> {
            if hashes.len() == 1 {
                return vec![];
            }
            let split = hashes.len().next_power_of_two() / 2;
            if index < split {
                let mut path = audit_path(&hashes[..split], index);
                path.push(subtree_root(&hashes[split..]));
                path
            } else {
                let mut path = audit_path(&hashes[split..], index - split);
                path.push(subtree_root(&hashes[..split]));
                path
            }
        }

        let leaf_hashes: Vec<Hash> = leaves.iter().map(hash_leaf).collect();
        (
            subtree_root(&leaf_hashes),
            audit_path(&leaf_hashes, index),
        )
    }

    #[test]
    fn single_leaf_tree() {
        let leaf = hash_leaf(b"only");
        verify_inclusion(0, &leaf, 1, &[], &leaf).unwrap();
    }

    #[test]
    fn inclusion_in_small_trees() {
        let leaves: Vec<&[u8]> = vec![b"a", b"bb", b"ccc", b"dddd", b"eeeee", b"ffffff", b"g"];
        for size in 1..=leaves.len() {
            let tree = &leaves[..size];
            for (index, leaf) in tree.iter().enumerate() {
                let (root, path) = reference_tree(tree, index);
                verify_inclusion(index as u64, &hash_leaf(leaf), size as u64, &path, &root)
                    .unwrap_or_else(|e| panic!("size {size} index {index}: {e}"));
            }
        }
    }

    #[test]
    fn wrong_root_is_rejected() {
        let leaves: Vec<&[u8]> = vec![b"a", b"bb", b"ccc", b"dddd"];
        let (_, path) = reference_tree(&leaves, 2);
        let err = verify_inclusion(2, &hash_leaf(b"ccc"), 4, &path, &[0u8; 32]).unwrap_err();
        assert!(matches!(err, MerkleProofError::RootMismatch { .. }));
    }

    #[test]
    fn wrong_leaf_is_rejected() {
        let leaves: Vec<&[u8]> = vec![b"a", b"bb", b"ccc", b"dddd"];
        let (root, path) = reference_tree(&leaves, 1);
        let err = verify_inclusion(1, &hash_leaf(b"tampered"), 4, &path, &root).unwrap_err();
        assert!(matches!(err, MerkleProofError::RootMismatch { .. }));
    }

    #[test]
    fn index_out_of_bounds() {
        let leaf = hash_leaf(b"x");
        let err = verify_inclusion(4, &leaf, 4, &[], &leaf).unwrap_err();
        assert!(matches!(err, MerkleProofError::IndexOutOfBounds { .. }));
    }

    #[test]
    fn wrong_proof_size() {
        let leaves: Vec<&[u8]> = vec![b"a", b"bb", b"ccc", b"dddd"];
        let (root, mut path) = reference_tree(&leaves, 0);
        path.push([0u8; 32]);
        let err = verify_inclusion(0, &hash_leaf(b"a"), 4, &path, &root).unwrap_err();
        assert!(matches!(err, MerkleProofError::WrongProofSize { .. }));
    }
}
