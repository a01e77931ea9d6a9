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

//! [Merkle tree hashing as defined in RFC 6962](https://www.rfc-editor.org/rfc/rfc6962.html#section-2.1),
//! instantiated with SHA-256, the hasher the transparency log uses.

use sha2::{Digest, Sha256};

/// Domain separators: `hash(0x00 || leaf)` for leaves,
/// `hash(0x01 || left || right)` for interior nodes. The distinct prefixes
/// make the tree second-preimage resistant.
const LEAF_HASH_PREFIX: u8 = 0;
const NODE_HASH_PREFIX: u8 = 1;

pub type Hash = [u8; 32];

pub fn hash_leaf(leaf: impl AsRef<[u8]>) -> Hash {
    Sha256::new()
        .chain_update([LEAF_HASH_PREFIX])
        .chain_update(leaf)
        .finalize()
        .into()
}

pub fn hash_children(left: impl AsRef<[u8]>, right: impl AsRef<[u8]>) -> Hash {
    Sha256::new()
        .chain_update([NODE_HASH_PREFIX])
        .chain_update(left)
        .chain_update(right)
        .finalize()
        .into()
}

/// These vectors come from the transparency-dev Merkle reference
/// implementation.
#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn known_hashes() {
        assert_eq!(
            hash_leaf(b""),
            hex!("6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d")
        );
        assert_eq!(
            hash_leaf(b"L123456"),
            hex!("395aa064aa4c29f7010acfe3f25db9485bbd4b91897b6ad7ad547639252b4d56")
        );
        assert_eq!(
            hash_children(b"N123", b"N456"),
            hex!("aa217fe888e47007fa15edab33c2b492a722cb106c64667fc2b044444de66bbb")
        );
    }

    #[test]
    fn collisions() {
        let l1 = b"Hello".to_vec();
        let l2 = b"World".to_vec();
        assert_ne!(hash_leaf(&l1), hash_leaf(&l2));
        assert_ne!(hash_children(&l1, &l2), hash_children(&l2, &l1));
        assert_ne!(
            hash_children(&l1, &l2),
            hash_leaf([l1, l2].concat()),
            "hasher is not second-preimage resistant"
        );
    }
}
