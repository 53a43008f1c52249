use alloy_primitives::{B256, keccak256};

/// Canonical form of an identity: surrounding whitespace trimmed, lowercased.
///
/// Every code path that hashes or looks up an identity goes through this
/// function. A caller that normalizes differently computes a different leaf
/// and gets a spurious "not eligible".
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Leaf value for an identity: `keccak256(utf8(normalize(raw)))`.
///
/// Leaves are unsalted, so anyone who knows an email can compute its leaf.
pub fn hash_identity(raw: &str) -> B256 {
    keccak256(normalize_identity(raw).as_bytes())
}

/// Internal node hash with the sorted-pair rule:
/// `keccak256(min(a, b) || max(a, b))`, compared byte-wise.
///
/// Matches OpenZeppelin's `MerkleProof.verify`, so the contract and the
/// off-chain verifier agree without tracking left/right positions.
pub fn hash_sorted_pair(a: B256, b: B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_slice());
    buf[32..].copy_from_slice(hi.as_slice());
    keccak256(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize_identity("  Foo@Bar.COM \n"), "foo@bar.com");
        assert_eq!(normalize_identity("a@x.com"), "a@x.com");
    }

    #[test]
    fn test_hash_identity_ignores_case_and_whitespace() {
        assert_eq!(hash_identity("  Foo@Bar.COM "), hash_identity("foo@bar.com"));
        assert_eq!(
            hash_identity("foo@bar.com"),
            hash_identity(&normalize_identity("\tFOO@bar.com"))
        );
    }

    #[test]
    fn test_hash_identity_is_keccak_of_normalized_bytes() {
        assert_eq!(hash_identity("B@X.COM"), keccak256(b"b@x.com"));
    }

    #[test]
    fn test_distinct_identities_distinct_leaves() {
        assert_ne!(hash_identity("a@x.com"), hash_identity("b@x.com"));
    }

    #[test]
    fn test_sorted_pair_is_commutative() {
        let a = B256::repeat_byte(0x01);
        let b = B256::repeat_byte(0xFE);
        assert_eq!(hash_sorted_pair(a, b), hash_sorted_pair(b, a));
    }

    #[test]
    fn test_sorted_pair_puts_smaller_first() {
        let a = B256::repeat_byte(0x01);
        let b = B256::repeat_byte(0xFE);
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(a.as_slice());
        buf[32..].copy_from_slice(b.as_slice());
        assert_eq!(hash_sorted_pair(b, a), keccak256(buf));
    }
}
