use serde::{Deserialize, Serialize};
use serde_big_array::big_array;
use sha2::{Digest, Sha512};
use std::fmt;

big_array! { BigArray; }

/// Hash de 512 bits usado para identificar blocos, transações e alvos de
/// prova-de-trabalho
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash512(#[serde(with = "BigArray")] [u8; 64]);

impl Hash512 {
    /// Number of bytes in the digest
    pub const LEN: usize = 64;

    /// Creates a zeroed hash
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 64])
    }

    /// Creates a hash from a 64-byte array
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the hash
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Computes the SHA-512 digest of the provided data
    #[must_use]
    pub fn sha512(data: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut hash = [0u8; 64];
        hash.copy_from_slice(&result);
        Self(hash)
    }

    /// Computes the double SHA-512 digest (digest applied twice)
    #[must_use]
    pub fn double_sha512(data: &[u8]) -> Self {
        let first = Self::sha512(data);
        Self::sha512(first.as_bytes())
    }

    /// Verifica se o hash é todo-zero (referência nula de coinbase e do
    /// antecessor do bloco gênese)
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Display for Hash512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash512").field(&hex::encode(self.0)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_creation_and_display() {
        let hash = Hash512::zero();
        assert!(hash.is_zero());
        assert_eq!(hash.to_string(), "0".repeat(128));
    }

    #[test]
    fn test_sha512_hashing() {
        let data = b"hello world";
        let hash = Hash512::sha512(data);
        assert!(!hash.is_zero());

        // Hash deve ser determinístico
        assert_eq!(hash, Hash512::sha512(data));
    }

    #[test]
    fn test_sha512_known_vector() {
        // SHA-512 de "abc" (FIPS 180-2, apêndice C)
        let hash = Hash512::sha512(b"abc");
        assert_eq!(
            hash.to_string(),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_double_digest_differs_from_single() {
        let data = b"hello world";
        let single = Hash512::sha512(data);
        let double = Hash512::double_sha512(data);

        assert_ne!(single, double);
        assert_eq!(double, Hash512::sha512(single.as_bytes()));
    }

    #[test]
    fn test_big_endian_ordering() {
        let mut lo = [0u8; 64];
        lo[63] = 0xff;
        let mut hi = [0u8; 64];
        hi[0] = 0x01;

        // Comparação byte a byte equivale à ordem big-endian sem sinal
        assert!(Hash512::from_bytes(lo) < Hash512::from_bytes(hi));
        assert!(Hash512::zero() < Hash512::from_bytes(lo));
    }
}
