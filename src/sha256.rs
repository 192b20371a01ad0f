//! SHA-256 as described in [FIPS 180-4](https://doi.org/10.6028/NIST.FIPS.180-4).
//!
//! The [`digest`] function hashes a complete byte slice in one call.
//! The [`Sha256`] struct allows feeding the message in pieces, which is how the claim hash of
//! `salt | password` is calculated without first concatenating the two:
//!
//! ```
//! use vcalc::sha256::{digest, Sha256};
//!
//! let whole = digest(b"A1B2C3D4E5F67890pw");
//! let pieces = Sha256::new().chain("A1B2C3D4E5F67890").chain("pw").finalize();
//! assert_eq!(whole, pieces);
//! ```
//!
//! The message is buffered in a single 64 byte block and padding is applied in place when
//! finalizing, so hashing never allocates.
//! Nothing is shared between calls and every function is safe to use from several threads.

use std::fmt::{Display, Formatter};

/// Size of a digest in bytes.
pub const DIGEST_LENGTH: u8 = 32;

/// Size of a message block in bytes.
pub const BLOCK_LENGTH: usize = 64;

// Offset of the 64 bit message length inside the final block.
const LENGTH_OFFSET: usize = BLOCK_LENGTH - std::mem::size_of::<u64>();

const INITIAL_HASH: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

const ROUND_CONSTANTS: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

/// A SHA-256 digest. Always [32 bytes](DIGEST_LENGTH).
///
/// Displays as uppercase hex, which is the form used on the wire.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Digest {
    bytes: [u8; DIGEST_LENGTH as usize],
}

impl Digest {
    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; DIGEST_LENGTH as usize]) -> Self {
        Self { bytes }
    }

    /// The raw digest bytes, in the order they are emitted by the hash function.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LENGTH as usize] {
        &self.bytes
    }

    /// The digest as 64 uppercase hex characters.
    #[must_use]
    pub fn to_hex_upper(&self) -> String {
        crate::hex::hex_encode_upper(&self.bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex_upper())
    }
}

/// Hashes `data` in a single call.
///
/// Any input is valid, including the empty slice.
#[must_use]
pub fn digest(data: impl AsRef<[u8]>) -> Digest {
    Sha256::new().chain(data).finalize()
}

/// Incremental SHA-256 hasher.
///
/// Feeding a message in several pieces gives the same digest as feeding it in one.
#[derive(Debug, Clone)]
pub struct Sha256 {
    state: [u32; 8],
    block: [u8; BLOCK_LENGTH],
    // Bytes currently buffered in `block`. Always less than BLOCK_LENGTH between calls.
    buffered: usize,
    message_length: u64,
}

impl Default for Sha256 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha256 {
    /// Creates a hasher for an empty message.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: INITIAL_HASH,
            block: [0_u8; BLOCK_LENGTH],
            buffered: 0,
            message_length: 0,
        }
    }

    /// Appends `data` to the message.
    pub fn update(&mut self, data: impl AsRef<[u8]>) {
        let mut data = data.as_ref();
        self.message_length = self.message_length.wrapping_add(data.len() as u64);

        if self.buffered > 0 {
            let take = data.len().min(BLOCK_LENGTH - self.buffered);
            self.block[self.buffered..self.buffered + take].clone_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];

            if self.buffered < BLOCK_LENGTH {
                return;
            }

            compress(&mut self.state, &self.block);
            self.buffered = 0;
        }

        let mut blocks = data.chunks_exact(BLOCK_LENGTH);
        for block in &mut blocks {
            compress(&mut self.state, block);
        }

        let remainder = blocks.remainder();
        self.block[..remainder.len()].clone_from_slice(remainder);
        self.buffered = remainder.len();
    }

    /// Builder style version of [`Sha256::update`].
    #[must_use]
    pub fn chain(mut self, data: impl AsRef<[u8]>) -> Self {
        self.update(data);
        self
    }

    /// Pads the message and returns the digest, consuming the hasher.
    #[must_use]
    pub fn finalize(mut self) -> Digest {
        let bit_length = self.message_length.wrapping_mul(8);

        // A single 1 bit followed by zeros.
        self.block[self.buffered] = 0x80;
        self.buffered += 1;

        // The length does not fit after the marker, so it goes into an extra block.
        if self.buffered > LENGTH_OFFSET {
            self.block[self.buffered..].fill(0);
            compress(&mut self.state, &self.block);
            self.buffered = 0;
        }

        self.block[self.buffered..LENGTH_OFFSET].fill(0);
        self.block[LENGTH_OFFSET..].clone_from_slice(&bit_length.to_be_bytes());
        compress(&mut self.state, &self.block);

        let mut bytes = [0_u8; DIGEST_LENGTH as usize];
        for (out, word) in bytes.chunks_exact_mut(4).zip(self.state.iter()) {
            out.clone_from_slice(&word.to_be_bytes());
        }

        Digest::from_bytes(bytes)
    }
}

const fn ch(x: u32, y: u32, z: u32) -> u32 {
    (x & y) ^ (!x & z)
}

const fn maj(x: u32, y: u32, z: u32) -> u32 {
    (x & y) ^ (x & z) ^ (y & z)
}

const fn big_sigma0(x: u32) -> u32 {
    x.rotate_right(2) ^ x.rotate_right(13) ^ x.rotate_right(22)
}

const fn big_sigma1(x: u32) -> u32 {
    x.rotate_right(6) ^ x.rotate_right(11) ^ x.rotate_right(25)
}

const fn small_sigma0(x: u32) -> u32 {
    x.rotate_right(7) ^ x.rotate_right(18) ^ (x >> 3)
}

const fn small_sigma1(x: u32) -> u32 {
    x.rotate_right(17) ^ x.rotate_right(19) ^ (x >> 10)
}

// `block` is always exactly BLOCK_LENGTH bytes.
fn compress(state: &mut [u32; 8], block: &[u8]) {
    let mut schedule = [0_u32; 64];
    for (word, bytes) in schedule.iter_mut().zip(block.chunks_exact(4)) {
        *word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    for t in 16..64 {
        schedule[t] = small_sigma1(schedule[t - 2])
            .wrapping_add(schedule[t - 7])
            .wrapping_add(small_sigma0(schedule[t - 15]))
            .wrapping_add(schedule[t - 16]);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for (constant, word) in ROUND_CONSTANTS.iter().zip(schedule.iter()) {
        let t1 = h
            .wrapping_add(big_sigma1(e))
            .wrapping_add(ch(e, f, g))
            .wrapping_add(*constant)
            .wrapping_add(*word);
        let t2 = big_sigma0(a).wrapping_add(maj(a, b, c));

        h = g;
        g = f;
        f = e;
        e = d.wrapping_add(t1);
        d = c;
        c = b;
        b = a;
        a = t1.wrapping_add(t2);
    }

    for (word, value) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
        *word = word.wrapping_add(value);
    }
}

#[cfg(test)]
mod test {
    use crate::sha256::{digest, Sha256, BLOCK_LENGTH};
    use sha2::Digest as _;

    #[test]
    fn verify_empty_string() {
        assert_eq!(
            digest(b"").to_hex_upper(),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[test]
    fn verify_abc() {
        assert_eq!(
            digest(b"abc").to_hex_upper(),
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
    }

    #[test]
    fn verify_two_block_message() {
        // 56 bytes, the padding spills into a second block
        assert_eq!(
            digest(b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq").to_hex_upper(),
            "248D6A61D20638B8E5C026930C3E6039A33CE45964FF2167F6ECEDD419DB06C1"
        );
    }

    #[test]
    fn verify_one_million_a() {
        let mut hasher = Sha256::new();
        let chunk = [b'a'; 1000];
        for _ in 0..1000 {
            hasher.update(chunk);
        }

        assert_eq!(
            hasher.finalize().to_hex_upper(),
            "CDC76E5C9914FB9281A1C7E284D73E67F1809A48A497200E046D39CCC7112CD0"
        );
    }

    #[test]
    fn matches_reference_implementation_around_block_boundaries() {
        let data: Vec<u8> = (0..=300_u32).map(|i| (i * 7 + 3) as u8).collect();

        for length in 0..=data.len() {
            let message = &data[..length];
            let expected = sha2::Sha256::digest(message);

            assert_eq!(
                digest(message).as_bytes().as_slice(),
                expected.as_slice(),
                "length: {}",
                length
            );
        }
    }

    #[test]
    fn split_updates_match_single_update() {
        let data: Vec<u8> = (0..200_u32).map(|i| i as u8).collect();
        let expected = digest(&data);

        for split in [0, 1, 55, 56, 63, BLOCK_LENGTH, 65, 127, 128, 199, 200] {
            let (first, second) = data.split_at(split);
            let split_digest = Sha256::new().chain(first).chain(second).finalize();
            assert_eq!(split_digest, expected, "split at: {}", split);
        }

        let mut byte_by_byte = Sha256::new();
        for b in &data {
            byte_by_byte.update([*b]);
        }
        assert_eq!(byte_by_byte.finalize(), expected);
    }

    #[test]
    fn is_deterministic() {
        let message = b"A1B2C3D4E5F67890P@ssW0rd";
        assert_eq!(digest(message), digest(message));
        assert_eq!(digest(message).as_bytes().len(), 32);
    }

    #[test]
    fn one_character_changes_most_bytes() {
        let first = digest(b"A1B2C3D4E5F67890password1");
        let second = digest(b"A1B2C3D4E5F67890password2");

        assert_ne!(first, second);

        let differing = first
            .as_bytes()
            .iter()
            .zip(second.as_bytes().iter())
            .filter(|(a, b)| a != b)
            .count();
        assert!(differing > 16, "only {} bytes differ", differing);
    }

    #[test]
    fn displays_as_uppercase_hex() {
        let d = digest(b"abc");
        assert_eq!(d.to_string(), d.to_hex_upper());
        assert!(d.to_string().chars().all(|c| !c.is_ascii_lowercase()));
    }
}
