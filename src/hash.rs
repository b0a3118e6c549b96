// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! FlexHash — a streaming, variable-length, Pearson-style byte hash.
//!
//! Used to fingerprint the layout of a registered region set (see
//! [`crate::region`]) so a recording cannot silently be replayed against a
//! binary with a different memory layout. The only platform-independent
//! state is a fixed 256-entry permutation table; everything else is a
//! handful of bytes threaded through `init`/`add`/`finish`, so the output
//! is identical across targets given the same input and output length.
//!
//! The algorithm below is fixed by contract (same input, same `L`, same
//! bytes everywhere) — do not "simplify" the bit-twiddling, it is load
//! bearing for cross-platform determinism.

/// Fixed bytewise permutation of 0..255. The only constant the algorithm
/// depends on.
const TABLE: [u8; 256] = [
    24, 20, 12, 96, 0, 178, 16, 18, 44, 10, 185, 58, 172, 121, 148, 17, 62, 124, 87, 85, 196, 27,
    52, 237, 2, 222, 42, 38, 72, 186, 205, 91, 162, 40, 110, 201, 4, 98, 176, 81, 157, 156, 232,
    206, 22, 74, 126, 168, 131, 161, 92, 82, 34, 88, 142, 242, 100, 29, 30, 226, 54, 41, 190, 105,
    139, 77, 141, 117, 214, 37, 112, 152, 238, 248, 118, 177, 32, 11, 43, 128, 66, 189, 106, 209,
    151, 99, 97, 249, 55, 229, 78, 179, 104, 134, 144, 251, 68, 93, 80, 75, 46, 204, 48, 120, 102,
    215, 70, 115, 136, 246, 236, 119, 83, 35, 224, 180, 198, 163, 220, 182, 150, 132, 164, 244,
    240, 1, 6, 217, 216, 137, 36, 67, 33, 169, 170, 155, 154, 165, 218, 135, 49, 21, 25, 181, 56,
    13, 8, 143, 208, 210, 187, 111, 114, 65, 230, 167, 90, 69, 146, 63, 108, 89, 50, 227, 15, 61,
    122, 79, 86, 193, 173, 183, 14, 243, 116, 194, 234, 235, 94, 147, 123, 239, 166, 207, 158, 9,
    125, 197, 192, 129, 26, 127, 171, 133, 228, 3, 138, 71, 5, 200, 247, 199, 28, 107, 59, 73, 53,
    250, 130, 101, 113, 223, 231, 225, 153, 254, 84, 175, 160, 51, 60, 109, 219, 159, 188, 57, 64,
    19, 245, 213, 184, 233, 174, 7, 76, 195, 202, 45, 221, 253, 149, 211, 252, 103, 39, 241, 140,
    23, 145, 203, 47, 95, 212, 31, 255, 191,
];

/// A FlexHash instance of a fixed output length `L`, threaded through
/// `add` and finalized once by `finish`.
pub struct FlexHash {
    buffer: Vec<u8>,
    j: usize,
    n: u8,
    last_input_byte: u8,
    finished: bool,
}

impl FlexHash {
    /// Initialize a FlexHash producing `len` bytes of output. `len` must
    /// be at least 1.
    pub fn init(len: usize) -> Self {
        assert!(len >= 1, "FlexHash output length must be >= 1");
        let mut buffer = vec![0u8; len];

        let mut i: u8 = 0;
        let mut k: u8 = 199;
        let mut n: u8 = 17;
        let mut m: u8 = 107;

        for run in 0..2usize {
            for j in run..len {
                let mut j_bits = j as u32;
                while j_bits > 255 {
                    j_bits = (j_bits >> 8) ^ (j_bits & 0xFF);
                }
                let j_bits = j_bits as u8;

                let index = (i as usize + TABLE[k as usize] as usize + TABLE[m as usize] as usize)
                    % 256;
                n ^= TABLE[index] ^ j_bits ^ buffer[j];
                buffer[j] = n;

                i = i.wrapping_add(1);
                if matches!(n, 13 | 101 | 173 | 207) {
                    k = k.wrapping_add(1);
                }
                if n == 67 {
                    m = m.wrapping_add(1);
                }
            }
        }
        n ^= TABLE[i as usize];

        Self { buffer, j: 0, n, last_input_byte: 0, finished: false }
    }

    /// Incorporate `bytes` into the running state. May be called any
    /// number of times before [`FlexHash::finish`].
    pub fn add(&mut self, bytes: &[u8]) {
        debug_assert!(!self.finished, "add() called after finish()");
        let len = self.buffer.len();
        for &b in bytes {
            let idx = self.buffer[self.j] ^ b ^ self.n;
            self.n = TABLE[idx as usize];
            self.buffer[self.j] = self.n;
            self.j = (self.j + 1) % len;
            if self.n > 0 {
                self.last_input_byte = b;
            }
        }
    }

    /// Perform the fixed finalization pass. After this, [`FlexHash::digest`]
    /// is the hash; calling [`FlexHash::add`] afterward produces an
    /// undefined (incorrect) result.
    pub fn finish(&mut self) -> &[u8] {
        for _pass in 0..4 {
            for j in 0..self.buffer.len() {
                let idx = self.buffer[j] ^ self.last_input_byte ^ self.n;
                self.n = TABLE[idx as usize];
                self.buffer[j] = self.n;
            }
        }
        self.finished = true;
        &self.buffer
    }

    pub fn digest(&self) -> &[u8] {
        &self.buffer
    }
}

/// One-shot convenience: hash `data` to `len` bytes.
pub fn hash(data: &[u8], len: usize) -> Vec<u8> {
    let mut h = FlexHash::init(len);
    h.add(data);
    h.finish().to_vec()
}

/// Render bytes as uppercase hex, the form the spec requires for a
/// fingerprint.
pub fn to_hex_upper(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02X}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = hash(b"pos,hp,mp", 10);
        let b = hash(b"pos,hp,mp", 10);
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = hash(b"pos,hp", 10);
        let b = hash(b"pos,mp", 10);
        assert_ne!(a, b);
    }

    #[test]
    fn hex_is_uppercase_and_fixed_width() {
        let h = hash(b"layout", 10);
        let hex = to_hex_upper(&h);
        assert_eq!(hex.len(), 20);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn avalanche_over_random_trials() {
        // Spec §8 invariant 8: a single-bit input flip should change
        // between 30% and 70% of output bits, observed over >= 10 trials
        // on 1000-byte inputs hashed to 20 bytes.
        let mut state: u64 = 0x1234_5678_9abc_def0;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for _trial in 0..16 {
            let mut input = vec![0u8; 1000];
            for b in input.iter_mut() {
                *b = (next() & 0xFF) as u8;
            }
            let base = hash(&input, 20);

            let flip_byte = (next() as usize) % input.len();
            let flip_bit = (next() as usize) % 8;
            input[flip_byte] ^= 1 << flip_bit;
            let flipped = hash(&input, 20);

            let mut diff_bits = 0u32;
            for (x, y) in base.iter().zip(flipped.iter()) {
                diff_bits += (x ^ y).count_ones();
            }
            let total_bits = base.len() as u32 * 8;
            let ratio = diff_bits as f64 / total_bits as f64;
            assert!(
                (0.30..=0.70).contains(&ratio),
                "avalanche ratio {ratio} out of range for trial"
            );
        }
    }

    #[test]
    fn streaming_add_matches_one_shot() {
        let mut h = FlexHash::init(16);
        h.add(b"abc");
        h.add(b"def");
        let streamed = h.finish().to_vec();
        let oneshot = hash(b"abcdef", 16);
        assert_eq!(streamed, oneshot);
    }
}
