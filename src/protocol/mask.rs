//! Payload masking and the random material used by handshakes.

/// XOR `data` with `mask`, byte by byte.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// XOR `data` with `mask`, four bytes at a time.
///
/// Produces exactly the same output as [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}

/// Fill `buf` from the OS generator, falling back to the system clock.
pub fn fill_random(buf: &mut [u8]) {
    if getrandom::getrandom(buf).is_err() {
        let mut state = clock_seed();
        for byte in buf.iter_mut() {
            state = mix(state.wrapping_add(0x9E37_79B9));
            *byte = state as u8;
        }
    }
}

fn clock_seed() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u32)
        .unwrap_or(0x1234_5678)
}

#[inline]
fn mix(a: u32) -> u32 {
    let b = a.wrapping_mul(0x85EB_CA6B);
    let c = b ^ (b >> 13);
    c.wrapping_mul(0xC2B2_AE35)
}

/// Per-connection source of mask keys and handshake key material.
///
/// Mask keys come straight from the OS generator so a peer cannot predict
/// them. The seeded mixer only serves the non-secret values of the Hixie
/// handshake and stands in for mask keys if the OS generator fails.
#[derive(Debug, Clone)]
pub struct MaskGenerator {
    state: u32,
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskGenerator {
    #[must_use]
    pub fn new() -> Self {
        let mut seed = [0u8; 4];
        fill_random(&mut seed);
        Self {
            state: u32::from_le_bytes(seed),
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x9E37_79B9);
        mix(self.state)
    }

    pub fn next_mask(&mut self) -> [u8; 4] {
        let mut key = [0u8; 4];
        match getrandom::getrandom(&mut key) {
            Ok(()) => key,
            Err(_) => self.next_u32().to_le_bytes(),
        }
    }

    /// Uniform-ish value in `low..=high`.
    pub fn next_in(&mut self, low: u32, high: u32) -> u32 {
        debug_assert!(low <= high);
        let span = u64::from(high - low) + 1;
        low + (u64::from(self.next_u32()) % span) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_example_from_rfc() {
        let mut data = *b"Hello";
        apply_mask(&mut data, [0x37, 0xfa, 0x21, 0x3d]);
        assert_eq!(data, [0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_masking_empty() {
        let mut data: [u8; 0] = [];
        apply_mask_fast(&mut data, [1, 2, 3, 4]);
        assert!(data.is_empty());
    }

    #[test]
    fn test_masking_fast_equivalent() {
        let mask = [0xde, 0xad, 0xbe, 0xef];
        for len in [1usize, 3, 4, 5, 8, 17, 1000] {
            let original: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let mut a = original.clone();
            let mut b = original.clone();
            apply_mask(&mut a, mask);
            apply_mask_fast(&mut b, mask);
            assert_eq!(a, b, "length {len}");
            apply_mask_fast(&mut b, mask);
            assert_eq!(b, original);
        }
    }

    #[test]
    fn test_mask_keys_vary() {
        let mut generator = MaskGenerator::new();
        let mut keys: Vec<[u8; 4]> = (0..64).map(|_| generator.next_mask()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert!(keys.len() > 60);

        assert_ne!(generator.next_u32(), generator.next_u32());
    }

    #[test]
    fn test_generator_range() {
        let mut generator = MaskGenerator::new();
        for _ in 0..1000 {
            let v = generator.next_in(1, 12);
            assert!((1..=12).contains(&v));
        }
        assert_eq!(generator.next_in(5, 5), 5);
    }
}
