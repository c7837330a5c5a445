//! Fixed-width integer arrays packed contiguously into 64-bit words.
//!
//! Entry `i` occupies stream bits `[i * bits, (i + 1) * bits)`. Stream bit `k`
//! is bit `k % 64` of long `k / 64`, so an entry may straddle two longs.

/// Number of block slots in a 16x16x16 section.
pub const SECTION_VOLUME: usize = 4096;

/// Widest entry `pack`/`unpack` support.
pub const MAX_BITS_PER_ENTRY: u8 = 32;

/// Bits needed to index a palette of `palette_len` entries, at least one.
pub fn bits_for_palette(palette_len: usize) -> u8 {
    let mut bits = 1u8;
    while bits < MAX_BITS_PER_ENTRY && (1usize << bits) < palette_len {
        bits += 1;
    }
    bits
}

/// Entry width implied by a section's stored long count.
pub fn bits_from_long_count(long_count: usize) -> usize {
    long_count * 64 / SECTION_VOLUME
}

/// Longs needed to hold `count` entries of `bits` each.
pub fn long_count(count: usize, bits: u8) -> usize {
    (count * bits as usize + 63) / 64
}

pub fn pack(indices: &[u32], bits: u8) -> Vec<i64> {
    assert!(
        (1..=MAX_BITS_PER_ENTRY).contains(&bits),
        "bits per entry out of range: {}",
        bits
    );
    let bits = bits as usize;
    let value_mask = (1u64 << bits) - 1;
    let mut data = vec![0u64; long_count(indices.len(), bits as u8)];

    for (index, &value) in indices.iter().enumerate() {
        let value = value as u64 & value_mask;
        let start_long = (index * bits) / 64;
        let start_offset = (index * bits) % 64;

        data[start_long] |= value << start_offset;
        if start_offset + bits > 64 {
            data[start_long + 1] |= value >> (64 - start_offset);
        }
    }

    data.into_iter().map(|long| long as i64).collect()
}

/// Unpacks `count` entries. Entries past the end of `longs` read as zero, and a
/// width of zero yields all zeros.
pub fn unpack(longs: &[i64], bits: u8, count: usize) -> Vec<u32> {
    if bits == 0 {
        return vec![0; count];
    }
    assert!(
        bits <= MAX_BITS_PER_ENTRY,
        "bits per entry out of range: {}",
        bits
    );
    let bits = bits as usize;
    let value_mask = (1u64 << bits) - 1;
    let long_at = |i: usize| longs.get(i).map_or(0u64, |&long| long as u64);

    (0..count)
        .map(|index| {
            let start_long = (index * bits) / 64;
            let start_offset = (index * bits) % 64;

            let mut value = long_at(start_long) >> start_offset;
            if start_offset + bits > 64 {
                value |= long_at(start_long + 1) << (64 - start_offset);
            }
            (value & value_mask) as u32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_bits_for_palette() {
        assert_eq!(bits_for_palette(0), 1);
        assert_eq!(bits_for_palette(1), 1);
        assert_eq!(bits_for_palette(2), 1);
        assert_eq!(bits_for_palette(3), 2);
        assert_eq!(bits_for_palette(16), 4);
        assert_eq!(bits_for_palette(17), 5);
        assert_eq!(bits_for_palette(4096), 12);
    }

    #[test]
    fn test_width_recovered_from_long_count() {
        for bits in 1..=MAX_BITS_PER_ENTRY {
            let longs = long_count(SECTION_VOLUME, bits);
            assert_eq!(longs, 64 * bits as usize);
            assert_eq!(bits_from_long_count(longs), bits as usize);
        }
    }

    #[test]
    fn test_unpack_inverts_pack_for_all_widths() {
        let mut rng = rand::thread_rng();
        for bits in 1..=16u8 {
            let max = 1u32 << bits;
            let indices: Vec<u32> = (0..SECTION_VOLUME).map(|_| rng.gen_range(0..max)).collect();
            let packed = pack(&indices, bits);
            assert_eq!(packed.len(), long_count(SECTION_VOLUME, bits));
            assert_eq!(unpack(&packed, bits, SECTION_VOLUME), indices, "width {}", bits);
        }
    }

    #[test]
    fn test_entries_straddle_longs() {
        // 5 bits: entry 12 starts at bit 60 and spills 1 bit into the second long.
        let mut indices = vec![0u32; 26];
        indices[12] = 0b10110;
        let packed = pack(&indices, 5);
        assert_eq!(packed[0] as u64 >> 60, 0b0110);
        assert_eq!(packed[1] & 1, 1);
        assert_eq!(unpack(&packed, 5, 26)[12], 0b10110);
    }

    #[test]
    fn test_unpack_discards_trailing_padding() {
        let mut packed = pack(&[1, 2, 3], 4);
        packed[0] |= -1i64 << 12;
        assert_eq!(unpack(&packed, 4, 3), vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_width_unpacks_to_zeros() {
        assert_eq!(unpack(&[], 0, 4), vec![0, 0, 0, 0]);
    }
}
