//! Z-order (Morton) codes over quantized positions.

/// Largest supported number of bits per axis.
pub const MAX_BITS: u32 = 21;

/// Spread the low 21 bits of `x` so that two zero bits follow each one.
#[inline]
fn spread(x: u64) -> u64 {
    let mut x = x & 0x1f_ffff;
    x = (x | (x << 32)) & 0x001f_0000_0000_ffff;
    x = (x | (x << 16)) & 0x001f_0000_ff00_00ff;
    x = (x | (x << 8)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x << 4)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

/// Interleave three quantized coordinates into one Morton code.
#[inline]
pub fn morton_code(q: [u32; 3]) -> u64 {
    spread(q[0] as u64) | (spread(q[1] as u64) << 1) | (spread(q[2] as u64) << 2)
}

/// Map `p` inside the box `[lo, hi]` onto a `bits`-bit grid per axis.
///
/// Degenerate axes collapse to 0; points outside the box are clamped.
pub fn quantize(p: [f64; 3], lo: [f64; 3], hi: [f64; 3], bits: u32) -> [u32; 3] {
    let bits = bits.clamp(1, MAX_BITS);
    let max = ((1u64 << bits) - 1) as f64;
    std::array::from_fn(|k| {
        let extent = hi[k] - lo[k];
        if !extent.is_finite() || extent <= 0.0 {
            return 0;
        }
        let t = ((p[k] - lo[k]) / extent).clamp(0.0, 1.0);
        (t * max).round() as u32
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaves_axes() {
        assert_eq!(morton_code([1, 0, 0]), 0b001);
        assert_eq!(morton_code([0, 1, 0]), 0b010);
        assert_eq!(morton_code([0, 0, 1]), 0b100);
        assert_eq!(morton_code([3, 0, 0]), 0b001_001);
        assert_eq!(morton_code([0x1f_ffff; 3]), (1u64 << 63) - 1);
    }

    #[test]
    fn quantize_clamps_and_handles_flat_boxes() {
        let lo = [0.0, 0.0, 1.0];
        let hi = [2.0, 1.0, 1.0];
        assert_eq!(quantize([1.0, 2.0, 1.0], lo, hi, 2), [2, 3, 0]);
        assert_eq!(quantize([-1.0, 0.0, 5.0], lo, hi, 2), [0, 0, 0]);
    }
}
