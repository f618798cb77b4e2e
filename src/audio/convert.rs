//! Sample-format conversion between the capture path and the engine.
//!
//! The capture path delivers **full-scale signed 32-bit** samples (the native
//! width of the microphone bus), while the detection engine consumes
//! **signed 16-bit** PCM.  [`reduce_bit_depth`] performs the conversion: an
//! arithmetic right shift that keeps the top 16 bits of each sample and
//! discards the rest.  No rounding, no dithering — the operation is lossy,
//! deterministic and stateless.
//!
//! The function converts exactly the slice it is given.  After a truncated
//! read, callers pass only the valid prefix of their scratch buffer; stale
//! samples beyond it are never touched and never reach the engine.

/// Number of low-order bits discarded when reducing a 32-bit sample to
/// 16 bits (`32 − 16`).
pub const SHIFT_BITS: u32 = 16;

// ---------------------------------------------------------------------------
// reduce_bit_depth
// ---------------------------------------------------------------------------

/// Convert `raw` 32-bit samples into 16-bit samples in `out`.
///
/// Each output sample is the arithmetic right shift of the corresponding
/// input sample by [`SHIFT_BITS`] bits, so sign and ordering are preserved.
/// Returns the number of samples written, which always equals `raw.len()`.
///
/// # Panics
///
/// Panics if `out` is shorter than `raw` — the scratch buffers are sized
/// together from the engine's feed chunk size, so a mismatch is a
/// programming error, not a runtime condition.
///
/// # Example
///
/// ```rust
/// use wake_listener::audio::reduce_bit_depth;
///
/// let raw = [0x0001_0000_i32, -0x0002_0000, 0x7FFF_0000, i32::MIN];
/// let mut out = [0_i16; 4];
/// let n = reduce_bit_depth(&raw, &mut out);
/// assert_eq!(n, 4);
/// assert_eq!(out, [1, -2, 32_767, -32_768]);
/// ```
pub fn reduce_bit_depth(raw: &[i32], out: &mut [i16]) -> usize {
    assert!(
        out.len() >= raw.len(),
        "output buffer too small: {} < {}",
        out.len(),
        raw.len()
    );

    for (dst, &src) in out.iter_mut().zip(raw) {
        // Arithmetic shift: >> on i32 is sign-extending.
        *dst = (src >> SHIFT_BITS) as i16;
    }

    raw.len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Reference values --------------------------------------------------

    #[test]
    fn known_sample_values() {
        let raw = [0x0001_0000_i32, -0x0002_0000, 0x7FFF_0000, i32::MIN];
        let mut out = [0_i16; 4];

        let n = reduce_bit_depth(&raw, &mut out);

        assert_eq!(n, 4);
        assert_eq!(out, [1, -2, 32_767, -32_768]);
    }

    #[test]
    fn zero_maps_to_zero() {
        let mut out = [99_i16; 1];
        reduce_bit_depth(&[0], &mut out);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn extremes_map_to_extremes() {
        let mut out = [0_i16; 2];
        reduce_bit_depth(&[i32::MAX, i32::MIN], &mut out);
        assert_eq!(out, [i16::MAX, i16::MIN]);
    }

    #[test]
    fn small_magnitudes_truncate_toward_negative_infinity() {
        // Arithmetic shift rounds toward -inf: -1 >> 16 == -1, +1 >> 16 == 0.
        let mut out = [0_i16; 2];
        reduce_bit_depth(&[1, -1], &mut out);
        assert_eq!(out, [0, -1]);
    }

    // ---- Ordering ----------------------------------------------------------

    #[test]
    fn monotonic_ordering_is_preserved() {
        let raw: Vec<i32> = (-8..8).map(|i| i * 0x0100_0000).collect();
        let mut out = vec![0_i16; raw.len()];
        reduce_bit_depth(&raw, &mut out);

        for pair in out.windows(2) {
            assert!(pair[0] <= pair[1], "ordering broken: {pair:?}");
        }
    }

    // ---- Prefix semantics --------------------------------------------------

    #[test]
    fn converts_only_the_given_prefix() {
        let raw = [0x0003_0000_i32, 0x0004_0000];
        // Scratch sized for a full chunk; sentinel marks untouched samples.
        let mut out = [i16::MIN; 4];

        let n = reduce_bit_depth(&raw, &mut out[..2]);

        assert_eq!(n, 2);
        assert_eq!(&out[..2], &[3, 4]);
        assert_eq!(&out[2..], &[i16::MIN, i16::MIN], "tail must stay untouched");
    }

    #[test]
    fn empty_input_converts_nothing() {
        let mut out = [7_i16; 4];
        let n = reduce_bit_depth(&[], &mut out[..0]);
        assert_eq!(n, 0);
        assert_eq!(out, [7; 4]);
    }

    // ---- Panic guard -------------------------------------------------------

    #[test]
    #[should_panic(expected = "output buffer too small")]
    fn short_output_buffer_panics() {
        let mut out = [0_i16; 1];
        reduce_bit_depth(&[1, 2], &mut out);
    }
}
