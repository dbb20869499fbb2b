//! Slice codec: 20 samples of one channel packed into a 64-bit word.
//!
//! Bits 63..60 hold the scalefactor index, followed by 20 residual codes of
//! 3 bits each. A short tail slice keeps its residuals in the high bits and
//! leaves the low bits zero.

use crate::lms::LmsState;
use crate::tables::{DEQUANT_TAB, QUANT_TAB, RECIPROCAL_TAB};
use crate::QOA_SLICE_LEN;

/// Rounding division by a scalefactor via its `.16` fixed point reciprocal.
///
/// Rounds away from zero so that the smallest nonzero residuals map to codes
/// greater than zero; zero itself stays zero.
fn scaled_div(v: i32, scalefactor: usize) -> i32 {
    let reciprocal = RECIPROCAL_TAB[scalefactor];
    let n = (v.wrapping_mul(reciprocal) + (1 << 15)) >> 16;
    n + v.signum() - n.signum()
}

/// Encode up to 20 samples of one channel into a slice word.
///
/// Runs a brute-force search over all 16 scalefactors, keeping the candidate
/// with the smallest total squared error. The filter state is advanced to the
/// winning candidate's end state; rejected candidates leave no trace.
/// Returns the packed word and the winning error.
pub(crate) fn encode_slice(samples: &[i16], lms: &mut LmsState) -> (u64, u64) {
    debug_assert!(!samples.is_empty() && samples.len() <= QOA_SLICE_LEN);

    let mut best_error = u64::MAX;
    let mut best_slice = 0u64;
    let mut best_lms = *lms;

    for scalefactor in 0..16 {
        // Each pass mutates the filter, so the search runs on a scratch copy
        // and only the winner's end state is kept.
        let mut candidate = *lms;
        let mut slice = scalefactor as u64;
        let mut current_error = 0u64;

        for &sample in samples {
            let sample = i32::from(sample);
            let predicted = candidate.predict();

            let residual = sample - predicted;
            let scaled = scaled_div(residual, scalefactor);
            let clamped = scaled.clamp(-8, 8);
            let quantized = QUANT_TAB[(clamped + 8) as usize];
            let dequantized = DEQUANT_TAB[scalefactor][quantized as usize];
            let reconstructed = (predicted + dequantized).clamp(-32768, 32767);

            let error = i64::from(sample - reconstructed);
            current_error += (error * error) as u64;
            if current_error > best_error {
                break;
            }

            candidate.update(reconstructed, dequantized);
            slice = (slice << 3) | u64::from(quantized);
        }

        if current_error < best_error {
            best_error = current_error;
            best_slice = slice;
            best_lms = candidate;
        }
    }

    *lms = best_lms;

    // Left-justify a short tail slice so padding occupies the low bits.
    best_slice <<= (QOA_SLICE_LEN - samples.len()) * 3;
    (best_slice, best_error)
}

/// Decode one slice word into `out`, which holds the slice's sample count.
///
/// The word always carries 20 residual slots; the trailing codes of a short
/// final slice are simply never read.
pub(crate) fn decode_slice(mut slice: u64, lms: &mut LmsState, out: &mut [i16]) {
    debug_assert!(out.len() <= QOA_SLICE_LEN);

    let scalefactor = ((slice >> 60) & 0xF) as usize;
    for sample in out.iter_mut() {
        let predicted = lms.predict();
        let quantized = ((slice >> 57) & 0x7) as usize;
        let dequantized = DEQUANT_TAB[scalefactor][quantized];
        let reconstructed = (predicted + dequantized).clamp(-32768, 32767);

        *sample = reconstructed as i16;
        slice <<= 3;

        lms.update(reconstructed, dequantized);
    }
}
