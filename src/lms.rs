//! The sign-sign LMS predictor shared by the encoder and decoder.
//!
//! The filter predicts the next sample from the previous four reconstructed
//! samples and continuously adjusts its four weights by the sign of each
//! history entry scaled by the latest residual. Encoder and decoder run the
//! exact same state trajectory; any divergence breaks the stream.

use crate::QOA_LMS_LEN;

/// Per-channel predictor state.
///
/// `history` and `weights` are 16-bit on the wire but kept at 32 bits during
/// computation; truncation and sign extension happen only at the frame
/// boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LmsState {
    pub(crate) history: [i32; QOA_LMS_LEN],
    pub(crate) weights: [i32; QOA_LMS_LEN],
}

impl LmsState {
    /// The canonical encoder start state: zeroed history and weights biased
    /// toward a stable filter for the first few milliseconds.
    pub(crate) fn encoder_initial() -> Self {
        LmsState {
            history: [0; QOA_LMS_LEN],
            weights: [0, 0, -(1 << 13), 1 << 14],
        }
    }

    /// Predict the next sample as `sum(weights[i] * history[i]) >> 13`.
    ///
    /// Wrapping arithmetic matches the reference behavior for state values
    /// outside the expected 16-bit range.
    pub(crate) fn predict(&self) -> i32 {
        let mut prediction = 0i32;
        for i in 0..QOA_LMS_LEN {
            prediction = prediction.wrapping_add(self.weights[i].wrapping_mul(self.history[i]));
        }
        prediction >> 13
    }

    /// Fold a reconstructed sample and its dequantized residual into the
    /// filter state.
    pub(crate) fn update(&mut self, sample: i32, residual: i32) {
        let delta = residual >> 4;
        for i in 0..QOA_LMS_LEN {
            self.weights[i] += if self.history[i] < 0 { -delta } else { delta };
        }

        for i in 0..QOA_LMS_LEN - 1 {
            self.history[i] = self.history[i + 1];
        }
        self.history[QOA_LMS_LEN - 1] = sample;
    }
}
