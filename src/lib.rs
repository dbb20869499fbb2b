//! # qoa-codec
//!
//! A pure Rust implementation of the QOA ("Quite OK Audio") format: lossy,
//! fixed-bitrate, time-domain audio compression built around a 4-tap
//! sign-sign LMS predictor and 3-bit quantized residuals packed into 64-bit
//! slices.
//!
//! ## Features
//!
//! - Full encoder with per-slice brute-force scalefactor search
//! - Full decoder with header probing and frame-level access
//! - Bit-exact QOA v1 streams, 1 to 8 channels, up to 24-bit sample rates
//! - Deterministic output across platforms (all endian handling is explicit)
//!
//! ## Example
//!
//! ```
//! use qoa_codec::{decode, encode, StreamDescriptor};
//!
//! let pcm: Vec<i16> = (0..2 * 400).map(|i| (i % 255 - 127) as i16).collect();
//! let mut desc = StreamDescriptor::new(2, 44100, 400);
//!
//! let bytes = encode(&pcm, &mut desc).unwrap();
//! let (decoded, out_desc) = decode(&bytes).unwrap();
//!
//! assert_eq!(out_desc.channels, 2);
//! assert_eq!(decoded.len(), pcm.len());
//! ```

#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod frame;
mod lms;
mod slice;
mod tables;

pub use decoder::{decode, decode_header, probe_qoa, QoaDecoder};
pub use encoder::{encode, QoaEncoder};
pub use error::{QoaError, Result};
pub use frame::{max_frame_size, FrameHeader};
pub use tables::{DEQUANT_TAB, QUANT_TAB, RECIPROCAL_TAB, SCALEFACTOR_TAB};

/// The four magic bytes `qoaf` as a big-endian 32-bit value.
pub const QOA_MAGIC: u32 = 0x716f_6166;

/// Smallest possible stream: a file header plus one frame header.
pub const QOA_MIN_FILESIZE: usize = 16;

/// Maximum number of channels a stream may carry.
pub const QOA_MAX_CHANNELS: usize = 8;

/// Samples of one channel coded by a single 64-bit slice.
pub const QOA_SLICE_LEN: usize = 20;

/// Slices per channel in a full frame.
pub const QOA_SLICES_PER_FRAME: usize = 256;

/// Samples per channel in a full frame.
pub const QOA_FRAME_LEN: usize = QOA_SLICES_PER_FRAME * QOA_SLICE_LEN;

/// Taps in the LMS predictor.
pub const QOA_LMS_LEN: usize = 4;

/// Properties of one QOA stream.
///
/// The channel count and sample rate are stored in every frame header rather
/// than the file header; the decoder fills them in by peeking the first
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Number of channels, 1 to 8.
    pub channels: u32,
    /// Sample rate in Hz, 24-bit range.
    pub samplerate: u32,
    /// Total number of samples per channel.
    pub samples: u32,
    /// Sum of squared per-sample errors across an encode. Diagnostic only,
    /// never part of the wire format.
    pub total_error: u64,
}

impl StreamDescriptor {
    /// Create a descriptor for a stream with the given shape.
    pub fn new(channels: u32, samplerate: u32, samples: u32) -> Self {
        StreamDescriptor {
            channels,
            samplerate,
            samples,
            total_error: 0,
        }
    }

    /// Stream duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        f64::from(self.samples) / f64::from(self.samplerate)
    }
}
