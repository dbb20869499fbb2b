//! QOA encoder: scalefactor search, frame packing and stream assembly.

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{QoaError, Result};
use crate::frame::{self, FrameHeader};
use crate::lms::LmsState;
use crate::slice::encode_slice;
use crate::{StreamDescriptor, QOA_FRAME_LEN, QOA_MAGIC, QOA_MAX_CHANNELS, QOA_SLICE_LEN};

/// QOA audio encoder.
///
/// Carries the per-channel predictor state across frames; the state as it
/// stands at the start of each frame is re-emitted in that frame's header
/// block so a decoder can pick up at any frame boundary.
///
/// # Example
///
/// ```
/// use qoa_codec::QoaEncoder;
///
/// let pcm = vec![0i16; 2 * 40];
/// let mut encoder = QoaEncoder::new(2, 44100, 40).unwrap();
/// let bytes = encoder.encode(&pcm).unwrap();
/// assert_eq!(&bytes[0..4], b"qoaf");
/// ```
pub struct QoaEncoder {
    desc: StreamDescriptor,
    lms: Vec<LmsState>,
}

impl QoaEncoder {
    /// Create an encoder for a stream with the given shape.
    ///
    /// Rejects zero samples, a zero or more than 24-bit sample rate, and a
    /// channel count outside 1..=8.
    pub fn new(channels: u32, samplerate: u32, samples: u32) -> Result<Self> {
        if samples == 0 {
            return Err(QoaError::InvalidDescriptor(
                "sample count must be nonzero".into(),
            ));
        }
        if samplerate == 0 || samplerate > 0xFF_FFFF {
            return Err(QoaError::InvalidDescriptor(format!(
                "sample rate {} outside 1..=16777215",
                samplerate
            )));
        }
        if channels == 0 || channels as usize > QOA_MAX_CHANNELS {
            return Err(QoaError::InvalidDescriptor(format!(
                "channel count {} outside 1..=8",
                channels
            )));
        }

        Ok(QoaEncoder {
            desc: StreamDescriptor {
                channels,
                samplerate,
                samples,
                total_error: 0,
            },
            lms: vec![LmsState::encoder_initial(); channels as usize],
        })
    }

    /// The stream descriptor this encoder was created with.
    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.desc
    }

    /// Sum of squared per-sample errors accumulated by the last encode.
    ///
    /// Diagnostic only; not part of the wire format.
    pub fn total_error(&self) -> u64 {
        self.desc.total_error
    }

    /// Encode a whole stream of channel-interleaved 16-bit PCM.
    ///
    /// `pcm` must hold exactly `samples * channels` values, element
    /// `i * channels + c` being channel `c` of sample frame `i`. The output
    /// length follows directly from the stream shape:
    /// `8 + num_frames * (8 + 16 * channels) + num_slices * 8 * channels`.
    pub fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>> {
        let channels = self.desc.channels as usize;
        let samples = self.desc.samples as usize;
        if pcm.len() != samples * channels {
            return Err(QoaError::BufferSizeMismatch {
                actual: pcm.len(),
                expected: samples * channels,
            });
        }

        // A fresh encode always starts from the canonical predictor state.
        for lms in &mut self.lms {
            *lms = LmsState::encoder_initial();
        }
        self.desc.total_error = 0;

        let num_frames = samples.div_ceil(QOA_FRAME_LEN);
        let num_slices = samples.div_ceil(QOA_SLICE_LEN);
        let encoded_size = 8 + num_frames * 8 + num_frames * 16 * channels + num_slices * 8 * channels;

        let mut bytes = Vec::with_capacity(encoded_size);
        self.encode_header(&mut bytes)?;

        for frame_samples in pcm.chunks(QOA_FRAME_LEN * channels) {
            self.encode_frame(frame_samples, &mut bytes)?;
        }

        debug_assert_eq!(bytes.len(), encoded_size);
        log::debug!(
            "encoded {} samples x {} channels into {} frames, {} bytes",
            samples,
            channels,
            num_frames,
            bytes.len()
        );
        Ok(bytes)
    }

    /// Write the 8-byte file header: the `qoaf` magic followed by the total
    /// number of samples per channel, both big endian.
    pub fn encode_header(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u64::<BigEndian>((u64::from(QOA_MAGIC) << 32) | u64::from(self.desc.samples))?;
        Ok(())
    }

    /// Encode one frame of up to 5120 samples per channel.
    ///
    /// `frame_samples` is channel-interleaved and its length must be a
    /// multiple of the channel count. Returns the number of bytes written.
    pub fn encode_frame(&mut self, frame_samples: &[i16], out: &mut Vec<u8>) -> Result<usize> {
        let channels = self.desc.channels as usize;
        if frame_samples.is_empty() || frame_samples.len() % channels != 0 {
            return Err(QoaError::BufferSizeMismatch {
                actual: frame_samples.len(),
                expected: frame_samples.len().next_multiple_of(channels).max(channels),
            });
        }

        let frame_len = frame_samples.len() / channels;
        if frame_len > QOA_FRAME_LEN {
            return Err(QoaError::InvalidDescriptor(format!(
                "frame length {} exceeds {} samples per channel",
                frame_len, QOA_FRAME_LEN
            )));
        }

        let slices = frame_len.div_ceil(QOA_SLICE_LEN);
        let start = out.len();

        let header = FrameHeader {
            channels: self.desc.channels,
            samplerate: self.desc.samplerate,
            fsamples: frame_len as u32,
            frame_size: frame::frame_size(channels, slices) as u32,
        };
        out.write_u64::<BigEndian>(header.to_word())?;

        // The frame-start predictor state goes on the wire, not the state
        // left behind after the frame's slices are searched.
        for lms in &self.lms {
            frame::write_lms_state(lms, out)?;
        }

        // Channels are interleaved at slice granularity:
        // (ch 0, slice 0), (ch 1, slice 0), (ch 0, slice 1), ...
        let mut buf = [0i16; QOA_SLICE_LEN];
        for sample_index in (0..frame_len).step_by(QOA_SLICE_LEN) {
            let slice_len = QOA_SLICE_LEN.min(frame_len - sample_index);
            for c in 0..channels {
                for (i, slot) in buf[..slice_len].iter_mut().enumerate() {
                    *slot = frame_samples[(sample_index + i) * channels + c];
                }
                let (word, error) = encode_slice(&buf[..slice_len], &mut self.lms[c]);
                self.desc.total_error += error;
                out.write_u64::<BigEndian>(word)?;
            }
        }

        Ok(out.len() - start)
    }
}

/// Encode channel-interleaved PCM described by `desc` into a QOA stream.
///
/// On success `desc.total_error` is updated with the encoder's accumulated
/// squared error. This is the one-shot counterpart of [`QoaEncoder`].
pub fn encode(pcm: &[i16], desc: &mut StreamDescriptor) -> Result<Vec<u8>> {
    let mut encoder = QoaEncoder::new(desc.channels, desc.samplerate, desc.samples)?;
    let bytes = encoder.encode(pcm)?;
    *desc = *encoder.descriptor();
    Ok(bytes)
}
