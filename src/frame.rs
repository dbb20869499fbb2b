//! QOA frame headers and per-channel predictor state blocks.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{QoaError, Result};
use crate::lms::LmsState;
use crate::{StreamDescriptor, QOA_LMS_LEN, QOA_SLICES_PER_FRAME, QOA_SLICE_LEN};

/// Parsed 64-bit QOA frame header.
///
/// Layout, big endian: byte 0 holds the channel count, bytes 1..3 the sample
/// rate, bytes 4..5 the samples per channel in this frame and bytes 6..7 the
/// total frame size in bytes including the header itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Number of channels in this frame.
    pub channels: u32,
    /// Sample rate in Hz.
    pub samplerate: u32,
    /// Samples per channel carried by this frame.
    pub fsamples: u32,
    /// Frame size in bytes, header included.
    pub frame_size: u32,
}

impl FrameHeader {
    /// Parse a frame header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(QoaError::ShortRead {
                needed: 8,
                available: bytes.len(),
            });
        }
        let mut cursor = Cursor::new(bytes);
        let word = cursor.read_u64::<BigEndian>()?;
        Ok(Self::from_word(word))
    }

    /// Unpack a header from its 64-bit wire word.
    pub(crate) fn from_word(word: u64) -> Self {
        FrameHeader {
            channels: ((word >> 56) & 0xFF) as u32,
            samplerate: ((word >> 32) & 0xFF_FFFF) as u32,
            fsamples: ((word >> 16) & 0xFFFF) as u32,
            frame_size: (word & 0xFFFF) as u32,
        }
    }

    /// Pack the header into its 64-bit wire word.
    pub(crate) fn to_word(self) -> u64 {
        (u64::from(self.channels) << 56)
            | (u64::from(self.samplerate) << 32)
            | (u64::from(self.fsamples) << 16)
            | u64::from(self.frame_size)
    }

    /// Number of slices per channel in this frame.
    pub fn num_slices(&self) -> usize {
        (self.fsamples as usize).div_ceil(QOA_SLICE_LEN)
    }
}

/// Exact size in bytes of a frame with the given channel and slice counts.
pub(crate) fn frame_size(channels: usize, slices: usize) -> usize {
    8 + QOA_LMS_LEN * 4 * channels + 8 * slices * channels
}

/// The size in bytes of a full 256-slice frame for this stream.
pub fn max_frame_size(desc: &StreamDescriptor) -> usize {
    frame_size(desc.channels as usize, QOA_SLICES_PER_FRAME)
}

/// Write one channel's predictor state as two 64-bit words: packed history
/// first, packed weights second, index 0 in the high 16 bits of each.
pub(crate) fn write_lms_state(lms: &LmsState, out: &mut Vec<u8>) -> Result<()> {
    let mut history = 0u64;
    let mut weights = 0u64;
    for i in 0..QOA_LMS_LEN {
        history = (history << 16) | (lms.history[i] as u64 & 0xFFFF);
        weights = (weights << 16) | (lms.weights[i] as u64 & 0xFFFF);
    }
    out.write_u64::<BigEndian>(history)?;
    out.write_u64::<BigEndian>(weights)?;
    Ok(())
}

/// Read one channel's predictor state, sign extending each 16-bit word.
pub(crate) fn read_lms_state(cursor: &mut Cursor<&[u8]>) -> Result<LmsState> {
    let mut history = cursor.read_u64::<BigEndian>()?;
    let mut weights = cursor.read_u64::<BigEndian>()?;

    let mut lms = LmsState::default();
    for i in 0..QOA_LMS_LEN {
        lms.history[i] = i32::from((history >> 48) as i16);
        history <<= 16;
        lms.weights[i] = i32::from((weights >> 48) as i16);
        weights <<= 16;
    }
    Ok(lms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_word_roundtrip() {
        let header = FrameHeader {
            channels: 2,
            samplerate: 44100,
            fsamples: 5120,
            frame_size: 4136,
        };
        assert_eq!(FrameHeader::from_word(header.to_word()), header);
    }

    #[test]
    fn test_header_byte_layout() {
        let header = FrameHeader {
            channels: 8,
            samplerate: 16000,
            fsamples: 100,
            frame_size: 8 + 16 * 8 + 8 * 5 * 8,
        };
        let bytes = header.to_word().to_be_bytes();
        assert_eq!(bytes[0], 0x08);
        assert_eq!(&bytes[1..4], &[0x00, 0x3E, 0x80]);
        assert_eq!(&bytes[4..6], &[0x00, 0x64]);
    }

    #[test]
    fn test_header_parse_short_buffer() {
        let result = FrameHeader::parse(&[0u8; 5]);
        assert!(matches!(result, Err(QoaError::ShortRead { .. })));
    }

    #[test]
    fn test_num_slices() {
        let mut header = FrameHeader {
            channels: 1,
            samplerate: 44100,
            fsamples: 5120,
            frame_size: 0,
        };
        assert_eq!(header.num_slices(), 256);

        header.fsamples = 1;
        assert_eq!(header.num_slices(), 1);

        header.fsamples = 21;
        assert_eq!(header.num_slices(), 2);
    }

    #[test]
    fn test_frame_size_formula() {
        assert_eq!(frame_size(1, 1), 32);
        assert_eq!(frame_size(2, 1), 56);
        assert_eq!(frame_size(8, 256), 8 + 128 + 16384);
    }

    #[test]
    fn test_lms_state_wire_roundtrip() {
        let mut lms = LmsState::default();
        lms.history = [-1, 2, -32768, 32767];
        lms.weights = [0, -8192, 16384, -3];

        let mut bytes = Vec::new();
        write_lms_state(&lms, &mut bytes).unwrap();
        assert_eq!(bytes.len(), 16);

        let mut cursor = Cursor::new(bytes.as_slice());
        let read = read_lms_state(&mut cursor).unwrap();
        assert_eq!(read, lms);
    }

    #[test]
    fn test_lms_state_wire_order() {
        let mut lms = LmsState::default();
        lms.history = [0x0102, 0x0304, 0x0506, 0x0708];

        let mut bytes = Vec::new();
        write_lms_state(&lms, &mut bytes).unwrap();
        // history[0] occupies the most significant 16 bits.
        assert_eq!(&bytes[0..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
