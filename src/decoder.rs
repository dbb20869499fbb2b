//! QOA decoder: header probing, frame decoding and whole-stream decode.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{QoaError, Result};
use crate::frame::{self, FrameHeader};
use crate::lms::LmsState;
use crate::slice::decode_slice;
use crate::{StreamDescriptor, QOA_MAGIC, QOA_MAX_CHANNELS, QOA_MIN_FILESIZE, QOA_SLICE_LEN};

/// QOA audio decoder.
///
/// Constructed from the file header of a stream; [`decode_frame`] is then
/// called once per frame. The per-channel predictor state is rebuilt from
/// each frame's own LMS block, so no state survives a malformed frame.
///
/// [`decode_frame`]: QoaDecoder::decode_frame
pub struct QoaDecoder {
    desc: StreamDescriptor,
    lms: Vec<LmsState>,
}

impl QoaDecoder {
    /// Parse the file header and peek the first frame header.
    ///
    /// Returns the decoder and the number of header bytes consumed (always
    /// 8; the peeked frame header is left for [`decode_frame`] to read).
    ///
    /// [`decode_frame`]: QoaDecoder::decode_frame
    pub fn new(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < QOA_MIN_FILESIZE {
            return Err(QoaError::ShortRead {
                needed: QOA_MIN_FILESIZE,
                available: bytes.len(),
            });
        }

        let mut cursor = Cursor::new(bytes);
        let file_header = cursor.read_u64::<BigEndian>()?;
        if (file_header >> 32) as u32 != QOA_MAGIC {
            return Err(QoaError::Malformed(format!(
                "bad magic {:#010x}",
                file_header >> 32
            )));
        }

        let samples = (file_header & 0xFFFF_FFFF) as u32;
        if samples == 0 {
            return Err(QoaError::Malformed("zero samples in file header".into()));
        }

        // The channel count and sample rate live only in the frame headers.
        let first_frame = FrameHeader::from_word(cursor.read_u64::<BigEndian>()?);
        if first_frame.channels == 0 || first_frame.samplerate == 0 {
            return Err(QoaError::Malformed(
                "zero channels or sample rate in first frame".into(),
            ));
        }
        if first_frame.channels as usize > QOA_MAX_CHANNELS {
            return Err(QoaError::Malformed(format!(
                "{} channels exceeds the supported maximum of {}",
                first_frame.channels, QOA_MAX_CHANNELS
            )));
        }

        let decoder = QoaDecoder {
            desc: StreamDescriptor {
                channels: first_frame.channels,
                samplerate: first_frame.samplerate,
                samples,
                total_error: 0,
            },
            lms: vec![LmsState::default(); first_frame.channels as usize],
        };
        Ok((decoder, 8))
    }

    /// The stream descriptor assembled from the headers.
    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.desc
    }

    /// Decode one frame from the start of `bytes` into `out`.
    ///
    /// `out` must hold at least `fsamples * channels` values; samples are
    /// written channel-interleaved from its start. Returns the number of
    /// bytes consumed and the number of samples per channel decoded.
    pub fn decode_frame(&mut self, bytes: &[u8], out: &mut [i16]) -> Result<(usize, usize)> {
        let channels = self.desc.channels as usize;
        let lms_block = 16 * channels;
        if bytes.len() < 8 + lms_block {
            return Err(QoaError::ShortRead {
                needed: 8 + lms_block,
                available: bytes.len(),
            });
        }

        let mut cursor = Cursor::new(bytes);
        let header = FrameHeader::from_word(cursor.read_u64::<BigEndian>()?);
        if header.channels != self.desc.channels || header.samplerate != self.desc.samplerate {
            return Err(QoaError::Malformed(format!(
                "frame header ({} ch, {} Hz) disagrees with stream ({} ch, {} Hz)",
                header.channels, header.samplerate, self.desc.channels, self.desc.samplerate
            )));
        }
        if header.frame_size as usize > bytes.len() {
            return Err(QoaError::Malformed(format!(
                "frame size {} exceeds remaining {} bytes",
                header.frame_size,
                bytes.len()
            )));
        }
        let Some(data_size) = (header.frame_size as usize).checked_sub(8 + lms_block) else {
            return Err(QoaError::Malformed(format!(
                "frame size {} cannot hold the header and LMS block",
                header.frame_size
            )));
        };
        // num_slices counts slice words across all channels, so the declared
        // sample total is compared across all channels as well.
        let num_slices = data_size / 8;
        let fsamples = header.fsamples as usize;
        if fsamples * channels > num_slices * QOA_SLICE_LEN {
            return Err(QoaError::Malformed(format!(
                "{} samples x {} channels declared but {} slice words hold at most {}",
                fsamples,
                channels,
                num_slices,
                num_slices * QOA_SLICE_LEN
            )));
        }
        if out.len() < fsamples * channels {
            return Err(QoaError::BufferSizeMismatch {
                actual: out.len(),
                expected: fsamples * channels,
            });
        }

        for lms in &mut self.lms {
            *lms = frame::read_lms_state(&mut cursor)?;
        }

        let mut buf = [0i16; QOA_SLICE_LEN];
        for sample_index in (0..fsamples).step_by(QOA_SLICE_LEN) {
            let slice_len = QOA_SLICE_LEN.min(fsamples - sample_index);
            for c in 0..channels {
                let word = cursor.read_u64::<BigEndian>()?;
                decode_slice(word, &mut self.lms[c], &mut buf[..slice_len]);
                for (i, &sample) in buf[..slice_len].iter().enumerate() {
                    out[(sample_index + i) * channels + c] = sample;
                }
            }
        }

        Ok((cursor.position() as usize, fsamples))
    }
}

/// Decode the file header of a QOA stream without decoding any audio.
///
/// Returns the stream descriptor and the number of bytes consumed.
pub fn decode_header(bytes: &[u8]) -> Result<(StreamDescriptor, usize)> {
    let (decoder, consumed) = QoaDecoder::new(bytes)?;
    Ok((*decoder.descriptor(), consumed))
}

/// Decode a whole QOA stream into channel-interleaved 16-bit PCM.
///
/// Any malformed frame aborts the decode; no partial output escapes. If the
/// stream ends cleanly before the file header's declared sample count, the
/// returned descriptor carries the actual number of samples decoded.
pub fn decode(bytes: &[u8]) -> Result<(Vec<i16>, StreamDescriptor)> {
    let (mut decoder, header_len) = QoaDecoder::new(bytes)?;
    let mut desc = *decoder.descriptor();
    let channels = desc.channels as usize;

    let mut pcm = vec![0i16; desc.samples as usize * channels];
    let mut pos = header_len;
    let mut sample_index = 0usize;

    while sample_index < desc.samples as usize && pos < bytes.len() {
        let (consumed, fsamples) =
            decoder.decode_frame(&bytes[pos..], &mut pcm[sample_index * channels..])?;
        pos += consumed;
        sample_index += fsamples;
    }

    if sample_index < desc.samples as usize {
        log::warn!(
            "stream ended after {} of {} declared samples",
            sample_index,
            desc.samples
        );
        pcm.truncate(sample_index * channels);
        desc.samples = sample_index as u32;
    }

    Ok((pcm, desc))
}

/// Check whether `bytes` starts with the QOA magic.
pub fn probe_qoa(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[0..4] == QOA_MAGIC.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::QoaEncoder;

    fn encode_stream(channels: u32, samplerate: u32, pcm: &[i16]) -> Vec<u8> {
        let samples = pcm.len() as u32 / channels;
        let mut encoder = QoaEncoder::new(channels, samplerate, samples).unwrap();
        encoder.encode(pcm).unwrap()
    }

    #[test]
    fn test_new_rejects_short_buffer() {
        let result = QoaDecoder::new(&[0u8; 15]);
        assert!(matches!(
            result,
            Err(QoaError::ShortRead {
                needed: 16,
                available: 15,
            })
        ));
    }

    #[test]
    fn test_new_rejects_bad_magic() {
        let mut bytes = encode_stream(1, 44100, &[0i16; 8]);
        bytes[0] = 0x72;
        assert!(matches!(
            QoaDecoder::new(&bytes),
            Err(QoaError::Malformed(_))
        ));
    }

    #[test]
    fn test_new_rejects_zero_samples() {
        let mut bytes = encode_stream(1, 44100, &[0i16; 8]);
        bytes[4..8].copy_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            QoaDecoder::new(&bytes),
            Err(QoaError::Malformed(_))
        ));
    }

    #[test]
    fn test_new_rejects_zero_channels() {
        let mut bytes = encode_stream(1, 44100, &[0i16; 8]);
        bytes[8] = 0;
        assert!(matches!(
            QoaDecoder::new(&bytes),
            Err(QoaError::Malformed(_))
        ));
    }

    #[test]
    fn test_new_rejects_too_many_channels() {
        // The frame header byte can express up to 255 channels; the decoder
        // caps at 8.
        let mut bytes = encode_stream(1, 44100, &[0i16; 8]);
        bytes[8] = 9;
        assert!(matches!(
            QoaDecoder::new(&bytes),
            Err(QoaError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_frame_rejects_channel_mismatch() {
        let bytes = encode_stream(2, 48000, &[0i16; 80]);
        let (mut decoder, pos) = QoaDecoder::new(&bytes).unwrap();

        let mut frame = bytes[pos..].to_vec();
        frame[0] = 1; // claim mono in the frame header
        let mut out = vec![0i16; 80];
        assert!(matches!(
            decoder.decode_frame(&frame, &mut out),
            Err(QoaError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_frame_rejects_oversized_frame_size() {
        let bytes = encode_stream(1, 44100, &[0i16; 8]);
        let (mut decoder, pos) = QoaDecoder::new(&bytes).unwrap();

        let mut frame = bytes[pos..].to_vec();
        // Declare a frame size past the end of the buffer.
        frame[6] = 0xFF;
        frame[7] = 0xFF;
        let mut out = vec![0i16; 8];
        assert!(matches!(
            decoder.decode_frame(&frame, &mut out),
            Err(QoaError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_frame_rejects_impossible_sample_count() {
        let bytes = encode_stream(1, 44100, &[0i16; 8]);
        let (mut decoder, pos) = QoaDecoder::new(&bytes).unwrap();

        let mut frame = bytes[pos..].to_vec();
        // One slice holds 20 samples; claim 21.
        frame[4] = 0;
        frame[5] = 21;
        let mut out = vec![0i16; 32];
        assert!(matches!(
            decoder.decode_frame(&frame, &mut out),
            Err(QoaError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_frame_rejects_impossible_sample_count_stereo() {
        // Two channels with one slice each hold 20 samples per channel;
        // claiming 21 needs a second slice per channel that the declared
        // frame size has no room for.
        let bytes = encode_stream(2, 44100, &[0i16; 16]);
        let (mut decoder, pos) = QoaDecoder::new(&bytes).unwrap();

        let mut frame = bytes[pos..].to_vec();
        frame[4] = 0;
        frame[5] = 21;
        let mut out = vec![0i16; 64];
        assert!(matches!(
            decoder.decode_frame(&frame, &mut out),
            Err(QoaError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_frame_rejects_small_output_buffer() {
        let bytes = encode_stream(1, 44100, &[0i16; 40]);
        let (mut decoder, pos) = QoaDecoder::new(&bytes).unwrap();

        let mut out = vec![0i16; 8];
        assert!(matches!(
            decoder.decode_frame(&bytes[pos..], &mut out),
            Err(QoaError::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_frame_consumes_declared_size() {
        let bytes = encode_stream(2, 48000, &[100i16; 240]);
        let (mut decoder, pos) = QoaDecoder::new(&bytes).unwrap();

        let mut out = vec![0i16; 240];
        let (consumed, fsamples) = decoder.decode_frame(&bytes[pos..], &mut out).unwrap();
        let header = FrameHeader::parse(&bytes[pos..]).unwrap();
        assert_eq!(consumed, header.frame_size as usize);
        assert_eq!(fsamples, 120);
    }

    #[test]
    fn test_decode_truncated_stream_fails() {
        let bytes = encode_stream(1, 44100, &[500i16; 100]);
        // Cut into the slice data of the only frame.
        let truncated = &bytes[..bytes.len() - 4];
        assert!(decode(truncated).is_err());
    }

    #[test]
    fn test_probe() {
        let bytes = encode_stream(1, 44100, &[0i16; 8]);
        assert!(probe_qoa(&bytes));
        assert!(!probe_qoa(b"icpf"));
        assert!(!probe_qoa(b"qo"));
    }

    #[test]
    fn test_decode_header_consumes_file_header_only() {
        let bytes = encode_stream(2, 48000, &[0i16; 40]);
        let (desc, consumed) = decode_header(&bytes).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(desc.channels, 2);
        assert_eq!(desc.samplerate, 48000);
        assert_eq!(desc.samples, 20);
    }
}
