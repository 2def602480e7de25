//! dca.rs
//!
//! Raw DCA framing: a stream of Opus packets, each preceded by its byte
//! length as a little-endian `i16`. There is no metadata header.

use std::io::{ErrorKind, Read, Write};

use audiopus::coder::{Decoder, Encoder};
use audiopus::{Application, Bitrate, Channels, SampleRate};

use crate::Error;

pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: usize = 2;
/// 20 ms at 48 kHz, per channel.
pub const FRAME_SIZE: usize = 960;
pub const FRAME_SAMPLES: usize = FRAME_SIZE * CHANNELS;

// Recommended upper bound for a single Opus packet.
const MAX_PACKET: usize = 4000;

/// Encodes interleaved stereo PCM into raw DCA bytes. A trailing partial
/// frame is padded with silence.
pub fn encode_frames(pcm: &[i16], bitrate_kbps: u32) -> Result<Vec<u8>, Error> {
    let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
        .map_err(|e| Error::Encode(format!("opus encoder init: {e}")))?;
    encoder
        .set_bitrate(Bitrate::BitsPerSecond(bitrate_kbps as i32 * 1000))
        .map_err(|e| Error::Encode(format!("opus bitrate: {e}")))?;

    let mut out = Vec::new();
    let mut packet = [0u8; MAX_PACKET];
    let mut padded = [0i16; FRAME_SAMPLES];

    for chunk in pcm.chunks(FRAME_SAMPLES) {
        let frame: &[i16] = if chunk.len() == FRAME_SAMPLES {
            chunk
        } else {
            padded.fill(0);
            padded[..chunk.len()].copy_from_slice(chunk);
            &padded
        };

        let len = encoder
            .encode(frame, &mut packet)
            .map_err(|e| Error::Encode(format!("opus encode: {e}")))?;
        write_frame(&mut out, &packet[..len])?;
    }

    Ok(out)
}

pub fn write_frame<W: Write>(out: &mut W, packet: &[u8]) -> Result<(), Error> {
    let len = i16::try_from(packet.len())
        .map_err(|_| Error::Encode(format!("opus packet too large: {} bytes", packet.len())))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(packet)?;
    Ok(())
}

/// Reads every frame until end of stream. EOF on a frame boundary is the
/// normal end; EOF inside a frame is an error.
pub fn read_frames<R: Read>(input: &mut R) -> Result<Vec<Vec<u8>>, Error> {
    let mut frames = Vec::new();
    loop {
        let mut len_buf = [0u8; 2];
        match read_exact_or_eof(input, &mut len_buf)? {
            ReadOutcome::Eof => return Ok(frames),
            ReadOutcome::Partial => {
                return Err(Error::Stream(format!(
                    "truncated frame header after {} frames",
                    frames.len()
                )));
            }
            ReadOutcome::Full => {}
        }

        let len = i16::from_le_bytes(len_buf);
        if len < 0 {
            return Err(Error::Stream(format!("negative frame length {len}")));
        }

        let mut packet = vec![0u8; len as usize];
        input.read_exact(&mut packet).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                Error::Stream(format!("truncated frame body after {} frames", frames.len()))
            }
            _ => Error::Io(e),
        })?;
        frames.push(packet);
    }
}

/// Decodes Opus frames to interleaved stereo `f32` PCM.
pub fn decode_frames(frames: &[Vec<u8>]) -> Result<Vec<f32>, Error> {
    let mut decoder = Decoder::new(SampleRate::Hz48000, Channels::Stereo)
        .map_err(|e| Error::Stream(format!("opus decoder init: {e}")))?;

    let mut pcm = Vec::with_capacity(frames.len() * FRAME_SAMPLES);
    let mut buf = vec![0f32; FRAME_SAMPLES * 6];
    for frame in frames {
        let packet = frame
            .as_slice()
            .try_into()
            .map_err(|e| Error::Stream(format!("opus decode: {e}")))?;
        let output = buf
            .as_mut_slice()
            .try_into()
            .map_err(|e| Error::Stream(format!("opus decode: {e}")))?;
        let per_channel = decoder
            .decode_float(Some(packet), output, false)
            .map_err(|e| Error::Stream(format!("opus decode: {e}")))?;
        pcm.extend_from_slice(&buf[..per_channel * CHANNELS]);
    }
    Ok(pcm)
}

/// Little-endian `f32` bytes, the layout songbird's raw adapter expects.
pub fn pcm_to_le_bytes(pcm: &[f32]) -> Vec<u8> {
    pcm.iter().flat_map(|s| s.to_le_bytes()).collect()
}

enum ReadOutcome {
    Full,
    Partial,
    Eof,
}

fn read_exact_or_eof<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<ReadOutcome, Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(ReadOutcome::Eof),
            Ok(0) => return Ok(ReadOutcome::Partial),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(ReadOutcome::Full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stream_has_no_frames() {
        let mut input: &[u8] = &[];
        assert!(read_frames(&mut input).unwrap().is_empty());
    }

    #[test]
    fn reads_length_prefixed_frames_until_eof() {
        let mut raw = Vec::new();
        write_frame(&mut raw, &[1, 2, 3]).unwrap();
        write_frame(&mut raw, &[]).unwrap();
        write_frame(&mut raw, &[9; 300]).unwrap();

        let frames = read_frames(&mut raw.as_slice()).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![1, 2, 3]);
        assert!(frames[1].is_empty());
        assert_eq!(frames[2].len(), 300);
    }

    #[test]
    fn truncated_body_is_a_stream_error() {
        let mut raw = Vec::new();
        write_frame(&mut raw, &[1, 2, 3, 4]).unwrap();
        raw.truncate(raw.len() - 1);

        let err = read_frames(&mut raw.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Stream(msg) if msg.contains("body")));
    }

    #[test]
    fn half_a_header_is_a_stream_error() {
        let mut raw = Vec::new();
        write_frame(&mut raw, &[5]).unwrap();
        raw.push(0x01);

        let err = read_frames(&mut raw.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Stream(msg) if msg.contains("header")));
    }

    #[test]
    fn negative_length_is_rejected() {
        let raw = (-4i16).to_le_bytes();
        let err = read_frames(&mut raw.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Stream(msg) if msg.contains("negative")));
    }

    #[test]
    fn silence_encodes_to_whole_frames_and_decodes_back() {
        // 2.5 frames of silence => 3 frames after padding.
        let pcm = vec![0i16; FRAME_SAMPLES * 5 / 2];
        let encoded = encode_frames(&pcm, 96).unwrap();

        let frames = read_frames(&mut encoded.as_slice()).unwrap();
        assert_eq!(frames.len(), 3);

        let decoded = decode_frames(&frames).unwrap();
        assert_eq!(decoded.len(), 3 * FRAME_SAMPLES);
        assert!(decoded.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn pcm_bytes_are_little_endian_f32() {
        let bytes = pcm_to_le_bytes(&[1.0, -0.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-0.5f32).to_le_bytes());
    }
}
