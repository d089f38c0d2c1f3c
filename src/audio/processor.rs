//! Ogg Opus container writing
//!
//! Discord delivers bare Opus frames; the file API wants a real container.
//! This wraps a captured frame sequence in an Ogg Opus stream (RFC 7845).

use ogg::writing::{PacketWriteEndInfo, PacketWriter};
use std::io::{self, Write};
use std::path::Path;

/// Samples per 20ms Opus frame at 48kHz
pub const FRAME_SAMPLES: u64 = 960;

/// Audio container operations
pub struct AudioProcessor;

impl AudioProcessor {
    /// Write Opus frames as an Ogg Opus stream.
    ///
    /// Emits the OpusHead and OpusTags header pages, then one packet per
    /// frame with the granule position advancing 960 samples (20ms) each.
    pub fn write_ogg_opus<W: Write>(
        writer: W,
        frames: &[Vec<u8>],
        channels: u8,
        sample_rate: u32,
        serial: u32,
    ) -> io::Result<()> {
        let mut packets = PacketWriter::new(writer);

        packets.write_packet(
            opus_head(channels, sample_rate),
            serial,
            PacketWriteEndInfo::EndPage,
            0,
        )?;
        packets.write_packet(opus_tags(), serial, PacketWriteEndInfo::EndPage, 0)?;

        let mut granule = 0u64;
        for (i, frame) in frames.iter().enumerate() {
            granule += FRAME_SAMPLES;
            let end_info = if i + 1 == frames.len() {
                PacketWriteEndInfo::EndStream
            } else {
                PacketWriteEndInfo::NormalPacket
            };
            packets.write_packet(frame.as_slice(), serial, end_info, granule)?;
        }

        Ok(())
    }

    /// Get MIME type for an audio file
    pub fn mime_type(path: &Path) -> &'static str {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ogg") | Some("opus") => "audio/ogg",
            Some("mp3") => "audio/mp3",
            Some("wav") => "audio/wav",
            Some("flac") => "audio/flac",
            _ => "audio/ogg",
        }
    }
}

/// OpusHead identification header (RFC 7845 §5.1)
fn opus_head(channels: u8, sample_rate: u32) -> Vec<u8> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1); // version
    head.push(channels);
    head.extend_from_slice(&0u16.to_le_bytes()); // pre-skip
    head.extend_from_slice(&sample_rate.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes()); // output gain
    head.push(0); // mapping family: mono/stereo
    head
}

/// OpusTags comment header (RFC 7845 §5.2)
fn opus_tags() -> Vec<u8> {
    let vendor = b"scribe-bot";
    let mut tags = Vec::with_capacity(8 + 4 + vendor.len() + 4);
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    tags.extend_from_slice(vendor);
    tags.extend_from_slice(&0u32.to_le_bytes()); // no user comments
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(AudioProcessor::mime_type(Path::new("test.ogg")), "audio/ogg");
        assert_eq!(AudioProcessor::mime_type(Path::new("test.opus")), "audio/ogg");
        assert_eq!(AudioProcessor::mime_type(Path::new("test.mp3")), "audio/mp3");
        assert_eq!(AudioProcessor::mime_type(Path::new("noext")), "audio/ogg");
    }

    #[test]
    fn test_ogg_stream_structure() {
        let frames = vec![vec![0xAA; 40], vec![0xBB; 40], vec![0xCC; 40]];
        let mut buf = Vec::new();
        AudioProcessor::write_ogg_opus(&mut buf, &frames, 2, 48000, 7).unwrap();

        // Page header, then the first page's sole packet is OpusHead:
        // 27 header bytes + 1 segment table entry puts it at offset 28.
        assert_eq!(&buf[..4], b"OggS");
        assert_eq!(&buf[28..36], b"OpusHead");
        assert!(contains(&buf, b"OpusTags"));

        // Frame payloads survive muxing
        assert!(contains(&buf, &[0xAA; 40]));
        assert!(contains(&buf, &[0xCC; 40]));
    }

    #[test]
    fn test_empty_frame_list_still_writes_headers() {
        let mut buf = Vec::new();
        AudioProcessor::write_ogg_opus(&mut buf, &[], 2, 48000, 1).unwrap();
        assert_eq!(&buf[..4], b"OggS");
        assert!(contains(&buf, b"OpusTags"));
    }
}
