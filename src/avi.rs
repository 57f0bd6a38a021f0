//! Minimal MJPEG-in-AVI container writer. Frames arriving from the sensor are
//! already JPEG, so recording is pure muxing: each frame becomes one `00dc`
//! chunk in the `movi` list and one keyframe entry in the `idx1` index.
//! Header fields that depend on the frame count are patched in `finalize`.

use std::io::{self, Seek, SeekFrom, Write};

const AVIF_HASINDEX: u32 = 0x0000_0010;
const AVIIF_KEYFRAME: u32 = 0x0000_0010;
const SUGGESTED_BUFFER: u32 = 0x0010_0000;
/// Frame rates are stored as rate/scale; a scale of 1000 keeps fractional fps.
const RATE_SCALE: u32 = 1000;

pub struct MjpegAviWriter<W: Write + Seek> {
    out: W,
    frames: u32,
    /// (offset relative to the `movi` fourcc, chunk payload size) per frame.
    index: Vec<(u32, u32)>,
    movi_payload: u32,
    riff_size_pos: u64,
    total_frames_pos: u64,
    stream_length_pos: u64,
    movi_size_pos: u64,
}

impl<W: Write + Seek> MjpegAviWriter<W> {
    /// Writes the container headers with placeholder sizes. The writer must be
    /// positioned at the start of an empty output.
    pub fn new(mut out: W, width: u32, height: u32, fps: f64) -> io::Result<Self> {
        let fps = if fps > 0.0 { fps } else { 1.0 };

        out.write_all(b"RIFF")?;
        let riff_size_pos = out.stream_position()?;
        write_u32(&mut out, 0)?; // patched in finalize
        out.write_all(b"AVI ")?;

        // hdrl list: one avih header and one video stream description.
        out.write_all(b"LIST")?;
        write_u32(&mut out, 192)?;
        out.write_all(b"hdrl")?;

        out.write_all(b"avih")?;
        write_u32(&mut out, 56)?;
        write_u32(&mut out, (1_000_000.0 / fps).round() as u32)?;
        write_u32(&mut out, 0)?; // max bytes per second
        write_u32(&mut out, 0)?; // padding granularity
        write_u32(&mut out, AVIF_HASINDEX)?;
        let total_frames_pos = out.stream_position()?;
        write_u32(&mut out, 0)?; // patched in finalize
        write_u32(&mut out, 0)?; // initial frames
        write_u32(&mut out, 1)?; // streams
        write_u32(&mut out, SUGGESTED_BUFFER)?;
        write_u32(&mut out, width)?;
        write_u32(&mut out, height)?;
        for _ in 0..4 {
            write_u32(&mut out, 0)?; // reserved
        }

        out.write_all(b"LIST")?;
        write_u32(&mut out, 116)?;
        out.write_all(b"strl")?;

        out.write_all(b"strh")?;
        write_u32(&mut out, 56)?;
        out.write_all(b"vids")?;
        out.write_all(b"MJPG")?;
        write_u32(&mut out, 0)?; // flags
        write_u16(&mut out, 0)?; // priority
        write_u16(&mut out, 0)?; // language
        write_u32(&mut out, 0)?; // initial frames
        write_u32(&mut out, RATE_SCALE)?;
        write_u32(&mut out, (fps * RATE_SCALE as f64).round() as u32)?;
        write_u32(&mut out, 0)?; // start
        let stream_length_pos = out.stream_position()?;
        write_u32(&mut out, 0)?; // patched in finalize
        write_u32(&mut out, SUGGESTED_BUFFER)?;
        write_u32(&mut out, u32::MAX)?; // quality: default
        write_u32(&mut out, 0)?; // sample size
        write_u16(&mut out, 0)?; // frame rect
        write_u16(&mut out, 0)?;
        write_u16(&mut out, width as u16)?;
        write_u16(&mut out, height as u16)?;

        out.write_all(b"strf")?;
        write_u32(&mut out, 40)?; // BITMAPINFOHEADER
        write_u32(&mut out, 40)?;
        write_u32(&mut out, width)?;
        write_u32(&mut out, height)?;
        write_u16(&mut out, 1)?; // planes
        write_u16(&mut out, 24)?; // bits per pixel
        out.write_all(b"MJPG")?;
        write_u32(&mut out, width.saturating_mul(height).saturating_mul(3))?;
        for _ in 0..4 {
            write_u32(&mut out, 0)?;
        }

        out.write_all(b"LIST")?;
        let movi_size_pos = out.stream_position()?;
        write_u32(&mut out, 0)?; // patched in finalize
        out.write_all(b"movi")?;

        Ok(Self {
            out,
            frames: 0,
            index: Vec::new(),
            movi_payload: 0,
            riff_size_pos,
            total_frames_pos,
            stream_length_pos,
            movi_size_pos,
        })
    }

    /// Appends one JPEG-compressed frame.
    pub fn write_frame(&mut self, jpeg: &[u8]) -> io::Result<()> {
        let size = jpeg.len() as u32;
        let offset = 4 + self.movi_payload;
        self.out.write_all(b"00dc")?;
        write_u32(&mut self.out, size)?;
        self.out.write_all(jpeg)?;
        let mut written = 8 + size;
        if size % 2 == 1 {
            self.out.write_all(&[0])?; // chunks are word-aligned
            written += 1;
        }
        self.movi_payload += written;
        self.index.push((offset, size));
        self.frames += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u32 {
        self.frames
    }

    /// Writes the index, patches every deferred size field and flushes.
    /// Returns the underlying writer.
    pub fn finalize(mut self) -> io::Result<W> {
        self.out.write_all(b"idx1")?;
        write_u32(&mut self.out, self.index.len() as u32 * 16)?;
        for (offset, size) in &self.index {
            self.out.write_all(b"00dc")?;
            write_u32(&mut self.out, AVIIF_KEYFRAME)?;
            write_u32(&mut self.out, *offset)?;
            write_u32(&mut self.out, *size)?;
        }
        let end = self.out.stream_position()?;

        self.out.seek(SeekFrom::Start(self.riff_size_pos))?;
        write_u32(&mut self.out, (end - self.riff_size_pos - 4) as u32)?;
        self.out.seek(SeekFrom::Start(self.total_frames_pos))?;
        write_u32(&mut self.out, self.frames)?;
        self.out.seek(SeekFrom::Start(self.stream_length_pos))?;
        write_u32(&mut self.out, self.frames)?;
        self.out.seek(SeekFrom::Start(self.movi_size_pos))?;
        write_u32(&mut self.out, 4 + self.movi_payload)?;

        self.out.seek(SeekFrom::Start(end))?;
        self.out.flush()?;
        Ok(self.out)
    }
}

fn write_u32<W: Write>(out: &mut W, value: u32) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn write_u16<W: Write>(out: &mut W, value: u16) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u32_at(buf: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
    }

    fn write_two_frames() -> Vec<u8> {
        let mut writer = MjpegAviWriter::new(Cursor::new(Vec::new()), 320, 224, 20.0).unwrap();
        writer.write_frame(&[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]).unwrap();
        // Odd-length frame exercises the alignment padding.
        writer.write_frame(&[0xFF, 0xD8, 0xCC, 0xFF, 0xD9]).unwrap();
        assert_eq!(writer.frames_written(), 2);
        writer.finalize().unwrap().into_inner()
    }

    #[test]
    fn produces_a_well_formed_riff_avi_header() {
        let buf = write_two_frames();
        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(&buf[8..12], b"AVI ");
        assert_eq!(u32_at(&buf, 4) as usize, buf.len() - 8);
        assert_eq!(&buf[12..16], b"LIST");
        assert_eq!(u32_at(&buf, 16), 192);
        assert_eq!(&buf[20..24], b"hdrl");
    }

    #[test]
    fn movi_list_starts_after_the_headers() {
        let buf = write_two_frames();
        assert_eq!(&buf[212..216], b"LIST");
        assert_eq!(&buf[220..224], b"movi");
        assert_eq!(&buf[224..228], b"00dc");
    }

    #[test]
    fn frame_counts_are_patched_into_the_headers() {
        let buf = write_two_frames();
        // avih payload starts at 32; total_frames is its fifth field.
        assert_eq!(u32_at(&buf, 48), 2);
    }

    #[test]
    fn every_frame_is_indexed_as_a_keyframe() {
        let buf = write_two_frames();
        let idx = buf
            .windows(4)
            .position(|w| w == b"idx1")
            .expect("index chunk missing");
        assert_eq!(u32_at(&buf, idx + 4), 32); // two 16-byte entries
        assert_eq!(&buf[idx + 8..idx + 12], b"00dc");
        assert_eq!(u32_at(&buf, idx + 12), AVIIF_KEYFRAME);
        // First chunk sits right after the 'movi' fourcc.
        assert_eq!(u32_at(&buf, idx + 16), 4);
        assert_eq!(u32_at(&buf, idx + 20), 6);
    }

    #[test]
    fn odd_sized_frames_are_padded_to_word_alignment() {
        let buf = write_two_frames();
        // Second index entry: offset skips the first chunk (8 + 6 bytes).
        let idx = buf.windows(4).position(|w| w == b"idx1").unwrap();
        assert_eq!(u32_at(&buf, idx + 32), 4 + 8 + 6);
        assert_eq!(u32_at(&buf, idx + 36), 5);
    }

    #[test]
    fn absurd_dimensions_saturate_the_buffer_size_field() {
        let writer =
            MjpegAviWriter::new(Cursor::new(Vec::new()), u32::MAX, u32::MAX, 20.0).unwrap();
        let buf = writer.finalize().unwrap().into_inner();
        assert_eq!(&buf[0..4], b"RIFF");
    }

    #[test]
    fn an_empty_recording_still_finalizes() {
        let writer = MjpegAviWriter::new(Cursor::new(Vec::new()), 320, 224, 20.0).unwrap();
        let buf = writer.finalize().unwrap().into_inner();
        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(u32_at(&buf, 48), 0);
    }
}
