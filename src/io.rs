//! Stream endpoints: raw PCM in, raw little-endian f32 feature vectors out.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};

use crate::error::{FeatureError, FeatureResult};
use crate::features::FeatureVector;
use crate::utils::{downmix_to_mono, resample, to_pcm16};
use crate::{FRAME_SIZE, FeatureExtractor, SAMPLE_RATE};

/// Path that selects the standard streams.
pub const STDIO_PATH: &str = "-";

/// Open `path` for reading; `-` selects standard input.
pub fn open_input(path: &str) -> FeatureResult<Box<dyn Read>> {
    if path == STDIO_PATH {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).map_err(|source| FeatureError::OpenInput {
        path: path.to_string(),
        source,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

/// Open `path` for writing, truncating it; `-` selects standard output.
pub fn open_output(path: &str) -> FeatureResult<Box<dyn Write>> {
    if path == STDIO_PATH {
        return Ok(buffered(io::stdout().lock()));
    }
    let file = File::create(path).map_err(|source| FeatureError::OpenOutput {
        path: path.to_string(),
        source,
    })?;
    Ok(buffered(file))
}

// A bare stdout lock flushes at every 0x0A byte.
fn buffered<W: Write + 'static>(writer: W) -> Box<dyn Write> {
    Box::new(BufWriter::new(writer))
}

/// Iterator over fixed-size frames of little-endian 16-bit PCM.
///
/// Ends at the first short block. A read error also ends the stream and is
/// logged rather than returned.
pub struct PcmFrames<R> {
    reader: R,
    frame_size: usize,
    bytes: Vec<u8>,
    done: bool,
}

impl<R: Read> PcmFrames<R> {
    pub fn new(reader: R) -> Self {
        Self::with_frame_size(reader, FRAME_SIZE)
    }

    pub fn with_frame_size(reader: R, frame_size: usize) -> Self {
        Self {
            reader,
            frame_size,
            bytes: vec![0; 2 * frame_size],
            done: false,
        }
    }

    fn fill(&mut self) -> usize {
        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("read error treated as end of stream: {e}");
                    break;
                }
            }
        }
        filled
    }
}

impl<R: Read> Iterator for PcmFrames<R> {
    type Item = Vec<i16>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let filled = self.fill();
        if filled < self.bytes.len() {
            self.done = true;
            if filled > 0 {
                log::warn!(
                    "dropping {} trailing samples short of a {}-sample frame",
                    filled / 2,
                    self.frame_size
                );
            }
            return None;
        }
        Some(
            self.bytes
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect(),
        )
    }
}

/// Writes feature vectors as consecutive little-endian f32 values with no framing.
pub struct FeatureWriter<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> FeatureWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn write(&mut self, features: &FeatureVector) -> FeatureResult<()> {
        self.writer.write_all(&features.to_le_bytes())?;
        self.written += 1;
        Ok(())
    }

    /// Number of vectors written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> FeatureResult<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Decode a WAV stream to 16 kHz mono PCM.
///
/// Integer formats are rescaled to a 16-bit range, float formats are taken as
/// full scale at ±1.0. Channels are averaged and the result is resampled when
/// the file is not already at 16 kHz.
pub fn read_wav<R: Read>(reader: R) -> FeatureResult<Vec<i16>> {
    let mut reader = hound::WavReader::new(reader)?;
    let spec = reader.spec();
    log::debug!(
        "wav input: {} Hz, {} channel(s), {} bit {:?}",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| v * 32768.0))
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 32768.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<f32>, _>>()?
        }
    };
    if interleaved.is_empty() {
        return Err(FeatureError::EmptyAudioData);
    }

    let mono = downmix_to_mono(&interleaved, spec.channels as usize);
    let mono = resample(&mono, spec.sample_rate, SAMPLE_RATE)?;
    Ok(mono.into_iter().map(to_pcm16).collect())
}

/// Run `extractor` over every full frame of `reader`, writing one vector per frame.
/// Returns the number of vectors written.
pub fn dump_features<R: Read, W: Write>(
    extractor: &mut FeatureExtractor,
    reader: R,
    writer: W,
) -> FeatureResult<u64> {
    let mut out = FeatureWriter::new(writer);
    for frame in PcmFrames::new(reader) {
        let features = extractor.process_frame(&frame)?;
        out.write(&features)?;
    }
    let written = out.written();
    out.finish()?;
    log::debug!("wrote {written} feature vectors");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExtractorConfig, NB_FEATURES};
    use std::cell::Cell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    struct FailingReader {
        remaining: Vec<u8>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining.is_empty() {
                return Err(io::Error::other("device unplugged"));
            }
            let n = buf.len().min(self.remaining.len());
            buf[..n].copy_from_slice(&self.remaining[..n]);
            self.remaining.drain(..n);
            Ok(n)
        }
    }

    struct CountingWriter {
        calls: Rc<Cell<usize>>,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls.set(self.calls.get() + 1);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_is_buffered() {
        let calls = Rc::new(Cell::new(0));
        let writer = buffered(CountingWriter {
            calls: Rc::clone(&calls),
        });

        let mut features = FeatureVector::new();
        // 0x0A in every byte position
        features.set_pitch_gain(f32::from_le_bytes([0x0a; 4]));
        let mut out = FeatureWriter::new(writer);
        for _ in 0..20 {
            out.write(&features).unwrap();
        }
        assert_eq!(calls.get(), 0);
        out.finish().unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_pcm_frames_drop_short_tail() {
        let samples: Vec<i16> = (0..(2 * FRAME_SIZE + 10) as i16).collect();
        let frames: Vec<_> = PcmFrames::new(Cursor::new(pcm_bytes(&samples))).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1][0], FRAME_SIZE as i16);
    }

    #[test]
    fn test_pcm_frames_little_endian() {
        let frames: Vec<_> =
            PcmFrames::with_frame_size(Cursor::new(vec![0x01, 0x02, 0xff, 0xff]), 2).collect();
        assert_eq!(frames, vec![vec![0x0201, -1]]);
    }

    #[test]
    fn test_read_error_ends_stream() {
        let reader = FailingReader {
            remaining: pcm_bytes(&vec![7i16; FRAME_SIZE]),
        };
        let frames: Vec<_> = PcmFrames::new(reader).collect();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_dump_features_writes_one_vector_per_frame() {
        let mut extractor =
            FeatureExtractor::new(ExtractorConfig::default().with_seed(5)).unwrap();
        let input = pcm_bytes(&vec![100i16; 3 * FRAME_SIZE + 1]);
        let mut output = Vec::new();
        let written = dump_features(&mut extractor, Cursor::new(input), &mut output).unwrap();
        assert_eq!(written, 3);
        assert_eq!(output.len(), 3 * NB_FEATURES * 4);
    }

    #[test]
    fn test_dump_features_empty_input() {
        let mut extractor = FeatureExtractor::new(ExtractorConfig::default()).unwrap();
        let mut output = Vec::new();
        let written = dump_features(&mut extractor, io::empty(), &mut output).unwrap();
        assert_eq!(written, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_open_input_missing_file() {
        let err = open_input("/nonexistent/input.pcm").err().unwrap();
        assert!(matches!(err, FeatureError::OpenInput { .. }));
    }

    #[test]
    fn test_read_wav_int16_passthrough() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [-32768i16, -1, 0, 1, 12345] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.set_position(0);
        let pcm = read_wav(cursor).unwrap();
        assert_eq!(pcm, vec![-32767, -1, 0, 1, 12345]);
    }

    #[test]
    fn test_read_wav_stereo_float_downmix() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.5f32, 0.0, -0.25, -0.25] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.set_position(0);
        let pcm = read_wav(cursor).unwrap();
        assert_eq!(pcm, vec![8192, -8192]);
    }
}
