use crate::error::{Result, TtsError};
use bytes::Bytes;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::ops::Range;

/// Size written by streaming encoders that do not know the final length
const UNKNOWN_SIZE: u32 = u32::MAX;

/// Concatenate multiple WAV files into a single WAV file
///
/// Parts streamed with placeholder header sizes are read up to the end of
/// their bytes; the output always gets one fresh, finalized header.
pub fn concatenate(wav_files: &[Bytes]) -> Result<Bytes> {
    if wav_files.is_empty() {
        return Err(TtsError::WavConcatenation(
            "No audio files to concatenate".to_string(),
        ));
    }

    let layouts = wav_files
        .iter()
        .map(|wav| PartLayout::scan(wav))
        .collect::<Result<Vec<_>>>()?;

    if let [only] = layouts.as_slice() {
        if only.sizes_known {
            return Ok(wav_files[0].clone());
        }
    }

    let spec = layouts[0].spec;

    match spec.sample_format {
        SampleFormat::Float => concatenate_typed::<f32>(wav_files, &layouts, spec),
        SampleFormat::Int => match spec.bits_per_sample {
            8 => concatenate_typed::<i8>(wav_files, &layouts, spec),
            16 => concatenate_typed::<i16>(wav_files, &layouts, spec),
            24 | 32 => concatenate_typed::<i32>(wav_files, &layouts, spec),
            _ => Err(TtsError::WavConcatenation(format!(
                "Unsupported bits per sample: {}",
                spec.bits_per_sample
            ))),
        },
    }
}

fn concatenate_typed<T>(wav_files: &[Bytes], layouts: &[PartLayout], spec: WavSpec) -> Result<Bytes>
where
    T: PcmSample,
{
    let mut output = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut output, spec)?;

        for (i, (wav_data, layout)) in wav_files.iter().zip(layouts).enumerate() {
            if layout.spec != spec {
                return Err(TtsError::WavConcatenation(format!(
                    "WAV file {} has different spec",
                    i
                )));
            }

            if layout.sizes_known {
                let reader = WavReader::new(Cursor::new(wav_data.as_ref()))?;
                for sample in reader.into_samples::<T>() {
                    writer.write_sample(sample?)?;
                }
            } else {
                tracing::debug!("WAV file {} has no final sizes, reading raw samples", i);
                let width = bytes_per_sample(spec);
                for raw in wav_data[layout.data.clone()].chunks_exact(width) {
                    writer.write_sample(T::from_le(raw))?;
                }
            }
        }

        writer.finalize()?;
    }

    Ok(Bytes::from(output.into_inner()))
}

/// Where a part's samples live, and whether its header sizes can be believed
struct PartLayout {
    spec: WavSpec,
    data: Range<usize>,
    sizes_known: bool,
}

impl PartLayout {
    fn scan(wav: &[u8]) -> Result<Self> {
        if wav.get(0..4) != Some(&b"RIFF"[..]) || wav.get(8..12) != Some(&b"WAVE"[..]) {
            return Err(ill_formed("no RIFF/WAVE header"));
        }
        let riff_size = read_u32(wav, 4).ok_or_else(|| ill_formed("truncated header"))?;

        let mut spec = None;
        let mut pos = 12;
        while let (Some(id), Some(size)) = (wav.get(pos..pos + 4), read_u32(wav, pos + 4)) {
            let body = pos + 8;
            match id {
                b"fmt " => {
                    let fmt = wav
                        .get(body..body.saturating_add(size as usize))
                        .ok_or_else(|| ill_formed("truncated fmt chunk"))?;
                    spec = Some(parse_fmt(fmt)?);
                }
                b"data" => {
                    let spec = spec.ok_or_else(|| ill_formed("data chunk before fmt chunk"))?;
                    let available = wav.len() - body;
                    let sizes_known = size != UNKNOWN_SIZE
                        && riff_size != UNKNOWN_SIZE
                        && size as usize <= available;
                    let len = if sizes_known { size as usize } else { available };
                    let frame = (spec.channels as usize * bytes_per_sample(spec)).max(1);

                    return Ok(Self {
                        spec,
                        data: body..body + len - len % frame,
                        sizes_known,
                    });
                }
                _ => {}
            }

            if size == UNKNOWN_SIZE {
                return Err(ill_formed("chunk of unknown size before the data chunk"));
            }
            pos = body + size as usize + (size as usize & 1);
        }

        Err(ill_formed("no data chunk"))
    }
}

fn parse_fmt(fmt: &[u8]) -> Result<WavSpec> {
    let field = |value: Option<u16>| value.ok_or_else(|| ill_formed("fmt chunk too short"));

    let mut tag = field(read_u16(fmt, 0))?;
    let channels = field(read_u16(fmt, 2))?;
    let sample_rate = read_u32(fmt, 4).ok_or_else(|| ill_formed("fmt chunk too short"))?;
    let bits_per_sample = field(read_u16(fmt, 14))?;

    // WAVE_FORMAT_EXTENSIBLE keeps the real tag at the start of the sub-format GUID
    if tag == 0xFFFE {
        tag = field(read_u16(fmt, 24))?;
    }

    let sample_format = match tag {
        1 => SampleFormat::Int,
        3 => SampleFormat::Float,
        other => return Err(ill_formed(&format!("unsupported format tag {}", other))),
    };

    Ok(WavSpec {
        channels,
        sample_rate,
        bits_per_sample,
        sample_format,
    })
}

fn bytes_per_sample(spec: WavSpec) -> usize {
    (spec.bits_per_sample as usize).div_ceil(8)
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn ill_formed(reason: &str) -> TtsError {
    TtsError::AudioParsing(format!("Ill-formed WAVE file: {}", reason))
}

/// Little-endian PCM decoding for the sample types hound writes
trait PcmSample: hound::Sample + Copy {
    fn from_le(raw: &[u8]) -> Self;
}

impl PcmSample for i8 {
    // 8-bit WAV is unsigned
    fn from_le(raw: &[u8]) -> Self {
        (raw[0] ^ 0x80) as i8
    }
}

impl PcmSample for i16 {
    fn from_le(raw: &[u8]) -> Self {
        i16::from_le_bytes([raw[0], raw[1]])
    }
}

impl PcmSample for i32 {
    fn from_le(raw: &[u8]) -> Self {
        match raw {
            [a, b, c] => i32::from_le_bytes([0, *a, *b, *c]) >> 8,
            _ => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        }
    }
}

impl PcmSample for f32 {
    fn from_le(raw: &[u8]) -> Self {
        f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn spec(bits_per_sample: u16) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: 24_000,
            bits_per_sample,
            sample_format: SampleFormat::Int,
        }
    }

    pub(crate) fn wav_with_samples(samples: &[i16]) -> Bytes {
        let mut output = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut output, spec(16)).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        Bytes::from(output.into_inner())
    }

    /// Rewrite the RIFF and data sizes the way a streaming encoder leaves them
    pub(crate) fn with_unknown_sizes(wav: &Bytes) -> Bytes {
        let mut bytes = wav.to_vec();
        bytes[4..8].copy_from_slice(&[0xFF; 4]);
        let data = bytes.windows(4).position(|w| w == b"data").unwrap();
        bytes[data + 4..data + 8].copy_from_slice(&[0xFF; 4]);
        Bytes::from(bytes)
    }

    fn read_samples(wav: &Bytes) -> Vec<i16> {
        WavReader::new(Cursor::new(wav.as_ref()))
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap())
            .collect()
    }

    #[test]
    fn test_concatenate_keeps_sample_order() {
        let a = wav_with_samples(&[1, 2, 3]);
        let b = wav_with_samples(&[4, 5]);

        let combined = concatenate(&[a, b]).unwrap();

        assert_eq!(read_samples(&combined), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_single_file_is_returned_unchanged() {
        let a = wav_with_samples(&[7, 8]);
        let combined = concatenate(std::slice::from_ref(&a)).unwrap();
        assert_eq!(combined, a);
    }

    #[test]
    fn test_streamed_parts_with_unknown_sizes() {
        let a = with_unknown_sizes(&wav_with_samples(&[1, -2, 3]));
        let b = with_unknown_sizes(&wav_with_samples(&[-4, 5]));
        assert!(WavReader::new(Cursor::new(a.as_ref())).is_err());

        let combined = concatenate(&[a, b]).unwrap();

        assert_eq!(read_samples(&combined), vec![1, -2, 3, -4, 5]);
    }

    #[test]
    fn test_streamed_and_finalized_parts_mix() {
        let a = wav_with_samples(&[10, 20]);
        let b = with_unknown_sizes(&wav_with_samples(&[30]));

        let combined = concatenate(&[a, b]).unwrap();

        assert_eq!(read_samples(&combined), vec![10, 20, 30]);
    }

    #[test]
    fn test_single_streamed_part_gets_a_real_header() {
        let a = with_unknown_sizes(&wav_with_samples(&[7, 8, 9]));
        let combined = concatenate(std::slice::from_ref(&a)).unwrap();

        assert_ne!(combined, a);
        assert_eq!(read_samples(&combined), vec![7, 8, 9]);
    }

    #[test]
    fn test_streamed_eight_bit_part() {
        let mut output = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut output, spec(8)).unwrap();
            for s in [-128i8, 0, 127] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        let part = with_unknown_sizes(&Bytes::from(output.into_inner()));

        let combined = concatenate(&[part]).unwrap();
        let samples: Vec<i8> = WavReader::new(Cursor::new(combined.as_ref()))
            .unwrap()
            .into_samples::<i8>()
            .map(|s| s.unwrap())
            .collect();

        assert_eq!(samples, vec![-128, 0, 127]);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            concatenate(&[]),
            Err(TtsError::WavConcatenation(_))
        ));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let junk = Bytes::from_static(b"not a wav file");
        let other = wav_with_samples(&[1]);
        assert!(matches!(
            concatenate(&[junk, other]),
            Err(TtsError::AudioParsing(_))
        ));
    }
}
