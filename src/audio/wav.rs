//! WAV file reading and writing.

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{AudioBuffer, AudioError};

/// Load a WAV file as mono `f32` samples.
///
/// Integer formats are normalized to [-1, 1]; multi-channel files are
/// averaged down to one channel.
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer, AudioError> {
    let path = path.as_ref();
    let wav_err = |source| AudioError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::UnsupportedFormat {
            path: path.to_path_buf(),
            detail: "zero channels".into(),
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(wav_err)?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    detail: format!("{} bits per sample", spec.bits_per_sample),
                });
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(wav_err)?
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}

/// Save a buffer as a mono 32-bit float WAV file.
pub fn save_wav<P: AsRef<Path>>(path: P, buffer: &AudioBuffer) -> Result<(), AudioError> {
    let path = path.as_ref();
    if buffer.sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate(buffer.sample_rate));
    }
    let wav_err = |source| AudioError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in &buffer.samples {
        writer.write_sample(sample).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    Ok(())
}

/// Cut the first `seconds` of every WAV file in `input_dir` into `output_dir`.
///
/// Files that fail to load are logged and skipped. Returns the written paths.
pub fn trim_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    input_dir: P,
    output_dir: Q,
    seconds: f32,
) -> Result<Vec<PathBuf>, AudioError> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let mut entries: Vec<PathBuf> = fs::read_dir(input_dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    entries.sort();

    let mut written = Vec::with_capacity(entries.len());
    for path in entries {
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = output_dir.join(file_name);

        match load_wav(&path) {
            Ok(mut buffer) => {
                buffer.trim_to_seconds(seconds);
                save_wav(&target, &buffer)?;
                log::info!("Trimmed {} -> {}", path.display(), target.display());
                written.push(target);
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
            }
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sine(len: usize, sample_rate: u32) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.5)
            .collect();
        AudioBuffer::new(samples, sample_rate)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let buffer = sine(4410, 44100);
        save_wav(&path, &buffer).unwrap();

        let loaded = load_wav(&path).unwrap();
        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded.len(), buffer.len());
        assert!((loaded.samples[100] - buffer.samples[100]).abs() < 1e-6);
    }

    #[test]
    fn test_load_int_stereo_downmix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = load_wav(&path).unwrap();
        assert_eq!(loaded.len(), 10);
        assert!((loaded.samples[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = load_wav(dir.path().join("missing.wav"));
        assert!(matches!(result, Err(AudioError::Wav { .. })));
    }

    #[test]
    fn test_trim_directory() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();

        save_wav(input.path().join("a.wav"), &sine(8000, 1000)).unwrap();
        save_wav(input.path().join("b.wav"), &sine(2000, 1000)).unwrap();
        fs::write(input.path().join("notes.txt"), "not audio").unwrap();
        fs::write(input.path().join("broken.wav"), "not a wav").unwrap();

        let written = trim_directory(input.path(), output.path(), 3.0).unwrap();
        assert_eq!(written.len(), 2);

        let a = load_wav(output.path().join("a.wav")).unwrap();
        let b = load_wav(output.path().join("b.wav")).unwrap();
        assert_eq!(a.len(), 3000);
        assert_eq!(b.len(), 2000);
    }
}
