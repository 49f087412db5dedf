//! Energy-based voice activity detection.
//!
//! Timestamps come from the audio signal itself: RMS energy is computed per
//! analysis frame and a percentile of the energy distribution separates
//! speech from silence. Detected regions are then grouped into chunk spans
//! sized for single API calls.

use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::config::VadConfig;
use crate::error::{Result, GensubError};

/// One detected span of continuous speech, in seconds from file start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechRegion {
    pub start: f64,
    pub end: f64,
}

impl SpeechRegion {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Adjacent regions grouped into one API-call-sized span.
#[derive(Debug, Clone)]
pub struct ChunkSpan {
    pub start: f64,
    pub end: f64,
    pub regions: Vec<SpeechRegion>,
}

impl ChunkSpan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Voice activity detector over decoded WAV audio.
pub struct VoiceActivityDetector {
    config: VadConfig,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }

    /// Detect speech regions in a decoded WAV file.
    ///
    /// Frames at or below the energy threshold are silence. A silent frame
    /// closes an open region, as does reaching the maximum region length;
    /// regions shorter than the minimum are discarded. Audio shorter than
    /// one analysis frame is returned as a single region; audio with no
    /// samples at all is an error.
    pub fn find_speech_regions(&self, wav_path: &Path) -> Result<Vec<SpeechRegion>> {
        if self.config.frame_width == 0 {
            return Err(GensubError::Vad("frame_width must be non-zero".to_string()));
        }

        let mut reader = WavReader::open(wav_path)?;
        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(GensubError::Vad(format!(
                "expected 16-bit PCM analysis audio, got {}-bit {:?}",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        let total_frames = reader.duration() as u64;
        if total_frames == 0 {
            return Err(GensubError::Vad("decoded audio is empty".to_string()));
        }
        let total_duration = total_frames as f64 / spec.sample_rate as f64;
        let chunk_duration = self.config.frame_width as f64 / spec.sample_rate as f64;
        let n_chunks = (total_frames / self.config.frame_width as u64) as usize;

        if n_chunks == 0 {
            return Ok(vec![SpeechRegion { start: 0.0, end: total_duration }]);
        }

        let samples_per_frame = self.config.frame_width * spec.channels as usize;
        let mut samples = reader.samples::<i16>();
        let mut energies = Vec::with_capacity(n_chunks);
        for _ in 0..n_chunks {
            let frame = samples
                .by_ref()
                .take(samples_per_frame)
                .collect::<std::result::Result<Vec<i16>, _>>()?;
            if frame.is_empty() {
                break;
            }
            energies.push(rms_energy(&frame));
        }

        if energies.is_empty() {
            return Ok(vec![SpeechRegion { start: 0.0, end: total_duration }]);
        }

        let threshold = percentile(&energies, self.config.energy_percentile);
        debug!(
            "VAD: {} frames of {:.3}s, silence threshold {:.1}",
            energies.len(),
            chunk_duration,
            threshold
        );

        Ok(self.detect_regions(&energies, chunk_duration, threshold))
    }

    /// Frame-level region detection over precomputed energies.
    fn detect_regions(
        &self,
        energies: &[f64],
        chunk_duration: f64,
        threshold: f64,
    ) -> Vec<SpeechRegion> {
        let mut elapsed: f64 = 0.0;
        let mut regions = Vec::new();
        let mut region_start: Option<f64> = None;

        for &energy in energies {
            let is_silence = energy <= threshold;
            let max_exceeded = region_start
                .map(|start| elapsed - start >= self.config.max_region_secs)
                .unwrap_or(false);

            if let Some(start) = region_start {
                if max_exceeded || is_silence {
                    if elapsed - start >= self.config.min_region_secs {
                        regions.push(SpeechRegion { start, end: elapsed });
                    }
                    region_start = None;
                }
            } else if !is_silence {
                region_start = Some(elapsed);
            }

            elapsed += chunk_duration;
        }

        if let Some(start) = region_start {
            if elapsed - start >= self.config.min_region_secs {
                regions.push(SpeechRegion { start, end: elapsed });
            }
        }

        regions
    }

    /// Merge adjacent regions into chunk spans.
    ///
    /// A region joins the current span while the bridged gap stays within
    /// `max_gap_secs` and the span stays within `max_group_secs`.
    pub fn group_regions(&self, regions: &[SpeechRegion]) -> Vec<ChunkSpan> {
        let mut iter = regions.iter().copied();
        let first = match iter.next() {
            Some(region) => region,
            None => return Vec::new(),
        };

        let mut spans = Vec::new();
        let mut current = ChunkSpan {
            start: first.start,
            end: first.end,
            regions: vec![first],
        };

        for region in iter {
            let gap = region.start - current.end;
            let new_duration = region.end - current.start;

            if gap <= self.config.max_gap_secs && new_duration <= self.config.max_group_secs {
                current.end = region.end;
                current.regions.push(region);
            } else {
                spans.push(current);
                current = ChunkSpan {
                    start: region.start,
                    end: region.end,
                    regions: vec![region],
                };
            }
        }

        spans.push(current);
        spans
    }

    /// Fixed-interval fallback used when WAV analysis fails: spans of
    /// `max_group_secs` tiling the whole duration with no gaps.
    pub fn fixed_spans(&self, total_duration: f64) -> Vec<ChunkSpan> {
        if total_duration <= 0.0 {
            return Vec::new();
        }

        let step = self.config.max_group_secs;
        if step <= 0.0 {
            return vec![ChunkSpan {
                start: 0.0,
                end: total_duration,
                regions: vec![SpeechRegion { start: 0.0, end: total_duration }],
            }];
        }

        let mut spans = Vec::new();
        let mut start = 0.0;

        while start < total_duration {
            let end = (start + step).min(total_duration);
            spans.push(ChunkSpan {
                start,
                end,
                regions: vec![SpeechRegion { start, end }],
            });
            start = end;
        }

        spans
    }
}

/// Duration of a WAV file in seconds, from its header.
pub fn wav_duration(wav_path: &Path) -> Result<f64> {
    let reader = WavReader::open(wav_path)?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Root-mean-square energy of one frame of samples.
fn rms_energy(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_sq: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Interpolated percentile over unsorted values (0.0 - 1.0).
fn percentile(values: &[f64], percent: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let k = (sorted.len() - 1) as f64 * percent;
    let floor = k.floor();
    let ceil = k.ceil();
    if floor == ceil {
        return sorted[k as usize];
    }

    let lower = sorted[floor as usize] * (ceil - k);
    let upper = sorted[ceil as usize] * (k - floor);
    lower + upper
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    const EPS: f64 = 1e-6;

    fn detector(config: VadConfig) -> VoiceActivityDetector {
        VoiceActivityDetector::new(config)
    }

    fn region(start: f64, end: f64) -> SpeechRegion {
        SpeechRegion { start, end }
    }

    /// Write a 16 kHz mono WAV made of (duration_secs, amplitude) stretches.
    fn write_test_wav(path: &Path, pattern: &[(f64, i16)]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &(duration, amplitude) in pattern {
            let n = (duration * 16000.0) as usize;
            for i in 0..n {
                // Alternate sign so the stretch has the intended RMS without
                // a DC offset.
                let sample = if i % 2 == 0 { amplitude } else { -amplitude };
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_rms_energy() {
        assert_eq!(rms_energy(&[]), 0.0);
        assert!((rms_energy(&[1, 1, -1, -1]) - 1.0).abs() < EPS);
        assert!((rms_energy(&[0, 3, 4, 0]) - 2.5).abs() < EPS);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        // k = 0.6 between the first two entries
        assert!((percentile(&values, 0.2) - 1.6).abs() < EPS);
        assert!((percentile(&values, 0.0) - 1.0).abs() < EPS);
        assert!((percentile(&values, 1.0) - 4.0).abs() < EPS);
        // Order of the input must not matter
        let shuffled = vec![4.0, 1.0, 3.0, 2.0];
        assert!((percentile(&shuffled, 0.2) - 1.6).abs() < EPS);
    }

    #[test]
    fn test_detect_regions_basic_bursts() {
        let vad = detector(VadConfig::default());
        let chunk = 0.256;
        // 4 silent, 4 speech, 4 silent, 4 speech, 4 silent frames
        let mut energies = Vec::new();
        for block in [0.0, 500.0, 0.0, 500.0, 0.0] {
            energies.extend(std::iter::repeat(block).take(4));
        }

        let regions = vad.detect_regions(&energies, chunk, 0.0);
        assert_eq!(regions.len(), 2);
        assert!((regions[0].start - 4.0 * chunk).abs() < EPS);
        assert!((regions[0].end - 8.0 * chunk).abs() < EPS);
        assert!((regions[1].start - 12.0 * chunk).abs() < EPS);
        assert!((regions[1].end - 16.0 * chunk).abs() < EPS);
    }

    #[test]
    fn test_detect_regions_drops_short_bursts() {
        let vad = detector(VadConfig::default());
        let chunk = 0.256;
        // A single speech frame is shorter than min_region_secs
        let energies = vec![0.0, 800.0, 0.0, 0.0];

        let regions = vad.detect_regions(&energies, chunk, 0.0);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_detect_regions_splits_at_max_length() {
        let vad = detector(VadConfig::default());
        let chunk = 0.256;
        let energies = vec![700.0; 30];

        let regions = vad.detect_regions(&energies, chunk, 0.0);
        assert_eq!(regions.len(), 2);
        // First region closes at the first frame where it reaches 6s; the
        // closing frame itself restarts nothing, so the second region opens
        // one frame later.
        assert!((regions[0].start - 0.0).abs() < EPS);
        assert!((regions[0].end - 24.0 * chunk).abs() < EPS);
        assert!((regions[1].start - 25.0 * chunk).abs() < EPS);
        assert!((regions[1].end - 30.0 * chunk).abs() < EPS);
        for region in &regions {
            assert!(region.duration() <= vad.config.max_region_secs + chunk);
        }
    }

    #[test]
    fn test_detect_regions_ordered_and_non_overlapping() {
        let vad = detector(VadConfig::default());
        let chunk = 0.256;
        let energies: Vec<f64> = (0..200)
            .map(|i| if (i / 7) % 2 == 0 { 900.0 } else { 0.0 })
            .collect();

        let regions = vad.detect_regions(&energies, chunk, 0.0);
        assert!(!regions.is_empty());
        for pair in regions.windows(2) {
            assert!(pair[0].end <= pair[1].start + EPS);
        }
        for region in &regions {
            assert!(region.start < region.end);
        }
    }

    #[test]
    fn test_find_speech_regions_on_synthetic_wav() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("bursts.wav");
        write_test_wav(
            &wav,
            &[(1.0, 0), (1.0, 2000), (2.0, 0), (1.0, 2000), (1.0, 0)],
        );

        let vad = detector(VadConfig::default());
        let regions = vad.find_speech_regions(&wav).unwrap();

        assert_eq!(regions.len(), 2);
        // Frame quantization shifts boundaries by at most one frame (0.256s)
        assert!((regions[0].start - 1.0).abs() < 0.3);
        assert!((regions[0].end - 2.0).abs() < 0.3);
        assert!((regions[1].start - 4.0).abs() < 0.3);
        assert!((regions[1].end - 5.0).abs() < 0.3);
    }

    #[test]
    fn test_find_speech_regions_tiny_file_is_one_region() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("tiny.wav");
        // 0.1s is shorter than one 4096-sample frame
        write_test_wav(&wav, &[(0.1, 1200)]);

        let vad = detector(VadConfig::default());
        let regions = vad.find_speech_regions(&wav).unwrap();

        assert_eq!(regions.len(), 1);
        assert!((regions[0].start - 0.0).abs() < EPS);
        assert!((regions[0].end - 0.1).abs() < 0.01);
    }

    #[test]
    fn test_find_speech_regions_rejects_empty_audio() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("empty.wav");
        // Header only, zero samples
        write_test_wav(&wav, &[]);

        let vad = detector(VadConfig::default());
        let result = vad.find_speech_regions(&wav);

        assert!(matches!(result, Err(GensubError::Vad(_))));
    }

    #[test]
    fn test_group_regions_merges_within_gap() {
        let vad = detector(VadConfig::default());
        let regions = vec![
            region(0.0, 6.0),
            region(6.5, 12.0),
            region(14.9, 20.0),
            region(40.0, 45.0),
        ];

        let spans = vad.group_regions(&regions);
        assert_eq!(spans.len(), 3);
        assert!((spans[0].start - 0.0).abs() < EPS);
        assert!((spans[0].end - 12.0).abs() < EPS);
        assert_eq!(spans[0].regions.len(), 2);
        assert!((spans[1].start - 14.9).abs() < EPS);
        assert!((spans[2].start - 40.0).abs() < EPS);
    }

    #[test]
    fn test_group_regions_respects_max_duration() {
        let vad = detector(VadConfig::default());
        // Gap is small but merging would exceed 30s
        let regions = vec![region(0.0, 20.0), region(21.0, 35.0)];

        let spans = vad.group_regions(&regions);
        assert_eq!(spans.len(), 2);
        for span in &spans {
            assert!(span.duration() <= vad.config.max_group_secs);
        }
    }

    #[test]
    fn test_group_regions_preserves_order_and_coverage() {
        let vad = detector(VadConfig::default());
        let regions: Vec<SpeechRegion> = (0..12)
            .map(|i| region(i as f64 * 5.0, i as f64 * 5.0 + 3.0))
            .collect();

        let spans = vad.group_regions(&regions);
        let grouped: usize = spans.iter().map(|s| s.regions.len()).sum();
        assert_eq!(grouped, regions.len());
        for pair in spans.windows(2) {
            assert!(pair[0].end <= pair[1].start + EPS);
        }
        // Every region is fully contained in its span
        for span in &spans {
            for region in &span.regions {
                assert!(region.start >= span.start - EPS);
                assert!(region.end <= span.end + EPS);
            }
        }
    }

    #[test]
    fn test_fixed_spans_tile_duration_exactly() {
        let vad = detector(VadConfig::default());
        let spans = vad.fixed_spans(75.0);

        assert_eq!(spans.len(), 3);
        assert!((spans[0].start - 0.0).abs() < EPS);
        assert!((spans[2].end - 75.0).abs() < EPS);
        for pair in spans.windows(2) {
            // No gap at all between fallback spans
            assert!((pair[0].end - pair[1].start).abs() < EPS);
        }
        assert!(vad.fixed_spans(0.0).is_empty());
    }

    #[test]
    fn test_wav_duration_matches_written_audio() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("length.wav");
        write_test_wav(&wav, &[(2.5, 1000)]);

        let duration = wav_duration(&wav).unwrap();
        assert!((duration - 2.5).abs() < 0.001);
    }
}
