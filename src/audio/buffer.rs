//! Interleaved PCM buffer with the handful of editing operations the
//! slicer and composer need: cut, fade, normalize, concatenate, overlay,
//! silence and padding.

/// Peak target for normalization, ~0.1 dB below full scale.
const NORMALIZE_PEAK: f32 = 0.9886;

/// A decoded chunk of audio: interleaved `f32` samples plus format.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    /// A silent buffer of the given length and format.
    pub fn silence(ms: u64, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let sample_rate = sample_rate.max(1);
        let frames = ms_to_frames(ms, sample_rate);
        Self {
            samples: vec![0.0; frames * channels as usize],
            channels,
            sample_rate,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len_ms(&self) -> u64 {
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    /// Cut `[begin_ms, end_ms)` out of the buffer. Bounds are clamped to
    /// the buffer; an inverted window yields an empty buffer.
    pub fn slice_ms(&self, begin_ms: u64, end_ms: u64) -> AudioBuffer {
        let begin = ms_to_frames(begin_ms, self.sample_rate).min(self.frames());
        let end = ms_to_frames(end_ms, self.sample_rate).min(self.frames());
        let (begin, end) = (begin.min(end), end);
        let ch = self.channels as usize;
        AudioBuffer {
            samples: self.samples[begin * ch..end * ch].to_vec(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Linear fade from silence over the first `ms` milliseconds.
    pub fn fade_in(&mut self, ms: u64) {
        let fade_frames = ms_to_frames(ms, self.sample_rate).min(self.frames());
        if fade_frames == 0 {
            return;
        }
        let ch = self.channels as usize;
        for frame in 0..fade_frames {
            let gain = frame as f32 / fade_frames as f32;
            for s in &mut self.samples[frame * ch..(frame + 1) * ch] {
                *s *= gain;
            }
        }
    }

    /// Linear fade to silence over the last `ms` milliseconds.
    pub fn fade_out(&mut self, ms: u64) {
        let fade_frames = ms_to_frames(ms, self.sample_rate).min(self.frames());
        if fade_frames == 0 {
            return;
        }
        let ch = self.channels as usize;
        let total = self.frames();
        for (i, frame) in (total - fade_frames..total).enumerate() {
            let gain = (fade_frames - i) as f32 / fade_frames as f32;
            for s in &mut self.samples[frame * ch..(frame + 1) * ch] {
                *s *= gain;
            }
        }
    }

    /// Scale the buffer so its peak sits just below full scale. Silence
    /// is left untouched.
    pub fn normalize(&mut self) {
        let peak = self.samples.iter().fold(0.0f32, |p, s| p.max(s.abs()));
        if peak <= f32::EPSILON {
            return;
        }
        let gain = NORMALIZE_PEAK / peak;
        for s in &mut self.samples {
            *s *= gain;
        }
    }

    /// Convert to the given format: linear-interpolation resample plus
    /// naive channel up/down-mix. A no-op when formats already match.
    pub fn conform(&self, channels: u16, sample_rate: u32) -> AudioBuffer {
        if self.channels == channels && self.sample_rate == sample_rate {
            return self.clone();
        }

        let src_ch = self.channels as usize;
        let dst_ch = channels.max(1) as usize;
        let src_frames = self.frames();
        let dst_frames = if self.sample_rate == sample_rate {
            src_frames
        } else {
            (src_frames as u64 * sample_rate as u64 / self.sample_rate as u64) as usize
        };

        let mut samples = Vec::with_capacity(dst_frames * dst_ch);
        for dst_frame in 0..dst_frames {
            // Position of this output frame in source frames.
            let pos = dst_frame as f64 * self.sample_rate as f64 / sample_rate as f64;
            let lo = (pos.floor() as usize).min(src_frames.saturating_sub(1));
            let hi = (lo + 1).min(src_frames.saturating_sub(1));
            let t = (pos - lo as f64) as f32;

            // Average across source channels, then spread over destination
            // channels. Good enough for mono/stereo material.
            let mut mixed = 0.0f32;
            for c in 0..src_ch {
                let a = self.samples[lo * src_ch + c];
                let b = self.samples[hi * src_ch + c];
                mixed += a + (b - a) * t;
            }
            mixed /= src_ch as f32;
            for _ in 0..dst_ch {
                samples.push(mixed);
            }
        }

        AudioBuffer {
            samples,
            channels: dst_ch as u16,
            sample_rate,
        }
    }

    /// Append `other`, conforming it to this buffer's format first.
    pub fn append(&mut self, other: &AudioBuffer) {
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        let other = other.conform(self.channels, self.sample_rate);
        self.samples.extend_from_slice(&other.samples);
    }

    /// Mix `other` on top of this buffer, sample by sample. The result is
    /// as long as the longer of the two.
    pub fn overlay(&self, other: &AudioBuffer) -> AudioBuffer {
        if self.is_empty() {
            return other.clone();
        }
        let other = other.conform(self.channels, self.sample_rate);
        let mut samples = if self.samples.len() >= other.samples.len() {
            self.samples.clone()
        } else {
            other.samples.clone()
        };
        let shorter = if self.samples.len() >= other.samples.len() {
            &other.samples
        } else {
            &self.samples
        };
        for (dst, src) in samples.iter_mut().zip(shorter.iter()) {
            *dst += *src;
        }
        AudioBuffer {
            samples,
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Extend with trailing silence up to `ms` total length. Already-long
    /// buffers are left alone.
    pub fn pad_to_ms(&mut self, ms: u64) {
        let target = ms_to_frames(ms, self.sample_rate) * self.channels as usize;
        if target > self.samples.len() {
            self.samples.resize(target, 0.0);
        }
    }
}

fn ms_to_frames(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}
