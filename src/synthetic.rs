//! Deterministic synthetic inputs for demos, tests and the CLI `doctor` check
//!
//! Nothing here is used by the extraction pipeline itself.

use crate::error::ScreeningError;
use crate::extractors::posture::{FrameSize, KeypointDetector, Keypoints, Point};
use image::{DynamicImage, GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::io::Cursor;

/// Archimedean spiral drawn dark on white. `wobble` adds a sinusoidal tremor
/// across the stroke with a wavelength of 1/20 of the image size and an
/// amplitude of `wobble` thousandths of the image size.
pub fn spiral_image(size: u32, turns: f64, wobble: f64) -> DynamicImage {
    let mut image = GrayImage::from_pixel(size, size, Luma([255u8]));
    let centre = size as f64 / 2.0;
    let max_radius = size as f64 * 0.45;
    let half_width = (size as f64 / 150.0).max(1.0);
    let wobble_px = wobble * size as f64 * 0.001;
    let wavelength = size as f64 / 20.0;
    let end = 2.0 * PI * turns.max(0.0);
    let growth = max_radius / end.max(f64::EPSILON);

    // Half-pixel steps along the undisturbed spiral
    let step_len = 0.5;
    let mut theta = 0.0;
    let mut phase = 0.0f64;
    while theta <= end {
        let base = growth * theta;
        let radius = base + wobble_px * phase.sin();
        let x = centre + radius * theta.cos();
        let y = centre + radius * theta.sin();
        stamp(&mut image, x, y, half_width);
        theta += step_len / base.hypot(growth).max(1.0);
        phase += 2.0 * PI * step_len / wavelength;
    }

    DynamicImage::ImageLuma8(image)
}

fn stamp(image: &mut GrayImage, x: f64, y: f64, radius: f64) {
    let (width, height) = image.dimensions();
    let reach = radius.ceil() as i64;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            if ((dx * dx + dy * dy) as f64) > radius * radius {
                continue;
            }
            let (px, py) = (x.round() as i64 + dx, y.round() as i64 + dy);
            if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                image.put_pixel(px as u32, py as u32, Luma([20u8]));
            }
        }
    }
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ScreeningError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .map_err(|e| ScreeningError::InvalidInput(format!("Cannot encode PNG: {e}")))?;
    Ok(bytes)
}

/// Pure sine tone
pub fn tone(freq_hz: f64, sample_rate: u32, seconds: f64, amplitude: f64) -> Vec<f32> {
    let count = (seconds * sample_rate as f64).round() as usize;
    (0..count)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (amplitude * (2.0 * PI * freq_hz * t).sin()) as f32
        })
        .collect()
}

/// Breathy, unsteady phonation: cycle-to-cycle pitch and amplitude perturbation
/// plus additive noise, seeded so every call returns the same samples.
pub fn tremulous_voice(sample_rate: u32, seconds: f64, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = (seconds * sample_rate as f64).round() as usize;
    let mut samples = Vec::with_capacity(count);

    while samples.len() < count {
        let f0 = 150.0 * rng.gen_range(0.85..1.15);
        let amplitude = 0.4 * rng.gen_range(0.5..1.0);
        let period = (sample_rate as f64 / f0).round().max(2.0) as usize;
        for i in 0..period {
            let voiced = amplitude * (2.0 * PI * i as f64 / period as f64).sin();
            let noise = rng.gen_range(-0.15..0.15);
            samples.push((voiced + noise) as f32);
        }
    }

    samples.truncate(count);
    samples
}

/// Hypophonic, faltering phonation around 130 Hz, seeded so every call returns the
/// same samples. The voice breaks off every 40 ms under heavy breath noise.
/// Its pitch alternates by 3 % every 25 ms on top of cycle-to-cycle jitter.
pub fn faltering_voice(sample_rate: u32, seconds: f64, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = (seconds * sample_rate as f64).round() as usize;
    let segment_len = ((0.04 * sample_rate as f64).round() as usize).max(1);
    let alternation_len = ((0.025 * sample_rate as f64).round() as usize).max(1);
    let mut samples = Vec::with_capacity(count);

    let mut loud = true;
    let mut segment_left = 0usize;
    let mut amplitude = 0.0;
    while samples.len() < count {
        let direction = if (samples.len() / alternation_len) % 2 == 0 { 1.0 } else { -1.0 };
        let f0 = 130.0 * (1.0 + 0.03 * direction) * rng.gen_range(0.96..1.04);
        let period = (sample_rate as f64 / f0).round().max(2.0) as usize;
        for i in 0..period {
            if segment_left == 0 {
                loud = !loud;
                segment_left = segment_len;
                amplitude = if loud {
                    rng.gen_range(0.35..0.5)
                } else {
                    rng.gen_range(0.0..0.05)
                };
            }
            segment_left -= 1;
            let voiced = amplitude * (2.0 * PI * i as f64 / period as f64).sin();
            let noise = rng.gen_range(-0.12..0.12);
            samples.push((voiced + noise) as f32);
        }
    }

    samples.truncate(count);
    samples
}

/// Encode mono samples as 16-bit PCM WAV bytes
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, ScreeningError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let to_error = |e: hound::Error| ScreeningError::InvalidInput(format!("Cannot encode WAV: {e}"));

    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).map_err(to_error)?;
        for sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value).map_err(to_error)?;
        }
        writer.finalize().map_err(to_error)?;
    }
    Ok(bytes)
}

/// Front-facing upright stance with slightly bent elbows, centred in the frame
pub fn upright_keypoints(frame: FrameSize) -> Keypoints {
    let cx = frame.width as f64 / 2.0;
    let h = frame.height as f64;
    let at = |dx: f64, y: f64| Point::new(cx + dx * h, y * h);

    Keypoints {
        nose: at(0.0, 0.12),
        left_shoulder: at(-0.10, 0.25),
        right_shoulder: at(0.10, 0.25),
        left_elbow: at(-0.11, 0.40),
        right_elbow: at(0.11, 0.40),
        left_wrist: at(-0.11, 0.53),
        right_wrist: at(0.11, 0.53),
        left_hip: at(-0.06, 0.55),
        right_hip: at(0.06, 0.55),
        left_knee: at(-0.06, 0.72),
        right_knee: at(0.06, 0.72),
        left_ankle: at(-0.06, 0.90),
        right_ankle: at(0.06, 0.90),
    }
}

/// Side-view walk at `cadence` steps/min. Ankles swing in anti-phase and lift
/// during their forward swing; arms swing opposite the legs, the right arm
/// scaled by `right_arm_scale`.
pub fn walking_sequence(
    frame: FrameSize,
    frame_count: usize,
    fps: f64,
    cadence: f64,
    right_arm_scale: f64,
) -> Vec<Keypoints> {
    let base = upright_keypoints(frame);
    let cx = frame.width as f64 / 2.0;
    let h = frame.height as f64;
    let stride = 0.05 * h;
    let lift = 0.06 * h;
    let arm = 0.04 * h;
    // One gait cycle holds two steps
    let cycle_hz = cadence / 120.0;

    (0..frame_count)
        .map(|t| {
            let phase = 2.0 * PI * cycle_hz * t as f64 / fps;
            let (swing, forward) = (phase.sin(), phase.cos());
            let mut k = base.clone();

            k.left_ankle = Point::new(cx + stride * swing, base.left_ankle.y - lift * forward.max(0.0));
            k.right_ankle =
                Point::new(cx - stride * swing, base.right_ankle.y - lift * (-forward).max(0.0));
            k.left_knee = Point::new(cx + stride * swing / 2.0, base.left_knee.y);
            k.right_knee = Point::new(cx - stride * swing / 2.0, base.right_knee.y);
            k.left_hip.x = cx;
            k.right_hip.x = cx;

            k.left_wrist.x = base.left_wrist.x - arm * swing;
            k.right_wrist.x = base.right_wrist.x + arm * right_arm_scale * swing;
            k.left_elbow.x = base.left_elbow.x - arm * swing / 2.0;
            k.right_elbow.x = base.right_elbow.x + arm * right_arm_scale * swing / 2.0;
            k
        })
        .collect()
}

/// Detector that reports the same keypoints for every image
#[derive(Debug, Clone)]
pub struct FixedKeypointDetector {
    keypoints: Keypoints,
}

impl FixedKeypointDetector {
    pub fn new(keypoints: Keypoints) -> Self {
        Self { keypoints }
    }
}

impl KeypointDetector for FixedKeypointDetector {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Keypoints, ScreeningError> {
        Ok(self.keypoints.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spiral_image_has_ink() {
        let image = spiral_image(128, 3.0, 0.0).to_luma8();
        let dark = image.pixels().filter(|p| p.0[0] < 128).count();

        assert!(dark > 200);
        assert!(dark < 128 * 128 / 2);
    }

    #[test]
    fn test_tremulous_voice_is_reproducible() {
        let a = tremulous_voice(8_000, 0.2, 7);
        let b = tremulous_voice(8_000, 0.2, 7);

        assert_eq!(a.len(), 1_600);
        assert_eq!(a, b);
    }

    #[test]
    fn test_faltering_voice_breaks_off() {
        let samples = faltering_voice(16_000, 0.5, 3);
        let segment = 640;
        let peaks: Vec<f32> = samples
            .chunks(segment)
            .map(|c| c.iter().fold(0.0f32, |m, s| m.max(s.abs())))
            .collect();

        assert_eq!(samples.len(), 8_000);
        assert_eq!(samples, faltering_voice(16_000, 0.5, 3));
        assert!(peaks.iter().step_by(2).all(|p| *p < 0.2));
        assert!(peaks.iter().skip(1).step_by(2).all(|p| *p > 0.25));
    }

    #[test]
    fn test_walking_sequence_keeps_ground_contact() {
        let frame = FrameSize::new(640, 480);
        let frames = walking_sequence(frame, 60, 30.0, 120.0, 1.0);

        assert_eq!(frames.len(), 60);
        for k in &frames {
            let lowest = k.left_ankle.y.max(k.right_ankle.y);
            assert!((lowest - 0.9 * 480.0).abs() < 1e-9);
        }
    }
}
