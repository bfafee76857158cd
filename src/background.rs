//! Per-pixel background modelling.
//!
//! [`BackgroundModel`] turns each incoming frame into a foreground mask
//! (255 = moving, 0 = static). [`GaussianMixtureModel`] is the adaptive
//! mixture-of-Gaussians model used for slide detection: every pixel keeps up
//! to [`MAX_MODES`] weighted colour Gaussians, and a pixel is background
//! when it fits one of the heaviest modes that together make up the
//! background ratio of the weight.

use image::{GrayImage, Luma, RgbImage};

/// Gaussians kept per pixel.
pub const MAX_MODES: usize = 5;

/// Produces a foreground mask for every frame it is fed.
///
/// The model is updated by each call; frames must arrive in order and keep
/// the same dimensions for the lifetime of the model.
pub trait BackgroundModel {
    fn apply(&mut self, frame: &RgbImage) -> GrayImage;
}

/// Tuning of [`GaussianMixtureModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureParameters {
    /// Number of frames the learning rate settles to (`1 / history`).
    pub history: u32,
    /// Squared distance, in variances, within which a pixel counts as
    /// background.
    pub variance_threshold: f32,
    /// Squared distance, in variances, within which a pixel updates an
    /// existing mode instead of spawning a new one.
    pub variance_threshold_gen: f32,
    /// Share of the total weight the background modes must cover.
    pub background_ratio: f32,
    pub initial_variance: f32,
    pub min_variance: f32,
    pub max_variance: f32,
    /// Complexity-reduction prior; weak modes decay by this much faster.
    pub complexity_reduction: f32,
}

impl Default for MixtureParameters {
    fn default() -> Self {
        Self {
            history: 500,
            variance_threshold: 16.0,
            variance_threshold_gen: 9.0,
            background_ratio: 0.9,
            initial_variance: 15.0,
            min_variance: 4.0,
            max_variance: 75.0,
            complexity_reduction: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Gaussian {
    weight: f32,
    variance: f32,
    mean: [f32; 3],
}

/// Adaptive Gaussian mixture background subtractor on RGB frames, with
/// shadow detection disabled.
#[derive(Debug, Clone)]
pub struct GaussianMixtureModel {
    parameters: MixtureParameters,
    width: u32,
    height: u32,
    /// `MAX_MODES` slots per pixel, sorted by descending weight.
    modes: Vec<Gaussian>,
    modes_used: Vec<u8>,
    frames_seen: u64,
}

impl GaussianMixtureModel {
    pub fn new(parameters: MixtureParameters) -> Self {
        Self {
            parameters,
            width: 0,
            height: 0,
            modes: Vec::new(),
            modes_used: Vec::new(),
            frames_seen: 0,
        }
    }

    /// Model with the given history and foreground threshold, other
    /// parameters at their defaults.
    pub fn with_history(history: u32, variance_threshold: f32) -> Self {
        Self::new(MixtureParameters {
            history: history.max(1),
            variance_threshold,
            ..MixtureParameters::default()
        })
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    fn reset(&mut self, width: u32, height: u32) {
        let pixels = (width as usize) * (height as usize);
        self.width = width;
        self.height = height;
        self.modes = vec![Gaussian::default(); pixels * MAX_MODES];
        self.modes_used = vec![0; pixels];
        self.frames_seen = 0;
    }

    fn learning_rate(&self) -> f32 {
        let window = (2 * self.frames_seen).min(u64::from(self.parameters.history));
        1.0 / window.max(1) as f32
    }

    /// Update one pixel's mixture and return `true` when it is background.
    fn update_pixel(&mut self, pixel_index: usize, sample: [f32; 3], alpha: f32) -> bool {
        let parameters = self.parameters;
        let prune = -alpha * parameters.complexity_reduction;
        let decay = 1.0 - alpha;
        let start = pixel_index * MAX_MODES;
        let modes = &mut self.modes[start..start + MAX_MODES];
        let mut used = usize::from(self.modes_used[pixel_index]);

        let mut background = false;
        let mut fits = false;
        let mut total_weight = 0.0_f32;

        let mut mode = 0;
        while mode < used {
            let mut weight = decay * modes[mode].weight + prune;
            let mut slot = mode;

            if !fits {
                let variance = modes[mode].variance;
                let diff = [
                    modes[mode].mean[0] - sample[0],
                    modes[mode].mean[1] - sample[1],
                    modes[mode].mean[2] - sample[2],
                ];
                let distance = diff[0] * diff[0] + diff[1] * diff[1] + diff[2] * diff[2];

                if total_weight < parameters.background_ratio
                    && distance < parameters.variance_threshold * variance
                {
                    background = true;
                }

                if distance < parameters.variance_threshold_gen * variance {
                    fits = true;
                    weight += alpha;
                    let k = alpha / weight;
                    for channel in 0..3 {
                        modes[mode].mean[channel] -= k * diff[channel];
                    }
                    modes[mode].variance = (variance + k * (distance - variance))
                        .clamp(parameters.min_variance, parameters.max_variance);

                    // Keep modes sorted by weight.
                    while slot > 0 && weight >= modes[slot - 1].weight {
                        modes.swap(slot, slot - 1);
                        slot -= 1;
                    }
                }
            }

            if weight < -prune {
                weight = 0.0;
                used -= 1;
            }
            modes[slot].weight = weight;
            total_weight += weight;
            mode += 1;
        }

        if total_weight > 0.0 {
            let scale = 1.0 / total_weight;
            for gaussian in modes.iter_mut().take(used) {
                gaussian.weight *= scale;
            }
        }

        if !fits && alpha > 0.0 {
            let slot = if used == MAX_MODES {
                MAX_MODES - 1
            } else {
                used += 1;
                used - 1
            };

            if used == 1 {
                modes[slot].weight = 1.0;
            } else {
                modes[slot].weight = alpha;
                for gaussian in modes.iter_mut().take(used - 1) {
                    gaussian.weight *= decay;
                }
            }
            modes[slot].mean = sample;
            modes[slot].variance = parameters.initial_variance;

            let mut slot = slot;
            while slot > 0 && alpha >= modes[slot - 1].weight {
                modes.swap(slot, slot - 1);
                slot -= 1;
            }
        }

        self.modes_used[pixel_index] = used as u8;
        background
    }
}

impl Default for GaussianMixtureModel {
    fn default() -> Self {
        Self::new(MixtureParameters::default())
    }
}

impl BackgroundModel for GaussianMixtureModel {
    fn apply(&mut self, frame: &RgbImage) -> GrayImage {
        let (width, height) = frame.dimensions();
        if width != self.width || height != self.height || self.modes.is_empty() {
            log::debug!("Background model sized to {width}x{height}");
            self.reset(width, height);
        }

        self.frames_seen += 1;
        let alpha = self.learning_rate();
        let mut mask = GrayImage::new(width, height);

        for (pixel_index, (x, y, pixel)) in frame.enumerate_pixels().enumerate() {
            let sample = [
                f32::from(pixel[0]),
                f32::from(pixel[1]),
                f32::from(pixel[2]),
            ];
            if !self.update_pixel(pixel_index, sample, alpha) {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        mask
    }
}

/// Share of non-zero mask pixels, in percent.
pub fn foreground_percent(mask: &GrayImage) -> f64 {
    let total = u64::from(mask.width()) * u64::from(mask.height());
    if total == 0 {
        return 0.0;
    }
    let moving = mask.pixels().filter(|pixel| pixel[0] != 0).count() as f64;
    100.0 * moving / total as f64
}
