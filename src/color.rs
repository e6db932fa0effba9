//! Domain color sampling from the power-icon region of a card image.

use image::imageops::{self, FilterType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::card::Domain;
use crate::error::Result;

const SAMPLE_SIZE: u32 = 64;
const MIN_SATURATION: f64 = 0.35;
const MIN_VALUE: f64 = 0.25;
/// Hue distance (degrees) at which a pixel stops counting toward a domain
const HUE_FALLOFF: f64 = 50.0;
const SECONDARY_SHARE: f64 = 0.25;

/// Summary of domain hues found in an image region
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainColorSample {
    pub domains: Vec<String>,
    pub confidence: f64,
    pub weights: BTreeMap<String, f64>,
}

impl DomainColorSample {
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Anything that can turn a card image into a color hint
pub trait ColorSampler: Send + Sync {
    fn sample(&self, image: &Path) -> Result<DomainColorSample>;
}

/// Samples the upper-right cost corner where power icons are printed
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerIconSampler;

impl ColorSampler for PowerIconSampler {
    fn sample(&self, image: &Path) -> Result<DomainColorSample> {
        let rgb = image::open(image)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let (left, top, right, bottom) = power_icon_crop_box(width, height);
        if right <= left || bottom <= top {
            return Ok(DomainColorSample::default());
        }

        let region = imageops::crop_imm(&rgb, left, top, right - left, bottom - top).to_image();
        let region = imageops::resize(&region, SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Lanczos3);

        let sample = analyze_pixels(region.pixels().map(|p| p.0));
        debug!(
            "Color sample for {}: {:?} (confidence {:.2})",
            image.display(),
            sample.domains,
            sample.confidence
        );
        Ok(sample)
    }
}

/// A generous slice of the frame's upper-right corner
fn power_icon_crop_box(width: u32, height: u32) -> (u32, u32, u32, u32) {
    let scale = |v: u32, f: f64| (v as f64 * f) as u32;
    (
        scale(width, 0.60),
        scale(height, 0.02),
        scale(width, 0.98),
        scale(height, 0.20),
    )
}

/// Score RGB pixels against the domain hue centers.
///
/// Greyish and dark pixels are ignored. Confidence is the primary domain's
/// share of the total weight; a second domain is reported when it holds at
/// least a quarter of the weight.
pub fn analyze_pixels<I>(pixels: I) -> DomainColorSample
where
    I: IntoIterator<Item = [u8; 3]>,
{
    let mut weights: Vec<(Domain, f64)> = Domain::ALL.iter().map(|d| (*d, 0.0)).collect();
    let mut counted = 0usize;

    for [r, g, b] in pixels {
        let (hue, saturation, value) = rgb_to_hsv(r, g, b);
        if saturation < MIN_SATURATION || value < MIN_VALUE {
            continue;
        }
        counted += 1;
        let (domain, score) = nearest_domain(hue);
        if let Some(entry) = weights.iter_mut().find(|(d, _)| *d == domain) {
            entry.1 += score;
        }
    }

    if counted == 0 {
        return DomainColorSample::default();
    }

    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    let total = if total > 0.0 { total } else { 1.0 };

    let mut ordered = weights.clone();
    // stable: ties keep hue-table order
    ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (primary, primary_weight) = ordered[0];
    let mut domains = vec![primary.as_str().to_string()];
    if let Some((second, second_weight)) = ordered.get(1) {
        if second_weight / total >= SECONDARY_SHARE {
            domains.push(second.as_str().to_string());
        }
    }

    DomainColorSample {
        domains,
        confidence: (primary_weight / total).min(1.0),
        weights: weights
            .into_iter()
            .map(|(d, w)| (d.as_str().to_string(), w))
            .collect(),
    }
}

/// Closest domain hue and a similarity score in `[0, 1]`
fn nearest_domain(hue: f64) -> (Domain, f64) {
    let mut best = Domain::Fury;
    let mut best_distance = f64::MAX;
    for domain in Domain::ALL {
        let distance = (hue - domain.hue()).abs();
        let distance = distance.min(360.0 - distance);
        if distance < best_distance {
            best_distance = distance;
            best = domain;
        }
    }
    (best, (1.0 - best_distance / HUE_FALLOFF).max(0.0))
}

/// Hue in degrees, saturation and value in `[0, 1]`
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let value = max;
    if max == min {
        return (0.0, 0.0, value);
    }
    let delta = max - min;
    let saturation = delta / max;

    let rc = (max - r) / delta;
    let gc = (max - g) / delta;
    let bc = (max - b) / delta;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    let h = (h / 6.0).rem_euclid(1.0);

    (h * 360.0, saturation, value)
}
