use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use logdeck_types::{Rgb, SourceColor};

/// Golden-angle step keeps probed hues spread around the wheel.
const GOLDEN_ANGLE: f32 = 137.508;

/// Assigned hues closer than this are treated as colliding.
const MIN_HUE_SEPARATION: f32 = 24.0;

const PROBE_LIMIT: usize = 16;

/// Per-source display color assignment.
///
/// Colors derive from a hash of the source key, nudged away from hues already
/// in use. An assignment never changes once made; the cache lives as long as
/// the generator, independent of which sources the store currently holds.
#[derive(Debug, Default)]
pub struct ColorGenerator {
    assigned: HashMap<String, SourceColor>,
    used_hues: Vec<f32>,
}

impl ColorGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color for `key`, assigning one on first sight.
    pub fn generate_if_needed(&mut self, key: &str) -> SourceColor {
        if let Some(color) = self.assigned.get(key) {
            return *color;
        }

        let hue = self.pick_hue(key);
        self.used_hues.push(hue);
        let color = SourceColor {
            light: Rgb::from_hsl(hue, 0.65, 0.42),
            dark: Rgb::from_hsl(hue, 0.70, 0.65),
        };
        self.assigned.insert(key.to_string(), color);
        color
    }

    pub fn color_for(&self, key: &str) -> Option<SourceColor> {
        self.assigned.get(key).copied()
    }

    /// Full key-to-color mapping, for snapshots.
    pub fn assigned(&self) -> &HashMap<String, SourceColor> {
        &self.assigned
    }

    fn pick_hue(&self, key: &str) -> f32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let mut hue = (hasher.finish() % 360) as f32;

        for _ in 0..PROBE_LIMIT {
            if !self.collides(hue) {
                break;
            }
            hue = (hue + GOLDEN_ANGLE).rem_euclid(360.0);
        }
        hue
    }

    fn collides(&self, hue: f32) -> bool {
        self.used_hues
            .iter()
            .any(|&used| hue_distance(used, hue) < MIN_HUE_SEPARATION)
    }
}

/// Angular distance on the hue circle.
fn hue_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).abs() % 360.0;
    d.min(360.0 - d)
}
