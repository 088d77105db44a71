use std::str::FromStr;

use glam::Vec3;

pub const DEFAULT_LIGHT_POSITION: Vec3 = Vec3::new(500.0, 500.0, 500.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Light travels from here towards the origin.
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingRig {
    pub directional: DirectionalLight,
    pub ambient: AmbientLight,
}

impl Default for LightingRig {
    fn default() -> Self {
        Self {
            directional: DirectionalLight {
                position: DEFAULT_LIGHT_POSITION,
                color: Vec3::ONE,
                intensity: 2.0,
            },
            ambient: AmbientLight {
                color: Vec3::splat(0x33 as f32 / 255.0),
                intensity: 2.0,
            },
        }
    }
}

impl LightingRig {
    pub fn apply_preset(&mut self, preset: LightingPreset) {
        self.directional.position = preset.light_position();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightingPreset {
    Normal,
    Top,
    Bottom,
}

impl LightingPreset {
    pub const ALL: [LightingPreset; 3] = [
        LightingPreset::Normal,
        LightingPreset::Top,
        LightingPreset::Bottom,
    ];

    pub fn light_position(self) -> Vec3 {
        match self {
            LightingPreset::Normal => Vec3::new(1.0, 0.0, 0.0),
            LightingPreset::Top => Vec3::new(0.0, 20.0, 0.0),
            LightingPreset::Bottom => Vec3::new(0.0, -20.0, 0.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LightingPreset::Normal => "normal",
            LightingPreset::Top => "top",
            LightingPreset::Bottom => "bottom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lighting preset: {0}")]
pub struct UnknownLightingPreset(pub String);

impl FromStr for LightingPreset {
    type Err = UnknownLightingPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LightingPreset::ALL
            .into_iter()
            .find(|preset| preset.label() == s)
            .ok_or_else(|| UnknownLightingPreset(s.to_string()))
    }
}
