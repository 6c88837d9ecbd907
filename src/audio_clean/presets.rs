//! Equalizer band layouts and intensity presets
//!
//! Presets are plain data: a catalog maps a preset name to an ordered list
//! of bands and their gains. Built-in catalogs exist for the four-band and
//! three-band layouts, and a custom catalog can be loaded from config.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EqError;

/// A frequency sub-range. A missing cutoff leaves that side unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandDefinition {
    /// High-pass cutoff in Hz
    #[serde(default)]
    pub low_hz: Option<f32>,
    /// Low-pass cutoff in Hz
    #[serde(default)]
    pub high_hz: Option<f32>,
}

impl BandDefinition {
    pub const fn low_pass(high_hz: f32) -> Self {
        Self {
            low_hz: None,
            high_hz: Some(high_hz),
        }
    }

    pub const fn high_pass(low_hz: f32) -> Self {
        Self {
            low_hz: Some(low_hz),
            high_hz: None,
        }
    }

    pub const fn band_pass(low_hz: f32, high_hz: f32) -> Self {
        Self {
            low_hz: Some(low_hz),
            high_hz: Some(high_hz),
        }
    }
}

impl fmt::Display for BandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.low_hz, self.high_hz) {
            (None, None) => write!(f, "full range"),
            (None, Some(hi)) => write!(f, "<{} Hz", hi),
            (Some(lo), None) => write!(f, ">{} Hz", lo),
            (Some(lo), Some(hi)) => write!(f, "{}-{} Hz", lo, hi),
        }
    }
}

/// A band together with the gain applied to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandGain {
    #[serde(flatten)]
    pub band: BandDefinition,
    pub gain_db: f32,
}

impl BandGain {
    pub const fn new(band: BandDefinition, gain_db: f32) -> Self {
        Self { band, gain_db }
    }

    pub fn linear_gain(&self) -> f32 {
        10.0_f32.powf(self.gain_db / 20.0)
    }
}

/// A named equalization preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntensityPreset {
    pub name: String,
    pub bands: Vec<BandGain>,
}

/// The built-in intensity names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Soft,
    #[default]
    Normal,
    Intense,
}

impl Intensity {
    pub const ALL: [Intensity; 3] = [Intensity::Soft, Intensity::Normal, Intensity::Intense];

    pub fn name(self) -> &'static str {
        match self {
            Intensity::Soft => "soft",
            Intensity::Normal => "normal",
            Intensity::Intense => "intense",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Intensity {
    type Err = EqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intensity::ALL
            .into_iter()
            .find(|i| i.name() == s)
            .ok_or_else(|| EqError::UnknownPreset(s.to_string()))
    }
}

/// Band-layout family for the built-in presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandLayout {
    /// Bass <120, low-mids 120-300, high-mids 3000-5000, highs >5000
    #[default]
    FourBand,
    /// Bass <150, mids 150-4000, highs >4000
    ThreeBand,
}

impl BandLayout {
    pub fn name(self) -> &'static str {
        match self {
            BandLayout::FourBand => "four-band",
            BandLayout::ThreeBand => "three-band",
        }
    }

    /// Band cutoffs shared by every preset in this layout
    pub fn bands(self) -> &'static [BandDefinition] {
        match self {
            BandLayout::FourBand => &FOUR_BAND_BANDS,
            BandLayout::ThreeBand => &THREE_BAND_BANDS,
        }
    }

    /// Per-band gains in dB for an intensity
    pub fn gains(self, intensity: Intensity) -> &'static [f32] {
        match (self, intensity) {
            (BandLayout::FourBand, Intensity::Soft) => &[3.0, -1.0, 1.5, 2.0],
            (BandLayout::FourBand, Intensity::Normal) => &[6.0, -2.0, 3.0, 4.0],
            (BandLayout::FourBand, Intensity::Intense) => &[9.0, -3.0, 5.0, 6.0],
            (BandLayout::ThreeBand, Intensity::Soft) => &[3.0, 0.0, 2.0],
            (BandLayout::ThreeBand, Intensity::Normal) => &[6.0, 1.0, 3.0],
            (BandLayout::ThreeBand, Intensity::Intense) => &[9.0, 2.0, 6.0],
        }
    }

    pub fn preset(self, intensity: Intensity) -> IntensityPreset {
        IntensityPreset {
            name: intensity.name().to_string(),
            bands: self
                .bands()
                .iter()
                .zip(self.gains(intensity))
                .map(|(band, gain)| BandGain::new(*band, *gain))
                .collect(),
        }
    }
}

impl fmt::Display for BandLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BandLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "four-band" => Ok(BandLayout::FourBand),
            "three-band" => Ok(BandLayout::ThreeBand),
            other => Err(format!(
                "Unknown band layout '{}' (expected four-band or three-band)",
                other
            )),
        }
    }
}

const FOUR_BAND_BANDS: [BandDefinition; 4] = [
    BandDefinition::low_pass(120.0),
    BandDefinition::band_pass(120.0, 300.0),
    BandDefinition::band_pass(3000.0, 5000.0),
    BandDefinition::high_pass(5000.0),
];

const THREE_BAND_BANDS: [BandDefinition; 3] = [
    BandDefinition::low_pass(150.0),
    BandDefinition::band_pass(150.0, 4000.0),
    BandDefinition::high_pass(4000.0),
];

/// Named presets available to the equalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetCatalog {
    pub presets: Vec<IntensityPreset>,
}

impl PresetCatalog {
    pub fn new(presets: Vec<IntensityPreset>) -> Self {
        Self { presets }
    }

    /// soft / normal / intense for a built-in layout
    pub fn builtin(layout: BandLayout) -> Self {
        Self::new(
            Intensity::ALL
                .into_iter()
                .map(|intensity| layout.preset(intensity))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Result<&IntensityPreset, EqError> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EqError::UnknownPreset(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin(BandLayout::default())
    }
}
