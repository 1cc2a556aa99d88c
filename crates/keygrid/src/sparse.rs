use serde::{Deserialize, Deserializer};

use crate::grid::Config;

/// The generator's claimed output: an ordered list of rectangular fills,
/// then an ordered list of per-cell overrides. Later entries win on overlap.
/// Unknown keys are ignored everywhere; the generator is untrusted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseLevel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fills: Vec<Fill>,
    #[serde(default)]
    pub cells: Vec<CellPatch>,
    #[serde(default)]
    pub missions: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub lives: Option<u32>,
    #[serde(default)]
    pub inventory_capacity: Option<u32>,
}

/// Inclusive rectangle. Coordinates are kept signed so off-grid values from
/// the generator survive parsing and get clamped during expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct Fill {
    pub r1: i64,
    pub c1: i64,
    pub r2: i64,
    pub c2: i64,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
}

/// Single-cell override, applied after all fills.
///
/// `object` distinguishes three states: key absent (leave the object layer
/// alone), `null` (explicitly clear it), and a type name (set it).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellPatch {
    pub r: i64,
    pub c: i64,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub floor_config: Option<Config>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub object: Option<Option<String>>,
    #[serde(default)]
    pub object_config: Option<Config>,
}

fn present_or_null<'de, D>(d: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(d).map(Some)
}
