use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which layer of a cell a tile type lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileLayer {
    Floor,
    Object,
}

/// One entry of the caller-supplied tile catalog. The catalog is the sole
/// authority on which types are known, which layer they belong to, and
/// whether more than one instance is permitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileDef {
    pub id: String,
    pub layer: TileLayer,
    #[serde(default)]
    pub walkable: bool,
    #[serde(default)]
    pub tooltip: Option<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TileCatalog {
    by_id: HashMap<String, TileDef>,
}

impl TileCatalog {
    /// Later entries win on duplicate ids.
    pub fn new(tiles: &[TileDef]) -> Self {
        let mut by_id = HashMap::with_capacity(tiles.len());
        for t in tiles {
            by_id.insert(t.id.clone(), t.clone());
        }
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&TileDef> {
        self.by_id.get(id)
    }

    pub fn layer_of(&self, id: &str) -> Option<TileLayer> {
        self.get(id).map(|t| t.layer)
    }

    pub fn is_unique(&self, id: &str) -> bool {
        self.get(id).is_some_and(|t| t.unique)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
