use serde::{Deserialize, Serialize};

pub const GRID_SIZE: usize = 100;

/// Default floor everywhere until a fill or cell override says otherwise.
pub const EMPTY_FLOOR: &str = "empty";
/// Generic walkable floor the repair engine falls back to.
pub const GROUND_FLOOR: &str = "ground";

/// Grid center; a missing start tile is force-placed here.
pub const START_CELL: (usize, usize) = (50, 50);
/// Center row, offset column, so a force-placed exit never lands on a
/// force-placed start.
pub const EXIT_FALLBACK_CELL: (usize, usize) = (50, 52);

/// Tile-type-specific settings (lock color, sign text, ...). Opaque to the
/// repair engine.
pub type Config = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileInstance {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub config: Config,
}

impl TileInstance {
    pub fn bare(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            config: Config::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub floor: TileInstance,
    pub object: Option<TileInstance>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            floor: TileInstance::bare(EMPTY_FLOOR),
            object: None,
        }
    }
}

/// Dense 100x100 grid, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    pub rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn empty() -> Self {
        Self {
            rows: vec![vec![Cell::default(); GRID_SIZE]; GRID_SIZE],
        }
    }

    pub fn get(&self, r: usize, c: usize) -> &Cell {
        &self.rows[r][c]
    }

    pub fn get_mut(&mut self, r: usize, c: usize) -> &mut Cell {
        &mut self.rows[r][c]
    }

    /// Occurrences of `ty` on either layer.
    pub fn count_type(&self, ty: &str) -> usize {
        self.iter_cells()
            .filter(|(_, _, cell)| cell_has_type(cell, ty))
            .count()
    }

    /// First cell (row-major) carrying `ty` on either layer.
    pub fn find_type(&self, ty: &str) -> Option<(usize, usize)> {
        self.iter_cells()
            .find(|(_, _, cell)| cell_has_type(cell, ty))
            .map(|(r, c, _)| (r, c))
    }

    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, &Cell)> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, cell)| (r, c, cell)))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::empty()
    }
}

fn cell_has_type(cell: &Cell, ty: &str) -> bool {
    cell.floor.ty == ty || cell.object.as_ref().is_some_and(|o| o.ty == ty)
}
