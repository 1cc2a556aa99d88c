//! `keygrid`: the keyturn level model.
//!
//! A generator-authored *sparse* level description (rectangular fills plus
//! individual cell overrides) is expanded into a dense 100x100 two-layer
//! grid, then run through a validation-and-repair pass against the
//! caller-supplied tile catalog. Expansion and repair are total functions:
//! they never fail, they only mutate and report.

pub mod catalog;
pub mod expand;
pub mod grid;
pub mod repair;
pub mod sparse;

pub use catalog::{TileCatalog, TileDef, TileLayer};
pub use expand::expand;
pub use grid::{Cell, Config, Grid, TileInstance, EMPTY_FLOOR, GRID_SIZE, GROUND_FLOOR};
pub use repair::repair;
pub use sparse::{CellPatch, Fill, SparseLevel};
