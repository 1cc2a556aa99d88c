use crate::grid::{Grid, TileInstance, GRID_SIZE};
use crate::sparse::{CellPatch, Fill, SparseLevel};

/// Materialize the dense grid from a sparse description. Deterministic, no
/// validation; tile legality is the repair engine's job.
pub fn expand(level: &SparseLevel) -> Grid {
    let mut grid = Grid::empty();
    for fill in &level.fills {
        apply_fill(&mut grid, fill);
    }
    for patch in &level.cells {
        apply_patch(&mut grid, patch);
    }
    grid
}

fn clamp(v: i64) -> usize {
    v.clamp(0, (GRID_SIZE - 1) as i64) as usize
}

fn apply_fill(grid: &mut Grid, fill: &Fill) {
    let (ra, rb) = (clamp(fill.r1), clamp(fill.r2));
    let (ca, cb) = (clamp(fill.c1), clamp(fill.c2));
    let (r1, r2) = (ra.min(rb), ra.max(rb));
    let (c1, c2) = (ca.min(cb), ca.max(cb));

    for r in r1..=r2 {
        for c in c1..=c2 {
            let cell = grid.get_mut(r, c);
            if let Some(floor) = &fill.floor {
                cell.floor = TileInstance::bare(floor);
            }
            if let Some(object) = &fill.object {
                cell.object = Some(TileInstance::bare(object));
            }
        }
    }
}

fn apply_patch(grid: &mut Grid, patch: &CellPatch) {
    let cell = grid.get_mut(clamp(patch.r), clamp(patch.c));
    if let Some(floor) = &patch.floor {
        cell.floor = TileInstance {
            ty: floor.clone(),
            config: patch.floor_config.clone().unwrap_or_default(),
        };
    }
    match &patch.object {
        None => {}
        Some(None) => cell.object = None,
        Some(Some(object)) => {
            cell.object = Some(TileInstance {
                ty: object.clone(),
                config: patch.object_config.clone().unwrap_or_default(),
            });
        }
    }
}
