use std::collections::HashSet;
use std::collections::VecDeque;

use crate::catalog::{TileCatalog, TileLayer};
use crate::grid::{
    Cell, Config, Grid, TileInstance, EMPTY_FLOOR, EXIT_FALLBACK_CELL, GRID_SIZE, GROUND_FLOOR,
    START_CELL,
};

/// Make `grid` structurally legal against `catalog`, in place. Returns the
/// ordered list of corrective actions taken. Never fails: however malformed
/// the input, the output satisfies the invariants.
///
/// Per-cell pass (one scan, row-major):
///   1. non-empty floor type missing from the catalog -> reset to empty
///   2. object-layer type sitting on the floor layer -> moved up, floor
///      becomes ground
///   3. floor-layer type sitting on the object layer -> moved down, object
///      cleared
///   4. uncatalogued object type -> removed
///   5. duplicate of a unique-flagged type -> later occurrences repaired away
/// Then: force-place start/exit if absent, and carve a corridor if the exit
/// is not reachable from the start.
pub fn repair(grid: &mut Grid, catalog: &TileCatalog, start_tile: &str, exit_tile: &str) -> Vec<String> {
    let mut repairs = Vec::new();
    let mut seen_unique: HashSet<String> = HashSet::new();

    for r in 0..GRID_SIZE {
        for c in 0..GRID_SIZE {
            repair_cell(grid.get_mut(r, c), catalog, r, c, &mut seen_unique, &mut repairs);
        }
    }

    ensure_placed(grid, catalog, start_tile, START_CELL, &mut repairs);
    ensure_placed(grid, catalog, exit_tile, EXIT_FALLBACK_CELL, &mut repairs);
    ensure_reachable(grid, catalog, start_tile, exit_tile, &mut repairs);

    repairs
}

fn repair_cell(
    cell: &mut Cell,
    catalog: &TileCatalog,
    r: usize,
    c: usize,
    seen_unique: &mut HashSet<String>,
    repairs: &mut Vec<String>,
) {
    // Floor layer. "empty" and "ground" are the engine's own floor
    // vocabulary and need no catalog entry.
    let floor_ty = cell.floor.ty.clone();
    if floor_ty != EMPTY_FLOOR && floor_ty != GROUND_FLOOR {
        match catalog.layer_of(&floor_ty) {
            None => {
                cell.floor = TileInstance::bare(EMPTY_FLOOR);
                repairs.push(format!(
                    "unknown floor type \"{floor_ty}\" at ({r},{c}): reset to empty"
                ));
            }
            Some(TileLayer::Object) => {
                cell.object = Some(TileInstance::bare(&floor_ty));
                cell.floor = TileInstance::bare(GROUND_FLOOR);
                repairs.push(format!(
                    "object type \"{floor_ty}\" found on floor layer at ({r},{c}): moved to object layer"
                ));
            }
            Some(TileLayer::Floor) => {}
        }
    }

    // Object layer.
    if let Some(obj) = cell.object.clone() {
        match catalog.layer_of(&obj.ty) {
            None => {
                cell.object = None;
                repairs.push(format!(
                    "unknown object type \"{}\" at ({r},{c}): removed",
                    obj.ty
                ));
            }
            Some(TileLayer::Floor) => {
                cell.floor = TileInstance {
                    ty: obj.ty.clone(),
                    config: obj.config,
                };
                cell.object = None;
                repairs.push(format!(
                    "floor type \"{}\" found on object layer at ({r},{c}): moved to floor layer",
                    cell.floor.ty
                ));
            }
            Some(TileLayer::Object) => {}
        }
    }

    // Uniqueness: first occurrence wins.
    let floor_ty = cell.floor.ty.clone();
    if catalog.is_unique(&floor_ty) && !seen_unique.insert(floor_ty.clone()) {
        cell.floor = TileInstance::bare(GROUND_FLOOR);
        repairs.push(format!(
            "duplicate unique floor type \"{floor_ty}\" at ({r},{c}): reset to ground"
        ));
    }
    if let Some(obj_ty) = cell.object.as_ref().map(|o| o.ty.clone()) {
        if catalog.is_unique(&obj_ty) && !seen_unique.insert(obj_ty.clone()) {
            cell.object = None;
            repairs.push(format!(
                "duplicate unique object type \"{obj_ty}\" at ({r},{c}): removed"
            ));
        }
    }
}

/// Force-place `ty` at `at` when no cell carries it. The layer comes from
/// the catalog; an uncatalogued designated type goes to the object layer.
fn ensure_placed(
    grid: &mut Grid,
    catalog: &TileCatalog,
    ty: &str,
    at: (usize, usize),
    repairs: &mut Vec<String>,
) {
    if grid.count_type(ty) > 0 {
        return;
    }
    let (r, c) = at;
    let cell = grid.get_mut(r, c);
    match catalog.layer_of(ty) {
        Some(TileLayer::Floor) => {
            cell.floor = TileInstance::bare(ty);
        }
        Some(TileLayer::Object) | None => {
            cell.object = Some(TileInstance {
                ty: ty.to_string(),
                config: Config::new(),
            });
            if !floor_walkable(catalog, &cell.floor.ty) {
                cell.floor = TileInstance::bare(GROUND_FLOOR);
                repairs.push(format!(
                    "floor under placed \"{ty}\" at ({r},{c}) was not walkable: reset to ground"
                ));
            }
        }
    }
    repairs.push(format!("no \"{ty}\" tile found anywhere: placed at ({r},{c})"));
}

fn floor_walkable(catalog: &TileCatalog, ty: &str) -> bool {
    ty == EMPTY_FLOOR || ty == GROUND_FLOOR || catalog.get(ty).is_some_and(|t| t.walkable)
}

fn cell_walkable(catalog: &TileCatalog, cell: &Cell) -> bool {
    let object_ok = match &cell.object {
        None => true,
        Some(o) => catalog.get(&o.ty).is_some_and(|t| t.walkable),
    };
    floor_walkable(catalog, &cell.floor.ty) && object_ok
}

/// Flood-fill walkable cells from the start; if the exit cell is not
/// reached, carve an L-shaped corridor to it. The start and exit cells
/// themselves count as walkable for the fill regardless of their own tiles.
fn ensure_reachable(
    grid: &mut Grid,
    catalog: &TileCatalog,
    start_tile: &str,
    exit_tile: &str,
    repairs: &mut Vec<String>,
) {
    let (Some(start), Some(exit)) = (grid.find_type(start_tile), grid.find_type(exit_tile)) else {
        return; // ensure_placed guarantees both; defensive only against equal tiles
    };
    if start == exit {
        return;
    }

    let mut visited = vec![[false; GRID_SIZE]; GRID_SIZE];
    let mut queue = VecDeque::new();
    visited[start.0][start.1] = true;
    queue.push_back(start);
    while let Some((r, c)) = queue.pop_front() {
        for (nr, nc) in neighbors(r, c) {
            if visited[nr][nc] {
                continue;
            }
            if (nr, nc) == exit || cell_walkable(catalog, grid.get(nr, nc)) {
                visited[nr][nc] = true;
                queue.push_back((nr, nc));
            }
        }
    }
    if visited[exit.0][exit.1] {
        return;
    }

    repairs.push(format!(
        "\"{exit_tile}\" at ({},{}) not reachable from \"{start_tile}\" at ({},{}): carving corridor",
        exit.0, exit.1, start.0, start.1
    ));
    for (r, c) in l_path(start, exit) {
        carve_cell(grid, catalog, r, c, start_tile, exit_tile, repairs);
    }
}

fn neighbors(r: usize, c: usize) -> impl Iterator<Item = (usize, usize)> {
    let (r, c) = (r as i64, c as i64);
    [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)]
        .into_iter()
        .filter(|&(nr, nc)| nr >= 0 && nc >= 0 && nr < GRID_SIZE as i64 && nc < GRID_SIZE as i64)
        .map(|(nr, nc)| (nr as usize, nc as usize))
}

/// Vertical leg along the start column, then horizontal along the exit row.
fn l_path(from: (usize, usize), to: (usize, usize)) -> Vec<(usize, usize)> {
    let mut path = Vec::new();
    let (mut r, c) = from;
    loop {
        path.push((r, c));
        if r == to.0 {
            break;
        }
        r = if to.0 > r { r + 1 } else { r - 1 };
    }
    let mut cc = c;
    while cc != to.1 {
        cc = if to.1 > cc { cc + 1 } else { cc - 1 };
        path.push((to.0, cc));
    }
    path
}

fn carve_cell(
    grid: &mut Grid,
    catalog: &TileCatalog,
    r: usize,
    c: usize,
    start_tile: &str,
    exit_tile: &str,
    repairs: &mut Vec<String>,
) {
    let cell = grid.get_mut(r, c);
    let floor_ty = cell.floor.ty.clone();
    if !floor_walkable(catalog, &floor_ty) && floor_ty != start_tile && floor_ty != exit_tile {
        cell.floor = TileInstance::bare(GROUND_FLOOR);
        repairs.push(format!(
            "carved corridor: floor \"{floor_ty}\" at ({r},{c}) reset to ground"
        ));
    }
    if let Some(obj_ty) = cell.object.as_ref().map(|o| o.ty.clone()) {
        let blocking = !catalog.get(&obj_ty).is_some_and(|t| t.walkable);
        if blocking && obj_ty != start_tile && obj_ty != exit_tile {
            cell.object = None;
            repairs.push(format!(
                "carved corridor: object \"{obj_ty}\" at ({r},{c}) removed"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TileDef;
    use crate::expand::expand;
    use crate::sparse::SparseLevel;

    fn tile(id: &str, layer: TileLayer, walkable: bool, unique: bool) -> TileDef {
        TileDef {
            id: id.to_string(),
            layer,
            walkable,
            tooltip: None,
            unique,
        }
    }

    fn catalog() -> TileCatalog {
        TileCatalog::new(&[
            tile("ground", TileLayer::Floor, true, false),
            tile("wall", TileLayer::Floor, false, false),
            tile("water", TileLayer::Floor, false, false),
            tile("key", TileLayer::Object, true, false),
            tile("crate", TileLayer::Object, false, false),
            tile("start", TileLayer::Object, true, true),
            tile("exit", TileLayer::Object, false, true),
        ])
    }

    fn expanded(json: &str) -> Grid {
        let level: SparseLevel = serde_json::from_str(json).unwrap();
        expand(&level)
    }

    #[test]
    fn unknown_floor_type_resets_to_empty() {
        let mut g = expanded(
            r#"{"fills": [{"r1": 0, "c1": 0, "r2": 99, "c2": 99, "floor": "empty"}],
                "cells": [{"r": 5, "c": 5, "floor": "unknowntype"}]}"#,
        );
        let repairs = repair(&mut g, &catalog(), "start", "exit");
        assert_eq!(g.get(5, 5).floor.ty, EMPTY_FLOOR);
        assert!(repairs.iter().any(|r| r.contains("(5,5)")));
    }

    #[test]
    fn object_type_on_floor_layer_is_moved_up() {
        let mut g = Grid::empty();
        g.get_mut(2, 3).floor = TileInstance::bare("key");
        repair(&mut g, &catalog(), "start", "exit");
        assert_eq!(g.get(2, 3).floor.ty, GROUND_FLOOR);
        assert_eq!(g.get(2, 3).object.as_ref().unwrap().ty, "key");
        assert!(g.get(2, 3).object.as_ref().unwrap().config.is_empty());
    }

    #[test]
    fn floor_type_on_object_layer_is_moved_down_with_config() {
        let mut g = Grid::empty();
        let mut config = Config::new();
        config.insert("depth".into(), serde_json::json!(2));
        g.get_mut(4, 4).object = Some(TileInstance {
            ty: "water".to_string(),
            config,
        });
        repair(&mut g, &catalog(), "start", "exit");
        assert_eq!(g.get(4, 4).floor.ty, "water");
        assert_eq!(g.get(4, 4).floor.config["depth"], 2);
        assert!(g.get(4, 4).object.is_none());
    }

    #[test]
    fn unknown_object_type_is_removed_without_substitution() {
        let mut g = Grid::empty();
        g.get_mut(1, 1).object = Some(TileInstance::bare("dragon"));
        let repairs = repair(&mut g, &catalog(), "start", "exit");
        assert!(g.get(1, 1).object.is_none());
        assert!(repairs.iter().any(|r| r.contains("dragon") && r.contains("(1,1)")));
    }

    #[test]
    fn missing_start_is_placed_at_grid_center() {
        let mut g = Grid::empty();
        let repairs = repair(&mut g, &catalog(), "start", "exit");
        assert_eq!(g.get(50, 50).object.as_ref().unwrap().ty, "start");
        assert_eq!(g.count_type("start"), 1);
        assert!(repairs.iter().any(|r| r.contains("start") && r.contains("(50,50)")));
    }

    #[test]
    fn missing_exit_is_placed_off_center_with_empty_config() {
        let mut g = Grid::empty();
        repair(&mut g, &catalog(), "start", "exit");
        let exit = g.get(50, 52).object.as_ref().unwrap();
        assert_eq!(exit.ty, "exit");
        assert!(exit.config.is_empty());
        assert_eq!(g.count_type("exit"), 1);
    }

    #[test]
    fn present_start_is_left_alone() {
        let mut g = expanded(r#"{"cells": [{"r": 10, "c": 20, "object": "start"}]}"#);
        let repairs = repair(&mut g, &catalog(), "start", "exit");
        assert!(g.get(50, 50).object.is_none());
        assert_eq!(g.get(10, 20).object.as_ref().unwrap().ty, "start");
        assert!(!repairs.iter().any(|r| r.contains("no \"start\"")));
    }

    #[test]
    fn floor_layer_start_is_placed_on_the_floor() {
        let cat = TileCatalog::new(&[
            tile("pad", TileLayer::Floor, true, true),
            tile("exit", TileLayer::Object, false, true),
        ]);
        let mut g = Grid::empty();
        repair(&mut g, &cat, "pad", "exit");
        assert_eq!(g.get(50, 50).floor.ty, "pad");
        assert!(g.get(50, 50).object.is_none());
    }

    #[test]
    fn force_place_fixes_unwalkable_floor_underneath() {
        let mut g = expanded(r#"{"fills": [{"r1": 0, "c1": 0, "r2": 99, "c2": 99, "floor": "wall"}]}"#);
        let repairs = repair(&mut g, &catalog(), "start", "exit");
        assert_eq!(g.get(50, 50).floor.ty, GROUND_FLOOR);
        assert_eq!(g.get(50, 50).object.as_ref().unwrap().ty, "start");
        assert!(repairs.iter().any(|r| r.contains("not walkable")));
    }

    #[test]
    fn duplicate_unique_objects_are_removed() {
        let mut g = expanded(
            r#"{"cells": [{"r": 1, "c": 1, "object": "start"},
                          {"r": 2, "c": 2, "object": "start"},
                          {"r": 3, "c": 3, "object": "exit"}]}"#,
        );
        let repairs = repair(&mut g, &catalog(), "start", "exit");
        assert_eq!(g.count_type("start"), 1);
        assert!(g.get(1, 1).object.is_some());
        assert!(g.get(2, 2).object.is_none());
        assert!(repairs.iter().any(|r| r.contains("duplicate unique")));
    }

    #[test]
    fn non_unique_types_may_repeat() {
        let mut g = expanded(
            r#"{"cells": [{"r": 1, "c": 1, "object": "key"},
                          {"r": 2, "c": 2, "object": "key"}]}"#,
        );
        repair(&mut g, &catalog(), "start", "exit");
        assert_eq!(g.count_type("key"), 2);
    }

    #[test]
    fn unreachable_exit_gets_a_carved_corridor() {
        // Start walled into the top-left corner; exit far away.
        let mut g = expanded(
            r#"{"fills": [{"r1": 0, "c1": 0, "r2": 99, "c2": 99, "floor": "ground"},
                          {"r1": 0, "c1": 5, "r2": 5, "c2": 5, "floor": "wall"},
                          {"r1": 5, "c1": 0, "r2": 5, "c2": 5, "floor": "wall"}],
                "cells": [{"r": 2, "c": 2, "object": "start"},
                          {"r": 80, "c": 80, "object": "exit"}]}"#,
        );
        let repairs = repair(&mut g, &catalog(), "start", "exit");
        assert!(repairs.iter().any(|r| r.contains("carving corridor")));
        // The wall on the start column's leg is gone.
        assert_eq!(g.get(5, 2).floor.ty, GROUND_FLOOR);
        // Exit itself survives carving.
        assert_eq!(g.get(80, 80).object.as_ref().unwrap().ty, "exit");
    }

    #[test]
    fn reachable_exit_is_not_carved() {
        let mut g = expanded(
            r#"{"fills": [{"r1": 0, "c1": 0, "r2": 99, "c2": 99, "floor": "ground"}],
                "cells": [{"r": 2, "c": 2, "object": "start"},
                          {"r": 80, "c": 80, "object": "exit"}]}"#,
        );
        let repairs = repair(&mut g, &catalog(), "start", "exit");
        assert!(repairs.is_empty(), "unexpected repairs: {repairs:?}");
    }

    #[test]
    fn walkable_objects_do_not_block_the_flood_fill() {
        // A line of keys (walkable objects) between start and exit.
        let mut g = expanded(
            r#"{"fills": [{"r1": 0, "c1": 0, "r2": 99, "c2": 99, "floor": "ground"},
                          {"r1": 10, "c1": 0, "r2": 10, "c2": 99, "object": "key"}],
                "cells": [{"r": 5, "c": 5, "object": "start"},
                          {"r": 20, "c": 5, "object": "exit"}]}"#,
        );
        let repairs = repair(&mut g, &catalog(), "start", "exit");
        assert!(!repairs.iter().any(|r| r.contains("carving")));
        assert_eq!(g.count_type("key"), 100);
    }

    #[test]
    fn repaired_grid_has_no_wrong_layer_or_unknown_types() {
        let mut g = expanded(
            r#"{"fills": [{"r1": 0, "c1": 0, "r2": 20, "c2": 20, "floor": "key", "object": "water"}],
                "cells": [{"r": 0, "c": 0, "floor": "bogus", "object": "alsobogus"}]}"#,
        );
        repair(&mut g, &catalog(), "start", "exit");
        let cat = catalog();
        for (_, _, cell) in g.iter_cells() {
            let f = &cell.floor.ty;
            assert!(
                f == EMPTY_FLOOR || f == GROUND_FLOOR
                    || cat.layer_of(f) == Some(TileLayer::Floor),
                "bad floor {f}"
            );
            if let Some(o) = &cell.object {
                assert_eq!(cat.layer_of(&o.ty), Some(TileLayer::Object), "bad object {}", o.ty);
            }
        }
    }
}
