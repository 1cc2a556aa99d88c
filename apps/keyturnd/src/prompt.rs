use keygrid::{TileLayer, GRID_SIZE};

use crate::generate::GenerateMapRequest;

/// Build the constrained generation prompt: the story, the legal tile
/// vocabulary, and the compact output format the parser expects. The level
/// is described sparsely (fills + cell overrides) to keep responses small.
pub fn build_prompt(req: &GenerateMapRequest) -> String {
    let mut p = String::new();

    p.push_str(&format!(
        "You are a level designer for a top-down escape-room game played on a {GRID_SIZE}x{GRID_SIZE} grid.\n"
    ));
    p.push_str("Design a level for this story:\n\n");
    p.push_str(req.story.trim());
    p.push_str("\n\n");

    if let Some(theme) = req.theme_id.as_deref() {
        p.push_str(&format!("Theme: {theme}\n"));
    }
    if let Some(difficulty) = req.difficulty.as_deref() {
        p.push_str(&format!("Difficulty: {difficulty}\n"));
    }

    p.push_str("\nTile types you may use (no others exist):\n");
    for tile in &req.tile_catalog {
        let layer = match tile.layer {
            TileLayer::Floor => "floor",
            TileLayer::Object => "object",
        };
        p.push_str(&format!(
            "- {} ({layer}{}{}){}\n",
            tile.id,
            if tile.walkable { ", walkable" } else { "" },
            if tile.unique { ", at most one" } else { "" },
            tile.tooltip
                .as_deref()
                .map(|t| format!(": {t}"))
                .unwrap_or_default(),
        ));
    }

    p.push_str(&format!(
        "\nRules:\n\
         - Coordinates are row,col in [0,{}].\n\
         - Place exactly one \"{}\" (the player start) and exactly one \"{}\" (the exit).\n\
         - There must be a walkable path from the start to the exit.\n",
        GRID_SIZE - 1,
        req.start_tile,
        req.exit_tile
    ));
    if !req.mission_types.is_empty() {
        p.push_str(&format!(
            "- Missions may only use these types: {}.\n",
            req.mission_types.join(", ")
        ));
    }
    for rule in &req.ai_rules {
        p.push_str(&format!("- {rule}\n"));
    }

    p.push_str(
        "\nRespond with a single JSON object and nothing else, in this shape:\n\
         {\n\
         \x20 \"name\": \"level name\",\n\
         \x20 \"fills\": [{\"r1\": 0, \"c1\": 0, \"r2\": 99, \"c2\": 99, \"floor\": \"type\", \"object\": \"type\"}],\n\
         \x20 \"cells\": [{\"r\": 0, \"c\": 0, \"floor\": \"type\", \"floorConfig\": {}, \"object\": \"type\", \"objectConfig\": {}}],\n\
         \x20 \"missions\": [{\"type\": \"...\", \"description\": \"...\"}],\n\
         \x20 \"lives\": 3,\n\
         \x20 \"inventoryCapacity\": 6\n\
         }\n\
         Fills paint inclusive rectangles in order; cells override single squares afterwards.\n\
         \"floor\" and \"object\" are both optional per entry.\n",
    );

    p
}
