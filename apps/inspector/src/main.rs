// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plan-Lite Inspector - loads a wall plan, builds an engine and reports
//! the derived rooms, wall collisions and consistency issues.
//!
//! ```text
//! plan-lite-inspect plan.json [--json] [--strategy half-edge|cycle-search]
//! ```
//!
//! The input is either a JSON array of walls or an object
//! `{ "walls": [...], "rooms": [...] }` whose rooms seed identity matching.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use plan_lite_topology::{
    Collision, CollisionDetector, ConsistencyIssue, DetectionStrategy, EditorState, Engine, EngineInit, Room,
    WallSegment,
};

mod config;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "plan-lite-inspect", version, about = "Inspect rooms, collisions and consistency of a wall plan")]
struct Args {
    /// Wall plan (JSON).
    input: PathBuf,
    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,
    /// Room detection strategy; overrides PLAN_DETECTION.
    #[arg(long)]
    strategy: Option<DetectionStrategy>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanInput {
    Walls(Vec<WallSegment>),
    Plan {
        walls: Vec<WallSegment>,
        #[serde(default)]
        rooms: Option<Vec<Room>>,
    },
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    state: &'a EditorState,
    collisions: &'a [Collision],
    issues: &'a [ConsistencyIssue],
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,plan_lite_topology=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let mut options = config.engine_options();
    if let Some(strategy) = args.strategy {
        options.detection_strategy = strategy;
    }

    let raw = std::fs::read_to_string(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let (walls, rooms) = match serde_json::from_str::<PlanInput>(&raw)
        .with_context(|| format!("parsing {}", args.input.display()))?
    {
        PlanInput::Walls(walls) => (walls, None),
        PlanInput::Plan { walls, rooms } => (walls, rooms),
    };

    tracing::info!(
        input = %args.input.display(),
        walls = walls.len(),
        strategy = ?options.detection_strategy,
        node_tolerance = options.node_tolerance,
        "building engine"
    );

    let clearance = options.default_clearance;
    let tolerance = options.node_tolerance;
    let engine = Engine::new(EngineInit {
        walls,
        rooms,
        options,
        ..Default::default()
    })
    .context("building engine")?;

    let state = engine.state();
    let collisions = CollisionDetector::new(tolerance, clearance).detect_all(&state.walls);
    let issues = engine.validate_consistency();

    if args.json {
        let report = Report {
            state,
            collisions: &collisions,
            issues: &issues,
        };
        println!("{}", serde_json::to_string_pretty(&report).context("encoding report")?);
        return Ok(());
    }

    print_rooms(state);
    println!();
    if collisions.is_empty() {
        println!("No collisions.");
    } else {
        println!("Collisions ({}):", collisions.len());
        for c in &collisions {
            println!("  {} x {}  {:?}  gap {:.1}", c.wall_a, c.wall_b, c.reason, c.distance);
        }
    }
    println!();
    if issues.is_empty() {
        println!("No consistency issues.");
    } else {
        println!("Consistency issues ({}):", issues.len());
        for issue in &issues {
            println!("  {issue}");
        }
    }
    Ok(())
}

fn print_rooms(state: &EditorState) {
    println!(
        "{} walls, {} rooms, {} archived",
        state.walls.len(),
        state.rooms.len(),
        state.archived_rooms.len()
    );
    println!(
        "{:<9} {:<16} {:>12} {:>10} {:>5} {:<9} walls",
        "id", "name", "area m2", "perim m", "depth", "parent"
    );
    for room in state.rooms.values() {
        let parent = room.parent_room_id.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        let walls: Vec<String> = room.wall_ids.iter().map(|w| w.0.to_string()).collect();
        println!(
            "{:<9} {:<16} {:>12.2} {:>10.2} {:>5} {:<9} {}",
            room.id.to_string(),
            room.name(),
            room.area / 1e6,
            room.perimeter / 1e3,
            room.depth,
            parent,
            walls.join(",")
        );
    }
}
