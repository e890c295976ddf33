//! External helper programs: the grid generator and the map renderer.
//!
//! The server never builds boards or draws maps itself. It asks a
//! [`GridGenerator`] for a board when a room is created and a
//! [`MapRenderer`] for a picture when `/api/map-image` is hit. The
//! command-backed implementations run a configured program with
//! `tokio::process`.

use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crownquest_protocol::{Grid, SpaceId};
use serde::Serialize;
use tokio::process::Command;

use crate::ToolError;

/// A player's marker on the rendered map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapMarker {
    pub name: String,
    pub position: SpaceId,
}

/// Produces the board for a new room.
pub trait GridGenerator: Send + Sync + 'static {
    /// Returns a structurally valid grid with `start_space` on it.
    fn generate(&self, start_space: SpaceId) -> impl Future<Output = Result<Grid, ToolError>> + Send;
}

/// Draws the board with player markers. Returns PNG bytes.
pub trait MapRenderer: Send + Sync + 'static {
    fn render(
        &self,
        grid: &Grid,
        markers: &[MapMarker],
    ) -> impl Future<Output = Result<Vec<u8>, ToolError>> + Send;
}

// ---------------------------------------------------------------------------
// Command-backed implementations
// ---------------------------------------------------------------------------

/// Runs a program and parses a JSON grid from its stdout.
#[derive(Debug, Clone)]
pub struct CommandGridGenerator {
    command: Vec<String>,
}

impl CommandGridGenerator {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl GridGenerator for CommandGridGenerator {
    async fn generate(&self, start_space: SpaceId) -> Result<Grid, ToolError> {
        let stdout = run(&self.command, "grid generator", vec![start_space.to_string()]).await?;
        let bad_output = |reason: String| ToolError::BadOutput {
            program: program_name(&self.command),
            reason,
        };
        let grid: Grid = serde_json::from_slice(&stdout).map_err(|e| bad_output(e.to_string()))?;
        check_grid(&grid, start_space).map_err(bad_output)?;
        Ok(grid)
    }
}

/// Runs a program with the spaces and markers as JSON arguments and
/// reads a base64 PNG from its stdout.
#[derive(Debug, Clone)]
pub struct CommandMapRenderer {
    command: Vec<String>,
}

impl CommandMapRenderer {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl MapRenderer for CommandMapRenderer {
    async fn render(&self, grid: &Grid, markers: &[MapMarker]) -> Result<Vec<u8>, ToolError> {
        let bad_output = |reason: String| ToolError::BadOutput {
            program: program_name(&self.command),
            reason,
        };
        let spaces = serde_json::to_string(&grid.spaces).map_err(|e| bad_output(e.to_string()))?;
        let players = serde_json::to_string(markers).map_err(|e| bad_output(e.to_string()))?;

        let stdout = run(&self.command, "map renderer", vec![spaces, players]).await?;
        let text = String::from_utf8_lossy(&stdout);
        STANDARD
            .decode(text.trim())
            .map_err(|e| bad_output(format!("not base64: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Fixed board
// ---------------------------------------------------------------------------

/// Hands out the same board every time. Useful for tests and for
/// running without the generator installed.
#[derive(Debug, Clone)]
pub struct FixedGridGenerator {
    grid: Grid,
}

impl FixedGridGenerator {
    pub fn new(grid: Grid) -> Self {
        Self { grid }
    }
}

impl GridGenerator for FixedGridGenerator {
    async fn generate(&self, start_space: SpaceId) -> Result<Grid, ToolError> {
        check_grid(&self.grid, start_space).map_err(|reason| ToolError::BadOutput {
            program: "fixed grid".into(),
            reason,
        })?;
        Ok(self.grid.clone())
    }
}

fn check_grid(grid: &Grid, start_space: SpaceId) -> Result<(), String> {
    grid.validate().map_err(|e| e.to_string())?;
    if grid.space(start_space).is_none() {
        return Err(format!("start space {start_space} is not on the board"));
    }
    Ok(())
}

fn program_name(command: &[String]) -> String {
    command.first().cloned().unwrap_or_default()
}

/// Runs `command` with `extra` appended and returns its stdout.
async fn run(command: &[String], what: &'static str, extra: Vec<String>) -> Result<Vec<u8>, ToolError> {
    let (program, args) = command.split_first().ok_or(ToolError::NotConfigured(what))?;
    tracing::debug!(%program, what, "running external tool");

    let output = Command::new(program)
        .args(args)
        .args(&extra)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ToolError::Spawn { program: program.clone(), source })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            program: program.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(output.stdout)
}
