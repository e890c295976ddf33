//! Three-color Reversi on a 6×6 board.
//!
//! A placement is legal when, in at least one of the eight directions, it
//! closes a contiguous run of other colors against one of the mover's own
//! pieces. Every run it closes is recolored. Players with no legal
//! placement are skipped; the game ends when nobody can place or after
//! three consecutive passes.

use crownquest_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use super::{MinigameError, Phase, first_max, seat_of};

pub const AREA_SIDE: usize = 6;
const CELLS: usize = AREA_SIDE * AREA_SIDE;
const PASS_LIMIT: u32 = 3;

const DIRECTIONS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "⚫")]
    Black,
    #[serde(rename = "⚪")]
    White,
    #[serde(rename = "🔴")]
    Red,
}

impl Color {
    const BY_SEAT: [Color; 3] = [Color::Black, Color::White, Color::Red];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaControl {
    pub players: Vec<PlayerId>,
    pub current: usize,
    /// Row-major, `AREA_SIDE * AREA_SIDE` cells.
    pub board: Vec<Option<Color>>,
    /// Consecutive passes; any placement resets it.
    pub passes: u32,
    /// Players skipped for lack of moves when the turn last advanced.
    pub skipped: Vec<PlayerId>,
    pub phase: Phase,
}

impl AreaControl {
    pub fn new(players: Vec<PlayerId>) -> Self {
        let mut board = vec![None; CELLS];
        for (cell, color) in [
            (14, Color::Black),
            (21, Color::Black),
            (15, Color::White),
            (26, Color::White),
            (20, Color::Red),
            (27, Color::Red),
        ] {
            board[cell] = Some(color);
        }
        Self {
            players,
            current: 0,
            board,
            passes: 0,
            skipped: Vec::new(),
            phase: Phase::Active,
        }
    }

    pub(super) fn is_consistent(&self) -> bool {
        self.board.len() == CELLS && self.current < self.players.len()
    }

    pub fn color_of(&self, seat: usize) -> Color {
        Color::BY_SEAT[seat % Color::BY_SEAT.len()]
    }

    /// Tiles held by each seat.
    pub fn counts(&self) -> Vec<u32> {
        (0..self.players.len())
            .map(|seat| {
                let color = self.color_of(seat);
                self.board.iter().filter(|c| **c == Some(color)).count() as u32
            })
            .collect()
    }

    /// Cells of the run `color` would capture from `cell` toward `dir`.
    fn run(&self, cell: usize, color: Color, (dr, dc): (isize, isize)) -> Vec<usize> {
        let mut run = Vec::new();
        let mut r = (cell / AREA_SIDE) as isize + dr;
        let mut c = (cell % AREA_SIDE) as isize + dc;
        while (0..AREA_SIDE as isize).contains(&r) && (0..AREA_SIDE as isize).contains(&c) {
            let idx = r as usize * AREA_SIDE + c as usize;
            match self.board.get(idx).copied().flatten() {
                None => return Vec::new(),
                Some(other) if other == color => return run,
                Some(_) => run.push(idx),
            }
            r += dr;
            c += dc;
        }
        Vec::new()
    }

    pub fn is_legal(&self, cell: usize, color: Color) -> bool {
        cell < CELLS
            && self.board.get(cell) == Some(&None)
            && DIRECTIONS.iter().any(|d| !self.run(cell, color, *d).is_empty())
    }

    pub fn has_moves(&self, seat: usize) -> bool {
        let color = self.color_of(seat);
        (0..CELLS).any(|cell| self.is_legal(cell, color))
    }

    pub(super) fn place(&mut self, actor: &PlayerId, cell: usize) -> Result<(), MinigameError> {
        let seat = self.check_turn(actor)?;
        match self.board.get(cell) {
            None => return Err(MinigameError::OutOfBounds(cell)),
            Some(Some(_)) => return Err(MinigameError::Occupied(cell)),
            Some(None) => {}
        }
        let color = self.color_of(seat);
        let flips: Vec<usize> = DIRECTIONS
            .iter()
            .flat_map(|d| self.run(cell, color, *d))
            .collect();
        if flips.is_empty() {
            return Err(MinigameError::IllegalPlacement(cell));
        }

        self.board[cell] = Some(color);
        for idx in flips {
            self.board[idx] = Some(color);
        }
        self.passes = 0;
        self.advance();
        Ok(())
    }

    pub(super) fn pass(&mut self, actor: &PlayerId) -> Result<(), MinigameError> {
        self.check_turn(actor)?;
        self.passes += 1;
        if self.passes >= PASS_LIMIT {
            self.finish();
        } else {
            self.advance();
        }
        Ok(())
    }

    fn check_turn(&self, actor: &PlayerId) -> Result<usize, MinigameError> {
        let seat = seat_of(&self.players, actor)?;
        if seat != self.current {
            return Err(MinigameError::NotYourTurn);
        }
        Ok(seat)
    }

    /// Hands the turn to the next seat that can place, skipping the rest.
    fn advance(&mut self) {
        let n = self.players.len();
        self.skipped.clear();
        for _ in 0..n {
            self.current = (self.current + 1) % n;
            if self.has_moves(self.current) {
                return;
            }
            self.skipped.push(self.players[self.current].clone());
        }
        self.finish();
    }

    fn finish(&mut self) {
        let best = first_max(&self.counts());
        self.phase = Phase::Ended { winner: self.players[best].clone() };
    }
}
