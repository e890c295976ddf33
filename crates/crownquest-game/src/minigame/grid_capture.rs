//! Three-player three-in-a-row on a 4×4 board.
//!
//! Each player keeps at most three pieces on the board; placing a fourth
//! lifts that player's oldest piece first.

use std::collections::VecDeque;

use crownquest_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use super::{MinigameError, Phase, seat_of};

pub const GRID_SIDE: usize = 4;
pub const MAX_LIVE_PIECES: usize = 3;

const CELLS: usize = GRID_SIDE * GRID_SIDE;

/// Every winning line: 8 horizontal, 8 vertical, 8 diagonal.
pub const WINDOWS: [[usize; 3]; 24] = [
    // rows
    [0, 1, 2],
    [1, 2, 3],
    [4, 5, 6],
    [5, 6, 7],
    [8, 9, 10],
    [9, 10, 11],
    [12, 13, 14],
    [13, 14, 15],
    // columns
    [0, 4, 8],
    [4, 8, 12],
    [1, 5, 9],
    [5, 9, 13],
    [2, 6, 10],
    [6, 10, 14],
    [3, 7, 11],
    [7, 11, 15],
    // down-right
    [0, 5, 10],
    [1, 6, 11],
    [4, 9, 14],
    [5, 10, 15],
    // down-left
    [2, 5, 8],
    [3, 6, 9],
    [6, 9, 12],
    [7, 10, 13],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
    #[serde(rename = "△")]
    Triangle,
}

impl Mark {
    const BY_SEAT: [Mark; 3] = [Mark::X, Mark::O, Mark::Triangle];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCapture {
    pub players: Vec<PlayerId>,
    pub current: usize,
    pub board: [Option<Mark>; CELLS],
    /// Cells each seat occupies, oldest first.
    pub placed: Vec<VecDeque<usize>>,
    pub move_count: u32,
    pub phase: Phase,
}

impl GridCapture {
    pub fn new(players: Vec<PlayerId>) -> Self {
        let placed = vec![VecDeque::new(); players.len()];
        Self {
            players,
            current: 0,
            board: [None; CELLS],
            placed,
            move_count: 0,
            phase: Phase::Active,
        }
    }

    pub(super) fn is_consistent(&self) -> bool {
        self.placed.len() == self.players.len() && self.current < self.players.len()
    }

    pub fn mark_of(&self, seat: usize) -> Mark {
        Mark::BY_SEAT[seat % Mark::BY_SEAT.len()]
    }

    pub(super) fn place(&mut self, actor: &PlayerId, cell: usize) -> Result<(), MinigameError> {
        let seat = seat_of(&self.players, actor)?;
        if seat != self.current {
            return Err(MinigameError::NotYourTurn);
        }
        if cell >= CELLS {
            return Err(MinigameError::OutOfBounds(cell));
        }
        if self.board[cell].is_some() {
            return Err(MinigameError::Occupied(cell));
        }

        let mark = self.mark_of(seat);
        let mine = &mut self.placed[seat];
        if mine.len() >= MAX_LIVE_PIECES {
            if let Some(oldest) = mine.pop_front() {
                self.board[oldest] = None;
            }
        }
        self.board[cell] = Some(mark);
        mine.push_back(cell);
        self.move_count += 1;

        if check_win(&self.board, mark) {
            self.phase = Phase::Ended { winner: actor.clone() };
        } else {
            self.current = (self.current + 1) % self.players.len();
        }
        Ok(())
    }
}

/// Whether `mark` fills any winning line.
pub fn check_win(board: &[Option<Mark>; CELLS], mark: Mark) -> bool {
    WINDOWS
        .iter()
        .any(|line| line.iter().all(|&i| board[i] == Some(mark)))
}
