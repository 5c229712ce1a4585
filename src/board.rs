//! The shared game board and its concurrency control.
//!
//! A [`Board`] is the authoritative state of one Memory Scramble game: a
//! grid of cards plus per-player turn bookkeeping. Many tasks operate on the
//! same board concurrently, so every mutation happens under a single
//! exclusive mutex, blocked first-card flips wait in per-cell FIFO ticket
//! queues, and observable changes bump a version counter carried on a watch
//! channel that long-poll watchers subscribe to.
//!
//! Locking discipline: the mutex is never held across a suspension point.
//! A task that must wait for a cell enqueues a ticket, releases the mutex,
//! and sleeps on its own notifier; releases wake the queue and the ticket at
//! the head of the line acquires. Second-card flips never wait at all (they
//! fail fast with `Contended`), which rules out hold-and-wait cycles.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use log::{debug, info};
use tokio::sync::{watch, Mutex, MutexGuard, Notify};

use crate::card::{self, Card};
use crate::error::{BoardError, Result};
use crate::parser::{self, BoardTemplate, ParseError};
use crate::player::{self, Carryover, PlayerState};
use crate::render;

/// Zero-based grid coordinates, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    fn index(self, cols: usize) -> usize {
        self.row * cols + self.col
    }
}

/// One waiter in a cell's FIFO queue.
///
/// The waiting task holds a clone of `wake`; a ticket whose notifier is
/// owned by the queue alone belongs to a cancelled waiter and is purged at
/// the next release.
struct Ticket {
    id: u64,
    wake: Arc<Notify>,
}

/// Mutable interior, guarded by the board mutex.
struct Inner {
    grid: Vec<Card>,
    players: HashMap<String, PlayerState>,
    /// Per-cell wait queues, keyed by grid index, created lazily.
    queues: HashMap<usize, VecDeque<Ticket>>,
    next_ticket: u64,
}

impl Inner {
    /// Enqueues a new ticket for `idx`, returning its id and notifier.
    fn enqueue(&mut self, idx: usize) -> (u64, Arc<Notify>) {
        let id = self.next_ticket;
        self.next_ticket += 1;
        let wake = Arc::new(Notify::new());
        self.queues.entry(idx).or_default().push_back(Ticket {
            id,
            wake: Arc::clone(&wake),
        });
        (id, wake)
    }

    /// Wakes every live waiter queued on `idx`, purging cancelled tickets.
    ///
    /// Every ticket gets its own permit, so a waiter that has released the
    /// mutex but not yet polled its notifier cannot miss the wakeup. FIFO is
    /// preserved by the head-of-queue check on the waiter side, not by
    /// waking selectively.
    fn wake_cell(&mut self, idx: usize) {
        let mut empty = false;
        if let Some(queue) = self.queues.get_mut(&idx) {
            queue.retain(|t| Arc::strong_count(&t.wake) > 1);
            for ticket in queue.iter() {
                ticket.wake.notify_one();
            }
            empty = queue.is_empty();
        }
        if empty {
            self.queues.remove(&idx);
        }
    }

    /// Wakes every waiter on every cell (reset path).
    fn wake_all(&mut self) {
        for queue in self.queues.values_mut() {
            queue.retain(|t| Arc::strong_count(&t.wake) > 1);
            for ticket in queue.iter() {
                ticket.wake.notify_one();
            }
        }
        self.queues.retain(|_, queue| !queue.is_empty());
    }

    /// True if `ticket_id` is first in line for `idx`, skipping over
    /// cancelled tickets ahead of it.
    fn is_head(&mut self, idx: usize, ticket_id: u64) -> bool {
        let Some(queue) = self.queues.get_mut(&idx) else {
            return false;
        };
        while let Some(front) = queue.front() {
            if front.id == ticket_id {
                return true;
            }
            if Arc::strong_count(&front.wake) == 1 {
                queue.pop_front();
            } else {
                return false;
            }
        }
        false
    }

    /// Drops `ticket_id` from the queue for `idx`.
    fn remove_ticket(&mut self, idx: usize, ticket_id: u64) {
        let mut empty = false;
        if let Some(queue) = self.queues.get_mut(&idx) {
            queue.retain(|t| t.id != ticket_id);
            empty = queue.is_empty();
        }
        if empty {
            self.queues.remove(&idx);
        }
    }
}

/// The shared Memory Scramble board.
///
/// All operations take `&self`; the board is designed to sit behind an
/// [`Arc`] shared by every connection task.
pub struct Board {
    rows: usize,
    cols: usize,
    /// Initial card values, retained for [`Board::reset`].
    template: Vec<String>,
    inner: Mutex<Inner>,
    /// Observable-change counter; watchers subscribe to this channel.
    version: watch::Sender<u64>,
}

impl Board {
    /// Builds a board from a validated template. Every card starts on the
    /// board, face down, uncontrolled.
    pub fn new(template: BoardTemplate) -> Board {
        let rows = template.rows();
        let cols = template.cols();
        let values = template.into_values();
        let grid = values.iter().cloned().map(Card::new).collect();
        let (version, _) = watch::channel(0);
        Board {
            rows,
            cols,
            template: values,
            inner: Mutex::new(Inner {
                grid,
                players: HashMap::new(),
                queues: HashMap::new(),
                next_ticket: 0,
            }),
            version,
        }
    }

    /// Builds a board directly from dimensions and row-major values.
    pub fn from_values(
        rows: usize,
        cols: usize,
        values: Vec<String>,
    ) -> std::result::Result<Board, ParseError> {
        Ok(Board::new(BoardTemplate::new(rows, cols, values)?))
    }

    /// Reads and parses a board file, then builds the board.
    pub async fn load(path: impl AsRef<Path>) -> std::result::Result<Board, ParseError> {
        Ok(Board::new(parser::load(path).await?))
    }

    /// `(rows, cols)` of the grid. Dimensions never change.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Current change counter. Strictly monotonic; every observable change
    /// is preceded by an increment.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Renders the board from `player_id`'s perspective.
    ///
    /// The snapshot is taken under the board mutex, so it reflects a single
    /// consistent state. Never blocks beyond mutex acquisition.
    pub async fn look(&self, player_id: &str) -> String {
        debug_assert!(player::is_valid_player_id(player_id));
        let inner = self.inner.lock().await;
        render::render(self.rows, self.cols, &inner.grid, player_id)
    }

    /// Suspends until the board changes, then returns.
    ///
    /// Wakes on the first version bump after the call. Cancellation is
    /// dropping the returned future; it has no side effects.
    pub async fn watch(&self) {
        let mut rx = self.version.subscribe();
        // subscribe() marks the current value seen, so this resolves on the
        // next bump. The sender lives as long as the board.
        let _ = rx.changed().await;
    }

    /// Flips the card at `(row, col)` for `player_id`.
    ///
    /// Routes to the first- or second-card branch depending on the player's
    /// turn state. A first-card flip of a cell controlled by another player
    /// waits, FIFO-fairly, for the cell to be relinquished; a second-card
    /// flip never waits. See the error variants for the failure modes; on
    /// any second-card failure the first card has been relinquished and the
    /// player's turn state reset.
    pub async fn flip(&self, player_id: &str, row: usize, col: usize) -> Result<()> {
        debug_assert!(player::is_valid_player_id(player_id));
        if row >= self.rows || col >= self.cols {
            return Err(BoardError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let pos = Pos { row, col };

        let mut inner = self.inner.lock().await;
        let active_first = inner
            .players
            .entry(player_id.to_string())
            .or_default()
            .active_first();
        match active_first {
            Some(first) => self.flip_second(&mut inner, player_id, first, pos),
            None => self.flip_first(inner, player_id, pos).await,
        }
    }

    /// Rewrites every card value with `transform`, preserving
    /// match-equivalence.
    ///
    /// `transform` runs without the board mutex held and is applied once per
    /// distinct value, so cards that matched before the call still match
    /// after it (classes may collapse if two inputs map to one output).
    /// Each equivalence class commits atomically; play may proceed between
    /// class commits. A transform output that is not a legal card value
    /// fails with [`BoardError::BadValue`]; classes already committed stay
    /// committed.
    pub async fn map<F, Fut>(&self, transform: F) -> Result<()>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = String>,
    {
        // Phase 1: group cell indices by current value, under the mutex.
        let groups: Vec<(String, Vec<usize>)> = {
            let inner = self.inner.lock().await;
            let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
            for (idx, c) in inner.grid.iter().enumerate() {
                if c.on_board() {
                    groups.entry(c.value()).or_default().push(idx);
                }
            }
            groups
                .into_iter()
                .map(|(value, indices)| (value.to_string(), indices))
                .collect()
        };
        if groups.is_empty() {
            return Ok(());
        }

        // Phase 2: transform each distinct value concurrently, no lock held.
        let outputs = join_all(groups.iter().map(|(value, _)| transform(value.clone()))).await;

        // Phase 3: commit one equivalence class at a time.
        for ((value, indices), output) in groups.into_iter().zip(outputs) {
            if !card::is_valid_value(&output) {
                return Err(BoardError::BadValue(output));
            }
            let mut inner = self.inner.lock().await;
            for idx in indices {
                let c = &mut inner.grid[idx];
                // Skip cards removed or rewritten since the snapshot; they
                // no longer belong to this equivalence class.
                if c.on_board() && c.value() == value {
                    c.rewrite(output.clone());
                }
            }
            self.bump_version();
        }
        debug!("map rewrote card values");
        Ok(())
    }

    /// Restores the board to its initial state: every card back on the
    /// board face down with its original value, all player state cleared.
    /// Wakes every per-cell waiter and all watchers.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        for (c, value) in inner.grid.iter_mut().zip(&self.template) {
            *c = Card::new(value.clone());
        }
        inner.players.clear();
        self.bump_version();
        inner.wake_all();
        info!("board reset to initial state");
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    /// Turn-start cleanup: resolves whatever the player's previous turn left
    /// behind. Runs before the first-card branch, including before any wait.
    fn run_cleanup(&self, inner: &mut Inner, player_id: &str) {
        let carryover = match inner.players.get_mut(player_id) {
            Some(p) => p.start_turn(),
            None => return,
        };
        match carryover {
            Carryover::None => {}
            Carryover::Matched(a, b) => {
                for pos in [a, b] {
                    inner.grid[pos.index(self.cols)].remove();
                }
                debug!(
                    "{} scored: removed ({},{}) and ({},{})",
                    player_id, a.row, a.col, b.row, b.col
                );
                self.bump_version();
                inner.wake_cell(a.index(self.cols));
                inner.wake_cell(b.index(self.cols));
            }
            Carryover::Revealed(picks) => {
                let mut changed = Vec::new();
                for pos in picks {
                    let idx = pos.index(self.cols);
                    let c = &mut inner.grid[idx];
                    if c.on_board() && c.face_up() && c.controller().is_none() {
                        c.flip_down();
                        changed.push(idx);
                    }
                }
                if !changed.is_empty() {
                    self.bump_version();
                    for idx in changed {
                        inner.wake_cell(idx);
                    }
                }
            }
        }
    }

    /// First-card branch: cleanup, then acquire the target cell, waiting in
    /// the cell's FIFO queue while another player controls it.
    async fn flip_first(
        &self,
        mut inner: MutexGuard<'_, Inner>,
        player_id: &str,
        pos: Pos,
    ) -> Result<()> {
        self.run_cleanup(&mut inner, player_id);
        let idx = pos.index(self.cols);

        if !inner.grid[idx].on_board() {
            return Err(BoardError::NoCard {
                row: pos.row,
                col: pos.col,
            });
        }
        if inner.grid[idx].controller().is_none() {
            self.take_first(&mut inner, player_id, pos);
            return Ok(());
        }

        // Controlled by another player: join the cell's queue and retry on
        // each release. Only the ticket at the head of the line may acquire,
        // so arrival order is acquisition order.
        let (ticket_id, wake) = inner.enqueue(idx);
        debug!(
            "{} waiting for ({},{}) behind its controller",
            player_id, pos.row, pos.col
        );
        drop(inner);

        loop {
            wake.notified().await;
            let mut inner = self.inner.lock().await;
            if !inner.grid[idx].on_board() {
                inner.remove_ticket(idx, ticket_id);
                return Err(BoardError::NoCard {
                    row: pos.row,
                    col: pos.col,
                });
            }
            let free = inner.grid[idx].controller().is_none();
            if free && inner.is_head(idx, ticket_id) {
                inner.remove_ticket(idx, ticket_id);
                self.take_first(&mut inner, player_id, pos);
                return Ok(());
            }
            // Not our turn yet, or the cell was grabbed again before we ran:
            // keep our place in line and wait for the next release.
        }
    }

    /// Grants `player_id` control of an uncontrolled on-board cell as their
    /// first pick, flipping it up if needed.
    fn take_first(&self, inner: &mut Inner, player_id: &str, pos: Pos) {
        let idx = pos.index(self.cols);
        let was_down = {
            let c = &mut inner.grid[idx];
            debug_assert!(c.on_board() && c.controller().is_none());
            let was_down = !c.face_up();
            if was_down {
                c.flip_up();
            }
            c.grab(player_id);
            was_down
        };
        if was_down {
            // Turning a card over is the observable change; taking control
            // of an already face-up card is not.
            self.bump_version();
            inner.wake_cell(idx);
        }
        inner
            .players
            .entry(player_id.to_string())
            .or_default()
            .set_first(pos);
        debug!(
            "{} took ({},{}) as first card",
            player_id, pos.row, pos.col
        );
    }

    /// Second-card branch. Never waits: a controlled target fails fast with
    /// `Contended` so that holding one card cannot deadlock against holding
    /// another. Every failure relinquishes the first card.
    fn flip_second(
        &self,
        inner: &mut Inner,
        player_id: &str,
        first: Pos,
        pos: Pos,
    ) -> Result<()> {
        if pos == first {
            self.relinquish_first(inner, player_id, first);
            return Err(BoardError::SameCard {
                row: pos.row,
                col: pos.col,
            });
        }
        let idx = pos.index(self.cols);
        if !inner.grid[idx].on_board() {
            self.relinquish_first(inner, player_id, first);
            return Err(BoardError::NoCard {
                row: pos.row,
                col: pos.col,
            });
        }
        if inner.grid[idx].controller().is_some() {
            // Controlled by anyone. A different cell controlled by this same
            // player is unreachable from a legal turn state, but it fails
            // the same way rather than being assumed away.
            self.relinquish_first(inner, player_id, first);
            return Err(BoardError::Contended {
                row: pos.row,
                col: pos.col,
            });
        }

        let flipped = {
            let c = &mut inner.grid[idx];
            let flipped = !c.face_up();
            if flipped {
                c.flip_up();
            }
            c.grab(player_id);
            flipped
        };
        if flipped {
            self.bump_version();
            inner.wake_cell(idx);
        }

        let first_idx = first.index(self.cols);
        let is_match = inner.grid[first_idx].value() == inner.grid[idx].value();
        if is_match {
            if let Some(p) = inner.players.get_mut(player_id) {
                p.mark_match(first, pos);
            }
            debug!(
                "{} matched ({},{}) with ({},{})",
                player_id, first.row, first.col, pos.row, pos.col
            );
            // Control of both cards is kept; removal happens at this
            // player's next turn start.
        } else {
            inner.grid[first_idx].release();
            inner.grid[idx].release();
            if let Some(p) = inner.players.get_mut(player_id) {
                p.set_second(pos);
            }
            self.bump_version();
            inner.wake_cell(first_idx);
            inner.wake_cell(idx);
            debug!(
                "{} mismatched ({},{}) and ({},{})",
                player_id, first.row, first.col, pos.row, pos.col
            );
        }
        Ok(())
    }

    /// Gives up the first card on a failed second flip. The card stays face
    /// up but uncontrolled; the player's turn state is reset to empty.
    fn relinquish_first(&self, inner: &mut Inner, player_id: &str, first: Pos) {
        let idx = first.index(self.cols);
        inner.grid[idx].release();
        if let Some(p) = inner.players.get_mut(player_id) {
            p.clear();
        }
        self.bump_version();
        inner.wake_cell(idx);
    }
}
