//! Three-room hub.
//!
//! Rooms unlock strictly in order. A global clock counts up from the moment
//! the session starts until the last room is completed; every wrong answer
//! in any room adds a fixed penalty to it.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::clock::Ticker;
use crate::config::HubSettings;
use crate::error::GameError;
use crate::puzzle::{Answers, AttemptStatus, PuzzleAttempt, Room, SubmitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubView {
    Lobby,
    Room(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCompletion {
    room: usize,
    remaining: u32,
}

#[derive(Debug)]
pub struct HubSession {
    rooms: Vec<Room>,
    settings: HubSettings,
    attempts: Vec<PuzzleAttempt>,
    view: HubView,
    elapsed: u64,
    /// Ordered set: completion order, no duplicates.
    completed: Vec<String>,
    checkpoints: HashMap<String, u64>,
    errors: u32,
    started: bool,
    finished: bool,
    /// One entry per solve still showing its success message.
    pending: Vec<PendingCompletion>,
    ticker: Ticker,
}

impl HubSession {
    pub fn new(rooms: Vec<Room>, settings: HubSettings) -> Result<Self, GameError> {
        if rooms.is_empty() {
            return Err(GameError::InvalidContent(
                "the hub needs at least one room".into(),
            ));
        }
        let attempts = fresh_attempts(rooms.len(), settings.max_errors);
        Ok(HubSession {
            rooms,
            settings,
            attempts,
            view: HubView::Lobby,
            elapsed: 0,
            completed: Vec::new(),
            checkpoints: HashMap::new(),
            errors: 0,
            started: false,
            finished: false,
            pending: Vec::new(),
            ticker: Ticker::default(),
        })
    }

    pub fn start_session(&mut self, now: Instant) {
        self.clear();
        self.started = true;
        self.ticker.start(now);
        info!(rooms = self.rooms.len(), "hub session started");
    }

    /// Back to the start screen with nothing kept.
    pub fn restart(&mut self) {
        self.clear();
        info!("hub session discarded");
    }

    fn clear(&mut self) {
        self.ticker.stop();
        self.attempts = fresh_attempts(self.rooms.len(), self.settings.max_errors);
        self.view = HubView::Lobby;
        self.elapsed = 0;
        self.completed.clear();
        self.checkpoints.clear();
        self.errors = 0;
        self.started = false;
        self.finished = false;
        self.pending.clear();
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        match self.position(id) {
            Some(0) => true,
            Some(i) => self.is_completed(&self.rooms[i - 1].meta.id),
            None => false,
        }
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.iter().any(|done| done == id)
    }

    pub fn enter_room(&mut self, id: &str) -> Result<(), GameError> {
        self.ensure_playing()?;
        let index = self.index_of(id)?;
        if !self.is_unlocked(id) {
            debug!(room = id, "locked room selected");
            return Err(GameError::RoomLocked(id.to_string()));
        }
        // Replaying a solved room starts a fresh attempt.
        if self.attempts[index].status() == AttemptStatus::Solved {
            self.attempts[index].reset();
        }
        self.view = HubView::Room(index);
        info!(room = id, "entered room");
        Ok(())
    }

    /// Records a room as done and returns to the lobby.
    ///
    /// Returns `false` when the room was already completed; its checkpoint
    /// is left untouched. Finishing the last room stops the clock in the
    /// same update.
    pub fn complete_room(&mut self, id: &str) -> Result<bool, GameError> {
        if !self.started {
            return Err(GameError::NotStarted);
        }
        self.index_of(id)?;
        if !self.is_unlocked(id) {
            return Err(GameError::RoomLocked(id.to_string()));
        }
        self.view = HubView::Lobby;
        Ok(self.record_completion(id))
    }

    /// Appends `id` to the completed set, leaving the view alone.
    fn record_completion(&mut self, id: &str) -> bool {
        if self.is_completed(id) {
            return false;
        }

        self.completed.push(id.to_string());
        self.checkpoints.insert(id.to_string(), self.elapsed);
        info!(room = id, elapsed = self.elapsed, "room completed");

        if self.completed.len() == self.rooms.len() && !self.finished {
            self.finished = true;
            self.pending.clear();
            self.ticker.stop();
            info!(
                elapsed = self.elapsed,
                errors = self.errors,
                "all rooms completed"
            );
        }
        true
    }

    pub fn record_error(&mut self) {
        if !self.started || self.finished {
            return;
        }
        self.elapsed += self.settings.penalty_seconds;
        self.errors += 1;
        info!(
            penalty = self.settings.penalty_seconds,
            elapsed = self.elapsed,
            errors = self.errors,
            "penalty applied"
        );
    }

    pub fn exit_to_hub(&mut self) {
        self.view = HubView::Lobby;
    }

    pub fn start_attempt(&mut self) -> Result<(), GameError> {
        let index = self.active_room()?;
        self.attempts[index].start()
    }

    pub fn submit(&mut self, answers: Answers) -> Result<SubmitOutcome, GameError> {
        let index = self.active_room()?;
        let outcome = self.attempts[index].submit(&self.rooms[index], answers)?;
        match &outcome {
            SubmitOutcome::Solved => self.schedule_completion(index)?,
            SubmitOutcome::Wrong {
                errors,
                fields,
                exhausted,
            } => {
                info!(
                    room = %self.rooms[index].meta.id,
                    errors,
                    exhausted,
                    wrong = %fields.join(", "),
                    "wrong answer"
                );
                self.record_error();
            }
        }
        Ok(outcome)
    }

    pub fn reset_attempt(&mut self) -> Result<(), GameError> {
        let index = self.active_room()?;
        self.attempts[index].reset();
        Ok(())
    }

    fn schedule_completion(&mut self, index: usize) -> Result<(), GameError> {
        let delay = self.settings.completion_delay_seconds;
        if delay == 0 {
            let id = self.rooms[index].meta.id.clone();
            self.complete_room(&id)?;
        } else if !self.pending.iter().any(|pending| pending.room == index) {
            self.pending.push(PendingCompletion {
                room: index,
                remaining: delay,
            });
        }
        Ok(())
    }

    /// One second of game time.
    pub fn tick(&mut self) {
        if !self.started || self.finished {
            return;
        }
        self.elapsed += 1;

        for pending in &mut self.pending {
            pending.remaining = pending.remaining.saturating_sub(1);
        }
        let (due, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|pending| pending.remaining == 0);
        self.pending = waiting;
        for pending in due {
            self.fire_completion(pending.room);
        }
    }

    /// Completes a room whose success message has run out. Only a player
    /// still looking at that room is sent back to the lobby.
    fn fire_completion(&mut self, index: usize) {
        let id = self.rooms[index].meta.id.clone();
        if !self.is_unlocked(&id) {
            warn!(room = %id, "scheduled completion rejected: room locked");
            return;
        }
        if self.view == HubView::Room(index) {
            self.view = HubView::Lobby;
        }
        self.record_completion(&id);
    }

    pub fn poll(&mut self, now: Instant) {
        for _ in 0..self.ticker.due(now) {
            self.tick();
        }
    }

    fn ensure_playing(&self) -> Result<(), GameError> {
        if !self.started {
            Err(GameError::NotStarted)
        } else if self.finished {
            Err(GameError::Finished)
        } else {
            Ok(())
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rooms.iter().position(|room| room.meta.id == id)
    }

    fn index_of(&self, id: &str) -> Result<usize, GameError> {
        self.position(id)
            .ok_or_else(|| GameError::UnknownRoom(id.to_string()))
    }

    fn active_room(&self) -> Result<usize, GameError> {
        match self.view {
            HubView::Room(index) => Ok(index),
            HubView::Lobby => Err(GameError::NoActiveRoom),
        }
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn attempt(&self, index: usize) -> Option<&PuzzleAttempt> {
        self.attempts.get(index)
    }

    pub fn view(&self) -> HubView {
        self.view
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn completed_rooms(&self) -> &[String] {
        &self.completed
    }

    pub fn checkpoint(&self, id: &str) -> Option<u64> {
        self.checkpoints.get(id).copied()
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_clock_running(&self) -> bool {
        self.ticker.is_running()
    }

    /// Seconds until the given room's success screen hands back to the lobby.
    pub fn completion_countdown(&self, index: usize) -> Option<u32> {
        self.pending
            .iter()
            .find(|pending| pending.room == index)
            .map(|pending| pending.remaining)
    }

    pub fn penalty_seconds(&self) -> u64 {
        self.settings.penalty_seconds
    }
}

fn fresh_attempts(count: usize, max_errors: u32) -> Vec<PuzzleAttempt> {
    (0..count).map(|_| PuzzleAttempt::new(max_errors)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::builtin_rooms;
    use std::time::Duration;

    fn session() -> HubSession {
        let mut hub = HubSession::new(builtin_rooms().unwrap(), HubSettings::default()).unwrap();
        hub.start_session(Instant::now());
        hub
    }

    fn answers(pairs: &[(&str, &str)]) -> Answers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn logistics_right() -> Answers {
        answers(&[("incorrect_box", "D"), ("expected_weight", "3.75")])
    }

    fn logistics_wrong() -> Answers {
        answers(&[("incorrect_box", "C"), ("expected_weight", "3.75")])
    }

    fn unlocked(hub: &HubSession) -> [bool; 3] {
        [
            hub.is_unlocked("room1"),
            hub.is_unlocked("room2"),
            hub.is_unlocked("room3"),
        ]
    }

    #[test]
    fn rooms_unlock_strictly_in_order() {
        let mut hub = session();
        assert_eq!(unlocked(&hub), [true, false, false]);

        hub.complete_room("room1").unwrap();
        assert_eq!(unlocked(&hub), [true, true, false]);

        hub.complete_room("room2").unwrap();
        assert_eq!(unlocked(&hub), [true, true, true]);

        assert!(!hub.is_unlocked("room9"));
    }

    #[test]
    fn locked_room_cannot_be_entered_or_skipped() {
        let mut hub = session();
        assert_eq!(
            hub.enter_room("room2"),
            Err(GameError::RoomLocked("room2".into()))
        );
        assert_eq!(hub.view(), HubView::Lobby);
        assert_eq!(
            hub.complete_room("room3"),
            Err(GameError::RoomLocked("room3".into()))
        );
        assert_eq!(
            hub.enter_room("attic"),
            Err(GameError::UnknownRoom("attic".into()))
        );
    }

    #[test]
    fn nothing_happens_before_start() {
        let mut hub = HubSession::new(builtin_rooms().unwrap(), HubSettings::default()).unwrap();
        assert_eq!(hub.enter_room("room1"), Err(GameError::NotStarted));
        hub.tick();
        hub.record_error();
        assert_eq!(hub.elapsed(), 0);
        assert_eq!(hub.errors(), 0);
    }

    #[test]
    fn completing_twice_keeps_first_checkpoint() {
        let mut hub = session();
        hub.tick();
        hub.tick();
        assert_eq!(hub.complete_room("room1"), Ok(true));
        assert_eq!(hub.checkpoint("room1"), Some(2));

        hub.tick();
        hub.enter_room("room1").unwrap();
        assert_eq!(hub.complete_room("room1"), Ok(false));
        assert_eq!(hub.view(), HubView::Lobby);
        assert_eq!(hub.completed_rooms(), ["room1".to_string()]);
        assert_eq!(hub.checkpoint("room1"), Some(2));
    }

    #[test]
    fn error_adds_exactly_the_penalty() {
        let mut hub = session();
        hub.tick();
        let before = hub.elapsed();
        hub.record_error();
        assert_eq!(hub.elapsed(), before + 15);
        assert_eq!(hub.errors(), 1);
    }

    #[test]
    fn last_room_stops_and_freezes_the_clock() {
        let mut hub = session();
        hub.complete_room("room1").unwrap();
        hub.complete_room("room2").unwrap();
        assert!(!hub.is_finished());
        hub.tick();
        hub.complete_room("room3").unwrap();

        assert!(hub.is_finished());
        assert!(!hub.is_clock_running());
        let frozen = hub.elapsed();
        hub.tick();
        hub.record_error();
        hub.poll(Instant::now() + Duration::from_secs(30));
        assert_eq!(hub.elapsed(), frozen);
        assert_eq!(hub.enter_room("room1"), Err(GameError::Finished));
        assert_eq!(hub.complete_room("room3"), Ok(false));
    }

    #[test]
    fn wrong_answer_costs_local_attempt_and_global_time() {
        let mut hub = session();
        hub.enter_room("room1").unwrap();
        hub.start_attempt().unwrap();

        hub.submit(logistics_wrong()).unwrap();
        assert_eq!(hub.elapsed(), 15);
        assert_eq!(hub.errors(), 1);
        assert_eq!(hub.attempt(0).unwrap().errors(), 1);
    }

    #[test]
    fn failed_room_costs_time_but_not_the_session() {
        let mut hub = session();
        hub.enter_room("room1").unwrap();
        hub.start_attempt().unwrap();
        for _ in 0..3 {
            hub.submit(logistics_wrong()).unwrap();
        }

        assert_eq!(hub.attempt(0).unwrap().status(), AttemptStatus::Failed);
        assert_eq!(
            hub.submit(logistics_right()),
            Err(GameError::AttemptClosed(AttemptStatus::Failed))
        );
        assert_eq!(hub.elapsed(), 45);
        assert!(!hub.is_finished());

        hub.reset_attempt().unwrap();
        hub.start_attempt().unwrap();
        assert_eq!(hub.submit(logistics_right()), Ok(SubmitOutcome::Solved));
    }

    #[test]
    fn solved_room_completes_after_display_delay() {
        let mut hub = session();
        hub.enter_room("room1").unwrap();
        hub.start_attempt().unwrap();
        hub.submit(logistics_right()).unwrap();

        assert_eq!(hub.completion_countdown(0), Some(2));
        assert!(!hub.is_completed("room1"));
        hub.tick();
        assert_eq!(hub.view(), HubView::Room(0));
        hub.tick();

        assert!(hub.is_completed("room1"));
        assert_eq!(hub.checkpoint("room1"), Some(2));
        assert_eq!(hub.view(), HubView::Lobby);
        assert_eq!(hub.completion_countdown(0), None);
    }

    fn simulator_right() -> Answers {
        answers(&[("abrasion", "48"), ("frequency", "4"), ("height", "1.5")])
    }

    #[test]
    fn overlapping_solves_each_complete() {
        let mut hub = session();
        hub.complete_room("room1").unwrap();

        hub.enter_room("room2").unwrap();
        hub.start_attempt().unwrap();
        hub.submit(simulator_right()).unwrap();
        hub.exit_to_hub();

        hub.enter_room("room1").unwrap();
        hub.start_attempt().unwrap();
        hub.submit(logistics_right()).unwrap();
        assert_eq!(hub.completion_countdown(1), Some(2));
        assert_eq!(hub.completion_countdown(0), Some(2));

        hub.tick();
        hub.tick();
        assert!(hub.is_completed("room2"));
        assert_eq!(hub.checkpoint("room2"), Some(2));
        assert_eq!(hub.completed_rooms(), ["room1".to_string(), "room2".to_string()]);
        assert_eq!(hub.completion_countdown(1), None);
    }

    #[test]
    fn scheduled_completion_leaves_other_rooms_open() {
        let mut hub = session();
        hub.complete_room("room1").unwrap();

        hub.enter_room("room2").unwrap();
        hub.start_attempt().unwrap();
        hub.submit(simulator_right()).unwrap();
        hub.exit_to_hub();
        hub.enter_room("room1").unwrap();

        hub.tick();
        hub.tick();
        assert!(hub.is_completed("room2"));
        assert_eq!(hub.view(), HubView::Room(0));
    }

    #[test]
    fn scheduled_completion_after_leaving_stays_in_lobby() {
        let mut hub = session();
        hub.enter_room("room1").unwrap();
        hub.start_attempt().unwrap();
        hub.submit(logistics_right()).unwrap();
        hub.exit_to_hub();

        hub.tick();
        hub.tick();
        assert!(hub.is_completed("room1"));
        assert_eq!(hub.view(), HubView::Lobby);
        assert!(hub.is_unlocked("room2"));
    }

    #[test]
    fn leaving_a_room_keeps_its_attempt() {
        let mut hub = session();
        hub.enter_room("room1").unwrap();
        hub.start_attempt().unwrap();
        hub.submit(logistics_wrong()).unwrap();
        hub.exit_to_hub();

        assert_eq!(hub.view(), HubView::Lobby);
        assert_eq!(hub.elapsed(), 15);
        hub.enter_room("room1").unwrap();
        let attempt = hub.attempt(0).unwrap();
        assert_eq!(attempt.status(), AttemptStatus::Active);
        assert_eq!(attempt.errors(), 1);
        assert_eq!(hub.start_attempt(), Ok(()));
    }

    #[test]
    fn replaying_a_completed_room_starts_fresh() {
        let mut settings = HubSettings::default();
        settings.completion_delay_seconds = 0;
        let mut hub = HubSession::new(builtin_rooms().unwrap(), settings).unwrap();
        hub.start_session(Instant::now());

        hub.enter_room("room1").unwrap();
        hub.start_attempt().unwrap();
        hub.submit(logistics_right()).unwrap();
        assert!(hub.is_completed("room1"));

        hub.enter_room("room1").unwrap();
        assert_eq!(hub.attempt(0).unwrap().status(), AttemptStatus::Idle);
    }

    #[test]
    fn poll_applies_whole_elapsed_seconds() {
        let mut hub = HubSession::new(builtin_rooms().unwrap(), HubSettings::default()).unwrap();
        let start = Instant::now();
        hub.start_session(start);
        hub.poll(start + Duration::from_millis(3_400));
        assert_eq!(hub.elapsed(), 3);
    }

    #[test]
    fn restart_returns_to_start_screen() {
        let mut hub = session();
        hub.record_error();
        hub.complete_room("room1").unwrap();
        hub.restart();

        assert!(!hub.is_started());
        assert!(!hub.is_clock_running());
        assert_eq!(hub.elapsed(), 0);
        assert!(hub.completed_rooms().is_empty());
        assert_eq!(hub.checkpoint("room1"), None);
    }
}
