//! In-memory host used by the demo binary and by tests.

use super::{Host, Player, PlayerId, PlayerKind, ProcessControl};
use crate::message::Message;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Number of ticks the average tick time is computed over
const TICK_WINDOW: usize = 100;

pub struct SimulatedPlayer {
    id: PlayerId,
    name: String,
    kind: PlayerKind,
    connected: AtomicBool,
    inbox: Mutex<Vec<Message>>,
    kick_message: Mutex<Option<Message>>,
}

impl SimulatedPlayer {
    pub fn new<S: Into<String>>(name: S, kind: PlayerKind) -> Self {
        Self {
            id: PlayerId::random(),
            name: name.into(),
            kind,
            connected: AtomicBool::new(true),
            inbox: Mutex::new(Vec::new()),
            kick_message: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Messages sent to this player so far
    pub fn received(&self) -> Vec<Message> {
        self.inbox.lock().clone()
    }

    pub fn kick_message(&self) -> Option<Message> {
        self.kick_message.lock().clone()
    }
}

impl Player for SimulatedPlayer {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> PlayerKind {
        self.kind
    }

    fn send(&self, message: &Message) {
        debug!("[to {}] {}", self.name, message);
        self.inbox.lock().push(message.clone());
    }

    fn disconnect(&self, message: &Message) {
        info!("{} was disconnected: {}", self.name, message);
        self.connected.store(false, Ordering::SeqCst);
        *self.kick_message.lock() = Some(message.clone());
    }
}

pub struct SimulatedHost {
    ticks: AtomicU64,
    average_tick_bits: AtomicU64,
    tick_times: Mutex<VecDeque<f64>>,
    players: RwLock<Vec<Arc<SimulatedPlayer>>>,
    broadcasts: Mutex<Vec<Message>>,
    halt_requests: AtomicUsize,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            average_tick_bits: AtomicU64::new(0f64.to_bits()),
            tick_times: Mutex::new(VecDeque::with_capacity(TICK_WINDOW)),
            players: RwLock::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            halt_requests: AtomicUsize::new(0),
        }
    }

    pub fn join<S: Into<String>>(&self, name: S, kind: PlayerKind) -> Arc<SimulatedPlayer> {
        let player = Arc::new(SimulatedPlayer::new(name, kind));
        info!("{} joined the server", player.name());
        self.players.write().push(Arc::clone(&player));
        player
    }

    /// Remove a player without a kick message (they logged off)
    pub fn leave(&self, id: PlayerId) -> Option<Arc<SimulatedPlayer>> {
        let mut players = self.players.write();
        let index = players.iter().position(|p| p.id() == id)?;
        let player = players.remove(index);
        player.connected.store(false, Ordering::SeqCst);
        info!("{} left the server", player.name());
        Some(player)
    }

    /// Connected simulated players, in join order. Kicked players are
    /// dropped from the host here.
    pub fn roster(&self) -> Vec<Arc<SimulatedPlayer>> {
        let mut players = self.players.write();
        players.retain(|p| p.is_connected());
        players.clone()
    }

    /// Entries held by the host, kicked players not yet pruned included
    pub fn tracked_players(&self) -> usize {
        self.players.read().len()
    }

    /// Complete one main loop iteration that took `elapsed_ms`
    pub fn record_tick(&self, elapsed_ms: f64) {
        let mut times = self.tick_times.lock();
        if times.len() == TICK_WINDOW {
            times.pop_front();
        }
        times.push_back(elapsed_ms);
        let average = times.iter().sum::<f64>() / times.len() as f64;
        drop(times);

        self.set_average_tick_time_ms(average);
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn advance_ticks(&self, count: u64) {
        self.ticks.fetch_add(count, Ordering::SeqCst);
    }

    pub fn set_average_tick_time_ms(&self, average: f64) {
        self.average_tick_bits
            .store(average.to_bits(), Ordering::SeqCst);
    }

    pub fn broadcasts(&self) -> Vec<Message> {
        self.broadcasts.lock().clone()
    }

    pub fn halt_requests(&self) -> usize {
        self.halt_requests.load(Ordering::SeqCst)
    }

    pub fn is_halted(&self) -> bool {
        self.halt_requests() > 0
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SimulatedHost {
    fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn average_tick_time_ms(&self) -> f64 {
        f64::from_bits(self.average_tick_bits.load(Ordering::SeqCst))
    }

    fn players(&self) -> Vec<Arc<dyn Player>> {
        self.roster()
            .into_iter()
            .map(|p| p as Arc<dyn Player>)
            .collect()
    }

    fn broadcast(&self, message: &Message) {
        info!("[broadcast] {}", message);
        self.broadcasts.lock().push(message.clone());
    }

    fn halt(&self, wait_for_server: bool) {
        info!("Host halt requested (wait: {})", wait_for_server);
        self.halt_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records hard halts instead of terminating the process
#[derive(Default)]
pub struct RecordingProcess {
    halts: Mutex<Vec<i32>>,
}

impl RecordingProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halts(&self) -> Vec<i32> {
        self.halts.lock().clone()
    }
}

impl ProcessControl for RecordingProcess {
    fn hard_halt(&self, code: i32) {
        info!("Hard halt recorded with exit code {}", code);
        self.halts.lock().push(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average() {
        let host = SimulatedHost::new();
        host.record_tick(40.0);
        host.record_tick(60.0);

        assert_eq!(host.tick_count(), 2);
        assert!((host.average_tick_time_ms() - 50.0).abs() < f64::EPSILON);

        for _ in 0..TICK_WINDOW {
            host.record_tick(10.0);
        }
        assert!((host.average_tick_time_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_disconnected_players_leave_the_roster() {
        let host = SimulatedHost::new();
        let alice = host.join("alice", PlayerKind::Real);
        let bob = host.join("bob", PlayerKind::Real);

        alice.disconnect(&Message::literal("bye"));
        assert_eq!(host.players().len(), 1);
        assert_eq!(alice.kick_message(), Some(Message::literal("bye")));

        host.leave(bob.id());
        assert!(host.players().is_empty());
        assert!(bob.kick_message().is_none());
    }

    #[test]
    fn test_kicked_players_are_pruned() {
        let host = SimulatedHost::new();
        for round in 0..50 {
            let player = host.join(format!("player{}", round), PlayerKind::Real);
            player.disconnect(&Message::literal("kicked"));
            assert!(host.roster().is_empty());
        }
        assert_eq!(host.tracked_players(), 0);

        let carol = host.join("carol", PlayerKind::Real);
        assert_eq!(host.tracked_players(), 1);
        assert_eq!(host.roster()[0].id(), carol.id());
    }
}
