use crate::config::VotingConfig;
use crate::executor;
use crate::host::{CommandSource, Host, Player, PlayerId};
use crate::message::{self, Message};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Rejections shown to whoever ran the command. Nothing else changes when
/// one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("Only players can use this command")]
    PlayersOnly,

    #[error("No shutdown vote is in progress")]
    NoVoteInProgress,

    #[error("A shutdown vote is already in progress")]
    VoteInProgress,

    #[error("Too soon since the last vote; {remaining_secs} seconds left")]
    TooSoon { remaining_secs: u64 },

    #[error("Not enough players online; {required} required")]
    NotEnoughPlayers { required: u32 },
}

impl VoteError {
    pub fn message(&self) -> Message {
        match self {
            VoteError::PlayersOnly => Message::translatable(message::PLAYERS_ONLY),
            VoteError::NoVoteInProgress => Message::translatable(message::NO_VOTE_IN_PROGRESS),
            VoteError::VoteInProgress => Message::translatable(message::VOTE_IN_PROGRESS),
            VoteError::TooSoon { remaining_secs } => {
                Message::translatable(message::TOO_SOON).with_arg(remaining_secs)
            }
            VoteError::NotEnoughPlayers { required } => {
                Message::translatable(message::NOT_ENOUGH_PLAYERS).with_arg(required)
            }
        }
    }
}

/// Why a running vote was called off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteFailure {
    NotEnoughPlayers,
    MaxNoVotes,
}

impl VoteFailure {
    fn key(self) -> &'static str {
        match self {
            VoteFailure::NotEnoughPlayers => message::FAIL_NOT_ENOUGH_PLAYERS,
            VoteFailure::MaxNoVotes => message::FAIL_MAX_NO_VOTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Started,
    /// Vote stored; still waiting for the rest of the players
    Recorded { yes: u32, no: u32 },
    Failed(VoteFailure),
    /// Everyone voted and the no-votes stayed under the limit
    Passed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    Idle,
    Voting,
}

/// Tallies for the `/shutdown` vote
pub struct VoteCoordinator {
    config: VotingConfig,
    votes: HashMap<PlayerId, bool>,
    voting: bool,
    last_vote_millis: i64,
}

impl VoteCoordinator {
    pub fn new(config: &VotingConfig) -> Self {
        Self {
            config: config.clone(),
            votes: HashMap::new(),
            voting: false,
            last_vote_millis: 0,
        }
    }

    pub fn status(&self) -> VoteStatus {
        if self.voting {
            VoteStatus::Voting
        } else {
            VoteStatus::Idle
        }
    }

    /// Current (yes, no) counts
    pub fn tally(&self) -> (u32, u32) {
        self.votes.values().fold((0, 0), |(yes, no), vote| {
            if *vote {
                (yes + 1, no)
            } else {
                (yes, no + 1)
            }
        })
    }

    pub fn last_vote_millis(&self) -> i64 {
        self.last_vote_millis
    }

    pub fn initiate_vote(
        &mut self,
        host: &dyn Host,
        source: &CommandSource,
    ) -> Result<VoteOutcome, VoteError> {
        self.initiate_vote_at(host, source, Utc::now().timestamp_millis())
    }

    pub fn initiate_vote_at(
        &mut self,
        host: &dyn Host,
        source: &CommandSource,
        now_millis: i64,
    ) -> Result<VoteOutcome, VoteError> {
        let player = voter(source)?;

        if self.voting {
            return Err(VoteError::VoteInProgress);
        }

        let interval = i64::from(self.config.interval_minutes) * 60 * 1000;
        let difference = now_millis - self.last_vote_millis;
        if difference < interval {
            return Err(VoteError::TooSoon {
                remaining_secs: ((interval - difference) / 1000) as u64,
            });
        }

        if self.real_player_count(host) < self.config.min_voters {
            return Err(VoteError::NotEnoughPlayers {
                required: self.config.min_voters,
            });
        }

        self.votes.clear();
        self.voting = true;
        self.last_vote_millis = now_millis;

        message::to_all(host, message::VOTE_BEGUN);
        info!("{} called for a shutdown vote", player.name());
        Ok(VoteOutcome::Started)
    }

    pub fn cast_vote(
        &mut self,
        host: &dyn Host,
        source: &CommandSource,
        choice: bool,
    ) -> Result<VoteOutcome, VoteError> {
        self.cast_vote_at(host, source, choice, Utc::now().timestamp_millis())
    }

    pub fn cast_vote_at(
        &mut self,
        host: &dyn Host,
        source: &CommandSource,
        choice: bool,
        now_millis: i64,
    ) -> Result<VoteOutcome, VoteError> {
        let player = voter(source)?;

        if !self.voting {
            return Err(VoteError::NoVoteInProgress);
        }

        if self.votes.insert(player.id(), choice).is_some() {
            message::to(source, message::VOTE_CLEARED);
        }
        message::to(source, message::VOTE_RECORDED);

        info!(
            "{} voted {}",
            player.name(),
            if choice { "yes" } else { "no" }
        );
        Ok(self.check_votes(host, now_millis))
    }

    fn check_votes(&mut self, host: &dyn Host, now_millis: i64) -> VoteOutcome {
        let players = host.players().len() as u32;

        if players < self.config.min_voters {
            return self.vote_failure(host, VoteFailure::NotEnoughPlayers, now_millis);
        }

        let (yes, no) = self.tally();

        if no >= self.config.max_no_votes {
            return self.vote_failure(host, VoteFailure::MaxNoVotes, now_millis);
        }

        if yes + no == players {
            return self.vote_success(host);
        }

        VoteOutcome::Recorded { yes, no }
    }

    fn vote_success(&mut self, host: &dyn Host) -> VoteOutcome {
        info!("Server shutdown initiated by vote");
        self.votes.clear();
        self.voting = false;

        executor::shutdown(Some(host), &Message::translatable(message::USER_SHUTDOWN));
        VoteOutcome::Passed
    }

    fn vote_failure(&mut self, host: &dyn Host, failure: VoteFailure, now_millis: i64) -> VoteOutcome {
        message::to_all(host, failure.key());
        info!("Shutdown vote failed: {:?}", failure);

        self.votes.clear();
        self.last_vote_millis = now_millis;
        self.voting = false;
        VoteOutcome::Failed(failure)
    }

    /// Automated players never count towards starting a vote
    fn real_player_count(&self, host: &dyn Host) -> u32 {
        executor::real_player_count(Some(host)) as u32
    }
}

fn voter(source: &CommandSource) -> Result<&Arc<dyn Player>, VoteError> {
    source
        .player()
        .filter(|player| player.is_real())
        .ok_or(VoteError::PlayersOnly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::{SimulatedHost, SimulatedPlayer};
    use crate::host::PlayerKind;

    const T0: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60 * 1000;

    fn create_test_config() -> VotingConfig {
        VotingConfig {
            enabled: true,
            interval_minutes: 15,
            min_voters: 4,
            max_no_votes: 2,
        }
    }

    fn create_players(host: &SimulatedHost, count: usize) -> Vec<Arc<SimulatedPlayer>> {
        (0..count)
            .map(|i| host.join(format!("player{}", i), PlayerKind::Real))
            .collect()
    }

    fn source(player: &Arc<SimulatedPlayer>) -> CommandSource {
        CommandSource::Player(Arc::clone(player) as Arc<dyn Player>)
    }

    #[test]
    fn test_full_participation_under_no_limit_passes() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 4);
        let mut votes = VoteCoordinator::new(&create_test_config());

        assert_eq!(
            votes.initiate_vote_at(&host, &source(&players[0]), T0),
            Ok(VoteOutcome::Started)
        );
        assert_eq!(votes.status(), VoteStatus::Voting);
        assert_eq!(
            host.broadcasts(),
            vec![Message::translatable(message::VOTE_BEGUN)]
        );

        for (i, player) in players.iter().take(3).enumerate() {
            assert_eq!(
                votes.cast_vote_at(&host, &source(player), true, T0),
                Ok(VoteOutcome::Recorded {
                    yes: i as u32 + 1,
                    no: 0
                })
            );
        }

        assert_eq!(
            votes.cast_vote_at(&host, &source(&players[3]), false, T0),
            Ok(VoteOutcome::Passed)
        );
        assert_eq!(host.halt_requests(), 1);
        for player in &players {
            assert_eq!(
                player.kick_message(),
                Some(Message::translatable(message::USER_SHUTDOWN))
            );
        }
        // Success leaves the cooldown anchor at the vote start
        assert_eq!(votes.last_vote_millis(), T0);
    }

    #[test]
    fn test_reaching_max_no_votes_fails_immediately() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 4);
        let mut votes = VoteCoordinator::new(&create_test_config());

        votes.initiate_vote_at(&host, &source(&players[0]), T0).unwrap();
        votes
            .cast_vote_at(&host, &source(&players[0]), false, T0 + 1000)
            .unwrap();
        let outcome = votes
            .cast_vote_at(&host, &source(&players[1]), false, T0 + 2000)
            .unwrap();

        assert_eq!(outcome, VoteOutcome::Failed(VoteFailure::MaxNoVotes));
        assert_eq!(votes.status(), VoteStatus::Idle);
        assert_eq!(votes.tally(), (0, 0));
        assert_eq!(votes.last_vote_millis(), T0 + 2000);
        assert_eq!(
            host.broadcasts().last(),
            Some(&Message::translatable(message::FAIL_MAX_NO_VOTES))
        );
        assert_eq!(host.halt_requests(), 0);
    }

    #[test]
    fn test_cooldown_reports_remaining_seconds() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 4);
        let mut votes = VoteCoordinator::new(&create_test_config());

        votes.initiate_vote_at(&host, &source(&players[0]), T0).unwrap();
        votes.cast_vote_at(&host, &source(&players[0]), false, T0).unwrap();
        votes.cast_vote_at(&host, &source(&players[1]), false, T0).unwrap();

        assert_eq!(
            votes.initiate_vote_at(&host, &source(&players[2]), T0 + 5 * MINUTE),
            Err(VoteError::TooSoon {
                remaining_secs: 600
            })
        );
        assert_eq!(
            votes.initiate_vote_at(&host, &source(&players[2]), T0 + 1),
            Err(VoteError::TooSoon {
                remaining_secs: 899
            })
        );
        assert_eq!(
            votes.initiate_vote_at(&host, &source(&players[2]), T0 + 15 * MINUTE),
            Ok(VoteOutcome::Started)
        );
    }

    #[test]
    fn test_zero_interval_has_no_cooldown() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 4);
        let mut config = create_test_config();
        config.interval_minutes = 0;
        config.max_no_votes = 1;
        let mut votes = VoteCoordinator::new(&config);

        votes.initiate_vote_at(&host, &source(&players[0]), T0).unwrap();
        votes.cast_vote_at(&host, &source(&players[1]), false, T0).unwrap();
        assert_eq!(
            votes.initiate_vote_at(&host, &source(&players[0]), T0),
            Ok(VoteOutcome::Started)
        );
    }

    #[test]
    fn test_start_rejections() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 3);
        let bot = host.join("quarry", PlayerKind::Automated);
        let mut votes = VoteCoordinator::new(&create_test_config());

        assert_eq!(
            votes.initiate_vote_at(&host, &CommandSource::Console, T0),
            Err(VoteError::PlayersOnly)
        );
        assert_eq!(
            votes.initiate_vote_at(&host, &source(&bot), T0),
            Err(VoteError::PlayersOnly)
        );
        // The bot does not count towards the minimum
        assert_eq!(
            votes.initiate_vote_at(&host, &source(&players[0]), T0),
            Err(VoteError::NotEnoughPlayers { required: 4 })
        );

        let fourth = host.join("player3", PlayerKind::Real);
        votes.initiate_vote_at(&host, &source(&fourth), T0).unwrap();
        assert_eq!(
            votes.initiate_vote_at(&host, &source(&players[1]), T0),
            Err(VoteError::VoteInProgress)
        );
    }

    #[test]
    fn test_voting_without_a_vote_is_rejected() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 4);
        let mut votes = VoteCoordinator::new(&create_test_config());

        assert_eq!(
            votes.cast_vote_at(&host, &source(&players[0]), true, T0),
            Err(VoteError::NoVoteInProgress)
        );
        assert_eq!(
            votes.cast_vote_at(&host, &CommandSource::Console, true, T0),
            Err(VoteError::PlayersOnly)
        );
        assert!(players[0].received().is_empty());
    }

    #[test]
    fn test_revoting_overwrites_previous_choice() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 4);
        let mut votes = VoteCoordinator::new(&create_test_config());

        votes.initiate_vote_at(&host, &source(&players[0]), T0).unwrap();
        votes.cast_vote_at(&host, &source(&players[1]), false, T0).unwrap();
        let outcome = votes
            .cast_vote_at(&host, &source(&players[1]), true, T0)
            .unwrap();

        assert_eq!(outcome, VoteOutcome::Recorded { yes: 1, no: 0 });
        assert_eq!(
            players[1].received(),
            vec![
                Message::translatable(message::VOTE_RECORDED),
                Message::translatable(message::VOTE_CLEARED),
                Message::translatable(message::VOTE_RECORDED),
            ]
        );
    }

    #[test]
    fn test_players_leaving_below_minimum_fails_the_vote() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 4);
        let mut votes = VoteCoordinator::new(&create_test_config());

        votes.initiate_vote_at(&host, &source(&players[0]), T0).unwrap();
        host.leave(players[3].id());

        let outcome = votes
            .cast_vote_at(&host, &source(&players[0]), true, T0 + MINUTE)
            .unwrap();
        assert_eq!(outcome, VoteOutcome::Failed(VoteFailure::NotEnoughPlayers));
        assert_eq!(votes.last_vote_millis(), T0 + MINUTE);
        assert_eq!(
            host.broadcasts().last(),
            Some(&Message::translatable(message::FAIL_NOT_ENOUGH_PLAYERS))
        );
    }

    #[test]
    fn test_idle_player_keeps_the_vote_open() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 3);
        let mut config = create_test_config();
        config.min_voters = 2;
        let mut votes = VoteCoordinator::new(&config);

        votes.initiate_vote_at(&host, &source(&players[0]), T0).unwrap();
        votes.cast_vote_at(&host, &source(&players[0]), true, T0).unwrap();
        let outcome = votes
            .cast_vote_at(&host, &source(&players[1]), true, T0)
            .unwrap();

        assert_eq!(outcome, VoteOutcome::Recorded { yes: 2, no: 0 });
        assert_eq!(votes.status(), VoteStatus::Voting);
        assert_eq!(host.halt_requests(), 0);
    }

    #[test]
    fn test_connected_bot_must_be_counted_for_success() {
        let host = SimulatedHost::new();
        let players = create_players(&host, 2);
        host.join("quarry", PlayerKind::Automated);
        let mut config = create_test_config();
        config.min_voters = 2;
        let mut votes = VoteCoordinator::new(&config);

        votes.initiate_vote_at(&host, &source(&players[0]), T0).unwrap();
        votes.cast_vote_at(&host, &source(&players[0]), true, T0).unwrap();
        let outcome = votes
            .cast_vote_at(&host, &source(&players[1]), true, T0)
            .unwrap();

        assert_eq!(outcome, VoteOutcome::Recorded { yes: 2, no: 0 });
        assert_eq!(votes.status(), VoteStatus::Voting);
        assert_eq!(host.halt_requests(), 0);
    }

    #[test]
    fn test_error_messages_carry_arguments() {
        assert_eq!(
            VoteError::TooSoon { remaining_secs: 90 }.message(),
            Message::translatable(message::TOO_SOON).with_arg(90)
        );
        assert_eq!(
            VoteError::NotEnoughPlayers { required: 4 }.message().text(),
            "Not enough players online for a shutdown vote; 4 are required"
        );
    }
}
