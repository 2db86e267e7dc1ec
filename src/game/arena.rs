//! Arena state and the authoritative event loop

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GameRules;
use crate::util::time::unix_millis;
use crate::ws::protocol::{
    ChatKind, ClientMsg, LeaderboardEntry, Powerup, ServerMsg, Team, Vec3, WeaponId,
};

use super::chat::{self, sanitize_name, sanitize_text};
use super::combat::{CombatResolver, HitIgnored, HitOutcome};
use super::items::{ItemEvent, ItemManager};
use super::leaderboard::{self, LeaderboardCadence};
use super::map::ArenaMap;
use super::movement::MovementValidator;
use super::roster::{AdmissionError, Roster};
use super::spawn::{assign_team, SpawnPolicy};
use super::PlayerInput;

/// Who an outbound message is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every admitted connection
    All,
    AllExcept(Uuid),
    Only(Uuid),
    /// Joined members of one team
    Team(Team),
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub to: Recipient,
    pub msg: ServerMsg,
}

/// Everything the arena owns. Only the arena task touches it.
pub struct ArenaState {
    pub roster: Roster,
    pub items: ItemManager,
    pub tick: u64,
    map: ArenaMap,
    spawns: SpawnPolicy,
    movement: MovementValidator,
    combat: CombatResolver,
    cadence: LeaderboardCadence,
    outbox: Vec<Envelope>,
}

impl ArenaState {
    pub fn new(rules: &GameRules) -> Self {
        let map = ArenaMap::arena();
        info!(
            map = map.name,
            width = map.width,
            height = map.height,
            pickups = map.pickups().len(),
            "Loaded arena map"
        );

        Self {
            roster: Roster::new(rules.max_players),
            items: ItemManager::from_map(&map, rules.pickup_radius, rules.item_respawn_ms),
            tick: 0,
            spawns: SpawnPolicy::new(map.spawn_points(), rules.seed),
            map,
            movement: MovementValidator::new(rules.max_speed, rules.min_move_window_ms),
            combat: CombatResolver::new(rules.hardcore_mode),
            cadence: LeaderboardCadence::new(rules.leaderboard_interval_ticks),
            outbox: Vec::new(),
        }
    }

    /// Take every message queued since the last flush
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    fn send(&mut self, to: Recipient, msg: ServerMsg) {
        self.outbox.push(Envelope { to, msg });
    }

    /// Reserve a slot for a fresh connection
    pub fn admit(&mut self, session_id: Uuid) -> Result<(), AdmissionError> {
        self.roster.admit(session_id)
    }

    /// Dispatch one inbound message from a connection
    pub fn handle_message(&mut self, session_id: Uuid, msg: ClientMsg, now: u64) {
        match msg {
            ClientMsg::Join { name } => self.join(session_id, &name, now),
            ClientMsg::UpdateState {
                position,
                angle,
                velocity,
                current_weapon,
                weapons,
                powerups,
                health,
                armor,
            } => {
                if health.is_some() || armor.is_some() {
                    debug!(session_id = %session_id, "Ignoring client-reported health/armor");
                }
                self.update_state(
                    session_id,
                    StateClaim {
                        position,
                        angle,
                        velocity,
                        current_weapon,
                        weapons,
                        powerups,
                    },
                    now,
                );
            }
            ClientMsg::Fire {
                weapon_id, angle, ..
            } => self.fire(session_id, weapon_id, angle, now),
            ClientMsg::Hit {
                target_id,
                damage,
                attacker_id,
            } => {
                if attacker_id.is_some_and(|claimed| claimed != session_id) {
                    warn!(session_id = %session_id, "Hit reported on behalf of another combatant");
                    return;
                }
                self.hit(target_id, session_id, damage, now);
            }
            ClientMsg::Chat { text } => self.chat(session_id, &text, ChatKind::Chat, now),
            ClientMsg::TeamChat { text } => self.chat(session_id, &text, ChatKind::Team, now),
            ClientMsg::PongReply { timestamp } => self.pong(session_id, timestamp, now),
        }
    }

    /// Create the combatant for an admitted connection
    pub fn join(&mut self, session_id: Uuid, requested_name: &str, now: u64) {
        let name = sanitize_name(requested_name);
        let team = assign_team(&self.roster);
        let spawn = self.spawns.pick_spawn();

        let joined = match self.roster.join(session_id, name, team, spawn, now) {
            Ok(combatant) => combatant.view(),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Join refused");
                return;
            }
        };

        info!(
            session_id = %session_id,
            name = %joined.name,
            team = team.as_str(),
            player_count = self.roster.len(),
            "Combatant joined"
        );

        let players = self.roster.iter().map(|c| (c.id, c.view())).collect();
        self.send(Recipient::Only(session_id), ServerMsg::RosterSnapshot { players });

        let active: Vec<ServerMsg> = self.items.active().map(|item| item.spawned_msg()).collect();
        for msg in active {
            self.send(Recipient::Only(session_id), msg);
        }

        let text = format!("{} joined the {} team", joined.name, team.as_str());
        self.send(
            Recipient::AllExcept(session_id),
            ServerMsg::CombatantJoined { player: joined },
        );
        self.send(
            Recipient::All,
            ServerMsg::ChatEvent {
                message: chat::system_message(text, now),
            },
        );
        self.broadcast_roster_count();
        self.broadcast_leaderboard();
    }

    /// Forget a connection. Broadcasts departure if it had joined.
    pub fn leave(&mut self, session_id: Uuid, now: u64) {
        let Some(combatant) = self.roster.remove(&session_id) else {
            debug!(session_id = %session_id, "Connection closed before joining");
            return;
        };

        info!(
            session_id = %session_id,
            name = %combatant.name,
            player_count = self.roster.len(),
            "Combatant left"
        );

        self.send(Recipient::All, ServerMsg::CombatantLeft { id: session_id });
        self.send(
            Recipient::All,
            ServerMsg::ChatEvent {
                message: chat::system_message(format!("{} left the game", combatant.name), now),
            },
        );
        self.broadcast_roster_count();
        self.broadcast_leaderboard();
    }

    /// Validate a client state update. A failed movement check rejects the
    /// whole update, including the weapon switch and powerups.
    fn update_state(&mut self, session_id: Uuid, claim: StateClaim, now: u64) {
        let Some(combatant) = self.roster.get_mut(&session_id) else {
            debug!(session_id = %session_id, "State update before join");
            return;
        };

        let previous = combatant.position;
        let verdict = self.movement.check(
            &self.map,
            &previous,
            &claim.position,
            combatant.last_move_at,
            now,
        );
        combatant.last_move_at = now;

        if let Err(reason) = verdict {
            debug!(session_id = %session_id, reason = %reason, "Movement rejected");
            self.send(
                Recipient::Only(session_id),
                ServerMsg::PositionCorrection { position: previous },
            );
            return;
        }

        combatant.position = claim.position;
        combatant.angle = claim.angle.rem_euclid(std::f32::consts::TAU);
        combatant.velocity = claim.velocity;

        if !combatant.switch_weapon(claim.current_weapon) {
            debug!(
                session_id = %session_id,
                weapon = ?claim.current_weapon,
                "Ignoring switch to unowned weapon"
            );
        }
        if claim.weapons.iter().any(|w| !combatant.owns(*w)) {
            debug!(session_id = %session_id, "Client lists weapons it does not own");
        }
        combatant.powerups = claim
            .powerups
            .into_iter()
            .filter(|(_, expiry)| *expiry > now)
            .collect();

        let player = combatant.view();
        self.send(
            Recipient::AllExcept(session_id),
            ServerMsg::StateUpdate { player },
        );
    }

    fn fire(&mut self, session_id: Uuid, weapon_id: WeaponId, angle: f32, now: u64) {
        let Some(shooter) = self.roster.get_mut(&session_id) else {
            return;
        };

        match self.combat.attempt_fire(shooter, weapon_id, now) {
            Ok(()) => {
                let position = shooter.position;
                self.send(
                    Recipient::All,
                    ServerMsg::FireEvent {
                        shooter_id: session_id,
                        weapon_id,
                        angle,
                        position,
                    },
                );
            }
            Err(reason) => {
                debug!(session_id = %session_id, weapon = ?weapon_id, reason = %reason, "Shot denied");
            }
        }
    }

    /// Resolve a hit and broadcast the consequences
    pub fn hit(&mut self, target_id: Uuid, attacker_id: Uuid, damage: f32, now: u64) {
        let outcome = self.combat.apply_hit(
            &mut self.roster,
            &mut self.spawns,
            target_id,
            attacker_id,
            damage,
            now,
        );

        match outcome {
            HitOutcome::Ignored(HitIgnored::FriendlyFire) => {
                debug!(target_id = %target_id, attacker_id = %attacker_id, "Team hit discarded");
                return;
            }
            HitOutcome::Ignored(reason) => {
                debug!(target_id = %target_id, attacker_id = %attacker_id, ?reason, "Hit on unknown combatant");
                return;
            }
            HitOutcome::Damaged { absorbed, dealt } => {
                debug!(target_id = %target_id, attacker_id = %attacker_id, absorbed, dealt, "Hit landed");
            }
            HitOutcome::Killed {
                ref target_name,
                ref attacker_name,
                self_kill,
                respawn_at,
            } => {
                info!(
                    target_id = %target_id,
                    attacker_id = %attacker_id,
                    respawn_x = respawn_at.x,
                    respawn_z = respawn_at.z,
                    "{} killed {}", attacker_name, target_name
                );
                let message = chat::kill_message(attacker_name, target_name, self_kill, now);
                self.send(Recipient::All, ServerMsg::ChatEvent { message });
            }
        }

        self.broadcast_state(target_id);
        if attacker_id != target_id {
            self.broadcast_state(attacker_id);
        }

        if matches!(outcome, HitOutcome::Killed { .. }) {
            self.broadcast_leaderboard();
        }
    }

    fn chat(&mut self, session_id: Uuid, text: &str, kind: ChatKind, now: u64) {
        let Some(sender) = self.roster.get(&session_id) else {
            return;
        };
        let Some(text) = sanitize_text(text) else {
            return;
        };

        let to = match kind {
            ChatKind::Team => Recipient::Team(sender.team),
            _ => Recipient::All,
        };
        let message = chat::player_message(session_id, &sender.name, text, kind, now);
        self.send(to, ServerMsg::ChatEvent { message });
    }

    fn pong(&mut self, session_id: Uuid, timestamp: u64, now: u64) {
        if timestamp > now {
            debug!(session_id = %session_id, "Pong from the future ignored");
            return;
        }
        if let Some(combatant) = self.roster.get_mut(&session_id) {
            combatant.record_latency(now - timestamp, now);
        }
    }

    /// One scheduler tick: latency probes, heartbeat leaderboard, items
    pub fn tick(&mut self, now: u64) {
        self.tick += 1;

        for id in self.roster.ids() {
            self.send(Recipient::Only(id), ServerMsg::PingProbe { timestamp: now });
            let expired = self
                .roster
                .get_mut(&id)
                .is_some_and(|combatant| combatant.expire_powerups(now));
            if expired {
                self.broadcast_state(id);
            }
        }

        if self.cadence.should_refresh() {
            self.broadcast_leaderboard();
        }

        for event in self.items.tick(now, &mut self.roster) {
            match event {
                ItemEvent::Respawned { index } => {
                    if let Some(msg) = self.items.get(index).map(|item| item.spawned_msg()) {
                        self.send(Recipient::All, msg);
                    }
                }
                ItemEvent::Collected {
                    item_id,
                    collector_id,
                } => {
                    debug!(item_id = %item_id, collector_id = %collector_id, "Item collected");
                    self.send(
                        Recipient::All,
                        ServerMsg::ItemCollected {
                            item_id,
                            collector_id,
                        },
                    );
                    self.broadcast_state(collector_id);
                }
            }
        }
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard::project(&self.roster)
    }

    fn broadcast_state(&mut self, id: Uuid) {
        if let Some(player) = self.roster.get(&id).map(|c| c.view()) {
            self.send(Recipient::All, ServerMsg::StateUpdate { player });
        }
    }

    fn broadcast_roster_count(&mut self) {
        let count = self.roster.len();
        self.send(Recipient::All, ServerMsg::RosterCount { count });
    }

    fn broadcast_leaderboard(&mut self) {
        let entries = self.leaderboard();
        self.send(Recipient::All, ServerMsg::Leaderboard { entries });
    }
}

/// Movement-bearing part of an `updateState`
struct StateClaim {
    position: Vec3,
    angle: f32,
    velocity: Vec3,
    current_weapon: WeaponId,
    weapons: Vec<WeaponId>,
    powerups: BTreeMap<Powerup, u64>,
}

/// Commands accepted by the arena task
#[derive(Debug)]
pub enum ArenaCommand {
    Connect {
        session_id: Uuid,
        outbound: mpsc::Sender<ServerMsg>,
        reply: oneshot::Sender<Result<(), AdmissionError>>,
    },
    Input(PlayerInput),
    Disconnect {
        session_id: Uuid,
    },
    Leaderboard {
        reply: oneshot::Sender<Vec<LeaderboardEntry>>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("arena task is not running")]
    Closed,
}

/// Cloneable handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    cmd_tx: mpsc::Sender<ArenaCommand>,
    player_count: Arc<AtomicUsize>,
    capacity: usize,
}

impl ArenaHandle {
    /// Ask for admission and register the connection's outbound channel
    pub async fn connect(
        &self,
        session_id: Uuid,
        outbound: mpsc::Sender<ServerMsg>,
    ) -> Result<(), ConnectError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ArenaCommand::Connect {
                session_id,
                outbound,
                reply,
            })
            .await
            .map_err(|_| ConnectError::Closed)?;
        rx.await.map_err(|_| ConnectError::Closed)?.map_err(Into::into)
    }

    /// Forward a client message. Returns false once the arena is gone.
    pub async fn send_input(&self, input: PlayerInput) -> bool {
        self.cmd_tx.send(ArenaCommand::Input(input)).await.is_ok()
    }

    pub async fn disconnect(&self, session_id: Uuid) {
        let _ = self
            .cmd_tx
            .send(ArenaCommand::Disconnect { session_id })
            .await;
    }

    pub async fn leaderboard(&self) -> Option<Vec<LeaderboardEntry>> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ArenaCommand::Leaderboard { reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Joined combatants
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The arena task: single owner of all game state
pub struct Arena {
    state: ArenaState,
    cmd_rx: mpsc::Receiver<ArenaCommand>,
    outbound: HashMap<Uuid, mpsc::Sender<ServerMsg>>,
    player_count: Arc<AtomicUsize>,
    rules: GameRules,
}

impl Arena {
    pub fn new(rules: GameRules) -> (Self, ArenaHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(1024);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = ArenaHandle {
            cmd_tx,
            player_count: player_count.clone(),
            capacity: rules.max_players,
        };

        let arena = Self {
            state: ArenaState::new(&rules),
            cmd_rx,
            outbound: HashMap::new(),
            player_count,
            rules,
        };

        (arena, handle)
    }

    /// Interleave inbound commands with the fixed-rate tick until every
    /// handle is dropped
    pub async fn run(mut self) {
        info!(
            tick_rate = self.rules.tick_rate,
            capacity = self.rules.max_players,
            hardcore = self.rules.hardcore_mode,
            "Arena started"
        );

        let mut tick_interval = interval(self.rules.tick_period());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = tick_interval.tick() => {
                    self.state.tick(unix_millis());
                }
            }
            self.flush();
        }

        info!(ticks = self.state.tick, "Arena stopped");
    }

    fn handle_command(&mut self, cmd: ArenaCommand) {
        match cmd {
            ArenaCommand::Connect {
                session_id,
                outbound,
                reply,
            } => {
                let result = self.state.admit(session_id);
                match result {
                    Ok(()) => {
                        self.outbound.insert(session_id, outbound);
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Admission refused");
                    }
                }
                let _ = reply.send(result);
            }
            ArenaCommand::Input(input) => {
                if !self.outbound.contains_key(&input.session_id) {
                    debug!(session_id = %input.session_id, "Input from unknown connection");
                    return;
                }
                self.state
                    .handle_message(input.session_id, input.msg, input.received_at);
            }
            ArenaCommand::Disconnect { session_id } => {
                self.outbound.remove(&session_id);
                self.state.leave(session_id, unix_millis());
            }
            ArenaCommand::Leaderboard { reply } => {
                let _ = reply.send(self.state.leaderboard());
            }
        }
        self.player_count
            .store(self.state.roster.len(), Ordering::Relaxed);
    }

    /// Deliver queued messages. A full or closed channel drops only that copy.
    fn flush(&mut self) {
        for envelope in self.state.drain_outbox() {
            let targets: Vec<Uuid> = match envelope.to {
                Recipient::All => self.outbound.keys().copied().collect(),
                Recipient::AllExcept(skip) => self
                    .outbound
                    .keys()
                    .copied()
                    .filter(|id| *id != skip)
                    .collect(),
                Recipient::Only(id) => vec![id],
                Recipient::Team(team) => self
                    .state
                    .roster
                    .iter()
                    .filter(|c| c.team == team)
                    .map(|c| c.id)
                    .collect(),
            };

            for id in targets {
                if let Some(tx) = self.outbound.get(&id) {
                    if let Err(e) = tx.try_send(envelope.msg.clone()) {
                        debug!(session_id = %id, error = %e, "Dropped outbound message");
                    }
                }
            }
        }
    }
}
