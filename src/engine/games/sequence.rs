//! Sequence repeat, in two flavours: Simon grows one sequence by a symbol per
//! round, memory draws a fresh, longer sequence every round.

use std::{collections::HashMap, time::Duration};

use rand::Rng;
use serde_json::{Value, json};

use crate::{
    engine::{EngineContext, EngineSetup, GameOutcome, GameRules},
    state::room::RoundStatus,
};

/// Phase in which devices submit their symbols.
pub const INPUT_PHASE: &str = "input";
const SHOWING_PHASE: &str = "showing";
const MAX_ROUNDS: u32 = 10;
const REVEAL_PER_SYMBOL: Duration = Duration::from_millis(600);
const REVEAL_PADDING: Duration = Duration::from_millis(800);
const INPUT_PER_SYMBOL: Duration = Duration::from_millis(1_500);
const INPUT_PADDING: Duration = Duration::from_secs(3);

/// How the sequence evolves between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    /// Append one symbol to the previous sequence.
    Grow,
    /// Draw a brand-new sequence one symbol longer than the last.
    Regenerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Showing { until: Duration },
    Input { until: Duration },
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Showing { .. } => SHOWING_PHASE,
            Phase::Input { .. } => INPUT_PHASE,
        }
    }
}

/// Compare a submitted sequence against the expected one, symbol by symbol.
/// The first wrong symbol fails the round; anything after it is never looked at.
pub fn judge(expected: &[u8], submitted: &[u8]) -> RoundStatus {
    for (index, symbol) in submitted.iter().enumerate() {
        match expected.get(index) {
            Some(wanted) if wanted == symbol => {}
            Some(_) => return RoundStatus::Fail,
            None => break,
        }
    }
    if submitted.len() >= expected.len() {
        RoundStatus::Success
    } else {
        RoundStatus::Playing
    }
}

/// Rules of the sequence-repeat games.
pub struct SequenceRules {
    mode: SequenceMode,
    symbols: u8,
    start_len: usize,
    roster: Vec<String>,
    round: u32,
    sequence: Vec<u8>,
    phase: Phase,
    statuses: HashMap<String, RoundStatus>,
    alive: Vec<String>,
    rounds_won: HashMap<String, i64>,
}

/// Simon: four colours, one more per round.
pub fn simon(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(SequenceRules::new(setup, SequenceMode::Grow, 4, 1))
}

/// Memory: six symbols, fresh sequence per round.
pub fn memory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(SequenceRules::new(setup, SequenceMode::Regenerate, 6, 3))
}

impl SequenceRules {
    /// Rules with `symbols` distinct symbols and a first round of `start_len`.
    pub fn new(setup: &EngineSetup, mode: SequenceMode, symbols: u8, start_len: usize) -> Self {
        Self {
            mode,
            symbols,
            start_len,
            roster: setup.roster.clone(),
            round: 0,
            sequence: Vec::new(),
            phase: Phase::Showing {
                until: Duration::ZERO,
            },
            statuses: HashMap::new(),
            alive: setup.roster.clone(),
            rounds_won: HashMap::new(),
        }
    }

    fn next_round(&mut self, ctx: &mut EngineContext<'_>) {
        self.round += 1;
        match self.mode {
            SequenceMode::Grow => {
                if self.sequence.is_empty() {
                    self.sequence = self.draw(ctx, self.start_len);
                } else {
                    let symbol = ctx.rng().random_range(0..self.symbols);
                    self.sequence.push(symbol);
                }
            }
            SequenceMode::Regenerate => {
                let len = self.start_len + self.round as usize - 1;
                self.sequence = self.draw(ctx, len);
            }
        }

        let reveal = REVEAL_PER_SYMBOL * self.sequence.len() as u32 + REVEAL_PADDING;
        self.phase = Phase::Showing {
            until: ctx.elapsed() + reveal,
        };
        self.statuses.clear();
        ctx.set_phase(self.phase.as_str());
        ctx.set_scratch("round", self.round);
        ctx.set_scratch("currentSequence", json!(self.sequence));
        for id in &self.alive {
            ctx.set_player(id, "memoryInput", Value::Null);
            ctx.set_player(id, "memoryStatus", Value::Null);
        }
    }

    fn draw(&self, ctx: &mut EngineContext<'_>, len: usize) -> Vec<u8> {
        (0..len)
            .map(|_| ctx.rng().random_range(0..self.symbols))
            .collect()
    }

    fn open_input(&mut self, ctx: &mut EngineContext<'_>) {
        let window = INPUT_PER_SYMBOL * self.sequence.len() as u32 + INPUT_PADDING;
        self.phase = Phase::Input {
            until: ctx.elapsed() + window,
        };
        ctx.set_phase(self.phase.as_str());
        for id in &self.alive {
            self.statuses.insert(id.clone(), RoundStatus::Playing);
            ctx.set_player(id, "memoryStatus", json!(RoundStatus::Playing));
        }
    }

    fn judge_inputs(&mut self, ctx: &mut EngineContext<'_>) {
        for id in &self.alive {
            if self.statuses.get(id) != Some(&RoundStatus::Playing) {
                continue;
            }
            let Some(player) = ctx.player(id) else {
                continue;
            };
            let status = judge(&self.sequence, &player.memory_input);
            if status != RoundStatus::Playing {
                self.statuses.insert(id.clone(), status);
                ctx.set_player(id, "memoryStatus", json!(status));
            }
        }
    }

    fn round_settled(&self, ctx: &EngineContext<'_>) -> bool {
        self.alive.iter().all(|id| {
            ctx.player(id).is_none() || self.statuses.get(id) != Some(&RoundStatus::Playing)
        })
    }

    fn close_round(&mut self, ctx: &mut EngineContext<'_>) {
        let mut survivors = Vec::new();
        for id in &self.alive {
            match self.statuses.get(id) {
                Some(RoundStatus::Success) => {
                    let won = self.rounds_won.entry(id.clone()).or_default();
                    *won += 1;
                    ctx.set_player(id, "score", *won);
                    survivors.push(id.clone());
                }
                _ => {
                    ctx.set_player(id, "memoryStatus", json!(RoundStatus::Fail));
                    ctx.set_player(id, "eliminated", true);
                }
            }
        }

        let contested = self.roster.len() > 1;
        if survivors.is_empty() || (contested && survivors.len() == 1) {
            ctx.finish(GameOutcome::survivors(survivors));
            return;
        }
        if self.round >= MAX_ROUNDS {
            let scores = survivors
                .iter()
                .map(|id| (id.as_str(), self.rounds_won.get(id).copied().unwrap_or(0)));
            ctx.finish(GameOutcome::top_scorer(scores));
            return;
        }

        self.alive = survivors;
        self.next_round(ctx);
    }
}

impl GameRules for SequenceRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.alive = ctx
            .present(&self.roster)
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        self.next_round(ctx);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        match self.phase {
            Phase::Showing { until } if ctx.elapsed() >= until => self.open_input(ctx),
            Phase::Input { until } => {
                self.judge_inputs(ctx);
                if ctx.elapsed() >= until || self.round_settled(ctx) {
                    self.close_round(ctx);
                }
            }
            Phase::Showing { .. } => {}
        }
    }

    fn observe(&mut self, ctx: &mut EngineContext<'_>) {
        if matches!(self.phase, Phase::Input { .. }) {
            self.judge_inputs(ctx);
            if self.round_settled(ctx) {
                self.close_round(ctx);
            }
        }
    }
}
