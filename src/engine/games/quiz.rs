//! Arithmetic quiz: five multiple-choice questions, one point per right vote.

use std::{collections::HashMap, time::Duration};

use rand::{Rng, rngs::StdRng, seq::SliceRandom};
use serde_json::{Value, json};

use crate::engine::{EngineContext, EngineSetup, GameOutcome, GameRules};

const QUESTIONS: u32 = 5;
/// Answers offered per question.
pub const CHOICES: usize = 4;
/// Phase in which votes are accepted.
pub const QUESTION_PHASE: &str = "question";
const ANSWER_WINDOW: Duration = Duration::from_secs(10);
const REVEAL_WINDOW: Duration = Duration::from_secs(3);

/// One generated question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Prompt such as `7 × 6`.
    pub prompt: String,
    /// Candidate answers, shuffled.
    pub choices: Vec<i64>,
    /// Index of the right answer in `choices`.
    pub correct: usize,
}

impl Question {
    /// Draw a random question with distinct, non-negative choices.
    pub fn generate(rng: &mut StdRng) -> Self {
        let a: i64 = rng.random_range(2..=12);
        let b: i64 = rng.random_range(2..=12);
        let (prompt, answer) = match rng.random_range(0..3) {
            0 => (format!("{a} + {b}"), a + b),
            1 => {
                let (high, low) = if a >= b { (a, b) } else { (b, a) };
                (format!("{high} - {low}"), high - low)
            }
            _ => (format!("{a} × {b}"), a * b),
        };

        let mut choices = vec![answer];
        while choices.len() < CHOICES {
            let offset = rng.random_range(1..=6);
            let candidate = if rng.random_bool(0.5) {
                answer + offset
            } else {
                answer - offset
            };
            if candidate >= 0 && !choices.contains(&candidate) {
                choices.push(candidate);
            }
        }
        choices.shuffle(rng);
        let correct = choices
            .iter()
            .position(|choice| *choice == answer)
            .unwrap_or_default();

        Self {
            prompt,
            choices,
            correct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Question { until: Duration },
    Reveal { until: Duration },
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Question { .. } => QUESTION_PHASE,
            Phase::Reveal { .. } => "reveal",
        }
    }
}

/// Rules of the quiz.
pub struct QuizRules {
    roster: Vec<String>,
    asked: u32,
    question: Option<Question>,
    phase: Phase,
    points: HashMap<String, i64>,
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(QuizRules::new(setup))
}

impl QuizRules {
    /// Rules for the players of `setup`.
    pub fn new(setup: &EngineSetup) -> Self {
        Self {
            roster: setup.roster.clone(),
            asked: 0,
            question: None,
            phase: Phase::Question {
                until: Duration::ZERO,
            },
            points: HashMap::new(),
        }
    }

    fn ask(&mut self, ctx: &mut EngineContext<'_>) {
        let question = Question::generate(ctx.rng());
        self.asked += 1;
        self.phase = Phase::Question {
            until: ctx.elapsed() + ANSWER_WINDOW,
        };
        ctx.set_phase(self.phase.as_str());
        ctx.set_scratch("questionIndex", self.asked);
        ctx.set_scratch("question", question.prompt.as_str());
        ctx.set_scratch("choices", json!(question.choices));
        ctx.set_scratch("correctAnswer", Value::Null);
        for id in &self.roster {
            ctx.set_player(id, "vote", Value::Null);
        }
        self.question = Some(question);
    }

    fn reveal(&mut self, ctx: &mut EngineContext<'_>) {
        let Some(question) = &self.question else {
            return;
        };
        for (id, player) in ctx.present(&self.roster) {
            if player.vote.map(usize::from) == Some(question.correct) {
                let points = self.points.entry(id.to_string()).or_default();
                *points += 1;
                ctx.set_player(id, "score", *points);
            }
        }
        ctx.set_scratch("correctAnswer", question.correct);
        self.phase = Phase::Reveal {
            until: ctx.elapsed() + REVEAL_WINDOW,
        };
        ctx.set_phase(self.phase.as_str());
    }

    fn everyone_voted(&self, ctx: &EngineContext<'_>) -> bool {
        ctx.present(&self.roster)
            .iter()
            .all(|(_, player)| player.vote.is_some())
    }
}

impl GameRules for QuizRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(250)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.ask(ctx);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        match self.phase {
            Phase::Question { until } if ctx.elapsed() >= until => self.reveal(ctx),
            Phase::Reveal { until } if ctx.elapsed() >= until => {
                if self.asked >= QUESTIONS {
                    let scores = self
                        .roster
                        .iter()
                        .map(|id| (id.as_str(), self.points.get(id).copied().unwrap_or(0)));
                    ctx.finish(GameOutcome::top_scorer(scores));
                } else {
                    self.ask(ctx);
                }
            }
            _ => {}
        }
    }

    fn observe(&mut self, ctx: &mut EngineContext<'_>) {
        if matches!(self.phase, Phase::Question { .. }) && self.everyone_voted(ctx) {
            self.reveal(ctx);
        }
    }
}
