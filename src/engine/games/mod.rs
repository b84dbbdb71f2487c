//! One module per minigame. Each exposes a factory registered in
//! [`GameRegistry::builtin`](super::GameRegistry::builtin).

pub mod bomb;
pub mod boss;
pub mod climb;
pub mod pursuit;
pub mod quiz;
pub mod reaction;
pub mod rhythm;
pub mod runner;
pub mod sequence;
pub mod storm;
pub mod tap;
pub mod tug;

use std::{collections::HashMap, f64::consts::TAU};

use crate::state::room::{CENTER, Point};

use super::EngineContext;

/// Counter values sampled when the active phase starts. Progress is measured
/// from here so anything a device sent during the countdown is ignored.
#[derive(Debug, Default)]
pub(crate) struct Baseline {
    values: HashMap<String, u32>,
}

impl Baseline {
    pub(crate) fn capture(
        ctx: &EngineContext<'_>,
        roster: &[String],
        read: impl Fn(&crate::state::room::Player) -> u32,
    ) -> Self {
        let values = ctx
            .present(roster)
            .into_iter()
            .map(|(id, player)| (id.to_string(), read(player)))
            .collect();
        Self { values }
    }

    /// Progress of `id` since the capture.
    pub(crate) fn since(&self, id: &str, current: u32) -> u32 {
        current.saturating_sub(self.values.get(id).copied().unwrap_or(0))
    }
}

/// Evenly spaced points on a circle around the room centre.
pub(crate) fn ring(count: usize, radius: f64) -> Vec<Point> {
    (0..count)
        .map(|index| {
            let angle = TAU * index as f64 / count.max(1) as f64;
            Point::new(CENTER + radius * angle.cos(), CENTER + radius * angle.sin())
        })
        .collect()
}

/// Round a coordinate for publishing so tiny float noise does not trigger writes.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_points_stay_inside_the_room() {
        for point in ring(7, 35.0) {
            assert!((0.0..=100.0).contains(&point.x));
            assert!((0.0..=100.0).contains(&point.y));
            assert!((point.distance_sq(Point::new(CENTER, CENTER)) - 35.0 * 35.0).abs() < 1e-6);
        }
    }
}
