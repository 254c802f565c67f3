use crate::engine::Context;
use crate::models::{Displacement, Position};
use crate::system::Pointer;
use chrono::{DateTime, Local};
use rand::Rng;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastMove {
    pub displacement: Displacement,
    pub to: Position,
    pub at: DateTime<Local>,
}

#[derive(Debug, Clone, Default)]
pub struct JitterStats {
    pub moves: u64,
    pub failures: u64,
    pub last_move: Option<LastMove>,
}

/// Draws an independent uniform offset in [-magnitude, magnitude] for each axis.
pub fn displacement<R: Rng + ?Sized>(rng: &mut R, magnitude: i32) -> Displacement {
    let m = magnitude.max(0);
    Displacement {
        dx: rng.gen_range(-m..=m),
        dy: rng.gen_range(-m..=m),
    }
}

/// One jitter tick: nudges the pointer if the user has been idle long enough.
///
/// Returns the applied displacement, or `None` when nothing was moved.
/// Platform failures are logged and counted, never returned.
pub fn tick<R: Rng + ?Sized>(
    ctx: &mut Context,
    pointer: &dyn Pointer,
    rng: &mut R,
    now: Instant,
) -> Option<Displacement> {
    if !ctx.activity.is_idle(now, ctx.settings.threshold()) {
        return None;
    }

    let current = match pointer.position() {
        Ok(pos) => pos,
        Err(e) => {
            tracing::warn!("skipping jitter: {}", e);
            ctx.stats.failures += 1;
            return None;
        }
    };

    // The user moved since the last sample; let the monitor catch up first.
    if ctx.activity.is_unobserved_change(current) {
        tracing::debug!(%current, "pointer moved since last sample, not jittering");
        return None;
    }

    let d = displacement(rng, ctx.settings.distance);
    let target = current.offset(d);
    if let Err(e) = pointer.move_to(target) {
        tracing::warn!("skipping jitter: {}", e);
        ctx.stats.failures += 1;
        return None;
    }

    ctx.activity.record_injected(current, ctx.settings.distance);
    ctx.stats.moves += 1;
    ctx.stats.last_move = Some(LastMove {
        displacement: d,
        to: target,
        at: Local::now(),
    });
    tracing::debug!(dx = d.dx, dy = d.dy, %target, "jittered pointer");
    Some(d)
}
