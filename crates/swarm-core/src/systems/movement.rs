//! Movement Phase
//!
//! Zone crossings (pickup, delivery and settlement), staged beliefs, the
//! behavior step and the noisy world move.

use bevy_ecs::prelude::*;
use swarm_events::Location;

use crate::behavior::{Behavior, Surroundings};
use crate::components::agent::{AgentId, Body, CommLink, Forager, StagedNavigation};
use crate::components::world::Arena;
use crate::geometry::{rotate, world_to_local};
use crate::ledger::PaymentDatabase;
use crate::market::pricing::Market;
use crate::motion::MotionModel;
use crate::navigation::NavigationTable;
use crate::SimRng;

/// Wall sensor reach, in body radii
pub const WALL_SENSOR_REACH: f64 = 3.0;

/// Pickup on entering food, delivery and settlement on entering the nest.
pub fn handle_crossings(
    id: AgentId,
    body: &Body,
    forager: &mut Forager,
    arena: &Arena,
    market: &mut Market,
    ledger: &mut PaymentDatabase,
) {
    if !forager.carrying && arena.contains(Location::Food, body.position) {
        forager.carrying = true;
        tracing::trace!(agent = %id, "picked up food");
    } else if forager.carrying && arena.contains(Location::Nest, body.position) {
        forager.carrying = false;
        forager.items_collected += 1;
        let reward = market.sell();
        if let Err(err) = ledger.pay_reward(id, reward) {
            tracing::warn!(agent = %id, %err, "reward not paid");
            return;
        }
        let outcome = ledger.pay_creditors(id, reward);
        tracing::debug!(
            agent = %id,
            reward,
            paid_to_sellers = outcome.distributed(),
            "item delivered"
        );
    }
}

/// Offsets to sensed zones in the body's frame; unsensed zones are `None`.
pub fn sense(arena: &Arena, body: &Body) -> [Option<glam::DVec2>; 2] {
    Location::ALL.map(|location| arena.relative_position(location, body).ok())
}

type MovementQuery<'w, 's> = Query<
    'w,
    's,
    (
        &'static AgentId,
        &'static mut Body,
        &'static mut Forager,
        &'static mut CommLink,
        &'static mut NavigationTable,
        &'static mut Behavior,
        &'static mut StagedNavigation,
    ),
>;

/// System: every agent moves once
pub fn movement_phase(
    arena: Res<Arena>,
    motion: Res<MotionModel>,
    mut rng: ResMut<SimRng>,
    mut market: ResMut<Market>,
    mut ledger: ResMut<PaymentDatabase>,
    mut agents: MovementQuery,
) {
    let mut ordered: Vec<_> = agents.iter_mut().collect();
    ordered.sort_by_key(|(id, ..)| **id);

    for (id, mut body, mut forager, mut link, mut navigation, mut behavior, mut staged) in ordered {
        handle_crossings(*id, &body, &mut forager, &arena, &mut market, &mut ledger);

        if let Some(updated) = staged.0.take() {
            *navigation = updated;
        }

        let surroundings = Surroundings {
            sensed: sense(&arena, &body),
            carrying: forager.carrying,
            wall_normal: arena
                .wall_normal(body.position, body.radius * WALL_SENSOR_REACH)
                .map(|normal| world_to_local(normal, body.orientation)),
            halted: link.is_halted(),
            speed: body.speed,
            radius: body.radius,
        };
        let step = behavior.decide_movement(&mut navigation, &surroundings, &motion, &mut rng.0);

        if step.displacement != glam::DVec2::ZERO {
            let noise = motion.heading_noise(body.drift, &mut rng.0);
            let actual = rotate(step.displacement, noise);
            body.advance(actual, step.turn);
            body.position = arena.clamp(body.position, body.radius);
        } else {
            body.advance(glam::DVec2::ZERO, step.turn);
        }
        link.tick();
    }
}
