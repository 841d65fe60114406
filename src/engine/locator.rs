//! Nearest-vehicle lookup for proximity commands.
//!
//! A linear scan over the candidates; the live vehicle count per server is
//! small enough that no spatial index is kept.

use crate::engine::binder::EntityBinder;
use crate::engine::model::Vec3;
use crate::engine::world::{EntityHandle, LiveVehicle, PlayerState, World};

/// The closest governed candidate in the player's dimension strictly inside
/// `max_radius`. Ties go to the earliest candidate.
pub fn nearest<'a, I, G>(
    player: &PlayerState,
    candidates: I,
    is_governed: G,
    max_radius: f32,
) -> Option<EntityHandle>
where
    I: IntoIterator<Item = (EntityHandle, &'a LiveVehicle)>,
    G: Fn(EntityHandle) -> bool,
{
    candidates
        .into_iter()
        .filter(|(handle, _)| is_governed(*handle))
        .filter(|(_, vehicle)| vehicle.dimension == player.dimension)
        .map(|(handle, vehicle)| (handle, vehicle.position.distance(player.position)))
        .filter(|(_, distance)| *distance < max_radius)
        .fold(None, |best: Option<(EntityHandle, f32)>, (handle, distance)| match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((handle, distance)),
        })
        .map(|(handle, _)| handle)
}

/// [`nearest`] over every live vehicle, counting only bound ones.
pub fn nearest_bound(
    world: &World,
    binder: &EntityBinder,
    player: &PlayerState,
    max_radius: f32,
) -> Option<EntityHandle> {
    nearest(player, world.vehicles(), |h| binder.is_bound(h), max_radius)
}

/// Whether two points are within `radius` of each other (inclusive).
pub fn within(a: Vec3, b: Vec3, radius: f32) -> bool {
    a.distance(b) <= radius
}
