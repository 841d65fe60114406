//! Number plates.

use crate::error::AppResult;
use crate::store::VehicleStore;
use rand::Rng;
use tracing::warn;

const PLATE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const PLATE_LEN: usize = 6;

pub fn random_plate<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..PLATE_LEN)
        .map(|_| PLATE_CHARSET[rng.random_range(0..PLATE_CHARSET.len())] as char)
        .collect()
}

/// Draw plates until one is unused, up to `attempts` draws. When every draw
/// collides the last one is used anyway; plates are cosmetic.
pub async fn unique_plate(store: &dyn VehicleStore, attempts: u32) -> AppResult<String> {
    let attempts = attempts.max(1);
    let mut plate = random_plate(&mut rand::rng());
    for _ in 1..attempts {
        if !store.plate_exists(&plate).await? {
            return Ok(plate);
        }
        plate = random_plate(&mut rand::rng());
    }
    if store.plate_exists(&plate).await? {
        warn!(plate = %plate, attempts, "No unused plate found, accepting a duplicate");
    }
    Ok(plate)
}

pub fn is_valid_plate(plate: &str) -> bool {
    plate.len() == PLATE_LEN && plate.bytes().all(|b| PLATE_CHARSET.contains(&b))
}
