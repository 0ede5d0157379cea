//! Simulated user pool.

use crate::error::GeneratorError;
use flux_core::User;
use rand::seq::IndexedRandom;
use rand::Rng;

/// Most devices a single user can own.
pub const MAX_DEVICES_PER_USER: usize = 3;

/// Build `count` users spread uniformly over `regions`.
///
/// User ids are `u` followed by the zero-padded index (`u000000`, `u000001`,
/// ...). Each user gets between one and [`MAX_DEVICES_PER_USER`] devices
/// named `d` plus six hex digits.
pub fn generate_user_pool<R: Rng>(
    count: usize,
    regions: &[String],
    rng: &mut R,
) -> Result<Vec<User>, GeneratorError> {
    let mut pool = Vec::with_capacity(count);
    for index in 0..count {
        let region = regions.choose(rng).ok_or(GeneratorError::NoRegions)?;
        let devices = rng.random_range(1..=MAX_DEVICES_PER_USER);
        let device_ids = (0..devices).map(|_| device_id(rng)).collect();
        pool.push(User::new(format!("u{index:06}"), region.clone(), device_ids));
    }
    Ok(pool)
}

fn device_id<R: Rng>(rng: &mut R) -> String {
    format!("d{:06x}", rng.random_range(0..0x100_0000u32))
}

/// Pick one of the user's devices.
pub fn pick_device<'a, R: Rng>(user: &'a User, rng: &mut R) -> Result<&'a str, GeneratorError> {
    user.device_ids
        .choose(rng)
        .map(String::as_str)
        .ok_or_else(|| GeneratorError::NoDevices(user.user_id.clone()))
}
