use rand::Rng;
use ulid::Ulid;

use crate::limits::SHORT_CODE_MAX_ATTEMPTS;

use super::{Engine, EngineError};

/// Uppercase letters and digits minus the look-alikes `0 O 1 I L`.
pub const SHORT_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Draw codes of `len` characters until `try_claim` accepts one.
///
/// `try_claim` must atomically reserve the code and return `false` if it is
/// already taken. Fails with `ShortCodeExhausted` after `attempts` collisions.
pub fn generate_short_code<R: Rng>(
    rng: &mut R,
    len: usize,
    attempts: u32,
    mut try_claim: impl FnMut(&str) -> bool,
) -> Result<String, EngineError> {
    for _ in 0..attempts {
        let code: String = (0..len)
            .map(|_| SHORT_CODE_ALPHABET[rng.gen_range(0..SHORT_CODE_ALPHABET.len())] as char)
            .collect();
        if try_claim(&code) {
            return Ok(code);
        }
    }
    Err(EngineError::ShortCodeExhausted(attempts))
}

impl Engine {
    /// Reserve a fresh short code for `booking_id` in the active-code index.
    /// `persist_and_apply` releases it again if the booking never reaches the log.
    pub(super) fn reserve_short_code(&self, booking_id: Ulid) -> Result<String, EngineError> {
        let mut rng = rand::thread_rng();
        generate_short_code(&mut rng, self.short_code_len, SHORT_CODE_MAX_ATTEMPTS, |code| {
            match self.short_codes.entry(code.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(_) => false,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(booking_id);
                    true
                }
            }
        })
    }
}
