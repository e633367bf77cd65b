//! Per-attempt room and participant identifiers

use std::sync::atomic::{AtomicI64, Ordering};

use rand::Rng;

use crate::config::IdentityConfig;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const PARTICIPANT_SUFFIX_LEN: usize = 9;

/// Last timestamp handed out, so two attempts in the same millisecond still differ
static LAST_ROOM_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Identifiers generated for one call attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptIdentity {
    /// `<room prefix><unix millis>`
    pub room: String,
    /// `<participant prefix><9 base36 chars>`
    pub participant: String,
}

impl AttemptIdentity {
    pub fn generate(config: &IdentityConfig) -> Self {
        Self {
            room: format!("{}{}", config.room_prefix, next_room_millis()),
            participant: format!("{}{}", config.participant_prefix, random_base36(PARTICIPANT_SUFFIX_LEN)),
        }
    }
}

fn next_room_millis() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_ROOM_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_ROOM_MILLIS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}
