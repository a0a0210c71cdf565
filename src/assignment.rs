//! Deterministic subject-to-bucket assignment.
//!
//! The hash algorithm here is part of the external contract, not an
//! implementation detail: other language runtimes compute the same buckets
//! for the same inputs, so assignments survive process restarts and
//! cross-service handoffs. Do not change the constants.

use crate::{Error, Result};

/// Number of buckets subjects are partitioned into.
pub const BUCKET_COUNT: i64 = 100;

/// Map a `(subject_id, salt)` pair to a stable bucket in `[0, 99]`.
///
/// The salt is typically an experiment key or feature key, so one subject
/// lands in independent buckets across experiments. The hash is a 32-bit
/// polynomial rolling hash over the UTF-16 code units of `subject_id`
/// followed by `salt` (`h = h*31 + code`, wrapping), matching `charCodeAt`
/// semantics in JavaScript implementations of the same contract. The
/// absolute value is taken in 64-bit arithmetic so `i32::MIN` folds the
/// same way `Math.abs` does.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `subject_id` or `salt` is empty; an
/// empty subject identifier is a caller bug, not a degenerate bucket.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn bucket(subject_id: &str, salt: &str) -> Result<u8> {
    if subject_id.is_empty() {
        return Err(Error::validation("subject_id must be non-empty"));
    }
    if salt.is_empty() {
        return Err(Error::validation("salt must be non-empty"));
    }

    let mut h: i32 = 0;
    for unit in subject_id.encode_utf16().chain(salt.encode_utf16()) {
        h = h.wrapping_mul(31).wrapping_add(i32::from(unit));
    }

    Ok((i64::from(h).abs() % BUCKET_COUNT) as u8)
}
