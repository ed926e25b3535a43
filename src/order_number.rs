use rand::Rng;
use tracing::warn;

use crate::store::Store;

pub const FALLBACK_RANGE: std::ops::Range<i64> = 100_000..1_000_000;

/// Number following the current maximum.
pub fn next_after(max: Option<i64>) -> i64 {
    max.unwrap_or(0) + 1
}

/// Random six-digit number used when the counter cannot be read.
pub fn fallback_order_number() -> i64 {
    rand::thread_rng().gen_range(FALLBACK_RANGE)
}

/// Allocates an order number from the store, falling back to a random one on failure.
///
/// The fallback can collide with an existing number; the unique constraint on the column turns
/// that into an insert error the customer can retry.
pub async fn allocate(store: &dyn Store) -> i64 {
    match store.next_order_number().await {
        Ok(number) => number,
        Err(err) => {
            let fallback = fallback_order_number();
            warn!(fallback, "Failed to allocate order number: {:#}", anyhow::Error::new(err));
            fallback
        }
    }
}
