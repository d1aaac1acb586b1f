use sqlx::{Postgres, Transaction};

use crate::Result;

/// Derives a stable advisory lock key from an entity key.
///
/// The key space is the first eight bytes of the BLAKE3 digest, so distinct
/// entities contend only on hash collision.
pub fn advisory_lock_key(entity_key: &str) -> i64 {
	let hash = blake3::hash(entity_key.as_bytes());
	let mut bytes = [0_u8; 8];

	bytes.copy_from_slice(&hash.as_bytes()[..8]);

	i64::from_be_bytes(bytes)
}

/// Takes a transaction-scoped advisory lock.
///
/// The lock is released by Postgres when the transaction commits or rolls
/// back, so every exit path releases it.
pub async fn advisory_xact_lock(tx: &mut Transaction<'_, Postgres>, key: i64) -> Result<()> {
	sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(key).execute(&mut **tx).await?;

	Ok(())
}
