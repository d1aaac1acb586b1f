use serde_json::Value;
use sqlx::{Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use mnemo_domain::merge::merge_metadata;
use mnemo_storage::lock::{advisory_lock_key, advisory_xact_lock};

use crate::{Error, MnemoService, Result};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UpdateMetadataRequest {
	pub metadata: Value,
	#[serde(default)]
	pub privileged: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UpdateMetadataResponse {
	pub metadata: Value,
}

enum MergeTarget<'a> {
	Message { session_id: &'a str, message_uuid: Uuid },
	Session { session_id: &'a str },
	User { user_id: &'a str },
}
impl MergeTarget<'_> {
	fn lock_entity(&self) -> String {
		match self {
			Self::Message { session_id, message_uuid } =>
				format!("message:{session_id}:{message_uuid}"),
			Self::Session { session_id } => format!("session:{session_id}"),
			Self::User { user_id } => format!("user:{user_id}"),
		}
	}

	fn describe(&self) -> String {
		match self {
			Self::Message { session_id, message_uuid } =>
				format!("message {message_uuid} in session {session_id:?}"),
			Self::Session { session_id } => format!("session {session_id:?}"),
			Self::User { user_id } => format!("user {user_id:?}"),
		}
	}

	async fn read(&self, tx: &mut Transaction<'_, Postgres>) -> Result<Option<Value>> {
		let metadata: Option<Value> = match self {
			Self::Message { session_id, message_uuid } => sqlx::query_scalar(
				"\
SELECT metadata FROM messages
WHERE session_id = $1 AND uuid = $2 AND deleted_at IS NULL",
			)
			.bind(*session_id)
			.bind(*message_uuid)
			.fetch_optional(&mut **tx)
			.await?,
			Self::Session { session_id } => sqlx::query_scalar(
				"\
SELECT metadata FROM sessions
WHERE session_id = $1 AND deleted_at IS NULL",
			)
			.bind(*session_id)
			.fetch_optional(&mut **tx)
			.await?,
			Self::User { user_id } => sqlx::query_scalar(
				"\
SELECT metadata FROM users
WHERE user_id = $1 AND deleted_at IS NULL",
			)
			.bind(*user_id)
			.fetch_optional(&mut **tx)
			.await?,
		};

		Ok(metadata)
	}

	async fn write(&self, tx: &mut Transaction<'_, Postgres>, metadata: &Value) -> Result<u64> {
		let result = match self {
			Self::Message { session_id, message_uuid } => sqlx::query(
				"\
UPDATE messages
SET metadata = $1, updated_at = now()
WHERE session_id = $2 AND uuid = $3 AND deleted_at IS NULL",
			)
			.bind(metadata)
			.bind(*session_id)
			.bind(*message_uuid)
			.execute(&mut **tx)
			.await?,
			Self::Session { session_id } => sqlx::query(
				"\
UPDATE sessions
SET metadata = $1, updated_at = now()
WHERE session_id = $2 AND deleted_at IS NULL",
			)
			.bind(metadata)
			.bind(*session_id)
			.execute(&mut **tx)
			.await?,
			Self::User { user_id } => sqlx::query(
				"\
UPDATE users
SET metadata = $1, updated_at = now()
WHERE user_id = $2 AND deleted_at IS NULL",
			)
			.bind(metadata)
			.bind(*user_id)
			.execute(&mut **tx)
			.await?,
		};

		Ok(result.rows_affected())
	}
}

impl MnemoService {
	pub async fn update_message_metadata(
		&self,
		session_id: &str,
		message_uuid: Uuid,
		req: UpdateMetadataRequest,
	) -> Result<UpdateMetadataResponse> {
		self.merge_and_write(MergeTarget::Message { session_id, message_uuid }, req).await
	}

	pub async fn update_session(
		&self,
		session_id: &str,
		req: UpdateMetadataRequest,
	) -> Result<UpdateMetadataResponse> {
		self.merge_and_write(MergeTarget::Session { session_id }, req).await
	}

	pub async fn update_user(
		&self,
		user_id: &str,
		req: UpdateMetadataRequest,
	) -> Result<UpdateMetadataResponse> {
		self.merge_and_write(MergeTarget::User { user_id }, req).await
	}

	async fn merge_and_write(
		&self,
		target: MergeTarget<'_>,
		req: UpdateMetadataRequest,
	) -> Result<UpdateMetadataResponse> {
		if !matches!(req.metadata, Value::Object(_)) {
			return Err(Error::InvalidRequest {
				message: "Metadata update must be a JSON object.".to_string(),
			});
		}

		debug!(entity = %target.lock_entity(), "Merging metadata.");

		let mut tx = self.db.pool.begin().await?;

		if req.metadata.as_object().is_some_and(|update| update.is_empty()) {
			// Nothing to merge, so the row is touched without taking the lock.
			let Some(current) = target.read(&mut tx).await? else {
				return Err(Error::NotFound {
					message: format!("No such {}.", target.describe()),
				});
			};

			target.write(&mut tx, &current).await?;
			tx.commit().await?;

			return Ok(UpdateMetadataResponse { metadata: current });
		}

		// The lock is transaction scoped. Any exit path, including connection
		// teardown on cancellation, releases it.
		advisory_xact_lock(&mut tx, advisory_lock_key(&target.lock_entity())).await?;

		let Some(current) = target.read(&mut tx).await? else {
			return Err(Error::NotFound { message: format!("No such {}.", target.describe()) });
		};
		let merged = merge_metadata(&current, &req.metadata, req.privileged);
		let updated = target.write(&mut tx, &merged).await?;

		if updated == 0 {
			return Err(Error::NotFound { message: format!("No such {}.", target.describe()) });
		}

		tx.commit().await?;

		Ok(UpdateMetadataResponse { metadata: merged })
	}
}
