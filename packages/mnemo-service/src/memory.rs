use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use mnemo_storage::queries;

use crate::{Error, MnemoService, Result, vector_to_pg};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
	pub role: String,
	pub content: String,
	#[serde(default)]
	pub token_count: i32,
	#[serde(default)]
	pub metadata: Option<Value>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AddMessagesRequest {
	pub session_id: String,
	pub messages: Vec<Message>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AddMessagesResponse {
	pub message_uuids: Vec<Uuid>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AddUserRequest {
	pub user_id: String,
	pub email: Option<String>,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	#[serde(default)]
	pub metadata: Option<Value>,
}

impl MnemoService {
	pub async fn add_session(
		&self,
		session_id: &str,
		user_id: Option<&str>,
		metadata: Option<Value>,
	) -> Result<Uuid> {
		let session_id = session_id.trim();

		if session_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "session_id must not be empty.".to_string(),
			});
		}

		let uuid = Uuid::new_v4();
		let metadata = normalize_metadata(metadata)?;

		queries::insert_session(&self.db.pool, uuid, session_id, user_id, &metadata).await?;

		Ok(uuid)
	}

	pub async fn add_user(&self, req: AddUserRequest) -> Result<Uuid> {
		let user_id = req.user_id.trim();

		if user_id.is_empty() {
			return Err(Error::InvalidRequest { message: "user_id must not be empty.".to_string() });
		}

		let uuid = Uuid::new_v4();
		let metadata = normalize_metadata(req.metadata)?;

		queries::insert_user(
			&self.db.pool,
			uuid,
			user_id,
			req.email.as_deref(),
			req.first_name.as_deref(),
			req.last_name.as_deref(),
			&metadata,
		)
		.await?;

		Ok(uuid)
	}

	/// Stores conversation messages, creating the session row on first use.
	/// Embeddings are written separately by [`Self::embed_messages`].
	pub async fn add_messages(&self, req: AddMessagesRequest) -> Result<AddMessagesResponse> {
		let session_id = req.session_id.trim();

		if session_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "session_id must not be empty.".to_string(),
			});
		}
		if req.messages.is_empty() {
			return Err(Error::InvalidRequest {
				message: "At least one message is required.".to_string(),
			});
		}

		debug!(session_id, count = req.messages.len(), "Adding messages.");
		queries::ensure_session(&self.db.pool, Uuid::new_v4(), session_id).await?;

		let mut tx = self.db.pool.begin().await?;
		let mut message_uuids = Vec::with_capacity(req.messages.len());

		for message in &req.messages {
			let uuid = Uuid::new_v4();
			let metadata = normalize_metadata(message.metadata.clone())?;

			queries::insert_message(
				&mut *tx,
				uuid,
				session_id,
				&message.role,
				&message.content,
				message.token_count,
				&metadata,
			)
			.await?;
			message_uuids.push(uuid);
		}

		tx.commit().await?;

		Ok(AddMessagesResponse { message_uuids })
	}

	/// Embeds the given messages and upserts their vectors. Existing vectors
	/// are overwritten.
	pub async fn embed_messages(&self, session_id: &str, message_uuids: &[Uuid]) -> Result<usize> {
		if message_uuids.is_empty() {
			return Ok(0);
		}

		let mut uuids = Vec::with_capacity(message_uuids.len());
		let mut texts = Vec::with_capacity(message_uuids.len());

		for &uuid in message_uuids {
			let row = queries::get_message(&self.db.pool, session_id, uuid).await?.ok_or_else(
				|| Error::NotFound {
					message: format!("No such message {uuid} in session {session_id:?}."),
				},
			)?;

			uuids.push(row.uuid);
			texts.push(row.content);
		}

		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;

		if vectors.len() != uuids.len() {
			return Err(Error::Provider {
				message: "Embedding provider returned the wrong number of vectors.".to_string(),
			});
		}

		for (uuid, vector) in uuids.iter().zip(&vectors) {
			queries::upsert_message_embedding(&self.db.pool, *uuid, &vector_to_pg(vector)).await?;
		}

		Ok(uuids.len())
	}
}

pub(crate) fn normalize_metadata(metadata: Option<Value>) -> Result<Value> {
	match metadata {
		None | Some(Value::Null) => Ok(Value::Object(Default::default())),
		Some(value @ Value::Object(_)) => Ok(value),
		Some(_) => Err(Error::InvalidRequest {
			message: "Metadata must be a JSON object.".to_string(),
		}),
	}
}
