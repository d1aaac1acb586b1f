use serde_json::Value;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{
	Result,
	models::{DocumentCollectionRow, DocumentRow, MessageRow, SessionRow, SummaryRow, UserRow},
};

pub async fn insert_session<'e, E>(
	executor: E,
	uuid: Uuid,
	session_id: &str,
	user_id: Option<&str>,
	metadata: &Value,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO sessions (uuid, session_id, user_id, metadata)
VALUES ($1, $2, $3, $4)",
	)
	.bind(uuid)
	.bind(session_id)
	.bind(user_id)
	.bind(metadata)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn ensure_session<'e, E>(executor: E, uuid: Uuid, session_id: &str) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO sessions (uuid, session_id)
VALUES ($1, $2)
ON CONFLICT (session_id) DO NOTHING",
	)
	.bind(uuid)
	.bind(session_id)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_session<'e, E>(executor: E, session_id: &str) -> Result<Option<SessionRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as(
		"\
SELECT * FROM sessions
WHERE session_id = $1 AND deleted_at IS NULL
LIMIT 1",
	)
	.bind(session_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn insert_user<'e, E>(
	executor: E,
	uuid: Uuid,
	user_id: &str,
	email: Option<&str>,
	first_name: Option<&str>,
	last_name: Option<&str>,
	metadata: &Value,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO users (uuid, user_id, email, first_name, last_name, metadata)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(uuid)
	.bind(user_id)
	.bind(email)
	.bind(first_name)
	.bind(last_name)
	.bind(metadata)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_user<'e, E>(executor: E, user_id: &str) -> Result<Option<UserRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as(
		"\
SELECT * FROM users
WHERE user_id = $1 AND deleted_at IS NULL
LIMIT 1",
	)
	.bind(user_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn insert_message<'e, E>(
	executor: E,
	uuid: Uuid,
	session_id: &str,
	role: &str,
	content: &str,
	token_count: i32,
	metadata: &Value,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO messages (uuid, session_id, role, content, token_count, metadata)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(uuid)
	.bind(session_id)
	.bind(role)
	.bind(content)
	.bind(token_count)
	.bind(metadata)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_message<'e, E>(
	executor: E,
	session_id: &str,
	message_uuid: Uuid,
) -> Result<Option<MessageRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as(
		"\
SELECT * FROM messages
WHERE session_id = $1 AND uuid = $2 AND deleted_at IS NULL
LIMIT 1",
	)
	.bind(session_id)
	.bind(message_uuid)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn upsert_message_embedding<'e, E>(
	executor: E,
	message_uuid: Uuid,
	embedding: &str,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO message_embeddings (message_uuid, embedding)
VALUES ($1, $2::text::vector)
ON CONFLICT (message_uuid) DO UPDATE
SET
\tembedding = EXCLUDED.embedding,
\tcreated_at = now()",
	)
	.bind(message_uuid)
	.bind(embedding)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn insert_summary<'e, E>(
	executor: E,
	uuid: Uuid,
	session_id: &str,
	content: &str,
	metadata: &Value,
	summary_point_uuid: Option<Uuid>,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO summaries (uuid, session_id, content, metadata, summary_point_uuid)
VALUES ($1, $2, $3, $4, $5)",
	)
	.bind(uuid)
	.bind(session_id)
	.bind(content)
	.bind(metadata)
	.bind(summary_point_uuid)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn latest_summary<'e, E>(executor: E, session_id: &str) -> Result<Option<SummaryRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as(
		"\
SELECT * FROM summaries
WHERE session_id = $1 AND deleted_at IS NULL
ORDER BY id DESC
LIMIT 1",
	)
	.bind(session_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn insert_collection<'e, E>(
	executor: E,
	uuid: Uuid,
	name: &str,
	metadata: &Value,
	embedding_dim: i32,
	is_indexed: bool,
	probe_count: i32,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO document_collections (uuid, name, metadata, embedding_dim, is_indexed, probe_count)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(uuid)
	.bind(name)
	.bind(metadata)
	.bind(embedding_dim)
	.bind(is_indexed)
	.bind(probe_count)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_collection<'e, E>(executor: E, name: &str) -> Result<Option<DocumentCollectionRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as(
		"\
SELECT * FROM document_collections
WHERE name = $1
LIMIT 1",
	)
	.bind(name)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn insert_document<'e, E>(
	executor: E,
	uuid: Uuid,
	collection_id: i64,
	document_id: Option<&str>,
	content: &str,
	metadata: &Value,
	embedding: Option<&str>,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO documents (uuid, collection_id, document_id, content, metadata, embedding)
VALUES ($1, $2, $3, $4, $5, $6::text::vector)",
	)
	.bind(uuid)
	.bind(collection_id)
	.bind(document_id)
	.bind(content)
	.bind(metadata)
	.bind(embedding)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn update_document_embedding<'e, E>(
	executor: E,
	document_uuid: Uuid,
	embedding: &str,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
UPDATE documents
SET embedding = $1::text::vector, updated_at = now()
WHERE uuid = $2",
	)
	.bind(embedding)
	.bind(document_uuid)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn documents_missing_embeddings<'e, E>(
	executor: E,
	collection_id: i64,
	limit: i64,
) -> Result<Vec<DocumentRow>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as(
		"\
SELECT id, uuid, collection_id, document_id, content, metadata, created_at, updated_at, deleted_at
FROM documents
WHERE collection_id = $1 AND embedding IS NULL AND deleted_at IS NULL
ORDER BY id
LIMIT $2",
	)
	.bind(collection_id)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn mark_collection_indexed<'e, E>(
	executor: E,
	collection_id: i64,
	probe_count: i32,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
UPDATE document_collections
SET is_indexed = TRUE, probe_count = $1, updated_at = now()
WHERE id = $2",
	)
	.bind(probe_count)
	.bind(collection_id)
	.execute(executor)
	.await?;

	Ok(())
}
