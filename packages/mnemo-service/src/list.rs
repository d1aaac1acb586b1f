use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use mnemo_storage::{
	models::{MessageRow, SessionRow, SummaryRow, UserRow},
	queries,
};

use crate::{Error, MnemoService, Result};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListMessagesRequest {
	pub session_id: String,
	pub page_number: Option<u32>,
	pub page_size: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageItem {
	pub uuid: Uuid,
	pub role: String,
	pub content: String,
	pub token_count: i32,
	pub metadata: Value,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListMessagesResponse {
	pub messages: Vec<MessageItem>,
	pub total_count: i64,
	pub row_count: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListSummariesRequest {
	pub session_id: String,
	pub page_number: Option<u32>,
	pub page_size: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SummaryItem {
	pub uuid: Uuid,
	pub content: String,
	pub metadata: Value,
	pub summary_point_uuid: Option<Uuid>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListSummariesResponse {
	pub summaries: Vec<SummaryItem>,
	pub total_count: i64,
	pub row_count: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListUsersRequest {
	pub cursor: Option<i64>,
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserItem {
	pub id: i64,
	pub uuid: Uuid,
	pub user_id: String,
	pub email: Option<String>,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub metadata: Value,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListUsersResponse {
	pub users: Vec<UserItem>,
}

#[derive(Debug, sqlx::FromRow)]
struct PagedMessageRow {
	uuid: Uuid,
	role: String,
	content: String,
	token_count: i32,
	metadata: Value,
	created_at: OffsetDateTime,
	total_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PagedSummaryRow {
	uuid: Uuid,
	content: String,
	metadata: Value,
	summary_point_uuid: Option<Uuid>,
	created_at: OffsetDateTime,
	total_count: i64,
}

const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_CURSOR_LIMIT: u32 = 100;

impl MnemoService {
	pub async fn list_messages(&self, req: ListMessagesRequest) -> Result<ListMessagesResponse> {
		let (limit, offset) = page_bounds(req.page_number, req.page_size)?;

		debug!(session_id = %req.session_id, limit, offset, "Listing messages.");

		// The window count keeps the page and the total in one snapshot.
		let rows: Vec<PagedMessageRow> = sqlx::query_as(
			"\
SELECT uuid, role, content, token_count, metadata, created_at, COUNT(*) OVER () AS total_count
FROM messages
WHERE session_id = $1 AND deleted_at IS NULL
ORDER BY id
LIMIT $2 OFFSET $3",
		)
		.bind(&req.session_id)
		.bind(limit)
		.bind(offset)
		.fetch_all(&self.db.pool)
		.await?;
		// The window count vanishes with an empty page; an out-of-range page
		// still has to report the true total.
		let total_count = match rows.first() {
			Some(row) => row.total_count,
			None => self.count_rows("messages", &req.session_id).await?,
		};
		let messages = rows
			.into_iter()
			.map(|row| MessageItem {
				uuid: row.uuid,
				role: row.role,
				content: row.content,
				token_count: row.token_count,
				metadata: row.metadata,
				created_at: row.created_at,
			})
			.collect::<Vec<_>>();
		let row_count = messages.len();

		Ok(ListMessagesResponse { messages, total_count, row_count })
	}

	pub async fn list_summaries(&self, req: ListSummariesRequest) -> Result<ListSummariesResponse> {
		let (limit, offset) = page_bounds(req.page_number, req.page_size)?;

		debug!(session_id = %req.session_id, limit, offset, "Listing summaries.");

		let rows: Vec<PagedSummaryRow> = sqlx::query_as(
			"\
SELECT uuid, content, metadata, summary_point_uuid, created_at, COUNT(*) OVER () AS total_count
FROM summaries
WHERE session_id = $1 AND deleted_at IS NULL
ORDER BY id
LIMIT $2 OFFSET $3",
		)
		.bind(&req.session_id)
		.bind(limit)
		.bind(offset)
		.fetch_all(&self.db.pool)
		.await?;
		let total_count = match rows.first() {
			Some(row) => row.total_count,
			None => self.count_rows("summaries", &req.session_id).await?,
		};
		let summaries = rows
			.into_iter()
			.map(|row| SummaryItem {
				uuid: row.uuid,
				content: row.content,
				metadata: row.metadata,
				summary_point_uuid: row.summary_point_uuid,
				created_at: row.created_at,
			})
			.collect::<Vec<_>>();
		let row_count = summaries.len();

		Ok(ListSummariesResponse { summaries, total_count, row_count })
	}

	pub async fn list_users(&self, req: ListUsersRequest) -> Result<ListUsersResponse> {
		let cursor = req.cursor.unwrap_or(0);
		let limit = i64::from(req.limit.unwrap_or(DEFAULT_CURSOR_LIMIT).max(1));

		debug!(cursor, limit, "Listing users.");

		let rows: Vec<UserRow> = sqlx::query_as(
			"\
SELECT * FROM users
WHERE id > $1 AND deleted_at IS NULL
ORDER BY id
LIMIT $2",
		)
		.bind(cursor)
		.bind(limit)
		.fetch_all(&self.db.pool)
		.await?;
		let users = rows
			.into_iter()
			.map(|row| UserItem {
				id: row.id,
				uuid: row.uuid,
				user_id: row.user_id,
				email: row.email,
				first_name: row.first_name,
				last_name: row.last_name,
				metadata: row.metadata,
				created_at: row.created_at,
			})
			.collect();

		Ok(ListUsersResponse { users })
	}

	async fn count_rows(&self, table: &str, session_id: &str) -> Result<i64> {
		// `table` is one of the fixed names above, never caller input.
		let count: i64 = sqlx::query_scalar(&format!(
			"SELECT COUNT(*) FROM {table} WHERE session_id = $1 AND deleted_at IS NULL"
		))
		.bind(session_id)
		.fetch_one(&self.db.pool)
		.await?;

		Ok(count)
	}

	pub async fn get_session(&self, session_id: &str) -> Result<SessionRow> {
		queries::get_session(&self.db.pool, session_id).await?.ok_or_else(|| Error::NotFound {
			message: format!("No such session {session_id:?}."),
		})
	}

	pub async fn get_user(&self, user_id: &str) -> Result<UserRow> {
		queries::get_user(&self.db.pool, user_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("No such user {user_id:?}.") })
	}

	pub async fn sessions_for_user(&self, user_id: &str) -> Result<Vec<SessionRow>> {
		let rows: Vec<SessionRow> = sqlx::query_as(
			"\
SELECT * FROM sessions
WHERE user_id = $1 AND deleted_at IS NULL
ORDER BY id",
		)
		.bind(user_id)
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows)
	}

	pub async fn get_message(&self, session_id: &str, message_uuid: Uuid) -> Result<MessageRow> {
		queries::get_message(&self.db.pool, session_id, message_uuid).await?.ok_or_else(|| {
			Error::NotFound {
				message: format!("No such message {message_uuid} in session {session_id:?}."),
			}
		})
	}

	pub async fn latest_summary(&self, session_id: &str) -> Result<Option<SummaryRow>> {
		Ok(queries::latest_summary(&self.db.pool, session_id).await?)
	}
}

fn page_bounds(page_number: Option<u32>, page_size: Option<u32>) -> Result<(i64, i64)> {
	let page_number = page_number.unwrap_or(1);
	let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);

	if page_number == 0 || page_size == 0 {
		return Err(Error::InvalidRequest {
			message: "page_number and page_size must be at least 1.".to_string(),
		});
	}

	let limit = i64::from(page_size);
	let offset = i64::from(page_number - 1) * limit;

	Ok((limit, offset))
}
