use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct SessionRow {
	pub id: i64,
	pub uuid: Uuid,
	pub session_id: String,
	pub user_id: Option<String>,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRow {
	pub id: i64,
	pub uuid: Uuid,
	pub session_id: String,
	pub role: String,
	pub content: String,
	pub token_count: i32,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SummaryRow {
	pub id: i64,
	pub uuid: Uuid,
	pub session_id: String,
	pub content: String,
	pub metadata: Value,
	pub summary_point_uuid: Option<Uuid>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
	pub id: i64,
	pub uuid: Uuid,
	pub user_id: String,
	pub email: Option<String>,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DocumentCollectionRow {
	pub id: i64,
	pub uuid: Uuid,
	pub name: String,
	pub metadata: Value,
	pub embedding_dim: i32,
	pub is_indexed: bool,
	pub probe_count: i32,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DocumentRow {
	pub id: i64,
	pub uuid: Uuid,
	pub collection_id: i64,
	pub document_id: Option<String>,
	pub content: String,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub deleted_at: Option<OffsetDateTime>,
}
