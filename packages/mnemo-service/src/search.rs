use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use time::{
	Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};
use tracing::{debug, warn};
use uuid::Uuid;

use mnemo_domain::{MetadataFilter, Predicate, Similarity, mmr};
use mnemo_storage::{predicate::push_predicate, queries};

use crate::{Error, MnemoService, Result, parse_pg_vector, vector_to_pg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
	Similarity,
	Mmr,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub text: Option<String>,
	pub metadata: Option<Value>,
	pub limit: Option<u32>,
	pub search_type: Option<SearchType>,
	pub mmr_lambda: Option<f32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
	pub uuid: Uuid,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub document_id: Option<String>,
	pub content: String,
	pub metadata: Value,
	pub distance: Option<f32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
	pub results: Vec<SearchResult>,
}

#[derive(Debug, sqlx::FromRow)]
struct MessageCandidate {
	uuid: Uuid,
	created_at: OffsetDateTime,
	role: String,
	content: String,
	metadata: Value,
	embedding: Option<String>,
	distance: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentCandidate {
	uuid: Uuid,
	created_at: OffsetDateTime,
	document_id: Option<String>,
	content: String,
	metadata: Value,
	embedding: Option<String>,
	distance: Option<f64>,
}

struct Candidate {
	result: SearchResult,
	embedding: Option<Vec<f32>>,
}

struct SearchPlan {
	predicate: Predicate,
	date_range: (Option<OffsetDateTime>, Option<OffsetDateTime>),
	metadata_filter: bool,
	query_vector: Option<Vec<f32>>,
	limit: i64,
	fetch_limit: i64,
	mmr: bool,
	mmr_lambda: f32,
}

impl MnemoService {
	pub async fn search_messages(
		&self,
		session_id: &str,
		req: SearchRequest,
	) -> Result<SearchResponse> {
		debug!(session_id, "Searching messages.");

		let plan =
			self.plan_search(&req, self.cfg.memory.message_search_limit).await?;
		let mut builder = QueryBuilder::new(
			"\
SELECT m.uuid, m.created_at, m.role, m.content, m.metadata, e.embedding::text AS embedding, ",
		);

		push_distance(&mut builder, "e.embedding", "<#>", plan.query_vector.as_deref());
		builder.push(
			"\
 AS distance
FROM messages m
LEFT JOIN message_embeddings e ON e.message_uuid = m.uuid
WHERE m.session_id = ",
		);
		builder.push_bind(session_id.to_owned());
		builder.push(" AND m.deleted_at IS NULL AND ");
		push_predicate(&mut builder, "m.metadata", &plan.predicate);
		push_date_range(&mut builder, "m.created_at", &plan.date_range);

		if plan.query_vector.is_some() {
			builder.push(" ORDER BY distance ASC NULLS LAST, m.id ASC");
		} else {
			builder.push(" ORDER BY m.created_at DESC");
		}

		builder.push(" LIMIT ");
		builder.push_bind(plan.fetch_limit);

		let rows: Vec<MessageCandidate> =
			builder.build_query_as().fetch_all(&self.db.pool).await?;
		let candidates = rows
			.into_iter()
			.map(|row| {
				Ok(Candidate {
					embedding: row.embedding.as_deref().map(parse_pg_vector).transpose()?,
					result: SearchResult {
						uuid: row.uuid,
						created_at: row.created_at,
						role: Some(row.role),
						document_id: None,
						content: row.content,
						metadata: row.metadata,
						distance: row.distance.map(|d| d as f32),
					},
				})
			})
			.collect::<Result<Vec<_>>>()?;

		finish_search(plan, candidates, Similarity::Dot)
	}

	pub async fn search_documents(
		&self,
		collection_name: &str,
		req: SearchRequest,
	) -> Result<SearchResponse> {
		debug!(collection_name, "Searching documents.");

		// Validation and planning run before the store is touched.
		let plan =
			self.plan_search(&req, self.cfg.memory.document_search_limit).await?;
		let collection = queries::get_collection(&self.db.pool, collection_name)
			.await?
			.ok_or_else(|| Error::NotFound {
				message: format!("Unknown collection {collection_name:?}."),
			})?;
		let mut builder = QueryBuilder::new(
			"\
SELECT d.uuid, d.created_at, d.document_id, d.content, d.metadata, d.embedding::text AS embedding, ",
		);

		push_distance(&mut builder, "d.embedding", "<=>", plan.query_vector.as_deref());
		builder.push(
			"\
 AS distance
FROM documents d
WHERE d.collection_id = ",
		);
		builder.push_bind(collection.id);
		builder.push(" AND d.deleted_at IS NULL AND ");
		push_predicate(&mut builder, "d.metadata", &plan.predicate);
		push_date_range(&mut builder, "d.created_at", &plan.date_range);

		if plan.query_vector.is_some() {
			builder.push(" ORDER BY distance ASC NULLS LAST, d.id ASC");
		} else {
			builder.push(" ORDER BY d.created_at DESC");
		}

		builder.push(" LIMIT ");
		builder.push_bind(plan.fetch_limit);

		// Indexed collections tune the probe count for the statement's scope only.
		let rows: Vec<DocumentCandidate> = if collection.is_indexed {
			let mut tx = self.db.pool.begin().await?;

			sqlx::query(&format!("SET LOCAL ivfflat.probes = {}", collection.probe_count))
				.execute(&mut *tx)
				.await?;

			let rows = builder.build_query_as().fetch_all(&mut *tx).await?;

			tx.commit().await?;

			rows
		} else {
			builder.build_query_as().fetch_all(&self.db.pool).await?
		};
		let candidates = rows
			.into_iter()
			.map(|row| {
				Ok(Candidate {
					embedding: row.embedding.as_deref().map(parse_pg_vector).transpose()?,
					result: SearchResult {
						uuid: row.uuid,
						created_at: row.created_at,
						role: None,
						document_id: row.document_id,
						content: row.content,
						metadata: row.metadata,
						distance: row.distance.map(|d| d as f32),
					},
				})
			})
			.collect::<Result<Vec<_>>>()?;

		finish_search(plan, candidates, Similarity::Cosine)
	}

	async fn plan_search(&self, req: &SearchRequest, default_limit: u32) -> Result<SearchPlan> {
		let text = req.text.as_deref().map(str::trim).filter(|text| !text.is_empty());
		let metadata = req.metadata.as_ref().filter(|metadata| !is_empty_metadata(metadata));

		if text.is_none() && metadata.is_none() {
			return Err(Error::InvalidRequest {
				message: "Either query text or a metadata filter is required.".to_string(),
			});
		}

		let predicate = compile_where(metadata)?;
		let date_range = parse_date_range(metadata)?;
		let mmr = req.search_type == Some(SearchType::Mmr);

		if mmr && text.is_none() {
			return Err(Error::InvalidRequest {
				message: "MMR search requires query text.".to_string(),
			});
		}

		let query_vector = match text {
			Some(text) => Some(self.embed_one(text).await?),
			None => None,
		};
		let limit = match req.limit {
			Some(0) | None => i64::from(default_limit),
			Some(limit) => i64::from(limit),
		};
		// MMR needs headroom to trade relevance for novelty.
		let fetch_limit = if mmr { limit * 2 } else { limit };
		let mmr_lambda = resolve_mmr_lambda(req.mmr_lambda, self.cfg.search.mmr_lambda)?;

		Ok(SearchPlan {
			predicate,
			date_range,
			metadata_filter: metadata.is_some(),
			query_vector,
			limit,
			fetch_limit,
			mmr,
			mmr_lambda,
		})
	}
}

fn finish_search(
	plan: SearchPlan,
	candidates: Vec<Candidate>,
	similarity: Similarity,
) -> Result<SearchResponse> {
	let mut candidates = candidates;

	if plan.query_vector.is_some() {
		let before = candidates.len();

		// Unranked rows only count as matches when a metadata filter selected
		// them; in a pure text search they are noise from the embedding join.
		candidates.retain(|candidate| match candidate.result.distance {
			Some(distance) => distance.is_finite(),
			None => plan.metadata_filter,
		});

		if candidates.len() < before {
			warn!(dropped = before - candidates.len(), "Dropped unranked or non-finite rows.");
		}
	}

	let results = match (plan.mmr, plan.query_vector) {
		(true, Some(query_vector)) => {
			let vectors =
				candidates.iter().map(|candidate| candidate.embedding.clone()).collect::<Vec<_>>();
			let picked = mmr::rerank(
				&query_vector,
				&vectors,
				similarity,
				plan.mmr_lambda,
				plan.limit as usize,
			);
			let mut results = candidates.into_iter().map(|c| Some(c.result)).collect::<Vec<_>>();

			picked.into_iter().filter_map(|index| results[index].take()).collect()
		},
		_ => candidates
			.into_iter()
			.take(plan.limit as usize)
			.map(|candidate| candidate.result)
			.collect(),
	};

	Ok(SearchResponse { results })
}

fn push_distance(
	builder: &mut QueryBuilder<'_, Postgres>,
	column: &str,
	operator: &str,
	query_vector: Option<&[f32]>,
) {
	match query_vector {
		Some(vector) => {
			builder.push("(");
			builder.push(column);
			builder.push(" ");
			builder.push(operator);
			builder.push(" ");
			builder.push_bind(vector_to_pg(vector));
			builder.push("::text::vector)");
		},
		None => {
			builder.push("NULL::float8");
		},
	}
}

fn push_date_range(
	builder: &mut QueryBuilder<'_, Postgres>,
	column: &str,
	date_range: &(Option<OffsetDateTime>, Option<OffsetDateTime>),
) {
	if let Some(start) = date_range.0 {
		builder.push(" AND ");
		builder.push(column);
		builder.push(" >= ");
		builder.push_bind(start);
	}
	if let Some(end) = date_range.1 {
		builder.push(" AND ");
		builder.push(column);
		builder.push(" <= ");
		builder.push_bind(end);
	}
}

// The config default is validated at load time; a per-request override gets
// the same `(0, 1]` check here.
fn resolve_mmr_lambda(requested: Option<f32>, default: f32) -> Result<f32> {
	let Some(lambda) = requested else {
		return Ok(default);
	};

	if !lambda.is_finite() || lambda <= 0.0 || lambda > 1.0 {
		return Err(Error::InvalidRequest {
			message: "mmr_lambda must be within (0, 1].".to_string(),
		});
	}

	Ok(lambda)
}

fn compile_where(metadata: Option<&Value>) -> Result<Predicate> {
	let Some(filter) = metadata.and_then(|metadata| metadata.get("where")) else {
		return Ok(Predicate::True);
	};
	let filter: MetadataFilter = serde_json::from_value(filter.clone()).map_err(|err| {
		Error::InvalidRequest { message: format!("Malformed metadata filter: {err}.") }
	})?;

	Ok(filter.compile()?)
}

fn parse_date_range(
	metadata: Option<&Value>,
) -> Result<(Option<OffsetDateTime>, Option<OffsetDateTime>)> {
	let start = parse_date_field(metadata, "start_date")?;
	let end = parse_date_field(metadata, "end_date")?;

	Ok((start, end))
}

fn parse_date_field(metadata: Option<&Value>, field: &str) -> Result<Option<OffsetDateTime>> {
	let Some(raw) = metadata.and_then(|metadata| metadata.get(field)) else {
		return Ok(None);
	};
	let Some(raw) = raw.as_str() else {
		return Err(Error::InvalidRequest { message: format!("{field} must be a string.") });
	};

	if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
		return Ok(Some(parsed));
	}

	let date = Date::parse(raw, format_description!("[year]-[month]-[day]")).map_err(|_| {
		Error::InvalidRequest {
			message: format!("{field} must be an RFC 3339 timestamp or a calendar date."),
		}
	})?;

	Ok(Some(date.midnight().assume_utc()))
}

fn is_empty_metadata(metadata: &Value) -> bool {
	match metadata {
		Value::Null => true,
		Value::Object(map) => map.is_empty(),
		_ => false,
	}
}
