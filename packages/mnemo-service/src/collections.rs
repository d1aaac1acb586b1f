use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use mnemo_storage::queries;

use crate::{Error, MnemoService, Result, memory::normalize_metadata, vector_to_pg};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateCollectionRequest {
	pub name: String,
	#[serde(default)]
	pub metadata: Option<Value>,
	pub embedding_dim: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateCollectionResponse {
	pub uuid: Uuid,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DocumentInput {
	pub document_id: Option<String>,
	pub content: String,
	#[serde(default)]
	pub metadata: Option<Value>,
	#[serde(default)]
	pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AddDocumentsRequest {
	pub collection_name: String,
	pub documents: Vec<DocumentInput>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AddDocumentsResponse {
	pub document_uuids: Vec<Uuid>,
}

impl MnemoService {
	pub async fn create_collection(
		&self,
		req: CreateCollectionRequest,
	) -> Result<CreateCollectionResponse> {
		let name = req.name.trim();

		if name.is_empty() {
			return Err(Error::InvalidRequest {
				message: "Collection name must not be empty.".to_string(),
			});
		}

		let embedding_dim = req.embedding_dim.unwrap_or(self.cfg.providers.embedding.dimensions);

		if embedding_dim == 0 {
			return Err(Error::InvalidRequest {
				message: "embedding_dim must be at least 1.".to_string(),
			});
		}

		let uuid = Uuid::new_v4();
		let metadata = normalize_metadata(req.metadata)?;

		queries::insert_collection(
			&self.db.pool,
			uuid,
			name,
			&metadata,
			embedding_dim as i32,
			false,
			1,
		)
		.await?;

		Ok(CreateCollectionResponse { uuid })
	}

	pub async fn add_documents(&self, req: AddDocumentsRequest) -> Result<AddDocumentsResponse> {
		if req.documents.is_empty() {
			return Err(Error::InvalidRequest {
				message: "At least one document is required.".to_string(),
			});
		}

		let collection = queries::get_collection(&self.db.pool, &req.collection_name)
			.await?
			.ok_or_else(|| Error::NotFound {
				message: format!("Unknown collection {:?}.", req.collection_name),
			})?;

		for document in &req.documents {
			if let Some(embedding) = document.embedding.as_ref()
				&& embedding.len() != collection.embedding_dim as usize
			{
				return Err(Error::InvalidRequest {
					message: format!(
						"Document embedding has {} dimensions; the collection expects {}.",
						embedding.len(),
						collection.embedding_dim
					),
				});
			}
		}

		debug!(
			collection = %req.collection_name,
			count = req.documents.len(),
			"Adding documents."
		);

		let mut tx = self.db.pool.begin().await?;
		let mut document_uuids = Vec::with_capacity(req.documents.len());

		for document in &req.documents {
			let uuid = Uuid::new_v4();
			let metadata = normalize_metadata(document.metadata.clone())?;
			let embedding = document.embedding.as_deref().map(vector_to_pg);

			queries::insert_document(
				&mut *tx,
				uuid,
				collection.id,
				document.document_id.as_deref(),
				&document.content,
				&metadata,
				embedding.as_deref(),
			)
			.await?;
			document_uuids.push(uuid);
		}

		tx.commit().await?;

		Ok(AddDocumentsResponse { document_uuids })
	}

	/// Embeds documents that were added without vectors, in insertion order.
	/// Returns the number of documents embedded.
	pub async fn embed_pending_documents(
		&self,
		collection_name: &str,
		batch_size: u32,
	) -> Result<usize> {
		let collection = queries::get_collection(&self.db.pool, collection_name)
			.await?
			.ok_or_else(|| Error::NotFound {
				message: format!("Unknown collection {collection_name:?}."),
			})?;
		let pending = queries::documents_missing_embeddings(
			&self.db.pool,
			collection.id,
			i64::from(batch_size.max(1)),
		)
		.await?;

		if pending.is_empty() {
			return Ok(0);
		}

		let texts = pending.iter().map(|row| row.content.clone()).collect::<Vec<_>>();
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;

		if vectors.len() != pending.len() {
			return Err(Error::Provider {
				message: "Embedding provider returned the wrong number of vectors.".to_string(),
			});
		}

		for (row, vector) in pending.iter().zip(&vectors) {
			queries::update_document_embedding(&self.db.pool, row.uuid, &vector_to_pg(vector))
				.await?;
		}

		Ok(pending.len())
	}

	/// Records that the collection's ivfflat index was built and how many
	/// probes searches should use.
	pub async fn mark_collection_indexed(
		&self,
		collection_name: &str,
		probe_count: u32,
	) -> Result<()> {
		if probe_count == 0 {
			return Err(Error::InvalidRequest {
				message: "probe_count must be at least 1.".to_string(),
			});
		}

		let collection = queries::get_collection(&self.db.pool, collection_name)
			.await?
			.ok_or_else(|| Error::NotFound {
				message: format!("Unknown collection {collection_name:?}."),
			})?;

		queries::mark_collection_indexed(&self.db.pool, collection.id, probe_count as i32).await?;

		Ok(())
	}
}
