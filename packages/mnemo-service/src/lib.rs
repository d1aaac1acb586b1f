pub mod collections;
pub mod intent;
pub mod list;
pub mod memory;
pub mod search;
pub mod summarize;
pub mod time_serde;
pub mod update;

mod error;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin, sync::Arc};

use mnemo_config::{Config, EmbeddingProviderConfig, GenerationProviderConfig};
use mnemo_providers::{embedding, generation};
use mnemo_storage::db::Db;

pub use collections::{
	AddDocumentsRequest, AddDocumentsResponse, CreateCollectionRequest, CreateCollectionResponse,
	DocumentInput,
};
pub use intent::{ExtractIntentRequest, ExtractIntentResponse};
pub use list::{
	ListMessagesRequest, ListMessagesResponse, ListSummariesRequest, ListSummariesResponse,
	ListUsersRequest, ListUsersResponse, MessageItem, SummaryItem, UserItem,
};
pub use memory::{AddMessagesRequest, AddMessagesResponse, AddUserRequest, Message};
pub use search::{SearchRequest, SearchResponse, SearchResult, SearchType};
pub use summarize::{SummarizeRequest, SummarizeResponse};
pub use update::{UpdateMetadataRequest, UpdateMetadataResponse};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, mnemo_providers::Result<Vec<Vec<f32>>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, mnemo_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
}

pub struct MnemoService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, mnemo_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, mnemo_providers::Result<String>> {
		Box::pin(generation::generate(cfg, prompt))
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, generation: Arc<dyn GenerationProvider>) -> Self {
		Self { embedding, generation }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), generation: provider }
	}
}

impl MnemoService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		Self { cfg, db, providers }
	}

	pub(crate) async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_owned()];
		let vectors =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;

		vectors
			.into_iter()
			.next()
			.ok_or_else(|| Error::Provider { message: "Embedding response was empty.".to_string() })
	}
}

pub(crate) fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub(crate) fn parse_pg_vector(text: &str) -> Result<Vec<f32>> {
	let trimmed = text.trim();
	let without_brackets =
		trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')).ok_or_else(|| {
			Error::Internal { message: "Vector text is not bracketed.".to_string() }
		})?;

	if without_brackets.trim().is_empty() {
		return Ok(Vec::new());
	}

	let mut vec = Vec::new();

	for part in without_brackets.split(',') {
		let value: f32 = part.trim().parse().map_err(|_| Error::Internal {
			message: "Vector text contains a non-numeric value.".to_string(),
		})?;

		vec.push(value);
	}

	Ok(vec)
}
