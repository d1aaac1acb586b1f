use std::{collections::HashMap, sync::Arc};

use serde_json::json;

use mnemo_service::{
	AddDocumentsRequest, AddMessagesRequest, CreateCollectionRequest, DocumentInput, Error,
	Message, Providers, SearchRequest, SearchType,
};

use super::{StubEmbedding, StubGeneration};

fn providers_with(vectors: HashMap<String, Vec<f32>>) -> Providers {
	Providers::new(
		Arc::new(StubEmbedding { vectors }),
		Arc::new(StubGeneration { summary: "unused".to_string() }),
	)
}

fn message(content: &str, metadata: serde_json::Value) -> Message {
	Message {
		role: "user".to_string(),
		content: content.to_string(),
		token_count: 0,
		metadata: Some(metadata),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn message_similarity_ranks_by_inner_product() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping message_similarity_ranks_by_inner_product; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let vectors = HashMap::from([
		("iceland trip".to_string(), vec![1.0, 0.0, 0.0]),
		("The Iceland trip is booked.".to_string(), vec![0.9, 0.1, 0.0]),
		("Flights to Iceland are expensive.".to_string(), vec![0.5, 0.0, 0.0]),
		("The cat needs a vet appointment.".to_string(), vec![0.0, 1.0, 0.0]),
	]);
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with(vectors)).await;
	let added = service
		.add_messages(AddMessagesRequest {
			session_id: "session-sim".to_string(),
			messages: vec![
				message("The Iceland trip is booked.", json!({ "topic": "travel" })),
				message("Flights to Iceland are expensive.", json!({ "topic": "travel" })),
				message("The cat needs a vet appointment.", json!({ "topic": "pets" })),
			],
		})
		.await
		.expect("Failed to add messages.");

	service
		.embed_messages("session-sim", &added.message_uuids)
		.await
		.expect("Failed to embed messages.");
	// A message without a stored embedding must not pad text-only results.
	service
		.add_messages(AddMessagesRequest {
			session_id: "session-sim".to_string(),
			messages: vec![message("Not embedded yet.", json!({}))],
		})
		.await
		.expect("Failed to add the unembedded message.");

	let response = service
		.search_messages(
			"session-sim",
			SearchRequest {
				text: Some("iceland trip".to_string()),
				metadata: None,
				limit: Some(10),
				search_type: Some(SearchType::Similarity),
				mmr_lambda: None,
			},
		)
		.await
		.expect("Search failed.");

	assert_eq!(response.results.len(), 3);
	assert_eq!(response.results[0].content, "The Iceland trip is booked.");
	assert_eq!(response.results[1].content, "Flights to Iceland are expensive.");
	assert!(response.results[0].distance.unwrap() < response.results[1].distance.unwrap());
	assert!(response.results.iter().all(|result| result.content != "Not embedded yet."));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn metadata_only_search_filters_without_a_vector() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping metadata_only_search_filters_without_a_vector; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with(HashMap::new())).await;

	service
		.add_messages(AddMessagesRequest {
			session_id: "session-meta".to_string(),
			messages: vec![
				message("About the trip.", json!({ "topics": { "travel": true } })),
				message("About the cat.", json!({ "topics": { "pets": true } })),
			],
		})
		.await
		.expect("Failed to add messages.");

	let response = service
		.search_messages(
			"session-meta",
			SearchRequest {
				text: None,
				metadata: Some(json!({ "where": { "jsonpath": "$.topics.travel" } })),
				limit: None,
				search_type: None,
				mmr_lambda: None,
			},
		)
		.await
		.expect("Search failed.");

	assert_eq!(response.results.len(), 1);
	assert_eq!(response.results[0].content, "About the trip.");
	assert!(response.results[0].distance.is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn blank_searches_are_rejected_before_any_io() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping blank_searches_are_rejected_before_any_io; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with(HashMap::new())).await;
	let result = service
		.search_messages(
			"session-any",
			SearchRequest {
				text: Some("  ".to_string()),
				metadata: Some(json!({})),
				limit: None,
				search_type: None,
				mmr_lambda: None,
			},
		)
		.await;

	assert!(matches!(result, Err(Error::InvalidRequest { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn blank_document_searches_are_rejected_before_the_collection_lookup() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping blank_document_searches_are_rejected_before_the_collection_lookup; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with(HashMap::new())).await;
	// Invalid request against a collection that does not exist: validation
	// has to win over the collection lookup.
	let result = service
		.search_documents(
			"missing",
			SearchRequest {
				text: None,
				metadata: None,
				limit: None,
				search_type: None,
				mmr_lambda: None,
			},
		)
		.await;

	assert!(matches!(result, Err(Error::InvalidRequest { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn date_filter_over_an_empty_session_returns_no_results() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping date_filter_over_an_empty_session_returns_no_results; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with(HashMap::new())).await;
	let response = service
		.search_messages(
			"session-nothing-yet",
			SearchRequest {
				text: None,
				metadata: Some(json!({ "start_date": "2023-06-01", "end_date": "2023-06-30" })),
				limit: None,
				search_type: None,
				mmr_lambda: None,
			},
		)
		.await
		.expect("Search failed.");

	assert!(response.results.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn mmr_search_prefers_diverse_messages() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping mmr_search_prefers_diverse_messages; set MNEMO_PG_DSN to run this test.");

		return;
	};
	let vectors = HashMap::from([
		("meeting notes".to_string(), vec![1.0, 0.0, 0.0]),
		("Monday meeting notes.".to_string(), vec![0.9, 0.436, 0.0]),
		("Monday meeting notes again.".to_string(), vec![0.89, 0.456, 0.0]),
		("Quarterly budget figures.".to_string(), vec![0.6, -0.8, 0.0]),
	]);
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with(vectors)).await;
	let added = service
		.add_messages(AddMessagesRequest {
			session_id: "session-mmr".to_string(),
			messages: vec![
				message("Monday meeting notes.", json!({})),
				message("Monday meeting notes again.", json!({})),
				message("Quarterly budget figures.", json!({})),
			],
		})
		.await
		.expect("Failed to add messages.");

	service
		.embed_messages("session-mmr", &added.message_uuids)
		.await
		.expect("Failed to embed messages.");

	let response = service
		.search_messages(
			"session-mmr",
			SearchRequest {
				text: Some("meeting notes".to_string()),
				metadata: None,
				limit: Some(2),
				search_type: Some(SearchType::Mmr),
				mmr_lambda: Some(0.5),
			},
		)
		.await
		.expect("Search failed.");
	let contents =
		response.results.iter().map(|result| result.content.as_str()).collect::<Vec<_>>();

	assert_eq!(contents, vec!["Monday meeting notes.", "Quarterly budget figures."]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn document_search_uses_cosine_and_probe_settings() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping document_search_uses_cosine_and_probe_settings; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let vectors = HashMap::from([("northern lights".to_string(), vec![1.0, 0.0, 0.0])]);
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with(vectors)).await;

	service
		.create_collection(CreateCollectionRequest {
			name: "guides".to_string(),
			metadata: None,
			embedding_dim: Some(3),
		})
		.await
		.expect("Failed to create collection.");
	service
		.add_documents(AddDocumentsRequest {
			collection_name: "guides".to_string(),
			documents: vec![
				DocumentInput {
					document_id: Some("aurora".to_string()),
					content: "Aurora viewing guide.".to_string(),
					metadata: None,
					embedding: Some(vec![0.95, 0.1, 0.0]),
				},
				DocumentInput {
					document_id: Some("geysers".to_string()),
					content: "Geyser field guide.".to_string(),
					metadata: None,
					embedding: Some(vec![0.0, 1.0, 0.0]),
				},
			],
		})
		.await
		.expect("Failed to add documents.");
	service
		.mark_collection_indexed("guides", 5)
		.await
		.expect("Failed to mark collection indexed.");

	let response = service
		.search_documents(
			"guides",
			SearchRequest {
				text: Some("northern lights".to_string()),
				metadata: None,
				limit: Some(1),
				search_type: Some(SearchType::Similarity),
				mmr_lambda: None,
			},
		)
		.await
		.expect("Search failed.");

	assert_eq!(response.results.len(), 1);
	assert_eq!(response.results[0].document_id.as_deref(), Some("aurora"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn searching_an_unknown_collection_is_not_found() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping searching_an_unknown_collection_is_not_found; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with(HashMap::new())).await;
	let result = service
		.search_documents(
			"missing",
			SearchRequest {
				text: Some("anything".to_string()),
				metadata: None,
				limit: None,
				search_type: None,
				mmr_lambda: None,
			},
		)
		.await;

	assert!(matches!(result, Err(Error::NotFound { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
