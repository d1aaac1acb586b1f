use std::{collections::HashMap, sync::Arc};

use mnemo_service::{
	AddMessagesRequest, Error, ExtractIntentRequest, ListSummariesRequest, Message, Providers,
	SummarizeRequest,
};

use super::{StubEmbedding, StubGeneration};

fn providers_with_summary(summary: &str) -> Providers {
	Providers::new(
		Arc::new(StubEmbedding { vectors: HashMap::new() }),
		Arc::new(StubGeneration { summary: summary.to_string() }),
	)
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn summarize_stores_a_progressive_summary() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping summarize_stores_a_progressive_summary; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service =
		super::build_service(cfg, providers_with_summary("The user planned a trip.")).await;
	let added = service
		.add_messages(AddMessagesRequest {
			session_id: "session-sum".to_string(),
			messages: vec![
				Message {
					role: "user".to_string(),
					content: "Let's plan the trip.".to_string(),
					token_count: 0,
					metadata: None,
				},
				Message {
					role: "assistant".to_string(),
					content: "Where would you like to go?".to_string(),
					token_count: 0,
					metadata: None,
				},
			],
		})
		.await
		.expect("Failed to add messages.");
	let response = service
		.summarize(SummarizeRequest { session_id: "session-sum".to_string() })
		.await
		.expect("Summarize failed.");

	assert_eq!(response.content, "The user planned a trip.");
	assert_eq!(response.summary_point_uuid, added.message_uuids.last().copied());

	let listed = service
		.list_summaries(ListSummariesRequest {
			session_id: "session-sum".to_string(),
			page_number: Some(1),
			page_size: Some(10),
		})
		.await
		.expect("Failed to list summaries.");

	assert_eq!(listed.row_count, 1);
	assert_eq!(listed.summaries[0].content, "The user planned a trip.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn extract_intent_annotates_message_metadata() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping extract_intent_annotates_message_metadata; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(
		cfg,
		providers_with_summary("Intent: The subject wants to book flights."),
	)
	.await;
	let added = service
		.add_messages(AddMessagesRequest {
			session_id: "session-intent".to_string(),
			messages: vec![Message {
				role: "user".to_string(),
				content: "Can you find me flights to Reykjavik?".to_string(),
				token_count: 0,
				metadata: None,
			}],
		})
		.await
		.expect("Failed to add messages.");
	let message_uuid = added.message_uuids[0];
	let response = service
		.extract_intent(ExtractIntentRequest {
			session_id: "session-intent".to_string(),
			message_uuid,
		})
		.await
		.expect("Intent extraction failed.");

	assert_eq!(response.intent.as_deref(), Some("The subject wants to book flights."));

	let stored = service
		.get_message("session-intent", message_uuid)
		.await
		.expect("Failed to fetch message.");

	assert_eq!(
		stored.metadata.pointer("/system/intent").and_then(|value| value.as_str()),
		Some("The subject wants to book flights.")
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn underivable_intents_leave_messages_unannotated() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping underivable_intents_leave_messages_unannotated; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with_summary("Intent: None")).await;
	let added = service
		.add_messages(AddMessagesRequest {
			session_id: "session-no-intent".to_string(),
			messages: vec![Message {
				role: "user".to_string(),
				content: "hmm".to_string(),
				token_count: 0,
				metadata: None,
			}],
		})
		.await
		.expect("Failed to add messages.");
	let message_uuid = added.message_uuids[0];
	let response = service
		.extract_intent(ExtractIntentRequest {
			session_id: "session-no-intent".to_string(),
			message_uuid,
		})
		.await
		.expect("Intent extraction failed.");

	assert!(response.intent.is_none());

	let stored = service
		.get_message("session-no-intent", message_uuid)
		.await
		.expect("Failed to fetch message.");

	assert!(stored.metadata.pointer("/system/intent").is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn summarizing_an_empty_session_is_rejected() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping summarizing_an_empty_session_is_rejected; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, providers_with_summary("unused")).await;
	let result =
		service.summarize(SummarizeRequest { session_id: "session-empty".to_string() }).await;

	assert!(matches!(result, Err(Error::InvalidRequest { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
