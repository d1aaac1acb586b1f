use std::{collections::HashMap, sync::Arc};

use serde_json::json;

use mnemo_service::{Providers, UpdateMetadataRequest};

use super::{StubEmbedding, StubGeneration};

fn stub_providers() -> Providers {
	Providers::new(
		Arc::new(StubEmbedding { vectors: HashMap::new() }),
		Arc::new(StubGeneration { summary: "unused".to_string() }),
	)
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn concurrent_merges_lose_no_keys() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping concurrent_merges_lose_no_keys; set MNEMO_PG_DSN to run this test.");

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = Arc::new(super::build_service(cfg, stub_providers()).await);

	service.add_session("session-merge", None, None).await.expect("Failed to add session.");

	let writers = 8;
	let mut handles = Vec::with_capacity(writers);

	for i in 0..writers {
		let service = service.clone();

		handles.push(tokio::spawn(async move {
			let mut update = serde_json::Map::new();

			update.insert(format!("writer_{i}"), json!(i));
			service
				.update_session(
					"session-merge",
					UpdateMetadataRequest {
						metadata: serde_json::Value::Object(update),
						privileged: false,
					},
				)
				.await
		}));
	}

	for handle in handles {
		handle.await.expect("Writer task panicked.").expect("Metadata update failed.");
	}

	let session = service.get_session("session-merge").await.expect("Failed to fetch session.");

	for i in 0..writers {
		assert_eq!(
			session.metadata.get(format!("writer_{i}").as_str()),
			Some(&json!(i)),
			"writer_{i} key was lost",
		);
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn null_updates_never_erase_without_privilege() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping null_updates_never_erase_without_privilege; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, stub_providers()).await;

	service
		.add_session("session-null", None, Some(json!({ "a": 1, "b": 2 })))
		.await
		.expect("Failed to add session.");

	let response = service
		.update_session(
			"session-null",
			UpdateMetadataRequest { metadata: json!({ "a": null, "c": 3 }), privileged: false },
		)
		.await
		.expect("Metadata update failed.");

	assert_eq!(response.metadata, json!({ "a": 1, "b": 2, "c": 3 }));

	let privileged = service
		.update_session(
			"session-null",
			UpdateMetadataRequest { metadata: json!({ "a": null }), privileged: true },
		)
		.await
		.expect("Privileged update failed.");

	assert_eq!(privileged.metadata, json!({ "a": null, "b": 2, "c": 3 }));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn updating_a_missing_entity_is_not_found() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping updating_a_missing_entity_is_not_found; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, stub_providers()).await;
	let result = service
		.update_user(
			"no-such-user",
			UpdateMetadataRequest { metadata: json!({ "a": 1 }), privileged: false },
		)
		.await;

	assert!(matches!(result, Err(mnemo_service::Error::NotFound { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
