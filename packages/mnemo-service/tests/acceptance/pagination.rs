use std::{collections::HashMap, sync::Arc};

use mnemo_service::{
	AddMessagesRequest, AddUserRequest, ListMessagesRequest, ListUsersRequest, Message, Providers,
};

use super::{StubEmbedding, StubGeneration};

fn stub_providers() -> Providers {
	Providers::new(
		Arc::new(StubEmbedding { vectors: HashMap::new() }),
		Arc::new(StubGeneration { summary: "unused".to_string() }),
	)
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn offset_pages_cover_all_messages_once() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping offset_pages_cover_all_messages_once; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, stub_providers()).await;
	let messages = (0..9)
		.map(|i| Message {
			role: "user".to_string(),
			content: format!("message {i}"),
			token_count: 0,
			metadata: None,
		})
		.collect::<Vec<_>>();

	service
		.add_messages(AddMessagesRequest { session_id: "session-pages".to_string(), messages })
		.await
		.expect("Failed to add messages.");

	let first = service
		.list_messages(ListMessagesRequest {
			session_id: "session-pages".to_string(),
			page_number: Some(1),
			page_size: Some(5),
		})
		.await
		.expect("Failed to list page 1.");

	assert_eq!(first.row_count, 5);
	assert_eq!(first.total_count, 9);
	assert_eq!(first.messages[0].content, "message 0");

	let second = service
		.list_messages(ListMessagesRequest {
			session_id: "session-pages".to_string(),
			page_number: Some(2),
			page_size: Some(5),
		})
		.await
		.expect("Failed to list page 2.");

	assert_eq!(second.row_count, 4);
	assert_eq!(second.total_count, 9);
	assert_eq!(second.messages[0].content, "message 5");

	let third = service
		.list_messages(ListMessagesRequest {
			session_id: "session-pages".to_string(),
			page_number: Some(3),
			page_size: Some(5),
		})
		.await
		.expect("Failed to list page 3.");

	// An out-of-range page is empty but still reports the true total.
	assert_eq!(third.row_count, 0);
	assert_eq!(third.total_count, 9);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn user_cursor_walks_in_id_order_until_exhausted() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping user_cursor_walks_in_id_order_until_exhausted; set MNEMO_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, stub_providers()).await;

	for i in 0..5 {
		service
			.add_user(AddUserRequest {
				user_id: format!("user-{i}"),
				email: None,
				first_name: None,
				last_name: None,
				metadata: None,
			})
			.await
			.expect("Failed to add user.");
	}

	let mut cursor = None;
	let mut seen = Vec::new();
	let mut page_sizes = Vec::new();

	loop {
		let page = service
			.list_users(ListUsersRequest { cursor, limit: Some(3) })
			.await
			.expect("Failed to list users.");

		if page.users.is_empty() {
			break;
		}

		cursor = page.users.last().map(|user| user.id);

		page_sizes.push(page.users.len());
		seen.extend(page.users.into_iter().map(|user| user.user_id));
	}

	assert_eq!(page_sizes, vec![3, 2]);
	assert_eq!(seen, vec!["user-0", "user-1", "user-2", "user-3", "user-4"]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
