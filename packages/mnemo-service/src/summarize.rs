use serde_json::json;
use sqlx::query_as;
use tracing::debug;
use uuid::Uuid;

use mnemo_storage::{models::MessageRow, queries};

use crate::{Error, MnemoService, Result};

const SUMMARY_PROMPT: &str = "\
Review the Current Summary, if there is one, and the New Lines of the provided
conversation. Create a concise summary of the conversation, adding from the
New Lines to the Current Summary. If the New Lines are meaningless, return the
Current Summary.

Current summary:
{prev_summary}
New lines of conversation:
{messages_joined}
New summary:
";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SummarizeRequest {
	pub session_id: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SummarizeResponse {
	pub uuid: Uuid,
	pub content: String,
	pub summary_point_uuid: Option<Uuid>,
}

impl MnemoService {
	/// Produces a progressive summary for the session: the previous summary
	/// plus the most recent messages are folded into a new summary row.
	pub async fn summarize(&self, req: SummarizeRequest) -> Result<SummarizeResponse> {
		let session_id = req.session_id.trim();

		if session_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "session_id must not be empty.".to_string(),
			});
		}

		debug!(session_id, "Summarizing session.");

		let previous = queries::latest_summary(&self.db.pool, session_id).await?;
		let window = i64::from(self.cfg.memory.summary_window.max(1));
		let mut recent: Vec<MessageRow> = query_as(
			"\
SELECT * FROM messages
WHERE session_id = $1 AND deleted_at IS NULL
ORDER BY id DESC
LIMIT $2",
		)
		.bind(session_id)
		.bind(window)
		.fetch_all(&self.db.pool)
		.await?;

		if recent.is_empty() {
			return Err(Error::InvalidRequest {
				message: format!("Session {session_id:?} has no messages to summarize."),
			});
		}

		recent.reverse();

		let summary_point_uuid = recent.last().map(|row| row.uuid);
		let prompt = build_prompt(
			previous.as_ref().map(|summary| summary.content.as_str()).unwrap_or(""),
			&recent,
		);
		let content = self
			.providers
			.generation
			.generate(&self.cfg.providers.generation, &prompt)
			.await?;

		if content.trim().is_empty() {
			return Err(Error::Provider {
				message: "Generation provider returned an empty summary.".to_string(),
			});
		}

		let uuid = Uuid::new_v4();
		let metadata = json!({ "window": recent.len() });

		queries::insert_summary(
			&self.db.pool,
			uuid,
			session_id,
			&content,
			&metadata,
			summary_point_uuid,
		)
		.await?;

		Ok(SummarizeResponse { uuid, content, summary_point_uuid })
	}
}

fn build_prompt(prev_summary: &str, messages: &[MessageRow]) -> String {
	let messages_joined = messages
		.iter()
		.map(|message| format!("{}: {}", message.role, message.content))
		.collect::<Vec<_>>()
		.join("\n");

	SUMMARY_PROMPT
		.replace("{prev_summary}", prev_summary)
		.replace("{messages_joined}", &messages_joined)
}
