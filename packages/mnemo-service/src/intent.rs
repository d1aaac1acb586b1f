use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use mnemo_storage::queries;

use crate::{Error, MnemoService, Result, UpdateMetadataRequest};

const INTENT_PROMPT: &str = "\
Identify the intent of the subject's statement or question below.

If you can't derive an intent, respond with Intent: None.

EXAMPLE
Subject: Does Nike make running shoes?
Intent: The subject is inquiring about whether Nike, a specific brand, manufactures running shoes.

Subject: {input}
Intent:
";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExtractIntentRequest {
	pub session_id: String,
	pub message_uuid: Uuid,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExtractIntentResponse {
	pub intent: Option<String>,
}

impl MnemoService {
	/// Classifies the intent of a stored message and records it under the
	/// message's `system.intent` metadata key. Messages without a derivable
	/// intent are left unannotated.
	pub async fn extract_intent(
		&self,
		req: ExtractIntentRequest,
	) -> Result<ExtractIntentResponse> {
		debug!(session_id = %req.session_id, message_uuid = %req.message_uuid, "Extracting intent.");

		let message = queries::get_message(&self.db.pool, &req.session_id, req.message_uuid)
			.await?
			.ok_or_else(|| Error::NotFound {
				message: format!(
					"No such message {} in session {:?}.",
					req.message_uuid, req.session_id
				),
			})?;
		let prompt = build_prompt(&message.content);
		let raw = self
			.providers
			.generation
			.generate(&self.cfg.providers.generation, &prompt)
			.await?;
		let Some(intent) = parse_intent(&raw) else {
			return Ok(ExtractIntentResponse { intent: None });
		};

		// System annotations go through the same merge path as user updates,
		// privileged so a reclassification can overwrite the previous value.
		self.update_message_metadata(&req.session_id, req.message_uuid, UpdateMetadataRequest {
			metadata: json!({ "system": { "intent": &intent } }),
			privileged: true,
		})
		.await?;

		Ok(ExtractIntentResponse { intent: Some(intent) })
	}
}

fn build_prompt(input: &str) -> String {
	INTENT_PROMPT.replace("{input}", input)
}

fn parse_intent(raw: &str) -> Option<String> {
	let trimmed = raw.trim();
	let trimmed = trimmed.strip_prefix("Intent:").map(str::trim).unwrap_or(trimmed);

	if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
		return None;
	}

	Some(trimmed.to_string())
}
