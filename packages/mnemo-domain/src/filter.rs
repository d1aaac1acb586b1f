//! Boolean metadata filter trees and their compilation into a backend-neutral
//! predicate expression.
//!
//! A filter node carries an optional leaf path condition plus optional `and` /
//! `or` child lists. Compilation conjoins a node's own leaf, the AND-group of
//! its `and` children, and the OR-group of its `or` children; the storage
//! layer renders the resulting [`Predicate`] into SQL.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_FILTER_DEPTH: usize = 8;
const MAX_FILTER_NODES: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
	#[error("Malformed metadata path {path:?}: {message}")]
	MalformedPath { path: String, message: String },
	#[error("Filter exceeds depth limit ({depth}/{MAX_FILTER_DEPTH}).")]
	DepthLimit { depth: usize },
	#[error("Filter exceeds node limit ({nodes}/{MAX_FILTER_NODES}).")]
	NodeLimit { nodes: usize },
}

/// A recursive metadata filter as supplied by search callers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jsonpath: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub and: Option<Vec<MetadataFilter>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub or: Option<Vec<MetadataFilter>>,
}
impl MetadataFilter {
	pub fn is_empty(&self) -> bool {
		self.jsonpath.as_deref().map(str::trim).unwrap_or_default().is_empty()
			&& self.and.as_deref().unwrap_or_default().is_empty()
			&& self.or.as_deref().unwrap_or_default().is_empty()
	}

	/// Compiles the tree into a [`Predicate`]. An empty tree compiles to
	/// [`Predicate::True`]; a malformed path is an error, never a silent
	/// empty match.
	pub fn compile(&self) -> Result<Predicate, FilterError> {
		let mut state = CompileState::default();

		compile_node(self, 1, &mut state)
	}
}

/// A backend-neutral boolean predicate over metadata documents.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
	/// Matches every document. Produced by an empty filter tree.
	True,
	/// Path-existence test against the metadata document.
	PathExists(MetadataPath),
	All(Vec<Predicate>),
	Any(Vec<Predicate>),
}
impl Predicate {
	/// Conjunction with `True` members pruned and single members unwrapped.
	pub fn all(members: Vec<Self>) -> Self {
		let mut kept: Vec<Self> =
			members.into_iter().filter(|member| !matches!(member, Self::True)).collect();

		match kept.len() {
			0 => Self::True,
			1 => kept.remove(0),
			_ => Self::All(kept),
		}
	}

	/// Disjunction. A `True` member absorbs the whole group.
	pub fn any(members: Vec<Self>) -> Self {
		if members.is_empty() || members.iter().any(|member| matches!(member, Self::True)) {
			return Self::True;
		}

		let mut members = members;

		if members.len() == 1 { members.remove(0) } else { Self::Any(members) }
	}

	/// Reference evaluator over an in-memory metadata document. Storage
	/// backends render the predicate instead; this exists so the boolean
	/// semantics can be verified without a database.
	pub fn matches(&self, metadata: &Value) -> bool {
		match self {
			Self::True => true,
			Self::PathExists(path) => path.exists_in(metadata),
			Self::All(members) => members.iter().all(|member| member.matches(metadata)),
			Self::Any(members) => members.iter().any(|member| member.matches(metadata)),
		}
	}
}

/// A validated, quote-normalized metadata path: `$` followed by member
/// segments, e.g. `$.system.intent` or `$."display name"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataPath {
	normalized: String,
	segments: Vec<String>,
}
impl MetadataPath {
	/// Parses the query-path micro-syntax. Single quotes are normalized to
	/// the backend's double-quote convention before validation.
	pub fn parse(raw: &str) -> Result<Self, FilterError> {
		let normalized = raw.trim().replace('\'', "\"");

		if normalized.is_empty() {
			return Err(FilterError::MalformedPath {
				path: raw.to_string(),
				message: "path is empty".to_string(),
			});
		}

		let mut chars = normalized.chars().peekable();

		if chars.next() != Some('$') {
			return Err(FilterError::MalformedPath {
				path: raw.to_string(),
				message: "path must start with '$'".to_string(),
			});
		}

		let mut segments = Vec::new();

		while let Some(ch) = chars.next() {
			if ch != '.' {
				return Err(FilterError::MalformedPath {
					path: raw.to_string(),
					message: format!("expected '.' before segment, found {ch:?}"),
				});
			}

			let segment = if chars.peek() == Some(&'"') {
				chars.next();

				let mut quoted = String::new();
				let mut closed = false;

				for ch in chars.by_ref() {
					if ch == '"' {
						closed = true;

						break;
					}

					quoted.push(ch);
				}

				if !closed || quoted.is_empty() {
					return Err(FilterError::MalformedPath {
						path: raw.to_string(),
						message: "unterminated or empty quoted segment".to_string(),
					});
				}

				quoted
			} else {
				let mut bare = String::new();

				while let Some(ch) = chars.peek() {
					if *ch == '.' {
						break;
					}
					if !ch.is_ascii_alphanumeric() && *ch != '_' && *ch != '-' {
						return Err(FilterError::MalformedPath {
							path: raw.to_string(),
							message: format!("invalid character {ch:?} in segment"),
						});
					}

					bare.push(*ch);
					chars.next();
				}

				if bare.is_empty() {
					return Err(FilterError::MalformedPath {
						path: raw.to_string(),
						message: "empty segment".to_string(),
					});
				}

				bare
			};

			segments.push(segment);
		}

		Ok(Self { normalized, segments })
	}

	/// The normalized path string handed to the backend (`jsonb_path_exists`).
	pub fn as_str(&self) -> &str {
		&self.normalized
	}

	fn exists_in(&self, metadata: &Value) -> bool {
		let mut cursor = metadata;

		for segment in &self.segments {
			match cursor.get(segment.as_str()) {
				Some(child) => cursor = child,
				None => return false,
			}
		}

		true
	}
}

#[derive(Default)]
struct CompileState {
	nodes: usize,
}

fn compile_node(
	node: &MetadataFilter,
	depth: usize,
	state: &mut CompileState,
) -> Result<Predicate, FilterError> {
	if depth > MAX_FILTER_DEPTH {
		return Err(FilterError::DepthLimit { depth });
	}

	state.nodes = state.nodes.saturating_add(1);

	if state.nodes > MAX_FILTER_NODES {
		return Err(FilterError::NodeLimit { nodes: state.nodes });
	}

	let mut parts = Vec::new();

	if let Some(raw) = node.jsonpath.as_deref().map(str::trim).filter(|path| !path.is_empty()) {
		parts.push(Predicate::PathExists(MetadataPath::parse(raw)?));
	}
	if let Some(children) = node.and.as_deref().filter(|children| !children.is_empty()) {
		let compiled = children
			.iter()
			.map(|child| compile_node(child, depth + 1, state))
			.collect::<Result<Vec<_>, _>>()?;

		parts.push(Predicate::all(compiled));
	}
	if let Some(children) = node.or.as_deref().filter(|children| !children.is_empty()) {
		let compiled = children
			.iter()
			.map(|child| compile_node(child, depth + 1, state))
			.collect::<Result<Vec<_>, _>>()?;

		parts.push(Predicate::any(compiled));
	}

	Ok(Predicate::all(parts))
}
