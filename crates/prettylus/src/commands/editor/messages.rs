use serde::Deserialize;
use serde::Serialize;
use std::ops::Range;
use std::path::PathBuf;
use thiserror::Error;

use crate::format::LineEnding;

/// A message received from the editor on one line of stdin.
#[derive(Debug, PartialEq, Eq)]
pub struct EditorRequest {
  pub id: u32,
  pub body: EditorRequestBody,
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EditorRequestBody {
  Format(FormatRequestBody),
  FormatRange(FormatRequestBody),
  /// Cancels an in-flight format request.
  Cancel { target_id: u32 },
  /// The bridge configuration changed and should be read again.
  ConfigChanged,
  Shutdown,
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatRequestBody {
  pub file_path: PathBuf,
  pub text: String,
  #[serde(default)]
  pub is_untitled: bool,
  #[serde(default)]
  pub project_root: Option<PathBuf>,
  #[serde(default)]
  pub indent_width: Option<u8>,
  #[serde(default)]
  pub use_tabs: Option<bool>,
  /// Detected from the text when absent.
  #[serde(default)]
  pub line_ending: Option<LineEnding>,
  #[serde(default)]
  pub range: Option<FormatRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FormatRange {
  pub start: usize,
  pub end: usize,
}

impl From<FormatRange> for Range<usize> {
  fn from(range: FormatRange) -> Self {
    range.start..range.end
  }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct InvalidRequestError {
  /// Id of the request, when it could be read.
  pub id: Option<u32>,
  pub message: String,
}

impl EditorRequest {
  pub fn parse(line: &str) -> Result<EditorRequest, InvalidRequestError> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|err| InvalidRequestError {
      id: None,
      message: format!("Invalid JSON message: {}", err),
    })?;
    let Some(id) = value.get("id").and_then(|id| id.as_u64()).and_then(|id| u32::try_from(id).ok()) else {
      return Err(InvalidRequestError {
        id: None,
        message: "Message is missing a numeric id.".to_string(),
      });
    };
    let body = serde_json::from_value(value).map_err(|err| InvalidRequestError {
      id: Some(id),
      message: format!("Invalid message: {}", err),
    })?;
    Ok(EditorRequest { id, body })
  }
}

/// A message written to the editor on one line of stdout.
#[derive(Debug, Serialize)]
pub struct EditorResponse {
  pub id: Option<u32>,
  #[serde(flatten)]
  pub body: EditorResponseBody,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EditorResponseBody {
  /// `text` is absent when the document should not be edited.
  Formatted {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    warnings: Vec<String>,
  },
  Success,
  Error { message: String },
}
