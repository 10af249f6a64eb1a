use anyhow::Result;
use regex::Regex;

use crate::environment::Environment;

const CLOSE_MARKER: &str = "</style>";

/// Matches the opening tags of embedded style blocks in one style language.
pub struct BlockPattern {
  open_tag: Regex,
  close_marker: &'static str,
}

impl BlockPattern {
  pub fn for_style_language(language: &str) -> Result<Self> {
    let open_tag = Regex::new(&format!(r#"<style[^>]*\s+lang="{}"[^>]*>"#, regex::escape(language)))?;
    Ok(Self {
      open_tag,
      close_marker: CLOSE_MARKER,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedBlock {
  pub open_tag_text: String,
  /// Byte offset in the original text just past the opening tag.
  pub open_tag_end: usize,
  /// Byte offset in the original text of the closing marker.
  pub close_tag_start: usize,
  pub raw_contents: String,
}

/// Finds every embedded style block in document order. Blocks without a
/// closing marker are skipped.
pub fn extract_blocks(original_text: &str, pattern: &BlockPattern, environment: &impl Environment) -> Vec<EmbeddedBlock> {
  let mut blocks = Vec::new();
  for open_tag in pattern.open_tag.find_iter(original_text) {
    let open_tag_end = open_tag.end();
    let Some(relative_close_index) = original_text[open_tag_end..].find(pattern.close_marker) else {
      log_debug!(environment, "Skipping unterminated style block at offset {}", open_tag.start());
      continue;
    };
    let close_tag_start = open_tag_end + relative_close_index;
    blocks.push(EmbeddedBlock {
      open_tag_text: open_tag.as_str().to_string(),
      open_tag_end,
      close_tag_start,
      raw_contents: original_text[open_tag_end..close_tag_start].to_string(),
    });
  }
  blocks
}

/// Formats each block in document order and swaps its raw contents for the
/// formatted contents at the first place they appear in `output`.
///
/// A block whose raw contents don't appear in `output` is left as the primary
/// formatter produced it.
pub async fn splice_blocks(
  output: String,
  blocks: &[EmbeddedBlock],
  format_block: impl AsyncFn(&str) -> Result<String>,
  environment: &impl Environment,
) -> Result<String> {
  let mut output = output;
  for (index, block) in blocks.iter().enumerate() {
    if block.raw_contents.is_empty() {
      log_debug!(environment, "Skipping empty style block {}", index);
      continue;
    }
    let formatted = format_block(&block.raw_contents).await?;
    if formatted == block.raw_contents {
      continue;
    }
    if output.contains(block.raw_contents.as_str()) {
      output = output.replacen(block.raw_contents.as_str(), &formatted, 1);
    } else {
      log_debug!(
        environment,
        "Style block {} was not found verbatim in the formatted output, leaving it as is",
        index
      );
    }
  }
  Ok(output)
}
