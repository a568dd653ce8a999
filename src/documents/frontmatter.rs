//! Front matter extraction.
//!
//! Two fence styles are recognised at the very start of a file:
//!
//! ```text
//! ---            +++
//! title: Intro   title = "Intro"
//! ---            +++
//! ```
//!
//! YAML blocks are parsed with `serde_yaml`, TOML blocks with `toml`.
//! Unknown keys (sidebar_position, slug, ...) are ignored.

use serde::Deserialize;
use thiserror::Error;

use super::types::TranslationSource;

/// Errors from front matter parsing.
#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("opening '{fence}' fence has no closing fence")]
    Unterminated { fence: &'static str },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("translation_quality {0} is outside [0, 1]")]
    QualityOutOfRange(f32),
}

/// A string or number in front matter (`module: 3` and `module: "module-3"` are both common).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Scalar {
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
        }
    }
}

/// Recognised front matter keys.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FrontMatter {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, alias = "lang")]
    pub language: Option<String>,

    #[serde(default)]
    pub module: Option<Scalar>,

    #[serde(default)]
    pub original_language: Option<String>,

    #[serde(default)]
    pub translation_source: Option<TranslationSource>,

    #[serde(default)]
    pub translation_quality: Option<f32>,
}

/// Split `content` into its front matter and the remaining body.
///
/// Files without a leading fence yield `FrontMatter::default()` and the whole input.
pub fn split(content: &str) -> Result<(FrontMatter, &str), FrontMatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let (fence, is_yaml) = if is_fence_line(content, "---") {
        ("---", true)
    } else if is_fence_line(content, "+++") {
        ("+++", false)
    } else {
        return Ok((FrontMatter::default(), content));
    };

    let after_open = match content.find('\n') {
        Some(i) => i + 1,
        None => return Err(FrontMatterError::Unterminated { fence }),
    };

    let mut offset = after_open;
    let mut close = None;
    for line in content[after_open..].split_inclusive('\n') {
        if line.trim_end() == fence {
            close = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let (block_end, body_start) = close.ok_or(FrontMatterError::Unterminated { fence })?;
    let block = &content[after_open..block_end];

    let matter = if block.trim().is_empty() {
        FrontMatter::default()
    } else if is_yaml {
        serde_yaml::from_str(block)?
    } else {
        toml::from_str(block)?
    };

    if let Some(q) = matter.translation_quality {
        if !(0.0..=1.0).contains(&q) {
            return Err(FrontMatterError::QualityOutOfRange(q));
        }
    }

    Ok((matter, &content[body_start..]))
}

fn is_fence_line(content: &str, fence: &str) -> bool {
    let first = content.lines().next().unwrap_or("");
    first.trim_end() == fence
}
