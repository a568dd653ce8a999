//! Corpus discovery and document parsing.
//!
//! Walks the corpus root, keeps files matching the configured glob patterns,
//! strips front matter and records the heading tree. Per-file failures are
//! logged and reported as skipped; they never abort the traversal.

use glob::{MatchOptions, Pattern};
use rayon::prelude::*;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use super::config::CorpusConfig;
use super::error::{LoadError, LoadResult};
use super::frontmatter::{self, FrontMatter, Scalar};
use super::types::{
    Document, HeadingSpan, TranslationInfo, TranslationSource, normalize_language,
};

/// Docusaurus keeps translated docs under this directory inside `i18n/<lang>/`.
const DOCUSAURUS_DOCS_DIR: &str = "docusaurus-plugin-content-docs/current";

static MODULE_RE: OnceLock<Regex> = OnceLock::new();

fn module_re() -> &'static Regex {
    MODULE_RE.get_or_init(|| Regex::new(r"(?:^|/)module-(\d+)(?:/|$)").expect("static regex"))
}

/// A file the loader could not turn into a document.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of loading a corpus.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Documents in sorted path order.
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// Loads Markdown/MDX documents from a corpus root.
pub struct ContentLoader {
    root: PathBuf,
    config: CorpusConfig,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl ContentLoader {
    /// Create a loader for `config.root`.
    pub fn new(config: &CorpusConfig) -> LoadResult<Self> {
        Self::with_root(&config.root, config)
    }

    /// Create a loader for an explicit root, using the rest of `config`.
    pub fn with_root(root: impl AsRef<Path>, config: &CorpusConfig) -> LoadResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(LoadError::MissingRoot(root));
        }

        Ok(Self {
            root,
            include: compile_patterns(&config.patterns)?,
            exclude: compile_patterns(&config.exclude_patterns)?,
            config: config.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List matching files as corpus-relative paths, sorted.
    pub fn discover(&self) -> LoadResult<Vec<PathBuf>> {
        self.walk().map(|(files, _)| files)
    }

    /// Walk the corpus root. Entries the walker cannot read are returned as
    /// skipped; only a failure on the root itself is an error.
    fn walk(&self) -> LoadResult<(Vec<PathBuf>, Vec<SkippedFile>)> {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    let path = e
                        .path()
                        .and_then(|p| p.strip_prefix(&self.root).ok())
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    tracing::warn!(target: "loader", "skipping {}: {e}", path.display());
                    skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = to_corpus_path(relative);
            let included = self
                .include
                .iter()
                .any(|p| p.matches_with(&key, options));
            let excluded = self
                .exclude
                .iter()
                .any(|p| p.matches_with(&key, options));
            if included && !excluded {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        tracing::debug!(target: "loader", "discovered {} files under {}", files.len(), self.root.display());
        Ok((files, skipped))
    }

    /// Load every matching file, skipping the ones that fail.
    ///
    /// `limit` truncates the sorted file list before loading.
    pub fn load_all(&self, limit: Option<usize>) -> LoadResult<LoadReport> {
        let (mut files, skipped) = self.walk()?;
        if let Some(limit) = limit {
            files.truncate(limit);
        }

        let results: Vec<(PathBuf, LoadResult<Document>)> = files
            .into_par_iter()
            .map(|rel| {
                let result = self.load_file(&rel);
                (rel, result)
            })
            .collect();

        let mut report = LoadReport {
            documents: Vec::new(),
            skipped,
        };
        for (rel, result) in results {
            match result {
                Ok(doc) => report.documents.push(doc),
                Err(e) if e.is_per_file() => {
                    tracing::warn!(target: "loader", "skipping {}: {e}", rel.display());
                    report.skipped.push(SkippedFile {
                        path: rel,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            target: "loader",
            "loaded {} documents ({} skipped)",
            report.documents.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Read and parse a single corpus-relative file.
    pub fn load_file(&self, relative: &Path) -> LoadResult<Document> {
        let full = self.root.join(relative);
        let bytes = std::fs::read(&full).map_err(|source| LoadError::Io {
            path: relative.to_path_buf(),
            source,
        })?;
        let content = std::str::from_utf8(&bytes).map_err(|_| LoadError::Encoding {
            path: relative.to_path_buf(),
        })?;

        let mut doc = self.parse(&to_corpus_path(relative), content)?;
        doc.content_hash = content_hash(&bytes);
        Ok(doc)
    }

    /// Build a [`Document`] from file contents.
    ///
    /// `path` is the corpus-relative path with `/` separators. The content hash
    /// is computed over `content`.
    pub fn parse(&self, path: &str, content: &str) -> LoadResult<Document> {
        let (matter, body) =
            frontmatter::split(content).map_err(|source| LoadError::FrontMatter {
                path: PathBuf::from(path),
                source,
            })?;

        let language = matter
            .language
            .as_deref()
            .map(normalize_language)
            .filter(|code| !code.is_empty())
            .or_else(|| language_from_path(path))
            .unwrap_or_else(|| normalize_language(&self.config.default_language));

        let module = matter
            .module
            .as_ref()
            .map(module_from_scalar)
            .or_else(|| module_from_path(path))
            .unwrap_or_else(|| self.config.default_module.clone());

        let title = matter.title.clone().unwrap_or_else(|| file_stem(path));
        let translation = translation_info(&matter, &language, path);

        Ok(Document {
            path: path.to_string(),
            title,
            url_path: url_path(path),
            language,
            module,
            heading_tree: parse_headings(body),
            raw_text: body.to_string(),
            translation,
            content_hash: content_hash(content.as_bytes()),
        })
    }
}

fn compile_patterns(patterns: &[String]) -> LoadResult<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| LoadError::InvalidPattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn to_corpus_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// `i18n/<lang>/...` anywhere in the path names the language.
fn language_from_path(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    segments
        .windows(2)
        .find(|w| w[0] == "i18n" && !w[1].is_empty())
        .map(|w| normalize_language(w[1]))
}

fn module_from_path(path: &str) -> Option<String> {
    module_re()
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| format!("module-{}", m.as_str()))
}

fn module_from_scalar(value: &Scalar) -> String {
    let text = value.to_text();
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        format!("module-{text}")
    } else {
        text
    }
}

fn file_stem(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(i) if i > 0 => name[..i].to_string(),
        _ => name.to_string(),
    }
}

/// Routing path: drop the i18n prefix, the extension and a trailing `index`.
fn url_path(path: &str) -> String {
    let mut rest = path;
    if let Some(i) = rest.find("i18n/") {
        let after = &rest[i + "i18n/".len()..];
        rest = after.split_once('/').map_or("", |(_, tail)| tail);
        if let Some(tail) = rest.strip_prefix(DOCUSAURUS_DOCS_DIR) {
            rest = tail.trim_start_matches('/');
        }
    }

    let without_ext = match rest.rfind('.') {
        Some(i) if !rest[i..].contains('/') => &rest[..i],
        _ => rest,
    };

    let trimmed = without_ext
        .strip_suffix("/index")
        .unwrap_or(without_ext);
    if trimmed == "index" {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn translation_info(matter: &FrontMatter, language: &str, path: &str) -> TranslationInfo {
    let original_language = matter
        .original_language
        .as_deref()
        .map(normalize_language)
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| language.to_string());

    let source = matter.translation_source.unwrap_or_else(|| {
        if original_language != language || language_from_path(path).is_some() {
            TranslationSource::Human
        } else {
            TranslationSource::Original
        }
    });

    TranslationInfo {
        original_language,
        source,
        quality: matter.translation_quality,
    }
}

/// Parse ATX headings, ignoring markers inside fenced code blocks.
pub fn parse_headings(body: &str) -> Vec<HeadingSpan> {
    let mut headings = Vec::new();
    let mut fence: Option<&str> = None;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let content = line.trim_end_matches(['\n', '\r']);
        let indent = content.len() - content.trim_start_matches(' ').len();
        if indent > 3 {
            continue;
        }
        let trimmed = &content[indent..];

        if let Some(open) = fence {
            if trimmed.starts_with(open) {
                fence = None;
            }
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            continue;
        }

        let level = trimmed.bytes().take_while(|b| *b == b'#').count();
        if level == 0 || level > 6 {
            continue;
        }
        let rest = &trimmed[level..];
        if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
            continue;
        }

        let text = rest.trim().trim_end_matches('#').trim_end();
        if text.is_empty() {
            continue;
        }

        headings.push(HeadingSpan {
            level: level as u8,
            text: text.to_string(),
            start,
            end: offset,
        });
    }

    headings
}
