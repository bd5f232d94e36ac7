//! Image pinning for kustomization documents.
//!
//! The document is kept as its original lines so that everything outside the
//! pinned entry survives byte-for-byte, including comments and formatting.
//! Only the top-level `images:` section is parsed, into entries whose fields
//! are located by key. Declared names are compared as exact strings, never
//! interpolated into patterns, so `foo.bar` can never match `foobar`.
//!
//! ```yaml
//! images:
//! - name: registry.example.com/platform/api
//!   newName: registry.example.com/platform/api
//!   newTag: v1.4.0-2-g1a2b3c4
//! ```

use deckhand_core::ImageReference;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::{ConfigError, ConfigResult};

static HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^images:[ \t]*(\[[ \t]*\])?[ \t]*(?:#.*)?$").unwrap());

static ITEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( *)-(?:[ \t]+(.*))?$").unwrap());

static FIELD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)[ \t]*:(?:[ \t]+(.*))?$").unwrap());

// YAML 1.1 and 1.2 numeric forms a plain tag could be read back as
static YAML_NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[-+]?(?:0[xX][0-9A-Fa-f_]+|0[oO]?[0-7_]+|0[bB][01_]+|[0-9][0-9_]*(?:\.[0-9_]*)?(?:[eE][-+]?[0-9]+)?|\.[0-9_]+(?:[eE][-+]?[0-9]+)?|\.(?:inf|Inf|INF|nan|NaN|NAN))$",
    )
    .unwrap()
});

/// How a pin was applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchCase {
    /// An entry for the declared name existed and was updated in place.
    UpdatedEntry,
    /// The `images:` section existed without the entry; one was inserted.
    InsertedEntry,
    /// The document had no `images:` section; one was appended.
    AppendedSection,
}

/// Result of pinning a document on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    pub case: PatchCase,
    /// Whether the document's bytes changed. Unchanged documents are not rewritten.
    pub changed: bool,
}

/// One item of the `images:` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePinEntry {
    pub declared_name: String,
    pub resolved_name: Option<String>,
    pub resolved_tag: Option<String>,
}

/// A kustomization document as an ordered sequence of lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<String>,
    trailing_newline: bool,
}

#[derive(Debug)]
struct ImageSection {
    header: usize,
    empty_flow: bool,
    entries: Vec<EntrySpan>,
}

#[derive(Debug)]
struct EntrySpan {
    /// Line range of the entry, excluding trailing blank and comment lines.
    lines: Range<usize>,
    dash_indent: usize,
    /// Column at which the entry's keys start.
    key_indent: Option<usize>,
    name: Option<(usize, String)>,
    new_name: Option<(usize, String)>,
    new_tag: Option<(usize, String)>,
    digest: Option<usize>,
}

impl EntrySpan {
    fn new(start: usize, dash_indent: usize) -> Self {
        Self {
            lines: start..start + 1,
            dash_indent,
            key_indent: None,
            name: None,
            new_name: None,
            new_tag: None,
            digest: None,
        }
    }

    fn read_field(&mut self, line: usize, content: &str) {
        let Some(caps) = FIELD_REGEX.captures(content) else {
            return;
        };
        let value = || scalar_value(caps.get(2).map(|m| m.as_str()).unwrap_or_default());
        match &caps[1] {
            "name" => self.name = Some((line, value())),
            "newName" => self.new_name = Some((line, value())),
            "newTag" => self.new_tag = Some((line, value())),
            "digest" => self.digest = Some(line),
            _ => {}
        }
    }

    fn key_indent(&self) -> usize {
        self.key_indent.unwrap_or(self.dash_indent + 2)
    }
}

/// Line edits collected against the original line indices, applied in one pass.
#[derive(Default)]
struct Edits {
    replace: HashMap<usize, String>,
    insert_after: HashMap<usize, Vec<String>>,
    remove: Vec<Range<usize>>,
}

impl Edits {
    fn apply(mut self, lines: Vec<String>) -> Vec<String> {
        let mut out = Vec::with_capacity(lines.len() + 3);
        for (i, line) in lines.into_iter().enumerate() {
            if self.remove.iter().any(|range| range.contains(&i)) {
                continue;
            }
            out.push(self.replace.remove(&i).unwrap_or(line));
            if let Some(extra) = self.insert_after.remove(&i) {
                out.extend(extra);
            }
        }
        out
    }
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self {
                lines: Vec::new(),
                trailing_newline: false,
            };
        }
        let body = text.strip_suffix('\n').unwrap_or(text);
        Self {
            lines: body.split('\n').map(String::from).collect(),
            trailing_newline: text.ends_with('\n'),
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    /// Entries of the `images:` section that carry a `name`.
    pub fn image_pins(&self) -> Vec<ImagePinEntry> {
        let Some(section) = self.image_section() else {
            return Vec::new();
        };
        section
            .entries
            .into_iter()
            .filter_map(|entry| {
                Some(ImagePinEntry {
                    declared_name: entry.name?.1,
                    resolved_name: entry.new_name.map(|(_, v)| v),
                    resolved_tag: entry.new_tag.map(|(_, v)| v),
                })
            })
            .collect()
    }

    /// Pin `image` under its own name as the declared name.
    ///
    /// Applying the same reference twice leaves the document unchanged.
    pub fn pin(&mut self, image: &ImageReference) -> PatchCase {
        let eol = self.line_ending();

        let Some(section) = self.image_section() else {
            if !self.trailing_newline {
                if let Some(last) = self.lines.last_mut() {
                    if !last.ends_with(eol) {
                        last.push_str(eol);
                    }
                }
            }
            self.lines.push(format!("images:{eol}"));
            self.lines.extend(entry_lines(image, 0, 2, eol));
            self.trailing_newline = true;
            return PatchCase::AppendedSection;
        };

        let mut edits = Edits::default();
        if section.empty_flow {
            edits.replace.insert(section.header, format!("images:{eol}"));
        }

        let mut matching = section
            .entries
            .iter()
            .filter(|entry| matches!(&entry.name, Some((_, name)) if name == image.name()));

        let case = match matching.next() {
            None => {
                let (dash_indent, key_indent) = section
                    .entries
                    .first()
                    .map(|entry| (entry.dash_indent, entry.key_indent()))
                    .unwrap_or((0, 2));
                edits.insert_after.insert(
                    section.header,
                    entry_lines(image, dash_indent, key_indent, eol),
                );
                PatchCase::InsertedEntry
            }
            Some(entry) => {
                self.update_entry(entry, image, eol, &mut edits);
                for duplicate in matching {
                    debug!(name = %image.name(), line = duplicate.lines.start + 1, "Removing duplicate image entry");
                    edits.remove.push(duplicate.lines.clone());
                }
                PatchCase::UpdatedEntry
            }
        };

        self.lines = edits.apply(std::mem::take(&mut self.lines));
        case
    }

    fn update_entry(&self, entry: &EntrySpan, image: &ImageReference, eol: &str, edits: &mut Edits) {
        let key_indent = entry.key_indent();
        let mut missing = Vec::new();

        for (key, current, wanted) in [
            ("newName", &entry.new_name, image.name()),
            ("newTag", &entry.new_tag, image.tag()),
        ] {
            match current {
                Some((_, value)) if value == wanted => {}
                Some((line, _)) => {
                    let prefix = &self.text(*line)[..key_indent];
                    edits.replace.insert(
                        *line,
                        format!("{prefix}{key}: {}{eol}", yaml_scalar(wanted)),
                    );
                }
                None => missing.push(format!(
                    "{}{key}: {}{eol}",
                    " ".repeat(key_indent),
                    yaml_scalar(wanted)
                )),
            }
        }

        // A digest overrides newTag in kustomize, which would silently defeat the pin.
        if let Some(line) = entry.digest.filter(|line| *line != entry.lines.start) {
            edits.remove.push(line..line + 1);
        }

        if !missing.is_empty() {
            if let Some((name_line, _)) = &entry.name {
                edits.insert_after.insert(*name_line, missing);
            }
        }
    }

    fn image_section(&self) -> Option<ImageSection> {
        let header = (0..self.lines.len()).find(|&i| HEADER_REGEX.is_match(self.text(i)))?;
        let empty_flow = HEADER_REGEX
            .captures(self.text(header))
            .and_then(|caps| caps.get(1))
            .is_some();

        let mut end = header + 1;
        for i in header + 1..self.lines.len() {
            let line = self.text(i);
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with("---") || !line.starts_with([' ', '\t', '-']) {
                break;
            }
            end = i + 1;
        }

        let entries = if empty_flow {
            Vec::new()
        } else {
            self.parse_entries(header + 1..end)
        };

        Some(ImageSection {
            header,
            empty_flow,
            entries,
        })
    }

    fn parse_entries(&self, body: Range<usize>) -> Vec<EntrySpan> {
        let mut entries: Vec<EntrySpan> = Vec::new();
        let mut dash_indent = None;

        for i in body.clone() {
            let line = self.text(i);

            if let Some(caps) = ITEM_REGEX.captures(line) {
                let indent = caps[1].len();
                let item_indent = *dash_indent.get_or_insert(indent);
                if indent == item_indent {
                    if let Some(last) = entries.last_mut() {
                        last.lines.end = self.content_end(last.lines.start, i);
                    }
                    let mut entry = EntrySpan::new(i, indent);
                    if let Some(rest) = caps.get(2) {
                        entry.key_indent = Some(rest.start());
                        entry.read_field(i, rest.as_str());
                    }
                    entries.push(entry);
                    continue;
                }
            }

            let Some(entry) = entries.last_mut() else {
                continue;
            };
            let content = line.trim_start_matches(' ');
            if content.is_empty() || content.starts_with('#') {
                continue;
            }
            let indent = line.len() - content.len();
            match entry.key_indent {
                None if indent > entry.dash_indent => {
                    entry.key_indent = Some(indent);
                    entry.read_field(i, content);
                }
                Some(key_indent) if key_indent == indent => entry.read_field(i, content),
                _ => {}
            }
        }

        if let Some(last) = entries.last_mut() {
            last.lines.end = body.end;
        }
        entries
    }

    /// One past the last line in `start..next` that is neither blank nor a comment.
    fn content_end(&self, start: usize, next: usize) -> usize {
        (start + 1..next)
            .rev()
            .find(|&i| {
                let trimmed = self.text(i).trim();
                !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .map(|i| i + 1)
            .unwrap_or(start + 1)
    }

    /// Line content without a carriage return.
    fn text(&self, i: usize) -> &str {
        let line = &self.lines[i];
        line.strip_suffix('\r').unwrap_or(line)
    }

    fn line_ending(&self) -> &'static str {
        match self.lines.first() {
            Some(line) if line.ends_with('\r') => "\r",
            _ => "",
        }
    }
}

fn entry_lines(image: &ImageReference, dash_indent: usize, key_indent: usize, eol: &str) -> Vec<String> {
    let dash = format!("{}-", " ".repeat(dash_indent));
    let gap = " ".repeat(key_indent.saturating_sub(dash.len()).max(1));
    let pad = " ".repeat(dash.len() + gap.len());
    vec![
        format!("{dash}{gap}name: {}{eol}", yaml_scalar(image.name())),
        format!("{pad}newName: {}{eol}", yaml_scalar(image.name())),
        format!("{pad}newTag: {}{eol}", yaml_scalar(image.tag())),
    ]
}

/// Plain scalar value of a field, without quotes or a trailing comment.
fn scalar_value(raw: &str) -> String {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = raw.strip_prefix(quote) {
            if let Some(end) = inner.find(quote) {
                return inner[..end].to_string();
            }
        }
    }
    let value = match raw.find(" #") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    value.trim().to_string()
}

/// Render a value so YAML reads it back as a string (`1.10` must stay a tag).
fn yaml_scalar(value: &str) -> String {
    let ambiguous = value.parse::<f64>().is_ok()
        || YAML_NUMBER_REGEX.is_match(value)
        || matches!(
            value.to_ascii_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "on" | "off" | "null" | "~"
        );
    if ambiguous {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Pin `image` into the kustomization at `path`, writing atomically.
pub fn pin_image(path: &Path, image: &ImageReference) -> ConfigResult<PatchOutcome> {
    let original = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::DocumentNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut document = ConfigDocument::parse(&original);
    let case = document.pin(image);
    let rendered = document.render();

    if rendered == original {
        debug!(path = %path.display(), image = %image, "Image pin already current");
        return Ok(PatchOutcome {
            case,
            changed: false,
        });
    }

    write_atomic(path, &rendered)?;
    info!(path = %path.display(), image = %image, ?case, "Pinned image");

    Ok(PatchOutcome {
        case,
        changed: true,
    })
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &str) -> ConfigResult<()> {
    write_atomic_with(path, contents, |_| Ok(()))
}

/// `before_rename` runs once the temp file is fully written; an error from it
/// abandons the write and removes the temp file.
fn write_atomic_with(
    path: &Path,
    contents: &str,
    before_rename: impl FnOnce(&Path) -> std::io::Result<()>,
) -> ConfigResult<()> {
    let write_failed = |source: std::io::Error| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".deckhand-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_failed)?;

    tmp.write_all(contents.as_bytes()).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;

    if let Ok(metadata) = std::fs::metadata(path) {
        std::fs::set_permissions(tmp.path(), metadata.permissions()).map_err(write_failed)?;
    }

    before_rename(tmp.path()).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}
