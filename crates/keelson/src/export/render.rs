//! Markdown rendering: YAML front matter, content-format dispatch, header
//! normalization, fence re-escaping, and status tables.

use crate::domain::{ContentFormat, EntityType, Priority, Section, Status, Tags};
use crate::id::EntityId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything [`render_document`] needs to know about one entity.
pub struct RenderInput<'a> {
    /// Entity id.
    pub id: EntityId,
    /// Entity kind.
    pub entity_type: EntityType,
    /// Project/feature name or task title.
    pub name: &'a str,
    /// Summary, rendered as the document's lead paragraph.
    pub summary: &'a str,
    /// Current status.
    pub status: &'a Status,
    /// Priority, when the entity kind carries one (features, tasks).
    pub priority: Option<Priority>,
    /// Owning project, if any.
    pub project_id: Option<EntityId>,
    /// Owning feature, if any (tasks only).
    pub feature_id: Option<EntityId>,
    /// Tags.
    pub tags: &'a Tags,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub modified_at: DateTime<Utc>,
    /// Owned sections, already in ascending ordinal order.
    pub sections: &'a [Section],
}

#[derive(Serialize)]
struct FrontMatter {
    id: String,
    #[serde(rename = "type")]
    entity_type: &'static str,
    name: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "projectId")]
    project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "featureId")]
    feature_id: Option<String>,
    tags: Vec<String>,
    created: String,
    modified: String,
}

fn entity_type_label(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Project => "project",
        EntityType::Feature => "feature",
        EntityType::Task => "task",
        EntityType::Template => "template",
    }
}

/// Render the full Markdown document for one entity. `status_table` is a
/// pre-rendered Markdown table (see [`render_status_table`]), included
/// after the summary for Projects and Features.
#[must_use]
pub fn render_document(input: &RenderInput<'_>, status_table: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    let front_matter = FrontMatter {
        id: input.id.to_string(),
        entity_type: entity_type_label(input.entity_type),
        name: input.name.to_string(),
        status: input.status.to_string(),
        priority: input.priority.map(Priority::as_lowercase),
        project_id: input.project_id.map(|id| id.to_string()),
        feature_id: input.feature_id.map(|id| id.to_string()),
        tags: input.tags.iter().map(str::to_string).collect(),
        created: input.created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        modified: input.modified_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    };
    out.push_str(
        &serde_yaml::to_string(&front_matter).unwrap_or_else(|_| String::new()),
    );
    out.push_str("---\n\n");
    out.push_str(&format!("# {}\n\n", input.name));
    out.push_str(input.summary);
    out.push('\n');

    if let Some(table) = status_table {
        out.push_str("\n");
        out.push_str(table);
    }

    for section in input.sections {
        out.push_str(&format!("\n## {}\n\n", section.title));
        out.push_str(&render_content(section));
        out.push('\n');
    }
    out
}

/// Render one section's content per its [`ContentFormat`].
#[must_use]
pub fn render_content(section: &Section) -> String {
    match section.content_format {
        ContentFormat::Markdown => escape_nested_markdown_fences(&normalize_headers(&section.content)),
        ContentFormat::PlainText => section.content.clone(),
        ContentFormat::Json => format!("```json\n{}\n```", section.content.trim_end()),
        ContentFormat::Code => {
            let lang = infer_code_language(&section.title, section.tags.iter());
            format!("```{lang}\n{}\n```", section.content.trim_end())
        }
    }
}

const CODE_LEXICON: &[&str] = &[
    "kotlin", "java", "python", "js", "ts", "bash", "sql", "json", "yaml", "xml", "md",
    "dockerfile", "go", "rust", "cpp", "csharp", "ruby", "php",
];

/// Infer a fence language tag from a section's title and tags against the
/// fixed lexicon, falling back to `"text"` when nothing matches.
#[must_use]
pub fn infer_code_language<'a>(title: &str, tags: impl Iterator<Item = &'a str>) -> &'static str {
    let haystacks = std::iter::once(title).chain(tags).collect::<Vec<_>>();
    for candidate in CODE_LEXICON {
        if haystacks.iter().any(|h| h.to_lowercase().contains(candidate)) {
            return candidate;
        }
    }
    "text"
}

/// Pull any header more than one level deeper than its predecessor back to
/// `previous + 1`, so a Section's internal Markdown never produces a
/// heading hierarchy discontinuous with the document's `##` section title.
#[must_use]
pub fn normalize_headers(markdown: &str) -> String {
    let mut previous_level: u32 = 2; // sections start under a level-2 `##` heading
    let mut out = String::with_capacity(markdown.len());
    for line in markdown.lines() {
        let trimmed = line.trim_start();
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if hashes > 0 && trimmed.as_bytes().get(hashes) == Some(&b' ') {
            let level = hashes as u32;
            let normalized_level = if level > previous_level + 1 {
                previous_level + 1
            } else {
                level
            };
            out.push_str(&"#".repeat(normalized_level as usize));
            out.push_str(&trimmed[hashes..]);
            previous_level = normalized_level;
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out.pop();
    out
}

/// Re-escape any nested triple-backtick fence tagged `markdown` to a
/// four-backtick fence, so it cannot prematurely close the section's own
/// enclosing fence when the rendered document is itself viewed as Markdown.
#[must_use]
pub fn escape_nested_markdown_fences(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut in_nested = false;
    for line in markdown.lines() {
        let trimmed = line.trim_start();
        if !in_nested && trimmed.starts_with("```markdown") {
            out.push_str(&line.replacen("```markdown", "````markdown", 1));
            in_nested = true;
        } else if in_nested && trimmed == "```" {
            out.push_str(&line.replacen("```", "````", 1));
            in_nested = false;
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out.pop();
    out
}

/// One row of a status table: the child's name, status, priority, and
/// whether it is terminal (used only for grouping, not rendered).
pub struct StatusTableRow {
    /// Child entity id.
    pub id: EntityId,
    /// Child name/title.
    pub name: String,
    /// Child status.
    pub status: Status,
    /// Child priority.
    pub priority: Priority,
}

/// Which subtable a child belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGroup {
    /// In-flight work.
    Active,
    /// Successfully finished.
    Completed,
    /// Cancelled, deferred, or archived (the caller picks the label).
    Other,
}

/// Render a two/three-way grouped status table. `other_label` names the
/// third group (`"Cancelled or Deferred"` for Features, `"Archived"` for
/// Projects).
#[must_use]
pub fn render_status_table(
    rows: &[(StatusTableRow, StatusGroup)],
    other_label: &str,
) -> String {
    let mut out = String::new();
    for (label, group) in [
        ("Active", StatusGroup::Active),
        ("Completed", StatusGroup::Completed),
        (other_label, StatusGroup::Other),
    ] {
        let mut matching: Vec<&StatusTableRow> = rows
            .iter()
            .filter(|(_, g)| *g == group)
            .map(|(r, _)| r)
            .collect();
        if matching.is_empty() {
            continue;
        }
        matching.sort_by_key(|r| r.priority);
        out.push_str(&format!("### {label}\n\n"));
        out.push_str("| Name | Status | Priority |\n|---|---|---|\n");
        for row in matching {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                row.name,
                row.status,
                row.priority.as_lowercase()
            ));
        }
        out.push('\n');
    }
    out
}
