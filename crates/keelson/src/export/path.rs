//! Filesystem path sanitization and hierarchical path resolution for the
//! exported vault.

use crate::domain::{EntityType, Status};
use std::path::PathBuf;

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const MAX_COMPONENT_LEN: usize = 200;

/// Sanitize a single path component: strip filesystem-hostile characters,
/// trim leading/trailing dots and spaces, cap length, fall back to
/// `_unnamed` for an empty result, and underscore-prefix Windows-reserved
/// device names (matched case-insensitively, including the `NAME.ext` form).
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    cleaned = cleaned.trim_matches(|c: char| c == '.' || c == ' ').to_string();

    if cleaned.len() > MAX_COMPONENT_LEN {
        let mut truncated = cleaned.as_str();
        while !truncated.is_char_boundary(MAX_COMPONENT_LEN.min(truncated.len())) {
            truncated = &truncated[..truncated.len() - 1];
        }
        cleaned = truncated.chars().take(MAX_COMPONENT_LEN).collect();
    }

    if cleaned.is_empty() {
        return "_unnamed".to_string();
    }

    let stem = cleaned.split('.').next().unwrap_or(&cleaned);
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        cleaned = format!("_{cleaned}");
    }

    cleaned
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn status_subfolder(status: &Status) -> Option<&'static str> {
    let normalized = normalize(status.as_str());
    match normalized.as_str() {
        "completed" | "done" => Some("Completed"),
        "cancelled" | "canceled" => Some("Cancelled"),
        "deferred" => Some("Deferred"),
        "archived" => Some("Archived"),
        _ => None,
    }
}

/// Resolve an entity's path within the vault root, given its kind, name,
/// status, and the already-resolved paths of its ancestors (outermost
/// first).
///
/// | Entity | Path |
/// |---|---|
/// | Project (active) | `<Project>/_project.md` |
/// | Feature (active, in project) | `<Project>/<Feature>/_feature.md` |
/// | Feature (active, unassigned) | `<Feature>/_feature.md` |
/// | Task (active) | `<Project?>/<Feature?>/<Task>.md` |
///
/// A project/feature directory is present only when that container exists;
/// an orphaned Feature or Task has no stand-in directory, it simply lands
/// one level shallower. A terminal status inserts a per-status subfolder
/// segment immediately before the file itself.
#[must_use]
pub fn resolve_path(
    vault_root: &std::path::Path,
    entity_type: EntityType,
    name: &str,
    status: &Status,
    project_name: Option<&str>,
    feature_name: Option<&str>,
) -> PathBuf {
    let mut path = vault_root.to_path_buf();
    let sanitized_name = sanitize_component(name);

    match entity_type {
        EntityType::Project => {
            path.push(&sanitized_name);
            if let Some(sub) = status_subfolder(status) {
                path.push(sub);
            }
            path.push("_project.md");
        }
        EntityType::Feature => {
            if let Some(p) = project_name {
                path.push(sanitize_component(p));
            }
            path.push(&sanitized_name);
            if let Some(sub) = status_subfolder(status) {
                path.push(sub);
            }
            path.push("_feature.md");
        }
        EntityType::Task => {
            if let Some(p) = project_name {
                path.push(sanitize_component(p));
            }
            if let Some(f) = feature_name {
                path.push(sanitize_component(f));
            }
            if let Some(sub) = status_subfolder(status) {
                path.push(sub);
            }
            path.push(format!("{sanitized_name}.md"));
        }
        EntityType::Template => {
            path.push("_templates");
            path.push(format!("{sanitized_name}.md"));
        }
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_hostile_characters() {
        assert_eq!(sanitize_component("a/b\\c:d*e?f\"g<h>i|j"), "abcdefghij");
    }

    #[test]
    fn sanitize_trims_leading_and_trailing_dots_and_spaces() {
        assert_eq!(sanitize_component("  ..name..  "), "name");
    }

    #[test]
    fn sanitize_falls_back_to_unnamed() {
        assert_eq!(sanitize_component("   ..   "), "_unnamed");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_component(&long).len(), MAX_COMPONENT_LEN);
    }

    #[test]
    fn sanitize_escapes_reserved_device_names_case_insensitively() {
        assert_eq!(sanitize_component("con"), "_con");
        assert_eq!(sanitize_component("CON"), "_CON");
        assert_eq!(sanitize_component("con.txt"), "_con.txt");
        assert_eq!(sanitize_component("LPT1"), "_LPT1");
        assert_eq!(sanitize_component("construction"), "construction");
    }

    #[test]
    fn resolve_path_routes_completed_task_into_subfolder() {
        let root = std::path::Path::new("/vault");
        let path = resolve_path(
            root,
            EntityType::Task,
            "Fix bug",
            &Status::new("completed"),
            Some("Demo"),
            Some("Core"),
        );
        assert_eq!(path, PathBuf::from("/vault/Demo/Core/Completed/Fix bug.md"));
    }

    #[test]
    fn resolve_path_places_orphan_task_directly_under_root() {
        let root = std::path::Path::new("/vault");
        let path = resolve_path(
            root,
            EntityType::Task,
            "Loose end",
            &Status::new("open"),
            None,
            None,
        );
        assert_eq!(path, PathBuf::from("/vault/Loose end.md"));
    }

    #[test]
    fn resolve_path_project_uses_fixed_project_filename() {
        let root = std::path::Path::new("/vault");
        let path =
            resolve_path(root, EntityType::Project, "omega", &Status::new("open"), None, None);
        assert_eq!(path, PathBuf::from("/vault/omega/_project.md"));
    }

    #[test]
    fn resolve_path_feature_in_project_uses_fixed_feature_filename() {
        let root = std::path::Path::new("/vault");
        let path = resolve_path(
            root,
            EntityType::Feature,
            "auth",
            &Status::new("open"),
            Some("omega"),
            None,
        );
        assert_eq!(path, PathBuf::from("/vault/omega/auth/_feature.md"));
    }

    #[test]
    fn resolve_path_unassigned_feature_has_no_wrapper_directory() {
        let root = std::path::Path::new("/vault");
        let path = resolve_path(
            root,
            EntityType::Feature,
            "auth",
            &Status::new("open"),
            None,
            None,
        );
        assert_eq!(path, PathBuf::from("/vault/auth/_feature.md"));
    }

    #[test]
    fn resolve_path_task_in_project_and_feature_nests_under_both() {
        let root = std::path::Path::new("/vault");
        let path = resolve_path(
            root,
            EntityType::Task,
            "login",
            &Status::new("open"),
            Some("omega"),
            Some("auth"),
        );
        assert_eq!(path, PathBuf::from("/vault/omega/auth/login.md"));
    }
}
