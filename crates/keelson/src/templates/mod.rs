//! Template application: materializes a template's section prototypes onto
//! an already-existing target entity. Implicit apply at entity-creation
//! time is handled directly by [`crate::store::sled_store::SledStore`]
//! (there is no pre-existing content to reconcile against there); this
//! module is the explicit `apply_template` tool operation, which must
//! reconcile against whatever sections the target already has.

use crate::domain::{EntityType, NewSection, SectionFilter, SectionUpdate, Template};
use crate::error::{Error, Result, TemplateError};
use crate::id::EntityId;
use crate::store::{EntityStore, Outcome};
use std::collections::HashMap;

/// How `apply` resolves a case-insensitive title collision with a section
/// already on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// Leave the existing section untouched, drop the prototype.
    #[default]
    SkipDuplicate,
    /// Replace the existing section's content/metadata in place.
    Overwrite,
    /// Fail the whole apply.
    Error,
}

struct PlannedWrite {
    new_section: NewSection,
    overwrite_id: Option<EntityId>,
}

/// Materialize `template_ids`' section prototypes, in order, onto
/// `(target_type, target_id)`. Validates all prototypes before writing any
/// of them, so a failure partway through never leaves a partial apply.
///
/// # Errors
///
/// Returns [`TemplateError::NotFound`] for an unknown template id,
/// [`TemplateError::TypeMismatch`] if a template doesn't target
/// `target_type`, [`TemplateError::InvalidSection`] for an empty prototype
/// title, or [`TemplateError::DuplicateTitle`] under `mode = Error`.
pub async fn apply(
    store: &dyn EntityStore,
    template_ids: &[EntityId],
    target_type: EntityType,
    target_id: EntityId,
    mode: ApplyMode,
) -> Result<Vec<crate::domain::Section>> {
    let mut templates: Vec<Template> = Vec::with_capacity(template_ids.len());
    for id in template_ids {
        let template = store
            .get_template(*id)
            .await?
            .ok_or(TemplateError::NotFound(*id))?;
        if template.target_entity_type != target_type {
            return Err(TemplateError::TypeMismatch {
                template: *id,
                expected: format!("{:?}", template.target_entity_type),
                actual: format!("{target_type:?}"),
            }
            .into());
        }
        templates.push(template);
    }

    let existing = store
        .list_sections(target_type, target_id, &SectionFilter::default())
        .await?;
    let mut titles: HashMap<String, EntityId> = existing
        .iter()
        .map(|s| (s.title.to_lowercase(), s.id))
        .collect();
    let mut next_ordinal = existing.iter().map(|s| s.ordinal).max().map_or(0, |m| m + 1);

    let mut planned = Vec::new();
    for template in &templates {
        for proto in &template.sections {
            if proto.title.trim().is_empty() {
                return Err(TemplateError::InvalidSection("title cannot be empty".to_string()).into());
            }
            let key = proto.title.to_lowercase();
            let overwrite_id = titles.get(&key).copied();
            if let Some(existing_id) = overwrite_id {
                match mode {
                    ApplyMode::SkipDuplicate => continue,
                    ApplyMode::Error => {
                        return Err(TemplateError::DuplicateTitle {
                            title: proto.title.clone(),
                        }
                        .into())
                    }
                    ApplyMode::Overwrite => {
                        planned.push(PlannedWrite {
                            new_section: NewSection {
                                entity_type: target_type,
                                entity_id: target_id,
                                title: proto.title.clone(),
                                usage_description: proto.usage_description.clone(),
                                content: proto.content.clone(),
                                content_format: proto.content_format,
                                ordinal: None,
                                tags: proto.tags.clone(),
                            },
                            overwrite_id: Some(existing_id),
                        });
                        continue;
                    }
                }
            }
            // Reserve the title against later prototypes in this same
            // apply call, so two templates proposing the same title don't
            // both get written.
            titles.insert(key, EntityId::new());
            planned.push(PlannedWrite {
                new_section: NewSection {
                    entity_type: target_type,
                    entity_id: target_id,
                    title: proto.title.clone(),
                    usage_description: proto.usage_description.clone(),
                    content: proto.content.clone(),
                    content_format: proto.content_format,
                    ordinal: Some(next_ordinal),
                    tags: proto.tags.clone(),
                },
                overwrite_id: None,
            });
            next_ordinal += 1;
        }
    }

    let mut written = Vec::with_capacity(planned.len());
    for plan in planned {
        let section = if let Some(id) = plan.overwrite_id {
            let update = SectionUpdate {
                title: Some(plan.new_section.title),
                usage_description: Some(plan.new_section.usage_description),
                content: Some(plan.new_section.content),
                content_format: Some(plan.new_section.content_format),
                tags: Some(plan.new_section.tags),
            };
            match store.update_section(id, update).await {
                Outcome::Success(s) => s,
                Outcome::Error(kind, msg) => return Err(store_error_to_core(kind, msg)),
            }
        } else {
            match store.add_section(plan.new_section).await {
                Outcome::Success(s) => s,
                Outcome::Error(kind, msg) => return Err(store_error_to_core(kind, msg)),
            }
        };
        written.push(section);
    }
    Ok(written)
}

fn store_error_to_core(kind: crate::error::ErrorKind, msg: String) -> Error {
    use crate::error::{ErrorKind, StoreError};
    match kind {
        ErrorKind::ConflictError => StoreError::Conflict(msg).into(),
        ErrorKind::NotFound | ErrorKind::ValidationError | ErrorKind::DatabaseError | ErrorKind::UnknownError => {
            StoreError::Validation(msg).into()
        }
    }
}
