//! Template variable resolution for question text.
//!
//! Two placeholder syntaxes:
//! - `#{{<id>}}` resolves to the matrix template variable's value; unknown
//!   ids log a warning and are left in place.
//! - `@{{LEFT}}`, `@{{RIGHT}}`, `@{{DOCUMENT}}` resolve to `"Document {id}"`
//!   from the cell's entity refs by role. Member labels never override this.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info, warn};

use cellgrid_core::model::EntityRole;
use cellgrid_core::store::Store;

use crate::error::MatrixResult;
use crate::strategies::CellDocument;

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#\{\{(\d+)\}\}").expect("pattern is valid"))
}

fn role_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@\{\{(LEFT|RIGHT|DOCUMENT)\}\}").expect("pattern is valid"))
}

/// Preview of a resolved template.
#[derive(Debug, Clone)]
pub struct TemplatePreview {
    pub original: String,
    pub resolved: String,
    pub variables_used: Vec<i64>,
}

/// Resolution and association sync for ID-based template variables.
#[derive(Clone)]
pub struct TemplateService {
    store: Arc<Store>,
}

impl TemplateService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Template variable ids referenced by `#{{id}}` patterns in the text.
    pub fn extract_template_variable_ids(&self, text: &str) -> BTreeSet<i64> {
        id_pattern()
            .captures_iter(text)
            .filter_map(|c| c[1].parse().ok())
            .collect()
    }

    pub fn has_template_variables(&self, text: &str) -> bool {
        id_pattern().is_match(text)
    }

    /// Replace `#{{id}}` patterns with their values for the matrix.
    pub async fn resolve_template_variables(&self, text: &str, matrix_id: i64) -> String {
        let ids = self.extract_template_variable_ids(text);
        if ids.is_empty() {
            return text.to_string();
        }
        let variables = self.store.template_variables_for_matrix(matrix_id).await;
        let values: HashMap<i64, &str> =
            variables.iter().map(|v| (v.id, v.value.as_str())).collect();

        let mut resolved = text.to_string();
        for id in ids {
            let pattern = format!("#{{{{{id}}}}}");
            match values.get(&id) {
                Some(value) => {
                    resolved = resolved.replace(&pattern, value);
                    debug!(template_variable_id = id, "resolved template variable");
                }
                None => {
                    warn!(
                        template_variable_id = id,
                        matrix_id, "template variable not found in matrix"
                    );
                }
            }
        }
        resolved
    }

    /// Ids referenced by the text that do not exist in the matrix.
    pub async fn missing_template_variables(&self, text: &str, matrix_id: i64) -> Vec<i64> {
        let referenced = self.extract_template_variable_ids(text);
        if referenced.is_empty() {
            return Vec::new();
        }
        let existing: BTreeSet<i64> = self
            .store
            .template_variables_for_matrix(matrix_id)
            .await
            .iter()
            .map(|v| v.id)
            .collect();
        referenced.difference(&existing).copied().collect()
    }

    pub fn has_document_placeholders(&self, text: &str) -> bool {
        role_pattern().is_match(text)
    }

    /// Roles referenced by `@{{ROLE}}` placeholders in the text.
    pub fn extract_document_placeholder_roles(&self, text: &str) -> BTreeSet<EntityRole> {
        role_pattern()
            .captures_iter(text)
            .map(|c| match &c[1] {
                "LEFT" => EntityRole::Left,
                "RIGHT" => EntityRole::Right,
                _ => EntityRole::Document,
            })
            .collect()
    }

    /// Replace role placeholders with `"Document {id}"` using the cell's
    /// documents. A placeholder whose role is absent from the cell is left
    /// in place with a warning.
    pub fn resolve_document_placeholders(
        &self,
        text: &str,
        documents: &[CellDocument],
    ) -> String {
        if !self.has_document_placeholders(text) {
            return text.to_string();
        }
        let by_role: HashMap<EntityRole, i64> = documents
            .iter()
            .map(|d| (d.role, d.document_id))
            .collect();

        let mut resolved = text.to_string();
        for (placeholder, role) in [
            ("@{{LEFT}}", EntityRole::Left),
            ("@{{RIGHT}}", EntityRole::Right),
            ("@{{DOCUMENT}}", EntityRole::Document),
        ] {
            if !resolved.contains(placeholder) {
                continue;
            }
            match by_role.get(&role) {
                Some(document_id) => {
                    resolved = resolved.replace(placeholder, &format!("Document {document_id}"));
                }
                None => {
                    warn!(%role, "placeholder found in text but cell has no ref for role");
                }
            }
        }
        resolved
    }

    /// Sync a question's template variable associations with its text:
    /// restore matching soft-deleted associations, create missing ones, and
    /// soft-delete stale ones. Returns the ids referenced by the new text.
    pub async fn sync_question_template_variables(
        &self,
        question_id: i64,
        question_text: &str,
        company_id: i64,
    ) -> MatrixResult<Vec<i64>> {
        let referenced = self.extract_template_variable_ids(question_text);
        let current = self
            .store
            .question_template_associations(question_id, company_id)
            .await;
        let current_ids: BTreeSet<i64> =
            current.iter().map(|a| a.template_variable_id).collect();

        let to_add: Vec<i64> = referenced.difference(&current_ids).copied().collect();
        let to_remove: Vec<i64> = current_ids.difference(&referenced).copied().collect();
        info!(
            question_id,
            referenced = referenced.len(),
            adding = to_add.len(),
            removing = to_remove.len(),
            "syncing question template variables"
        );

        for template_variable_id in to_add {
            if let Some(existing) = self
                .store
                .find_soft_deleted_association(question_id, template_variable_id, company_id)
                .await
            {
                self.store.set_association_deleted(existing.id, false).await?;
                debug!(question_id, template_variable_id, "restored association");
            } else {
                self.store
                    .insert_question_template_association(
                        question_id,
                        template_variable_id,
                        company_id,
                    )
                    .await;
                debug!(question_id, template_variable_id, "created association");
            }
        }

        for template_variable_id in to_remove {
            if let Some(assoc) = current
                .iter()
                .find(|a| a.template_variable_id == template_variable_id)
            {
                self.store.set_association_deleted(assoc.id, true).await?;
                debug!(question_id, template_variable_id, "soft deleted association");
            }
        }

        Ok(referenced.into_iter().collect())
    }

    pub async fn preview_resolved_text(&self, text: &str, matrix_id: i64) -> TemplatePreview {
        TemplatePreview {
            original: text.to_string(),
            resolved: self.resolve_template_variables(text, matrix_id).await,
            variables_used: self.extract_template_variable_ids(text).into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_ids() {
        let store = Store::new();
        let templates = TemplateService::new(store);
        let ids = templates
            .extract_template_variable_ids("Compare #{{12}} against #{{7}} and #{{12}}");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![7, 12]);
        assert!(templates
            .extract_template_variable_ids("no placeholders here")
            .is_empty());
    }

    #[test]
    fn test_placeholder_roles() {
        let store = Store::new();
        let templates = TemplateService::new(store);
        let roles = templates
            .extract_document_placeholder_roles("Does @{{LEFT}} contradict @{{RIGHT}}?");
        assert!(roles.contains(&EntityRole::Left));
        assert!(roles.contains(&EntityRole::Right));
        assert!(!roles.contains(&EntityRole::Document));
    }

    #[test]
    fn test_resolve_document_placeholders_by_role() {
        let store = Store::new();
        let templates = TemplateService::new(store);
        let documents = vec![
            CellDocument {
                document_id: 4,
                role: EntityRole::Left,
            },
            CellDocument {
                document_id: 9,
                role: EntityRole::Right,
            },
        ];
        let resolved = templates.resolve_document_placeholders(
            "Does @{{LEFT}} contradict @{{RIGHT}}?",
            &documents,
        );
        assert_eq!(resolved, "Does Document 4 contradict Document 9?");
    }

    #[test]
    fn test_missing_role_placeholder_left_in_place() {
        let store = Store::new();
        let templates = TemplateService::new(store);
        let documents = vec![CellDocument {
            document_id: 4,
            role: EntityRole::Document,
        }];
        let resolved =
            templates.resolve_document_placeholders("@{{DOCUMENT}} vs @{{LEFT}}", &documents);
        assert_eq!(resolved, "Document 4 vs @{{LEFT}}");
    }
}
