use std::sync::Arc;

use chrono::Utc;

use crate::db::{
    CreateDocumentParams, Database, DocumentImportance, DocumentRecord, UpdateDocumentParams,
};
use crate::error::DomainError;
use crate::mediator::{ChangeAction, EventMediator, Notification};

use super::{publish_failure, storage_failure};

#[derive(Debug, Clone)]
pub struct AddDocumentInput {
    pub case_id: i64,
    pub category: String,
    pub title: String,
    pub importance: DocumentImportance,
}

/// Case files: documents live and die with their owning case.
pub struct DocumentService {
    db: Arc<dyn Database>,
    mediator: Arc<EventMediator>,
}

impl DocumentService {
    pub fn new(db: Arc<dyn Database>, mediator: Arc<EventMediator>) -> Self {
        Self { db, mediator }
    }

    pub async fn add_document(
        &self,
        input: AddDocumentInput,
    ) -> Result<DocumentRecord, DomainError> {
        let context = "failed to add document";
        let title = input.title.trim();
        if title.is_empty() {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation("document title must not be empty".to_string()),
            ));
        }
        if self
            .db
            .get_case(input.case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .is_none()
        {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation(format!("case {} not found", input.case_id)),
            ));
        }

        let document = self
            .db
            .add_document(&CreateDocumentParams {
                case_id: input.case_id,
                category: input.category.trim().to_string(),
                title: title.to_string(),
                importance: input.importance,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;

        tracing::info!(
            document_id = document.id,
            case_id = document.case_id,
            "document '{}' added",
            document.title
        );
        self.mediator.publish(Notification::document(
            document.clone(),
            ChangeAction::Added,
        ));
        Ok(document)
    }

    pub async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>, DomainError> {
        self.db
            .get_document(id)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load document", e))
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>, DomainError> {
        self.db
            .list_documents()
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load documents", e))
    }

    pub async fn list_for_case(&self, case_id: i64) -> Result<Vec<DocumentRecord>, DomainError> {
        self.db
            .list_documents_for_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load documents", e))
    }

    /// Case-insensitive substring match over title and category.
    pub async fn search(&self, term: &str) -> Result<Vec<DocumentRecord>, DomainError> {
        self.db
            .search_documents(term)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to search documents", e))
    }

    /// Partial update: only non-empty supplied fields overwrite stored ones.
    pub async fn update_document(
        &self,
        id: i64,
        title: Option<&str>,
        importance: Option<DocumentImportance>,
    ) -> Result<DocumentRecord, DomainError> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let updated = self
            .db
            .update_document(
                id,
                &UpdateDocumentParams {
                    title: title.map(str::to_string),
                    importance,
                },
            )
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to update document", e))?
            .ok_or_else(|| {
                publish_failure(
                    &self.mediator,
                    DomainError::NotFound(format!("document {id} not found")),
                )
            })?;

        tracing::info!(document_id = id, "document updated");
        self.mediator.publish(Notification::document(
            updated.clone(),
            ChangeAction::Updated,
        ));
        Ok(updated)
    }

    pub async fn delete_document(&self, id: i64) -> Result<(), DomainError> {
        let context = "failed to delete document";
        let Some(document) = self
            .db
            .get_document(id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
        else {
            return Err(publish_failure(
                &self.mediator,
                DomainError::NotFound(format!("document {id} not found")),
            ));
        };

        self.db
            .delete_document(id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;

        tracing::info!(document_id = id, "document '{}' deleted", document.title);
        self.mediator
            .publish(Notification::document(document, ChangeAction::Deleted));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    use crate::db::{CaseStatus, CreateCaseParams, Database, DocumentImportance};
    use crate::error::DomainError;
    use crate::mediator::EventMediator;
    use crate::seed::demo_people;
    use crate::testing::test_db;

    use super::{AddDocumentInput, DocumentService};

    async fn service_with_case() -> (DocumentService, Arc<dyn Database>, i64, tempfile::TempDir) {
        let (db, tmp) = test_db().await;
        let (client_id, lawyer_id) = demo_people(db.as_ref()).await;
        let case = db
            .add_case(&CreateCaseParams {
                title: "Contract Dispute".to_string(),
                description: String::new(),
                status: CaseStatus::Active,
                opening_date: Utc::now(),
                deadline_date: Utc::now() + Duration::days(10),
                client_id,
                lawyer_id,
            })
            .await
            .expect("create case");
        let mediator = Arc::new(EventMediator::new());
        let service = DocumentService::new(Arc::clone(&db), mediator);
        (service, db, case.id, tmp)
    }

    #[tokio::test]
    async fn documents_require_a_live_case() {
        let (service, _db, case_id, _tmp) = service_with_case().await;

        let err = service
            .add_document(AddDocumentInput {
                case_id: 9_999,
                category: "Contract".to_string(),
                title: "Orphan".to_string(),
                importance: DocumentImportance::Low,
            })
            .await
            .expect_err("missing case");
        assert!(matches!(err, DomainError::Validation(_)));

        let document = service
            .add_document(AddDocumentInput {
                case_id,
                category: "Contract".to_string(),
                title: "Signed agreement".to_string(),
                importance: DocumentImportance::High,
            })
            .await
            .expect("add document");
        assert_eq!(document.case_id, case_id);
    }

    #[tokio::test]
    async fn search_matches_title_and_category() {
        let (service, _db, case_id, _tmp) = service_with_case().await;
        for (category, title) in [
            ("Contract", "Master services agreement"),
            ("Evidence", "Site photographs"),
        ] {
            service
                .add_document(AddDocumentInput {
                    case_id,
                    category: category.to_string(),
                    title: title.to_string(),
                    importance: DocumentImportance::Normal,
                })
                .await
                .expect("add document");
        }

        let by_title = service.search("AGREEMENT").await.expect("search");
        assert_eq!(by_title.len(), 1);
        let by_category = service.search("evid").await.expect("search");
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].title, "Site photographs");
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_documents() {
        let (service, _db, case_id, _tmp) = service_with_case().await;
        let document = service
            .add_document(AddDocumentInput {
                case_id,
                category: "Filing".to_string(),
                title: "Motion draft".to_string(),
                importance: DocumentImportance::Normal,
            })
            .await
            .expect("add document");

        let updated = service
            .update_document(document.id, Some("Motion, final"), None)
            .await
            .expect("update");
        assert_eq!(updated.title, "Motion, final");
        assert_eq!(updated.importance, DocumentImportance::Normal);

        service
            .delete_document(document.id)
            .await
            .expect("delete");
        let err = service
            .delete_document(document.id)
            .await
            .expect_err("already gone");
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
