use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::db::{CaseRecord, CaseStatus, CreateCaseParams, Database, PersonKind, PersonRecord};
use crate::error::DomainError;
use crate::mediator::{ChangeAction, EventMediator, Notification};

use super::{parse_amount, publish_failure, storage_failure};

/// Raw creation input as supplied by a case form.
#[derive(Debug, Clone)]
pub struct CreateCaseInput {
    pub title: String,
    pub description: String,
    pub client_id: i64,
    pub lawyer_id: i64,
    pub deadline_date: DateTime<Utc>,
}

/// Owns every legitimate transition of a case's lifecycle and its
/// relationship fields.
pub struct CaseService {
    db: Arc<dyn Database>,
    mediator: Arc<EventMediator>,
}

impl CaseService {
    pub fn new(db: Arc<dyn Database>, mediator: Arc<EventMediator>) -> Self {
        Self { db, mediator }
    }

    async fn person_of_kind(
        &self,
        id: i64,
        kind: PersonKind,
        context: &str,
    ) -> Result<Option<PersonRecord>, DomainError> {
        let person = self
            .db
            .get_person(id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;
        Ok(person.filter(|p| p.kind() == kind))
    }

    /// Every new case starts `Active` with its opening date stamped now.
    pub async fn create_case(&self, input: CreateCaseInput) -> Result<CaseRecord, DomainError> {
        let context = "failed to create case";
        let title = input.title.trim();
        if title.is_empty() {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation("case title must not be empty".to_string()),
            ));
        }
        if self
            .person_of_kind(input.client_id, PersonKind::Client, context)
            .await?
            .is_none()
        {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation(format!("client {} not found", input.client_id)),
            ));
        }
        if self
            .person_of_kind(input.lawyer_id, PersonKind::Lawyer, context)
            .await?
            .is_none()
        {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation(format!("lawyer {} not found", input.lawyer_id)),
            ));
        }

        let case = self
            .db
            .add_case(&CreateCaseParams {
                title: title.to_string(),
                description: input.description.trim().to_string(),
                status: CaseStatus::Active,
                opening_date: Utc::now(),
                deadline_date: input.deadline_date,
                client_id: input.client_id,
                lawyer_id: input.lawyer_id,
            })
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;

        tracing::info!(case_id = case.id, "case '{}' opened", case.title);
        self.mediator
            .publish(Notification::case(case.clone(), ChangeAction::Added));
        Ok(case)
    }

    /// Applies the new status unconditionally; the status machine is fully
    /// connected and repeated application of the same status is a no-op.
    pub async fn change_status(
        &self,
        case_id: i64,
        new_status: CaseStatus,
    ) -> Result<CaseRecord, DomainError> {
        let context = "failed to change case status";
        let Some(existing) = self
            .db
            .get_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
        else {
            return Err(publish_failure(
                &self.mediator,
                DomainError::NotFound(format!("case {case_id} not found")),
            ));
        };

        let old_status = existing.status;
        let updated = self
            .db
            .update_case_status(case_id, new_status)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .ok_or_else(|| {
                publish_failure(
                    &self.mediator,
                    DomainError::NotFound(format!("case {case_id} not found")),
                )
            })?;

        tracing::info!(
            case_id,
            from = old_status.as_str(),
            to = new_status.as_str(),
            "case status changed"
        );
        self.mediator
            .publish(Notification::case_status_changed(updated.clone(), old_status));
        Ok(updated)
    }

    pub async fn assign_lawyer(
        &self,
        case_id: i64,
        lawyer_id: i64,
    ) -> Result<CaseRecord, DomainError> {
        let context = "failed to assign lawyer";
        if self
            .db
            .get_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .is_none()
        {
            return Err(publish_failure(
                &self.mediator,
                DomainError::NotFound(format!("case {case_id} not found")),
            ));
        }
        let Some(lawyer) = self
            .person_of_kind(lawyer_id, PersonKind::Lawyer, context)
            .await?
        else {
            return Err(publish_failure(
                &self.mediator,
                DomainError::NotFound(format!("lawyer {lawyer_id} not found")),
            ));
        };

        let updated = self
            .db
            .update_case_lawyer(case_id, lawyer_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .ok_or_else(|| {
                publish_failure(
                    &self.mediator,
                    DomainError::NotFound(format!("case {case_id} not found")),
                )
            })?;

        tracing::info!(case_id, lawyer_id, "{} assigned", lawyer.display_name());
        self.mediator
            .publish(Notification::case(updated.clone(), ChangeAction::Updated));
        Ok(updated)
    }

    /// Stamps the closing date; a closing date before the opening date is
    /// rejected.
    pub async fn close_case(
        &self,
        case_id: i64,
        closing_date: DateTime<Utc>,
    ) -> Result<CaseRecord, DomainError> {
        let context = "failed to close case";
        let Some(existing) = self
            .db
            .get_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
        else {
            return Err(publish_failure(
                &self.mediator,
                DomainError::NotFound(format!("case {case_id} not found")),
            ));
        };
        if closing_date < existing.opening_date {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation(format!(
                    "closing date {} is earlier than opening date {}",
                    closing_date.format("%Y-%m-%d"),
                    existing.opening_date.format("%Y-%m-%d")
                )),
            ));
        }

        let updated = self
            .db
            .update_case_closing_date(case_id, closing_date)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .ok_or_else(|| {
                publish_failure(
                    &self.mediator,
                    DomainError::NotFound(format!("case {case_id} not found")),
                )
            })?;

        tracing::info!(case_id, "case closed");
        self.mediator
            .publish(Notification::case(updated.clone(), ChangeAction::Updated));
        Ok(updated)
    }

    /// Adds a parsed non-negative amount to the accrued cost total.
    pub async fn record_cost(
        &self,
        case_id: i64,
        raw_amount: &str,
    ) -> Result<CaseRecord, DomainError> {
        let context = "failed to record case cost";
        let amount = parse_amount(raw_amount, "cost amount")
            .map_err(|e| publish_failure(&self.mediator, e))?;

        let updated = self
            .db
            .add_case_cost(case_id, amount)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .ok_or_else(|| {
                publish_failure(
                    &self.mediator,
                    DomainError::NotFound(format!("case {case_id} not found")),
                )
            })?;

        tracing::info!(case_id, %amount, "case cost recorded");
        self.mediator
            .publish(Notification::case(updated.clone(), ChangeAction::Updated));
        Ok(updated)
    }

    pub async fn get_case(&self, case_id: i64) -> Result<Option<CaseRecord>, DomainError> {
        self.db
            .get_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load case", e))
    }

    pub async fn list_cases(&self) -> Result<Vec<CaseRecord>, DomainError> {
        self.db
            .list_cases()
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load cases", e))
    }

    pub async fn list_by_status(&self, status: CaseStatus) -> Result<Vec<CaseRecord>, DomainError> {
        self.db
            .list_cases_by_status(status)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load cases", e))
    }

    /// Cases due within the next `within_days` days, soonest first.
    pub async fn upcoming_deadlines(
        &self,
        within_days: i64,
    ) -> Result<Vec<CaseRecord>, DomainError> {
        let now = Utc::now();
        self.db
            .list_cases_with_deadline_between(now, now + Duration::days(within_days))
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load deadlines", e))
    }

    /// Deletes the case and its documents. Refused while any invoice still
    /// references the case; the schema's restrict rule backstops the check.
    pub async fn delete_case(&self, case_id: i64) -> Result<(), DomainError> {
        let context = "failed to delete case";
        let Some(existing) = self
            .db
            .get_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
        else {
            return Err(publish_failure(
                &self.mediator,
                DomainError::NotFound(format!("case {case_id} not found")),
            ));
        };

        let invoices = self
            .db
            .count_invoices_for_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;
        if invoices > 0 {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Constraint(format!(
                    "case '{}' has {invoices} invoice(s) and cannot be deleted",
                    existing.title
                )),
            ));
        }

        self.db
            .delete_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;

        tracing::info!(case_id, "case '{}' deleted", existing.title);
        self.mediator
            .publish(Notification::case(existing, ChangeAction::Deleted));
        Ok(())
    }
}
