use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::db::{CreateInvoiceParams, Database, InvoiceRecord};
use crate::error::DomainError;
use crate::mediator::{ChangeAction, EventMediator, Notification};

use super::{parse_amount, publish_failure, storage_failure};

/// Billing lifecycle tied to a case.
pub struct InvoiceService {
    db: Arc<dyn Database>,
    mediator: Arc<EventMediator>,
}

impl InvoiceService {
    pub fn new(db: Arc<dyn Database>, mediator: Arc<EventMediator>) -> Self {
        Self { db, mediator }
    }

    /// Creates an unpaid invoice with issue date now. The amount arrives as
    /// raw form text; the number must be office-unique.
    pub async fn create_invoice(
        &self,
        number: &str,
        raw_amount: &str,
        case_id: i64,
    ) -> Result<InvoiceRecord, DomainError> {
        let context = "failed to create invoice";
        let number = number.trim();
        if number.is_empty() {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation("invoice number must not be empty".to_string()),
            ));
        }
        let amount = parse_amount(raw_amount, "invoice amount")
            .map_err(|e| publish_failure(&self.mediator, e))?;
        if self
            .db
            .get_invoice_by_number(number)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .is_some()
        {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation(format!("invoice number '{number}' is already in use")),
            ));
        }
        let Some(case) = self
            .db
            .get_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
        else {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation(format!("case {case_id} not found")),
            ));
        };

        let invoice = self
            .db
            .add_invoice(&CreateInvoiceParams {
                number: number.to_string(),
                case_id,
                client_id: case.client_id,
                amount,
                issue_date: Utc::now(),
            })
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;

        tracing::info!(invoice_id = invoice.id, %amount, "invoice {} created", invoice.number);
        self.mediator
            .publish(Notification::invoice(invoice.clone(), ChangeAction::Added));
        Ok(invoice)
    }

    /// Flips the paid flag. Moving to paid stamps the payment date; moving
    /// back to unpaid clears it.
    pub async fn set_paid(
        &self,
        invoice_id: i64,
        is_paid: bool,
    ) -> Result<InvoiceRecord, DomainError> {
        let context = "failed to update invoice";
        if self
            .db
            .get_invoice(invoice_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .is_none()
        {
            return Err(publish_failure(
                &self.mediator,
                DomainError::NotFound(format!("invoice {invoice_id} not found")),
            ));
        }

        let payment_date = is_paid.then(Utc::now);
        let updated = self
            .db
            .set_invoice_paid(invoice_id, is_paid, payment_date)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .ok_or_else(|| {
                publish_failure(
                    &self.mediator,
                    DomainError::NotFound(format!("invoice {invoice_id} not found")),
                )
            })?;

        let status = if is_paid { "paid" } else { "unpaid" };
        tracing::info!(invoice_id, "invoice {} marked as {status}", updated.number);
        self.mediator.publish(Notification::data_changed(format!(
            "Invoice {} marked as {status}",
            updated.number
        )));
        self.mediator
            .publish(Notification::invoice(updated.clone(), ChangeAction::Updated));
        Ok(updated)
    }

    /// Sum over all invoices, or only paid ones. Zero on an empty set.
    pub async fn total_revenue(&self, paid_only: bool) -> Result<Decimal, DomainError> {
        self.db
            .sum_invoice_amounts(paid_only)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to calculate revenue", e))
    }

    pub async fn get_invoice(&self, id: i64) -> Result<Option<InvoiceRecord>, DomainError> {
        self.db
            .get_invoice(id)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load invoice", e))
    }

    pub async fn list_invoices(&self) -> Result<Vec<InvoiceRecord>, DomainError> {
        self.db
            .list_invoices(None)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load invoices", e))
    }

    pub async fn list_paid(&self) -> Result<Vec<InvoiceRecord>, DomainError> {
        self.db
            .list_invoices(Some(true))
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load invoices", e))
    }

    pub async fn list_unpaid(&self) -> Result<Vec<InvoiceRecord>, DomainError> {
        self.db
            .list_invoices(Some(false))
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load invoices", e))
    }

    pub async fn list_for_case(&self, case_id: i64) -> Result<Vec<InvoiceRecord>, DomainError> {
        self.db
            .list_invoices_for_case(case_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load invoices", e))
    }

    /// Invoices have no owned children; deletion is unconditional.
    pub async fn delete_invoice(&self, id: i64) -> Result<(), DomainError> {
        let context = "failed to delete invoice";
        let Some(invoice) = self
            .db
            .get_invoice(id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
        else {
            return Err(publish_failure(
                &self.mediator,
                DomainError::NotFound(format!("invoice {id} not found")),
            ));
        };

        self.db
            .delete_invoice(id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;

        tracing::info!(invoice_id = id, "invoice {} deleted", invoice.number);
        self.mediator
            .publish(Notification::invoice(invoice, ChangeAction::Deleted));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use crate::db::{CaseStatus, CreateCaseParams, Database};
    use crate::error::DomainError;
    use crate::mediator::{EventMediator, Notification};
    use crate::seed::demo_people;
    use crate::testing::test_db;

    use super::InvoiceService;

    async fn service_with_case() -> (
        InvoiceService,
        Arc<EventMediator>,
        i64,
        tempfile::TempDir,
    ) {
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
        let service = InvoiceService::new(db, Arc::clone(&mediator));
        (service, mediator, case.id, tmp)
    }

    #[tokio::test]
    async fn amounts_are_validated_before_persistence() {
        let (service, _mediator, case_id, _tmp) = service_with_case().await;

        for raw in ["abc", "-10", "12,50"] {
            let err = service
                .create_invoice("INV-001", raw, case_id)
                .await
                .expect_err("bad amount");
            assert!(matches!(err, DomainError::Validation(_)), "input {raw:?}");
        }
        assert!(service.list_invoices().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn numbers_must_be_unique_and_cases_must_resolve() {
        let (service, _mediator, case_id, _tmp) = service_with_case().await;

        service
            .create_invoice("INV-001", "250.00", case_id)
            .await
            .expect("first invoice");

        let err = service
            .create_invoice("INV-001", "99.00", case_id)
            .await
            .expect_err("duplicate number");
        assert!(matches!(err, DomainError::Validation(_)));

        let err = service
            .create_invoice("INV-002", "99.00", 9_999)
            .await
            .expect_err("missing case");
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn revenue_tracks_the_paid_flag() {
        let (service, _mediator, case_id, _tmp) = service_with_case().await;
        assert_eq!(service.total_revenue(false).await.expect("sum"), dec!(0));
        assert_eq!(service.total_revenue(true).await.expect("sum"), dec!(0));

        let invoice = service
            .create_invoice("INV-001", "250.00", case_id)
            .await
            .expect("create invoice");
        service
            .create_invoice("INV-002", "100.00", case_id)
            .await
            .expect("create invoice");

        assert_eq!(service.total_revenue(false).await.expect("sum"), dec!(350.00));
        assert_eq!(service.total_revenue(true).await.expect("sum"), dec!(0));

        let paid = service.set_paid(invoice.id, true).await.expect("mark paid");
        assert!(paid.paid);
        assert!(paid.payment_date.is_some());
        assert_eq!(service.total_revenue(true).await.expect("sum"), dec!(250.00));
        assert_eq!(service.list_unpaid().await.expect("list").len(), 1);

        let unpaid = service
            .set_paid(invoice.id, false)
            .await
            .expect("mark unpaid");
        assert!(!unpaid.paid);
        assert!(unpaid.payment_date.is_none());
    }

    #[tokio::test]
    async fn set_paid_publishes_a_status_message() {
        let (service, mediator, case_id, _tmp) = service_with_case().await;
        let invoice = service
            .create_invoice("INV-001", "250.00", case_id)
            .await
            .expect("create invoice");

        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        mediator.subscribe(move |notification| {
            if let Notification::DataChanged { message, .. } = notification {
                sink.lock().expect("lock").push(message.clone());
            }
        });

        service.set_paid(invoice.id, true).await.expect("mark paid");
        assert_eq!(
            messages.lock().expect("lock").as_slice(),
            ["Invoice INV-001 marked as paid"]
        );

        let err = service.set_paid(9_999, true).await.expect_err("missing");
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_unconditional_for_live_invoices() {
        let (service, _mediator, case_id, _tmp) = service_with_case().await;
        let invoice = service
            .create_invoice("INV-001", "250.00", case_id)
            .await
            .expect("create invoice");

        service.delete_invoice(invoice.id).await.expect("delete");
        let err = service
            .delete_invoice(invoice.id)
            .await
            .expect_err("already gone");
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
