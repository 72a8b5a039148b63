//! Domain services: the only legitimate write paths into the store.
//!
//! Every operation validates raw presentation input first, performs one save
//! against the persistence gateway, then publishes a mediator notification.
//! On failure the service publishes a descriptive failure message instead
//! and returns a typed [`DomainError`]; no storage error and no
//! partially-applied state ever reaches the caller.

mod cases;
mod documents;
mod invoices;
mod people;

pub use cases::{CaseService, CreateCaseInput};
pub use documents::{AddDocumentInput, DocumentService};
pub use invoices::InvoiceService;
pub use people::{AddClientInput, AddLawyerInput, PeopleService};

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{Database, PersonKind};
use crate::error::{DatabaseError, DomainError};
use crate::mediator::{EventMediator, Notification};

/// Publish the failure notification for `error`, then hand it back.
pub(crate) fn publish_failure(mediator: &EventMediator, error: DomainError) -> DomainError {
    tracing::warn!("{error}");
    mediator.publish(Notification::data_changed(error.to_string()));
    error
}

/// Convert a gateway failure into a domain error, publishing it first.
pub(crate) fn storage_failure(
    mediator: &EventMediator,
    context: &str,
    err: DatabaseError,
) -> DomainError {
    let message = format!("{context}: {err}");
    let error = match err {
        DatabaseError::Constraint(_) => DomainError::Constraint(message),
        _ => DomainError::Storage(message),
    };
    publish_failure(mediator, error)
}

/// Parse a raw monetary field into a non-negative two-decimal amount.
pub(crate) fn parse_amount(raw: &str, field: &str) -> Result<Decimal, DomainError> {
    let trimmed = raw.trim();
    let amount = Decimal::from_str(trimmed).map_err(|_| {
        DomainError::Validation(format!("{field} '{trimmed}' is not a valid decimal amount"))
    })?;
    if amount.is_sign_negative() {
        return Err(DomainError::Validation(format!(
            "{field} must not be negative"
        )));
    }
    Ok(amount.round_dp(2))
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    pub id: i64,
    pub label: String,
}

/// Typed id-to-label lookup tables for mapping UI selections back to ids.
///
/// Built in one pass per data refresh; the presentation layer keeps the
/// directory it loaded rather than re-querying per lookup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OfficeDirectory {
    clients: BTreeMap<i64, String>,
    lawyers: BTreeMap<i64, String>,
    cases: BTreeMap<i64, String>,
}

impl OfficeDirectory {
    pub async fn load(db: &dyn Database) -> Result<Self, DomainError> {
        let people = db
            .list_people(None)
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        let cases = db
            .list_cases()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;

        let mut directory = Self::default();
        for person in people {
            let table = match person.kind() {
                PersonKind::Client => &mut directory.clients,
                PersonKind::Lawyer => &mut directory.lawyers,
            };
            table.insert(person.id, person.display_name());
        }
        for case in cases {
            directory.cases.insert(case.id, case.title);
        }
        Ok(directory)
    }

    pub fn client_label(&self, id: i64) -> Option<&str> {
        self.clients.get(&id).map(String::as_str)
    }

    pub fn lawyer_label(&self, id: i64) -> Option<&str> {
        self.lawyers.get(&id).map(String::as_str)
    }

    pub fn case_label(&self, id: i64) -> Option<&str> {
        self.cases.get(&id).map(String::as_str)
    }

    pub fn clients(&self) -> impl Iterator<Item = DirectoryEntry> + '_ {
        self.clients.iter().map(|(id, label)| DirectoryEntry {
            id: *id,
            label: label.clone(),
        })
    }

    pub fn lawyers(&self) -> impl Iterator<Item = DirectoryEntry> + '_ {
        self.lawyers.iter().map(|(id, label)| DirectoryEntry {
            id: *id,
            label: label.clone(),
        })
    }

    pub fn cases(&self) -> impl Iterator<Item = DirectoryEntry> + '_ {
        self.cases.iter().map(|(id, label)| DirectoryEntry {
            id: *id,
            label: label.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{parse_amount, OfficeDirectory};
    use crate::error::DomainError;
    use crate::seed::seed_if_empty;
    use crate::testing::test_db;

    #[test]
    fn amounts_parse_trimmed_and_rounded() {
        assert_eq!(parse_amount(" 250.00 ", "amount").expect("valid"), dec!(250.00));
        assert_eq!(parse_amount("99.999", "amount").expect("valid"), dec!(100.00));
        assert!(matches!(
            parse_amount("abc", "amount"),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            parse_amount("-1", "amount"),
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn directory_maps_ids_to_labels() {
        let (db, _tmp) = test_db().await;
        seed_if_empty(db.as_ref()).await.expect("seed");

        let directory = OfficeDirectory::load(db.as_ref()).await.expect("load");
        let clients: Vec<_> = directory.clients().collect();
        let lawyers: Vec<_> = directory.lawyers().collect();
        assert_eq!(clients.len(), 2);
        assert_eq!(lawyers.len(), 2);

        let first = &clients[0];
        assert_eq!(directory.client_label(first.id), Some(first.label.as_str()));
        assert!(directory.client_label(9_999).is_none());
        assert!(directory.cases().count() >= 2);
    }
}
