//! Persistence gateway.
//!
//! Provides a backend-agnostic `Database` trait that unifies all store
//! operations behind one sub-trait per aggregate (people, cases, documents,
//! invoices). The libSQL backend in [`libsql`] is the only implementation.
//!
//! Records are plain rows with store-assigned integer identities. The
//! relationship rules of the office live in the schema and are surfaced to
//! callers as [`DatabaseError::Constraint`]:
//!
//! - a case references an existing client and lawyer (delete restricted)
//! - documents belong to a case (deleted with it)
//! - invoices restrict deletion of their case and client

pub mod libsql;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;

/// Create the libSQL backend from configuration, run migrations, and return
/// it as a shared gateway handle.
pub async fn connect_from_config(
    config: &DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    let backend = libsql::LibSqlBackend::new_local(&config.db_path).await?;
    let db: Arc<dyn Database> = Arc::new(backend);
    db.run_migrations().await?;
    Ok(db)
}

/// Person variant tag. A person's kind is immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonKind {
    Lawyer,
    Client,
}

impl PersonKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lawyer => "lawyer",
            Self::Client => "client",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "lawyer" => Some(Self::Lawyer),
            "client" => Some(Self::Client),
            _ => None,
        }
    }
}

/// Kind-specific person fields, closed over the two office roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PersonDetails {
    Lawyer {
        specialization: String,
        license_number: String,
        hourly_rate: Decimal,
    },
    Client {
        organization: Option<String>,
        notes: Option<String>,
    },
}

impl PersonDetails {
    pub fn kind(&self) -> PersonKind {
        match self {
            Self::Lawyer { .. } => PersonKind::Lawyer,
            Self::Client { .. } => PersonKind::Client,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub details: PersonDetails,
}

impl PersonRecord {
    pub fn kind(&self) -> PersonKind {
        self.details.kind()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Kind-qualified label used by directory views.
    pub fn display_name(&self) -> String {
        match &self.details {
            PersonDetails::Lawyer { specialization, .. } => {
                format!("Atty. {} ({})", self.full_name(), specialization)
            }
            PersonDetails::Client {
                organization: Some(org),
                ..
            } => format!("{} ({})", self.full_name(), org),
            PersonDetails::Client { .. } => self.full_name(),
        }
    }
}

/// Case lifecycle state. Every transition is legal; there is no terminal
/// state, so resolved and rejected cases remain mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Active,
    Trial,
    Resolved,
    Rejected,
    OnHold,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trial => "trial",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
            Self::OnHold => "on_hold",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "trial" => Some(Self::Trial),
            "resolved" => Some(Self::Resolved),
            "rejected" => Some(Self::Rejected),
            "on_hold" => Some(Self::OnHold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: CaseStatus,
    pub opening_date: DateTime<Utc>,
    pub closing_date: Option<DateTime<Utc>>,
    pub deadline_date: DateTime<Utc>,
    pub client_id: i64,
    pub lawyer_id: i64,
    pub costs_accrued: Decimal,
}

/// Document importance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentImportance {
    Low,
    Normal,
    High,
    Critical,
}

impl DocumentImportance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub case_id: i64,
    pub category: String,
    pub title: String,
    pub importance: DocumentImportance,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: i64,
    pub number: String,
    pub case_id: i64,
    pub client_id: i64,
    pub amount: Decimal,
    pub issue_date: DateTime<Utc>,
    pub paid: bool,
    pub payment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreatePersonParams {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub details: PersonDetails,
}

#[derive(Debug, Clone)]
pub struct CreateCaseParams {
    pub title: String,
    pub description: String,
    pub status: CaseStatus,
    pub opening_date: DateTime<Utc>,
    pub deadline_date: DateTime<Utc>,
    pub client_id: i64,
    pub lawyer_id: i64,
}

#[derive(Debug, Clone)]
pub struct CreateDocumentParams {
    pub case_id: i64,
    pub category: String,
    pub title: String,
    pub importance: DocumentImportance,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateDocumentParams {
    pub title: Option<String>,
    pub importance: Option<DocumentImportance>,
}

#[derive(Debug, Clone)]
pub struct CreateInvoiceParams {
    pub number: String,
    pub case_id: i64,
    pub client_id: i64,
    pub amount: Decimal,
    pub issue_date: DateTime<Utc>,
}

// ==================== Sub-traits ====================
//
// One sub-trait per aggregate. The `Database` supertrait combines them, so
// services hold a single `Arc<dyn Database>` while leaf code can depend on
// the specific sub-trait it needs.

#[async_trait]
pub trait PersonStore: Send + Sync {
    async fn add_person(&self, input: &CreatePersonParams) -> Result<PersonRecord, DatabaseError>;
    async fn get_person(&self, id: i64) -> Result<Option<PersonRecord>, DatabaseError>;
    async fn list_people(
        &self,
        kind: Option<PersonKind>,
    ) -> Result<Vec<PersonRecord>, DatabaseError>;
    /// Partial contact update: `None` keeps the stored value.
    async fn update_person_contact(
        &self,
        id: i64,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<PersonRecord>, DatabaseError>;
    /// Case-insensitive substring match over first name, last name, email.
    async fn search_people(&self, term: &str) -> Result<Vec<PersonRecord>, DatabaseError>;
    async fn delete_person(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn add_case(&self, input: &CreateCaseParams) -> Result<CaseRecord, DatabaseError>;
    async fn get_case(&self, id: i64) -> Result<Option<CaseRecord>, DatabaseError>;
    async fn list_cases(&self) -> Result<Vec<CaseRecord>, DatabaseError>;
    async fn list_cases_by_status(
        &self,
        status: CaseStatus,
    ) -> Result<Vec<CaseRecord>, DatabaseError>;
    /// Cases whose deadline falls in `[from, until]`, ascending by deadline,
    /// ties broken by id (insertion order).
    async fn list_cases_with_deadline_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CaseRecord>, DatabaseError>;
    async fn update_case_status(
        &self,
        id: i64,
        status: CaseStatus,
    ) -> Result<Option<CaseRecord>, DatabaseError>;
    async fn update_case_lawyer(
        &self,
        id: i64,
        lawyer_id: i64,
    ) -> Result<Option<CaseRecord>, DatabaseError>;
    async fn update_case_closing_date(
        &self,
        id: i64,
        closing_date: DateTime<Utc>,
    ) -> Result<Option<CaseRecord>, DatabaseError>;
    /// Adds `amount` to the accrued cost total.
    async fn add_case_cost(
        &self,
        id: i64,
        amount: Decimal,
    ) -> Result<Option<CaseRecord>, DatabaseError>;
    /// Cases referencing the person as client or lawyer.
    async fn count_cases_for_person(&self, person_id: i64) -> Result<i64, DatabaseError>;
    /// Deletes the case and, through the schema, its owned documents.
    async fn delete_case(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn add_document(
        &self,
        input: &CreateDocumentParams,
    ) -> Result<DocumentRecord, DatabaseError>;
    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>, DatabaseError>;
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, DatabaseError>;
    async fn list_documents_for_case(
        &self,
        case_id: i64,
    ) -> Result<Vec<DocumentRecord>, DatabaseError>;
    /// Case-insensitive substring match over title and category.
    async fn search_documents(&self, term: &str) -> Result<Vec<DocumentRecord>, DatabaseError>;
    async fn update_document(
        &self,
        id: i64,
        input: &UpdateDocumentParams,
    ) -> Result<Option<DocumentRecord>, DatabaseError>;
    async fn delete_document(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn add_invoice(
        &self,
        input: &CreateInvoiceParams,
    ) -> Result<InvoiceRecord, DatabaseError>;
    async fn get_invoice(&self, id: i64) -> Result<Option<InvoiceRecord>, DatabaseError>;
    async fn get_invoice_by_number(
        &self,
        number: &str,
    ) -> Result<Option<InvoiceRecord>, DatabaseError>;
    /// `paid = None` lists every invoice.
    async fn list_invoices(&self, paid: Option<bool>) -> Result<Vec<InvoiceRecord>, DatabaseError>;
    async fn list_invoices_for_case(
        &self,
        case_id: i64,
    ) -> Result<Vec<InvoiceRecord>, DatabaseError>;
    async fn set_invoice_paid(
        &self,
        id: i64,
        paid: bool,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<Option<InvoiceRecord>, DatabaseError>;
    async fn sum_invoice_amounts(&self, paid_only: bool) -> Result<Decimal, DatabaseError>;
    async fn count_invoices_for_case(&self, case_id: i64) -> Result<i64, DatabaseError>;
    async fn count_invoices_for_client(&self, client_id: i64) -> Result<i64, DatabaseError>;
    async fn delete_invoice(&self, id: i64) -> Result<bool, DatabaseError>;
}

/// Backend-agnostic database supertrait.
#[async_trait]
pub trait Database: PersonStore + CaseStore + DocumentStore + InvoiceStore + Send + Sync {
    /// Run schema migrations for this backend.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{CaseStatus, DocumentImportance, PersonDetails, PersonKind, PersonRecord};

    #[test]
    fn status_db_values_round_trip() {
        for status in [
            CaseStatus::Active,
            CaseStatus::Trial,
            CaseStatus::Resolved,
            CaseStatus::Rejected,
            CaseStatus::OnHold,
        ] {
            assert_eq!(CaseStatus::from_db_value(status.as_str()), Some(status));
        }
        assert_eq!(CaseStatus::from_db_value("archived"), None);
    }

    #[test]
    fn importance_db_values_round_trip() {
        for importance in [
            DocumentImportance::Low,
            DocumentImportance::Normal,
            DocumentImportance::High,
            DocumentImportance::Critical,
        ] {
            assert_eq!(
                DocumentImportance::from_db_value(importance.as_str()),
                Some(importance)
            );
        }
        assert_eq!(DocumentImportance::from_db_value("urgent"), None);
    }

    #[test]
    fn display_names_are_kind_qualified() {
        let lawyer = PersonRecord {
            id: 1,
            first_name: "Ana".to_string(),
            last_name: "Smith".to_string(),
            email: None,
            phone: None,
            created_at: chrono::Utc::now(),
            details: PersonDetails::Lawyer {
                specialization: "Family law".to_string(),
                license_number: "L-100".to_string(),
                hourly_rate: dec!(120),
            },
        };
        assert_eq!(lawyer.display_name(), "Atty. Ana Smith (Family law)");
        assert_eq!(lawyer.kind(), PersonKind::Lawyer);

        let client = PersonRecord {
            details: PersonDetails::Client {
                organization: Some("Acme d.o.o.".to_string()),
                notes: None,
            },
            ..lawyer.clone()
        };
        assert_eq!(client.display_name(), "Ana Smith (Acme d.o.o.)");

        let plain = PersonRecord {
            details: PersonDetails::Client {
                organization: None,
                notes: None,
            },
            ..lawyer
        };
        assert_eq!(plain.display_name(), "Ana Smith");
    }

    #[test]
    fn records_serialize_for_the_view_layer() {
        let lawyer = PersonRecord {
            id: 7,
            first_name: "Ana".to_string(),
            last_name: "Smith".to_string(),
            email: None,
            phone: None,
            created_at: chrono::Utc::now(),
            details: PersonDetails::Lawyer {
                specialization: "Family law".to_string(),
                license_number: "L-100".to_string(),
                hourly_rate: dec!(120),
            },
        };
        let json = serde_json::to_value(&lawyer).expect("serialize");
        assert_eq!(json["details"]["kind"], "lawyer");
        assert_eq!(json["details"]["hourly_rate"], "120");
        assert_eq!(
            serde_json::to_value(CaseStatus::OnHold).expect("serialize"),
            "on_hold"
        );
    }
}
