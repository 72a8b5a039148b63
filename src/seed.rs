//! Demo data for a fresh office database.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use crate::db::{
    CaseStatus, CreateCaseParams, CreateDocumentParams, CreateInvoiceParams, CreatePersonParams,
    Database, DocumentImportance, PersonDetails,
};
use crate::error::DatabaseError;

fn client(first: &str, last: &str, email: &str) -> CreatePersonParams {
    CreatePersonParams {
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: Some(email.to_string()),
        phone: None,
        details: PersonDetails::Client {
            organization: None,
            notes: None,
        },
    }
}

fn lawyer(first: &str, last: &str, specialization: &str, license: &str) -> CreatePersonParams {
    CreatePersonParams {
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: None,
        phone: None,
        details: PersonDetails::Lawyer {
            specialization: specialization.to_string(),
            license_number: license.to_string(),
            hourly_rate: dec!(120),
        },
    }
}

/// Populate demo clients, lawyers, cases, a document, and an invoice, but
/// only when the store holds no people yet. Writes go straight through the
/// gateway without mediator notifications. Returns whether seeding ran.
pub async fn seed_if_empty(db: &dyn Database) -> Result<bool, DatabaseError> {
    if !db.list_people(None).await?.is_empty() {
        return Ok(false);
    }

    let c1 = db
        .add_person(&client("Petar", "Perić", "petar@mail.com"))
        .await?;
    let c2 = db
        .add_person(&client("Jelena", "Milić", "jelena@mail.com"))
        .await?;
    let a1 = db
        .add_person(&lawyer("Ana", "Petrović", "Family law", "BAR-1021"))
        .await?;
    let a2 = db
        .add_person(&lawyer("Marko", "Janković", "Labor law", "BAR-2044"))
        .await?;

    let now = Utc::now();
    let case1 = db
        .add_case(&CreateCaseParams {
            title: "Divorce proceedings".to_string(),
            description: "Contested divorce, custody in dispute".to_string(),
            status: CaseStatus::Active,
            opening_date: now,
            deadline_date: now + Duration::days(10),
            client_id: c1.id,
            lawyer_id: a1.id,
        })
        .await?;
    let case2 = db
        .add_case(&CreateCaseParams {
            title: "Employment contract review".to_string(),
            description: "Severance terms under negotiation".to_string(),
            status: CaseStatus::Active,
            opening_date: now,
            deadline_date: now + Duration::days(25),
            client_id: c2.id,
            lawyer_id: a2.id,
        })
        .await?;

    db.add_document(&CreateDocumentParams {
        case_id: case2.id,
        category: "Contract".to_string(),
        title: "Current employment contract".to_string(),
        importance: DocumentImportance::High,
        created_at: now,
    })
    .await?;
    db.add_invoice(&CreateInvoiceParams {
        number: "INV-0001".to_string(),
        case_id: case1.id,
        client_id: case1.client_id,
        amount: dec!(120.00),
        issue_date: now,
    })
    .await?;

    tracing::info!("seeded demo office data");
    Ok(true)
}

/// Two clients and two lawyers for service-level tests; returns the ids of
/// the first client and first lawyer.
#[cfg(test)]
pub(crate) async fn demo_people(db: &dyn Database) -> (i64, i64) {
    let c1 = db
        .add_person(&client("Jane", "Doe", "jane@example.com"))
        .await
        .expect("create client");
    db.add_person(&client("Petar", "Perić", "petar@mail.com"))
        .await
        .expect("create client");
    let a1 = db
        .add_person(&lawyer("Ana", "Smith", "Contracts", "L-42"))
        .await
        .expect("create lawyer");
    db.add_person(&lawyer("Marko", "Janković", "Labor law", "L-43"))
        .await
        .expect("create lawyer");
    (c1.id, a1.id)
}
