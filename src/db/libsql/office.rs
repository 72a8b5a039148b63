use chrono::{DateTime, Utc};
use libsql::params;
use rust_decimal::Decimal;

use crate::db::{
    CaseRecord, CaseStatus, CaseStore, CreateCaseParams, CreateDocumentParams,
    CreateInvoiceParams, CreatePersonParams, Database, DocumentImportance, DocumentRecord,
    DocumentStore, InvoiceRecord, InvoiceStore, PersonDetails, PersonKind, PersonRecord,
    PersonStore, UpdateDocumentParams,
};
use crate::error::DatabaseError;

use super::{
    LibSqlBackend, MIGRATIONS, fmt_ts, get_i64, get_opt_text, get_text, opt_text,
    opt_text_owned, parse_decimal, parse_timestamp,
};

fn parse_person_kind(raw: &str) -> Result<PersonKind, DatabaseError> {
    PersonKind::from_db_value(raw)
        .ok_or_else(|| DatabaseError::Serialization(format!("invalid person kind '{raw}'")))
}

fn parse_case_status(raw: &str) -> Result<CaseStatus, DatabaseError> {
    CaseStatus::from_db_value(raw)
        .ok_or_else(|| DatabaseError::Serialization(format!("invalid case status '{raw}'")))
}

fn parse_importance(raw: &str) -> Result<DocumentImportance, DatabaseError> {
    DocumentImportance::from_db_value(raw).ok_or_else(|| {
        DatabaseError::Serialization(format!("invalid document importance '{raw}'"))
    })
}

fn parse_dt_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    raw.as_deref().map(parse_timestamp).transpose()
}

fn row_to_person_record(row: &libsql::Row) -> Result<PersonRecord, DatabaseError> {
    let kind = parse_person_kind(&get_text(row, 1))?;
    let details = match kind {
        PersonKind::Lawyer => PersonDetails::Lawyer {
            specialization: get_text(row, 6),
            license_number: get_text(row, 7),
            hourly_rate: parse_decimal(&get_text(row, 8), "persons.hourly_rate")?,
        },
        PersonKind::Client => PersonDetails::Client {
            organization: get_opt_text(row, 9),
            notes: get_opt_text(row, 10),
        },
    };
    Ok(PersonRecord {
        id: get_i64(row, 0),
        first_name: get_text(row, 2),
        last_name: get_text(row, 3),
        email: get_opt_text(row, 4),
        phone: get_opt_text(row, 5),
        created_at: parse_timestamp(&get_text(row, 11))?,
        details,
    })
}

fn row_to_case_record(row: &libsql::Row) -> Result<CaseRecord, DatabaseError> {
    Ok(CaseRecord {
        id: get_i64(row, 0),
        title: get_text(row, 1),
        description: get_text(row, 2),
        status: parse_case_status(&get_text(row, 3))?,
        opening_date: parse_timestamp(&get_text(row, 4))?,
        closing_date: parse_dt_opt(get_opt_text(row, 5))?,
        deadline_date: parse_timestamp(&get_text(row, 6))?,
        client_id: get_i64(row, 7),
        lawyer_id: get_i64(row, 8),
        costs_accrued: parse_decimal(&get_text(row, 9), "cases.costs_accrued")?,
    })
}

fn row_to_document_record(row: &libsql::Row) -> Result<DocumentRecord, DatabaseError> {
    Ok(DocumentRecord {
        id: get_i64(row, 0),
        case_id: get_i64(row, 1),
        category: get_text(row, 2),
        title: get_text(row, 3),
        importance: parse_importance(&get_text(row, 4))?,
        created_at: parse_timestamp(&get_text(row, 5))?,
    })
}

fn row_to_invoice_record(row: &libsql::Row) -> Result<InvoiceRecord, DatabaseError> {
    Ok(InvoiceRecord {
        id: get_i64(row, 0),
        number: get_text(row, 1),
        case_id: get_i64(row, 2),
        client_id: get_i64(row, 3),
        amount: parse_decimal(&get_text(row, 4), "invoices.amount")?,
        issue_date: parse_timestamp(&get_text(row, 5))?,
        paid: get_i64(row, 6) != 0,
        payment_date: parse_dt_opt(get_opt_text(row, 7))?,
    })
}

fn like_pattern(term: &str) -> String {
    format!("%{}%", term.trim().to_lowercase())
}

const PERSON_COLUMNS: &str = "id, kind, first_name, last_name, email, phone, \
     specialization, license_number, hourly_rate, organization, notes, created_at";
const CASE_COLUMNS: &str = "id, title, description, status, opening_date, closing_date, \
     deadline_date, client_id, lawyer_id, costs_accrued";
const DOCUMENT_COLUMNS: &str = "id, case_id, category, title, importance, created_at";
const INVOICE_COLUMNS: &str =
    "id, number, case_id, client_id, amount, issue_date, paid, payment_date";

async fn fetch_person(
    conn: &libsql::Connection,
    id: i64,
) -> Result<Option<PersonRecord>, DatabaseError> {
    let row = conn
        .query(
            &format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = ?1 LIMIT 1"),
            params![id],
        )
        .await?
        .next()
        .await?;
    row.map(|row| row_to_person_record(&row)).transpose()
}

async fn fetch_case(
    conn: &libsql::Connection,
    id: i64,
) -> Result<Option<CaseRecord>, DatabaseError> {
    let row = conn
        .query(
            &format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1 LIMIT 1"),
            params![id],
        )
        .await?
        .next()
        .await?;
    row.map(|row| row_to_case_record(&row)).transpose()
}

async fn fetch_document(
    conn: &libsql::Connection,
    id: i64,
) -> Result<Option<DocumentRecord>, DatabaseError> {
    let row = conn
        .query(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1 LIMIT 1"),
            params![id],
        )
        .await?
        .next()
        .await?;
    row.map(|row| row_to_document_record(&row)).transpose()
}

async fn fetch_invoice(
    conn: &libsql::Connection,
    id: i64,
) -> Result<Option<InvoiceRecord>, DatabaseError> {
    let row = conn
        .query(
            &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1 LIMIT 1"),
            params![id],
        )
        .await?
        .next()
        .await?;
    row.map(|row| row_to_invoice_record(&row)).transpose()
}

async fn count_scalar(
    conn: &libsql::Connection,
    sql: &str,
    id: i64,
) -> Result<i64, DatabaseError> {
    let row = conn.query(sql, params![id]).await?.next().await?;
    Ok(row.map(|row| get_i64(&row, 0)).unwrap_or(0))
}

#[async_trait::async_trait]
impl PersonStore for LibSqlBackend {
    async fn add_person(&self, input: &CreatePersonParams) -> Result<PersonRecord, DatabaseError> {
        let conn = self.connect().await?;
        match &input.details {
            PersonDetails::Lawyer {
                specialization,
                license_number,
                hourly_rate,
            } => {
                conn.execute(
                    "INSERT INTO persons \
                     (kind, first_name, last_name, email, phone, specialization, license_number, hourly_rate) \
                     VALUES ('lawyer', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        input.first_name.trim(),
                        input.last_name.trim(),
                        opt_text(input.email.as_deref()),
                        opt_text(input.phone.as_deref()),
                        specialization.as_str(),
                        license_number.as_str(),
                        hourly_rate.to_string(),
                    ],
                )
                .await?;
            }
            PersonDetails::Client {
                organization,
                notes,
            } => {
                conn.execute(
                    "INSERT INTO persons \
                     (kind, first_name, last_name, email, phone, organization, notes) \
                     VALUES ('client', ?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        input.first_name.trim(),
                        input.last_name.trim(),
                        opt_text(input.email.as_deref()),
                        opt_text(input.phone.as_deref()),
                        opt_text(organization.as_deref()),
                        opt_text(notes.as_deref()),
                    ],
                )
                .await?;
            }
        }

        let id = conn.last_insert_rowid();
        fetch_person(&conn, id)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created person".to_string()))
    }

    async fn get_person(&self, id: i64) -> Result<Option<PersonRecord>, DatabaseError> {
        let conn = self.connect().await?;
        fetch_person(&conn, id).await
    }

    async fn list_people(
        &self,
        kind: Option<PersonKind>,
    ) -> Result<Vec<PersonRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = match kind {
            Some(kind) => {
                conn.query(
                    &format!(
                        "SELECT {PERSON_COLUMNS} FROM persons WHERE kind = ?1 ORDER BY id ASC"
                    ),
                    params![kind.as_str()],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!("SELECT {PERSON_COLUMNS} FROM persons ORDER BY id ASC"),
                    (),
                )
                .await?
            }
        };

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_person_record(&row)?);
        }
        Ok(out)
    }

    async fn update_person_contact(
        &self,
        id: i64,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<PersonRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE persons SET \
                   email = COALESCE(?2, email), \
                   phone = COALESCE(?3, phone) \
                 WHERE id = ?1",
                params![id, opt_text(email), opt_text(phone)],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        fetch_person(&conn, id).await
    }

    async fn search_people(&self, term: &str) -> Result<Vec<PersonRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let like = like_pattern(term);
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {PERSON_COLUMNS} FROM persons \
                     WHERE lower(first_name) LIKE ?1 \
                        OR lower(last_name) LIKE ?1 \
                        OR lower(email) LIKE ?1 \
                     ORDER BY id ASC"
                ),
                params![like],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_person_record(&row)?);
        }
        Ok(out)
    }

    async fn delete_person(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let deleted = conn
            .execute("DELETE FROM persons WHERE id = ?1", params![id])
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait::async_trait]
impl CaseStore for LibSqlBackend {
    async fn add_case(&self, input: &CreateCaseParams) -> Result<CaseRecord, DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO cases \
             (title, description, status, opening_date, deadline_date, client_id, lawyer_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                input.title.as_str(),
                input.description.as_str(),
                input.status.as_str(),
                fmt_ts(&input.opening_date),
                fmt_ts(&input.deadline_date),
                input.client_id,
                input.lawyer_id,
            ],
        )
        .await?;

        let id = conn.last_insert_rowid();
        fetch_case(&conn, id)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created case".to_string()))
    }

    async fn get_case(&self, id: i64) -> Result<Option<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        fetch_case(&conn, id).await
    }

    async fn list_cases(&self) -> Result<Vec<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(&format!("SELECT {CASE_COLUMNS} FROM cases ORDER BY id ASC"), ())
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_case_record(&row)?);
        }
        Ok(out)
    }

    async fn list_cases_by_status(
        &self,
        status: CaseStatus,
    ) -> Result<Vec<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {CASE_COLUMNS} FROM cases WHERE status = ?1 ORDER BY id ASC"),
                params![status.as_str()],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_case_record(&row)?);
        }
        Ok(out)
    }

    async fn list_cases_with_deadline_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {CASE_COLUMNS} FROM cases \
                     WHERE deadline_date >= ?1 AND deadline_date <= ?2 \
                     ORDER BY deadline_date ASC, id ASC"
                ),
                params![fmt_ts(&from), fmt_ts(&until)],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_case_record(&row)?);
        }
        Ok(out)
    }

    async fn update_case_status(
        &self,
        id: i64,
        status: CaseStatus,
    ) -> Result<Option<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE cases SET status = ?2 WHERE id = ?1",
                params![id, status.as_str()],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        fetch_case(&conn, id).await
    }

    async fn update_case_lawyer(
        &self,
        id: i64,
        lawyer_id: i64,
    ) -> Result<Option<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE cases SET lawyer_id = ?2 WHERE id = ?1",
                params![id, lawyer_id],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        fetch_case(&conn, id).await
    }

    async fn update_case_closing_date(
        &self,
        id: i64,
        closing_date: DateTime<Utc>,
    ) -> Result<Option<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE cases SET closing_date = ?2 WHERE id = ?1",
                params![id, fmt_ts(&closing_date)],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        fetch_case(&conn, id).await
    }

    async fn add_case_cost(
        &self,
        id: i64,
        amount: Decimal,
    ) -> Result<Option<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let Some(existing) = fetch_case(&conn, id).await? else {
            return Ok(None);
        };

        let total = existing.costs_accrued + amount;
        conn.execute(
            "UPDATE cases SET costs_accrued = ?2 WHERE id = ?1",
            params![id, total.to_string()],
        )
        .await?;
        fetch_case(&conn, id).await
    }

    async fn count_cases_for_person(&self, person_id: i64) -> Result<i64, DatabaseError> {
        let conn = self.connect().await?;
        count_scalar(
            &conn,
            "SELECT COUNT(*) FROM cases WHERE client_id = ?1 OR lawyer_id = ?1",
            person_id,
        )
        .await
    }

    async fn delete_case(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let deleted = conn
            .execute("DELETE FROM cases WHERE id = ?1", params![id])
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait::async_trait]
impl DocumentStore for LibSqlBackend {
    async fn add_document(
        &self,
        input: &CreateDocumentParams,
    ) -> Result<DocumentRecord, DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO documents (case_id, category, title, importance, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                input.case_id,
                input.category.as_str(),
                input.title.as_str(),
                input.importance.as_str(),
                fmt_ts(&input.created_at),
            ],
        )
        .await?;

        let id = conn.last_insert_rowid();
        fetch_document(&conn, id)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created document".to_string()))
    }

    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>, DatabaseError> {
        let conn = self.connect().await?;
        fetch_document(&conn, id).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY id ASC"),
                (),
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_document_record(&row)?);
        }
        Ok(out)
    }

    async fn list_documents_for_case(
        &self,
        case_id: i64,
    ) -> Result<Vec<DocumentRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE case_id = ?1 ORDER BY id ASC"
                ),
                params![case_id],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_document_record(&row)?);
        }
        Ok(out)
    }

    async fn search_documents(&self, term: &str) -> Result<Vec<DocumentRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let like = like_pattern(term);
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents \
                     WHERE lower(title) LIKE ?1 OR lower(category) LIKE ?1 \
                     ORDER BY id ASC"
                ),
                params![like],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_document_record(&row)?);
        }
        Ok(out)
    }

    async fn update_document(
        &self,
        id: i64,
        input: &UpdateDocumentParams,
    ) -> Result<Option<DocumentRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE documents SET \
                   title = COALESCE(?2, title), \
                   importance = COALESCE(?3, importance) \
                 WHERE id = ?1",
                params![
                    id,
                    opt_text(input.title.as_deref()),
                    opt_text_owned(input.importance.map(|i| i.as_str().to_string())),
                ],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        fetch_document(&conn, id).await
    }

    async fn delete_document(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let deleted = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait::async_trait]
impl InvoiceStore for LibSqlBackend {
    async fn add_invoice(
        &self,
        input: &CreateInvoiceParams,
    ) -> Result<InvoiceRecord, DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO invoices (number, case_id, client_id, amount, issue_date, paid) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                input.number.as_str(),
                input.case_id,
                input.client_id,
                input.amount.to_string(),
                fmt_ts(&input.issue_date),
            ],
        )
        .await?;

        let id = conn.last_insert_rowid();
        fetch_invoice(&conn, id)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created invoice".to_string()))
    }

    async fn get_invoice(&self, id: i64) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let conn = self.connect().await?;
        fetch_invoice(&conn, id).await
    }

    async fn get_invoice_by_number(
        &self,
        number: &str,
    ) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE number = ?1 LIMIT 1"),
                params![number],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_invoice_record(&row)).transpose()
    }

    async fn list_invoices(
        &self,
        paid: Option<bool>,
    ) -> Result<Vec<InvoiceRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = match paid {
            Some(paid) => {
                conn.query(
                    &format!(
                        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE paid = ?1 ORDER BY id ASC"
                    ),
                    params![i64::from(paid)],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!("SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY id ASC"),
                    (),
                )
                .await?
            }
        };

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_invoice_record(&row)?);
        }
        Ok(out)
    }

    async fn list_invoices_for_case(
        &self,
        case_id: i64,
    ) -> Result<Vec<InvoiceRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {INVOICE_COLUMNS} FROM invoices WHERE case_id = ?1 ORDER BY id ASC"
                ),
                params![case_id],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_invoice_record(&row)?);
        }
        Ok(out)
    }

    async fn set_invoice_paid(
        &self,
        id: i64,
        paid: bool,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE invoices SET paid = ?2, payment_date = ?3 WHERE id = ?1",
                params![
                    id,
                    i64::from(paid),
                    opt_text_owned(payment_date.as_ref().map(fmt_ts)),
                ],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        fetch_invoice(&conn, id).await
    }

    async fn sum_invoice_amounts(&self, paid_only: bool) -> Result<Decimal, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = if paid_only {
            conn.query("SELECT amount FROM invoices WHERE paid = 1", ())
                .await?
        } else {
            conn.query("SELECT amount FROM invoices", ()).await?
        };

        let mut total = Decimal::ZERO;
        while let Some(row) = rows.next().await? {
            total += parse_decimal(&get_text(&row, 0), "invoices.amount")?;
        }
        Ok(total)
    }

    async fn count_invoices_for_case(&self, case_id: i64) -> Result<i64, DatabaseError> {
        let conn = self.connect().await?;
        count_scalar(
            &conn,
            "SELECT COUNT(*) FROM invoices WHERE case_id = ?1",
            case_id,
        )
        .await
    }

    async fn count_invoices_for_client(&self, client_id: i64) -> Result<i64, DatabaseError> {
        let conn = self.connect().await?;
        count_scalar(
            &conn,
            "SELECT COUNT(*) FROM invoices WHERE client_id = ?1",
            client_id,
        )
        .await
    }

    async fn delete_invoice(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let deleted = conn
            .execute("DELETE FROM invoices WHERE id = ?1", params![id])
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait::async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        for statement in MIGRATIONS {
            conn.execute(statement, ()).await?;
        }
        Ok(())
    }
}
