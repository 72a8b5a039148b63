use std::sync::Arc;

use crate::db::{CreatePersonParams, Database, PersonDetails, PersonKind, PersonRecord};
use crate::error::DomainError;
use crate::mediator::{EventMediator, Notification};

use super::{parse_amount, publish_failure, storage_failure};

#[derive(Debug, Clone)]
pub struct AddClientInput {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub notes: Option<String>,
}

/// Raw lawyer form input; the hourly rate arrives as text.
#[derive(Debug, Clone)]
pub struct AddLawyerInput {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: String,
    pub license_number: String,
    pub hourly_rate: String,
}

/// CRUD over clients and lawyers with referentially protected deletes.
pub struct PeopleService {
    db: Arc<dyn Database>,
    mediator: Arc<EventMediator>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PeopleService {
    pub fn new(db: Arc<dyn Database>, mediator: Arc<EventMediator>) -> Self {
        Self { db, mediator }
    }

    fn validate_names(&self, first_name: &str, last_name: &str) -> Result<(), DomainError> {
        if first_name.trim().is_empty() || last_name.trim().is_empty() {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Validation("first and last name must not be empty".to_string()),
            ));
        }
        Ok(())
    }

    pub async fn add_client(&self, input: AddClientInput) -> Result<PersonRecord, DomainError> {
        self.validate_names(&input.first_name, &input.last_name)?;

        let client = self
            .db
            .add_person(&CreatePersonParams {
                first_name: input.first_name,
                last_name: input.last_name,
                email: non_empty(&input.email),
                phone: non_empty(&input.phone),
                details: PersonDetails::Client {
                    organization: non_empty(&input.organization),
                    notes: input.notes,
                },
            })
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to add client", e))?;

        tracing::info!(person_id = client.id, "client {} added", client.full_name());
        self.mediator.publish(Notification::data_changed(format!(
            "Client {} added",
            client.full_name()
        )));
        Ok(client)
    }

    pub async fn add_lawyer(&self, input: AddLawyerInput) -> Result<PersonRecord, DomainError> {
        self.validate_names(&input.first_name, &input.last_name)?;
        let hourly_rate = parse_amount(&input.hourly_rate, "hourly rate")
            .map_err(|e| publish_failure(&self.mediator, e))?;

        let lawyer = self
            .db
            .add_person(&CreatePersonParams {
                first_name: input.first_name,
                last_name: input.last_name,
                email: non_empty(&input.email),
                phone: non_empty(&input.phone),
                details: PersonDetails::Lawyer {
                    specialization: input.specialization.trim().to_string(),
                    license_number: input.license_number.trim().to_string(),
                    hourly_rate,
                },
            })
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to add lawyer", e))?;

        tracing::info!(person_id = lawyer.id, "lawyer {} added", lawyer.full_name());
        self.mediator.publish(Notification::data_changed(format!(
            "Lawyer {} added",
            lawyer.full_name()
        )));
        Ok(lawyer)
    }

    /// Partial update: only non-empty supplied fields overwrite stored ones.
    pub async fn update_contact_info(
        &self,
        person_id: i64,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<PersonRecord, DomainError> {
        let context = "failed to update contact info";
        let email = email.map(str::trim).filter(|v| !v.is_empty());
        let phone = phone.map(str::trim).filter(|v| !v.is_empty());

        let updated = self
            .db
            .update_person_contact(person_id, email, phone)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .ok_or_else(|| {
                publish_failure(
                    &self.mediator,
                    DomainError::NotFound(format!("person {person_id} not found")),
                )
            })?;

        tracing::info!(person_id, "contact info updated");
        self.mediator.publish(Notification::data_changed(format!(
            "{} updated",
            updated.display_name()
        )));
        Ok(updated)
    }

    pub async fn delete_client(&self, person_id: i64) -> Result<(), DomainError> {
        self.delete_person_of_kind(person_id, PersonKind::Client)
            .await
    }

    pub async fn delete_lawyer(&self, person_id: i64) -> Result<(), DomainError> {
        self.delete_person_of_kind(person_id, PersonKind::Lawyer)
            .await
    }

    async fn delete_person_of_kind(
        &self,
        person_id: i64,
        kind: PersonKind,
    ) -> Result<(), DomainError> {
        let context = "failed to delete person";
        let person = self
            .db
            .get_person(person_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?
            .filter(|p| p.kind() == kind);
        let Some(person) = person else {
            return Err(publish_failure(
                &self.mediator,
                DomainError::NotFound(format!("{} {person_id} not found", kind.as_str())),
            ));
        };

        let cases = self
            .db
            .count_cases_for_person(person_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;
        if cases > 0 {
            return Err(publish_failure(
                &self.mediator,
                DomainError::Constraint(format!(
                    "{} is referenced by {cases} case(s) and cannot be deleted",
                    person.display_name()
                )),
            ));
        }
        if kind == PersonKind::Client {
            let invoices = self
                .db
                .count_invoices_for_client(person_id)
                .await
                .map_err(|e| storage_failure(&self.mediator, context, e))?;
            if invoices > 0 {
                return Err(publish_failure(
                    &self.mediator,
                    DomainError::Constraint(format!(
                        "{} has {invoices} invoice(s) and cannot be deleted",
                        person.display_name()
                    )),
                ));
            }
        }

        self.db
            .delete_person(person_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, context, e))?;

        tracing::info!(person_id, "{} deleted", person.display_name());
        self.mediator.publish(Notification::data_changed(format!(
            "{} deleted",
            person.display_name()
        )));
        Ok(())
    }

    /// Case-insensitive substring match over first name, last name, email.
    pub async fn search(&self, term: &str) -> Result<Vec<PersonRecord>, DomainError> {
        self.db
            .search_people(term)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to search people", e))
    }

    pub async fn get_person(&self, person_id: i64) -> Result<Option<PersonRecord>, DomainError> {
        self.db
            .get_person(person_id)
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load person", e))
    }

    pub async fn list_clients(&self) -> Result<Vec<PersonRecord>, DomainError> {
        self.db
            .list_people(Some(PersonKind::Client))
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load clients", e))
    }

    pub async fn list_lawyers(&self) -> Result<Vec<PersonRecord>, DomainError> {
        self.db
            .list_people(Some(PersonKind::Lawyer))
            .await
            .map_err(|e| storage_failure(&self.mediator, "failed to load lawyers", e))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    use crate::db::{CaseStatus, CreateCaseParams, Database};
    use crate::error::DomainError;
    use crate::mediator::EventMediator;
    use crate::testing::test_db;

    use super::{AddClientInput, AddLawyerInput, PeopleService};

    fn client_input(first: &str, last: &str, email: Option<&str>) -> AddClientInput {
        AddClientInput {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.map(str::to_string),
            phone: None,
            organization: None,
            notes: None,
        }
    }

    async fn service() -> (PeopleService, Arc<dyn Database>, tempfile::TempDir) {
        let (db, tmp) = test_db().await;
        let mediator = Arc::new(EventMediator::new());
        (
            PeopleService::new(Arc::clone(&db), mediator),
            db,
            tmp,
        )
    }

    #[tokio::test]
    async fn lawyer_rates_are_parsed_from_raw_input() {
        let (service, _db, _tmp) = service().await;

        let err = service
            .add_lawyer(AddLawyerInput {
                first_name: "Ana".to_string(),
                last_name: "Smith".to_string(),
                email: None,
                phone: None,
                specialization: "Family law".to_string(),
                license_number: "L-1".to_string(),
                hourly_rate: "a lot".to_string(),
            })
            .await
            .expect_err("bad rate");
        assert!(matches!(err, DomainError::Validation(_)));

        let lawyer = service
            .add_lawyer(AddLawyerInput {
                first_name: "Ana".to_string(),
                last_name: "Smith".to_string(),
                email: None,
                phone: None,
                specialization: "Family law".to_string(),
                license_number: "L-1".to_string(),
                hourly_rate: "150".to_string(),
            })
            .await
            .expect("add lawyer");
        assert_eq!(lawyer.display_name(), "Atty. Ana Smith (Family law)");
    }

    #[tokio::test]
    async fn contact_update_ignores_empty_fields() {
        let (service, _db, _tmp) = service().await;
        let client = service
            .add_client(client_input("Jane", "Doe", Some("jane@example.com")))
            .await
            .expect("add client");

        let updated = service
            .update_contact_info(client.id, Some("   "), Some("+1 555 0100"))
            .await
            .expect("update");
        assert_eq!(updated.email.as_deref(), Some("jane@example.com"));
        assert_eq!(updated.phone.as_deref(), Some("+1 555 0100"));

        let err = service
            .update_contact_info(9_999, Some("x@example.com"), None)
            .await
            .expect_err("missing person");
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_checks_kind_and_case_references() {
        let (service, db, _tmp) = service().await;
        let client = service
            .add_client(client_input("Jane", "Doe", None))
            .await
            .expect("add client");
        let lawyer = service
            .add_lawyer(AddLawyerInput {
                first_name: "Ana".to_string(),
                last_name: "Smith".to_string(),
                email: None,
                phone: None,
                specialization: "Contracts".to_string(),
                license_number: "L-2".to_string(),
                hourly_rate: "120".to_string(),
            })
            .await
            .expect("add lawyer");

        // wrong kind: the id exists but is not a lawyer
        let err = service.delete_lawyer(client.id).await.expect_err("kind");
        assert!(matches!(err, DomainError::NotFound(_)));

        db.add_case(&CreateCaseParams {
            title: "Open matter".to_string(),
            description: String::new(),
            status: CaseStatus::Active,
            opening_date: Utc::now(),
            deadline_date: Utc::now() + Duration::days(30),
            client_id: client.id,
            lawyer_id: lawyer.id,
        })
        .await
        .expect("create case");

        let err = service
            .delete_client(client.id)
            .await
            .expect_err("referenced");
        assert!(matches!(err, DomainError::Constraint(_)));

        // round trip: the client and the case survive the rejected delete
        assert!(db.get_person(client.id).await.expect("get").is_some());
        assert_eq!(db.list_cases().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_over_names_and_email() {
        let (service, _db, _tmp) = service().await;
        service
            .add_client(client_input("Jane", "Doe", Some("jane@example.com")))
            .await
            .expect("add");
        service
            .add_client(client_input("Petar", "Jovanović", Some("petar@example.com")))
            .await
            .expect("add");

        let by_name = service.search("JANE").await.expect("search");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].first_name, "Jane");

        let by_email = service.search("petar@").await.expect("search");
        assert_eq!(by_email.len(), 1);

        let none = service.search("zzz").await.expect("search");
        assert!(none.is_empty());
    }
}
