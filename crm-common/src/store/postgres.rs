use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::model::{Contact, Dealership, Lead, NewContact, NewLead, UnattendedLead};
use crate::store::{Store, StoreError, StoreResult};

const CONTACT_COLUMNS: &str = "id, first_name, last_name, primary_email, secondary_email, \
     mobile_phone, home_phone, work_phone, street, city, region, postal_code, notes, \
     total_visits, leads, dealership_id, dealergroup_id, merged_into, created_at";

const LEAD_COLUMNS: &str = "id, contact_id, dealership_id, dealergroup_id, status, source, \
     assigned_to, claimed_by, claimed_at, vehicle_year, vehicle_make, vehicle_model, \
     vehicle_trim, comments, created_at";

/// Store backend on top of PostgreSQL.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)
            .map_err(|error| StoreError::Connection { error })?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|error| StoreError::Migration { error })
    }

    fn query_error(command: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
        move |error| StoreError::Query {
            command: command.to_owned(),
            error,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_dealerships(&self) -> StoreResult<Vec<Dealership>> {
        sqlx::query_as("SELECT id, name, dealergroup_id FROM dealerships ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(Self::query_error("SELECT dealerships"))
    }

    async fn insert_contact(&self, new: NewContact) -> StoreResult<Contact> {
        let query = format!(
            r#"
INSERT INTO contacts
    (id, first_name, last_name, primary_email, secondary_email, mobile_phone, home_phone,
     work_phone, street, city, region, postal_code, notes, total_visits, leads,
     dealership_id, dealergroup_id, merged_into, created_at)
VALUES
    ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 0, '{{}}', $14, $15, NULL, NOW())
RETURNING {CONTACT_COLUMNS}
            "#
        );

        sqlx::query_as(&query)
            .bind(Uuid::now_v7())
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.primary_email)
            .bind(&new.secondary_email)
            .bind(&new.mobile_phone)
            .bind(&new.home_phone)
            .bind(&new.work_phone)
            .bind(&new.street)
            .bind(&new.city)
            .bind(&new.region)
            .bind(&new.postal_code)
            .bind(&new.notes)
            .bind(new.dealership_id)
            .bind(new.dealergroup_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::query_error("INSERT contact"))
    }

    async fn get_contact(&self, id: Uuid) -> StoreResult<Contact> {
        let query = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1");

        sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::query_error("SELECT contact"))?
            .ok_or(StoreError::ContactNotFound(id))
    }

    async fn update_contact(&self, contact: &Contact) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
UPDATE contacts SET
    first_name = $2, last_name = $3, primary_email = $4, secondary_email = $5,
    mobile_phone = $6, home_phone = $7, work_phone = $8, street = $9, city = $10,
    region = $11, postal_code = $12, notes = $13, total_visits = $14, leads = $15,
    dealership_id = $16, dealergroup_id = $17, merged_into = $18
WHERE id = $1
            "#,
        )
        .bind(contact.id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.primary_email)
        .bind(&contact.secondary_email)
        .bind(&contact.mobile_phone)
        .bind(&contact.home_phone)
        .bind(&contact.work_phone)
        .bind(&contact.street)
        .bind(&contact.city)
        .bind(&contact.region)
        .bind(&contact.postal_code)
        .bind(&contact.notes)
        .bind(contact.total_visits)
        .bind(&contact.leads)
        .bind(contact.dealership_id)
        .bind(contact.dealergroup_id)
        .bind(contact.merged_into)
        .execute(&self.pool)
        .await
        .map_err(Self::query_error("UPDATE contact"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ContactNotFound(contact.id));
        }
        Ok(())
    }

    async fn insert_lead(&self, new: NewLead) -> StoreResult<Lead> {
        let query = format!(
            r#"
INSERT INTO leads
    (id, contact_id, dealership_id, dealergroup_id, status, source, assigned_to,
     claimed_by, claimed_at, vehicle_year, vehicle_make, vehicle_model, vehicle_trim,
     comments, created_at)
VALUES
    ($1, $2, $3, $4, $5, $6, NULL, NULL, NULL, $7, $8, $9, $10, $11, NOW())
RETURNING {LEAD_COLUMNS}
            "#
        );

        sqlx::query_as(&query)
            .bind(Uuid::now_v7())
            .bind(new.contact_id)
            .bind(new.dealership_id)
            .bind(new.dealergroup_id)
            .bind(&new.status)
            .bind(&new.source)
            .bind(&new.vehicle_year)
            .bind(&new.vehicle_make)
            .bind(&new.vehicle_model)
            .bind(&new.vehicle_trim)
            .bind(&new.comments)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::query_error("INSERT lead"))
    }

    async fn get_lead(&self, id: Uuid) -> StoreResult<Lead> {
        let query = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1");

        sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::query_error("SELECT lead"))?
            .ok_or(StoreError::LeadNotFound(id))
    }

    async fn clear_lead_claim(&self, lead_id: Uuid) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE leads SET claimed_by = NULL, claimed_at = NULL WHERE id = $1")
                .bind(lead_id)
                .execute(&self.pool)
                .await
                .map_err(Self::query_error("UPDATE lead claim"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::LeadNotFound(lead_id));
        }
        Ok(())
    }

    async fn unattended_eligible_leads(&self) -> StoreResult<Vec<Lead>> {
        let query = format!(
            "SELECT {LEAD_COLUMNS} FROM leads \
             WHERE status = $1 AND assigned_to IS NULL ORDER BY created_at, id"
        );

        sqlx::query_as(&query)
            .bind(crate::model::UNATTENDED_STATUS)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::query_error("SELECT eligible leads"))
    }

    async fn expired_claim_leads(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Lead>> {
        let query = format!(
            "SELECT {LEAD_COLUMNS} FROM leads \
             WHERE status = $1 AND assigned_to IS NULL \
               AND claimed_by IS NOT NULL AND claimed_at < $2 \
             ORDER BY created_at, id"
        );

        sqlx::query_as(&query)
            .bind(crate::model::UNATTENDED_STATUS)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::query_error("SELECT expired claims"))
    }

    async fn list_unattended(&self) -> StoreResult<Vec<UnattendedLead>> {
        sqlx::query_as(
            "SELECT lead_id, created_at, claimed_by, claimed_at FROM unattended_leads \
             ORDER BY created_at, lead_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Self::query_error("SELECT unattended"))
    }

    async fn unattended_exists(&self, lead_id: Uuid) -> StoreResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM unattended_leads WHERE lead_id = $1")
                .bind(lead_id)
                .fetch_one(&self.pool)
                .await
                .map_err(Self::query_error("SELECT unattended exists"))?;

        Ok(count > 0)
    }

    async fn insert_unattended(&self, entry: UnattendedLead) -> StoreResult<()> {
        sqlx::query(
            r#"
INSERT INTO unattended_leads (lead_id, created_at, claimed_by, claimed_at)
VALUES ($1, $2, $3, $4)
ON CONFLICT (lead_id) DO NOTHING
            "#,
        )
        .bind(entry.lead_id)
        .bind(entry.created_at)
        .bind(&entry.claimed_by)
        .bind(entry.claimed_at)
        .execute(&self.pool)
        .await
        .map_err(Self::query_error("INSERT unattended"))?;

        Ok(())
    }

    async fn delete_unattended(&self, lead_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM unattended_leads WHERE lead_id = $1")
            .bind(lead_id)
            .execute(&self.pool)
            .await
            .map_err(Self::query_error("DELETE unattended"))?;

        Ok(())
    }
}
