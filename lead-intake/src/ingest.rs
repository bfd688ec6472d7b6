use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use metrics::counter;
use tracing::instrument;

use crm_common::model::{Dealership, Lead, NewContact, NewLead, UnattendedLead, UNATTENDED_STATUS};

use crate::adf::{self, AdfCustomer, AdfLead};
use crate::api::{IntakeError, LeadCreated};
use crate::dealerships;
use crate::router::AppState;

const ADF_ROOT_MARKER: &str = "<adf";

/// Inbound ADF lead handler.
///
/// Validation runs to completion before the first store write; any failure
/// up to that point leaves zero contacts and zero leads behind. Once the
/// lead is durably created, notification failures can no longer fail the
/// request.
#[instrument(skip_all, fields(vendor, lead_id))]
pub async fn ingest_adf(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<LeadCreated>), IntakeError> {
    let raw = String::from_utf8_lossy(&body);
    let raw = raw.trim();

    // cheap prechecks so garbage never reaches the XML parser
    if raw.is_empty() {
        return Err(IntakeError::EmptyBody);
    }
    if !raw.contains(ADF_ROOT_MARKER) {
        return Err(IntakeError::MissingAdfRoot);
    }

    let document = adf::parse_document(raw)?;
    let adf_lead = adf::extract_lead(&document)?;
    tracing::Span::current().record("vendor", adf_lead.vendor.name.as_str());

    let dealership = dealerships::resolve(state.store.as_ref(), &adf_lead.vendor.name).await?;

    // all validation passed, writes start here
    let contact = state
        .store
        .insert_contact(new_contact(&adf_lead.customer))
        .await?;

    let lead = state
        .store
        .insert_lead(new_lead(&adf_lead, contact.id, &dealership))
        .await?;
    tracing::Span::current().record("lead_id", tracing::field::display(lead.id));

    // contacts answer "which leads belong to me" without a join, so the
    // back-reference set is kept current on every creation
    let mut contact = contact;
    contact.leads.push(lead.id);
    contact.dealership_id = Some(dealership.id);
    contact.dealergroup_id = Some(dealership.dealergroup_id);
    state.store.update_contact(&contact).await?;

    state
        .store
        .insert_unattended(UnattendedLead {
            lead_id: lead.id,
            created_at: state.clock.now(),
            claimed_by: None,
            claimed_at: None,
        })
        .await?;

    counter!("intake_leads_created_total").increment(1);
    tracing::info!(
        dealership = dealership.name,
        lead_id = %lead.id,
        "created lead from ADF feed"
    );

    notify_fanout(&state, &contact, &lead, &dealership).await;

    Ok((StatusCode::CREATED, Json(LeadCreated { lead })))
}

fn new_contact(customer: &AdfCustomer) -> NewContact {
    NewContact {
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        primary_email: customer.email.clone(),
        secondary_email: Vec::new(),
        mobile_phone: customer.mobile_phone.clone(),
        home_phone: customer.home_phone.clone(),
        work_phone: customer.work_phone.clone(),
        street: customer.street.clone(),
        city: customer.city.clone(),
        region: customer.region.clone(),
        postal_code: customer.postal_code.clone(),
        notes: None,
        dealership_id: None,
        dealergroup_id: None,
    }
}

fn new_lead(adf_lead: &AdfLead, contact_id: uuid::Uuid, dealership: &Dealership) -> NewLead {
    NewLead {
        contact_id,
        dealership_id: dealership.id,
        dealergroup_id: Some(dealership.dealergroup_id),
        // ingestion is always "new", whatever the feed may hint
        status: UNATTENDED_STATUS.to_owned(),
        source: Some("adf".to_owned()),
        vehicle_year: adf_lead.vehicle.year.clone(),
        vehicle_make: adf_lead.vehicle.make.clone(),
        vehicle_model: adf_lead.vehicle.model.clone(),
        vehicle_trim: adf_lead.vehicle.trim.clone(),
        comments: adf_lead.customer.comments.clone(),
    }
}

/// Best-effort fan-out to the distribution list. The lead is durable by the
/// time this runs; a provider outage must never fail the vendor request.
async fn notify_fanout(
    state: &AppState,
    contact: &crm_common::model::Contact,
    lead: &Lead,
    dealership: &Dealership,
) {
    let mut data = HashMap::new();
    data.insert("dealership".to_owned(), dealership.name.clone());
    data.insert("lead_id".to_owned(), lead.id.to_string());
    data.insert(
        "customer_name".to_owned(),
        [contact.first_name.as_deref(), contact.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
    );
    data.insert(
        "vehicle".to_owned(),
        [
            lead.vehicle_year.as_deref(),
            lead.vehicle_make.as_deref(),
            lead.vehicle_model.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" "),
    );

    let subject = format!("New lead for {}", dealership.name);

    for recipient in &state.recipients {
        if let Err(err) = state.notifier.send(recipient, &subject, &data).await {
            counter!("notifications_failed_total").increment(1);
            tracing::warn!("failed to notify {}: {}", recipient, err);
        }
    }
}
