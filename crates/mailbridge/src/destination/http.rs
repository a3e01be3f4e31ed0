//! OData Web API implementation of [`Destination`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, trace};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::DestinationError;
use super::types::{
    ActivityDraft, ActivityRecord, CreateOutcome, DestinationContact, ExistingTimelineEntry,
    Lifecycle, RecentActivity,
};
use super::Destination;
use crate::config::DestinationConfig;
use crate::reconcile::{PartyLink, PartyRef, PartyRole};
use crate::sanitize::redact_url;

const MAX_ERROR_DETAIL_LENGTH: usize = 200;

const CONTACTS: &str = "contacts";
const ACTIVITIES: &str = "emails";

const LOOKUP_ANNOTATION: &str = "_partyid_value@Microsoft.Dynamics.CRM.lookuplogicalname";

/// CRM Web API client.
///
/// Connection failures before the first response are reported as
/// [`DestinationError::Unreachable`]; once the endpoint has answered, they
/// count as transient.
pub struct HttpDestination {
    client: Client,
    base_url: String,
    token: SecretString,
    reached: AtomicBool,
}

impl HttpDestination {
    pub fn new(config: &DestinationConfig, token: SecretString) -> Result<Self, DestinationError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                DestinationError::Unreachable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token,
            reached: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
            .header("OData-Version", "4.0")
            .header("OData-MaxVersion", "4.0")
            .header(header::ACCEPT, "application/json")
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, DestinationError> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        self.reached.store(true, Ordering::Relaxed);

        let status = response.status();
        trace!("{} {}", status, redact_url(response.url().as_str()));
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();
        Err(DestinationError::from_status(
            status.as_u16(),
            error_detail(&body),
            retry_after,
        ))
    }

    fn transport_error(&self, error: reqwest::Error) -> DestinationError {
        let message = redact_url(&error.to_string());
        if error.is_connect() && !self.reached.load(Ordering::Relaxed) {
            DestinationError::Unreachable(message)
        } else {
            DestinationError::transient(message)
        }
    }

    async fn json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, DestinationError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| DestinationError::Decode(e.to_string()))
    }

    /// Follows `@odata.nextLink` until the collection is exhausted.
    async fn collect_pages<T: DeserializeOwned>(
        &self,
        first: RequestBuilder,
    ) -> Result<Vec<T>, DestinationError> {
        let mut rows = Vec::new();
        let mut page: Page<T> = self.json(first).await?;
        loop {
            rows.append(&mut page.value);
            match page.next_link.take() {
                Some(next) => {
                    debug!("Following next page link");
                    page = self.json(self.request(Method::GET, &next)).await?;
                }
                None => break,
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl Destination for HttpDestination {
    async fn list_contacts(&self) -> Result<Vec<DestinationContact>, DestinationError> {
        let first = self.request(Method::GET, &self.url(CONTACTS)).query(&[
            ("$select", "contactid,emailaddress1"),
            ("$filter", "emailaddress1 ne null"),
        ]);
        let rows: Vec<ContactRow> = self.collect_pages(first).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let address = row.emailaddress1?.trim().to_lowercase();
                (!address.is_empty()).then(|| DestinationContact {
                    contact_id: row.contactid,
                    primary_address: address,
                })
            })
            .collect())
    }

    async fn list_timeline(
        &self,
        contact_id: &str,
    ) -> Result<Vec<ExistingTimelineEntry>, DestinationError> {
        let filter = regarding_filter(contact_id);
        let first = self.request(Method::GET, &self.url(ACTIVITIES)).query(&[
            ("$select", "activityid,subject,senton,actualstart,createdon"),
            ("$filter", filter.as_str()),
        ]);
        let rows: Vec<ActivityRow> = self.collect_pages(first).await?;
        Ok(rows.into_iter().filter_map(ActivityRow::into_entry).collect())
    }

    async fn create_activity(
        &self,
        draft: &ActivityDraft,
    ) -> Result<CreateOutcome, DestinationError> {
        let builder = self
            .request(Method::POST, &self.url(ACTIVITIES))
            .header("Prefer", "return=representation")
            .json(&create_payload(draft));
        let response = self.send(builder).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok(parse_create_response(status, &body))
    }

    async fn latest_activity(
        &self,
        contact_id: &str,
    ) -> Result<Option<RecentActivity>, DestinationError> {
        let filter = regarding_filter(contact_id);
        let builder = self.request(Method::GET, &self.url(ACTIVITIES)).query(&[
            ("$select", "activityid,subject"),
            ("$filter", filter.as_str()),
            ("$orderby", "createdon desc"),
            ("$top", "1"),
        ]);
        let page: Page<ActivityRow> = self.json(builder).await?;
        Ok(page.value.into_iter().next().map(|row| RecentActivity {
            activity_id: row.activityid,
            subject: row.subject.unwrap_or_default(),
        }))
    }

    async fn finalize(&self, activity_id: &str) -> Result<(), DestinationError> {
        let lifecycle = Lifecycle::FINALIZED;
        let builder = self
            .request(Method::PATCH, &self.url(&entity_path(activity_id)))
            .json(&json!({
                "statecode": lifecycle.state,
                "statuscode": lifecycle.status,
            }));
        self.send(builder).await?;
        Ok(())
    }

    async fn get_activity(&self, activity_id: &str) -> Result<ActivityRecord, DestinationError> {
        let builder = self
            .request(Method::GET, &self.url(&entity_path(activity_id)))
            .header(
                "Prefer",
                "odata.include-annotations=\"Microsoft.Dynamics.CRM.lookuplogicalname\"",
            )
            .query(&[
                (
                    "$select",
                    "activityid,subject,description,statecode,statuscode",
                ),
                (
                    "$expand",
                    "email_activity_parties($select=participationtypemask,_partyid_value)",
                ),
            ]);
        let value: Value = self.json(builder).await?;
        parse_activity(&value)
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContactRow {
    contactid: String,
    #[serde(default)]
    emailaddress1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivityRow {
    activityid: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    senton: Option<DateTime<Utc>>,
    #[serde(default)]
    actualstart: Option<DateTime<Utc>>,
    #[serde(default)]
    createdon: Option<DateTime<Utc>>,
}

impl ActivityRow {
    fn into_entry(self) -> Option<ExistingTimelineEntry> {
        let sent_time = self.senton.or(self.actualstart).or(self.createdon)?;
        Some(ExistingTimelineEntry {
            subject: self.subject.unwrap_or_default(),
            sent_time,
            external_id: self.activityid,
        })
    }
}

fn regarding_filter(contact_id: &str) -> String {
    format!("_regardingobjectid_value eq {}", contact_id)
}

fn entity_path(activity_id: &str) -> String {
    format!("{}({})", ACTIVITIES, activity_id)
}

fn party_bind(party: &PartyRef) -> (&'static str, String) {
    match party {
        PartyRef::Contact(id) => ("partyid_contact@odata.bind", format!("/contacts({})", id)),
        PartyRef::SystemUser(id) => (
            "partyid_systemuser@odata.bind",
            format!("/systemusers({})", id),
        ),
    }
}

/// Create request body. Carries no lifecycle fields.
fn create_payload(draft: &ActivityDraft) -> Value {
    let time = draft.sent_time.to_rfc3339_opts(SecondsFormat::Secs, true);
    let parties: Vec<Value> = draft
        .parties
        .iter()
        .map(|link| {
            let (key, bind) = party_bind(&link.party);
            json!({
                key: bind,
                "participationtypemask": link.role.code(),
            })
        })
        .collect();

    json!({
        "subject": draft.subject,
        "description": draft.description,
        "actualstart": time,
        "actualend": time,
        "senton": time,
        "directioncode": false,
        "regardingobjectid_contact@odata.bind": format!("/contacts({})", draft.contact_id),
        "email_activity_parties": parties,
    })
}

fn parse_create_response(status: StatusCode, body: &str) -> CreateOutcome {
    if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
        return CreateOutcome::Accepted;
    }
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("activityid").and_then(Value::as_str).map(str::to_string))
        .map(CreateOutcome::Created)
        .unwrap_or(CreateOutcome::Accepted)
}

fn parse_activity(value: &Value) -> Result<ActivityRecord, DestinationError> {
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
    let code = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| DestinationError::Decode(format!("missing '{}'", key)))
    };

    let activity_id =
        text("activityid").ok_or_else(|| DestinationError::Decode("missing 'activityid'".into()))?;

    let mut parties = Vec::new();
    if let Some(rows) = value.get("email_activity_parties").and_then(Value::as_array) {
        for row in rows {
            let role = row
                .get("participationtypemask")
                .and_then(Value::as_i64)
                .and_then(PartyRole::from_code);
            let party_id = row.get("_partyid_value").and_then(Value::as_str);
            let (Some(role), Some(party_id)) = (role, party_id) else {
                continue;
            };
            let party = match row.get(LOOKUP_ANNOTATION).and_then(Value::as_str) {
                Some("systemuser") => PartyRef::SystemUser(party_id.to_string()),
                _ => PartyRef::Contact(party_id.to_string()),
            };
            parties.push(PartyLink {
                activity_id: Some(activity_id.clone()),
                party,
                role,
            });
        }
    }

    Ok(ActivityRecord {
        subject: text("subject").unwrap_or_default(),
        description: text("description").unwrap_or_default(),
        lifecycle: Lifecycle {
            state: code("statecode")?,
            status: code("statuscode")?,
        },
        parties,
        activity_id,
    })
}

/// Pulls the message out of an OData error body, truncated for logs.
fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    if message.chars().count() > MAX_ERROR_DETAIL_LENGTH {
        let cut: String = message.chars().take(MAX_ERROR_DETAIL_LENGTH).collect();
        format!("{}... (truncated)", cut)
    } else {
        message
    }
}

/// Delta-seconds form only; HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
