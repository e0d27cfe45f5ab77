use log::{debug, warn};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{RecordStore, StoreError, StoreResult};
use crate::config::RemoteConfig;
use crate::models::{
    InterviewPatch, InterviewRecord, JobApplication, JobPatch, NewInterview, NewJob, Profile,
    ProfilePatch,
};

type Query = Vec<(&'static str, String)>;

/// Error payload of the hosted API. PostgREST uses `message`, the auth
/// service uses `msg` or `error_description` depending on the endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ApiErrorBody {
    /// Best human-readable message from a raw error body.
    pub fn extract(body: &str) -> String {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        parsed
            .message
            .or(parsed.msg)
            .or(parsed.error_description)
            .or(parsed.error)
            .unwrap_or_else(|| body.trim().to_string())
    }
}

/// Turn a non-success response into a `StoreError`.
pub(crate) fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = ApiErrorBody::extract(&body);
    warn!("request failed with status {}: {}", status, message);
    match status.as_u16() {
        401 | 403 => Err(StoreError::Unauthorized(message)),
        code => Err(StoreError::Api {
            status: code,
            message,
        }),
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn jobs_query(owner: &str) -> Query {
    vec![
        ("select", "*".to_string()),
        ("user_id", eq(owner)),
        ("order", "application_date.desc".to_string()),
    ]
}

fn interviews_query(job_id: &str) -> Query {
    vec![
        ("select", "*".to_string()),
        ("job_id", eq(job_id)),
        ("order", "interview_date.asc".to_string()),
    ]
}

fn by_id(id: &str) -> Query {
    vec![("id", eq(id))]
}

/// Record store backed by the hosted PostgREST data API.
pub struct RestStore {
    remote: RemoteConfig,
    access_token: Option<String>,
    client: Client,
}

impl RestStore {
    pub fn new(remote: RemoteConfig, access_token: Option<String>) -> Self {
        Self {
            remote,
            access_token,
            client: Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.remote.base_url(), table)
    }

    fn request(&self, method: Method, table: &str, query: &Query) -> RequestBuilder {
        debug!("{} {} {:?}", method, table, query);
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(&self.remote.anon_key);
        self.client
            .request(method, self.table_url(table))
            .query(query)
            .header("apikey", &self.remote.anon_key)
            .bearer_auth(bearer)
    }

    fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<Vec<T>> {
        let response = check(request.send()?)?;
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn select<T: DeserializeOwned>(&self, table: &str, query: Query) -> StoreResult<Vec<T>> {
        self.fetch(self.request(Method::GET, table, &query))
    }

    fn select_one<T: DeserializeOwned>(&self, table: &'static str, id: &str) -> StoreResult<T> {
        let mut query = by_id(id);
        query.insert(0, ("select", "*".to_string()));
        self.select(table, query)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    fn insert<B: Serialize, T: DeserializeOwned>(&self, table: &str, body: &B) -> StoreResult<T> {
        let request = self
            .request(Method::POST, table, &Vec::new())
            .header("Prefer", "return=representation")
            .json(body);
        self.fetch(request)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Api {
                status: 201,
                message: format!("insert into {} returned no rows", table),
            })
    }

    /// PATCH or DELETE one row, failing with `NotFound` when nothing matched.
    fn modify<B: Serialize>(
        &self,
        method: Method,
        table: &'static str,
        id: &str,
        body: Option<&B>,
    ) -> StoreResult<()> {
        let mut request = self
            .request(method, table, &by_id(id))
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(body);
        }
        let rows: Vec<serde_json::Value> = self.fetch(request)?;
        if rows.is_empty() {
            return Err(StoreError::not_found(table, id));
        }
        Ok(())
    }
}

impl RecordStore for RestStore {
    fn list_jobs(&self, owner: &str) -> StoreResult<Vec<JobApplication>> {
        self.select("jobs", jobs_query(owner))
    }

    fn get_job(&self, id: &str) -> StoreResult<JobApplication> {
        self.select_one("jobs", id)
    }

    fn insert_job(&self, job: &NewJob) -> StoreResult<JobApplication> {
        self.insert("jobs", job)
    }

    fn update_job(&self, id: &str, patch: &JobPatch) -> StoreResult<()> {
        self.modify(Method::PATCH, "jobs", id, Some(patch))
    }

    fn delete_job(&self, id: &str) -> StoreResult<()> {
        self.modify::<()>(Method::DELETE, "jobs", id, None)
    }

    fn list_interviews(&self, job_id: &str) -> StoreResult<Vec<InterviewRecord>> {
        self.select("interviews", interviews_query(job_id))
    }

    fn insert_interview(&self, interview: &NewInterview) -> StoreResult<InterviewRecord> {
        self.insert("interviews", interview)
    }

    fn update_interview(&self, id: &str, patch: &InterviewPatch) -> StoreResult<()> {
        self.modify(Method::PATCH, "interviews", id, Some(patch))
    }

    fn delete_interview(&self, id: &str) -> StoreResult<()> {
        self.modify::<()>(Method::DELETE, "interviews", id, None)
    }

    fn get_profile(&self, user_id: &str) -> StoreResult<Profile> {
        self.select_one("profiles", user_id)
    }

    fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> StoreResult<()> {
        self.modify(Method::PATCH, "profiles", user_id, Some(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn store(token: Option<&str>) -> RestStore {
        RestStore::new(
            RemoteConfig {
                url: "https://demo.supabase.test/".to_string(),
                anon_key: "anon-key".to_string(),
            },
            token.map(str::to_string),
        )
    }

    #[test]
    fn test_list_jobs_request() {
        let store = store(Some("user-token"));
        let request = store
            .request(Method::GET, "jobs", &jobs_query("u1"))
            .build()
            .unwrap();

        let url = request.url();
        assert_eq!(url.path(), "/rest/v1/jobs");
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["select"], "*");
        assert_eq!(pairs["user_id"], "eq.u1");
        assert_eq!(pairs["order"], "application_date.desc");

        assert_eq!(request.headers()["apikey"], "anon-key");
        assert_eq!(request.headers()["authorization"], "Bearer user-token");
    }

    #[test]
    fn test_anon_key_used_without_session() {
        let store = store(None);
        let request = store
            .request(Method::GET, "profiles", &by_id("u1"))
            .build()
            .unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer anon-key");
    }

    #[test]
    fn test_interviews_query_orders_ascending() {
        let query = interviews_query("j1");
        assert!(query.contains(&("job_id", "eq.j1".to_string())));
        assert!(query.contains(&("order", "interview_date.asc".to_string())));
    }

    #[test]
    fn test_api_error_body_extract() {
        assert_eq!(
            ApiErrorBody::extract(r#"{"code":"42501","message":"permission denied"}"#),
            "permission denied"
        );
        assert_eq!(
            ApiErrorBody::extract(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(ApiErrorBody::extract(r#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(ApiErrorBody::extract("Bad Gateway\n"), "Bad Gateway");
    }
}
