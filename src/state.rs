//! Client-side copies of what the record store holds.
//!
//! Each container owns the rows it last fetched plus a loading flag and the
//! message of the last failure. Fields are private; the only way to change a
//! container is one of its operations, which forward to the store and patch
//! the local copy when the store accepted the change. The store stays the
//! authority: the next full fetch replaces whatever was patched locally.

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::fmt::Display;

use crate::auth::{AuthProvider, Session, User};
use crate::models::{
    InterviewPatch, InterviewRecord, JobApplication, JobPatch, NewInterview, NewJob, Profile,
    ProfilePatch,
};
use crate::store::{RecordStore, StoreResult};

/// Shared begin/settle bookkeeping for the containers below.
#[derive(Debug, Default)]
struct Activity {
    loading: bool,
    error: Option<String>,
}

impl Activity {
    fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    fn settle<T, E: Display>(&mut self, what: &str, result: Result<T, E>) -> Result<T, E> {
        self.loading = false;
        if let Err(e) = &result {
            warn!("{} failed: {}", what, e);
            self.error = Some(e.to_string());
        }
        result
    }
}

// --- Authentication session ---

#[derive(Debug, Default)]
pub struct AuthState {
    session: Option<Session>,
    initialized: bool,
    activity: Activity,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[allow(dead_code)]
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    #[allow(dead_code)]
    pub fn loading(&self) -> bool {
        self.activity.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.activity.error.as_deref()
    }

    /// Pick up the session from a previous run. Failures leave the state
    /// signed out, recorded in `error`, but still mark it initialized.
    pub fn initialize(&mut self, auth: &dyn AuthProvider) {
        self.activity.begin();
        let result = auth.restore();
        if let Ok(session) = self.activity.settle("restore session", result) {
            self.session = session;
        }
        self.initialized = true;
    }

    pub fn login(&mut self, auth: &dyn AuthProvider, email: &str, password: &str) -> Result<User> {
        self.activity.begin();
        let result = auth.sign_in(email, password);
        let session = self.activity.settle("login", result)?;
        info!("signed in as {}", session.user.email);
        let user = session.user.clone();
        self.session = Some(session);
        Ok(user)
    }

    pub fn register(&mut self, auth: &dyn AuthProvider, email: &str, password: &str) -> Result<Session> {
        self.activity.begin();
        let result = auth.sign_up(email, password);
        let session = self.activity.settle("register", result)?;
        info!("registered {}", session.user.email);
        self.session = Some(session.clone());
        Ok(session)
    }

    pub fn logout(&mut self, auth: &dyn AuthProvider) -> Result<()> {
        let Some(session) = self.session.clone() else {
            return Ok(());
        };
        self.activity.begin();
        let result = auth.sign_out(&session);
        self.activity.settle("logout", result)?;
        self.session = None;
        Ok(())
    }
}

// --- Applications and interviews ---

#[derive(Debug, Default)]
pub struct JobState {
    jobs: Vec<JobApplication>,
    current_job: Option<JobApplication>,
    interviews: Vec<InterviewRecord>,
    activity: Activity,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &[JobApplication] {
        &self.jobs
    }

    pub fn current_job(&self) -> Option<&JobApplication> {
        self.current_job.as_ref()
    }

    pub fn interviews(&self) -> &[InterviewRecord] {
        &self.interviews
    }

    pub fn loading(&self) -> bool {
        self.activity.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.activity.error.as_deref()
    }

    pub fn fetch_jobs(&mut self, store: &dyn RecordStore, owner: &str) -> StoreResult<()> {
        self.activity.begin();
        let result = store.list_jobs(owner);
        self.jobs = self.activity.settle("fetch jobs", result)?;
        debug!("fetched {} jobs", self.jobs.len());
        Ok(())
    }

    pub fn fetch_job(&mut self, store: &dyn RecordStore, id: &str) -> StoreResult<()> {
        self.activity.begin();
        self.current_job = None;
        let result = store.get_job(id);
        self.current_job = Some(self.activity.settle("fetch job", result)?);
        Ok(())
    }

    pub fn fetch_interviews(&mut self, store: &dyn RecordStore, job_id: &str) -> StoreResult<()> {
        self.activity.begin();
        self.interviews.clear();
        let result = store.list_interviews(job_id);
        self.interviews = self.activity.settle("fetch interviews", result)?;
        debug!("fetched {} interviews for job {}", self.interviews.len(), job_id);
        Ok(())
    }

    /// Insert an application and put it at the front of the list.
    pub fn add_job(&mut self, store: &dyn RecordStore, job: &NewJob) -> StoreResult<String> {
        self.activity.begin();
        let result = store.insert_job(job);
        let created = self.activity.settle("add job", result)?;
        info!("added job {} ({} at {})", created.id, created.position, created.company);
        let id = created.id.clone();
        self.jobs.insert(0, created);
        Ok(id)
    }

    pub fn update_job(&mut self, store: &dyn RecordStore, id: &str, patch: &JobPatch) -> StoreResult<()> {
        self.activity.begin();
        let result = store.update_job(id, patch);
        self.activity.settle("update job", result)?;

        if let Some(job) = self.jobs.iter_mut().find(|j| j.id == id) {
            patch.apply_to(job);
        }
        if let Some(job) = self.current_job.as_mut().filter(|j| j.id == id) {
            patch.apply_to(job);
        }
        info!("updated job {}", id);
        Ok(())
    }

    pub fn delete_job(&mut self, store: &dyn RecordStore, id: &str) -> StoreResult<()> {
        self.activity.begin();
        let result = store.delete_job(id);
        self.activity.settle("delete job", result)?;

        self.jobs.retain(|j| j.id != id);
        if self.current_job.as_ref().is_some_and(|j| j.id == id) {
            self.current_job = None;
            self.interviews.clear();
        }
        info!("deleted job {}", id);
        Ok(())
    }

    /// Insert an interview and append it to the loaded timeline.
    pub fn add_interview(&mut self, store: &dyn RecordStore, interview: &NewInterview) -> StoreResult<String> {
        self.activity.begin();
        let result = store.insert_interview(interview);
        let created = self.activity.settle("add interview", result)?;
        info!("added interview {} to job {}", created.id, created.job_id);
        let id = created.id.clone();
        self.interviews.push(created);
        Ok(id)
    }

    pub fn update_interview(
        &mut self,
        store: &dyn RecordStore,
        id: &str,
        patch: &InterviewPatch,
    ) -> StoreResult<()> {
        self.activity.begin();
        let result = store.update_interview(id, patch);
        self.activity.settle("update interview", result)?;

        if let Some(interview) = self.interviews.iter_mut().find(|i| i.id == id) {
            patch.apply_to(interview);
        }
        info!("updated interview {}", id);
        Ok(())
    }

    pub fn delete_interview(&mut self, store: &dyn RecordStore, id: &str) -> StoreResult<()> {
        self.activity.begin();
        let result = store.delete_interview(id);
        self.activity.settle("delete interview", result)?;

        self.interviews.retain(|i| i.id != id);
        info!("deleted interview {}", id);
        Ok(())
    }

    /// Resolve a full id or unique id prefix against the loaded applications.
    pub fn find_job(&self, prefix: &str) -> Result<&JobApplication> {
        find_by_prefix(&self.jobs, |j| j.id.as_str(), prefix, "application")
    }

    /// Resolve a full id or unique id prefix against the loaded interviews.
    pub fn find_interview(&self, prefix: &str) -> Result<&InterviewRecord> {
        find_by_prefix(&self.interviews, |i| i.id.as_str(), prefix, "interview")
    }
}

fn find_by_prefix<'a, T>(
    items: &'a [T],
    id: impl Fn(&T) -> &str,
    prefix: &str,
    what: &str,
) -> Result<&'a T> {
    if let Some(exact) = items.iter().find(|item| id(item) == prefix) {
        return Ok(exact);
    }
    let matches: Vec<&T> = items
        .iter()
        .filter(|item| !prefix.is_empty() && id(item).starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [only] => Ok(*only),
        [] => Err(anyhow!("No {} matches '{}'", what, prefix)),
        many => Err(anyhow!(
            "'{}' matches {} {}s; use more characters of the id",
            prefix,
            many.len(),
            what
        )),
    }
}

// --- Profile page ---

#[derive(Debug, Default)]
pub struct ProfileState {
    profile: Option<Profile>,
    activity: Activity,
}

impl ProfileState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    #[allow(dead_code)]
    pub fn error(&self) -> Option<&str> {
        self.activity.error.as_deref()
    }

    pub fn fetch(&mut self, store: &dyn RecordStore, user_id: &str) -> StoreResult<()> {
        self.activity.begin();
        let result = store.get_profile(user_id);
        self.profile = Some(self.activity.settle("fetch profile", result)?);
        Ok(())
    }

    pub fn update_full_name(
        &mut self,
        store: &dyn RecordStore,
        user_id: &str,
        full_name: &str,
    ) -> StoreResult<()> {
        let full_name = full_name.trim();
        let patch = ProfilePatch {
            full_name: Some((!full_name.is_empty()).then(|| full_name.to_string())),
        };
        self.activity.begin();
        let result = store.update_profile(user_id, &patch);
        self.activity.settle("update profile", result)?;
        if let Some(profile) = self.profile.as_mut() {
            patch.apply_to(profile);
        }
        Ok(())
    }
}
