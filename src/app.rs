use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::{Path, PathBuf};

use crate::auth::{AuthProvider, LOCAL_USER_EMAIL, LOCAL_USER_ID, LocalAuth, RemoteAuth, Session, User};
use crate::config::{Backend, Config};
use crate::models::{
    InterviewPatch, InterviewRecord, JobApplication, JobPatch, NewInterview, NewJob,
};
use crate::state::{AuthState, JobState, ProfileState};
use crate::store::{RecordStore, RestStore, SqliteStore};

/// Owns the backend handles and every state container for one run.
pub struct App {
    config: Config,
    auth: Box<dyn AuthProvider>,
    store: Box<dyn RecordStore>,
    pub auth_state: AuthState,
    pub jobs: JobState,
    pub profile: ProfileState,
}

impl App {
    pub fn open(config: Config) -> Result<Self> {
        let auth: Box<dyn AuthProvider> = match &config.backend {
            Backend::Remote(remote) => {
                Box::new(RemoteAuth::new(remote.clone(), config.session_path.clone()))
            }
            Backend::Local { .. } => Box::new(LocalAuth::new()),
        };
        let mut auth_state = AuthState::new();
        auth_state.initialize(auth.as_ref());
        let store = connect(&config, auth_state.session())?;

        Ok(Self {
            config,
            auth,
            store,
            auth_state,
            jobs: JobState::new(),
            profile: ProfileState::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn user(&self) -> Result<&User> {
        self.auth_state
            .user()
            .ok_or_else(|| anyhow!("Not logged in. Run 'jobtrack login' first."))
    }

    fn owner(&self) -> Result<String> {
        Ok(self.user()?.id.clone())
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<User> {
        let user = self.auth_state.login(self.auth.as_ref(), email, password)?;
        self.store = connect(&self.config, self.auth_state.session())?;
        Ok(user)
    }

    pub fn register(&mut self, email: &str, password: &str) -> Result<Session> {
        let session = self.auth_state.register(self.auth.as_ref(), email, password)?;
        self.store = connect(&self.config, self.auth_state.session())?;
        Ok(session)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.auth_state.logout(self.auth.as_ref())?;
        self.store = connect(&self.config, None)?;
        Ok(())
    }

    pub fn load_jobs(&mut self) -> Result<&[JobApplication]> {
        let owner = self.owner()?;
        self.jobs.fetch_jobs(self.store.as_ref(), &owner)?;
        Ok(self.jobs.jobs())
    }

    /// Resolve an id prefix and load that application with its interviews.
    pub fn load_job(&mut self, prefix: &str) -> Result<String> {
        self.load_jobs()?;
        let id = self.jobs.find_job(prefix)?.id.clone();
        self.jobs.fetch_job(self.store.as_ref(), &id)?;
        self.jobs.fetch_interviews(self.store.as_ref(), &id)?;
        Ok(id)
    }

    /// Resolve an interview id prefix within an already loaded application.
    pub fn find_interview(&self, prefix: &str) -> Result<&InterviewRecord> {
        self.jobs.find_interview(prefix)
    }

    pub fn load_interviews(&mut self, job_id: &str) -> Result<&[InterviewRecord]> {
        self.jobs.fetch_interviews(self.store.as_ref(), job_id)?;
        Ok(self.jobs.interviews())
    }

    /// Insert an application owned by the signed-in user.
    pub fn add_job(&mut self, mut job: NewJob) -> Result<String> {
        job.owner = self.owner()?;
        Ok(self.jobs.add_job(self.store.as_ref(), &job)?)
    }

    pub fn update_job(&mut self, id: &str, patch: &JobPatch) -> Result<()> {
        Ok(self.jobs.update_job(self.store.as_ref(), id, patch)?)
    }

    pub fn delete_job(&mut self, id: &str) -> Result<()> {
        Ok(self.jobs.delete_job(self.store.as_ref(), id)?)
    }

    pub fn add_interview(&mut self, interview: &NewInterview) -> Result<String> {
        Ok(self.jobs.add_interview(self.store.as_ref(), interview)?)
    }

    pub fn update_interview(&mut self, id: &str, patch: &InterviewPatch) -> Result<()> {
        Ok(self.jobs.update_interview(self.store.as_ref(), id, patch)?)
    }

    pub fn delete_interview(&mut self, id: &str) -> Result<()> {
        Ok(self.jobs.delete_interview(self.store.as_ref(), id)?)
    }

    pub fn load_profile(&mut self) -> Result<()> {
        let owner = self.owner()?;
        self.profile.fetch(self.store.as_ref(), &owner)?;
        Ok(())
    }

    pub fn update_full_name(&mut self, full_name: &str) -> Result<()> {
        let owner = self.owner()?;
        self.profile.update_full_name(self.store.as_ref(), &owner, full_name)?;
        Ok(())
    }
}

fn connect(config: &Config, session: Option<&Session>) -> Result<Box<dyn RecordStore>> {
    match &config.backend {
        Backend::Remote(remote) => {
            debug!("using hosted backend at {}", remote.base_url());
            let token = session.and_then(|s| s.access_token.clone());
            Ok(Box::new(RestStore::new(remote.clone(), token)))
        }
        Backend::Local { database } => {
            debug!("using local database at {}", database.display());
            let store = SqliteStore::open(database)
                .with_context(|| format!("Failed to open database at {}", database.display()))?;
            store.ensure_initialized()?;
            Ok(Box::new(store))
        }
    }
}

/// Create the local schema and the built-in user's profile.
pub fn init_local(config: &Config) -> Result<Option<PathBuf>> {
    match &config.backend {
        Backend::Remote(_) => Ok(None),
        Backend::Local { database } => {
            let store = SqliteStore::open(database)
                .with_context(|| format!("Failed to open database at {}", database.display()))?;
            store.init()?;
            store.ensure_profile(LOCAL_USER_ID, LOCAL_USER_EMAIL)?;
            Ok(store.path().map(Path::to_path_buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationStatus, EmploymentType, Label};
    use chrono::NaiveDate;

    fn local_config(dir: &Path) -> Config {
        Config {
            backend: Backend::Local {
                database: dir.join("jobtrack.db"),
            },
            session_path: dir.join("session.json"),
        }
    }

    #[test]
    fn test_open_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let config = local_config(dir.path());
        let err = App::open(config.clone()).err().unwrap();
        assert!(err.to_string().contains("jobtrack init"));

        assert!(init_local(&config).unwrap().is_some());
        let mut app = App::open(config).unwrap();
        assert_eq!(app.user().unwrap().id, LOCAL_USER_ID);
        assert!(app.load_jobs().unwrap().is_empty());
        app.load_profile().unwrap();
        assert_eq!(app.profile.profile().unwrap().email, LOCAL_USER_EMAIL);
    }

    #[test]
    fn test_load_job_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let config = local_config(dir.path());
        init_local(&config).unwrap();
        let mut app = App::open(config).unwrap();

        let job = NewJob {
            owner: String::new(),
            company: "Acme".to_string(),
            position: "SRE".to_string(),
            location: "Remote".to_string(),
            employment_type: Label::known(EmploymentType::FullTime),
            salary_range: "$150k".to_string(),
            application_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            status: Label::known(ApplicationStatus::Applied),
            notes: None,
            url: None,
        };
        let id = app.add_job(job).unwrap();
        assert_eq!(app.jobs.jobs()[0].owner, LOCAL_USER_ID);

        let loaded = app.load_job(&id[..6]).unwrap();
        assert_eq!(loaded, id);
        assert_eq!(app.jobs.current_job().unwrap().company, "Acme");
        assert!(app.jobs.interviews().is_empty());
    }
}
