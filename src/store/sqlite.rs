use chrono::Utc;
use log::debug;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{RecordStore, StoreError, StoreResult};
use crate::models::{
    InterviewPatch, InterviewRecord, JobApplication, JobPatch, Label, NewInterview, NewJob,
    Profile, ProfilePatch,
};

const JOB_COLUMNS: &str = "id, user_id, company, position, location, job_type, salary_range,
     application_date, status, notes, url, created_at";

const INTERVIEW_COLUMNS: &str =
    "id, job_id, interview_date, interview_type, interviewer, notes, result, created_at";

/// Record store kept in a local SQLite file, for use without a hosted backend.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn init(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                full_name TEXT,
                avatar_url TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES profiles(id),
                company TEXT NOT NULL,
                position TEXT NOT NULL,
                location TEXT NOT NULL,
                job_type TEXT NOT NULL,
                salary_range TEXT NOT NULL,
                application_date TEXT NOT NULL,
                status TEXT NOT NULL,
                notes TEXT,
                url TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS interviews (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                interview_date TEXT NOT NULL,
                interview_type TEXT NOT NULL,
                interviewer TEXT,
                notes TEXT,
                result TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_user ON jobs(user_id);
            CREATE INDEX IF NOT EXISTS idx_interviews_job ON interviews(job_id);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> StoreResult<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    /// Create the profile row for `id` unless it already exists.
    pub fn ensure_profile(&self, id: &str, email: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO profiles (id, email, created_at) VALUES (?1, ?2, ?3)",
            params![id, email, Utc::now()],
        )?;
        Ok(())
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<JobApplication> {
        Ok(JobApplication {
            id: row.get(0)?,
            owner: row.get(1)?,
            company: row.get(2)?,
            position: row.get(3)?,
            location: row.get(4)?,
            employment_type: Label::new(row.get::<_, String>(5)?),
            salary_range: row.get(6)?,
            application_date: row.get(7)?,
            status: Label::new(row.get::<_, String>(8)?),
            notes: row.get(9)?,
            url: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn row_to_interview(row: &rusqlite::Row) -> rusqlite::Result<InterviewRecord> {
        Ok(InterviewRecord {
            id: row.get(0)?,
            job_id: row.get(1)?,
            interview_date: row.get(2)?,
            interview_type: Label::new(row.get::<_, String>(3)?),
            interviewer: row.get(4)?,
            notes: row.get(5)?,
            result: Label::new(row.get::<_, String>(6)?),
            created_at: row.get(7)?,
        })
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            avatar_url: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    /// Run `UPDATE {table} SET ... WHERE id = ?` over the collected
    /// assignments. An empty set only checks that the row exists.
    fn update_row(
        &self,
        table: &'static str,
        id: &str,
        assignments: Vec<(&'static str, Box<dyn ToSql>)>,
    ) -> StoreResult<()> {
        let changed = if assignments.is_empty() {
            self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE id = ?1", table),
                [id],
                |row| row.get::<_, i64>(0),
            )? as usize
        } else {
            let set_clause = assignments
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {} SET {} WHERE id = ?{}",
                table,
                set_clause,
                assignments.len() + 1
            );
            debug!("{}", sql);

            let mut values: Vec<Box<dyn ToSql>> =
                assignments.into_iter().map(|(_, value)| value).collect();
            values.push(Box::new(id.to_string()));
            self.conn.execute(&sql, params_from_iter(values.iter()))?
        };

        if changed == 0 {
            return Err(StoreError::not_found(table, id));
        }
        Ok(())
    }

    fn delete_row(&self, table: &'static str, id: &str) -> StoreResult<()> {
        let deleted = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1", table), [id])?;
        if deleted == 0 {
            return Err(StoreError::not_found(table, id));
        }
        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn list_jobs(&self, owner: &str) -> StoreResult<Vec<JobApplication>> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE user_id = ?1 ORDER BY application_date DESC, created_at DESC",
            JOB_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([owner], Self::row_to_job)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_job(&self, id: &str) -> StoreResult<JobApplication> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS);
        self.conn
            .query_row(&sql, [id], Self::row_to_job)
            .optional()?
            .ok_or_else(|| StoreError::not_found("jobs", id))
    }

    fn insert_job(&self, job: &NewJob) -> StoreResult<JobApplication> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO jobs (id, user_id, company, position, location, job_type, salary_range,
                               application_date, status, notes, url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                job.owner,
                job.company,
                job.position,
                job.location,
                job.employment_type.as_str(),
                job.salary_range,
                job.application_date,
                job.status.as_str(),
                job.notes,
                job.url,
                Utc::now(),
            ],
        )?;
        debug!("inserted job {}", id);
        self.get_job(&id)
    }

    fn update_job(&self, id: &str, patch: &JobPatch) -> StoreResult<()> {
        let mut set: Vec<(&'static str, Box<dyn ToSql>)> = Vec::new();
        if let Some(v) = &patch.company {
            set.push(("company", Box::new(v.clone())));
        }
        if let Some(v) = &patch.position {
            set.push(("position", Box::new(v.clone())));
        }
        if let Some(v) = &patch.location {
            set.push(("location", Box::new(v.clone())));
        }
        if let Some(v) = &patch.employment_type {
            set.push(("job_type", Box::new(v.as_str().to_string())));
        }
        if let Some(v) = &patch.salary_range {
            set.push(("salary_range", Box::new(v.clone())));
        }
        if let Some(v) = patch.application_date {
            set.push(("application_date", Box::new(v)));
        }
        if let Some(v) = &patch.status {
            set.push(("status", Box::new(v.as_str().to_string())));
        }
        if let Some(v) = &patch.notes {
            set.push(("notes", Box::new(v.clone())));
        }
        if let Some(v) = &patch.url {
            set.push(("url", Box::new(v.clone())));
        }
        self.update_row("jobs", id, set)
    }

    fn delete_job(&self, id: &str) -> StoreResult<()> {
        self.delete_row("jobs", id)
    }

    fn list_interviews(&self, job_id: &str) -> StoreResult<Vec<InterviewRecord>> {
        let sql = format!(
            "SELECT {} FROM interviews WHERE job_id = ?1 ORDER BY interview_date ASC, created_at ASC",
            INTERVIEW_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([job_id], Self::row_to_interview)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_interview(&self, interview: &NewInterview) -> StoreResult<InterviewRecord> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO interviews (id, job_id, interview_date, interview_type, interviewer,
                                     notes, result, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                interview.job_id,
                interview.interview_date,
                interview.interview_type.as_str(),
                interview.interviewer,
                interview.notes,
                interview.result.as_str(),
                Utc::now(),
            ],
        )?;
        debug!("inserted interview {} for job {}", id, interview.job_id);

        let sql = format!("SELECT {} FROM interviews WHERE id = ?1", INTERVIEW_COLUMNS);
        Ok(self.conn.query_row(&sql, [&id], Self::row_to_interview)?)
    }

    fn update_interview(&self, id: &str, patch: &InterviewPatch) -> StoreResult<()> {
        let mut set: Vec<(&'static str, Box<dyn ToSql>)> = Vec::new();
        if let Some(v) = patch.interview_date {
            set.push(("interview_date", Box::new(v)));
        }
        if let Some(v) = &patch.interview_type {
            set.push(("interview_type", Box::new(v.as_str().to_string())));
        }
        if let Some(v) = &patch.interviewer {
            set.push(("interviewer", Box::new(v.clone())));
        }
        if let Some(v) = &patch.notes {
            set.push(("notes", Box::new(v.clone())));
        }
        if let Some(v) = &patch.result {
            set.push(("result", Box::new(v.as_str().to_string())));
        }
        self.update_row("interviews", id, set)
    }

    fn delete_interview(&self, id: &str) -> StoreResult<()> {
        self.delete_row("interviews", id)
    }

    fn get_profile(&self, user_id: &str) -> StoreResult<Profile> {
        self.conn
            .query_row(
                "SELECT id, email, full_name, avatar_url, created_at FROM profiles WHERE id = ?1",
                [user_id],
                Self::row_to_profile,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("profiles", user_id))
    }

    fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> StoreResult<()> {
        let mut set: Vec<(&'static str, Box<dyn ToSql>)> = Vec::new();
        if let Some(v) = &patch.full_name {
            set.push(("full_name", Box::new(v.clone())));
        }
        self.update_row("profiles", user_id, set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationStatus, EmploymentType, InterviewResult, InterviewType};
    use chrono::NaiveDate;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init().unwrap();
        store.ensure_profile("u1", "me@example.com").unwrap();
        store
    }

    fn new_job(company: &str, applied: NaiveDate) -> NewJob {
        NewJob {
            owner: "u1".to_string(),
            company: company.to_string(),
            position: "Engineer".to_string(),
            location: "Remote".to_string(),
            employment_type: Label::known(EmploymentType::FullTime),
            salary_range: "$100k - $120k".to_string(),
            application_date: applied,
            status: Label::known(ApplicationStatus::Applied),
            notes: None,
            url: Some("https://jobs.example.com/1".to_string()),
        }
    }

    fn new_interview(job_id: &str, day: u32, result: &str) -> NewInterview {
        NewInterview {
            job_id: job_id.to_string(),
            interview_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            interview_type: Label::known(InterviewType::Technical),
            interviewer: Some("Sam".to_string()),
            notes: None,
            result: Label::new(result),
        }
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_ensure_initialized() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(store.ensure_initialized(), Err(StoreError::NotInitialized)));
        store.init().unwrap();
        assert!(store.ensure_initialized().is_ok());
    }

    #[test]
    fn test_insert_and_list_jobs_newest_first() {
        let store = store();
        store.insert_job(&new_job("Older", date(1, 10))).unwrap();
        let newer = store.insert_job(&new_job("Newer", date(3, 2))).unwrap();
        assert_eq!(newer.company, "Newer");
        assert_eq!(newer.owner, "u1");
        assert!(newer.status.is(ApplicationStatus::Applied));

        let jobs = store.list_jobs("u1").unwrap();
        let companies: Vec<&str> = jobs.iter().map(|j| j.company.as_str()).collect();
        assert_eq!(companies, vec!["Newer", "Older"]);
        assert!(store.list_jobs("someone-else").unwrap().is_empty());
    }

    #[test]
    fn test_update_job_with_patch() {
        let store = store();
        let job = store.insert_job(&new_job("Acme", date(2, 1))).unwrap();

        let patch = JobPatch {
            status: Some(Label::new("interview")),
            notes: Some(Some("recruiter called".to_string())),
            url: Some(None),
            ..Default::default()
        };
        store.update_job(&job.id, &patch).unwrap();

        let updated = store.get_job(&job.id).unwrap();
        assert_eq!(updated.status.as_str(), "interview");
        assert_eq!(updated.notes.as_deref(), Some("recruiter called"));
        assert_eq!(updated.url, None);
        assert_eq!(updated.company, "Acme");
    }

    #[test]
    fn test_missing_rows_are_not_found() {
        let store = store();
        assert!(matches!(store.get_job("nope"), Err(StoreError::NotFound { .. })));
        assert!(matches!(
            store.update_job("nope", &JobPatch::status(Label::known(ApplicationStatus::Offer))),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(store.delete_interview("nope"), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_interviews_ordered_by_date_and_cascade_on_delete() {
        let store = store();
        let job = store.insert_job(&new_job("Acme", date(4, 1))).unwrap();
        store.insert_interview(&new_interview(&job.id, 20, "Pending")).unwrap();
        let first = store.insert_interview(&new_interview(&job.id, 3, "Passed")).unwrap();
        assert!(first.result.is(InterviewResult::Passed));

        let interviews = store.list_interviews(&job.id).unwrap();
        assert_eq!(interviews.len(), 2);
        assert_eq!(interviews[0].id, first.id);

        store.delete_job(&job.id).unwrap();
        assert!(store.list_interviews(&job.id).unwrap().is_empty());
    }

    #[test]
    fn test_interview_requires_existing_job() {
        let store = store();
        let result = store.insert_interview(&new_interview("missing", 1, "Pending"));
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn test_update_interview() {
        let store = store();
        let job = store.insert_job(&new_job("Acme", date(4, 1))).unwrap();
        let interview = store.insert_interview(&new_interview(&job.id, 3, "Pending")).unwrap();

        let patch = InterviewPatch {
            result: Some(Label::known(InterviewResult::NoResponse)),
            interviewer: Some(None),
            ..Default::default()
        };
        store.update_interview(&interview.id, &patch).unwrap();

        let stored = store.list_interviews(&job.id).unwrap().remove(0);
        assert_eq!(stored.result.as_str(), "No Response");
        assert_eq!(stored.interviewer, None);
    }

    #[test]
    fn test_profile_roundtrip() {
        let store = store();
        let profile = store.get_profile("u1").unwrap();
        assert_eq!(profile.email, "me@example.com");
        assert_eq!(profile.display_name(), "User");

        let patch = ProfilePatch { full_name: Some(Some("Jo Doe".to_string())) };
        store.update_profile("u1", &patch).unwrap();
        assert_eq!(store.get_profile("u1").unwrap().display_name(), "Jo Doe");

        // second call leaves the existing row alone
        store.ensure_profile("u1", "other@example.com").unwrap();
        assert_eq!(store.get_profile("u1").unwrap().email, "me@example.com");
    }
}
