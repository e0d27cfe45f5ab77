use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Case folding used for every comparison of stored categorical text.
pub fn normalize(value: &str) -> String {
    value.to_lowercase()
}

/// A closed set of known values for a free-text column.
pub trait Category: Copy + Eq + fmt::Debug + 'static {
    /// Known kinds, in the order forms offer them.
    const ALL: &'static [Self];
    const UNRECOGNIZED: Self;

    fn canonical(self) -> &'static str;

    fn classify(text: &str) -> Self {
        let needle = normalize(text);
        Self::ALL
            .iter()
            .copied()
            .find(|kind| normalize(kind.canonical()) == needle)
            .unwrap_or(Self::UNRECOGNIZED)
    }
}

/// Stored text of a categorical column together with what it classifies as.
///
/// The text is kept verbatim, so a row stored as `"applied"` still reads back
/// as `"applied"` while classifying as [`ApplicationStatus::Applied`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<K> {
    text: String,
    kind: K,
}

impl<K: Category> Label<K> {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = K::classify(&text);
        Self { text, kind }
    }

    pub fn known(kind: K) -> Self {
        Self {
            text: kind.canonical().to_string(),
            kind,
        }
    }

    /// Parse user input: recognised values are stored under their canonical
    /// spelling, anything else verbatim.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        match K::classify(input) {
            kind if kind == K::UNRECOGNIZED => Self::new(input),
            kind => Self::known(kind),
        }
    }

    pub fn kind(&self) -> K {
        self.kind
    }

    pub fn is(&self, kind: K) -> bool {
        self.kind == kind
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl<K> fmt::Display for Label<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl<K: Category> FromStr for Label<K> {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_input(s))
    }
}

impl<K> Serialize for Label<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de, K: Category> Deserialize<'de> for Label<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::new(text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationStatus {
    Applied,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
    Unrecognized,
}

impl Category for ApplicationStatus {
    const ALL: &'static [Self] = &[
        Self::Applied,
        Self::Interview,
        Self::Offer,
        Self::Rejected,
        Self::Withdrawn,
    ];
    const UNRECOGNIZED: Self = Self::Unrecognized;

    fn canonical(self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::Interview => "Interview",
            Self::Offer => "Offer",
            Self::Rejected => "Rejected",
            Self::Withdrawn => "Withdrawn",
            Self::Unrecognized => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterviewResult {
    Pending,
    Passed,
    Failed,
    NoResponse,
    Unrecognized,
}

impl Category for InterviewResult {
    const ALL: &'static [Self] = &[Self::Pending, Self::Passed, Self::Failed, Self::NoResponse];
    const UNRECOGNIZED: Self = Self::Unrecognized;

    fn canonical(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::NoResponse => "No Response",
            Self::Unrecognized => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Freelance,
    Internship,
    Unrecognized,
}

impl Category for EmploymentType {
    const ALL: &'static [Self] = &[
        Self::FullTime,
        Self::PartTime,
        Self::Contract,
        Self::Freelance,
        Self::Internship,
    ];
    const UNRECOGNIZED: Self = Self::Unrecognized;

    fn canonical(self) -> &'static str {
        match self {
            Self::FullTime => "Full-time",
            Self::PartTime => "Part-time",
            Self::Contract => "Contract",
            Self::Freelance => "Freelance",
            Self::Internship => "Internship",
            Self::Unrecognized => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterviewType {
    PhoneScreen,
    Technical,
    Behavioral,
    Onsite,
    Final,
    Other,
    Unrecognized,
}

impl Category for InterviewType {
    const ALL: &'static [Self] = &[
        Self::PhoneScreen,
        Self::Technical,
        Self::Behavioral,
        Self::Onsite,
        Self::Final,
        Self::Other,
    ];
    const UNRECOGNIZED: Self = Self::Unrecognized;

    fn canonical(self) -> &'static str {
        match self {
            Self::PhoneScreen => "Phone Screen",
            Self::Technical => "Technical",
            Self::Behavioral => "Behavioral",
            Self::Onsite => "Onsite",
            Self::Final => "Final",
            Self::Other => "Other",
            Self::Unrecognized => "",
        }
    }
}

/// Comma-separated canonical labels, for help text and error messages.
pub fn choices<K: Category>() -> String {
    K::ALL
        .iter()
        .map(|kind| kind.canonical())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: String,
    #[serde(rename = "user_id")]
    pub owner: String,
    pub company: String,
    pub position: String,
    pub location: String,
    #[serde(rename = "job_type")]
    pub employment_type: Label<EmploymentType>,
    pub salary_range: String,
    pub application_date: NaiveDate,
    pub status: Label<ApplicationStatus>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewRecord {
    pub id: String,
    pub job_id: String,
    pub interview_date: NaiveDate,
    pub interview_type: Label<InterviewType>,
    #[serde(default)]
    pub interviewer: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub result: Label<InterviewResult>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("User")
    }
}

// --- Insert payloads ---

#[derive(Debug, Clone, Serialize)]
pub struct NewJob {
    #[serde(rename = "user_id")]
    pub owner: String,
    pub company: String,
    pub position: String,
    pub location: String,
    #[serde(rename = "job_type")]
    pub employment_type: Label<EmploymentType>,
    pub salary_range: String,
    pub application_date: NaiveDate,
    pub status: Label<ApplicationStatus>,
    pub notes: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewInterview {
    pub job_id: String,
    pub interview_date: NaiveDate,
    pub interview_type: Label<InterviewType>,
    pub interviewer: Option<String>,
    pub notes: Option<String>,
    pub result: Label<InterviewResult>,
}

// --- Partial updates ---
//
// `None` leaves a column untouched; for nullable columns `Some(None)` clears it.

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "job_type", skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<Label<EmploymentType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Label<ApplicationStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Option<String>>,
}

impl JobPatch {
    pub fn status(status: Label<ApplicationStatus>) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, job: &mut JobApplication) {
        if let Some(company) = &self.company {
            job.company = company.clone();
        }
        if let Some(position) = &self.position {
            job.position = position.clone();
        }
        if let Some(location) = &self.location {
            job.location = location.clone();
        }
        if let Some(employment_type) = &self.employment_type {
            job.employment_type = employment_type.clone();
        }
        if let Some(salary_range) = &self.salary_range {
            job.salary_range = salary_range.clone();
        }
        if let Some(date) = self.application_date {
            job.application_date = date;
        }
        if let Some(status) = &self.status {
            job.status = status.clone();
        }
        if let Some(notes) = &self.notes {
            job.notes = notes.clone();
        }
        if let Some(url) = &self.url {
            job.url = url.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterviewPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview_type: Option<Label<InterviewType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interviewer: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Label<InterviewResult>>,
}

impl InterviewPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, interview: &mut InterviewRecord) {
        if let Some(date) = self.interview_date {
            interview.interview_date = date;
        }
        if let Some(interview_type) = &self.interview_type {
            interview.interview_type = interview_type.clone();
        }
        if let Some(interviewer) = &self.interviewer {
            interview.interviewer = interviewer.clone();
        }
        if let Some(notes) = &self.notes {
            interview.notes = notes.clone();
        }
        if let Some(result) = &self.result {
            interview.result = result.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(full_name) = &self.full_name {
            profile.full_name = full_name.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_keeps_stored_text() {
        let status: Label<ApplicationStatus> = Label::new("applied");
        assert_eq!(status.as_str(), "applied");
        assert!(status.is(ApplicationStatus::Applied));

        let status: Label<ApplicationStatus> = Label::new("Aplied");
        assert_eq!(status.as_str(), "Aplied");
        assert_eq!(status.kind(), ApplicationStatus::Unrecognized);
    }

    #[test]
    fn test_label_from_input_canonicalises_known_values() {
        let result: Label<InterviewResult> = Label::from_input("no response");
        assert_eq!(result.as_str(), "No Response");
        assert!(result.is(InterviewResult::NoResponse));

        let kind: Label<EmploymentType> = "FULL-TIME".parse().unwrap();
        assert_eq!(kind.as_str(), "Full-time");

        let kind: Label<InterviewType> = Label::from_input(" Panel ");
        assert_eq!(kind.as_str(), "Panel");
        assert_eq!(kind.kind(), InterviewType::Unrecognized);
    }

    #[test]
    fn test_interview_type_other_is_a_known_kind() {
        let kind: Label<InterviewType> = Label::new("other");
        assert_eq!(kind.kind(), InterviewType::Other);
    }

    #[test]
    fn test_job_row_deserializes_from_api_json() {
        let json = r#"{
            "id": "6f1c",
            "user_id": "u1",
            "company": "Acme",
            "position": "Engineer",
            "location": "Remote",
            "job_type": "Contract",
            "salary_range": "$100k",
            "application_date": "2024-03-05",
            "status": "interview",
            "notes": null,
            "url": "https://acme.test/jobs/1",
            "created_at": "2024-03-05T10:11:12.123456+00:00"
        }"#;
        let job: JobApplication = serde_json::from_str(json).unwrap();
        assert_eq!(job.owner, "u1");
        assert!(job.employment_type.is(EmploymentType::Contract));
        assert_eq!(job.application_date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(job.status.as_str(), "interview");
        assert!(job.status.is(ApplicationStatus::Interview));
        assert_eq!(job.notes, None);
    }

    #[test]
    fn test_interview_row_tolerates_missing_optionals() {
        let json = r#"{
            "id": "i1",
            "job_id": "j1",
            "interview_date": "2024-04-01",
            "interview_type": "Onsite",
            "result": "Passed",
            "created_at": "2024-04-01T00:00:00Z"
        }"#;
        let interview: InterviewRecord = serde_json::from_str(json).unwrap();
        assert_eq!(interview.interviewer, None);
        assert!(interview.result.is(InterviewResult::Passed));
    }

    #[test]
    fn test_job_patch_serializes_only_set_fields() {
        let patch = JobPatch {
            status: Some(Label::known(ApplicationStatus::Offer)),
            notes: Some(None),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({ "status": "Offer", "notes": null }));
        assert!(!patch.is_empty());
        assert!(JobPatch::default().is_empty());
    }

    #[test]
    fn test_job_patch_apply_to_merges() {
        let mut job = JobApplication {
            id: "j1".to_string(),
            owner: "u1".to_string(),
            company: "Acme".to_string(),
            position: "Engineer".to_string(),
            location: "Remote".to_string(),
            employment_type: Label::known(EmploymentType::FullTime),
            salary_range: String::new(),
            application_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            status: Label::known(ApplicationStatus::Applied),
            notes: Some("referral".to_string()),
            url: None,
            created_at: Utc::now(),
        };
        let patch = JobPatch {
            company: Some("Acme Corp".to_string()),
            status: Some(Label::known(ApplicationStatus::Rejected)),
            notes: Some(None),
            ..Default::default()
        };
        patch.apply_to(&mut job);
        assert_eq!(job.company, "Acme Corp");
        assert!(job.status.is(ApplicationStatus::Rejected));
        assert_eq!(job.notes, None);
        assert_eq!(job.position, "Engineer");
    }

    #[test]
    fn test_choices_lists_canonical_labels() {
        assert_eq!(
            choices::<ApplicationStatus>(),
            "Applied, Interview, Offer, Rejected, Withdrawn"
        );
    }
}
