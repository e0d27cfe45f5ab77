mod app;
mod auth;
mod config;
mod models;
mod state;
mod stats;
mod store;
mod tui;

use anyhow::{Result, bail};
use app::App;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::{Backend, Config};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use models::{
    ApplicationStatus, EmploymentType, InterviewPatch, InterviewResult, InterviewType, JobApplication,
    JobPatch, Label, NewInterview, NewJob, choices,
};
use stats::{ApplicationProgress, DashboardStats, InterviewTally, JobFilter};
use std::io::{self, BufRead, IsTerminal, Write};

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job applications, interviews and how the search is going")]
struct Cli {
    /// Use the local database even when a hosted backend is configured
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local database
    Init,

    /// Create an account on the hosted backend
    Signup {
        #[arg(short, long)]
        email: String,

        /// Prompted for, without echo, when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign in to the hosted backend
    Login {
        #[arg(short, long)]
        email: String,

        /// Prompted for, without echo, when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign out and forget the saved session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show or edit your profile
    Profile {
        /// New full name (empty to clear)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Record a new application
    Add {
        #[arg(short, long)]
        company: String,

        #[arg(short, long)]
        position: String,

        #[arg(short, long)]
        location: String,

        /// Salary range, e.g. "$120k - $140k"
        #[arg(short, long)]
        salary: String,

        /// Employment type (Full-time, Part-time, Contract, Freelance, Internship)
        #[arg(short = 't', long = "type", default_value = "Full-time")]
        job_type: String,

        /// Application date (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Status (Applied, Interview, Offer, Rejected, Withdrawn)
        #[arg(long, default_value = "Applied")]
        status: String,

        #[arg(short, long)]
        url: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List applications
    List {
        /// Filter by status (applied, interview, offer, rejected, withdrawn)
        #[arg(long)]
        status: Option<String>,

        /// Search company, position and location
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show an application with its interviews
    Show {
        /// Application ID or unique prefix
        id: String,
    },

    /// Change fields of an application
    Edit {
        /// Application ID or unique prefix
        id: String,

        #[arg(short, long)]
        company: Option<String>,

        #[arg(short, long)]
        position: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        salary: Option<String>,

        #[arg(short = 't', long = "type")]
        job_type: Option<String>,

        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        status: Option<String>,

        /// Job posting URL (empty to clear)
        #[arg(short, long)]
        url: Option<String>,

        /// Notes (empty to clear)
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Delete an application and its interviews
    Delete {
        /// Application ID or unique prefix
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage interviews of an application
    Interview {
        #[command(subcommand)]
        command: InterviewCommands,
    },

    /// Show search statistics
    Dashboard,

    /// Browse applications interactively
    Browse,
}

#[derive(Subcommand)]
enum InterviewCommands {
    /// Record an interview
    Add {
        /// Application ID or unique prefix
        job: String,

        /// Interview date (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Phone Screen, Technical, Behavioral, Onsite, Final or Other
        #[arg(short = 't', long = "type", default_value = "Phone Screen")]
        interview_type: String,

        #[arg(short, long)]
        interviewer: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,

        /// Pending, Passed, Failed or No Response
        #[arg(short, long, default_value = "Pending")]
        result: String,
    },

    /// Change fields of an interview
    Edit {
        /// Application ID or unique prefix
        job: String,

        /// Interview ID or unique prefix
        interview: String,

        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(short = 't', long = "type")]
        interview_type: Option<String>,

        /// Interviewer (empty to clear)
        #[arg(short, long)]
        interviewer: Option<String>,

        /// Notes (empty to clear)
        #[arg(short, long)]
        notes: Option<String>,

        #[arg(short, long)]
        result: Option<String>,
    },

    /// Delete an interview
    Delete {
        /// Application ID or unique prefix
        job: String,

        /// Interview ID or unique prefix
        interview: String,

        #[arg(short, long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.local)?;

    if let Commands::Init = cli.command {
        match app::init_local(&config)? {
            Some(path) => println!("Database initialized at {}", path.display()),
            None => println!("Using the hosted backend; nothing to initialize. Pass --local for a local database."),
        }
        return Ok(());
    }

    let mut app = App::open(config)?;

    match cli.command {
        Commands::Init => {}

        Commands::Signup { email, password } => {
            let password = password_or_prompt(password)?;
            let session = app.register(&email, &password)?;
            if session.access_token.is_some() {
                println!("Account created. Signed in as {}.", session.user.email);
            } else {
                println!("Account created for {}. Confirm your email, then run 'jobtrack login'.", session.user.email);
            }
        }

        Commands::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let user = app.login(&email, &password)?;
            println!("Signed in as {}.", user.email);
        }

        Commands::Logout => {
            app.logout()?;
            println!("Signed out.");
        }

        Commands::Whoami => {
            if let Some(error) = app.auth_state.error() {
                eprintln!("Saved session could not be restored: {}", error);
            }
            let user = app.user()?;
            println!("{} ({})", user.email, user.id);
            match &app.config().backend {
                Backend::Remote(remote) => println!("Backend: {}", remote.base_url()),
                Backend::Local { database } => println!("Backend: local ({})", database.display()),
            }
        }

        Commands::Profile { name } => {
            if let Some(name) = name {
                app.update_full_name(&name)?;
                println!("Profile updated successfully!");
            }
            app.load_profile()?;
            if let Some(profile) = app.profile.profile() {
                println!("Name: {}", profile.display_name());
                println!("Email: {}", profile.email);
                println!("Member since: {}", profile.created_at.format("%B %-d, %Y"));
            }
        }

        Commands::Add {
            company,
            position,
            location,
            salary,
            job_type,
            date,
            status,
            url,
            notes,
        } => {
            let job = NewJob {
                owner: String::new(),
                company: required("company", &company)?,
                position: required("position", &position)?,
                location: required("location", &location)?,
                employment_type: label::<EmploymentType>("type", &job_type),
                salary_range: required("salary", &salary)?,
                application_date: date.unwrap_or_else(today),
                status: label::<ApplicationStatus>("status", &status),
                notes: non_empty(notes),
                url: non_empty(url),
            };
            let id = app.add_job(job)?;
            println!("Added application {}", short_id(&id));
        }

        Commands::List { status, search } => {
            let filter = JobFilter {
                search: search.unwrap_or_default(),
                status: status.filter(|s| !s.eq_ignore_ascii_case("all")),
            };
            let jobs = app.load_jobs()?;
            let jobs = filter.apply(jobs);
            if jobs.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<8} {:<10} {:<20} {:<24} {:<16} {:>10}",
                    "ID", "STATUS", "COMPANY", "POSITION", "LOCATION", "APPLIED"
                );
                println!("{}", "-".repeat(93));
                for job in jobs {
                    println!(
                        "{:<8} {:<10} {:<20} {:<24} {:<16} {:>10}",
                        short_id(&job.id),
                        truncate(job.status.as_str(), 10),
                        truncate(&job.company, 18),
                        truncate(&job.position, 22),
                        truncate(&job.location, 14),
                        job.application_date
                    );
                }
            }
        }

        Commands::Show { id } => {
            app.load_job(&id)?;
            if let Some(job) = app.jobs.current_job() {
                print_job(job);
                print_interviews(&app);
            }
        }

        Commands::Edit {
            id,
            company,
            position,
            location,
            salary,
            job_type,
            date,
            status,
            url,
            notes,
        } => {
            let id = app.load_job(&id)?;
            let patch = JobPatch {
                company: company.map(|v| required("company", &v)).transpose()?,
                position: position.map(|v| required("position", &v)).transpose()?,
                location: location.map(|v| required("location", &v)).transpose()?,
                employment_type: job_type.map(|v| label::<EmploymentType>("type", &v)),
                salary_range: salary.map(|v| required("salary", &v)).transpose()?,
                application_date: date,
                status: status.map(|v| label::<ApplicationStatus>("status", &v)),
                notes: optional_text(notes),
                url: optional_text(url),
            };
            if patch.is_empty() {
                println!("Nothing to change.");
            } else {
                app.update_job(&id, &patch)?;
                println!("Updated application {}", short_id(&id));
            }
        }

        Commands::Delete { id, yes } => {
            let id = app.load_job(&id)?;
            if let Some(job) = app.jobs.current_job() {
                println!("{} at {}", job.position, job.company);
            }
            if yes || confirm("Are you sure you want to delete this application?")? {
                app.delete_job(&id)?;
                println!("Deleted application {}", short_id(&id));
            } else {
                println!("Cancelled.");
            }
        }

        Commands::Interview { command } => match command {
            InterviewCommands::Add {
                job,
                date,
                interview_type,
                interviewer,
                notes,
                result,
            } => {
                let job_id = app.load_job(&job)?;
                let interview = NewInterview {
                    job_id,
                    interview_date: date.unwrap_or_else(today),
                    interview_type: label::<InterviewType>("type", &interview_type),
                    interviewer: non_empty(interviewer),
                    notes: non_empty(notes),
                    result: label::<InterviewResult>("result", &result),
                };
                let id = app.add_interview(&interview)?;
                println!("Added interview {}", short_id(&id));
            }

            InterviewCommands::Edit {
                job,
                interview,
                date,
                interview_type,
                interviewer,
                notes,
                result,
            } => {
                app.load_job(&job)?;
                let id = app.find_interview(&interview)?.id.clone();
                let patch = InterviewPatch {
                    interview_date: date,
                    interview_type: interview_type.map(|v| label::<InterviewType>("type", &v)),
                    interviewer: optional_text(interviewer),
                    notes: optional_text(notes),
                    result: result.map(|v| label::<InterviewResult>("result", &v)),
                };
                if patch.is_empty() {
                    println!("Nothing to change.");
                } else {
                    app.update_interview(&id, &patch)?;
                    println!("Updated interview {}", short_id(&id));
                }
            }

            InterviewCommands::Delete { job, interview, yes } => {
                app.load_job(&job)?;
                let id = app.find_interview(&interview)?.id.clone();
                if yes || confirm("Are you sure you want to delete this interview?")? {
                    app.delete_interview(&id)?;
                    println!("Deleted interview {}", short_id(&id));
                } else {
                    println!("Cancelled.");
                }
            }
        },

        Commands::Dashboard => {
            app.load_profile()?;
            let name = app
                .profile
                .profile()
                .map(|p| p.display_name().to_string())
                .unwrap_or_else(|| "User".to_string());
            let jobs = app.load_jobs()?;
            print_dashboard(&name, jobs, today());
        }

        Commands::Browse => {
            tui::run_browse(&mut app)?;
        }
    }

    Ok(())
}

fn print_job(job: &JobApplication) {
    println!("{} at {}", job.position, job.company);
    println!("ID: {}", job.id);
    println!("Status: {}", job.status);
    println!("Location: {}", job.location);
    println!("Type: {}", job.employment_type);
    println!("Salary: {}", job.salary_range);
    println!("Applied: {}", job.application_date.format("%B %-d, %Y"));
    if let Some(url) = &job.url {
        println!("URL: {}", url);
    }

    let progress = ApplicationProgress::of(job.status.kind());
    let filled = (progress.percent / 5) as usize;
    println!("\nProgress: [{}{}] {}%", "#".repeat(filled), ".".repeat(20 - filled), progress.percent);
    for (done, milestone) in [
        (progress.submitted, "Application Submitted"),
        (progress.interviewing, "Interview Process"),
        (progress.offer, "Offer Received"),
    ] {
        println!("  [{}] {}", if done { "x" } else { " " }, milestone);
    }

    if let Some(notes) = &job.notes {
        println!("\n--- Notes ---");
        println!("{}", textwrap::fill(notes, 78));
    }
}

fn print_interviews(app: &App) {
    let interviews = app.jobs.interviews();
    println!("\n--- Interview Timeline ---");
    if interviews.is_empty() {
        println!("No interviews recorded yet.");
    }
    for interview in interviews {
        println!(
            "{:<8} {}  {:<14} {}",
            short_id(&interview.id),
            interview.interview_date,
            interview.interview_type,
            interview.result
        );
        if let Some(interviewer) = &interview.interviewer {
            println!("         with {}", interviewer);
        }
        if let Some(notes) = &interview.notes {
            for line in textwrap::wrap(notes, 68) {
                println!("         {}", line);
            }
        }
    }

    let tally = InterviewTally::of(interviews);
    println!(
        "\nInterviews: {} total, {} passed, {} failed, {} pending",
        tally.total, tally.passed, tally.failed, tally.pending
    );
}

fn print_dashboard(name: &str, jobs: &[JobApplication], today: NaiveDate) {
    let stats = DashboardStats::compute(jobs, today);

    println!("Welcome back, {}!\n", name);
    println!("{:<24} {:>6}", "Total Applications", stats.total);
    println!("{:<24} {:>6}", "Active Applications", stats.active);
    println!("{:<24} {:>6}", "Interviews Scheduled", stats.interview_scheduled);
    println!("{:<24} {:>6}", "Applied Last Week", stats.recent);

    println!("\nResponse rate: {}%", stats.response_rate);
    println!(
        "  Interviews: {}  Offers: {}  Rejections: {}",
        stats.responses.interviews, stats.responses.offers, stats.responses.rejections
    );

    println!("\n--- Status ---");
    if stats.status_breakdown.is_empty() {
        println!("No applications yet.");
    }
    for (status, count) in stats.status_breakdown.iter() {
        println!(
            "{:<12} {:>4}  {:>3}%",
            truncate(status, 12),
            count,
            stats.status_breakdown.share(status)
        );
    }

    println!("\n--- Applications Over Time ---");
    for bucket in &stats.monthly {
        println!("{:<9} {:>4} {}", bucket.label(), bucket.count, "#".repeat(bucket.count.min(50)));
    }

    println!("\n--- Recent Applications ---");
    if jobs.is_empty() {
        println!("No applications yet. Add one with 'jobtrack add'.");
    }
    for job in jobs.iter().take(5) {
        println!(
            "{:<8} {:<10} {:<24} {:<20} {}",
            short_id(&job.id),
            truncate(job.status.as_str(), 10),
            truncate(&job.position, 22),
            truncate(&job.company, 18),
            job.application_date
        );
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Parse a categorical value, warning when it is not one of the known ones.
fn label<K: models::Category>(field: &str, value: &str) -> Label<K> {
    let label = Label::<K>::from_input(value);
    if label.is(K::UNRECOGNIZED) {
        eprintln!(
            "Note: '{}' is not a known {} ({}); storing it as given.",
            label,
            field,
            choices::<K>()
        );
    }
    label
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        bail!("{} is required", field);
    }
    Ok(value.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `None` leaves the field alone; an empty string clears it.
fn optional_text(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| non_empty(Some(v)))
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => prompt_password("Password: "),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PasswordEntry {
    Typing,
    Done,
    Cancelled,
}

fn password_key(password: &mut String, code: KeyCode, modifiers: KeyModifiers) -> PasswordEntry {
    match code {
        KeyCode::Enter => PasswordEntry::Done,
        KeyCode::Esc => PasswordEntry::Cancelled,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => PasswordEntry::Cancelled,
        KeyCode::Backspace => {
            password.pop();
            PasswordEntry::Typing
        }
        KeyCode::Char(c) => {
            password.push(c);
            PasswordEntry::Typing
        }
        _ => PasswordEntry::Typing,
    }
}

/// Read a password with echo off. Piped input is read as a plain line.
fn prompt_password(message: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        return prompt(message);
    }
    print!("{}", message);
    io::stdout().flush()?;

    enable_raw_mode()?;
    let result = read_password_keys();
    disable_raw_mode()?;
    println!();
    result
}

fn read_password_keys() -> Result<String> {
    let mut password = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match password_key(&mut password, key.code, key.modifiers) {
                PasswordEntry::Typing => {}
                PasswordEntry::Done => return Ok(password),
                PasswordEntry::Cancelled => bail!("Cancelled."),
            }
        }
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
