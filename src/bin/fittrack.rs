// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FitTrack command-line client.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use fittrack::client::{
    ActivityDraft, ActivityUpdate, ApiClient, FitTrackApi, SessionStorage, Store,
};
use fittrack::models::{Activity, KNOWN_ACTIVITY_TYPES};
use fittrack::time_utils::{format_duration_minutes, format_utc_rfc3339, parse_activity_date, today};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "fittrack", version, about = "Log and browse FitTrack activities")]
struct Cli {
    /// Base URL of the FitTrack API
    #[arg(long, env = "FITTRACK_API_URL", default_value = "http://localhost:5000")]
    api_url: String,

    /// Where the session token and cached data are kept
    #[arg(long, env = "FITTRACK_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Log requests and storage activity to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and log in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "FITTRACK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "FITTRACK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the local session
    Logout,
    /// Show who is logged in
    Whoami,
    /// List your activities, or everyone's with --all
    List {
        #[arg(long)]
        all: bool,
    },
    /// Show one activity
    Show { id: Uuid },
    /// Log a new activity
    Add {
        /// Course, Marche, Vélo, Natation, Gym, or anything else
        #[arg(long = "type")]
        activity_type: String,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Minutes
        #[arg(long)]
        duration: i32,
        /// Kilometers
        #[arg(long)]
        distance: Option<f64>,
        /// Image file to upload and attach
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Change fields of one of your activities
    Edit {
        id: Uuid,
        #[arg(long = "type")]
        activity_type: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        /// Minutes
        #[arg(long)]
        duration: Option<i32>,
        /// Kilometers
        #[arg(long)]
        distance: Option<f64>,
        /// Image file to upload and attach instead of the current one
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Delete one of your activities
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Plain logging to stderr so stdout stays clean for output.
fn init_logging(verbose: bool) {
    let default = if verbose { "fittrack=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Only fails if a subscriber is already set.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_session_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => Path::new(&home).join(".fittrack").join("session.json"),
        None => PathBuf::from(".fittrack-session.json"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let api = ApiClient::new(&cli.api_url)?;
    let storage = SessionStorage::file(cli.session_file.unwrap_or_else(default_session_file));
    let mut store = Store::new(api, storage);

    match cli.command {
        Command::Signup { email, password } => {
            store.signup(&email, &password).await?;
            report_login(&store);
        }
        Command::Login { email, password } => {
            store.login(&email, &password).await?;
            report_login(&store);
        }
        Command::Logout => {
            store.logout();
            println!("Logged out");
        }
        Command::Whoami => {
            require_session(&mut store).await?;
            match &store.state().user {
                Some(user) => println!("{} ({})", user.email, user.id),
                None => println!("Logged in"),
            }
        }
        Command::List { all } => {
            let activities = if all {
                // The feed may be public, so a missing session is fine here.
                if let Err(e) = store.restore_session().await {
                    tracing::debug!(error = %e, "Continuing without a session");
                }
                store.all_activities().await?
            } else {
                require_session(&mut store).await?;
                store.state().activities.clone()
            };
            print_activities(&activities);
        }
        Command::Show { id } => {
            let activity = store.api().get_activity(id).await?;
            print_activity_details(&activity);
        }
        Command::Add {
            activity_type,
            date,
            duration,
            distance,
            photo,
        } => {
            require_session(&mut store).await?;

            let date = match date {
                Some(raw) => parse_activity_date(&raw)
                    .with_context(|| format!("invalid date {raw:?}, expected YYYY-MM-DD"))?,
                None => today(),
            };
            if !KNOWN_ACTIVITY_TYPES.contains(&activity_type.as_str()) {
                tracing::info!(activity_type = %activity_type, "Using a custom activity type");
            }

            let photo = match photo {
                Some(path) => Some(upload_photo(&store, &path).await?),
                None => None,
            };

            let activity = store
                .create_activity(ActivityDraft {
                    activity_type,
                    date,
                    duration,
                    distance,
                    photo,
                })
                .await?;
            println!("Created {}", activity.id);
            print_activities(std::slice::from_ref(&activity));
        }
        Command::Edit {
            id,
            activity_type,
            date,
            duration,
            distance,
            photo,
        } => {
            let date = date
                .map(|raw| {
                    parse_activity_date(&raw)
                        .with_context(|| format!("invalid date {raw:?}, expected YYYY-MM-DD"))
                })
                .transpose()?;
            let mut update = ActivityUpdate {
                activity_type,
                date,
                duration,
                distance,
                photo: None,
            };
            if update.is_empty() && photo.is_none() {
                bail!("nothing to change, pass at least one field to update");
            }

            require_session(&mut store).await?;
            if let Some(path) = photo {
                update.photo = Some(upload_photo(&store, &path).await?);
            }

            let activity = store.update_activity(id, update).await?;
            println!("Updated {}", activity.id);
            print_activities(std::slice::from_ref(&activity));
        }
        Command::Delete { id } => {
            require_session(&mut store).await?;
            store.delete_activity(id).await?;
            println!("Deleted {id}");
        }
    }

    Ok(())
}

async fn require_session(store: &mut Store<ApiClient>) -> anyhow::Result<()> {
    match store.restore_session().await {
        Ok(true) => Ok(()),
        Ok(false) => bail!("not logged in, run `fittrack login` first"),
        Err(e) if e.status() == Some(401) => {
            Err(e).context("saved session is no longer valid, please log in again")
        }
        Err(e) => Err(e).context("could not reach the FitTrack API"),
    }
}

fn report_login(store: &Store<ApiClient>) {
    let state = store.state();
    if let Some(user) = &state.user {
        println!("Logged in as {} ({})", user.email, user.id);
    }
    match &state.error {
        Some(error) => eprintln!("warning: could not load activities: {error}"),
        None => println!("{} activities", state.activities.len()),
    }
}

fn content_type_for_path(path: &Path) -> anyhow::Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    Ok(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => bail!("unsupported photo file {}", path.display()),
    })
}

async fn upload_photo(store: &Store<ApiClient>, path: &Path) -> anyhow::Result<String> {
    let content_type = content_type_for_path(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let stored = store.upload_photo(content_type, bytes).await?;
    tracing::debug!(key = %stored.key, "Uploaded photo");
    Ok(stored.url)
}

fn print_activities(activities: &[Activity]) {
    if activities.is_empty() {
        println!("No activities");
        return;
    }
    for a in activities {
        println!(
            "{}  {}  {:<10} {:>9}  {:>7.2} km{}",
            a.id,
            a.date,
            a.activity_type,
            format_duration_minutes(a.duration),
            a.distance,
            if a.photo.is_some() { "  [photo]" } else { "" }
        );
    }
}

fn print_activity_details(a: &Activity) {
    println!("id:        {}", a.id);
    println!("type:      {}", a.activity_type);
    println!("date:      {}", a.date);
    println!("duration:  {}", format_duration_minutes(a.duration));
    println!("distance:  {:.2} km", a.distance);
    if let Some(photo) = &a.photo {
        println!("photo:     {photo}");
    }
    println!("owner:     {}", a.owner_id);
    println!("created:   {}", format_utc_rfc3339(a.created_at));
}
