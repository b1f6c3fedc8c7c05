//! ingest - Gmail attachment ingestion worker and document summarizer
//!
//! Each invocation does one thing and exits; scheduling repeated passes is
//! left to cron or a similar external scheduler.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde_json::json;

use ingest::{
    ContentStore, DocumentTextExtractor, FileAttachmentStore, GmailConnector, GoogleCredentials,
    InMemoryTaskStore, IngestOptions, Ingestor, OAuthClient, OpenAiSummarizer, Settings,
    SqliteContentStore, UploadService, UploadedFile, UserCredential,
};

#[derive(Parser)]
#[command(name = "ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database path (overrides DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Google OAuth client credentials file (Cloud Console JSON)
    #[arg(long, global = true, value_name = "FILE")]
    credentials: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Google authorization URL
    AuthUrl,
    /// Authorize a mailbox in the browser and store its credential
    Authorize {
        /// Do not try to open a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// List authorized users
    Users,
    /// Show one authorized user
    User { id: String },
    /// Run one ingestion pass over every authorized user
    RunOnce {
        /// Expected sender of ingestible messages
        #[arg(long, env = "KMRL_SELF_EMAIL")]
        sender: Option<String>,
        /// Remove UNREAD from processed messages
        #[arg(long)]
        mark_read: bool,
    },
    /// Extract and summarize documents, printing task records as JSON
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    let credentials = cli.credentials;

    match cli.command {
        Commands::AuthUrl => {
            println!("{}", oauth_client(&settings, credentials.as_deref())?.authorization_url(None));
            Ok(())
        }
        Commands::Authorize { no_browser } => {
            authorize(&settings, credentials.as_deref(), no_browser)
        }
        Commands::Users => {
            let store = SqliteContentStore::new(&settings.db_path)?;
            let users: Vec<_> = store.list_users()?.iter().map(user_json).collect();
            println!("{}", serde_json::to_string_pretty(&users)?);
            Ok(())
        }
        Commands::User { id } => {
            let store = SqliteContentStore::new(&settings.db_path)?;
            let user = store.get_user(&id)?;
            println!("{}", serde_json::to_string_pretty(&user_json(&user))?);
            Ok(())
        }
        Commands::RunOnce { sender, mark_read } => {
            let sender = sender
                .or_else(|| settings.self_email.clone())
                .context("No sender configured; pass --sender or set KMRL_SELF_EMAIL")?;
            if mark_read {
                settings.mark_read = true;
            }
            run_once(&settings, credentials.as_deref(), sender)
        }
        Commands::Upload { files } => upload(&settings, files),
    }
}

fn oauth_client(settings: &Settings, credentials_file: Option<&Path>) -> Result<OAuthClient> {
    if let Some(path) = credentials_file {
        let credentials = GoogleCredentials::from_file(path)?;
        return Ok(OAuthClient::new(credentials, settings.http_agent()));
    }

    let credentials = GoogleCredentials::load().with_context(|| {
        match GoogleCredentials::default_credentials_path() {
            Some(path) => format!(
                "Google credentials not found; place them at {} or set GCLIENT_ID and GCLIENT_SECRET",
                path.display()
            ),
            None => "Google credentials not found; set GCLIENT_ID and GCLIENT_SECRET".to_string(),
        }
    })?;
    Ok(OAuthClient::new(credentials, settings.http_agent()))
}

/// Credential summary without tokens
fn user_json(user: &UserCredential) -> serde_json::Value {
    json!({
        "id": user.id,
        "email": user.email,
        "hasRefreshToken": user.refresh_token.is_some(),
        "tokenExpiry": user.token_expiry,
    })
}

fn authorize(settings: &Settings, credentials_file: Option<&Path>, no_browser: bool) -> Result<()> {
    let oauth = oauth_client(settings, credentials_file)?;

    let redirect = url::Url::parse(oauth.redirect_uri()).context("Invalid redirect URI")?;
    let host = redirect.host_str().unwrap_or("127.0.0.1");
    let port = redirect
        .port_or_known_default()
        .context("Redirect URI has no port")?;
    let listener = TcpListener::bind((host, port))
        .with_context(|| format!("Failed to listen on {}:{}", host, port))?;

    let auth_url = oauth.authorization_url(None);
    println!("Open this URL to authorize:\n\n{}\n", auth_url);
    if !no_browser && let Err(e) = open::that(&auth_url) {
        warn!("Failed to open browser: {}", e);
    }

    let code = oauth.wait_for_redirect(listener)?;
    let credential = oauth.exchange_code(&code)?;

    let store = SqliteContentStore::new(&settings.db_path)?;
    let id = credential.id.clone();
    store.upsert_user(credential)?;
    info!("Stored credential for {}", id);
    println!("{}", json!({ "message": "Authentication successful", "user_id": id }));
    Ok(())
}

fn run_once(settings: &Settings, credentials_file: Option<&Path>, sender: String) -> Result<()> {
    let store = Arc::new(SqliteContentStore::new(&settings.db_path)?);
    let files = Arc::new(FileAttachmentStore::new(&settings.upload_dir)?);
    let agent = settings.http_agent();
    let connector = Arc::new(GmailConnector::new(oauth_client(settings, credentials_file)?, agent));

    let mut options = IngestOptions::new(sender);
    options.label_name = settings.label_name.clone();
    options.mark_read = settings.mark_read;

    let stats = Ingestor::new(store, files, connector, options).run_once()?;
    println!(
        "{}",
        json!({
            "usersProcessed": stats.users_processed,
            "usersFailed": stats.users_failed,
            "messagesListed": stats.messages_listed,
            "messagesShortCircuited": stats.messages_short_circuited,
            "messagesProcessed": stats.messages_processed,
            "messagesSkipped": stats.messages_skipped,
            "messageErrors": stats.message_errors,
            "attachmentsSaved": stats.attachments_saved,
            "duplicatesSkipped": stats.duplicates_skipped,
            "partsFailed": stats.parts_failed,
            "labelsFailed": stats.labels_failed,
            "durationMs": stats.duration_ms,
        })
    );
    Ok(())
}

fn upload(settings: &Settings, paths: Vec<PathBuf>) -> Result<()> {
    let Some(api_key) = settings.openai_api_key.clone() else {
        bail!("OPENAI_API_KEY is not set");
    };

    let files = paths
        .iter()
        .map(|path| UploadedFile::from_path(path))
        .collect::<Result<Vec<_>>>()?;

    let service = UploadService::new(
        &settings.upload_dir,
        Arc::new(InMemoryTaskStore::new()),
        Arc::new(DocumentTextExtractor::new()),
        Arc::new(OpenAiSummarizer::new(
            api_key,
            settings.openai_model.clone(),
            settings.http_agent(),
        )),
    );

    let handles: Vec<_> = service
        .accept(files)?
        .into_iter()
        .map(|job| job.spawn())
        .collect();

    let mut tasks = Vec::new();
    for handle in handles {
        match handle.join() {
            Ok(result) => tasks.push(result?),
            Err(_) => bail!("Processing thread panicked"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&tasks)?);
    Ok(())
}
