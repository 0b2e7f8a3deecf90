use clap::{Args, Parser, Subcommand};
use genify::api::{BrandPreferences, Project, ProjectFilter, ProjectStatus};
use genify::app::{App, AppError};
use genify::chat::ChatState;
use genify::config::{ClientConfig, ConfigError};
use genify::generation::{GenerationError, GenerationKind, GenerationRequest, TaskId, ToneParams};
use genify::notify::NotificationEvent;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    App(#[from] AppError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("sign-in failed")]
    LoginFailed,
    #[error("command did not complete; see notifications above")]
    Incomplete,
    #[error("invalid --field `{0}`; expected key=value")]
    InvalidField(String),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stdin read failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "genify", about = "Genify content generation CLI")]
struct Cli {
    #[arg(long, env = "GENIFY_GENERATION_URL")]
    generation_url: Option<String>,

    #[arg(long, env = "GENIFY_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "GENIFY_EMAIL", default_value = "demo@genify.com")]
    email: String,

    #[arg(long, env = "GENIFY_PASSWORD", default_value = "demo", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate content and wait for the result.
    Generate(PromptArgs),
    /// Submit a generation request and print its task id.
    Submit(PromptArgs),
    /// Wait for the result of a previously submitted task.
    Result { task_id: String },
    Brand(BrandCommand),
    Projects(ProjectsCommand),
    /// Chat with the assistant; reads lines from stdin when no message is given.
    Chat { message: Vec<String> },
}

#[derive(Args, Debug)]
struct PromptArgs {
    /// One of: general, blog, article, email, caption, hashtags, outreach.
    kind: GenerationKind,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    tone: Option<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    sample: Option<String>,
    /// Extra request field as key=value; JSON values are accepted.
    #[arg(long = "field")]
    fields: Vec<String>,
}

#[derive(Args, Debug)]
struct BrandCommand {
    #[command(subcommand)]
    command: BrandSubcommand,
}

#[derive(Subcommand, Debug)]
enum BrandSubcommand {
    Get,
    Set {
        #[arg(long)]
        tone: String,
        #[arg(long)]
        style: String,
        #[arg(long, default_value = "")]
        sample1: String,
        #[arg(long, default_value = "")]
        sample2: String,
    },
}

#[derive(Args, Debug)]
struct ProjectsCommand {
    #[command(subcommand)]
    command: ProjectsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProjectsSubcommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        status: Option<ProjectStatus>,
    },
    Show {
        project_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if cli.generation_url.is_some() || cli.api_url.is_some() {
        let generation_url = cli.generation_url.clone().unwrap_or_else(|| config.generation_url.clone());
        let api_url = cli.api_url.clone().unwrap_or_else(|| config.api_url.clone());
        config = config.with_urls(&generation_url, &api_url)?;
    }

    let app = App::start(config)?;
    let mut notifications = app.notifications().subscribe();
    let cancel = app.cancellation();
    spawn_ctrl_c(cancel.clone());

    let result = run(&app, cli, &cancel, &mut notifications).await;
    echo_notifications(&mut notifications);
    app.shutdown();
    result
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted; cancelling outstanding requests");
            cancel.cancel();
        }
    });
}

async fn run(
    app: &App,
    cli: Cli,
    cancel: &CancellationToken,
    notifications: &mut broadcast::Receiver<NotificationEvent>,
) -> Result<(), CliError> {
    if app.login(&cli.email, &cli.password).await.is_none() {
        return Err(CliError::LoginFailed);
    }

    match cli.command {
        Command::Generate(args) => {
            let kind = args.kind;
            let request = build_request(args)?;
            let text = app.generate(kind, request, cancel).await.ok_or(CliError::Incomplete)?;
            println!("{text}");
        }
        Command::Submit(args) => {
            let kind = args.kind;
            let handle = app.generation().submit(kind, build_request(args)?).await?;
            println!("{}", handle.task_id);
        }
        Command::Result { task_id } => {
            let text = app.generation().await_result(&TaskId::new(task_id), cancel).await?;
            println!("{text}");
        }
        Command::Brand(brand) => run_brand(app, brand).await?,
        Command::Projects(projects) => run_projects(app, projects).await?,
        Command::Chat { message } => run_chat(app, message, cancel, notifications).await?,
    }
    Ok(())
}

async fn run_brand(app: &App, brand: BrandCommand) -> Result<(), CliError> {
    match brand.command {
        BrandSubcommand::Get => {
            let prefs = app.load_brand_voice().await.ok_or(CliError::Incomplete)?;
            print_json(&prefs)
        }
        BrandSubcommand::Set { tone, style, sample1, sample2 } => {
            let prefs = BrandPreferences::with_samples(tone, style, &sample1, &sample2);
            if app.save_brand_voice(prefs).await { Ok(()) } else { Err(CliError::Incomplete) }
        }
    }
}

async fn run_projects(app: &App, projects: ProjectsCommand) -> Result<(), CliError> {
    match projects.command {
        ProjectsSubcommand::List { search, brand, user, status } => {
            let filter = ProjectFilter { search, brand_id: brand, user_id: user, status };
            let projects = app.projects(&filter).await.ok_or(CliError::Incomplete)?;
            for project in &projects {
                println!("{}\t{}\t{}\t{}%", project.id, project.status, project.title, project.progress);
            }
            Ok(())
        }
        ProjectsSubcommand::Show { project_id } => {
            let project = app.project(&project_id).await.ok_or(CliError::Incomplete)?;
            print_project(&project)
        }
    }
}

async fn run_chat(
    app: &App,
    message: Vec<String>,
    cancel: &CancellationToken,
    notifications: &mut broadcast::Receiver<NotificationEvent>,
) -> Result<(), CliError> {
    let mut chat = ChatState::new();
    if !message.is_empty() {
        let reply = app.chat(&mut chat, &message.join(" "), cancel).await.ok_or(CliError::Incomplete)?;
        println!("{}", reply.text);
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if cancel.is_cancelled() {
            break;
        }
        if let Some(reply) = app.chat(&mut chat, &line, cancel).await {
            println!("{}", reply.text);
        }
        echo_notifications(notifications);
    }
    Ok(())
}

fn build_request(args: PromptArgs) -> Result<GenerationRequest, CliError> {
    let params = ToneParams { tone: args.tone, style: args.style, sample: args.sample };
    let mut request = GenerationRequest::new(args.prompt).with_params(params);
    for field in args.fields {
        let Some((key, raw)) = field.split_once('=') else {
            return Err(CliError::InvalidField(field));
        };
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        request = request.with_field(key.trim(), value);
    }
    Ok(request)
}

fn echo_notifications(rx: &mut broadcast::Receiver<NotificationEvent>) {
    while let Ok(event) = rx.try_recv() {
        if let NotificationEvent::Shown(n) = event {
            eprintln!("[{:?}] {}", n.kind, n.message);
        }
    }
}

fn print_project(project: &Project) -> Result<(), CliError> {
    print_json(project)?;
    for (status, tasks) in project.tasks_by_status() {
        println!("\n{status} ({})", tasks.len());
        for task in tasks {
            println!("  - {} [{:?}]", task.title, task.priority);
        }
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
