use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{modifiers, presets, ContentArrangement, Table};
use terminal_size::{terminal_size, Width};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use hostroll::config::{self, HostKeyPolicy, Settings};
use hostroll::models::AppState;
use hostroll::provision::batch::{run_batch, BatchKind, BatchReport, RemoteStatus};
use hostroll::provision::executor::SshShell;
use hostroll::provision::rows::{extract_rows, RowShape, SheetFormat};
use hostroll::provision::script::CredentialColumn;
use hostroll::routes::build_router;
use hostroll::services::{export_all_csv, export_host_csv, resolve_install, HostRegistry, InstallRequest, CATALOG};

async fn build_state_from_env(env_file: Option<&str>) -> AppState {
    config::load_env_file(env_file);
    let settings = Settings::from_env();
    let registry = Arc::new(HostRegistry::load(settings.registry_file.clone()).await);
    let shell = Arc::new(SshShell::new(settings.ssh_timeout, settings.host_key_policy.clone()));
    AppState::new(registry, shell, settings)
}

async fn start_server(mut state: AppState, host: &str, port: u16, stylesheet: Option<String>) {
    if let Some(path) = stylesheet {
        match std::fs::read_to_string(&path) {
            Ok(css) => {
                state.custom_css = Some(css);
                tracing::info!("Loaded custom stylesheet from {}", path);
            }
            Err(e) => {
                tracing::error!(%e, "Failed to read custom stylesheet");
                eprintln!("{} {}: {}", yansi::Paint::red("Failed to read custom stylesheet at"), path, e);
                process::exit(1);
            }
        }
    }

    let addr: SocketAddr = match format!("{}:{}", host, port).parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(%e, "Invalid host/port format");
            eprintln!("{}: {}", yansi::Paint::red("Invalid host/port format"), e);
            process::exit(1);
        }
    };
    let hosts = state.registry.len();
    let app = build_router(state);
    tracing::info!(%addr, hosts, "Starting provisioning console");
    println!(
        "{} {}",
        yansi::Paint::new("Web server running on").green(),
        yansi::Paint::new(format!("http://{}", addr)).cyan()
    );
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(%e, "Server encountered an error while running");
                eprintln!("{}: {}", yansi::Paint::new("Server error").red(), e);
                process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!(%e, "Failed to bind to address; is the port already in use?");
            eprintln!(
                "{}: {}\n{}",
                yansi::Paint::new(format!("Failed to bind to {}", addr)).red(),
                e,
                yansi::Paint::new("Please stop any process using this port, or start the server with a different --port value.").yellow()
            );
            process::exit(1);
        }
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    if let Some((Width(w), _)) = terminal_size() {
        table.set_width(w.saturating_sub(4));
    }
    table
}

fn print_settings(settings: &Settings) {
    let mut table = new_table();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["REGISTRY_FILE".to_string(), settings.registry_file.display().to_string()]);
    table.add_row(vec!["UPLOAD_DIR".to_string(), settings.upload_dir.display().to_string()]);
    table.add_row(vec!["SSH_PORT".to_string(), settings.ssh_port.to_string()]);
    table.add_row(vec!["SSH_TIMEOUT_SECS".to_string(), settings.ssh_timeout.as_secs().to_string()]);
    table.add_row(vec!["SSH_HOST_KEY_CHECK".to_string(), settings.host_key_policy.label()]);
    table.add_row(vec!["PACKAGE_MANAGER".to_string(), settings.package_manager.as_str().to_string()]);
    println!("\n{table}\n");
}

fn print_report(report: &BatchReport) {
    println!("{}", report.log.trim_end());
    let remote = match &report.remote {
        RemoteStatus::Skipped => "skipped".to_string(),
        RemoteStatus::Completed { exit_status: Some(code) } => format!("exit {}", code),
        RemoteStatus::Completed { exit_status: None } => "completed".to_string(),
        RemoteStatus::Failed(e) => format!("failed: {}", e),
    };
    let mut table = new_table();
    table.set_header(vec!["Server", "Batch", "Statements", "Rejected", "Remote", "Roster"]);
    table.add_row(vec![
        report.address.clone(),
        report.kind.label().to_string(),
        report.statements.to_string(),
        report.rejected.to_string(),
        remote,
        report.roster_size.to_string(),
    ]);
    println!("\n{table}\n");
    if let Some(e) = &report.persist_error {
        eprintln!("{}: {}", yansi::Paint::new("Failed to save host records").red(), e);
    }
}

async fn read_sheet(path: &Path, shape: RowShape) -> hostroll::provision::rows::RowStream {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{} {}: {}", yansi::Paint::red("Cannot read"), path.display(), e);
            process::exit(1);
        }
    };
    let name = path.to_string_lossy();
    let format = SheetFormat::detect(&name, &bytes);
    match extract_rows(bytes, format, shape) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("{} {}: {}", yansi::Paint::red("Cannot open sheet"), path.display(), e);
            process::exit(1);
        }
    }
}

fn finish_batch(result: Result<BatchReport, hostroll::provision::batch::BatchError>) {
    match result {
        Ok(report) => {
            print_report(&report);
            if report.persist_error.is_some() || report.remote.is_failure() {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}", yansi::Paint::new(e.to_string()).red());
            process::exit(1);
        }
    }
}

#[derive(Parser)]
#[command(
    name = "hostroll",
    author,
    version,
    about = "Batch account provisioning for remote servers",
    long_about = r#"hostroll: register servers and bulk-create or delete OS accounts over SSH from CSV or Excel sheets.

The web console and the terminal commands drive the same pipeline: rows are validated, rendered into one shell script per server, run in a single SSH session, and the local roster is updated to match.

Examples:
  1) Run the console:
      hostroll serve --host 127.0.0.1 --port 8080
  2) Register a server:
      hostroll hosts add 10.0.0.5 root 's3cret'
  3) Create accounts from a sheet:
      hostroll batch create 10.0.0.5 students.xlsx --credential roll
"#,
    after_help = "Use `hostroll <subcommand> --help` to get subcommand specific options and usage examples."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Path to .env file
    #[arg(long, global = true)]
    env_file: Option<String>,
    /// Disable colorized output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web console
    Serve {
        /// Host to bind to (defaults to CONSOLE_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (defaults to CONSOLE_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Path to a custom stylesheet to serve instead of the default
        #[arg(long)]
        stylesheet: Option<String>,
    },
    /// Validate configuration
    #[command(about = "Validate configuration and the host registry.", long_about = "Print the effective settings, load the host registry, and check that the upload directory and known_hosts file (when host key checking is on) are usable.")]
    CheckConfig,
    /// Manage registered servers
    Hosts {
        #[command(subcommand)]
        sub: HostCommands,
    },
    /// Write account rosters as CSV
    #[command(about = "Export account rosters as CSV", long_about = "Write the roster of one server (`--host`) or of all servers to a CSV file or stdout. Columns: Username, Password, Server IP, Notes.")]
    Export {
        #[arg(long)]
        host: Option<String>,
        /// Output file; stdout when omitted
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Run a provisioning batch against one server
    #[command(about = "Run a provisioning batch from the terminal", long_about = "Runs the same pipeline as the web console: the sheet is validated, one script is sent over a single SSH session, and the roster is updated to the intended state.")]
    Batch {
        #[command(subcommand)]
        sub: BatchCommands,
    },
}

#[derive(Subcommand)]
enum HostCommands {
    #[command(about = "List registered servers")]
    List,
    #[command(about = "Register a server or update its credentials", long_about = "Register a server with its admin credentials. Re-registering an existing server replaces the credentials and keeps its account roster.")]
    Add { address: String, root_username: String, root_password: String },
    #[command(about = "Show the account roster of a server")]
    Show { address: String },
}

#[derive(Subcommand)]
enum BatchCommands {
    #[command(about = "Create accounts from a sheet", long_about = "Rows are (username, password) or, with `--credential roll`, (name, roll number) giving the password `name@roll`. The first row is a header.")]
    Create {
        address: String,
        file: PathBuf,
        /// password | roll (default: password for CSV, roll for workbooks)
        #[arg(long)]
        credential: Option<String>,
    },
    #[command(about = "Delete accounts listed in a sheet")]
    Delete { address: String, file: PathBuf },
    #[command(about = "Delete every account on the roster")]
    DeleteAll { address: String },
    #[command(about = "Install software", long_about = "Install an allow-listed bundle by name, or a custom package with `--custom` (shell metacharacters are stripped and only the first word is kept).")]
    Install {
        address: String,
        /// Catalog entry name
        software: Option<String>,
        #[arg(long, conflicts_with = "software")]
        custom: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        yansi::whenever(yansi::Condition::NEVER);
    }

    let state = build_state_from_env(cli.env_file.as_deref()).await;

    // Serve the web console by default
    let Some(command) = cli.command else {
        start_server(state, &config::get_console_host(), config::get_console_port(), None).await;
        return;
    };

    match command {
        Commands::Serve { host, port, stylesheet } => {
            let host = host.unwrap_or_else(config::get_console_host);
            let port = port.unwrap_or_else(config::get_console_port);
            start_server(state, &host, port, stylesheet).await;
        }
        Commands::CheckConfig => {
            print_settings(&state.settings);
            let mut ok = true;
            println!(
                "{} {} ({} servers)",
                yansi::Paint::new("Host registry:").bold(),
                state.registry.path().display(),
                state.registry.len()
            );
            if let Err(e) = tokio::fs::create_dir_all(&state.settings.upload_dir).await {
                eprintln!("{}: {}", yansi::Paint::new("Upload directory is not writable").red(), e);
                ok = false;
            }
            if let HostKeyPolicy::KnownHosts(path) = &state.settings.host_key_policy {
                if !path.exists() {
                    eprintln!("{} {}", yansi::Paint::new("known_hosts file not found:").red(), path.display());
                    ok = false;
                }
            }
            if !ok {
                process::exit(1);
            }
            println!("{}", yansi::Paint::new("Configuration looks valid").green());
        }
        Commands::Hosts { sub } => match sub {
            HostCommands::List => {
                let hosts = state.registry.snapshot();
                if hosts.is_empty() {
                    println!("(no servers registered)");
                    return;
                }
                let mut table = new_table();
                table.set_header(vec!["Server", "Admin", "Accounts"]);
                for (address, rec) in &hosts {
                    table.add_row(vec![address.clone(), rec.root_username.clone(), rec.accounts.len().to_string()]);
                }
                println!("\n{table}\n");
            }
            HostCommands::Add { address, root_username, root_password } => {
                match state.registry.register(&address, &root_username, &root_password).await {
                    Ok(true) => println!("{} {}", yansi::Paint::new("Registered").green(), address.trim()),
                    Ok(false) => println!("{} {}", yansi::Paint::new("Updated credentials for").green(), address.trim()),
                    Err(e) => {
                        eprintln!("{}: {}", yansi::Paint::new("Failed to register server").red(), e);
                        process::exit(1);
                    }
                }
            }
            HostCommands::Show { address } => {
                let Some(rec) = state.registry.get(&address) else {
                    eprintln!("{} {}", yansi::Paint::new("Server not found:").red(), address);
                    process::exit(1);
                };
                println!("{} {} as {}", yansi::Paint::new("Server").bold(), address, rec.root_username);
                let mut table = new_table();
                table.set_header(vec!["Username", "Password"]);
                for account in &rec.accounts {
                    table.add_row(vec![account.username.clone(), account.password.clone()]);
                }
                println!("\n{table}\n");
            }
        },
        Commands::Export { host, output } => {
            let body = match &host {
                Some(address) => match state.registry.get(address) {
                    Some(rec) => export_host_csv(address, &rec),
                    None => {
                        eprintln!("{} {}", yansi::Paint::new("Server not found:").red(), address);
                        process::exit(1);
                    }
                },
                None => export_all_csv(&state.registry.snapshot()),
            };
            let body = match body {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("{}: {}", yansi::Paint::new("Export failed").red(), e);
                    process::exit(1);
                }
            };
            match output {
                Some(path) => {
                    if let Err(e) = tokio::fs::write(&path, &body).await {
                        eprintln!("{} {}: {}", yansi::Paint::red("Cannot write"), path.display(), e);
                        process::exit(1);
                    }
                    println!("{} {}", yansi::Paint::new("Wrote").green(), path.display());
                }
                None => print!("{}", String::from_utf8_lossy(&body)),
            }
        }
        Commands::Batch { sub } => {
            let settings = state.settings.clone();
            let registry = state.registry.clone();
            let shell = state.shell.clone();
            match sub {
                BatchCommands::Create { address, file, credential } => {
                    let credential = match credential.as_deref().map(CredentialColumn::from_str) {
                        Some(Some(c)) => c,
                        Some(None) => {
                            eprintln!("{}", yansi::Paint::new("--credential must be `password` or `roll`").red());
                            process::exit(1);
                        }
                        None => match SheetFormat::from_filename(&file.to_string_lossy()) {
                            Some(SheetFormat::Workbook) => CredentialColumn::RollNumber,
                            _ => CredentialColumn::Password,
                        },
                    };
                    let rows = read_sheet(&file, RowShape::CREATE).await;
                    let result = run_batch(&registry, shell.as_ref(), &settings, &address, BatchKind::Create, |_, b| {
                        b.add_create_rows(rows, credential)
                    })
                    .await;
                    finish_batch(result);
                }
                BatchCommands::Delete { address, file } => {
                    let rows = read_sheet(&file, RowShape::DELETE).await;
                    let result = run_batch(&registry, shell.as_ref(), &settings, &address, BatchKind::DeleteSheet, |_, b| {
                        b.add_delete_rows(rows)
                    })
                    .await;
                    finish_batch(result);
                }
                BatchCommands::DeleteAll { address } => {
                    let result = run_batch(&registry, shell.as_ref(), &settings, &address, BatchKind::DeleteAll, |host, b| {
                        b.delete_roster(host)
                    })
                    .await;
                    finish_batch(result);
                }
                BatchCommands::Install { address, software, custom } => {
                    let request = match (software, custom) {
                        (_, Some(custom)) => InstallRequest::Custom(custom),
                        (Some(name), None) => InstallRequest::Catalog(name),
                        (None, None) => {
                            let names: Vec<&str> = CATALOG.iter().map(|s| s.name).collect();
                            eprintln!(
                                "{} {}",
                                yansi::Paint::new("Name a catalog entry or pass --custom. Catalog:").red(),
                                names.join(", ")
                            );
                            process::exit(1);
                        }
                    };
                    let operation = match resolve_install(&request) {
                        Ok(op) => op,
                        Err(e) => {
                            eprintln!("{}", yansi::Paint::new(e.to_string()).red());
                            process::exit(1);
                        }
                    };
                    let result = run_batch(&registry, shell.as_ref(), &settings, &address, BatchKind::Install, |_, b| {
                        b.push(operation)
                    })
                    .await;
                    finish_batch(result);
                }
            }
        }
    }
}
