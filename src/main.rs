use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use keptn_utils::config::{self, Config};
use keptn_utils::events::{receiver, Dispatcher, EventHandler, KeptnEvent};
use keptn_utils::store::{self, Resource, ResourceClient, Scope, TransportConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Client for the keptn configuration service and event receiver
#[derive(Parser, Debug)]
#[command(name = "keptn-utils", version, about, long_about = None)]
struct Args {
    /// Configuration service endpoint (host[:port])
    #[arg(long, env = "CONFIGURATION_SERVICE", global = true)]
    endpoint: Option<String>,

    /// API token
    #[arg(long, env = "KEPTN_API_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Header the API token is sent in
    #[arg(long, global = true)]
    auth_header: Option<String>,

    /// http or https
    #[arg(long, global = true)]
    scheme: Option<String>,

    /// Skip TLS certificate verification (`--insecure=false` turns a saved setting off)
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    insecure: Option<bool>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ScopeArgs {
    /// Project name
    #[arg(long)]
    project: String,

    /// Stage name
    #[arg(long)]
    stage: Option<String>,

    /// Service name (requires --stage)
    #[arg(long, requires = "stage")]
    service: Option<String>,
}

impl ScopeArgs {
    fn scope(&self) -> Result<Scope> {
        Scope::from_parts(&self.project, self.stage.as_deref(), self.service.as_deref())
            .context("--service requires --stage")
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a resource
    Get {
        #[command(flatten)]
        scope: ScopeArgs,
        uri: String,
        /// Write the content to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Update a single resource from a file
    Put {
        #[command(flatten)]
        scope: ScopeArgs,
        uri: String,
        file: PathBuf,
    },
    /// Create resources from files, given as URI=PATH or PATH
    Create {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Update resources from files, given as URI=PATH or PATH
    Update {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Delete a resource
    Delete {
        #[command(flatten)]
        scope: ScopeArgs,
        uri: String,
    },
    /// List every resource of a stage
    List {
        #[arg(long)]
        project: String,
        #[arg(long)]
        stage: String,
    },
    /// Store a packaged Helm chart for a service
    StoreChart {
        #[arg(long)]
        project: String,
        #[arg(long)]
        stage: String,
        #[arg(long)]
        service: String,
        chart_name: String,
        file: PathBuf,
    },
    /// Download a packaged Helm chart of a service
    GetChart {
        #[arg(long)]
        project: String,
        #[arg(long)]
        stage: String,
        #[arg(long)]
        service: String,
        chart_name: String,
        output: PathBuf,
    },
    /// Receive keptn events and print them as JSON lines
    Listen {
        /// Port to listen on
        #[arg(long, env = "RCV_PORT")]
        port: Option<u16>,
        /// Path to listen on
        #[arg(long, env = "RCV_PATH")]
        path: Option<String>,
    },
    /// Save the global options to ~/.keptn/config.json
    Configure,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Cannot open log file {}: {}", log_path.display(), err);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("keptn-utils started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(dir) = config::keptn_dir() {
        return dir.join("keptn-utils.log");
    }
    PathBuf::from("keptn-utils.log")
}

/// Settings from the config file with command-line values on top
fn effective_config(args: &Args) -> Config {
    let mut config = Config::load();
    config.merge(Config {
        endpoint: args.endpoint.clone(),
        scheme: args.scheme.clone(),
        auth_token: args.token.clone(),
        auth_header: args.auth_header.clone(),
        insecure_skip_verify: args.insecure,
        ..Default::default()
    });
    config
}

fn build_client(config: &Config) -> Result<ResourceClient> {
    let transport = TransportConfig::builder(&config.effective_endpoint())
        .scheme(config.effective_scheme()?)
        .auth(
            config.auth_token.as_deref().unwrap_or_default(),
            &config.effective_auth_header(),
        )
        .insecure_skip_verify(config.effective_insecure_skip_verify())
        .build()?;
    Ok(ResourceClient::new(transport))
}

/// Cancel the returned token on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            trigger.cancel();
        }
    });
    token
}

/// Read `URI=PATH` or `PATH` arguments into resources
fn read_resources(files: &[String]) -> Result<Vec<Resource>> {
    files
        .iter()
        .map(|entry| {
            let (uri, path) = entry.split_once('=').unwrap_or((entry.as_str(), entry.as_str()));
            let content = std::fs::read(config::expand_tilde(path))
                .with_context(|| format!("Failed to read {}", path))?;
            Ok(Resource::new(uri, content))
        })
        .collect()
}

fn write_output(content: &[u8], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Prints every dispatched event as one JSON line
struct JsonLinePrinter;

#[async_trait]
impl EventHandler for JsonLinePrinter {
    async fn handle(&self, event: KeptnEvent, keptn_context: &str, event_id: &str) -> Result<()> {
        let line = serde_json::json!({
            "type": event.event_type(),
            "id": event_id,
            "shkeptncontext": keptn_context,
            "data": event.data(),
        });
        println!("{}", line);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(&args).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: &Args) -> Result<()> {
    let config = effective_config(args);
    let client = || -> Result<ResourceClient> {
        let client = build_client(&config)?.with_cancellation(cancel_on_ctrl_c());
        tracing::info!("Using configuration service {}", client.transport().url(""));
        Ok(client)
    };

    match &args.command {
        Command::Get { scope, uri, output } => {
            let resource = client()?.get_resource(&scope.scope()?, uri).await?;
            write_output(&resource.content, output.as_deref())?;
        }
        Command::Put { scope, uri, file } => {
            let content = std::fs::read(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let version = client()?
                .update_resource(&scope.scope()?, &Resource::new(uri, content))
                .await?;
            println!("{}", version);
        }
        Command::Create { scope, files } => {
            let version = client()?
                .create_resources(&scope.scope()?, &read_resources(files)?)
                .await?;
            println!("{}", version);
        }
        Command::Update { scope, files } => {
            let version = client()?
                .update_resources(&scope.scope()?, &read_resources(files)?)
                .await?;
            println!("{}", version);
        }
        Command::Delete { scope, uri } => {
            client()?.delete_resource(&scope.scope()?, uri).await?;
        }
        Command::List { project, stage } => {
            for resource in client()?.list_stage_resources(project, stage).await? {
                println!("{}", resource.uri);
            }
        }
        Command::StoreChart {
            project,
            stage,
            service,
            chart_name,
            file,
        } => {
            let chart = std::fs::read(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let version =
                store::store_chart(&client()?, project, stage, service, chart_name, &chart).await?;
            println!("{}", version);
        }
        Command::GetChart {
            project,
            stage,
            service,
            chart_name,
            output,
        } => {
            let chart = store::get_chart(&client()?, project, stage, service, chart_name).await?;
            write_output(&chart, Some(output))?;
        }
        Command::Listen { port, path } => {
            let mut receiver_config = config.effective_receiver();
            if let Some(port) = port {
                receiver_config.port = *port;
            }
            if let Some(path) = path {
                receiver_config.path = path.clone();
            }
            receiver::serve(&receiver_config, Dispatcher::new(JsonLinePrinter), cancel_on_ctrl_c())
                .await
                .context("Event receiver failed")?;
        }
        Command::Configure => {
            let path = config.save()?;
            println!("Saved configuration to {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_service_requires_stage() {
        let result = Args::try_parse_from([
            "keptn-utils",
            "get",
            "--project",
            "p",
            "--service",
            "svc",
            "values.yaml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_insecure_flag_values() {
        fn parse(extra: &[&str]) -> Option<bool> {
            let mut argv = vec!["keptn-utils"];
            argv.extend_from_slice(extra);
            argv.extend(["delete", "--project", "p", "values.yaml"]);
            Args::try_parse_from(argv).unwrap().insecure
        }
        assert_eq!(parse(&[]), None);
        assert_eq!(parse(&["--insecure"]), Some(true));
        assert_eq!(parse(&["--insecure=false"]), Some(false));
    }

    #[test]
    fn test_parse_get_with_scope() {
        let args = Args::try_parse_from([
            "keptn-utils",
            "get",
            "--project",
            "p",
            "--stage",
            "s",
            "values.yaml",
        ])
        .unwrap();
        let Command::Get { scope, uri, .. } = args.command else {
            panic!("expected get");
        };
        assert_eq!(scope.scope().unwrap(), Scope::stage("p", "s"));
        assert_eq!(uri, "values.yaml");
    }

    #[test]
    fn test_read_resources_uri_mapping() {
        let dir = std::env::temp_dir().join(format!("keptn-utils-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("values.yaml");
        std::fs::write(&file, "replicas: 1").unwrap();

        let entry = format!("helm/values.yaml={}", file.display());
        let resources = read_resources(&[entry]).unwrap();

        assert_eq!(resources[0].uri, "helm/values.yaml");
        assert_eq!(resources[0].content, b"replicas: 1");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
