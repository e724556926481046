use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use specbind_core::config::{self, CONFIG_FILE_NAME, SpecbindConfig};
use specbind_core::parse::{self, spec::SwaggerSpec};
use specbind_core::{Api, ApiOptions, Operation};

#[derive(Parser)]
#[command(
    name = "specbind",
    about = "Resolve Swagger 2.0 operations into handlers, security strategies and body schemas",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every operation and fail on the first invalid one
    Validate {
        /// Path to the Swagger spec file (YAML or JSON)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print the resolved operations of a spec
    Routes {
        /// Path to the Swagger spec file (YAML or JSON)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "yaml")]
        format: RoutesFormat,

        /// Skip invalid operations instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Initialize a new specbind configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, ValueEnum)]
enum RoutesFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { input } => cmd_validate(input),

        Commands::Routes {
            input,
            format,
            lenient,
        } => cmd_routes(input, format, lenient),

        Commands::Init { force } => cmd_init(force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "specbind", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Try to load the project config file from the current directory.
fn try_load_config() -> Result<SpecbindConfig> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    Ok(config::load_config(&config_path)?.unwrap_or_default())
}

fn load_spec(path: &Path) -> Result<SwaggerSpec> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");

    let parsed = match ext {
        "json" => parse::from_json(&content),
        _ => parse::from_yaml(&content),
    }
    .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(parsed)
}

fn cmd_validate(input: Option<PathBuf>) -> Result<()> {
    let cfg = try_load_config()?;
    let input = input.unwrap_or_else(|| PathBuf::from(&cfg.input));
    let spec = load_spec(&input)?;

    let options = ApiOptions {
        strict: true,
        ..ApiOptions::from(&cfg)
    };
    let api = Api::from_spec(&spec, &options)
        .with_context(|| format!("invalid specification {}", input.display()))?;

    let enforced = api
        .operations()
        .iter()
        .filter(|op| op.security_strategy().is_enforced())
        .count();
    let with_body = api
        .operations()
        .iter()
        .filter(|op| matches!(op.body_schema(), Ok(Some(_))))
        .count();
    let missing_ids: Vec<String> = api
        .operations()
        .iter()
        .filter(|op| op.operation_id().is_none())
        .map(|op| format!("{} {}", op.method(), op.path()))
        .collect();

    eprintln!(
        "Valid Swagger {} spec: {} {}",
        spec.swagger,
        api.title(),
        api.version()
    );
    eprintln!("  Base path: {}", display_base_path(api.base_path()));
    eprintln!("  Paths: {}", spec.paths.len());
    eprintln!("  Definitions: {}", spec.definitions.len());
    eprintln!("  Operations: {}", api.operations().len());
    eprintln!("  With body schema: {with_body}");
    eprintln!("  OAuth enforced: {enforced}");
    for route in &missing_ids {
        eprintln!("  warning: {route} has no operationId and cannot be bound to a handler");
    }

    eprintln!("Validation successful.");
    Ok(())
}

fn cmd_routes(input: Option<PathBuf>, format: RoutesFormat, lenient: bool) -> Result<()> {
    let cfg = try_load_config()?;
    let input = input.unwrap_or_else(|| PathBuf::from(&cfg.input));
    let spec = load_spec(&input)?;

    let mut options = ApiOptions::from(&cfg);
    if lenient {
        options.strict = false;
    }
    let api = Api::from_spec(&spec, &options)
        .with_context(|| format!("invalid specification {}", input.display()))?;

    let summary = build_routes_summary(&api);

    match format {
        RoutesFormat::Yaml => {
            let yaml = serde_yaml_ng::to_string(&summary)?;
            print!("{yaml}");
        }
        RoutesFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{json}");
        }
    }

    Ok(())
}

fn display_base_path(base_path: &str) -> &str {
    if base_path.is_empty() { "/" } else { base_path }
}

fn build_routes_summary(api: &Api) -> serde_json::Value {
    let routes: Vec<serde_json::Value> = api
        .operations()
        .iter()
        .map(|op| route_summary(api, op))
        .collect();

    let skipped: Vec<serde_json::Value> = api
        .skipped()
        .iter()
        .map(|s| {
            serde_json::json!({
                "method": s.method,
                "path": s.path,
                "error": s.error.message,
            })
        })
        .collect();

    serde_json::json!({
        "info": {
            "title": api.title(),
            "version": api.version(),
        },
        "base_path": api.base_path(),
        "routes": routes,
        "skipped": skipped,
    })
}

fn route_summary(api: &Api, op: &Operation) -> serde_json::Value {
    let parameters: Vec<String> = op
        .parameters()
        .unwrap_or_default()
        .iter()
        .map(|p| format!("{} ({})", p.name, p.location.as_str()))
        .collect();

    serde_json::json!({
        "method": op.method(),
        "path": api.route_path(op.path()),
        "operation_id": op.operation_id(),
        "summary": op.summary(),
        "parameters": parameters,
        "produces": op.produces(),
        "consumes": op.consumes(),
        "security": op.security_strategy(),
        "has_body_schema": matches!(op.body_schema(), Ok(Some(_))),
    })
}

fn cmd_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, config::default_config_content())?;
    eprintln!("Created {}", config_path.display());
    Ok(())
}
