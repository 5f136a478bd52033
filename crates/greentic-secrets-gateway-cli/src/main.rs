use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Args, Parser, Subcommand, ValueEnum};
use greentic_secrets_gateway::cipher::CONFIG_KEY_ENV;
use greentic_secrets_gateway::telemetry::{self, LogFormat};
use greentic_secrets_gateway::{AesGcmCipher, AttachContext, ConfigEntity, Message, prepare};
use rand::RngCore;
use serde_json::json;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(
    name = "greentic-secrets-gateway",
    version,
    about = "Greentic secrets gateway filter CLI"
)]
struct Cli {
    /// Log output format (stderr).
    #[arg(long, value_enum, default_value_t = LogStyle::Compact, global = true)]
    log_format: LogStyle,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogStyle {
    Json,
    Compact,
}

#[derive(Subcommand)]
enum Command {
    /// Attach the filter and run one invocation.
    Get(GetCmd),
    /// Show the resolved credential source and transport without network access.
    Check(CheckCmd),
    /// Encrypt a value for the proxyPassword field.
    Seal(SealCmd),
    /// Print a fresh base64 configuration key.
    Keygen,
}

#[derive(Args)]
struct GetCmd {
    /// Filter configuration (TOML, or JSON with a .json extension).
    #[arg(short = 'c', long)]
    config: PathBuf,
    /// Message attribute visible to `${...}` templates, as name=value.
    #[arg(long = "set", value_parser = parse_attribute)]
    attributes: Vec<(String, String)>,
    /// Print the output attributes as a JSON object.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CheckCmd {
    #[arg(short = 'c', long)]
    config: PathBuf,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SealCmd {
    /// Value to encrypt; read from stdin when omitted.
    #[arg(long)]
    value: Option<String>,
    /// Base64 AES-256 key.
    #[arg(long, env = CONFIG_KEY_ENV, hide_env_values = true)]
    key: String,
}

fn parse_attribute(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got `{raw}`")),
    }
}

fn load_config(path: &PathBuf) -> Result<ConfigEntity> {
    ConfigEntity::load_from_file(path)
        .with_context(|| format!("failed to load filter config {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init(match cli.log_format {
        LogStyle::Json => LogFormat::Json,
        LogStyle::Compact => LogFormat::Compact,
    })?;

    match cli.command {
        Command::Get(cmd) => get(cmd).await,
        Command::Check(cmd) => check(cmd),
        Command::Seal(cmd) => seal(cmd),
        Command::Keygen => {
            let mut key = Zeroizing::new([0u8; 32]);
            rand::thread_rng().fill_bytes(&mut key[..]);
            println!("{}", STANDARD.encode(&key[..]));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn get(cmd: GetCmd) -> Result<ExitCode> {
    let config = load_config(&cmd.config)?;
    let filter = secrets_provider_aws_sm::build_filter(&config, &AttachContext::from_env()).await;

    let mut message: Message = cmd.attributes.into_iter().collect();
    let retrieval = filter.invoke_async(&mut message).await;
    filter.detach();

    let prefix = format!("{}.", filter.config().outputs.prefix());
    if cmd.json {
        let outputs: serde_json::Map<String, serde_json::Value> = message
            .with_prefix(&prefix)
            .map(|(name, value)| (name.to_string(), json!(value)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        for (name, value) in message.with_prefix(&prefix) {
            println!("{name}={value}");
        }
    }

    tracing::debug!(attempts = retrieval.attempts, "invocation finished");
    Ok(if retrieval.outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check(cmd: CheckCmd) -> Result<ExitCode> {
    let config = load_config(&cmd.config)?;
    let attached = prepare(&config, &AttachContext::from_env());
    let fields = &attached.fields;

    if cmd.json {
        let report = json!({
            "secretName": fields.secret_name.to_string(),
            "secretRegion": fields.region.to_string(),
            "credentials": attached.credentials.describe(),
            "transport": attached.transport.to_string(),
            "outputPrefix": attached.outputs.prefix(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("secret name:   {}", fields.secret_name);
        println!("region:        {}", fields.region);
        println!("credentials:   {}", attached.credentials);
        println!("transport:     {}", attached.transport);
        println!("output prefix: {}", attached.outputs.prefix());
    }
    Ok(ExitCode::SUCCESS)
}

fn seal(cmd: SealCmd) -> Result<ExitCode> {
    let cipher = AesGcmCipher::from_base64_key(&cmd.key).context("invalid configuration key")?;
    let plaintext = match cmd.value {
        Some(value) => Zeroizing::new(value),
        None => {
            let mut buf = Zeroizing::new(String::new());
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read value from stdin")?;
            Zeroizing::new(buf.trim_end_matches(['\r', '\n']).to_string())
        }
    };
    if plaintext.is_empty() {
        bail!("nothing to seal");
    }
    println!("{}", cipher.encrypt(plaintext.as_bytes()));
    Ok(ExitCode::SUCCESS)
}
