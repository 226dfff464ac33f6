use std::env;
use std::io::{self, IsTerminal, Read, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;

use tollgate::api::{AppState, create_router};
use tollgate::auth::{AuthConfig, TokenCodec, hash_secret};
use tollgate::settings::{
    APP_NAME, AppConfig, ENV_PREFIX, resolve_config_path, write_default_config,
};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging();
    debug!(config = %ctx.config_path.display(), "resolved config path");

    match cli.command {
        Command::Serve(cmd) => async_main(ctx, cmd),
        Command::Mint(cmd) => handle_mint(&ctx, cmd),
        Command::Verify(cmd) => handle_verify(&ctx, cmd),
        Command::HashSecret(cmd) => handle_hash_secret(&ctx, cmd),
        Command::GenKey => handle_gen_key(&ctx),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Tollgate - stateless bearer-token authentication server.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    /// Control color output (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
    /// Emit additional diagnostics for troubleshooting
    #[arg(long = "diagnostics", global = true)]
    diagnostics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Mint a token for a subject with the configured key
    Mint(MintCommand),
    /// Verify a token and print its claims
    Verify(VerifyCommand),
    /// Hash a secret for use in the principals list
    HashSecret(HashSecretCommand),
    /// Generate a random signing key
    GenKey,
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to (overrides server.host)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
struct MintCommand {
    /// Principal identifier to put in the subject claim
    subject: String,
    /// Token lifetime in seconds (overrides auth.token_ttl_secs)
    #[arg(long, value_name = "SECONDS")]
    ttl: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct VerifyCommand {
    /// Token to verify; read from stdin when omitted
    token: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct HashSecretCommand {
    /// Secret to hash; read from stdin when omitted
    secret: Option<String>,
    /// bcrypt cost (overrides auth.hash_cost)
    #[arg(long)]
    cost: Option<u32>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the resolved config file path
    Path,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    config_path: PathBuf,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let config_path = resolve_config_path(common.config.as_deref())?;
        let config = AppConfig::load(&config_path, ENV_PREFIX)?;
        Ok(Self {
            common,
            config_path,
            config,
        })
    }

    fn init_logging(&self) {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        let level = self.effective_log_level();
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}={level},tower_http={level}")));

        // Logs go to stderr so command output on stdout stays clean.
        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .ok();
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_ansi(!disable_color)
                        .with_target(self.common.diagnostics)
                        .with_file(self.common.diagnostics)
                        .with_line_number(self.common.diagnostics),
                )
                .try_init()
                .ok();
        }
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.quiet {
            return LevelFilter::ERROR;
        }
        if self.common.trace {
            return LevelFilter::TRACE;
        }
        if self.common.debug {
            return LevelFilter::DEBUG;
        }

        match self.common.verbose {
            0 => self
                .config
                .logging
                .level
                .parse()
                .unwrap_or(LevelFilter::INFO),
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    fn codec(&self) -> Result<TokenCodec> {
        let key = self
            .config
            .auth
            .require_signing_key()
            .context("loading signing key")?;
        Ok(TokenCodec::new(&key))
    }
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    let state = AppState::from_config(&ctx.config.auth)?;
    let app = create_router(state);

    let host = cmd.host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = cmd.port.unwrap_or(ctx.config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

fn handle_mint(ctx: &RuntimeContext, cmd: MintCommand) -> Result<()> {
    let codec = ctx.codec()?;
    let ttl = match cmd.ttl {
        Some(0) => bail!("--ttl must be greater than zero"),
        Some(secs) => std::time::Duration::from_secs(secs),
        None => ctx.config.auth.token_ttl(),
    };

    let issued = codec.mint(&cmd.subject, ttl)?;
    if ctx.common.json {
        print_json(&json!({
            "token": issued.token,
            "issued_at": issued.issued_at,
            "expires_at": issued.expires_at,
        }))
    } else {
        println!("{}", issued.token);
        Ok(())
    }
}

fn handle_verify(ctx: &RuntimeContext, cmd: VerifyCommand) -> Result<()> {
    let codec = ctx.codec()?;
    let token = match cmd.token {
        Some(token) => token,
        None => read_stdin_line().context("reading token from stdin")?,
    };

    let claims = codec.verify(token.trim())?;
    if ctx.common.json {
        print_json(&json!({
            "sub": claims.sub,
            "issued_at": claims.issued_at(),
            "expires_at": claims.expires_at(),
        }))
    } else {
        println!("subject:    {}", claims.subject());
        println!("issued at:  {}", claims.issued_at());
        println!("expires at: {}", claims.expires_at());
        Ok(())
    }
}

fn handle_hash_secret(ctx: &RuntimeContext, cmd: HashSecretCommand) -> Result<()> {
    let secret = match cmd.secret {
        Some(secret) => secret,
        None => read_stdin_line().context("reading secret from stdin")?,
    };
    if secret.is_empty() {
        bail!("secret must not be empty");
    }

    let cost = cmd.cost.unwrap_or(ctx.config.auth.hash_cost);
    let hash = hash_secret(&secret, cost)?;
    println!("{hash}");
    Ok(())
}

fn handle_gen_key(ctx: &RuntimeContext) -> Result<()> {
    let key = AuthConfig::generate_signing_key();
    if ctx.common.json {
        print_json(&json!({ "signing_key": key }))
    } else {
        println!("{key}");
        Ok(())
    }
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
        ConfigCommand::Init { force } => {
            if ctx.config_path.exists() && !force {
                bail!(
                    "config file {} already exists (use --force to overwrite)",
                    ctx.config_path.display()
                );
            }
            write_default_config(&ctx.config_path)?;
            info!(path = %ctx.config_path.display(), "wrote default config");
            if ctx.config.auth.signing_key.is_none() {
                eprintln!(
                    "No signing key configured. Before serving, run:\n  \
                     export {ENV_PREFIX}__AUTH__SIGNING_KEY=\"$({APP_NAME} gen-key)\""
                );
            }
            Ok(())
        }
    }
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

fn read_stdin_line() -> Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{text}");
    Ok(())
}
