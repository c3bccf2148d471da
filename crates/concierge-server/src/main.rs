use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use concierge_core::{ConciergeConfig, QueryPipeline};
use concierge_server::{http, init_tracing, load_catalog, spawn_form_sweeper, EndpointConfig, HttpCompletion, HttpEmbedder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const API_KEY_ENV: &str = "CONCIERGE_API_KEY";

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("Pipeline configuration (TOML); defaults apply when omitted");
    let seed_arg = Arg::new("seed")
        .long("seed")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Catalog seed (YAML)");

    Command::new("concierge")
        .version(concierge_server::VERSION)
        .about("Property-management concierge query service")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Serve the chat API")
                .arg(config_arg.clone())
                .arg(seed_arg.clone())
                .arg(
                    Arg::new("addr")
                        .long("addr")
                        .default_value("127.0.0.1:8080")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address"),
                )
                .arg(
                    Arg::new("embedding-url")
                        .long("embedding-url")
                        .default_value("http://127.0.0.1:11434/v1")
                        .help("Base URL of the embedding API"),
                )
                .arg(
                    Arg::new("embedding-model")
                        .long("embedding-model")
                        .default_value("text-embedding-3-small")
                        .help("Embedding model name"),
                )
                .arg(
                    Arg::new("completion-url")
                        .long("completion-url")
                        .help("Base URL of the chat-completion API; synthesis and model intents are off without it"),
                )
                .arg(
                    Arg::new("completion-model")
                        .long("completion-model")
                        .default_value("gpt-4o-mini")
                        .help("Chat-completion model name"),
                )
                .arg(
                    Arg::new("sweep-secs")
                        .long("sweep-secs")
                        .default_value("60")
                        .value_parser(value_parser!(u64))
                        .help("How often idle form sessions are expired"),
                )
                .arg(
                    Arg::new("log-json")
                        .long("log-json")
                        .action(ArgAction::SetTrue)
                        .help("Emit logs as JSON lines"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate configuration and catalog seed, then exit")
                .arg(config_arg)
                .arg(seed_arg),
        )
}

fn load_config(args: &ArgMatches) -> anyhow::Result<ConciergeConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => ConciergeConfig::load(path).with_context(|| format!("config {}", path.display())),
        None => {
            let mut config = ConciergeConfig::default();
            config.apply_env(|var| std::env::var(var).ok())?;
            config.validate()?;
            Ok(config)
        }
    }
}

fn seed_path(args: &ArgMatches) -> anyhow::Result<&PathBuf> {
    args.get_one::<PathBuf>("seed").context("--seed is required")
}

fn arg<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a String> {
    args.get_one::<String>(name).with_context(|| format!("--{name} is required"))
}

async fn serve(args: &ArgMatches) -> anyhow::Result<()> {
    init_tracing(args.get_flag("log-json"), "info,concierge=debug")?;

    let config = load_config(args)?;
    let catalog = Arc::new(load_catalog(seed_path(args)?)?);
    let api_key = std::env::var(API_KEY_ENV).ok();
    let timeout = Duration::from_millis(config.provider.timeout_ms);

    let embedder = HttpEmbedder::new(
        EndpointConfig::new(arg(args, "embedding-url")?, arg(args, "embedding-model")?)
            .with_api_key(api_key.clone())
            .with_timeout(timeout),
    )?;

    let mut builder = QueryPipeline::builder(config).catalog(catalog).embedder(Arc::new(embedder));
    match args.get_one::<String>("completion-url") {
        Some(url) => {
            let completion = HttpCompletion::new(
                EndpointConfig::new(url, arg(args, "completion-model")?)
                    .with_api_key(api_key)
                    .with_timeout(timeout),
            )?;
            builder = builder.completion(Arc::new(completion));
        }
        None => tracing::warn!("no completion endpoint; synthesis and model intent classification are off"),
    }
    let pipeline = Arc::new(builder.build()?);

    let period = args.get_one::<u64>("sweep-secs").copied().unwrap_or(60).max(1);
    let sweeper = spawn_form_sweeper(Arc::clone(&pipeline), Duration::from_secs(period));

    let addr = *args.get_one::<SocketAddr>("addr").context("--addr is required")?;
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "cannot listen for ctrl-c");
        }
    };
    let served = http::serve(pipeline, addr, shutdown).await;
    sweeper.abort();
    served
}

fn check_config(args: &ArgMatches) -> anyhow::Result<()> {
    init_tracing(false, "warn")?;
    let config = load_config(args)?;
    load_catalog(seed_path(args)?)?;
    println!("configuration ok");
    println!("{}", toml::to_string_pretty(&config).context("cannot render configuration")?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("serve", args)) => serve(args).await,
        Some(("check-config", args)) => check_config(args),
        _ => Ok(()),
    }
}
