use dial_overlay_core::platform::memory::MemoryHost;
use dial_overlay_core::platform::{Host, HostDocument};
use dial_overlay_core::protocol;
use dial_overlay_core::{
    ChatOverlayManager, ChatOverlayManagerOptions, ChatOverlayOptions, Config, OverlayError,
};
use log::{error, info};
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;

mod cli;
mod frame_app;
mod logger;

use cli::Args;
use frame_app::FrameApp;

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to load config: {0}")]
    Config(String),
    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

fn main() -> ExitCode {
    let args = cli::parse_args();
    if let Err(e) = logger::init_logger(args.quiet, args.verbose) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            log::logger().flush();
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    info!("Starting DIAL Overlay {}", dial_overlay_core::version());

    let config = load_config(&args)?;
    if args.dry_run {
        info!(
            "Configuration is valid ({} overlays configured)",
            config.overlays.len()
        );
        return Ok(());
    }
    Config::set_config(config.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(session(&args, overlays_to_create(&config)));

    log::logger().flush();
    result
}

fn load_config(args: &Args) -> Result<Config, CliError> {
    if args.use_defaults {
        info!("Using default configuration");
        return Ok(Config::default());
    }

    let config = Config::load(args.config_path.as_deref(), true)
        .map_err(|e| CliError::Config(e.to_string()))?;
    if let Some(path) = &config.config_path {
        info!("Loaded configuration from {}", path.display());
    }
    Ok(config)
}

/// The configured overlays, or a single demo overlay when none are configured.
fn overlays_to_create(config: &Config) -> Vec<ChatOverlayManagerOptions> {
    if !config.overlays.is_empty() {
        return config.overlays.clone();
    }

    let mut demo = ChatOverlayManagerOptions::new(
        "demo",
        ChatOverlayOptions::new("https://chat.example", "https://host.example"),
    );
    demo.allow_fullscreen = true;
    vec![demo]
}

async fn session(args: &Args, overlays: Vec<ChatOverlayManagerOptions>) -> Result<(), CliError> {
    let host = MemoryHost::new(args.viewport.width, args.viewport.height);
    let posts = host.frame_messages();
    let manager = ChatOverlayManager::new(Host::from_shared(host.clone()));

    for options in overlays {
        info!("Creating overlay '{}' at {}", options.id, options.position);
        manager.create_overlay(options)?;
    }

    let app = tokio::spawn(
        FrameApp::new(host.clone()).run(posts, Duration::from_millis(args.ready_delay_ms)),
    );

    let result = chat(&host, &manager, &args.message).await;

    manager.destroy();
    app.abort();
    info!("Session finished");
    result
}

async fn chat(host: &MemoryHost, manager: &ChatOverlayManager, message: &str) -> Result<(), CliError> {
    for id in manager.overlay_ids() {
        manager.ready(&id).await?;
        info!("Overlay '{}' is ready", id);

        manager.show_overlay(&id)?;
        log_layout(host, manager, &id)?;

        for event in [protocol::GPT_START_GENERATING, protocol::GPT_END_GENERATING] {
            let overlay_id = id.clone();
            // Dropping the handle keeps the subscription until the overlay is destroyed
            let _ = manager.subscribe(&id, event, move |_| {
                info!("'{}' <- {}", overlay_id, event);
            })?;
        }

        manager.set_system_prompt(&id, "Answer briefly")?.await?;
        let conversation = manager.create_conversation(&id, None)?.await?;
        if let Some(conversation_id) = conversation["id"].as_str() {
            manager.select_conversation(&id, conversation_id)?.await?;
            info!("'{}' switched to conversation {}", id, conversation_id);
        }

        manager.send_message(&id, message)?.await?;
        let messages = manager.get_messages(&id)?.await?;
        info!("'{}' messages: {}", id, messages);

        let conversations = manager.get_conversations(&id)?.await?;
        info!("'{}' conversations: {}", id, conversations);

        manager.hide_overlay(&id)?;
    }

    info!("Rotating the host to a phone-sized viewport");
    host.set_viewport(390, 844);
    for id in manager.overlay_ids() {
        manager.show_overlay(&id)?;
        log_layout(host, manager, &id)?;
    }
    Ok(())
}

fn log_layout(host: &MemoryHost, manager: &ChatOverlayManager, id: &str) -> Result<(), CliError> {
    let container = manager.container(id)?;
    let style = |property: &str| host.style(container, property).unwrap_or_default();
    info!(
        "'{}' layout: top={} right={} bottom={} left={} width={} height={} transform={}",
        id,
        style("top"),
        style("right"),
        style("bottom"),
        style("left"),
        style("width"),
        style("height"),
        style("transform"),
    );
    Ok(())
}
