//! Binary entry point for visage.
//!
//! This binary provides the CLI interface for the visage face registry.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use visage::config::VisageConfig;
use visage::models::{FaceBox, IdentityName};
use visage::observability::{self, LogFormat};
use visage::provider::{FaceEncoder, RemoteEncoder};
use visage::registry::RegistryCache;
use visage::server::{self, AppState};
use visage::services::{EnrollRequest, EnrollmentService, IdentificationService};
use visage::storage::ContentStore;

/// Visage - a face identity registry and matching engine.
#[derive(Parser)]
#[command(name = "visage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format: text or json.
    #[arg(long, global = true, default_value = "text", env = "VISAGE_LOG_FORMAT")]
    log_format: String,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server.
    Serve {
        /// Listen port (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Enroll an image file for an identity.
    Enroll {
        /// Identity name.
        name: String,
        /// Path to a png or jpeg image.
        image: PathBuf,
        /// Optional face box as top,right,bottom,left.
        #[arg(long, value_parser = parse_face_box)]
        face_box: Option<FaceBox>,
    },
    /// Identify the faces in an image file.
    Identify {
        /// Path to a png or jpeg image.
        image: PathBuf,
        /// Match distance threshold (inclusive).
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Detect face locations in an image file.
    Detect {
        /// Path to a png or jpeg image.
        image: PathBuf,
    },
    /// List enrolled identities.
    List,
    /// Delete an identity and all its records.
    Delete {
        /// Identity name.
        name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    observability::init(cli.verbose, LogFormat::parse(&cli.log_format));

    let config = match cli.config {
        Some(ref path) => match VisageConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            },
        },
        None => VisageConfig::load_default(),
    };

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(&config, port),
        Commands::Enroll {
            name,
            image,
            face_box,
        } => cmd_enroll(&config, &name, &image, face_box),
        Commands::Identify { image, threshold } => cmd_identify(&config, &image, threshold),
        Commands::Detect { image } => cmd_detect(&config, &image),
        Commands::List => cmd_list(&config),
        Commands::Delete { name } => cmd_delete(&config, &name),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Builds the shared application state from configuration.
fn build_state(config: &VisageConfig) -> visage::Result<Arc<AppState>> {
    let store = Arc::new(ContentStore::with_create(&config.data_dir)?);
    let cache = Arc::new(RegistryCache::new());
    cache.rebuild(store.load_all()?)?;

    let encoder: Arc<dyn FaceEncoder> = Arc::new(
        RemoteEncoder::new(config.encoder_url.as_str()).with_dimensions(config.embedding_dims),
    );

    Ok(Arc::new(AppState {
        enrollment: EnrollmentService::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&encoder),
        ),
        identification: IdentificationService::new(
            Arc::clone(&cache),
            encoder,
            config.match_threshold,
        ),
        cache,
        store,
    }))
}

fn cmd_serve(config: &VisageConfig, port: Option<u16>) -> visage::Result<()> {
    let state = build_state(config)?;
    server::serve(state, port.unwrap_or(config.port))
}

fn cmd_enroll(
    config: &VisageConfig,
    name: &str,
    image: &PathBuf,
    face_box: Option<FaceBox>,
) -> visage::Result<()> {
    let state = build_state(config)?;
    let image_bytes = std::fs::read(image)
        .map_err(|e| visage::Error::storage("read_image_file", e))?;

    let outcome = state.enrollment.enroll(EnrollRequest {
        identity: IdentityName::new(name)?,
        image_bytes,
        embedding: None,
        face_box,
    })?;
    println!("{}", render_json(&outcome));
    Ok(())
}

fn cmd_identify(
    config: &VisageConfig,
    image: &PathBuf,
    threshold: Option<f32>,
) -> visage::Result<()> {
    let state = build_state(config)?;
    let image_bytes = std::fs::read(image)
        .map_err(|e| visage::Error::storage("read_image_file", e))?;

    let results = state.identification.identify_image(&image_bytes, threshold)?;
    println!("{}", render_json(&results));
    Ok(())
}

fn cmd_detect(config: &VisageConfig, image: &PathBuf) -> visage::Result<()> {
    let state = build_state(config)?;
    let image_bytes = std::fs::read(image)
        .map_err(|e| visage::Error::storage("read_image_file", e))?;

    let faces = state.identification.detect(&image_bytes)?;
    println!("{}", render_json(&faces));
    Ok(())
}

fn cmd_list(config: &VisageConfig) -> visage::Result<()> {
    let state = build_state(config)?;
    for name in state.cache.list_identities()? {
        println!("{name}");
    }
    Ok(())
}

fn cmd_delete(config: &VisageConfig, name: &str) -> visage::Result<()> {
    let state = build_state(config)?;
    let identity = IdentityName::new(name)?;
    if state.enrollment.delete_identity(&identity)? {
        println!("deleted {identity}");
        Ok(())
    } else {
        Err(visage::Error::IdentityNotFound(name.to_string()))
    }
}

/// Pretty-prints a serializable value.
fn render_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Parses a face box from `top,right,bottom,left`.
fn parse_face_box(s: &str) -> Result<FaceBox, String> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>().map_err(|e| e.to_string()))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [top, right, bottom, left] => Ok(FaceBox {
            top: *top,
            right: *right,
            bottom: *bottom,
            left: *left,
        }),
        _ => Err("expected four values: top,right,bottom,left".to_string()),
    }
}
