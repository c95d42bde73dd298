use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use filecrypt::auth_gate::{AuthOutcome, Authenticator, ChallengeRequest};
use filecrypt::capabilities::PlatformCapabilities;
use filecrypt::config::{FileReference, OperationConfig};
use filecrypt::error::{DenialReason, FileCryptError};
use filecrypt::key_policy::KeySpec;
use filecrypt::key_vault::{FileKeyVault, KeyVault};
use filecrypt::orchestrator::CryptoOrchestrator;
use filecrypt::path_resolver;
use filecrypt::settings::Settings;
use filecrypt::storage::StreamingStorage;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// filecrypt - In-place file encryption with auth-gated key policy
#[derive(Parser)]
#[command(name = "filecrypt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to settings file
    #[arg(short, long, default_value = "filecrypt.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize filecrypt (write settings and create the default key)
    Init {
        /// Directory for key material
        #[arg(short, long, default_value = "./keys")]
        key_dir: String,
    },

    /// Encrypt a file in place
    Encrypt {
        /// File to encrypt
        input: PathBuf,

        /// Delete the plaintext source after a successful encrypt
        #[arg(long, conflicts_with = "zero_source")]
        delete_source: bool,

        /// Truncate the plaintext source to empty after a successful encrypt
        #[arg(long)]
        zero_source: bool,

        /// Directory for the encrypted artifact (defaults to the source's)
        #[arg(short = 'd', long)]
        dest_dir: Option<PathBuf>,

        /// File name for the encrypted artifact (defaults to Encrypted_<name>)
        #[arg(short = 'n', long)]
        dest_name: Option<String>,

        /// Use a custom key derived from this material instead of the vault key
        #[arg(short, long)]
        key_material: Option<String>,

        /// Require an interactive confirmation before encrypting
        #[arg(short = 'a', long)]
        require_auth: bool,
    },

    /// Decrypt an encrypted artifact back to its original file
    Decrypt {
        /// Encrypted artifact to decrypt
        artifact: PathBuf,

        /// Restored file path (defaults to the artifact name without its prefix)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Custom key material used at encryption time
        #[arg(short, long)]
        key_material: Option<String>,

        /// Require an interactive confirmation before decrypting
        #[arg(short = 'a', long)]
        require_auth: bool,
    },

    /// Print the default encrypted path for a file
    Path {
        /// File to derive the path for
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    // Use RUST_LOG environment variable to control log level (e.g., RUST_LOG=info,filecrypt=debug)
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "filecrypt starting");

    match cli.command {
        Commands::Init { key_dir } => cmd_init(&cli.config, &key_dir).await,

        Commands::Encrypt {
            input,
            delete_source,
            zero_source,
            dest_dir,
            dest_name,
            key_material,
            require_auth,
        } => {
            let mut builder = OperationConfig::builder()
                .delete_source_after_encrypt(delete_source)
                .zero_source_after_encrypt(zero_source)
                .require_authentication(require_auth);
            if let Some(dir) = dest_dir {
                builder = builder.destination_directory(dir);
            }
            if let Some(name) = dest_name {
                builder = builder.destination_file_name(name);
            }
            if let Some(material) = key_material {
                builder = builder.custom_key_material(material);
            }
            let config = builder.build()?;
            cmd_encrypt(&cli.config, &input, &config).await
        }

        Commands::Decrypt {
            artifact,
            output,
            key_material,
            require_auth,
        } => cmd_decrypt(&cli.config, &artifact, output, key_material, require_auth).await,

        Commands::Path { input } => {
            println!("{}", path_resolver::default_encrypted_path(&input).display());
            Ok(())
        }
    }
}

/// Confirmation-prompt authenticator: the terminal stand-in for a
/// biometric or device-credential check.
struct ConsoleAuthenticator;

#[async_trait]
impl Authenticator for ConsoleAuthenticator {
    async fn authenticate(
        &self,
        request: &ChallengeRequest,
    ) -> Result<AuthOutcome, FileCryptError> {
        let prompt = format!("{} {} [y/N]: ", request.title, request.description);
        let answer = tokio::task::spawn_blocking(move || -> io::Result<Option<String>> {
            print!("{prompt}");
            io::stdout().flush()?;
            let mut response = String::new();
            let n = io::stdin().read_line(&mut response)?;
            if n == 0 {
                return Ok(None); // EOF: prompt dismissed
            }
            Ok(Some(response.trim().to_string()))
        })
        .await
        .map_err(|e| FileCryptError::Io(io::Error::other(format!("prompt task failed: {e}"))))??;

        Ok(match answer {
            None => AuthOutcome::Cancelled,
            Some(line) if line.eq_ignore_ascii_case("y") => AuthOutcome::Granted,
            Some(_) => AuthOutcome::Denied(DenialReason::Rejected(
                "confirmation declined".to_string(),
            )),
        })
    }
}

fn build_orchestrator(settings: &Settings) -> CryptoOrchestrator {
    CryptoOrchestrator::new(
        Arc::new(FileKeyVault::new(&settings.key_dir)),
        Arc::new(StreamingStorage),
        Arc::new(ConsoleAuthenticator),
        PlatformCapabilities::detect(),
    )
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Initialize settings and the default key
async fn cmd_init(config_path: &str, key_dir: &str) -> Result<()> {
    println!("Initializing filecrypt...");

    if fs::try_exists(config_path).await.unwrap_or(false) {
        anyhow::bail!(
            "Settings file '{}' already exists. Remove it first or use a different path.",
            config_path
        );
    }

    let settings = Settings::new(key_dir);
    settings.validate()?;

    // Create the default key up front so the first encrypt doesn't have to
    let vault = FileKeyVault::new(key_dir);
    let _handle = vault.get_or_create(&KeySpec::Default).await?;

    let settings_json = serde_json::to_string_pretty(&settings)?;
    fs::write(config_path, settings_json)
        .await
        .with_context(|| format!("writing settings to '{}'", config_path))?;

    println!("Initialization complete!");
    println!("Settings: {}", config_path);
    println!("Keys:     {}", key_dir);
    println!();
    println!("IMPORTANT: Keep your key directory secure and backed up!");
    println!("Without it, your encrypted files cannot be recovered.");

    Ok(())
}

/// Encrypt a file in place
async fn cmd_encrypt(config_path: &str, input: &Path, config: &OperationConfig) -> Result<()> {
    let settings = Settings::load_with_env(Some(config_path))?;
    let orchestrator = build_orchestrator(&settings);
    let source = FileReference::new(input);

    let spinner = create_spinner(&format!("Encrypting {}...", input.display()));
    let outcome = orchestrator.encrypt(&source, config).await;
    match outcome {
        Ok(outcome) => {
            spinner.finish_with_message(format!(
                "Encrypted {} -> {}",
                input.display(),
                outcome.result_path().display()
            ));
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e.into())
        }
    }
}

/// Decrypt an encrypted artifact
async fn cmd_decrypt(
    config_path: &str,
    artifact: &Path,
    output: Option<PathBuf>,
    key_material: Option<String>,
    require_auth: bool,
) -> Result<()> {
    let settings = Settings::load_with_env(Some(config_path))?;
    let orchestrator = build_orchestrator(&settings);

    // The restored file is the artifact's name without its prefix unless
    // an explicit output path was given
    let target_path = match output {
        Some(path) => path,
        None => path_resolver::default_plaintext_path(artifact).with_context(|| {
            format!(
                "'{}' does not carry the {} prefix; pass --output for the restored path",
                artifact.display(),
                path_resolver::ENCRYPTED_PREFIX
            )
        })?,
    };

    // Point the resolver at the artifact's actual location
    let mut builder = OperationConfig::builder().require_authentication(require_auth);
    if let Some(dir) = artifact.parent() {
        builder = builder.destination_directory(dir);
    }
    if let Some(name) = artifact.file_name() {
        builder = builder.destination_file_name(name);
    }
    if let Some(material) = key_material {
        builder = builder.custom_key_material(material);
    }
    let config = builder.build()?;

    let target = FileReference::new(&target_path);
    let spinner = create_spinner(&format!("Decrypting {}...", artifact.display()));
    match orchestrator.decrypt(&target, &config).await {
        Ok(outcome) => {
            spinner.finish_with_message(format!(
                "Decrypted {} -> {}",
                artifact.display(),
                outcome.result_path().display()
            ));
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e.into())
        }
    }
}
