//! A minimal CLI front-end over `organizer-core`'s vault engine.
//!
//! Not the product surface this crate is built for — that's a GUI — but
//! a thin host application to drive the
//! vault engine end-to-end (create a vault, add/edit/remove entries,
//! change the master password, sync against a remote) without a frontend.

use clap::{Parser, Subcommand};
use organizer_core::config::Config;
use organizer_core::error::OrganizerError;
use organizer_core::keystore::{FileKeyStore, KeyStore};
use organizer_core::models::VAULT_FILENAME;
use organizer_core::vault::{OpenVaultRegistry, VaultEngine};
use std::path::PathBuf;
use std::sync::Arc;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "organizer", about = "Zero-knowledge password manager CLI", version)]
struct Cli {
  /// Directory holding the vault document and the device-secret keystore.
  #[arg(long, global = true, default_value = "./organizer-data")]
  data_dir: PathBuf,

  /// Vault owner. One vault document and one device secret per user.
  #[arg(long, global = true)]
  user: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create a new, empty vault for `--user`.
  Init,
  /// List all entries, decrypted.
  List,
  /// Add a new entry.
  Add {
    #[arg(long)]
    site: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    #[arg(long, default_value = "")]
    note: String,
    #[arg(long, default_value = "")]
    category: String,
    #[arg(long)]
    favorite: bool,
  },
  /// Edit an existing entry by id; omitted fields are left unchanged.
  Edit {
    id: u64,
    #[arg(long)]
    site: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    note: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    favorite: Option<bool>,
  },
  /// Remove an entry by id.
  Remove { id: u64 },
  /// Re-encrypt the vault under a new master password.
  ChangePassword,
  /// Push or pull against a remote vault (requires the `http-sync` feature).
  Sync {
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    token: String,
  },
}

fn prompt_password(label: &str) -> std::io::Result<Zeroizing<String>> {
  rpassword::prompt_password(label).map(Zeroizing::new)
}

fn vault_path(data_dir: &std::path::Path) -> PathBuf {
  data_dir.join(VAULT_FILENAME)
}

fn keystore_for(data_dir: &std::path::Path) -> Arc<dyn KeyStore> {
  Arc::new(FileKeyStore::new(data_dir.join("keystore")))
}

fn run(cli: Cli) -> Result<(), OrganizerError> {
  std::fs::create_dir_all(&cli.data_dir)?;
  let registry = OpenVaultRegistry::new();
  let config = Config::default();
  let keystore = keystore_for(&cli.data_dir);
  let path = vault_path(&cli.data_dir);

  match cli.command {
    Command::Init => {
      let master = prompt_password("Master password: ")?;
      let confirm = prompt_password("Confirm master password: ")?;
      if master.as_str() != confirm.as_str() {
        return Err(OrganizerError::InvalidRequest("passwords did not match".into()));
      }
      VaultEngine::create(path, &registry, keystore, config, &cli.user, master.as_bytes())?;
      println!("vault created for '{}'", cli.user);
    }
    Command::List => {
      let master = prompt_password("Master password: ")?;
      let engine =
        VaultEngine::open(path, &registry, keystore, config, &cli.user, master.as_bytes())?;
      for entry in engine.list()? {
        println!(
          "[{}] {} ({}) — {} / {}{}",
          entry.id,
          entry.site,
          entry.category,
          entry.username,
          entry.password,
          if entry.favorite { " *" } else { "" }
        );
      }
    }
    Command::Add { site, username, password, note, category, favorite } => {
      let master = prompt_password("Master password: ")?;
      let mut engine =
        VaultEngine::open(path, &registry, keystore, config, &cli.user, master.as_bytes())?;
      let id = engine.add(&site, &username, &password, &note, &category, favorite)?;
      println!("added entry {id}");
    }
    Command::Edit { id, site, username, password, note, category, favorite } => {
      let master = prompt_password("Master password: ")?;
      let mut engine =
        VaultEngine::open(path, &registry, keystore, config, &cli.user, master.as_bytes())?;
      engine.edit(
        id,
        username.as_deref(),
        password.as_deref(),
        site.as_deref(),
        note.as_deref(),
        category.as_deref(),
        favorite,
      )?;
      println!("updated entry {id}");
    }
    Command::Remove { id } => {
      let master = prompt_password("Master password: ")?;
      let mut engine =
        VaultEngine::open(path, &registry, keystore, config, &cli.user, master.as_bytes())?;
      engine.remove(id)?;
      println!("removed entry {id}");
    }
    Command::ChangePassword => {
      let current = prompt_password("Current master password: ")?;
      let new = prompt_password("New master password: ")?;
      let mut engine =
        VaultEngine::open(path, &registry, keystore, config, &cli.user, current.as_bytes())?;
      engine.change_master_password(current.as_bytes(), new.as_bytes())?;
      println!("master password changed");
    }
    Command::Sync { base_url, token } => {
      run_sync(path, registry, keystore, config, &cli.user, base_url, &token)?;
    }
  }

  Ok(())
}

#[cfg(feature = "http-sync")]
fn run_sync(
  path: PathBuf,
  registry: Arc<OpenVaultRegistry>,
  keystore: Arc<dyn KeyStore>,
  config: Config,
  user: &str,
  base_url: Option<String>,
  token: &str,
) -> Result<(), OrganizerError> {
  let master = prompt_password("Master password: ")?;
  let mut engine = VaultEngine::open(path, &registry, keystore, config.clone(), user, master.as_bytes())?;
  let base_url = base_url.unwrap_or(config.sync_base_url);
  let transport = organizer_core::sync::http::HttpSyncTransport::new(base_url, config.sync_timeout)?;
  let outcome = organizer_core::sync::sync(&mut engine, &transport, Some(token))?;
  println!("sync: {outcome:?}");
  Ok(())
}

#[cfg(not(feature = "http-sync"))]
fn run_sync(
  _path: PathBuf,
  _registry: Arc<OpenVaultRegistry>,
  _keystore: Arc<dyn KeyStore>,
  _config: Config,
  _user: &str,
  _base_url: Option<String>,
  _token: &str,
) -> Result<(), OrganizerError> {
  Err(OrganizerError::InvalidState(
    "sync requires rebuilding with --features http-sync".into(),
  ))
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();
  if let Err(err) = run(cli) {
    eprintln!("error: {err}");
    std::process::exit(1);
  }
}
