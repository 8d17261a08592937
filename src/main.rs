use std::path::PathBuf;

use clap::Parser;
use secretgate::{
    auth::AuthDomain,
    config::ProxyConfig,
    db,
    observability,
    secret_store::SecretStoreClient,
    state::AppState,
};
use serde::Serialize;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "secretgate", version, about = "Secrets proxy gateway")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "secretgate.toml")]
    config: PathBuf,
}

/// Which secret store a command talks to.
#[derive(clap::Args, Debug)]
struct StoreTarget {
    /// Use the store of this authorization domain
    #[arg(long, conflicts_with = "user")]
    domain: Option<AuthDomain>,

    /// Resolve this user in the directory and use the store of their domain
    #[arg(long)]
    user: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run database migrations
    Migrate,
    /// Issue an invitation for an email address
    Invite {
        email: String,
        /// Free-form note stored with the invitation
        #[arg(long)]
        comment: Option<String>,
    },
    /// Redeem an invitation token and print the invited email
    Redeem { token: String },
    /// Show an invitation and its current state
    InspectInvite { token: String },
    /// Withdraw a pending invitation
    RevokeInvite { token: String },
    /// Resolve a username to its principal
    Resolve { username: String },
    /// List group names in a secret store
    ListGroups {
        #[command(flatten)]
        target: StoreTarget,
    },
    /// List client names in a secret store
    ListClients {
        #[command(flatten)]
        target: StoreTarget,
    },
    /// Show details of one group
    Group {
        name: String,
        #[command(flatten)]
        target: StoreTarget,
    },
    /// Show details of one client
    Client {
        name: String,
        #[command(flatten)]
        target: StoreTarget,
    },
    /// List the clients that belong to a group
    GroupClients {
        group: String,
        #[command(flatten)]
        target: StoreTarget,
    },
    /// List secrets visible to a group
    GroupSecrets {
        group: String,
        #[command(flatten)]
        target: StoreTarget,
    },
    /// List groups a secret is assigned to
    SecretGroups {
        secret: String,
        #[command(flatten)]
        target: StoreTarget,
    },
    /// Show secret metadata (never its content)
    Secret {
        name: String,
        #[command(flatten)]
        target: StoreTarget,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> CliResult {
    let config = ProxyConfig::from_file(&args.config).map_err(|e| {
        format!(
            "Failed to load config from {}: {}",
            args.config.display(),
            e
        )
    })?;

    observability::init_tracing(&config.observability)?;

    tracing::debug!(config_file = %args.config.display(), "Configuration loaded");

    // Migrations need only the database, not the full state
    let command = match args.command {
        Command::Migrate => return run_migrate(&config).await,
        other => other,
    };

    let state = AppState::new(config).await?;

    match command {
        Command::Migrate => run_migrate(&state.config).await,
        Command::Invite { email, comment } => {
            print_json(&state.invitations.issue(&email, comment.as_deref()).await?)
        }
        Command::Redeem { token } => {
            let email = state.invitations.redeem(&token).await?;
            print_json(&serde_json::json!({ "email": email }))
        }
        Command::InspectInvite { token } => match state.invitations.inspect(&token).await? {
            Some(status) => print_json(&status),
            None => Err("Invitation not found".into()),
        },
        Command::RevokeInvite { token } => {
            state.invitations.revoke(&token).await?;
            print_json(&serde_json::json!({ "revoked": true }))
        }
        Command::Resolve { username } => print_json(&state.resolver.resolve(&username).await?),
        Command::ListGroups { target } => {
            print_json(&store(&state, &target).await?.list_groups().await?)
        }
        Command::ListClients { target } => {
            print_json(&store(&state, &target).await?.list_clients().await?)
        }
        Command::Group { name, target } => {
            print_json(&store(&state, &target).await?.group_details(&name).await?)
        }
        Command::Client { name, target } => {
            print_json(&store(&state, &target).await?.client_details(&name).await?)
        }
        Command::GroupClients { group, target } => {
            print_json(&store(&state, &target).await?.clients_in_group(&group).await?)
        }
        Command::GroupSecrets { group, target } => {
            print_json(&store(&state, &target).await?.secrets_in_group(&group).await?)
        }
        Command::SecretGroups { secret, target } => {
            print_json(&store(&state, &target).await?.groups_for_secret(&secret).await?)
        }
        Command::Secret { name, target } => {
            print_json(&store(&state, &target).await?.secret_details(&name).await?)
        }
    }
}

/// Pick the store for a command: the user's domain if `--user` is given,
/// otherwise `--domain`, otherwise the directory's default domain.
async fn store<'a>(state: &'a AppState, target: &StoreTarget) -> CliResult<&'a SecretStoreClient> {
    if let Some(username) = &target.user {
        let (principal, client) = state.store_for_user(username).await?;
        tracing::info!(
            username = %principal.username(),
            domain = %principal.auth_domain(),
            "Acting on behalf of user"
        );
        return Ok(client);
    }

    let domain = target
        .domain
        .unwrap_or(state.config.directory.default_domain);
    Ok(state.secret_stores.client_for(domain)?)
}

async fn run_migrate(config: &ProxyConfig) -> CliResult {
    if config.database.is_none() {
        return Err("Database is not configured. Nothing to migrate.".into());
    }

    tracing::info!("Running database migrations");
    let pool = db::DbPool::from_config(&config.database).await?;
    pool.run_migrations().await?;
    pool.close().await;
    tracing::info!("Database migrations completed successfully");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    std::io::Write::write_all(&mut out, b"\n")?;
    Ok(())
}
