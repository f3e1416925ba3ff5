use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use bizdesk_api::{
    auth::{AuthConfig, AuthService, ADMIN_ROLE, SEEDED_ROLES},
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::document::DocumentKind,
    events::{self, EventSender},
    services::numbering::NumberingService,
};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);
    let context = CliContext::connect(config).await?;

    match cli.command {
        Commands::Migrate => handle_migrate(&context).await?,
        Commands::CreateUser(args) => handle_create_user(&context, args, cli.json).await?,
        Commands::Grant(args) => handle_grant(&context, args).await?,
        Commands::NextNumber(args) => handle_next_number(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "bizdesk", about = "Bizdesk administration CLI", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Register an active user account
    CreateUser(CreateUserArgs),
    /// Give a role to an existing user
    Grant(GrantArgs),
    /// Show the number the next document of a kind would receive
    NextNumber(NextNumberArgs),
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long, help = "Display name")]
    name: String,
    #[arg(long, help = "Login email address")]
    email: String,
    #[arg(long, help = "Initial password (at least 8 characters)")]
    password: String,
    #[arg(long, help = "Role to grant right away, e.g. admin or clerk")]
    role: Option<String>,
}

#[derive(Args)]
struct GrantArgs {
    #[arg(long, help = "Email of the user")]
    email: String,
    #[arg(long, help = "Role name: admin, clerk or viewer")]
    role: String,
}

#[derive(Args)]
struct NextNumberArgs {
    #[arg(long, help = "Document kind, e.g. Invoice or BillingNote")]
    kind: String,
    #[arg(long, help = "Document date as YYYY-MM-DD; defaults to today")]
    date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct CreatedUser {
    id: uuid::Uuid,
    email: String,
    role: Option<String>,
}

#[derive(Serialize)]
struct NumberPreview {
    kind: DocumentKind,
    date: NaiveDate,
    number: String,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
    auth_service: Arc<AuthService>,
}

impl CliContext {
    async fn connect(config: AppConfig) -> Result<Self> {
        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        let (event_sender, mut event_rx) = events::channel();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                debug!(target: "bizdesk_cli", event = ?event, "received async event");
            }
        });
        let event_sender: Arc<EventSender> = Arc::new(event_sender);

        let auth_service = Arc::new(AuthService::new(
            AuthConfig::from_app_config(&config),
            db.clone(),
            event_sender,
        ));

        Ok(Self {
            config,
            db,
            auth_service,
        })
    }
}

fn check_role(role: &str) -> Result<()> {
    let known = role == ADMIN_ROLE || SEEDED_ROLES.iter().any(|(name, _)| *name == role);
    if !known {
        bail!(
            "unknown role '{}'; expected {} or one of: {}",
            role,
            ADMIN_ROLE,
            SEEDED_ROLES
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

async fn handle_migrate(context: &CliContext) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;
    println!("Migrations applied to {}", context.config.database_url());
    Ok(())
}

async fn handle_create_user(context: &CliContext, args: CreateUserArgs, json: bool) -> Result<()> {
    if let Some(role) = &args.role {
        check_role(role)?;
    }

    let account = context
        .auth_service
        .create_user(&args.name, &args.email, &args.password)
        .await
        .context("failed to create user")?;

    if let Some(role) = &args.role {
        context
            .auth_service
            .grant_role(&account.email, role)
            .await
            .context("failed to grant role")?;
    }

    if json {
        print_json(&CreatedUser {
            id: account.id,
            email: account.email,
            role: args.role,
        })?;
    } else {
        println!("User {} created (id {})", account.email, account.id);
        if let Some(role) = args.role {
            println!("Granted role: {}", role);
        }
    }
    Ok(())
}

async fn grant(context: &CliContext, args: &GrantArgs) -> Result<()> {
    check_role(&args.role)?;
    context
        .auth_service
        .grant_role(&args.email, &args.role)
        .await
        .context("failed to grant role")
}

async fn handle_grant(context: &CliContext, args: GrantArgs) -> Result<()> {
    grant(context, &args).await?;
    println!("Role {} granted to {}", args.role, args.email);
    Ok(())
}

async fn next_number(context: &CliContext, args: &NextNumberArgs) -> Result<NumberPreview> {
    let kind = DocumentKind::from_str(&args.kind)
        .map_err(|_| anyhow!("unknown document kind '{}'", args.kind))?;
    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());

    let number = NumberingService::new(context.db.clone())
        .preview(kind, date)
        .await
        .context("failed to compute next number")?;
    Ok(NumberPreview { kind, date, number })
}

async fn handle_next_number(context: &CliContext, args: NextNumberArgs, json: bool) -> Result<()> {
    let preview = next_number(context, &args).await?;
    if json {
        print_json(&preview)?;
    } else {
        println!("{}", preview.number);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    async fn context() -> (CliContext, TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = AppConfig::new(
            format!("sqlite://{}?mode=rwc", dir.path().join("cli.db").display()),
            "127.0.0.1".to_string(),
            18_081,
            "development".to_string(),
        );
        config.db_max_connections = 1;
        config.db_min_connections = 1;

        let context = CliContext::connect(config).await.expect("connect");
        handle_migrate(&context).await.expect("migrate");
        (context, dir)
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bizdesk").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn command_definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_every_subcommand() {
        assert!(matches!(parse(&["migrate"]).command, Commands::Migrate));

        let cli = parse(&[
            "create-user",
            "--name",
            "Somchai",
            "--email",
            "somchai@example.com",
            "--password",
            "long-enough-1",
            "--role",
            "clerk",
        ]);
        assert!(matches!(cli.command, Commands::CreateUser(ref a) if a.role.as_deref() == Some("clerk")));

        let cli = parse(&["grant", "--email", "somchai@example.com", "--role", "viewer"]);
        assert!(matches!(cli.command, Commands::Grant(ref a) if a.role == "viewer"));

        let cli = parse(&["--json", "next-number", "--kind", "Invoice", "--date", "2024-03-15"]);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::NextNumber(ref a) if a.date == NaiveDate::from_ymd_opt(2024, 3, 15)
        ));

        assert!(Cli::try_parse_from(["bizdesk", "next-number", "--date", "15/03/2024"]).is_err());
    }

    #[tokio::test]
    async fn grant_adds_known_roles_only() {
        let (context, _dir) = context().await;
        let account = context
            .auth_service
            .create_user("Somchai", "somchai@example.com", "long-enough-1")
            .await
            .expect("create user");

        let args = GrantArgs {
            email: "somchai@example.com".into(),
            role: "clerk".into(),
        };
        grant(&context, &args).await.expect("grant clerk");
        let roles = context
            .auth_service
            .get_user_roles(account.id)
            .await
            .expect("roles");
        assert_eq!(roles, vec!["clerk".to_string()]);

        let unknown = GrantArgs {
            email: "somchai@example.com".into(),
            role: "superuser".into(),
        };
        assert!(grant(&context, &unknown).await.is_err());

        let nobody = GrantArgs {
            email: "nobody@example.com".into(),
            role: "viewer".into(),
        };
        assert!(grant(&context, &nobody).await.is_err());
    }

    #[tokio::test]
    async fn next_number_previews_an_empty_month() {
        let (context, _dir) = context().await;

        let preview = next_number(
            &context,
            &NextNumberArgs {
                kind: "BillingNote".into(),
                date: NaiveDate::from_ymd_opt(2024, 3, 15),
            },
        )
        .await
        .expect("preview");
        assert_eq!(preview.kind, DocumentKind::BillingNote);
        assert_eq!(preview.number, "BN-202403-0001");

        let unknown = next_number(
            &context,
            &NextNumberArgs {
                kind: "Quote".into(),
                date: None,
            },
        )
        .await;
        assert!(unknown.is_err());
    }
}
