use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use portal_client::{ApiClient, FileSessionStore, Portal, Session};
use portal_core::format_optional_eur;
use portal_web::PortalConfig;
use tracing::info;

const DEFAULT_LOG_FILTER: &str = "portal_web=info,portal_client=info,tower_http=info";

#[derive(Debug, Parser)]
#[command(name = "portal-cli")]
#[command(about = "Provider portal command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the web portal.
    Serve,
    /// Sign in and keep the session in the session file.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    /// Pull service requests from the marketplace integration.
    SyncRequests,
    List {
        #[arg(value_enum)]
        resource: Resource,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Resource {
    Contracts,
    ServiceRequests,
    ServiceOffers,
    ServiceOrders,
    Specialists,
    ActivityLogs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = PortalConfig::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => portal_web::serve(config).await?,
        Commands::Login { email, password } => {
            let portal = stored_portal(&config).await?;
            let user = portal.login(&email, &password).await.map_err(user_facing)?;
            println!(
                "signed in as {} ({})",
                user.display_name(),
                user.role_set().labels().join(", ")
            );
        }
        Commands::Logout => {
            let portal = stored_portal(&config).await?;
            portal.logout().await;
            println!("signed out");
        }
        Commands::Whoami => {
            let portal = signed_in_portal(&config).await?;
            let user = portal.me().await.map_err(user_facing)?;
            println!("{}\t{}\t{}", user.id, user.email, user.role_set().labels().join(", "));
        }
        Commands::SyncRequests => {
            let portal = signed_in_portal(&config).await?;
            let user = portal.current_user().await.map_err(user_facing)?;
            if !user.role_set().can_sync_service_requests() {
                bail!("your role cannot sync service requests");
            }
            let summary = portal.sync_service_requests().await.map_err(user_facing)?;
            info!("service request sync finished");
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::List { resource } => {
            let portal = signed_in_portal(&config).await?;
            for line in list_lines(&portal, resource).await.map_err(user_facing)? {
                println!("{line}");
            }
        }
    }

    Ok(())
}

async fn stored_portal(config: &PortalConfig) -> Result<Portal> {
    let client = ApiClient::new(&config.client_config())
        .with_context(|| format!("configuring client for {}", config.api_base_url))?;
    let store = Arc::new(FileSessionStore::new(config.session_file.clone()));
    let session = Session::restore(store).await;
    Ok(Portal::new(client, Arc::new(session)))
}

async fn signed_in_portal(config: &PortalConfig) -> Result<Portal> {
    let portal = stored_portal(config).await?;
    if !portal.session().is_authenticated().await {
        bail!(
            "not signed in (no session in {}); run `portal-cli login` first",
            config.session_file.display()
        );
    }
    Ok(portal)
}

fn user_facing(err: portal_client::ApiError) -> anyhow::Error {
    if err.is_session_expired() {
        anyhow::anyhow!("session expired; run `portal-cli login` again")
    } else {
        anyhow::Error::new(err).context("backend request failed")
    }
}

async fn list_lines(
    portal: &Portal,
    resource: Resource,
) -> Result<Vec<String>, portal_client::ApiError> {
    let lines = match resource {
        Resource::Contracts => portal
            .list_contracts()
            .await?
            .into_iter()
            .map(|c| format!("{}\t{}\t{}", c.id, c.status, c.title))
            .collect(),
        Resource::ServiceRequests => portal
            .list_service_requests()
            .await?
            .into_iter()
            .map(|r| format!("{}\t{}\t{}", r.id, r.status, r.title))
            .collect(),
        Resource::ServiceOffers => portal
            .list_service_offers()
            .await?
            .into_iter()
            .map(|o| {
                format!(
                    "{}\trequest {}\t{}\t{}",
                    o.id,
                    o.service_request_id,
                    o.status,
                    format_optional_eur(o.total_cost)
                )
            })
            .collect(),
        Resource::ServiceOrders => portal
            .list_service_orders()
            .await?
            .into_iter()
            .map(|o| format!("{}\t{}\t{}", o.id, o.status, o.title))
            .collect(),
        Resource::Specialists => portal
            .list_specialists()
            .await?
            .into_iter()
            .map(|s| format!("{}\t{}\t{}", s.id, s.name, s.skills.join(", ")))
            .collect(),
        Resource::ActivityLogs => portal
            .list_activity_logs()
            .await?
            .into_iter()
            .map(|l| {
                format!(
                    "{}\t{}\t{}",
                    l.created_at.format("%Y-%m-%d %H:%M"),
                    l.event_type,
                    l.message
                )
            })
            .collect(),
    };
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_takes_kebab_case_resources() {
        let cli = Cli::try_parse_from(["portal-cli", "list", "service-orders"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::List {
                resource: Resource::ServiceOrders
            })
        ));
        assert!(Cli::try_parse_from(["portal-cli", "list", "invoices"]).is_err());
    }

    #[test]
    fn login_requires_both_credentials() {
        assert!(Cli::try_parse_from(["portal-cli", "login", "--email", "a@b.co"]).is_err());
        let cli = Cli::try_parse_from([
            "portal-cli",
            "login",
            "--email",
            "a@b.co",
            "--password",
            "pw",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Login { .. })));
    }
}
