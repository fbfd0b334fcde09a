use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input, Password};

mod api;
mod app;
mod chat;
mod config;
mod handler;
mod logging;
mod tui;
mod ui;

use api::{ApiClient, ChatBackend};
use app::App;
use config::Config;

#[derive(Parser)]
#[command(name = "chat")]
#[command(about = "Terminal client for a session-based chat backend", version)]
struct Cli {
    /// Backend base URL (overrides the configured value)
    #[arg(short, long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session cookie
    Login {
        /// Account email (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Create a new account
    Signup,
    /// End the server session and clear the stored cookie
    Logout,
    /// List your chat sessions
    Sessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|_| Config::new());
    if let Some(server) = &cli.server {
        config.server_url = Some(server.clone());
    }
    if let Ok(log_dir) = Config::log_dir() {
        logging::init(log_dir);
    }

    let client = ApiClient::new(config.server_url(), config.auth_cookie.clone());

    match cli.command {
        Some(Commands::Login { email }) => login(&mut config, &client, email).await,
        Some(Commands::Signup) => signup(&client).await,
        Some(Commands::Logout) => logout(&mut config, &client).await,
        Some(Commands::Sessions) => list_sessions(&client).await,
        None => run_tui(client).await,
    }
}

async fn login(config: &mut Config, client: &ApiClient, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => {
            let theme = ColorfulTheme::default();
            let mut prompt = Input::<String>::with_theme(&theme).with_prompt("Email");
            if let Some(known) = &config.email {
                prompt = prompt.default(known.clone());
            }
            prompt.interact_text()?
        }
    };
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Password")
        .interact()?;

    match client.login(&email, &password).await {
        Ok((user, cookies)) => {
            if cookies.is_empty() {
                println!(
                    "{}",
                    "Server set no session cookie; requests may stay unauthenticated".yellow()
                );
            }
            config.email = Some(email);
            config.auth_cookie = if cookies.is_empty() {
                None
            } else {
                Some(cookies.join("; "))
            };
            config.save()?;
            println!(
                "{} {} <{}>",
                "Logged in as".green(),
                user.name.bold(),
                user.email
            );
        }
        Err(e) => {
            println!("{}: {}", "Login failed".red(), e);
        }
    }

    Ok(())
}

async fn signup(client: &ApiClient) -> Result<()> {
    let name = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt("Name")
        .interact_text()?;
    let email = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt("Email")
        .interact_text()?;
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    match client.signup(&name, &email, &password).await {
        Ok(user) => {
            println!("{} {}", "Account created for".green(), user.name.bold());
            println!("Log in with: {}", "chat login".bold());
        }
        Err(e) => {
            println!("{}: {}", "Signup failed".red(), e);
        }
    }

    Ok(())
}

async fn logout(config: &mut Config, client: &ApiClient) -> Result<()> {
    match client.logout().await {
        Ok(()) => println!("{}", "Logged out".green()),
        Err(e) => println!("{}: {}", "Logout call failed".red(), e),
    }

    // The local cookie is useless either way
    config.auth_cookie = None;
    config.save()?;

    Ok(())
}

async fn list_sessions(client: &ApiClient) -> Result<()> {
    match client.list_sessions().await {
        Ok(sessions) => {
            println!("\n{}", "Chat Sessions".bold().blue());
            println!("{}", "=".repeat(30).dimmed());

            if sessions.is_empty() {
                println!("{}", "No sessions yet".yellow());
            } else {
                for session in sessions {
                    println!("  • {} {}", session.title.green(), session.id.dimmed());
                }
            }
        }
        Err(e) => {
            println!("{}: {}", "Could not list sessions".red(), e);
            println!("Are you logged in? Try: {}", "chat login".bold());
        }
    }

    Ok(())
}

async fn run_tui(client: ApiClient) -> Result<()> {
    let user = match client.auth_status().await {
        Ok(user) => user,
        Err(e) => {
            println!("{}: {}", "Not authenticated".red(), e);
            println!("Log in first with: {}", "chat login".bold());
            return Ok(());
        }
    };

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let mut app = App::new(Arc::new(client), user);
    app.start_session_list_load();

    let result = run_loop(&mut terminal, &mut events, &mut app).await;
    tui::restore()?;
    result
}

async fn run_loop(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event);
        }
        app.poll_tasks();
    }

    Ok(())
}
