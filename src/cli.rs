use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use inquire::Text;

use crate::action::ActionRegistry;
use crate::config::Settings;
use crate::runtime::{self, App};
use crate::service::dispatcher::TurnReply;
use crate::service::token_store::authorize_with_code;

#[derive(Parser)]
#[command(about = "Chat with your Google Calendar")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the chat API over HTTP.
    Serve {
        /// Overrides BIND_ADDR.
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Interactive chat in the terminal.
    Chat,
    /// Print the calendar actions offered to the model.
    Actions,
    /// Run the consent flow by pasting the authorization code.
    Authorize,
}

pub fn print_actions(registry: &ActionRegistry) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(registry.list_actions())?);
    Ok(())
}

fn load() -> Result<(Settings, Arc<App>), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    let app = Arc::new(App::from_settings(&settings)?);
    Ok((settings, app))
}

/// Runs one command. Everything except `actions` needs a full configuration.
pub async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Actions => print_actions(&ActionRegistry::calendar())?,
        Commands::Serve { addr } => {
            let (settings, app) = load()?;
            runtime::run_api(app, addr.unwrap_or(settings.bind_addr)).await?;
        }
        Commands::Chat => {
            let (_, app) = load()?;
            chat_loop(&app).await;
        }
        Commands::Authorize => {
            let (_, app) = load()?;
            authorize(&app).await?;
        }
    }
    Ok(())
}

async fn chat_loop(app: &App) {
    let session = app.sessions.create().await;
    println!("Ask about your calendar. Empty line or Ctrl-D to quit.");
    loop {
        let Ok(message) = Text::new(">").prompt() else {
            break;
        };
        if message.trim().is_empty() {
            break;
        }
        match app.dispatcher.handle_turn(&session, &message).await {
            Ok(TurnReply::Message { text }) => println!("{}\n", text),
            Ok(TurnReply::AuthenticationRequired { text, .. }) => {
                println!("{}\n", text);
                println!("Run the `authorize` command, then try again.\n");
            }
            Err(e) => println!("{}\n", e),
        }
    }
}

async fn authorize(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    let authorization = app
        .authorization
        .as_ref()
        .ok_or("calendar authorization is not configured")?;
    println!(
        "Open this URL and approve access:\n\n{}\n",
        authorization.oauth.authorization_url()?
    );
    let code = Text::new("Paste the authorization code:").prompt()?;
    let record = authorize_with_code(&authorization.oauth, authorization.tokens.as_ref(), &code).await?;
    println!("Calendar connected. Token valid until {}.", record.expires_at);
    Ok(())
}
