use clap::Subcommand;
use solosync_core::api::current_user;
use solosync_core::{Config, KeyringTokenStore};

use super::InputLines;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Exchange username and password for API tokens
    Login {
        /// Account username
        #[arg(long)]
        username: String,
        /// Password (asked for on stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget stored tokens
    Logout,
    /// Show who is logged in
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => InputLines::stdin()
                    .prompt("Password: ")
                    .ok_or("no password given")?,
            };
            let config = Config::load()?;
            let api = super::api_client(&config)?;
            let claims = super::runtime()?.block_on(api.login(&username, &password))?;
            match claims.and_then(|c| c.username) {
                Some(name) => println!("logged in as {name}"),
                None => println!("logged in"),
            }
        }
        AuthAction::Logout => {
            let config = Config::load()?;
            super::api_client(&config)?.logout()?;
            println!("logged out");
        }
        AuthAction::Status => {
            let store = KeyringTokenStore::new();
            match current_user(&store)? {
                Some(claims) => {
                    let who = claims.username.as_deref().unwrap_or("unknown user");
                    match claims.expires_at() {
                        Some(at) => println!("logged in as {who} (token expires {at})"),
                        None => println!("logged in as {who}"),
                    }
                }
                None => println!("not logged in"),
            }
        }
    }
    Ok(())
}
