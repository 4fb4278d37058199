mod client;
mod command;

use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::client::{CanaryClient, ClientError};
use crate::command::{Command, HELP};

const DEFAULT_URL: &str = "http://127.0.0.1:8080/api";

#[derive(Debug, Parser)]
#[command(name = "canary-cli", version, about = "Interactive client for a canary server")]
struct Args {
    /// Server API base url
    #[arg(long, env = "CANARY_URL", default_value = DEFAULT_URL)]
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "canary_cli=warn".into()))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    println!("canary cli {}", env!("CARGO_PKG_VERSION"));
    if args.url == DEFAULT_URL {
        warn!("{} selected as default endpoint, use --url to change it", DEFAULT_URL);
    }

    let mut client = CanaryClient::new(&args.url);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        match client.username() {
            Some(user) => print!("canary ({}) > ", user),
            None => print!("canary > "),
        }
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let command = match Command::parse(&line?) {
            Ok(command) => command,
            Err(e) => {
                println!("error: {}", e);
                continue;
            }
        };

        if command == Command::Exit {
            break;
        }
        if command.requires_session() && client.username().is_none() {
            println!("error: {}", ClientError::NotLoggedIn);
            continue;
        }
        if let Err(e) = run(&mut client, command).await {
            println!("error: {}", e);
        }
    }

    println!("exiting...");
    Ok(())
}

async fn run(client: &mut CanaryClient, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Empty | Command::Exit => {}
        Command::Help => print!("{}", HELP),
        Command::Login { username, password } => {
            client.login(&username, &password).await?;
            println!("logged in");
        }
        Command::Register { username, password } => {
            client.register(&username, &password).await?;
            println!("new user registered");
        }
        Command::Reset { password } => {
            client.reset_password(&password).await?;
            println!("password reset successfully");
        }
        Command::DeleteMe => {
            client.delete_me().await?;
            println!("user deleted");
        }
        Command::New { name, kind, redirect } => {
            let canary = client.new_canary(&name, kind, &redirect).await?;
            println!("canary created: {}", client.trigger_url(canary.id));
        }
        Command::Update { id, name, kind, redirect } => {
            client.update_canary(id, &name, kind, &redirect).await?;
            println!("canary updated");
        }
        Command::Rm { id } => {
            client.delete_canary(id).await?;
            println!("canary deleted");
        }
        Command::RmName { name } => {
            let deleted = client.delete_by_name(&name).await?;
            println!("{} canaries deleted", deleted);
        }
        Command::Wipe { id } => {
            client.wipe(id).await?;
            println!("canary events wiped successfully");
        }
        Command::Get { id } => {
            let canary = client.canary(id).await?;
            let history = client.history(id).await?;
            println!("canary: {} ({})", canary.name, canary.kind);
            if history.is_empty() {
                println!(" no events");
            }
            for event in history {
                println!(
                    " {}:\n  IP: {}\n  User Agent: {}\n  Language: {}\n",
                    event.timestamp, event.ip, event.user_agent, event.accept_language
                );
            }
        }
        Command::List => {
            let canaries = client.list().await?;
            if canaries.is_empty() {
                println!("no canaries yet");
            }
            for entry in canaries {
                let canary = entry.canary;
                println!(
                    "name: {} | type: {} | id: {} | url: {}",
                    canary.name,
                    canary.kind,
                    canary.id,
                    client.trigger_url(canary.id)
                );
                if !entry.history.is_empty() {
                    println!(" triggered ({} times)", entry.history.len());
                }
            }
        }
    }
    Ok(())
}
