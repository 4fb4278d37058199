use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

use canary_types::CanaryType;

pub const HELP: &str = "\
help: displays this page
exit: exits the program

user:
 login <username> <password>: logs in
 register <username> <password>: registers a new user (no spaces in either)
 reset <new password>: changes your password
 deleteme: deletes your account and all your canaries, without confirmation

canary types:
 image: a 1x1 pixel, for emails and documents
 text: shows \"This is a test page.\"
 redirect: sends the visitor on to another url

canary:
 new <name> <type> [redirect]: creates a canary
 update <id> <name> <type> [redirect]: changes a canary
 rm <id>: deletes a canary and its events
 rmname <name>: deletes every canary with that name
 wipe <id>: clears the event history
 get <id>: shows one canary and its events
 list: shows all your canaries
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Exit,
    Login { username: String, password: String },
    Register { username: String, password: String },
    Reset { password: String },
    DeleteMe,
    New { name: String, kind: CanaryType, redirect: String },
    Update { id: Uuid, name: String, kind: CanaryType, redirect: String },
    Rm { id: Uuid },
    RmName { name: String },
    Wipe { id: Uuid },
    Get { id: Uuid },
    List,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid command '{0}', use 'help' to get help")]
    Unknown(String),
    #[error("too few arguments, use 'help' to get help")]
    TooFewArguments,
    #[error("'{0}' is not a canary id")]
    InvalidId(String),
    #[error("unknown canary type '{0}', use image, text or redirect")]
    InvalidType(String),
}

impl Command {
    /// Parses one input line. Runs of whitespace count as a single separator
    /// and the command word is case-insensitive.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((first, args)) = words.split_first() else {
            return Ok(Command::Empty);
        };

        let need = |n: usize| {
            if args.len() < n {
                Err(ParseError::TooFewArguments)
            } else {
                Ok(())
            }
        };
        let redirect_at = |i: usize| args.get(i).map(|s| s.to_string()).unwrap_or_default();

        let command = match first.to_ascii_lowercase().as_str() {
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            "login" => {
                need(2)?;
                Command::Login {
                    username: args[0].to_string(),
                    password: args[1].to_string(),
                }
            }
            "register" => {
                need(2)?;
                Command::Register {
                    username: args[0].to_string(),
                    password: args[1].to_string(),
                }
            }
            "reset" => {
                need(1)?;
                Command::Reset {
                    password: args[0].to_string(),
                }
            }
            "deleteme" => Command::DeleteMe,
            "new" => {
                need(2)?;
                Command::New {
                    name: args[0].to_string(),
                    kind: parse_kind(args[1])?,
                    redirect: redirect_at(2),
                }
            }
            "update" => {
                need(3)?;
                Command::Update {
                    id: parse_id(args[0])?,
                    name: args[1].to_string(),
                    kind: parse_kind(args[2])?,
                    redirect: redirect_at(3),
                }
            }
            "rm" => {
                need(1)?;
                Command::Rm { id: parse_id(args[0])? }
            }
            "rmname" => {
                need(1)?;
                Command::RmName {
                    name: args[0].to_string(),
                }
            }
            "wipe" => {
                need(1)?;
                Command::Wipe { id: parse_id(args[0])? }
            }
            "get" => {
                need(1)?;
                Command::Get { id: parse_id(args[0])? }
            }
            "list" => Command::List,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }

    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Command::Empty | Command::Help | Command::Exit | Command::Login { .. } | Command::Register { .. }
        )
    }
}

fn parse_id(raw: &str) -> Result<Uuid, ParseError> {
    Uuid::parse_str(raw).map_err(|_| ParseError::InvalidId(raw.to_string()))
}

fn parse_kind(raw: &str) -> Result<CanaryType, ParseError> {
    CanaryType::from_str(raw).map_err(|_| ParseError::InvalidType(raw.to_string()))
}
