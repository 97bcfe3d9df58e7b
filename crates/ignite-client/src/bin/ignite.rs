//! Terminal chat client.

use std::fmt::Display;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use futures::stream::{BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use ignite_client::{
    ChatClient, ChatContext, ClientConfig, ClientError, DirectoryWatch, RoomSummary, SessionFile,
    UserAction,
};
use ignite_shared::{RoomId, UserName};
use ignite_store::{Database, Message, Store};

const HELP: &str = "\
Commands:
  /rooms            list rooms with active member counts
  /create <name>    create a room and enter it
  /join <n|id>      enter room number n from /rooms, or by id
  /who              active members of the current room
  /leave            leave the current room
  /logout           forget your name and quit
  /quit             quit
Anything else is sent to the current room.";

type Input = Lines<BufReader<Stdin>>;

enum Flow {
    Continue,
    Quit,
    Logout,
}

struct Repl {
    client: ChatClient,
    directory: DirectoryWatch,
    /// The listing `/join <n>` numbers refer to.
    rooms: Vec<RoomSummary>,
    feed: Option<BoxStream<'static, Message>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    ignite_client::init_tracing();

    let config = ClientConfig::from_env();
    let session_file = SessionFile::at(match &config.session_path {
        Some(path) => path.clone(),
        None => SessionFile::default_path()?,
    });
    let mut saved = session_file.load_or_create()?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let user = match saved.user_name.clone() {
        Some(user) => user,
        None => {
            let Some(user) = prompt_name(&mut input).await? else {
                return Ok(());
            };
            saved.user_name = Some(user.clone());
            session_file.save(&saved)?;
            user
        }
    };

    let db_path = match &config.db_path {
        Some(path) => path.clone(),
        None => Database::default_path()?,
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = Arc::new(Store::open_at(&db_path)?);
    info!(path = %db_path.display(), user = %user, session = %saved.session_id, "starting");

    let ctx = ChatContext::new(user.clone(), saved.session_id.clone(), config);
    let client = ChatClient::new(Arc::new(store.session(user.clone())), ctx);
    let directory = match client.directory().watch().await {
        Ok(directory) => directory,
        Err(e) => {
            show_error(&e, UserAction::LoadRooms);
            return Err(e.into());
        }
    };
    let mut repl = Repl {
        client,
        directory,
        rooms: Vec::new(),
        feed: None,
    };

    println!("Welcome, {user}! Type /help for commands.");
    repl.list_rooms();

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                match repl.handle(line.trim()).await {
                    Flow::Continue => {}
                    Flow::Quit => break,
                    Flow::Logout => {
                        repl.client.logout().await;
                        session_file.clear()?;
                        println!("Logged out.");
                        return Ok(());
                    }
                }
            }
            message = next_message(&mut repl.feed) => match message {
                Some(message) => print_message(&message),
                None => repl.feed = None,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    repl.client.shutdown().await;
    Ok(())
}

async fn prompt_name(input: &mut Input) -> Result<Option<UserName>> {
    loop {
        println!("Enter your name to start chatting:");
        let Some(line) = input.next_line().await? else {
            return Ok(None);
        };
        match UserName::parse(&line) {
            Ok(name) => return Ok(Some(name)),
            Err(e) => println!("{e}"),
        }
    }
}

async fn next_message(feed: &mut Option<BoxStream<'static, Message>>) -> Option<Message> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}

impl Repl {
    async fn handle(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "/help" => println!("{HELP}"),
            "/rooms" => self.list_rooms(),
            "/create" => self.create_room(arg).await,
            "/join" => self.join(arg).await,
            "/who" => self.who().await,
            "/leave" => {
                self.feed = None;
                match self.client.leave_room() {
                    Some(room) => println!("Left #{}.", room.name),
                    None => println!("You are not in a room."),
                }
            }
            "/logout" => return Flow::Logout,
            "/quit" => return Flow::Quit,
            _ if command.starts_with('/') => println!("Unknown command {command}. Try /help."),
            _ => self.send(line).await,
        }
        Flow::Continue
    }

    /// Print the live directory and remember it for `/join <n>`.
    fn list_rooms(&mut self) {
        let rooms = self.directory.current();
        if rooms.is_empty() {
            println!("No chat rooms yet. Create one with /create <name>.");
        }
        for (i, summary) in rooms.iter().enumerate() {
            println!(
                "{:>3}. #{} ({} active)",
                i + 1,
                summary.room.name,
                summary.active_count
            );
        }
        self.rooms = rooms;
    }

    async fn create_room(&mut self, name: &str) {
        match self.client.directory().create_room(name).await {
            Ok(room) => {
                println!("Created #{}.", room.name);
                self.enter(room.id).await;
            }
            Err(e) => show_error(&e, UserAction::CreateRoom),
        }
    }

    async fn join(&mut self, arg: &str) {
        let room_id = match arg.parse::<usize>() {
            Ok(n) if n >= 1 && n <= self.rooms.len() => Some(self.rooms[n - 1].room.id),
            Ok(_) => None,
            Err(_) => RoomId::parse(arg).ok(),
        };
        match room_id {
            Some(room_id) => self.enter(room_id).await,
            None => println!("No such room. Use /rooms to list them."),
        }
    }

    async fn enter(&mut self, room_id: RoomId) {
        self.feed = None;
        match self.client.enter_room(room_id).await {
            Ok(session) => {
                println!("--- #{} ---", session.room().name);
                self.feed = session.take_feed().map(|feed| feed.into_stream());
            }
            Err(e) => show_error(&e, UserAction::JoinRoom),
        }
    }

    async fn who(&self) {
        match self.client.active_members().await {
            Ok(members) => {
                println!("{} active", members.len());
                let now = Local::now();
                for member in members {
                    let owner = if member.is_owner { " (owner)" } else { "" };
                    println!(
                        "  {}{} last seen {}",
                        member.user_name,
                        owner,
                        format_message_time(&member.last_activity.with_timezone(&Local), &now)
                    );
                }
            }
            Err(e) => show_error(&e, UserAction::LoadMessages),
        }
    }

    async fn send(&self, body: &str) {
        if let Err(e) = self.client.send(body).await {
            show_error(&e, UserAction::SendMessage);
        }
    }
}

fn show_error(err: &ClientError, action: UserAction) {
    tracing::debug!(error = %err, ?action, "user-visible failure");
    let notice = err.notice(action);
    println!("! {}: {}", notice.title, notice.description);
}

fn print_message(message: &Message) {
    let local = message.created_at.with_timezone(&Local);
    let time = format_message_time(&local, &Local::now());
    println!("[{time}] {}: {}", message.user_name, message.body);
    if let Some(media) = &message.media {
        println!("        <{}>", media.url);
    }
}

/// `HH:MM` today, `Yesterday HH:MM`, otherwise `Mon DD HH:MM`.
fn format_message_time<Tz: TimeZone>(ts: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let day = ts.date_naive();
    let today = now.date_naive();
    if day == today {
        ts.format("%H:%M").to_string()
    } else if today.pred_opt() == Some(day) {
        ts.format("Yesterday %H:%M").to_string()
    } else {
        ts.format("%b %d %H:%M").to_string()
    }
}
