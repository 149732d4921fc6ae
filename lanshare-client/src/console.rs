//! Line-oriented terminal front end.

use std::{
    io::{self, BufRead},
    path::PathBuf,
};

use chrono::Local;
use lanshare_core::{ChatContext, Message, MessageContent, UserView, emoji};
use tokio::{
    io::{AsyncWriteExt, stdout},
    sync::mpsc,
};
use tracing::warn;

use crate::session::{Command, NoticeLevel, UiEvent};

pub const HELP: &str = "\
commands:
  <text>                    send to the current conversation
  /chat all | /chat <peer>  switch conversation
  /emoji [id]               send an emoji, or list them
  /sendfile <peer> <path>   offer a file
  /accept [fileId]          accept the open (or given) file offer
  /reject [fileId]          reject the open (or given) file offer
  /block <user>             block a user
  /unblock <user>           unblock a user
  /toggle <user>            flip a user's block state
  /help                     show this text
  /quit                     exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Commands(Vec<Command>),
    Help,
    EmojiCatalog,
}

fn required<'a>(arg: Option<&'a str>, usage: &str) -> Result<&'a str, String> {
    arg.map(str::trim)
        .filter(|arg| !arg.is_empty())
        .ok_or_else(|| format!("usage: {usage}"))
}

pub fn parse_line(line: &str) -> Result<Input, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(Input::Commands(Vec::new()));
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Commands(vec![
            Command::UpdateDraft(line.to_owned()),
            Command::SubmitDraft,
        ]));
    };

    let (verb, arg) = match rest.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, Some(arg.trim())),
        None => (rest, None),
    };
    let arg = arg.filter(|arg| !arg.is_empty());

    let command = match verb {
        "help" => return Ok(Input::Help),
        "quit" | "exit" => Command::Shutdown,
        "chat" => {
            let target = required(arg, "/chat all | /chat <peer>")?;
            Command::SwitchContext(ChatContext::from_id(target))
        }
        "emoji" => match arg {
            Some(id) => Command::SendEmoji(id.to_owned()),
            None => return Ok(Input::EmojiCatalog),
        },
        "accept" | "reject" => {
            let accepted = verb == "accept";
            match arg {
                Some(file_id) => Command::RespondToTransfer {
                    file_id: file_id.to_owned(),
                    accepted,
                },
                None => Command::RespondToPrompt { accepted },
            }
        }
        "block" | "unblock" => Command::SetBlocked {
            username: required(arg, "/block <user>")?.to_owned(),
            blocked: verb == "block",
        },
        "toggle" => Command::ToggleBlock(required(arg, "/toggle <user>")?.to_owned()),
        "sendfile" => {
            let usage = "/sendfile <peer> <path>";
            let (target, path) = required(arg, usage)?
                .split_once(char::is_whitespace)
                .ok_or_else(|| format!("usage: {usage}"))?;
            Command::SendFile {
                path: PathBuf::from(path.trim()),
                target: target.to_owned(),
            }
        }
        other => return Err(format!("unknown command /{other}; try /help")),
    };
    Ok(Input::Commands(vec![command]))
}

pub fn emoji_catalog() -> String {
    emoji::CATALOG
        .iter()
        .map(|emoji| format!("  {} {:<10} {}", emoji.glyph, emoji.id, emoji.name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads stdin on a plain thread and forwards parsed commands.
///
/// Sends [`Command::Shutdown`] on end of input. Help output goes straight
/// to stdout.
pub fn spawn_stdin_reader(commands: mpsc::UnboundedSender<Command>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("stdin read failed: {err}");
                    break;
                }
            };
            match parse_line(&line) {
                Ok(Input::Commands(parsed)) => {
                    for command in parsed {
                        let quit = command == Command::Shutdown;
                        if commands.send(command).is_err() || quit {
                            return;
                        }
                    }
                }
                Ok(Input::Help) => println!("{HELP}"),
                Ok(Input::EmojiCatalog) => println!("{}", emoji_catalog()),
                Err(message) => println!("! {message}"),
            }
        }
        let _ = commands.send(Command::Shutdown);
    });
}

fn render_content(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Emoji(id) => match emoji::lookup(id) {
            Some(emoji) => emoji.glyph.to_owned(),
            None => content.encode(),
        },
    }
}

pub fn render_message(message: &Message) -> String {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let sender = if message.is_own { "you" } else { message.sender.as_str() };
    let body = render_content(&message.content);
    match &message.recipient {
        Some(recipient) => format!("[{time}] {sender} -> {recipient}: {body}"),
        None => format!("[{time}] {sender}: {body}"),
    }
}

fn render_users(users: &[UserView]) -> String {
    if users.is_empty() {
        return "peers: (none)".to_owned();
    }
    let names: Vec<String> = users
        .iter()
        .map(|user| {
            if user.is_blocked {
                format!("{} [blocked]", user.username)
            } else {
                user.username.clone()
            }
        })
        .collect();
    format!("peers: {}", names.join(", "))
}

/// Turns [`UiEvent`]s into printable lines.
///
/// Only remembers what it already printed for the current conversation so
/// that a grown log prints just the new tail.
#[derive(Debug, Default)]
pub struct ConsoleRenderer {
    context: Option<ChatContext>,
    printed: usize,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &UiEvent) -> Vec<String> {
        match event {
            UiEvent::MessagesUpdated { context, messages } => {
                let same_view = self.context.as_ref() == Some(context);
                let start = if same_view && messages.len() >= self.printed {
                    self.printed
                } else {
                    0
                };
                let mut lines = Vec::new();
                if !same_view || (start == 0 && self.printed > 0) {
                    lines.push(format!("== {} ==", context.name()));
                }
                lines.extend(messages[start..].iter().map(render_message));
                self.context = Some(context.clone());
                self.printed = messages.len();
                lines
            }
            UiEvent::RosterUpdated(users) => vec![render_users(users)],
            UiEvent::ContextSwitched {
                context,
                discarded_draft,
            } => {
                self.context = None;
                self.printed = 0;
                let mut lines = vec![format!("* now chatting in {}", context.name())];
                if *discarded_draft {
                    lines.push("* unsent draft discarded".to_owned());
                }
                lines
            }
            UiEvent::DraftCleared => Vec::new(),
            UiEvent::TransferPrompt(prompt) => vec![format!(
                "? {} wants to send you {} ({}). /accept or /reject",
                prompt.peer_name, prompt.file_name, prompt.size_label
            )],
            UiEvent::PromptClosed { file_id } => vec![format!("* file offer {file_id} closed")],
            UiEvent::ConnectionChanged(liveness) => vec![format!("* peer service {liveness:?}")],
            UiEvent::ResourceUnreachable { resource, reason } => {
                vec![format!("! could not refresh {resource}: {reason}")]
            }
            UiEvent::Notice { level, text } => {
                let marker = match level {
                    NoticeLevel::Info => "*",
                    NoticeLevel::Success => "+",
                    NoticeLevel::Warning | NoticeLevel::Error => "!",
                };
                vec![format!("{marker} {text}")]
            }
        }
    }
}

/// Prints events until the session drops its sender.
pub async fn print_events(
    mut events: mpsc::UnboundedReceiver<UiEvent>,
    mut renderer: ConsoleRenderer,
) {
    let mut out = stdout();
    while let Some(event) = events.recv().await {
        for line in renderer.render(&event) {
            let written = out.write_all(format!("{line}\n").as_bytes()).await;
            if let Err(err) = written.and(out.flush().await) {
                warn!("stdout write failed: {err}");
                return;
            }
        }
    }
}
