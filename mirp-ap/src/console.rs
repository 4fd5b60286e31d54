//! Line-oriented console front-end
//!
//! Stands in for the device's buttons and display. The controller never
//! starts playback on selection changes; the button policies live here:
//! - `next` plays the new item in local mode, or in radio mode when
//!   something was already playing
//! - `prev` always stops and plays the new item
//! - `select N` stops and moves the selection; `play` starts it

use crate::playback::PlaybackController;
use crate::state::PlayerStatus;
use mirp_common::config::MAX_VOLUME;
use mirp_common::time::{truncate_display_name, DISPLAY_NAME_MAX};
use mirp_common::{PlaybackMode, PlaybackState};
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Volume change for `vol up` / `vol down`
const VOLUME_STEP: i32 = 1;

/// One parsed console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Play,
    Stop,
    Toggle,
    Next,
    Previous,
    Mode(PlaybackMode),
    /// 1-based item number in the active mode
    Select(usize),
    Volume(VolumeChange),
    Status,
    List,
    Rescan,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeChange {
    Set(i32),
    Up,
    Down,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| "empty command".to_string())?
            .to_ascii_lowercase();
        let arg = words.next();

        let command = match verb.as_str() {
            "play" | "p" => ConsoleCommand::Play,
            "stop" | "s" => ConsoleCommand::Stop,
            "toggle" | "t" => ConsoleCommand::Toggle,
            "next" | "n" => ConsoleCommand::Next,
            "prev" | "previous" | "b" => ConsoleCommand::Previous,
            "mode" | "m" => {
                let mode = arg
                    .ok_or_else(|| "usage: mode local|radio".to_string())?
                    .parse::<PlaybackMode>()
                    .map_err(|e| e.to_string())?;
                ConsoleCommand::Mode(mode)
            }
            "select" | "sel" => {
                let number = arg
                    .ok_or_else(|| "usage: select N".to_string())?
                    .parse::<usize>()
                    .map_err(|_| "select expects an item number".to_string())?;
                if number == 0 {
                    return Err("items are numbered from 1".to_string());
                }
                ConsoleCommand::Select(number)
            }
            "vol" | "volume" | "v" => {
                let change = match arg {
                    Some("up") | Some("+") => VolumeChange::Up,
                    Some("down") | Some("-") => VolumeChange::Down,
                    Some(level) => VolumeChange::Set(
                        level
                            .parse::<i32>()
                            .map_err(|_| format!("usage: vol 0-{}|up|down", MAX_VOLUME))?,
                    ),
                    None => return Err(format!("usage: vol 0-{}|up|down", MAX_VOLUME)),
                };
                ConsoleCommand::Volume(change)
            }
            "status" | "st" => ConsoleCommand::Status,
            "list" | "ls" => ConsoleCommand::List,
            "rescan" => ConsoleCommand::Rescan,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            other => return Err(format!("unknown command '{}' (try help)", other)),
        };
        Ok(command)
    }
}

const HELP: &str = "\
commands:
  play | stop | toggle        start, stop, or toggle playback
  next | prev                 move through the active catalog
  mode local|radio            switch content source
  select N                    choose item N of the active catalog
  vol N|up|down               set output level
  status | list | rescan      show status, list items, rescan storage
  quit";

/// Read commands until end of input or `quit`
pub async fn run_console<R, W>(
    controller: &PlaybackController,
    reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(message) => {
                writer.write_all(format!("error: {}\n", message).as_bytes()).await?;
                writer.flush().await?;
                continue;
            }
        };

        if command == ConsoleCommand::Quit {
            break;
        }

        debug!("Console command: {:?}", command);
        let response = execute(controller, command).await;
        writer.write_all(response.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Apply one command and describe the result
pub async fn execute(controller: &PlaybackController, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::Play => match controller.play().await {
            Ok(()) => status_line(&controller.status().await),
            Err(e) => format!("error: {}", e),
        },
        ConsoleCommand::Stop => {
            controller.stop().await;
            status_line(&controller.status().await)
        }
        ConsoleCommand::Toggle => match controller.toggle_play_pause().await {
            Ok(_) => status_line(&controller.status().await),
            Err(e) => format!("error: {}", e),
        },
        ConsoleCommand::Next => {
            let status = controller.status().await;
            let was_playing = status.state.is_playing();
            if let Err(e) = controller.next().await {
                return format!("error: {}", e);
            }
            if status.mode == PlaybackMode::LocalCatalog || was_playing {
                if let Err(e) = controller.play().await {
                    return format!("error: {}", e);
                }
            }
            status_line(&controller.status().await)
        }
        ConsoleCommand::Previous => {
            controller.stop().await;
            if let Err(e) = controller.previous().await {
                return format!("error: {}", e);
            }
            if let Err(e) = controller.play().await {
                return format!("error: {}", e);
            }
            status_line(&controller.status().await)
        }
        ConsoleCommand::Mode(mode) => {
            controller.set_mode(mode).await;
            status_line(&controller.status().await)
        }
        ConsoleCommand::Select(number) => {
            let mode = controller.mode().await;
            controller.stop().await;
            match controller.select_index(mode, number - 1).await {
                Ok(()) => status_line(&controller.status().await),
                Err(e) => format!("error: {}", e),
            }
        }
        ConsoleCommand::Volume(change) => {
            let current = controller.volume() as i32;
            let target = match change {
                VolumeChange::Set(level) => level,
                VolumeChange::Up => current + VOLUME_STEP,
                VolumeChange::Down => current - VOLUME_STEP,
            };
            let level = controller.set_volume(target).await;
            format!("volume {}/{}", level, MAX_VOLUME)
        }
        ConsoleCommand::Status => status_line(&controller.status().await),
        ConsoleCommand::List => {
            let status = controller.status().await;
            let items = controller.items(status.mode).await;
            if items.is_empty() {
                return format!("no {} items", status.mode);
            }
            let selected = status.selection.as_ref().map(|s| s.index);
            items
                .iter()
                .map(|item| {
                    let marker = if Some(item.index) == selected { '>' } else { ' ' };
                    format!(
                        "{} {:>2}. {}",
                        marker,
                        item.index + 1,
                        truncate_display_name(&item.name, DISPLAY_NAME_MAX)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        ConsoleCommand::Rescan => match controller.rescan_catalog().await {
            Ok((local, remote)) => format!("{} local items, {} stations", local, remote),
            Err(e) => format!("error: {}", e),
        },
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Quit => String::new(),
    }
}

/// One-line status summary
pub fn status_line(status: &PlayerStatus) -> String {
    let state = match status.state {
        PlaybackState::Failed { reason } => format!("failed: {}", reason),
        other => other.to_string(),
    };
    let item = match &status.selection {
        Some(selection) => format!(
            "{}/{} {}",
            selection.index + 1,
            status.count(status.mode),
            truncate_display_name(&selection.name, DISPLAY_NAME_MAX)
        ),
        None => "(empty)".to_string(),
    };
    format!(
        "[{}] {} {} {} vol {}/{}",
        status.mode,
        state,
        item,
        status.time_display(),
        status.volume,
        status.max_volume
    )
}
