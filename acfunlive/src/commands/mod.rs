//! Text command surface shared by the stdin listener and the HTTP server.

mod handler;
mod stdin;

pub use handler::{CommandHandler, Streaming};
pub use stdin::spawn_stdin_listener;

use strum::{EnumIter, EnumString, IntoStaticStr};

/// Number of numeric arguments a command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    Uid,
    UidAndQq,
}

/// Every command understood by the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    ListLive,
    ListRecord,
    ListDanmu,
    ListStreamer,
    StartWeb,
    StopWeb,
    StartCoolq,
    Quit,
    Help,
    AddNotify,
    DelNotify,
    AddRecord,
    DelRecord,
    AddDanmu,
    DelDanmu,
    StartRecord,
    StopRecord,
    StartDanmu,
    StopDanmu,
    StartRecDan,
    StopRecDan,
    GetDlUrl,
    DelQq,
    DelQqGroup,
    AddQq,
    AddQqGroup,
}

impl Command {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn arity(self) -> Arity {
        use Command::*;
        match self {
            ListLive | ListRecord | ListDanmu | ListStreamer | StartWeb | StopWeb | StartCoolq
            | Quit | Help => Arity::None,
            AddNotify | DelNotify | AddRecord | DelRecord | AddDanmu | DelDanmu | StartRecord
            | StopRecord | StartDanmu | StopDanmu | StartRecDan | StopRecDan | GetDlUrl | DelQq
            | DelQqGroup => Arity::Uid,
            AddQq | AddQqGroup => Arity::UidAndQq,
        }
    }

    pub fn description(self) -> &'static str {
        use Command::*;
        match self {
            ListLive => "list rooms that are live now",
            ListRecord => "list running recordings",
            ListDanmu => "list running danmu captures",
            ListStreamer => "list watched streamers and their settings",
            StartWeb => "start the HTTP server",
            StopWeb => "stop the HTTP server",
            StartCoolq => "send live notifications to QQ through Coolq",
            Quit => "stop everything and exit",
            Help => "show this help",
            AddNotify => "notify when <uid> goes live",
            DelNotify => "stop notifying about <uid>",
            AddRecord => "record <uid> whenever it goes live",
            DelRecord => "stop recording <uid> automatically",
            AddDanmu => "capture the danmu of <uid> whenever it goes live",
            DelDanmu => "stop capturing the danmu of <uid> automatically",
            StartRecord => "record <uid> now",
            StopRecord => "stop recording <uid>",
            StartDanmu => "capture the danmu of <uid> now",
            StopDanmu => "stop capturing the danmu of <uid>",
            StartRecDan => "record <uid> and capture its danmu now",
            StopRecDan => "stop recording <uid> and capturing its danmu",
            GetDlUrl => "print the hls and flv stream URLs of <uid>",
            DelQq => "stop sending live notifications of <uid> to QQ",
            DelQqGroup => "stop sending live notifications of <uid> to a QQ group",
            AddQq => "send live notifications of <uid> to QQ <qq>",
            AddQqGroup => "send live notifications of <uid> to QQ group <group>",
        }
    }
}

/// Help text listing every command.
pub fn help_text() -> String {
    use strum::IntoEnumIterator;

    Command::iter()
        .map(|cmd| {
            let usage = match cmd.arity() {
                Arity::None => cmd.name().to_string(),
                Arity::Uid => format!("{} <uid>", cmd.name()),
                Arity::UidAndQq => format!("{} <uid> <qq>", cmd.name()),
            };
            format!("{usage:<28}{}", cmd.description())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::from_str("listlive").unwrap(), Command::ListLive);
        assert_eq!(Command::from_str("startrecdan").unwrap(), Command::StartRecDan);
        assert_eq!(Command::from_str("addqqgroup").unwrap(), Command::AddQqGroup);
        assert_eq!(Command::from_str("getdlurl").unwrap(), Command::GetDlUrl);
        assert!(Command::from_str("nope").is_err());
    }

    #[test]
    fn test_arity() {
        assert_eq!(Command::Quit.arity(), Arity::None);
        assert_eq!(Command::AddDanmu.arity(), Arity::Uid);
        assert_eq!(Command::AddQq.arity(), Arity::UidAndQq);
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_text();
        assert!(help.contains("stoprecdan <uid>"));
        assert!(help.contains("addqq <uid> <qq>"));
        assert!(help.lines().count() >= 26);
    }
}
