//! Verb table and command handlers.
//!
//! A completed line is split into a verb and at most one argument string;
//! the verb is looked up case-insensitively in a static table of plain
//! `fn` handlers.  Every handler replies through [`send_reply`] with the
//! configured budget; an undelivered reply does not undo the change it
//! announces.  Successful commands pulse the indicator.

use log::{info, warn};

use crate::app::ports::{Board, RetainedRegisters, StorageError, WallClock};
use crate::config::{LOG_FILE_NAME, LoggerConfig};
use crate::protocol::args::{self, TimeArgError};
use crate::protocol::stream::{self, send_reply};
use crate::schedule::ScheduleStore;

/// Whether the session keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub const HELP_TEXT: &str = "Commands:\r\n\
 SETTIME epoch=<sec> | iso=YYYY-MM-DDTHH:MM:SSZ\r\n\
 STARTLOG epoch=<sec> | iso=...\r\n\
 ENDLOG   epoch=<sec> | iso=...\r\n\
 STOPLOG\r\n\
 SETINTERVAL <sec>\r\n\
 ERASELOG\r\n\
 GETLOG [SINCE=<sec>] | GETLOG BETWEEN=<a>,<b>\r\n\
 STATUS\r\n\
 QUIT\r\n";

pub const UNKNOWN_REPLY: &str = "ERR unknown (type HELP)\r\n";

/// Everything a handler may touch.
pub struct CommandEnv<'a, 'b, R, C> {
    pub store: &'a mut ScheduleStore<R, C>,
    pub board: &'a mut Board<'b>,
    pub config: &'a LoggerConfig,
}

impl<R: RetainedRegisters, C: WallClock> CommandEnv<'_, '_, R, C> {
    /// Best-effort reply.
    pub fn reply(&mut self, text: &str) {
        let board = &mut *self.board;
        if !send_reply(
            board.link,
            board.timebase,
            text.as_bytes(),
            self.config.reply_timeout_ms,
        ) {
            warn!("Reply not delivered: {}", text.trim_end());
        }
    }

    /// Visible acknowledgement of a successful command.
    fn accept(&mut self) {
        let board = &mut *self.board;
        board
            .indicator
            .pulse(board.timebase, self.config.accept_pulse_ms);
    }
}

type Handler<R, C> = fn(&mut CommandEnv<'_, '_, R, C>, Option<&str>) -> Flow;

const VERB_COUNT: usize = 11;

fn verb_table<R: RetainedRegisters, C: WallClock>() -> [(&'static str, Handler<R, C>); VERB_COUNT] {
    [
        ("HELP", cmd_help),
        ("SETTIME", cmd_settime),
        ("STARTLOG", cmd_startlog),
        ("ENDLOG", cmd_endlog),
        ("STOPLOG", cmd_stoplog),
        ("SETINTERVAL", cmd_setinterval),
        ("INTERVAL", cmd_setinterval),
        ("ERASELOG", cmd_eraselog),
        ("GETLOG", cmd_getlog),
        ("STATUS", cmd_status),
        ("QUIT", cmd_quit),
    ]
}

/// Split `line` into verb and argument and run the matching handler.
pub fn dispatch<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    line: &[u8],
) -> Flow {
    let Ok(text) = core::str::from_utf8(line) else {
        env.reply(UNKNOWN_REPLY);
        return Flow::Continue;
    };

    let Some((verb, arg)) = split_command(text) else {
        return Flow::Continue;
    };

    match verb_table::<R, C>()
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(verb))
    {
        Some((name, handler)) => {
            info!("Command: {}", name);
            handler(env, arg)
        }
        None => {
            env.reply(UNKNOWN_REPLY);
            Flow::Continue
        }
    }
}

/// Leading blanks skipped, verb up to the first blank, argument after any
/// further blanks.  `None` for a blank line.
pub fn split_command(text: &str) -> Option<(&str, Option<&str>)> {
    let text = text.trim_start_matches([' ', '\t']);
    if text.is_empty() {
        return None;
    }
    Some(match text.find([' ', '\t']) {
        Some(i) => {
            let arg = text[i..].trim_start_matches([' ', '\t']);
            (&text[..i], (!arg.is_empty()).then_some(arg))
        }
        None => (text, None),
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn cmd_help<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    _arg: Option<&str>,
) -> Flow {
    env.reply(HELP_TEXT);
    env.accept();
    Flow::Continue
}

fn cmd_settime<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    arg: Option<&str>,
) -> Flow {
    let Some(arg) = arg else {
        env.reply("ERR missing arg\r\n");
        return Flow::Continue;
    };
    match args::parse_time_arg(arg) {
        Ok(epoch) => {
            env.store.set_wall_clock(epoch);
            env.store.mark_provisioned();
            env.reply("OK TIME SET\r\n");
            env.accept();
        }
        Err(TimeArgError::BadIso(e)) => {
            warn!("SETTIME: {}", e);
            env.reply("ERR bad ISO time\r\n");
        }
        Err(TimeArgError::UnknownForm) => env.reply("ERR arg\r\n"),
    }
    Flow::Continue
}

fn cmd_startlog<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    arg: Option<&str>,
) -> Flow {
    set_bound(env, arg, "STARTLOG", ScheduleStore::set_start_epoch)
}

fn cmd_endlog<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    arg: Option<&str>,
) -> Flow {
    set_bound(env, arg, "ENDLOG", ScheduleStore::set_end_epoch)
}

fn set_bound<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    arg: Option<&str>,
    verb: &str,
    set: fn(&mut ScheduleStore<R, C>, u32),
) -> Flow {
    let Some(arg) = arg else {
        env.reply("ERR missing arg\r\n");
        return Flow::Continue;
    };
    match args::parse_time_arg(arg) {
        Ok(epoch) => {
            set(env.store, epoch);
            let mut reply = heapless::String::<32>::new();
            let _ = reply.push_str("OK ");
            let _ = reply.push_str(verb);
            let _ = reply.push_str(" set\r\n");
            env.reply(&reply);
            env.accept();
        }
        Err(_) => env.reply("ERR bad time\r\n"),
    }
    Flow::Continue
}

fn cmd_stoplog<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    _arg: Option<&str>,
) -> Flow {
    env.store.clear_start_epoch();
    env.store.clear_end_epoch();
    env.reply("OK logging disabled\r\n");
    env.accept();
    Flow::Continue
}

fn cmd_setinterval<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    arg: Option<&str>,
) -> Flow {
    let Some(arg) = arg else {
        env.reply("ERR missing seconds\r\n");
        return Flow::Continue;
    };
    let (seconds, _) = args::parse_u32_lenient(arg);
    env.store.set_interval(seconds);
    info!("Interval now {} s", env.store.interval());
    env.reply("OK INTERVAL set\r\n");
    env.accept();
    Flow::Continue
}

fn cmd_eraselog<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    _arg: Option<&str>,
) -> Flow {
    let log = &mut *env.board.log;
    let result = log.mount_or_format().and_then(|()| {
        let removed = log.remove();
        log.unmount();
        removed
    });
    match result {
        Ok(()) => {
            info!("{} erased", LOG_FILE_NAME);
            env.reply("OK wake.bin erased\r\n");
            env.accept();
        }
        Err(e) => {
            warn!("Erase failed: {}", e);
            env.reply("ERR erase failed\r\n");
        }
    }
    Flow::Continue
}

fn cmd_getlog<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    arg: Option<&str>,
) -> Flow {
    let filter = match args::parse_log_filter(arg) {
        Ok(f) => f,
        Err(_) => {
            env.reply("ERR bad range\r\n");
            return Flow::Continue;
        }
    };
    if let Err(e) = env.board.log.mount() {
        warn!("GETLOG: {}", e);
        env.reply("ERR mount\r\n");
        return Flow::Continue;
    }

    let streamed = match env.board.log.log_size() {
        Ok(size) => {
            info!("GETLOG: streaming {} bytes, filter {:?}", size, filter);
            let board = &mut *env.board;
            if let Err(e) = stream::stream_log_filtered(
                board.log,
                board.link,
                board.timebase,
                env.config,
                filter,
            ) {
                warn!("GETLOG: stream ended early: {}", e);
            }
            true
        }
        Err(e) => {
            if e != StorageError::NotFound {
                warn!("GETLOG: {}", e);
            }
            env.reply("ERR open wake.bin\r\n");
            false
        }
    };
    env.board.log.unmount();
    if streamed {
        env.accept();
    }
    Flow::Continue
}

fn cmd_status<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    _arg: Option<&str>,
) -> Flow {
    let log = &mut *env.board.log;
    let usage = match log.mount() {
        Ok(()) => {
            let usage = log.usage().ok();
            log.unmount();
            usage
        }
        Err(_) => None,
    };
    let line = env
        .store
        .build_rich_status(usage, env.config.reserve_blocks);
    env.reply(&line);
    env.accept();
    Flow::Continue
}

fn cmd_quit<R: RetainedRegisters, C: WallClock>(
    env: &mut CommandEnv<'_, '_, R, C>,
    _arg: Option<&str>,
) -> Flow {
    env.reply("OK bye\r\n");
    env.accept();
    Flow::Quit
}
