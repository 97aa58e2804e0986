//! Observation of parser steps.
//!
//! A [`TraceSink`] is handed to the parser with `Parser::with_trace`. The
//! parser only formats events when the sink reports itself enabled.

use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
pub enum TraceEvent<'a> {
    /// A construct handler is about to run.
    Call {
        idx: usize,
        count: usize,
        construct: &'static str,
        nearby: &'a str,
    },
    Push {
        idx: usize,
        frame: &'a str,
    },
    /// A push was refused because the top frame cannot hold blocks.
    Reject {
        idx: usize,
        frame: &'a str,
        top: &'a str,
    },
    Pop {
        idx: usize,
        frame: &'a str,
        forced: bool,
    },
    Defer {
        idx: usize,
        frame: &'a str,
        resume_at: usize,
    },
    /// A tail of an open frame matched.
    Tail {
        idx: usize,
        depth: usize,
        tail: &'a str,
    },
}

pub trait TraceSink: Send {
    fn enabled(&self) -> bool {
        true
    }

    fn trace(&mut self, event: &TraceEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    fn enabled(&self) -> bool {
        false
    }

    fn trace(&mut self, _event: &TraceEvent<'_>) {}
}

/// Forwards events to `log::trace!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn enabled(&self) -> bool {
        log::log_enabled!(log::Level::Trace)
    }

    fn trace(&mut self, event: &TraceEvent<'_>) {
        log::trace!("{}", event);
    }
}

/// Collects rendered events, mostly useful in tests.
impl TraceSink for Vec<String> {
    fn trace(&mut self, event: &TraceEvent<'_>) {
        self.push(event.to_string());
    }
}

/// Lets the caller keep a handle on a sink given to the parser.
impl<T: TraceSink> TraceSink for Arc<Mutex<T>> {
    fn enabled(&self) -> bool {
        self.lock().is_ok_and(|sink| sink.enabled())
    }

    fn trace(&mut self, event: &TraceEvent<'_>) {
        if let Ok(mut sink) = self.lock() {
            sink.trace(event);
        }
    }
}

impl fmt::Display for TraceEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Call {
                idx,
                count,
                construct,
                nearby,
            } => write!(f, "[{:5}] call {} x{} {:?}", idx, construct, count, nearby),
            TraceEvent::Push { idx, frame } => write!(f, "[{:5}] push {}", idx, frame),
            TraceEvent::Reject { idx, frame, top } => {
                write!(f, "[{:5}] reject {} under {}", idx, frame, top)
            }
            TraceEvent::Pop { idx, frame, forced } => {
                let how = if *forced { "unwind" } else { "pop" };
                write!(f, "[{:5}] {} {}", idx, how, frame)
            }
            TraceEvent::Defer {
                idx,
                frame,
                resume_at,
            } => write!(f, "[{:5}] defer {} until {}", idx, frame, resume_at),
            TraceEvent::Tail { idx, depth, tail } => {
                write!(f, "[{:5}] tail {:?} closes depth {}", idx, tail, depth)
            }
        }
    }
}
