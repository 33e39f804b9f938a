//! Scripted counter sources for unit tests.

use crate::reader::{CounterFile, CounterSource};
use jiffymon_core::{Result, SensorError};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Build a well-formed process stat line with the given accounting fields.
pub(crate) fn process_line(pid: u32, command: &str, utime: u64, stime: u64, starttime: u64) -> String {
    // Fields after the state: ppid pgrp session tty_nr tpgid flags minflt
    // cminflt majflt cmajflt utime stime cutime cstime priority nice
    // num_threads itrealvalue starttime, then 24 more up to end_data.
    let mut fields = vec![
        "S".to_owned(),
        "1".to_owned(),
        pid.to_string(),
        pid.to_string(),
        "0".to_owned(),
        "-1".to_owned(),
        "4194304".to_owned(),
        "100".to_owned(),
        "0".to_owned(),
        "0".to_owned(),
        "0".to_owned(),
        utime.to_string(),
        stime.to_string(),
        "0".to_owned(),
        "0".to_owned(),
        "20".to_owned(),
        "0".to_owned(),
        "1".to_owned(),
        "0".to_owned(),
        starttime.to_string(),
    ];
    fields.extend(std::iter::repeat("0".to_owned()).take(24));
    format!("{pid} ({command}) {}\n", fields.join(" "))
}

#[derive(Debug, Clone, Default)]
struct Script {
    stat: VecDeque<String>,
    repeat: Option<String>,
    fail_when_exhausted: bool,
    processes: HashMap<u32, VecDeque<String>>,
}

/// A [`CounterSource`] that replays canned text.
///
/// The system counter file yields each scripted text once, in order, then
/// either repeats a fixed text, fails with `NotFound`, or fails with
/// `Unreadable`. Each process file is its own queue; an unknown pid is
/// `NotFound`.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSource {
    script: Mutex<Script>,
}

impl ScriptedSource {
    /// Yield `texts` once each, in order.
    pub(crate) fn stat_sequence<const N: usize>(texts: [String; N]) -> Self {
        let script = Script {
            stat: texts.into_iter().collect(),
            ..Script::default()
        };
        Self {
            script: Mutex::new(script),
        }
    }

    /// Yield `text` for every read of the system counter file.
    pub(crate) fn repeating(text: &str) -> Self {
        let script = Script {
            repeat: Some(text.to_owned()),
            ..Script::default()
        };
        Self {
            script: Mutex::new(script),
        }
    }

    /// Once the sequence is used up, report the file as gone.
    pub(crate) fn then_fail_with_not_found(self) -> Self {
        self.lock().fail_when_exhausted = true;
        self
    }

    /// Serve `texts` for `pid`'s stat file, once each.
    pub(crate) fn with_process<const N: usize>(self, pid: u32, texts: [String; N]) -> Self {
        self.lock()
            .processes
            .insert(pid, texts.into_iter().collect());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Clone for ScriptedSource {
    fn clone(&self) -> Self {
        Self {
            script: Mutex::new(self.lock().clone()),
        }
    }
}

impl CounterSource for ScriptedSource {
    fn read(&self, file: CounterFile) -> Result<String> {
        let mut script = self.lock();
        let path = file.relative_path();
        match file {
            CounterFile::SystemCounters => {
                if let Some(text) = script.stat.pop_front() {
                    return Ok(text);
                }
                if let Some(text) = &script.repeat {
                    return Ok(text.clone());
                }
                if script.fail_when_exhausted {
                    return Err(SensorError::not_found(path));
                }
                Err(SensorError::unreadable(
                    path,
                    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "script exhausted"),
                ))
            }
            CounterFile::ProcessStat(pid) => script
                .processes
                .get_mut(&pid)
                .and_then(VecDeque::pop_front)
                .ok_or_else(|| SensorError::not_found(path)),
            CounterFile::CpuInfo => Err(SensorError::not_found(path)),
        }
    }
}
