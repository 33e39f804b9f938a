//! Per-process status records from `/proc/<pid>/stat`.
//!
//! The command name sits in parentheses and may itself contain spaces and
//! parentheses (`1234 (My Process (v2)) S 1 ...`), so the line cannot be
//! split on whitespace. The command is taken as everything between the first
//! `(` and the last `)`; the remaining fields are positional after that.

use crate::jiffies;
use jiffymon_core::{Result, SensorError};
use std::fmt;
use std::str::FromStr;

/// Fields required after the command: kernel fields 3 (state) to 46 (end_data).
pub const MIN_TRAILING_FIELDS: usize = 44;

/// Scheduler state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// `R`
    Running,
    /// `S`, interruptible wait
    Sleeping,
    /// `D`, uninterruptible wait
    DiskSleep,
    /// `Z`
    Zombie,
    /// `T` or `t`
    TracedOrStopped,
    /// Any other state character
    Unknown(char),
}

impl ProcessState {
    #[must_use]
    pub const fn from_char(c: char) -> Self {
        match c {
            'R' => Self::Running,
            'S' => Self::Sleeping,
            'D' => Self::DiskSleep,
            'Z' => Self::Zombie,
            'T' | 't' => Self::TracedOrStopped,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Sleeping => f.write_str("sleeping"),
            Self::DiskSleep => f.write_str("disk sleep"),
            Self::Zombie => f.write_str("zombie"),
            Self::TracedOrStopped => f.write_str("stopped"),
            Self::Unknown(c) => write!(f, "unknown ({c})"),
        }
    }
}

/// One parsed `/proc/<pid>/stat` line.
///
/// Fields follow proc(5) in order. The last six only exist on newer kernels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStat {
    pub pid: u32,
    /// Command name without the surrounding parentheses
    pub command: String,
    pub state: ProcessState,
    pub ppid: i32,
    pub pgrp: i32,
    pub session: i32,
    pub tty_nr: i32,
    pub tpgid: i32,
    pub flags: u32,
    pub minflt: u64,
    pub cminflt: u64,
    pub majflt: u64,
    pub cmajflt: u64,
    /// User mode jiffies
    pub utime: u64,
    /// Kernel mode jiffies
    pub stime: u64,
    /// User mode jiffies of waited-for children
    pub cutime: u64,
    /// Kernel mode jiffies of waited-for children
    pub cstime: u64,
    pub priority: i64,
    pub nice: i64,
    pub num_threads: i64,
    /// Obsolete, always 0
    pub itrealvalue: i64,
    /// Jiffies after boot at which the process started
    pub starttime: u64,
    /// Virtual memory size in bytes
    pub vsize: u64,
    /// Resident set size in pages
    pub rss: u64,
    pub rsslim: u64,
    pub startcode: u64,
    pub endcode: u64,
    pub startstack: u64,
    pub kstkesp: u64,
    pub kstkeip: u64,
    pub signal: u64,
    pub blocked: u64,
    pub sigignore: u64,
    pub sigcatch: u64,
    pub wchan: u64,
    pub nswap: u64,
    pub cnswap: u64,
    pub exit_signal: i32,
    /// CPU last executed on
    pub processor: i32,
    pub rt_priority: u32,
    pub policy: u32,
    pub delayacct_blkio_ticks: u64,
    pub guest_time: u64,
    pub cguest_time: i64,
    pub start_data: u64,
    pub end_data: u64,
    pub start_brk: Option<u64>,
    pub arg_start: Option<u64>,
    pub arg_end: Option<u64>,
    pub env_start: Option<u64>,
    pub env_end: Option<u64>,
    pub exit_code: Option<i32>,
}

/// Positional cursor over the fields following the command.
struct Fields<'a> {
    tokens: Vec<&'a str>,
    index: usize,
    line: &'a str,
}

impl Fields<'_> {
    fn required<T>(&mut self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(name)? {
            Some(value) => Ok(value),
            None => Err(SensorError::parse_line(format!("Missing field '{name}'"), self.line)),
        }
    }

    fn optional<T>(&mut self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let Some(token) = self.tokens.get(self.index) else {
            return Ok(None);
        };
        self.index += 1;
        token
            .parse()
            .map(Some)
            .map_err(|e| SensorError::parse_with_source(format!("Invalid field '{name}': '{token}'"), e))
    }

    fn state(&mut self) -> Result<ProcessState> {
        let token = self.tokens.get(self.index).copied().unwrap_or_default();
        self.index += 1;
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(ProcessState::from_char(c)),
            _ => Err(SensorError::parse_line(format!("Invalid state '{token}'"), self.line)),
        }
    }
}

impl ProcessStat {
    /// Parse a status line, checking that it belongs to `expected_pid`.
    ///
    /// Only the first line of `text` is considered.
    ///
    /// # Errors
    ///
    /// Returns a [`SensorError::Parse`] if the command is not enclosed in a
    /// `(`...`)` pair, the pid differs from `expected_pid`, fewer than
    /// [`MIN_TRAILING_FIELDS`] fields follow the command, or a field does
    /// not parse. Nothing is returned on failure.
    pub fn parse(text: &str, expected_pid: u32) -> Result<Self> {
        let line = text.lines().next().unwrap_or_default().trim_end();

        let open = line
            .find('(')
            .ok_or_else(|| SensorError::parse_line("Missing '(' before command", line))?;
        let close = line
            .rfind(')')
            .filter(|&close| close > open)
            .ok_or_else(|| SensorError::parse_line("Missing ')' after command", line))?;

        let pid_text = line[..open].trim();
        let pid: u32 = pid_text
            .parse()
            .map_err(|e| SensorError::parse_with_source(format!("Invalid pid '{pid_text}'"), e))?;
        if pid != expected_pid {
            return Err(SensorError::parse_line(
                format!("Pid mismatch: expected {expected_pid}, found {pid}"),
                line,
            ));
        }

        let tokens: Vec<&str> = line[close + 1..].split_ascii_whitespace().collect();
        if tokens.len() < MIN_TRAILING_FIELDS {
            return Err(SensorError::parse_line(
                format!(
                    "Insufficient fields after command: expected at least {MIN_TRAILING_FIELDS}, got {}",
                    tokens.len()
                ),
                line,
            ));
        }

        let mut f = Fields {
            tokens,
            index: 0,
            line,
        };

        Ok(Self {
            pid,
            command: line[open + 1..close].to_owned(),
            state: f.state()?,
            ppid: f.required("ppid")?,
            pgrp: f.required("pgrp")?,
            session: f.required("session")?,
            tty_nr: f.required("tty_nr")?,
            tpgid: f.required("tpgid")?,
            flags: f.required("flags")?,
            minflt: f.required("minflt")?,
            cminflt: f.required("cminflt")?,
            majflt: f.required("majflt")?,
            cmajflt: f.required("cmajflt")?,
            utime: f.required("utime")?,
            stime: f.required("stime")?,
            cutime: f.required("cutime")?,
            cstime: f.required("cstime")?,
            priority: f.required("priority")?,
            nice: f.required("nice")?,
            num_threads: f.required("num_threads")?,
            itrealvalue: f.required("itrealvalue")?,
            starttime: f.required("starttime")?,
            vsize: f.required("vsize")?,
            rss: f.required("rss")?,
            rsslim: f.required("rsslim")?,
            startcode: f.required("startcode")?,
            endcode: f.required("endcode")?,
            startstack: f.required("startstack")?,
            kstkesp: f.required("kstkesp")?,
            kstkeip: f.required("kstkeip")?,
            signal: f.required("signal")?,
            blocked: f.required("blocked")?,
            sigignore: f.required("sigignore")?,
            sigcatch: f.required("sigcatch")?,
            wchan: f.required("wchan")?,
            nswap: f.required("nswap")?,
            cnswap: f.required("cnswap")?,
            exit_signal: f.required("exit_signal")?,
            processor: f.required("processor")?,
            rt_priority: f.required("rt_priority")?,
            policy: f.required("policy")?,
            delayacct_blkio_ticks: f.required("delayacct_blkio_ticks")?,
            guest_time: f.required("guest_time")?,
            cguest_time: f.required("cguest_time")?,
            start_data: f.required("start_data")?,
            end_data: f.required("end_data")?,
            start_brk: f.optional("start_brk")?,
            arg_start: f.optional("arg_start")?,
            arg_end: f.optional("arg_end")?,
            env_start: f.optional("env_start")?,
            env_end: f.optional("env_end")?,
            exit_code: f.optional("exit_code")?,
        })
    }

    /// utime + stime + cutime + cstime, in jiffies.
    ///
    /// An absolute tick count, not a percentage.
    #[must_use]
    pub fn active(&self) -> u64 {
        jiffies::process_active(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A realistic line captured from a 6.x kernel (52 fields).
    const BASH_STAT: &str = "4821 (bash) S 4810 4821 4821 34816 5102 4194304 3419 21087 0 3 7 2 41 18 20 0 1 0 99187 11841536 1373 18446744073709551615 94558137548800 94558138458893 140724569402960 0 0 0 65536 3686404 1266761467 1 0 0 17 5 0 0 0 0 0 94558138704624 94558138752628 94558142312448 140724569409337 140724569409342 140724569409342 140724569411566 0";

    /// `123 (<command>) S` followed by the values 4..=46, so each field holds
    /// its own kernel field number.
    fn numbered_line(command: &str) -> String {
        let numbers: Vec<String> = (4..=46).map(|n: u32| n.to_string()).collect();
        format!("123 ({command}) S {}", numbers.join(" "))
    }

    #[test]
    fn test_parse_real_line() {
        let stat = ProcessStat::parse(BASH_STAT, 4821).unwrap();

        assert_eq!(stat.pid, 4821);
        assert_eq!(stat.command, "bash");
        assert_eq!(stat.state, ProcessState::Sleeping);
        assert_eq!(stat.ppid, 4810);
        assert_eq!(stat.utime, 7);
        assert_eq!(stat.stime, 2);
        assert_eq!(stat.cutime, 41);
        assert_eq!(stat.cstime, 18);
        assert_eq!(stat.active(), 68);
        assert_eq!(stat.rsslim, u64::MAX);
        assert_eq!(stat.exit_signal, 17);
        assert_eq!(stat.processor, 5);
        assert_eq!(stat.env_end, Some(140724569411566));
        assert_eq!(stat.exit_code, Some(0));
    }

    #[test]
    fn test_command_with_spaces_and_parentheses() {
        let line = numbered_line("My Process (v2)");
        let stat = ProcessStat::parse(&line, 123).unwrap();

        assert_eq!(stat.pid, 123);
        assert_eq!(stat.command, "My Process (v2)");
        assert_eq!(stat.state, ProcessState::Sleeping);

        let signed = [
            stat.ppid, stat.pgrp, stat.session, stat.tty_nr, stat.tpgid,
        ];
        assert_eq!(signed, [4, 5, 6, 7, 8]);
        assert_eq!(stat.flags, 9);
        let counters = [
            stat.minflt, stat.cminflt, stat.majflt, stat.cmajflt, stat.utime, stat.stime,
            stat.cutime, stat.cstime,
        ];
        assert_eq!(counters, [10, 11, 12, 13, 14, 15, 16, 17]);
        let sched = [stat.priority, stat.nice, stat.num_threads, stat.itrealvalue];
        assert_eq!(sched, [18, 19, 20, 21]);
        let memory = [
            stat.starttime, stat.vsize, stat.rss, stat.rsslim, stat.startcode, stat.endcode,
            stat.startstack, stat.kstkesp, stat.kstkeip, stat.signal, stat.blocked,
            stat.sigignore, stat.sigcatch, stat.wchan, stat.nswap, stat.cnswap,
        ];
        assert_eq!(memory, [22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37]);
        assert_eq!(stat.exit_signal, 38);
        assert_eq!(stat.processor, 39);
        assert_eq!(stat.rt_priority, 40);
        assert_eq!(stat.policy, 41);
        assert_eq!(stat.delayacct_blkio_ticks, 42);
        assert_eq!(stat.guest_time, 43);
        assert_eq!(stat.cguest_time, 44);
        assert_eq!(stat.start_data, 45);
        assert_eq!(stat.end_data, 46);

        assert_eq!(stat.start_brk, None);
        assert_eq!(stat.exit_code, None);
        assert_eq!(stat.active(), 14 + 15 + 16 + 17);
    }

    #[test]
    fn test_command_with_unbalanced_parenthesis() {
        let line = numbered_line("evil) S 1 2 3");
        let stat = ProcessStat::parse(&line, 123).unwrap();
        assert_eq!(stat.command, "evil) S 1 2 3");
        assert_eq!(stat.ppid, 4);
    }

    #[test]
    fn test_empty_command() {
        let stat = ProcessStat::parse(&numbered_line(""), 123).unwrap();
        assert_eq!(stat.command, "");
    }

    #[test]
    fn test_too_few_fields_rejected() {
        let numbers: Vec<String> = (4..=45).map(|n: u32| n.to_string()).collect();
        let line = format!("123 (short) S {}", numbers.join(" "));

        let err = ProcessStat::parse(&line, 123).unwrap_err();
        match err {
            SensorError::Parse { message, .. } => {
                assert!(message.contains("expected at least 44, got 43"), "{message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unmatched_parenthesis_rejected() {
        let numbers: Vec<String> = (4..=46).map(|n: u32| n.to_string()).collect();
        let line = format!("123 (never closed S {}", numbers.join(" "));
        assert!(matches!(
            ProcessStat::parse(&line, 123),
            Err(SensorError::Parse { .. })
        ));

        let line = format!("123 never opened) S {}", numbers.join(" "));
        assert!(ProcessStat::parse(&line, 123).is_err());
    }

    #[test]
    fn test_pid_mismatch_rejected() {
        let err = ProcessStat::parse(&numbered_line("cat"), 124).unwrap_err();
        match err {
            SensorError::Parse { message, .. } => {
                assert_eq!(message, "Pid mismatch: expected 124, found 123")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_field_rejected() {
        let line = numbered_line("cat").replace(" 14 ", " lots ");
        assert!(matches!(
            ProcessStat::parse(&line, 123),
            Err(SensorError::Parse { .. })
        ));
    }

    #[test]
    fn test_bad_optional_field_rejected() {
        let line = format!("{} notanumber", numbered_line("cat"));
        assert!(ProcessStat::parse(&line, 123).is_err());
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(ProcessState::from_char('R'), ProcessState::Running);
        assert_eq!(ProcessState::from_char('D'), ProcessState::DiskSleep);
        assert_eq!(ProcessState::from_char('Z'), ProcessState::Zombie);
        assert_eq!(ProcessState::from_char('T'), ProcessState::TracedOrStopped);
        assert_eq!(ProcessState::from_char('t'), ProcessState::TracedOrStopped);
        assert_eq!(ProcessState::from_char('I'), ProcessState::Unknown('I'));

        let line = numbered_line("kworker").replacen(") S ", ") X ", 1);
        let stat = ProcessStat::parse(&line, 123).unwrap();
        assert_eq!(stat.state, ProcessState::Unknown('X'));
        assert_eq!(stat.state.to_string(), "unknown (X)");
    }

    #[test]
    fn test_multi_character_state_rejected() {
        let line = numbered_line("cat").replacen(") S ", ") SS ", 1);
        assert!(ProcessStat::parse(&line, 123).is_err());
    }

    #[test]
    fn test_only_first_line_used() {
        let text = format!("{}\ngarbage that is not a stat line\n", numbered_line("cat"));
        assert!(ProcessStat::parse(&text, 123).is_ok());
    }
}
