//! Structs and functions for generating log messages.

use crate::prelude::*;
use std::collections::BTreeMap;

/// A generic log message.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct LogMessage {
    /// The log message.
    pub text: String,
    /// The severity/type of the log message.
    pub level: LogLevel,
    /// The term (function, instruction or call site) that the message is related to.
    pub location: Option<Tid>,
    /// The analysis where the message originated.
    pub source: Option<String>,
}

impl LogMessage {
    /// Create a new `Info`-level log message
    pub fn new_info(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Info,
            location: None,
            source: None,
        }
    }

    /// Create a new `Debug`-level log message
    pub fn new_debug(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Debug,
            location: None,
            source: None,
        }
    }

    /// Associate a specific location to the log message.
    pub fn location(mut self, location: Tid) -> LogMessage {
        self.location = Some(location);
        self
    }

    /// Set the name of the source analysis for the log message.
    pub fn source(mut self, source: impl Into<String>) -> LogMessage {
        self.source = Some(source.into());
        self
    }
}

/// The severity/type of a log message.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum LogLevel {
    /// Messages intended for debugging.
    Debug,
    /// Non-error messages intended for the user.
    Info,
}

impl std::fmt::Display for LogMessage {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level {
            LogLevel::Debug => write!(formatter, "DEBUG: ")?,
            LogLevel::Info => write!(formatter, "INFO: ")?,
        };
        match (&self.source, &self.location) {
            (Some(source), Some(location)) => write!(formatter, "{} @ {}: ", source, location)?,
            (Some(source), None) => write!(formatter, "{}: ", source)?,
            (None, Some(location)) => write!(formatter, "{}: ", location)?,
            (None, None) => (),
        };
        write!(formatter, "{}", self.text)
    }
}

/// For each analysis count the number of debug log messages in `all_logs`
/// and add a (INFO level) log message with the resulting number to `all_logs`.
/// Also count and log the number of general debug log messages.
pub fn add_debug_log_statistics(all_logs: &mut Vec<LogMessage>) {
    let mut analysis_debug_log_count = BTreeMap::new();
    let mut general_debug_log_count = 0u64;
    for log in all_logs.iter().filter(|log| log.level == LogLevel::Debug) {
        if let Some(analysis) = &log.source {
            analysis_debug_log_count
                .entry(analysis.clone())
                .and_modify(|count| *count += 1)
                .or_insert(1u64);
        } else {
            general_debug_log_count += 1;
        }
    }
    for (analysis, count) in analysis_debug_log_count {
        all_logs.push(
            LogMessage::new_info(format!("Logged {} debug log messages.", count)).source(analysis),
        );
    }
    if general_debug_log_count > 0 {
        all_logs.push(LogMessage::new_info(format!(
            "Logged {} general debug log messages.",
            general_debug_log_count
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_message_display() {
        let msg = LogMessage::new_debug("No types reach the receiver")
            .source("VTA")
            .location(Tid::new("g$call0"));
        assert_eq!(
            format!("{}", msg),
            "DEBUG: VTA @ g$call0: No types reach the receiver"
        );
        assert_eq!(
            format!("{}", LogMessage::new_info("done").source("CHA")),
            "INFO: CHA: done"
        );
        assert_eq!(format!("{}", LogMessage::new_info("oops")), "INFO: oops");
    }

    #[test]
    fn debug_log_statistics() {
        let mut logs = vec![
            LogMessage::new_debug("a").source("VTA"),
            LogMessage::new_debug("b").source("VTA"),
            LogMessage::new_debug("c"),
            LogMessage::new_info("d").source("CHA"),
        ];
        add_debug_log_statistics(&mut logs);
        assert_eq!(logs.len(), 6);
        assert_eq!(
            logs[4],
            LogMessage::new_info("Logged 2 debug log messages.").source("VTA")
        );
        assert_eq!(
            logs[5],
            LogMessage::new_info("Logged 1 general debug log messages.")
        );
    }
}
