//! # Control Script Parser
//!
//! Provides a line-based script of partition changes applied between ticks,
//! for deterministic demos and tests.
//!
//! ## Format
//!
//! Each line schedules one command after the given tick has run:
//! - `at <tick> resize <n>`: change the partition count to `n`
//! - `at <tick> reset`: restore the freshly loaded state
//! - Comments: `# This is a comment` (also allowed after a command)
//!
//! `at 0 ...` applies before the first tick.
//!
//! ## Example
//!
//! ```text
//! # Start small, then open up memory
//! at 0 resize 1
//! at 3 resize 4   # after tick 3
//! ```

use std::collections::VecDeque;
use thiserror::Error;

/// Control script error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlScriptError {
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Empty script")]
    EmptyScript,
}

/// Something the script asks the driver to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Change the partition count (validated by the scheduler)
    Resize(i64),
    /// Restart the run from the loaded packet
    Reset,
}

/// A control action bound to the tick after which it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledAction {
    pub tick: u64,
    pub action: ControlAction,
}

/// Control script
#[derive(Debug, Clone, Default)]
pub struct ControlScript {
    actions: VecDeque<ScheduledAction>,
}

impl ControlScript {
    /// Creates a new empty control script
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a script from text
    pub fn from_text(text: &str) -> Result<Self, ControlScriptError> {
        let mut actions = Vec::new();

        for (line_num, line) in text.lines().enumerate() {
            let line = match line.split_once('#') {
                Some((command, _comment)) => command,
                None => line,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            actions.push(Self::parse_line(line, line_num + 1)?);
        }

        if actions.is_empty() {
            return Err(ControlScriptError::EmptyScript);
        }

        // Stable, so same-tick commands keep their file order
        actions.sort_by_key(|a| a.tick);
        Ok(Self {
            actions: actions.into(),
        })
    }

    fn parse_line(line: &str, line_num: usize) -> Result<ScheduledAction, ControlScriptError> {
        let error = |message: String| ControlScriptError::ParseError {
            line: line_num,
            message,
        };
        let words: Vec<&str> = line.split_whitespace().collect();

        let (tick, command) = match words.as_slice() {
            ["at", tick, command @ ..] => (*tick, command),
            _ => return Err(error(format!("expected 'at <tick> <command>', got '{}'", line))),
        };
        let tick: u64 = tick
            .parse()
            .map_err(|_| error(format!("invalid tick: {}", tick)))?;

        let action = match command {
            ["resize", count] => ControlAction::Resize(
                count
                    .parse()
                    .map_err(|_| error(format!("invalid partition count: {}", count)))?,
            ),
            ["reset"] => ControlAction::Reset,
            _ => return Err(error(format!("unknown command: {}", command.join(" ")))),
        };

        Ok(ScheduledAction { tick, action })
    }

    /// Removes and returns every action due once `tick` ticks have run
    pub fn take_due(&mut self, tick: u64) -> Vec<ControlAction> {
        let mut due = Vec::new();
        while let Some(next) = self.actions.front() {
            if next.tick > tick {
                break;
            }
            if let Some(scheduled) = self.actions.pop_front() {
                due.push(scheduled.action);
            }
        }
        due
    }

    /// Returns the number of pending actions
    pub fn pending_count(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let script = ControlScript::from_text(
            "# shrink then grow\nat 0 resize 1\nat 4 reset\n\nat 2 resize 3 # inline\n",
        )
        .unwrap();
        assert_eq!(script.pending_count(), 3);
    }

    #[test]
    fn test_take_due_in_tick_order() {
        let mut script =
            ControlScript::from_text("at 5 reset\nat 2 resize 3\nat 2 resize 4\n").unwrap();
        assert!(script.take_due(1).is_empty());
        assert_eq!(
            script.take_due(2),
            vec![ControlAction::Resize(3), ControlAction::Resize(4)]
        );
        assert!(script.take_due(4).is_empty());
        assert_eq!(script.take_due(9), vec![ControlAction::Reset]);
        assert!(script.is_empty());
    }

    #[test]
    fn test_negative_resize_parses() {
        // Rejection is the scheduler's job
        let mut script = ControlScript::from_text("at 1 resize -2").unwrap();
        assert_eq!(script.take_due(1), vec![ControlAction::Resize(-2)]);
    }

    #[test]
    fn test_empty_script() {
        assert_eq!(
            ControlScript::from_text("# nothing\n\n").unwrap_err(),
            ControlScriptError::EmptyScript
        );
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = ControlScript::from_text("at 1 reset\nresize 3").unwrap_err();
        assert!(matches!(err, ControlScriptError::ParseError { line: 2, .. }));

        let err = ControlScript::from_text("at soon reset").unwrap_err();
        assert!(matches!(err, ControlScriptError::ParseError { line: 1, .. }));

        let err = ControlScript::from_text("at 1 resize many").unwrap_err();
        assert!(matches!(err, ControlScriptError::ParseError { line: 1, .. }));

        let err = ControlScript::from_text("at 1 explode").unwrap_err();
        assert!(matches!(err, ControlScriptError::ParseError { line: 1, .. }));
    }
}
