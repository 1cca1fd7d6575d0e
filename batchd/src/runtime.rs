//! # Host Runtime
//!
//! Loads the packet, runs the driver, applies the control script between
//! ticks, and exports the history.

use crate::control_script::{ControlAction, ControlScript, ControlScriptError};
use serde::{Deserialize, Serialize};
use services_logger::LogSink;
use sim_batch::{DriverError, RunSummary, SimulationConfig, SimulationDriver};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Host runtime error types
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{0}")]
    Driver(#[from] DriverError),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Script error at line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History export failed: {0}")]
    Export(String),
}

impl From<ControlScriptError> for HostError {
    fn from(err: ControlScriptError) -> Self {
        match err {
            ControlScriptError::ParseError { line, message } => HostError::Script { line, message },
            ControlScriptError::EmptyScript => HostError::Script {
                line: 0,
                message: err.to_string(),
            },
        }
    }
}

/// Host runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Simulation parameters
    #[serde(flatten)]
    pub simulation: SimulationConfig,
    /// Job descriptor to load
    pub packet: Option<PathBuf>,
    /// Optional control script
    pub script: Option<PathBuf>,
    /// Where to write the history JSON after the run
    pub history: Option<PathBuf>,
    /// Log verbosity for the terminal logger
    pub verbose: u8,
}

impl HostConfig {
    /// Reads a JSON config file; absent keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| HostError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| HostError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Host runtime
pub struct HostRuntime<S: LogSink> {
    /// Configuration
    config: HostConfig,
    /// Simulation driver
    driver: SimulationDriver<S>,
    /// Control script (if any)
    script: Option<ControlScript>,
}

impl<S: LogSink> HostRuntime<S> {
    /// Creates a runtime with the packet loaded and the script parsed
    pub fn new(config: HostConfig, sink: S) -> Result<Self, HostError> {
        let packet = config
            .packet
            .clone()
            .ok_or_else(|| HostError::Usage("no packet file given".to_string()))?;

        let mut driver = SimulationDriver::with_sink(config.simulation.clone(), sink)?;
        driver.initialize_from_path(&packet)?;

        let script = match &config.script {
            Some(path) => Some(ControlScript::from_text(&fs::read_to_string(path)?)?),
            None => None,
        };

        Ok(Self {
            config,
            driver,
            script,
        })
    }

    /// Replaces the control script
    pub fn with_script(mut self, script: ControlScript) -> Self {
        self.script = Some(script);
        self
    }

    /// Runs the simulation to the end and exports the history if requested
    pub fn run(&mut self) -> Result<RunSummary, HostError> {
        let script = &mut self.script;
        let summary = self
            .driver
            .run_with(|driver| Self::apply_due(script, driver))?;

        if let Some(path) = &self.config.history {
            self.export_history(path)?;
        }
        Ok(summary)
    }

    fn apply_due(
        script: &mut Option<ControlScript>,
        driver: &mut SimulationDriver<S>,
    ) -> Result<(), HostError> {
        let Some(script) = script else {
            return Ok(());
        };
        for action in script.take_due(driver.ticks_executed()) {
            match action {
                ControlAction::Resize(count) => {
                    let outcome = driver.resize(count)?;
                    log::info!(
                        "resized {} -> {} partitions ({} evicted)",
                        outcome.old,
                        outcome.new,
                        outcome.evicted.len()
                    );
                }
                ControlAction::Reset => {
                    driver.reset()?;
                    log::info!("simulation reset");
                }
            }
        }
        Ok(())
    }

    fn export_history(&self, path: &Path) -> Result<(), HostError> {
        let history = self.driver.history().ok_or(DriverError::NotInitialized)?;
        let json = history
            .to_json()
            .map_err(|e| HostError::Export(e.to_string()))?;
        fs::write(path, json)?;
        log::info!("history written to {}", path.display());
        Ok(())
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Returns the driver
    pub fn driver(&self) -> &SimulationDriver<S> {
        &self.driver
    }

    /// Returns the mutable driver
    pub fn driver_mut(&mut self) -> &mut SimulationDriver<S> {
        &mut self.driver
    }
}
