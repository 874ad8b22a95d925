use at_search::RunDriver;
use at_types::{driver_error, Cost, TuneResult, INFINITE_COST};
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Runs a shell command per batch.
///
/// The measurement program is written to the command's stdin. The command
/// must print a JSON object mapping each coordinate key to its cost; `null`
/// marks a variant that failed to build or run and is priced infinite.
/// `AT_NUM_PROCS` and `AT_PARALLEL` tell the command how many measurements
/// it may run concurrently.
#[derive(Debug, Clone)]
pub struct CommandRunDriver {
    command: String,
    num_procs: usize,
    parallel: bool,
}

impl CommandRunDriver {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            num_procs: 1,
            parallel: false,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool, num_procs: usize) -> Self {
        self.parallel = parallel;
        self.num_procs = num_procs.max(1);
        self
    }

    fn parse_costs(stdout: &str) -> TuneResult<HashMap<String, Cost>> {
        let raw: HashMap<String, Option<f64>> = serde_json::from_str(stdout.trim())
            .map_err(|e| driver_error!("run command printed invalid cost JSON: {e}"))?;
        Ok(raw
            .into_iter()
            .map(|(key, cost)| (key, cost.unwrap_or(INFINITE_COST)))
            .collect())
    }
}

impl RunDriver for CommandRunDriver {
    fn run(&mut self, program: &str) -> TuneResult<HashMap<String, Cost>> {
        info!(command = %self.command, bytes = program.len(), "running measurement batch");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("AT_NUM_PROCS", self.num_procs.to_string())
            .env("AT_PARALLEL", if self.parallel { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take();
        let input = program.to_owned();
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes())?;
            }
            Ok(())
        });

        let output = child.wait_with_output()?;
        // A command that ignores its input may close stdin early.
        if let Ok(Err(e)) = writer.join() {
            debug!(error = %e, "run command did not consume the whole program");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(driver_error!(
                "run command exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let costs = Self::parse_costs(&stdout)?;
        debug!(results = costs.len(), "measurement batch finished");
        Ok(costs)
    }

    fn num_procs(&self) -> usize {
        self.num_procs
    }
}
