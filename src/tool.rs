//! Blocking invocation of external command-line tools.

use std::process::{Command, Stdio};

use log::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Run `command` to completion.
///
/// Tool stdout is only shown in verbose mode; stderr is always inherited.
/// An exit code listed in `benign` is logged and returned instead of failing.
pub(crate) fn run(command: &mut Command, tool: &str, config: &Config, benign: &[i32]) -> Result<i32> {
    if !config.verbose {
        command.stdout(Stdio::null());
    }
    debug!("running {command:?}");

    let status = command.status().map_err(|e| Error::ExternalTool {
        tool: tool.to_string(),
        status: format!("failure to start ({e})"),
    })?;

    match status.code() {
        Some(0) => Ok(0),
        Some(code) if benign.contains(&code) => {
            warn!("{tool} exited with code {code}, continuing with the files it produced");
            Ok(code)
        }
        _ => Err(Error::ExternalTool {
            tool: tool.to_string(),
            status: status.to_string(),
        }),
    }
}
