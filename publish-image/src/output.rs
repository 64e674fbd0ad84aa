use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
};

use log::debug;

use crate::report::PipelineResult;

/// The file CI runners read step outputs from.
pub const GITHUB_OUTPUT: &str = "GITHUB_OUTPUT";

/// Appends `name=value` lines for the result to a step output file.
pub fn append_step_outputs(path: &Path, result: &PipelineResult) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(step_outputs(result).as_bytes())?;
    debug!("wrote step outputs to {path:?}");
    Ok(())
}

fn step_outputs(result: &PipelineResult) -> String {
    let mut lines = format!("digest={}\nimage={}\n", result.digest, result.image);
    if let Some(major_tag) = &result.major_tag {
        lines.push_str(&format!("major-tag={major_tag}\n"));
    }
    lines
}

pub fn print_json(result: &PipelineResult) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, result)?;
    writeln!(stdout)
}
