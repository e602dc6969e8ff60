use anyhow::{Context as _, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use std::io::{self, Write};

#[derive(Debug, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate the script for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn emit(args: CompletionsArgs) -> Result<()> {
    let mut stdout = io::stdout().lock();
    render(args.shell, &mut stdout)?;
    stdout.flush().with_context(|| "write completions")
}

/// Writes the completion script for every `sift` subcommand, including the
/// filter words each task command takes.
fn render(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = crate::Cli::command();
    let bin = cmd.get_name().to_string();
    let mut script = Vec::new();
    clap_complete::generate(shell, &mut cmd, bin, &mut script);
    if script.is_empty() {
        anyhow::bail!("no completions generated for {}", shell);
    }
    out.write_all(&script).with_context(|| "write completions")
}
