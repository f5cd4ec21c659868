//! Interactive command shell for an open vault
//!
//! Each input line is split with shell quoting rules and parsed by clap into
//! one [`ShellCommand`]. Command errors are printed and the session goes on.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use vault_core::{shred, CommitOutcome, Vault, VaultConfig};

const HELP: &str = "\
Commands:
  ls                          List entries and staged paths
  add <path>                  Stage a file or directory
  update | commit             Apply staged paths to the vault
  extract <pattern> [<dest>]  Extract matching entries ('*' for all)
  rm | delete <pattern>       Delete matching entries
  shred <path>                Securely erase a file on disk
  status                      Entry count and compression ratio
  help                        Show this help
  exit | quit                 End the session";

#[derive(Parser, Debug, PartialEq)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ShellCommand {
    /// List entries and staged paths
    Ls,
    /// Stage a file or directory
    Add { path: PathBuf },
    /// Apply staged paths to the vault
    #[command(alias = "commit")]
    Update,
    /// Extract matching entries
    Extract {
        pattern: String,
        dest: Option<PathBuf>,
    },
    /// Delete matching entries
    #[command(alias = "delete")]
    Rm { pattern: String },
    /// Securely erase a file on disk
    Shred { path: PathBuf },
    /// Entry count and compression ratio
    Status,
    /// Show available commands
    Help,
    /// End the session
    #[command(alias = "quit")]
    Exit,
}

/// Parse one input line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut tokens = shlex::split(line).ok_or_else(|| "Unbalanced quotes".to_string())?;
    if let Some(first) = tokens.first_mut() {
        *first = first.to_lowercase();
    }

    ShellLine::try_parse_from(tokens)
        .map(|parsed| Some(parsed.command))
        .map_err(|e| e.to_string().trim_end().to_string())
}

/// Human readable size, e.g. `1.5 KB`
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

pub struct Shell<R, W> {
    vault: Vault,
    config: VaultConfig,
    input: Lines<R>,
    out: W,
}

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    pub fn new(vault: Vault, config: VaultConfig, input: R, out: W) -> Self {
        Self {
            vault,
            config,
            input: input.lines(),
            out,
        }
    }

    /// Read and execute commands until `exit` or end of input
    pub async fn run(&mut self) -> std::io::Result<()> {
        let name = self
            .vault
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        loop {
            write!(self.out, "{name}> ")?;
            self.out.flush()?;

            let Some(line) = self.input.next_line().await? else {
                writeln!(self.out)?;
                break;
            };

            match parse_line(&line) {
                Ok(None) => {}
                Ok(Some(ShellCommand::Exit)) => break,
                Ok(Some(command)) => {
                    if let Err(e) = self.execute(command).await {
                        writeln!(self.out, "Error: {e}")?;
                    }
                }
                Err(message) => writeln!(self.out, "{message}")?,
            }
        }

        Ok(())
    }

    async fn execute(&mut self, command: ShellCommand) -> Result<(), Box<dyn Error>> {
        match command {
            ShellCommand::Ls => self.handle_ls()?,
            ShellCommand::Add { path } => {
                let staged = self.vault.stage(&expand_home(&path))?;
                writeln!(self.out, "Staged {}", staged.display())?;
            }
            ShellCommand::Update => self.handle_update().await?,
            ShellCommand::Extract { pattern, dest } => {
                let dest = dest.map(|d| expand_home(&d)).unwrap_or_else(|| PathBuf::from("."));
                self.handle_extract(&pattern, &dest).await?;
            }
            ShellCommand::Rm { pattern } => self.handle_rm(&pattern).await?,
            ShellCommand::Shred { path } => self.handle_shred(&expand_home(&path)).await?,
            ShellCommand::Status => self.handle_status()?,
            ShellCommand::Help => writeln!(self.out, "{HELP}")?,
            ShellCommand::Exit => {}
        }
        Ok(())
    }

    fn handle_ls(&mut self) -> std::io::Result<()> {
        let entries = self.vault.list();
        if entries.is_empty() && self.vault.staged().is_empty() {
            return writeln!(self.out, "(empty)");
        }

        for entry in entries {
            writeln!(self.out, "{} ({})", entry.key, format_size(entry.original_size))?;
        }
        for path in self.vault.staged() {
            writeln!(self.out, "(+) {} (staged)", path.display())?;
        }
        Ok(())
    }

    async fn handle_update(&mut self) -> Result<(), Box<dyn Error>> {
        let report = self.vault.commit().await?;
        if report.outcome == CommitOutcome::NothingStaged {
            writeln!(self.out, "Nothing staged.")?;
            return Ok(());
        }

        for key in &report.stored {
            writeln!(self.out, " locked    -> {key}")?;
        }
        for (path, reason) in &report.failures {
            writeln!(self.out, " failed    -> {}: {reason}", path.display())?;
        }
        writeln!(self.out, "Vault updated ({} stored).", report.stored.len())?;
        Ok(())
    }

    async fn handle_extract(&mut self, pattern: &str, dest: &Path) -> Result<(), Box<dyn Error>> {
        let report = self.vault.extract(pattern, dest).await?;
        for path in &report.written {
            writeln!(self.out, " extracted -> {}", path.display())?;
        }
        for (key, reason) in &report.skipped {
            writeln!(self.out, " skipped   -> {key}: {reason}")?;
        }
        Ok(())
    }

    async fn handle_rm(&mut self, pattern: &str) -> Result<(), Box<dyn Error>> {
        if self.config.confirm_destructive
            && !self.confirm(&format!("Delete entries matching '{pattern}'?")).await?
        {
            writeln!(self.out, "Cancelled.")?;
            return Ok(());
        }

        let report = self.vault.delete(pattern).await?;
        for key in &report.removed {
            writeln!(self.out, " removed   -> {key}")?;
        }
        for path in &report.unstaged {
            writeln!(self.out, " unstaged  -> {}", path.display())?;
        }
        Ok(())
    }

    async fn handle_shred(&mut self, path: &Path) -> Result<(), Box<dyn Error>> {
        if self.config.confirm_destructive
            && !self
                .confirm(&format!("Permanently erase '{}'?", path.display()))
                .await?
        {
            writeln!(self.out, "Cancelled.")?;
            return Ok(());
        }

        shred(path).await?;
        writeln!(self.out, "Shredded {}", path.display())?;
        Ok(())
    }

    fn handle_status(&mut self) -> std::io::Result<()> {
        let status = self.vault.status();
        writeln!(self.out, "Entries:      {}", status.entry_count)?;
        writeln!(self.out, "Original:     {}", format_size(status.total_original))?;
        writeln!(self.out, "Compressed:   {}", format_size(status.total_compressed))?;
        writeln!(
            self.out,
            "Ratio:        {:.1}%",
            status.compression_ratio() * 100.0
        )
    }

    async fn confirm(&mut self, question: &str) -> std::io::Result<bool> {
        write!(self.out, "{question} [y/N]: ")?;
        self.out.flush()?;
        let answer = self.input.next_line().await?.unwrap_or_default();
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }
}
