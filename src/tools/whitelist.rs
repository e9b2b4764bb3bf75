//! Command Whitelist
//!
//! Loads the set of permitted base-command names and answers whether a raw
//! command line starts with one of them.
//!
//! Only the first shell token is inspected. Pipelines, redirections, command
//! substitution and `&&` / `||` / `;` chains are not parsed, so a whitelisted
//! name can still be combined with shell operators to run anything. Treat this
//! as a coarse guard, not a security boundary.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Set of permitted command basenames
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    /// Allowed basenames, compared exactly and case-sensitively
    commands: HashSet<String>,
}

impl Whitelist {
    /// Load a whitelist from a file, one command per line
    ///
    /// Blank lines and lines starting with `#` are skipped. A file that cannot
    /// be opened produces an empty whitelist, which rejects every command.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        match File::open(path) {
            Ok(file) => {
                let whitelist = Self::from_reader(BufReader::new(file));
                tracing::info!("Loaded {} whitelisted commands", whitelist.len());
                whitelist
            }
            Err(e) => {
                tracing::warn!("Whitelist file not readable: {} ({})", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse whitelist entries from any line source
    ///
    /// Lines that are not valid UTF-8 are decoded lossily, so they cannot
    /// match a real command but do not hide the entries after them. A read
    /// error ends parsing with a warning.
    pub fn from_reader(reader: impl BufRead) -> Self {
        let mut commands = HashSet::new();

        for (index, line) in reader.split(b'\n').enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Stopped reading whitelist at line {}: {}", index + 1, e);
                    break;
                }
            };

            let line = String::from_utf8_lossy(&line);
            if line.contains(char::REPLACEMENT_CHARACTER) {
                tracing::warn!("Whitelist line {} is not valid UTF-8", index + 1);
            }

            let entry = line.trim();
            if !entry.is_empty() && !entry.starts_with('#') {
                commands.insert(entry.to_string());
            }
        }

        Self { commands }
    }

    /// Build a whitelist from explicit names
    pub fn from_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether the command line's base command is whitelisted
    ///
    /// # Example
    ///
    /// ```
    /// use vaultgate::tools::Whitelist;
    ///
    /// let whitelist = Whitelist::from_commands(["ls"]);
    /// assert!(whitelist.is_allowed("/usr/bin/ls -la"));
    /// assert!(!whitelist.is_allowed("rm -rf ."));
    /// ```
    pub fn is_allowed(&self, command_line: &str) -> bool {
        let base = base_command(command_line);
        !base.is_empty() && self.commands.contains(&base)
    }

    /// Number of whitelisted commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Extract the basename of the first shell token of a command line
///
/// Returns an empty string when the line is empty or cannot be tokenized
/// (for example an unbalanced quote).
pub fn base_command(command_line: &str) -> String {
    let tokens = match shell_words::split(command_line) {
        Ok(tokens) => tokens,
        Err(_) => return String::new(),
    };

    let Some(first) = tokens.first() else {
        return String::new();
    };

    Path::new(first)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
