use clap::Parser;
use std::path::PathBuf;

use crate::archive::ExtractLimits;
use crate::batch::LAB_EXTENSION;

#[derive(Parser, Debug)]
#[command(name = "labzip")]
#[command(version)]
#[command(about = "Extract laboratory result archives and parse their LAB files", long_about = None)]
#[command(after_help = "Examples:\n  \
  labzip results.zip -P secret              parse every .lab file in results.zip\n  \
  labzip results.zip -l                     list archive members without a password\n  \
  labzip https://example.com/r.zip --json   fetch and print parsed blocks as JSON")]
pub struct Cli {
    /// Archive path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Candidate password, tried in order after the empty password (repeatable)
    #[arg(short = 'P', long = "password", value_name = "PASSWORD")]
    pub passwords: Vec<String>,

    /// Comma-separated candidates, tried after every -P
    #[arg(
        long = "password-list",
        value_name = "LIST",
        env = "LABZIP_PASSWORDS",
        hide_env_values = true
    )]
    pub password_list: Option<String>,

    /// File with one candidate password per line
    #[arg(long, value_name = "PATH")]
    pub password_file: Option<PathBuf>,

    /// Declared archive format (default: taken from FILE's extension, else zip)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Extension of the members to parse
    #[arg(long = "ext", value_name = "EXT", default_value = LAB_EXTENSION)]
    pub extension: String,

    /// List archive members only
    #[arg(short = 'l')]
    pub list: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Largest single member, in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_entry_size: Option<u64>,

    /// Largest total of all members, in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_total_size: Option<u64>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// `-P` values verbatim, then the entries of `--password-list`.
    pub fn password_candidates(&self) -> Vec<String> {
        let mut candidates = self.passwords.clone();
        if let Some(list) = &self.password_list {
            candidates.extend(list.split(',').filter(|p| !p.is_empty()).map(String::from));
        }
        candidates
    }

    pub fn limits(&self) -> ExtractLimits {
        let defaults = ExtractLimits::default();
        ExtractLimits {
            max_entry_size: self.max_entry_size.unwrap_or(defaults.max_entry_size),
            max_total_size: self.max_total_size.unwrap_or(defaults.max_total_size),
        }
    }
}

/// Candidates from a password file, one per line.
///
/// Only the line terminator is removed; surrounding spaces belong to the
/// password. Empty lines are dropped.
pub fn password_file_candidates(content: &str) -> Vec<String> {
    content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_repeated_passwords_and_limits() {
        let cli = Cli::try_parse_from([
            "labzip",
            "r.zip",
            "-P",
            "one",
            "--password",
            "two",
            "--password-list",
            "three,four",
            "--max-entry-size",
            "1024",
        ])
        .expect("valid arguments");

        assert_eq!(cli.password_candidates(), ["one", "two", "three", "four"]);
        assert_eq!(cli.extension, "lab");
        assert_eq!(cli.limits().max_entry_size, 1024);
        assert_eq!(cli.limits().max_total_size, ExtractLimits::default().max_total_size);
    }

    #[test]
    fn test_password_flag_keeps_commas() {
        let cli = Cli::try_parse_from(["labzip", "r.zip", "-P", "Clinic,2024"])
            .expect("valid arguments");
        assert_eq!(cli.passwords, ["Clinic,2024"]);
    }

    #[test]
    fn test_password_file_keeps_surrounding_spaces() {
        let candidates = password_file_candidates("  lead\r\ntrail  \n\nlast\r");
        assert_eq!(candidates, ["  lead", "trail  ", "last"]);
    }
}
