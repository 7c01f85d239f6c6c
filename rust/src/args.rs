use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use secprop::crypto::Algorithm;
use secprop::entry::{EntrySpec, EntryType, Operation};
use secprop::RunMode;

#[derive(Parser, Debug)]
#[command(name = "secprop")]
#[command(about = "Edit .properties files with typed and encrypted values", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the edit described by a JSON job file
    Apply {
        /// Path to the job file
        job: PathBuf,
    },

    /// Edit a property file directly from the command line
    Edit {
        /// Property file to edit (created when missing)
        #[arg(short, long)]
        file: PathBuf,

        /// ENCRYPT, DECRYPT or NONE
        #[arg(short, long, default_value = "NONE")]
        mode: RunMode,

        #[command(flatten)]
        crypto: CryptoArgs,

        /// Comment written above the timestamp line
        #[arg(long)]
        comment: Option<String>,

        /// Allow missing keys and empty values
        #[arg(long)]
        skip_empty: bool,

        /// KEY[:type]=VALUE, KEY[:type]+=VALUE, KEY[:type]-=VALUE or KEY:del
        #[arg(short, long = "entry", value_parser = parse_entry, required = true)]
        entries: Vec<EntrySpec>,
    },

    /// Encrypt or decrypt a single value and print NAME=VALUE
    Value {
        #[arg(short, long)]
        name: String,

        #[arg(long)]
        value: String,

        /// ENCRYPT, DECRYPT or NONE
        #[arg(short, long, default_value = "ENCRYPT")]
        mode: RunMode,

        #[command(flatten)]
        crypto: CryptoArgs,
    },
}

#[derive(Args, Debug)]
pub struct CryptoArgs {
    /// PBE algorithm name
    #[arg(short, long, default_value = "PBEWITHMD5ANDDES")]
    pub algorithm: Algorithm,

    /// Encryption password
    #[arg(short, long, conflicts_with = "password_env")]
    pub password: Option<String>,

    /// Environment variable holding the encryption password
    #[arg(long)]
    pub password_env: Option<String>,
}

/// Parses the compact entry syntax used by `edit --entry`.
pub fn parse_entry(raw: &str) -> Result<EntrySpec, String> {
    let Some(eq) = raw.find('=') else {
        return match raw.rsplit_once(':') {
            Some((key, "del")) if !key.is_empty() => {
                Ok(EntrySpec::new(key).operation(Operation::Delete))
            }
            _ => Err(format!("'{raw}' is not KEY=VALUE, KEY+=VALUE, KEY-=VALUE or KEY:del")),
        };
    };

    let value = &raw[eq + 1..];
    let (target, operation) = match raw[..eq].strip_suffix('+') {
        Some(target) => (target, Operation::Increment),
        None => match raw[..eq].strip_suffix('-') {
            Some(target) => (target, Operation::Decrement),
            None => (&raw[..eq], Operation::Assign),
        },
    };
    let (key, kind) = match target.rsplit_once(':') {
        Some((key, kind)) => (key, kind.parse::<EntryType>().map_err(|e| e.to_string())?),
        None => (target, EntryType::String),
    };
    if key.is_empty() {
        return Err(format!("'{raw}' has no key"));
    }

    Ok(EntrySpec::new(key).value(value).kind(kind).operation(operation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entry_syntax() {
        let inc = parse_entry("LOGIN_ATTEMPTS:int+=1").unwrap();
        assert_eq!(inc.key.as_deref(), Some("LOGIN_ATTEMPTS"));
        assert_eq!(inc.kind, EntryType::Integer);
        assert_eq!(inc.operation, Operation::Increment);
        assert_eq!(inc.value.as_deref(), Some("1"));

        let assign = parse_entry("url=jdbc:x://h?a=b").unwrap();
        assert_eq!(assign.key.as_deref(), Some("url"));
        assert_eq!(assign.value.as_deref(), Some("jdbc:x://h?a=b"));
        assert_eq!(assign.operation, Operation::Assign);

        let dec = parse_entry("EXPIRES:date-=3").unwrap();
        assert_eq!((dec.kind, dec.operation), (EntryType::Date, Operation::Decrement));

        let del = parse_entry("OLD:del").unwrap();
        assert_eq!(del.operation, Operation::Delete);
        assert_eq!(del.value, None);
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(parse_entry("NOVALUE").is_err());
        assert!(parse_entry("=x").is_err());
        assert!(parse_entry(":del").is_err());
        assert!(parse_entry("K:float=1").is_err());
    }

    #[test]
    fn parses_edit_command() {
        let cli = Cli::try_parse_from([
            "secprop",
            "-v",
            "edit",
            "--file",
            "app.properties",
            "--mode",
            "encrypt",
            "--algorithm",
            "pbewithsha1anddesede",
            "--password-env",
            "APP_PW",
            "-e",
            "DB_PASSWORD=secret",
            "-e",
            "RUNS:int+=1",
        ])
        .expect("valid arguments");
        assert!(cli.verbose);
        match cli.command {
            Commands::Edit {
                mode,
                crypto,
                entries,
                skip_empty,
                ..
            } => {
                assert_eq!(mode, RunMode::Encrypt);
                assert_eq!(crypto.algorithm, Algorithm::Sha1AndDesede);
                assert_eq!(crypto.password_env.as_deref(), Some("APP_PW"));
                assert_eq!(entries.len(), 2);
                assert!(!skip_empty);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn value_command_defaults_to_encrypt() {
        let cli = Cli::try_parse_from(["secprop", "value", "-n", "k", "--value", "v", "-p", "pw"])
            .expect("valid arguments");
        match cli.command {
            Commands::Value { mode, crypto, .. } => {
                assert_eq!(mode, RunMode::Encrypt);
                assert_eq!(crypto.algorithm, Algorithm::Md5AndDes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_or_unknown_arguments() {
        assert!(Cli::try_parse_from([
            "secprop", "value", "-n", "k", "--value", "v", "-p", "pw", "--password-env", "X",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["secprop", "edit", "--file", "f"]).is_err());
        assert!(Cli::try_parse_from(["secprop", "edit", "-f", "f", "-m", "shred", "-e", "A=1"]).is_err());
    }
}
