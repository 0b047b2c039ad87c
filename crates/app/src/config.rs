use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use watch_core::MergePolicy;

const DEFAULT_BIND: &str = "0.0.0.0:5000";
const DEFAULT_DB_URL: &str = "sqlite://watch.sqlite3";
const DEFAULT_ENVIRONMENT: &str = "development";

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidBind { raw: String },
    InvalidPort { raw: String },
    InvalidDbUrl { raw: String },
    InvalidStore { raw: String },
    InvalidMergeGap { raw: String },
    MissingAllowedOrigins { environment: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidBind { raw } => write!(f, "invalid bind address: {raw}"),
            ArgsError::InvalidPort { raw } => write!(f, "invalid PORT value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidStore { raw } => {
                write!(f, "invalid WATCH_STORE value: {raw} (expected sqlite or memory)")
            }
            ArgsError::InvalidMergeGap { raw } => write!(f, "invalid merge gap: {raw}"),
            ArgsError::MissingAllowedOrigins { environment } => write!(
                f,
                "WATCH_ALLOWED_ORIGINS or --allow-origin is required when WATCH_ENV={environment}"
            ),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  watch-server [--bind <addr>] [--db <sqlite_url> | --memory] \
         [--allow-origin <origin>]... [--merge-gap <seconds>]"
    );
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --bind {DEFAULT_BIND}");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --merge-gap 0");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  WATCH_BIND, PORT, WATCH_DB_URL, WATCH_STORE, WATCH_ALLOWED_ORIGINS,");
    eprintln!("  WATCH_MERGE_GAP, WATCH_ENV, RUST_LOG");
}

/// Where progress records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Sqlite { url: String },
}

/// Server settings resolved from the environment, then command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub store: StoreConfig,
    pub allowed_origins: Vec<String>,
    pub merge_policy: MergePolicy,
    pub environment: String,
}

impl AppConfig {
    /// Resolve configuration from the process environment and arguments.
    pub fn from_process() -> Result<Self, ArgsError> {
        let mut args = std::env::args().skip(1);
        Self::parse(|key| std::env::var(key).ok(), &mut args)
    }

    /// Resolve configuration; `env` looks up variables, flags override them.
    ///
    /// Blank variables count as unset.
    pub fn parse(
        env: impl Fn(&str) -> Option<String>,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let mut bind = match (lookup("WATCH_BIND"), lookup("PORT")) {
            (Some(raw), _) => parse_bind(raw)?,
            (None, Some(port)) => {
                let port: u16 = port
                    .trim()
                    .parse()
                    .map_err(|_| ArgsError::InvalidPort { raw: port.clone() })?;
                let mut addr = parse_bind(DEFAULT_BIND.to_string())?;
                addr.set_port(port);
                addr
            }
            (None, None) => parse_bind(DEFAULT_BIND.to_string())?,
        };

        let mut db_url = lookup("WATCH_DB_URL")
            .map_or_else(|| DEFAULT_DB_URL.to_string(), normalize_sqlite_url);
        let mut use_memory = match lookup("WATCH_STORE") {
            Some(raw) => parse_store_is_memory(raw)?,
            None => false,
        };

        let mut allowed_origins = lookup("WATCH_ALLOWED_ORIGINS")
            .map(|raw| split_origins(&raw))
            .unwrap_or_default();
        let mut flag_origins = Vec::new();

        let mut merge_policy = match lookup("WATCH_MERGE_GAP") {
            Some(raw) => parse_merge_gap(raw)?,
            None => MergePolicy::strict(),
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--bind" => bind = parse_bind(require_value(args, "--bind")?)?,
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                    use_memory = false;
                }
                "--memory" => use_memory = true,
                "--allow-origin" => {
                    flag_origins.extend(split_origins(&require_value(args, "--allow-origin")?));
                }
                "--merge-gap" => {
                    merge_policy = parse_merge_gap(require_value(args, "--merge-gap")?)?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if !flag_origins.is_empty() {
            allowed_origins = flag_origins;
        }

        let environment =
            lookup("WATCH_ENV").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        // Any-origin CORS is only acceptable during development.
        if allowed_origins.is_empty() && !environment.eq_ignore_ascii_case(DEFAULT_ENVIRONMENT) {
            return Err(ArgsError::MissingAllowedOrigins { environment });
        }

        let store = if use_memory {
            StoreConfig::Memory
        } else {
            StoreConfig::Sqlite { url: db_url }
        };

        Ok(Self {
            bind,
            store,
            allowed_origins,
            merge_policy,
            environment,
        })
    }
}

fn parse_bind(raw: String) -> Result<SocketAddr, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidBind { raw })
}

fn parse_store_is_memory(raw: String) -> Result<bool, ArgsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(true),
        "sqlite" => Ok(false),
        _ => Err(ArgsError::InvalidStore { raw }),
    }
}

fn parse_merge_gap(raw: String) -> Result<MergePolicy, ArgsError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|gap| MergePolicy::with_gap(gap).ok())
        .ok_or(ArgsError::InvalidMergeGap { raw })
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file (and its directory) so the pool can open it.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse(env: &[(&str, &str)], args: &[&str]) -> Result<AppConfig, ArgsError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut args = args.iter().map(|a| (*a).to_string());
        AppConfig::parse(|key| env.get(key).cloned(), &mut args)
    }

    #[test]
    fn defaults_without_env_or_flags() {
        let config = parse(&[], &[]).unwrap();
        assert_eq!(config.bind, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(
            config.store,
            StoreConfig::Sqlite {
                url: DEFAULT_DB_URL.to_string()
            }
        );
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.merge_policy, MergePolicy::strict());
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn port_env_only_changes_the_port() {
        let config = parse(&[("PORT", "8080")], &[]).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080".parse().unwrap());

        let config = parse(&[("PORT", "8080"), ("WATCH_BIND", "127.0.0.1:9000")], &[]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn flags_override_env() {
        let config = parse(
            &[
                ("WATCH_BIND", "127.0.0.1:9000"),
                ("WATCH_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
                ("WATCH_MERGE_GAP", "2"),
            ],
            &[
                "--bind",
                "127.0.0.1:7000",
                "--allow-origin",
                "https://c.example",
                "--merge-gap",
                "0.5",
            ],
        )
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.allowed_origins, vec!["https://c.example"]);
        assert_eq!(config.merge_policy.max_gap(), 0.5);
    }

    #[test]
    fn env_origins_are_split_and_trimmed() {
        let config = parse(
            &[("WATCH_ALLOWED_ORIGINS", "https://a.example, ,https://b.example ")],
            &[],
        )
        .unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn memory_store_from_env_or_flag() {
        let config = parse(&[("WATCH_STORE", "memory")], &[]).unwrap();
        assert_eq!(config.store, StoreConfig::Memory);

        let config = parse(&[], &["--memory"]).unwrap();
        assert_eq!(config.store, StoreConfig::Memory);

        let config = parse(&[("WATCH_STORE", "memory")], &["--db", "sqlite:///tmp/w.db"]).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Sqlite {
                url: "sqlite:///tmp/w.db".to_string()
            }
        );
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = parse(&[("WATCH_ENV", "  "), ("WATCH_BIND", "")], &[]).unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.bind, "0.0.0.0:5000".parse().unwrap());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&[("WATCH_STORE", "redis")], &[]),
            Err(ArgsError::InvalidStore { .. })
        ));
        assert!(matches!(
            parse(&[("PORT", "eighty")], &[]),
            Err(ArgsError::InvalidPort { .. })
        ));
        assert!(matches!(
            parse(&[], &["--merge-gap", "-1"]),
            Err(ArgsError::InvalidMergeGap { .. })
        ));
        assert!(matches!(
            parse(&[], &["--bind"]),
            Err(ArgsError::MissingValue { flag: "--bind" })
        ));
        assert!(matches!(
            parse(&[], &["--db", " "]),
            Err(ArgsError::InvalidDbUrl { .. })
        ));
        assert!(matches!(
            parse(&[], &["--verbose"]),
            Err(ArgsError::UnknownArg(arg)) if arg == "--verbose"
        ));
    }

    #[test]
    fn non_development_requires_an_origin_list() {
        assert!(matches!(
            parse(&[("WATCH_ENV", "production")], &[]),
            Err(ArgsError::MissingAllowedOrigins { environment }) if environment == "production"
        ));

        let config = parse(
            &[("WATCH_ENV", "production")],
            &["--allow-origin", "https://player.example"],
        )
        .unwrap();
        assert_eq!(config.environment, "production");
        assert_eq!(config.allowed_origins, vec!["https://player.example"]);
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/watch.db".to_string());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/watch.db"));

        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".to_string()),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:///var/lib/watch.db".to_string()),
            "sqlite:///var/lib/watch.db"
        );
    }

    #[test]
    fn prepare_rejects_urls_without_a_path() {
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
        assert!(prepare_sqlite_file("postgres://db").is_err());
        assert!(prepare_sqlite_file("sqlite://").is_err());
    }
}
