use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_SUPABASE_URL: &str = "JOBTRACK_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "JOBTRACK_SUPABASE_ANON_KEY";
pub const ENV_DATABASE: &str = "JOBTRACK_DATABASE";

/// Connection details of the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
}

impl RemoteConfig {
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Remote(RemoteConfig),
    Local { database: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    /// Where the signed-in session is kept between runs.
    pub session_path: PathBuf,
}

/// Contents of `config.json`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub database: Option<PathBuf>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }
}

struct Dirs {
    config: PathBuf,
    data: PathBuf,
}

fn project_dirs() -> Dirs {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobtrack") {
        Dirs {
            config: proj_dirs.config_dir().to_path_buf(),
            data: proj_dirs.data_dir().to_path_buf(),
        }
    } else {
        Dirs {
            config: PathBuf::from("."),
            data: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load `config.json` from the user config directory, then apply
    /// environment overrides.
    pub fn load(force_local: bool) -> Result<Self> {
        let dirs = project_dirs();
        let config_path = dirs.config.join("config.json");
        debug!("reading config from {}", config_path.display());
        let file = FileConfig::read(&config_path)?;
        Ok(Self::resolve(
            file,
            |key| std::env::var(key).ok(),
            &dirs.data,
            force_local,
        ))
    }

    /// Combine file values with environment lookups. The backend is remote
    /// only when both a URL and an anon key are known and `force_local` is off.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        data_dir: &Path,
        force_local: bool,
    ) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let url = non_empty(env(ENV_SUPABASE_URL)).or(non_empty(file.supabase_url));
        let anon_key = non_empty(env(ENV_SUPABASE_ANON_KEY)).or(non_empty(file.supabase_anon_key));
        let database = non_empty(env(ENV_DATABASE))
            .map(PathBuf::from)
            .or(file.database.filter(|path| !path.as_os_str().is_empty()))
            .unwrap_or_else(|| data_dir.join("jobtrack.db"));

        let backend = match (url, anon_key) {
            (Some(url), Some(anon_key)) if !force_local => Backend::Remote(RemoteConfig { url, anon_key }),
            _ => Backend::Local { database },
        };

        Self {
            backend,
            session_path: data_dir.join("session.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_local_database() {
        let config = Config::resolve(FileConfig::default(), env_from(&[]), Path::new("/data"), false);
        assert_eq!(
            config.backend,
            Backend::Local { database: PathBuf::from("/data/jobtrack.db") }
        );
        assert_eq!(config.session_path, PathBuf::from("/data/session.json"));
    }

    #[test]
    fn test_remote_from_file() {
        let file = FileConfig {
            supabase_url: Some("https://x.supabase.co".to_string()),
            supabase_anon_key: Some("key".to_string()),
            database: None,
        };
        let config = Config::resolve(file, env_from(&[]), Path::new("/data"), false);
        assert_eq!(
            config.backend,
            Backend::Remote(RemoteConfig {
                url: "https://x.supabase.co".to_string(),
                anon_key: "key".to_string(),
            })
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            supabase_url: Some("https://file.supabase.co".to_string()),
            supabase_anon_key: Some("file-key".to_string()),
            database: None,
        };
        let env = env_from(&[(ENV_SUPABASE_URL, "https://env.supabase.co/")]);
        let config = Config::resolve(file, env, Path::new("/data"), false);
        match config.backend {
            Backend::Remote(remote) => {
                assert_eq!(remote.base_url(), "https://env.supabase.co");
                assert_eq!(remote.anon_key, "file-key");
            }
            other => panic!("expected remote backend, got {:?}", other),
        }
    }

    #[test]
    fn test_url_without_key_stays_local() {
        let env = env_from(&[(ENV_SUPABASE_URL, "https://x.supabase.co"), (ENV_SUPABASE_ANON_KEY, " ")]);
        let config = Config::resolve(FileConfig::default(), env, Path::new("/data"), false);
        assert!(matches!(config.backend, Backend::Local { .. }));
    }

    #[test]
    fn test_force_local() {
        let env = env_from(&[
            (ENV_SUPABASE_URL, "https://x.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "key"),
            (ENV_DATABASE, "/tmp/custom.db"),
        ]);
        let config = Config::resolve(FileConfig::default(), env, Path::new("/data"), true);
        assert_eq!(config.backend, Backend::Local { database: PathBuf::from("/tmp/custom.db") });
    }

    #[test]
    fn test_blank_database_falls_back() {
        let file = FileConfig {
            supabase_url: None,
            supabase_anon_key: None,
            database: Some(PathBuf::new()),
        };
        let config = Config::resolve(file, env_from(&[(ENV_DATABASE, "  ")]), Path::new("/data"), false);
        assert_eq!(config.backend, Backend::Local { database: PathBuf::from("/data/jobtrack.db") });
    }

    #[test]
    fn test_read_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(FileConfig::read(&path).unwrap().supabase_url.is_none());

        std::fs::write(&path, r#"{ "supabase_url": "https://x.supabase.co", "database": "/srv/jobs.db" }"#).unwrap();
        let file = FileConfig::read(&path).unwrap();
        assert_eq!(file.supabase_url.as_deref(), Some("https://x.supabase.co"));
        assert_eq!(file.database, Some(PathBuf::from("/srv/jobs.db")));

        std::fs::write(&path, "not json").unwrap();
        assert!(FileConfig::read(&path).is_err());
    }
}
