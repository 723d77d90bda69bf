use crate::error::CliError;
use serde::de::DeserializeOwned;
use std::{collections::HashMap, fs, path::Path};

/// Variables available to `${NAME}` placeholders in request and config
/// files: the process environment, optionally overlaid by a `.env` file.
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Load variables from a .env file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        self.parse_env_content(&content)
    }

    /// Reads a JSON file, expanding placeholders before deserializing.
    pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(&self, path: P) -> Result<T, CliError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let expanded = self.expand(&raw)?;
        Ok(serde_json::from_str(&expanded)?)
    }

    /// Replaces every `${NAME}` with its value. `$$` escapes a literal `$`.
    /// Unknown names are an error rather than silently empty.
    pub fn expand(&self, input: &str) -> Result<String, CliError> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(stripped) = after.strip_prefix('$') {
                out.push('$');
                rest = stripped;
            } else if let Some(body) = after.strip_prefix('{') {
                let end = body.find('}').ok_or_else(|| {
                    CliError::Config("Unterminated ${...} placeholder".to_string())
                })?;
                let name = body[..end].trim();
                let value = self.vars.get(name).ok_or_else(|| {
                    CliError::Config(format!("Environment variable '{name}' is not set"))
                })?;
                out.push_str(&json_escape(value));
                rest = &body[end + 1..];
            } else {
                out.push('$');
                rest = after;
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), CliError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!(
                    "Invalid env file: empty key at line {}",
                    line_num + 1
                )));
            }

            self.vars
                .insert(key.to_string(), Self::unquote_value(value));
        }

        Ok(())
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();
        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }
        value.to_string()
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholders sit inside JSON strings, so substituted values must not be
/// able to break out of them.
fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::datasource::config::{DataSourceConfig, DataSourceType};
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> EnvManager {
        EnvManager {
            vars: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_parse_basic_env() {
        let mut env = env(&[]);
        let content = r#"
# Comment
KEY1=value1
KEY2=value2
        "#;

        env.parse_env_content(content).unwrap();
        assert_eq!(env.vars.get("KEY1").unwrap(), "value1");
        assert_eq!(env.vars.get("KEY2").unwrap(), "value2");
    }

    #[test]
    fn test_parse_quoted_values() {
        let mut env = env(&[]);
        let content = r#"
QUOTED="value with spaces"
SINGLE='single quoted'
UNQUOTED=no_spaces
WITH_EQUALS=a=b
        "#;

        env.parse_env_content(content).unwrap();
        assert_eq!(env.vars.get("QUOTED").unwrap(), "value with spaces");
        assert_eq!(env.vars.get("SINGLE").unwrap(), "single quoted");
        assert_eq!(env.vars.get("UNQUOTED").unwrap(), "no_spaces");
        assert_eq!(env.vars.get("WITH_EQUALS").unwrap(), "a=b");
    }

    #[test]
    fn test_invalid_env_format() {
        let mut env = env(&[]);
        assert!(env.parse_env_content("INVALID LINE WITHOUT EQUALS").is_err());
        assert!(env.parse_env_content("=value").is_err());
    }

    #[test]
    fn expands_placeholders() {
        let env = env(&[("DB_USER", "etl"), ("DB_PASS", "p\"w")]);
        assert_eq!(
            env.expand(r#"{"u":"${DB_USER}","p":"${ DB_PASS }","cost":"$$5 or $x"}"#)
                .unwrap(),
            r#"{"u":"etl","p":"p\"w","cost":"$5 or $x"}"#
        );
    }

    #[test]
    fn unknown_or_unterminated_placeholders_fail() {
        let env = env(&[]);
        assert!(env.expand("${MISSING}").is_err());
        assert!(env.expand("${OPEN").is_err());
    }

    #[test]
    fn reads_config_with_secrets_from_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(&env_path, "SRC_PASS='s3cr3t'\n").unwrap();

        let cfg_path = dir.path().join("source.json");
        let mut f = std::fs::File::create(&cfg_path).unwrap();
        write!(
            f,
            r#"{{"type":"mysql","host":"db","port":3306,"database":"shop","username":"etl","password":"${{SRC_PASS}}"}}"#
        )
        .unwrap();

        let mut env = env(&[]);
        env.load_from_file(&env_path).unwrap();
        let cfg: DataSourceConfig = env.read_json(&cfg_path).unwrap();

        assert_eq!(cfg.kind, Some(DataSourceType::MySql));
        assert_eq!(cfg.password, "s3cr3t");
        assert_eq!(cfg.database, "shop");
    }
}
