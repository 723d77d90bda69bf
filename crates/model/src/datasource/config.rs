use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// Database technology tag. Unknown tags are preserved in `Other` so the
/// factory can report them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataSourceType {
    MySql,
    PostgreSql,
    MongoDb,
    MinIo,
    Other(String),
}

impl DataSourceType {
    pub fn as_str(&self) -> &str {
        match self {
            DataSourceType::MySql => "mysql",
            DataSourceType::PostgreSql => "postgresql",
            DataSourceType::MongoDb => "mongodb",
            DataSourceType::MinIo => "minio",
            DataSourceType::Other(tag) => tag,
        }
    }
}

impl From<&str> for DataSourceType {
    fn from(tag: &str) -> Self {
        let tag = tag.trim();
        match tag.to_lowercase().as_str() {
            "mysql" | "mariadb" => DataSourceType::MySql,
            "postgresql" | "postgres" | "pg" => DataSourceType::PostgreSql,
            "mongodb" | "mongo" => DataSourceType::MongoDb,
            "minio" => DataSourceType::MinIo,
            _ => DataSourceType::Other(tag.to_string()),
        }
    }
}

impl FromStr for DataSourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("data source type must not be empty".to_string());
        }
        Ok(DataSourceType::from(s))
    }
}

impl fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters for one endpoint. A missing or empty `type` tag
/// deserializes to `kind: None`, which task creation rejects.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    #[serde(rename = "type", default, with = "kind_tag")]
    pub kind: Option<DataSourceType>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ssl_mode: String,
    #[serde(default)]
    pub charset: String,
    /// Connect timeout in seconds, 0 means driver default.
    #[serde(default)]
    pub timeout: u64,
}

impl DataSourceConfig {
    pub fn new(kind: DataSourceType, host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: Some(kind),
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn charset(&self) -> &str {
        if self.charset.trim().is_empty() {
            DEFAULT_CHARSET
        } else {
            &self.charset
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    /// Opaque text form used by the task store.
    pub fn to_text(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl fmt::Debug for DataSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("ssl_mode", &self.ssl_mode)
            .field("charset", &self.charset)
            .field("timeout", &self.timeout)
            .finish()
    }
}

mod kind_tag {
    use super::DataSourceType;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        kind: &Option<DataSourceType>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(kind.as_ref().map(DataSourceType::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DataSourceType>, D::Error> {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(tag
            .filter(|t| !t.trim().is_empty())
            .map(|t| DataSourceType::from(t.as_str())))
    }
}
