use std::net::SocketAddr;
use std::path::PathBuf;

use crate::store::DEFAULT_ADMIN_PASSWORD;

/// File name of the store inside the data directory.
pub const DB_FILE_NAME: &str = "registry-admin.db";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Password of the seed admin user. Only applied when the users table is
    /// first created.
    pub admin_password: String,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}
