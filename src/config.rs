use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Debug, PartialEq, Clone)]
pub enum ServiceMode {
    Serve,
    Import,
}

impl ServiceMode {
    pub fn as_tag(&self) -> &'static str {
        match self {
            ServiceMode::Serve => "serve",
            ServiceMode::Import => "import",
        }
    }
}

impl std::str::FromStr for ServiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "serve" => Ok(ServiceMode::Serve),
            "import" => Ok(ServiceMode::Import),
            _ => Err(format!("Unknown service mode: {s}")),
        }
    }
}

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "serve")]
    pub mode: ServiceMode,

    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    /// RocksDB directory for the address store.
    #[envconfig(default = "./data")]
    pub db_path: String,

    /// Directory holding the extracted DNE files (import mode).
    #[envconfig(default = "./dne")]
    pub dne_path: String,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    // Batch flush cadences for the importer; tuning parameters only.
    #[envconfig(default = "10000")]
    pub street_batch_size: usize,

    #[envconfig(default = "5000")]
    pub batch_size: usize,
}
