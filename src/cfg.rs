use config::{Config, Environment};
use serde::{Deserialize, Serialize};

fn default_mongo_srv_url() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_mongo_db_nm() -> String {
    "studyshelf".to_string()
}

fn default_srv_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_clt_addr() -> String {
    "http://localhost:3000".to_string()
}

fn default_hash_cost() -> u8 {
    10
}

fn default_jwt_secret() -> String {
    "fallback_secret".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

#[derive(Serialize, Deserialize)]
#[derive(Eq, PartialEq)]
#[derive(Clone)]
#[derive(Debug)]
pub struct AppConfig {
    #[serde(default = "default_mongo_srv_url")]
    pub(crate) mongo_srv_url: String,
    #[serde(default = "default_mongo_db_nm")]
    pub(crate) mongo_db_nm: String,
    #[serde(default = "default_srv_addr")]
    pub(crate) srv_addr: String,
    #[serde(default = "default_clt_addr")]
    pub(crate) clt_addr: String,
    #[serde(default = "default_hash_cost")]
    pub(crate) hash_cost: u8,
    #[serde(default = "default_jwt_secret")]
    pub(crate) jwt_secret: String,
    #[serde(default = "default_upload_dir")]
    pub(crate) upload_dir: String,
}

impl AppConfig {
    pub(crate) fn new() -> Self {
        let config = Config::builder()
            .add_source(Environment::with_prefix("STUDYSHELF"))
            .build()
            .unwrap();
        config.try_deserialize().unwrap()
    }
}
