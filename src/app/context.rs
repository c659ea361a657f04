use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Result, TrackerError};
use crate::config::Config;
use crate::store::sqlite::SqliteStore;
use crate::tracker::AttributeTracker;

pub type Tracker = AttributeTracker<Arc<SqliteStore>>;

pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub tracker: Arc<Tracker>,
    pub config: Config,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.store.path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(store, config)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        Self::with_store(Arc::new(SqliteStore::in_memory()?), config)
    }

    fn with_store(store: Arc<SqliteStore>, config: Config) -> Result<Self> {
        let tracker = Arc::new(AttributeTracker::new(
            store.clone(),
            config.store.domain.clone(),
        )?);

        Ok(Self {
            store,
            tracker,
            config,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| TrackerError::Config("Could not find data directory".into()))?;
        let feedtrack_dir = data_dir.join("feedtrack");
        std::fs::create_dir_all(&feedtrack_dir)?;
        Ok(feedtrack_dir.join("feedtrack.db"))
    }
}
