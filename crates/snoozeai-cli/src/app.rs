//! Wiring of the core components from the on-disk config and database.

use std::error::Error;
use std::sync::Arc;

use snoozeai_core::{
    BackendGateway, Config, Database, HttpBackend, IngestionPipeline, ReconciliationSync,
    ResurfaceScheduler, RetryPolicy, SettingsStore, SqliteItemStore,
};

pub struct App {
    pub config: Config,
    pub db: Arc<Database>,
    pub store: Arc<SqliteItemStore>,
    pub settings: Arc<SettingsStore>,
    pub scheduler: ResurfaceScheduler,
}

impl App {
    /// Open the default database and load `config.toml`.
    pub fn open() -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        config.validate()?;
        let db = Arc::new(Database::open_default()?);
        Ok(Self {
            store: Arc::new(SqliteItemStore::new(db.clone())),
            settings: Arc::new(SettingsStore::load(db.clone())?),
            scheduler: ResurfaceScheduler::new(db.clone()),
            config,
            db,
        })
    }

    pub fn gateway(&self) -> Result<Arc<BackendGateway<HttpBackend>>, Box<dyn Error>> {
        let backend = HttpBackend::from_config(&self.config.backend)?;
        let policy = RetryPolicy::from(&self.config.retry);
        Ok(Arc::new(BackendGateway::new(backend, policy)))
    }

    pub fn pipeline(&self) -> Result<IngestionPipeline<HttpBackend>, Box<dyn Error>> {
        Ok(IngestionPipeline::new(
            self.gateway()?,
            self.store.clone(),
            self.scheduler.clone(),
            self.settings.clone(),
        )
        .with_summary_max_tokens(self.config.backend.summary_max_tokens))
    }

    pub fn sync(&self) -> Result<ReconciliationSync<HttpBackend>, Box<dyn Error>> {
        Ok(ReconciliationSync::new(
            self.gateway()?,
            self.store.clone(),
            self.scheduler.clone(),
            self.settings.clone(),
        )
        .with_page_limit(self.config.sync.page_limit))
    }
}
