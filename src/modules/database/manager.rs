use crate::modules::context::Initialize;
use crate::modules::database::CONTENT_MODELS;
use crate::modules::error::{code::ErrorCode, MailVaultError, MailVaultResult};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::raise_error;
use native_db::{db_type, Builder, Database};
use std::sync::{Arc, LazyLock};

pub static DB_MANAGER: LazyLock<DatabaseManager> = LazyLock::new(DatabaseManager::new);

pub struct DatabaseManager {
    /// Mailbox content database instance (folders, messages, threads)
    content_db: Arc<Database<'static>>,
}

impl Initialize for DatabaseManager {
    async fn initialize() -> MailVaultResult<()> {
        LazyLock::force(&DB_MANAGER);
        Ok(())
    }
}

impl DatabaseManager {
    fn new() -> Self {
        let content_db =
            Self::init_content_database().expect("Failed to initialize content database");
        DatabaseManager { content_db }
    }

    pub fn content_db(&self) -> &Arc<Database<'static>> {
        &self.content_db
    }

    /// Initialize the content database with a fixed or configured file path
    fn init_content_database() -> MailVaultResult<Arc<Database<'static>>> {
        if SETTINGS.mailvault_content_memory_mode_enabled {
            return Ok(Arc::new(
                Builder::new().create_in_memory(&CONTENT_MODELS).unwrap(),
            ));
        }
        let mut database = Builder::new()
            .set_cache_size(
                SETTINGS
                    .mailvault_content_cache_size
                    .unwrap_or(134217728)
                    .max(67108864) as usize,
            ) //default 128MB
            .create(&CONTENT_MODELS, DATA_DIR_MANAGER.content_db.clone())
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    fn handle_database_error(error: db_type::Error) -> MailVaultError {
        raise_error!(format!("{:#?}", error), ErrorCode::InternalError)
    }
}
