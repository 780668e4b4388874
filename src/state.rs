use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::auth::webauthn::CeremonyStore;
use crate::config::Config;
use crate::mailer::Mailer;
use crate::store::Store;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub ceremonies: Arc<Mutex<CeremonyStore>>,
    pub mailer: Arc<dyn Mailer>,
}
