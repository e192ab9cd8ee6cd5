use crate::db::Database;
use crate::worker::DecisionQueue;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub queue: DecisionQueue,
}

impl AppState {
    pub fn new(db: Database, queue: DecisionQueue) -> Self {
        Self { db, queue }
    }
}
