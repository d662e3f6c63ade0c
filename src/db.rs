pub mod appointmentdb;
#[cfg(test)]
pub mod memorydb;
pub mod propertydb;
pub mod userdb;

use sqlx::{Pool, Postgres};

use appointmentdb::AppointmentExt;
use propertydb::PropertyExt;
use userdb::UserExt;

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

/// Everything the appointment service reads and writes.
pub trait Store: AppointmentExt + UserExt + PropertyExt + Send + Sync {}

impl<T> Store for T where T: AppointmentExt + UserExt + PropertyExt + Send + Sync {}
