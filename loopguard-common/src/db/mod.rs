//! SQLite persistence

pub mod audit;
pub mod followups;
pub mod init;

pub use audit::SqliteAuditLogger;
pub use followups::{SqliteFollowUpStore, SqliteUnitOfWork};
pub use init::init_database;
