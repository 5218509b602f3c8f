pub mod db;

pub use db::{
    count_by_status, create_db, find_by_hash, insert_receipt, list_all, list_pending_review,
    list_recent, update_status, DbPool, StorageError,
};
