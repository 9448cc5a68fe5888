pub mod append_log;
pub mod store;

pub use append_log::AppendLog;
pub use store::{
    LEDGER_FILE_NAME, Records, is_ledger_file, ledger_path, load, merge, save, update,
};
