//! CLI command handlers, one file per command.

mod checksum;
mod run;
mod sites;

pub use checksum::run_checksum;
pub use run::run_backup;
pub use sites::run_sites_list;
