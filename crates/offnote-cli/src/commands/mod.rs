pub mod backup;
pub mod cache;
pub mod init;
pub mod notes;
