pub mod compare;
pub mod init;
pub mod report;
pub mod simulate;
pub mod validate;
