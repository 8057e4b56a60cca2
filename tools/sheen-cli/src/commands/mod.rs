pub mod check;
pub mod export;
pub mod info;
pub mod init_style;
pub mod validate;
