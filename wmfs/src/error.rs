use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("can't open X server (display {0:?})")]
    NoDisplay(String),

    #[error("another window manager is already running")]
    OtherWindowManager,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
