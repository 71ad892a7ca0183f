#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] IoError),
    #[error("FS: {0}")]
    Fs(#[from] FsError),
}

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("Not found")]
    NotFound,
    #[error("Out of range")]
    OutOfRange,
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("{0}")]
    Other(std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("Inconsistent")]
    Inconsistent,
    #[error("Not found")]
    NotFound,
    #[error("Is a directory")]
    IsDirectory,
}

pub type Result<T> = core::result::Result<T, Error>;
