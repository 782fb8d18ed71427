use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Not enough space in page")]
    InsufficientSpace,
    #[error("Record not found")]
    RecordNotFound,
    #[error("Record already exists")]
    DuplicateRecord,
    #[error("Index name longer than {0} bytes")]
    NameTooLong(usize),
}
