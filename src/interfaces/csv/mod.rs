//! CSV adapters used by the batch driver.

pub mod payment_writer;
pub mod request_reader;
pub mod student_reader;
