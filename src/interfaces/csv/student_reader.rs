use crate::domain::school::Student;
use crate::error::{PaymentError, Result};
use std::io::Read;

/// Reads `id, parent_id, grade, fee_structure_id` rows.
pub struct StudentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> StudentReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn students(self) -> impl Iterator<Item = Result<Student>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
