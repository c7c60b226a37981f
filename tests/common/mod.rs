use rand::Rng;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const REQUEST_HEADER: [&str; 7] = [
    "payer",
    "role",
    "student",
    "amount",
    "description",
    "due_date",
    "transaction_id",
];

/// Writes `rows` admin payment requests for student 1 with ids `TRX-1..`.
pub fn generate_requests(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(REQUEST_HEADER)?;

    for i in 1..=rows {
        wtr.write_record([
            "1",
            "admin",
            "1",
            "10.00",
            "Generated",
            "",
            format!("TRX-{}", i).as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes `rows` parent requests spread over 50 families, each parent paying
/// for their own child, with random amounts and server-generated ids.
pub fn generate_family_requests(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(REQUEST_HEADER)?;

    let mut rng = rand::thread_rng();
    for _ in 0..rows {
        let family: u64 = rng.gen_range(1..=50);
        let cents: u64 = rng.gen_range(100..=100_000);
        wtr.write_record([
            (1000 + family).to_string().as_str(),
            "parent",
            family.to_string().as_str(),
            format!("{}.{:02}", cents / 100, cents % 100).as_str(),
            "",
            "",
            "",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
