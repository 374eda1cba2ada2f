use crate::domain::result::PaymentResult;
use crate::error::Error;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ResultRow<'a> {
    scenario: &'a str,
    success: bool,
    transaction_id: Option<&'a str>,
    error_message: Option<&'a str>,
}

/// Writes one `scenario, success, transaction_id, error_message` row per
/// payment result.
pub struct ResultWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResultWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, scenario: &str, result: &PaymentResult) -> Result<(), Error> {
        self.writer.serialize(ResultRow {
            scenario,
            success: result.success(),
            transaction_id: result.transaction_id(),
            error_message: result.error_message(),
        })?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_header_and_rows() {
        let mut out = Vec::new();
        {
            let mut writer = ResultWriter::new(&mut out);
            writer
                .write("happy", &PaymentResult::succeeded("txn-1"))
                .unwrap();
            writer
                .write("hide", &PaymentResult::failed("Payment was cancelled."))
                .unwrap();
            writer.flush().unwrap();
        }

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "scenario,success,transaction_id,error_message");
        assert_eq!(lines[1], "happy,true,txn-1,");
        assert_eq!(lines[2], "hide,false,,Payment was cancelled.");
    }
}
