use crate::domain::session::SessionView;
use crate::error::Result;
use std::io::Write;

/// Writes final session summaries as CSV.
pub struct SessionWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SessionWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_sessions(&mut self, sessions: Vec<SessionView>) -> Result<()> {
        self.writer.write_record([
            "payment_session_id",
            "charging_session_id",
            "user_id",
            "station_id",
            "status",
            "total_energy_used",
            "total_amount_paid",
            "transactions",
        ])?;
        for session in sessions {
            self.writer.write_record([
                session.id.as_str(),
                &session.charging_session_id,
                &session.user_id,
                &session.station_id,
                &session.status.to_string(),
                &session.total_energy_used.to_string(),
                &session.total_amount_paid.to_string(),
                &session.transaction_hashes.len().to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
