//! Headless output: one JSON object per analysed block.

use anyhow::Result;
use std::io::Write;
use tuner_core::TuningResult;

pub struct JsonLines<W: Write> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write(&mut self, result: &TuningResult) -> Result<()> {
        serde_json::to_writer(&mut self.out, result)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
