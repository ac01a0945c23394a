use crate::signal::{SignalRef, SignalTable};
use num_bigint::BigUint;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct VcdWriter {
    writer: BufWriter<File>,
    ids: Vec<(SignalRef, String, usize)>,
    last_values: Vec<Option<BigUint>>,
    timestamp: u64,
    started: bool,
}

impl VcdWriter {
    pub fn new<P: AsRef<Path>>(
        path: P,
        scope: &str,
        signals: &SignalTable,
    ) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // VCD Header
        writeln!(writer, "$date")?;
        writeln!(
            writer,
            "  {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(writer, "$end")?;
        writeln!(writer, "$version")?;
        writeln!(writer, "  afifo-verify")?;
        writeln!(writer, "$end")?;
        writeln!(writer, "$timescale 1ns $end")?;

        writeln!(writer, "$scope module {} $end", scope)?;
        let mut ids = Vec::with_capacity(signals.len());
        for (num, named) in signals.named_signals().iter().enumerate() {
            let vcd_id = Self::generate_vcd_id(num);
            writeln!(
                writer,
                "$var wire {} {} {} $end",
                named.width, vcd_id, named.name
            )?;
            ids.push((named.signal, vcd_id, named.width));
        }
        writeln!(writer, "$upscope $end")?;

        writeln!(writer, "$enddefinitions $end")?;

        Ok(Self {
            writer,
            last_values: vec![None; ids.len()],
            ids,
            timestamp: 0,
            started: false,
        })
    }

    fn generate_vcd_id(num: usize) -> String {
        let mut id = String::new();
        let mut n = num;
        loop {
            let char = ((n % 94) + 33) as u8 as char;
            id.push(char);
            if n < 94 {
                break;
            }
            n = (n / 94) - 1;
        }
        id.chars().rev().collect()
    }

    /// Writes every signal whose value changed since the previous dump.
    pub fn dump(&mut self, timestamp: u64, signals: &SignalTable) -> std::io::Result<()> {
        let changed: Vec<usize> = self
            .ids
            .iter()
            .enumerate()
            .filter(|(i, (signal, _, _))| {
                self.last_values[*i].as_ref() != Some(signals.get(*signal))
            })
            .map(|(i, _)| i)
            .collect();
        if changed.is_empty() && self.started {
            return Ok(());
        }

        if !self.started || timestamp > self.timestamp {
            writeln!(self.writer, "#{}", timestamp)?;
            self.timestamp = timestamp;
        }
        if !self.started {
            writeln!(self.writer, "$dumpvars")?;
        }

        for i in changed {
            let (signal, vcd_id, width) = &self.ids[i];
            let current_val = signals.get(*signal);
            if *width == 1 {
                writeln!(self.writer, "{}{}", current_val, vcd_id)?;
            } else {
                writeln!(self.writer, "b{} {}", current_val.to_str_radix(2), vcd_id)?;
            }
            self.last_values[i] = Some(current_val.clone());
        }

        if !self.started {
            writeln!(self.writer, "$end")?;
            self.started = true;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_vcd_id() {
        assert_eq!(VcdWriter::generate_vcd_id(0), "!");
        assert_eq!(VcdWriter::generate_vcd_id(93), "~");
        assert_eq!(VcdWriter::generate_vcd_id(94), "!!");
    }
}
