//! JSON output format.

use std::io::Write;

use serde::Serialize;
use trawl_aggregate::Bar;
use trawl_types::Trade;

use crate::{FormatError, Formatter};

/// JSON output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    /// JSON array (standard JSON).
    #[default]
    Array,
    /// Newline-delimited JSON (NDJSON/JSONL).
    Ndjson,
}

/// JSON formatter.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    /// Output style.
    style: JsonStyle,
    /// Whether to pretty-print (only for array style).
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter with default settings (array style).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            style: JsonStyle::Array,
            pretty: false,
        }
    }

    /// Creates a new NDJSON formatter.
    #[must_use]
    pub const fn ndjson() -> Self {
        Self {
            style: JsonStyle::Ndjson,
            pretty: false,
        }
    }

    /// Sets whether to pretty-print output (array style only).
    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Sets the output style.
    #[must_use]
    pub const fn with_style(mut self, style: JsonStyle) -> Self {
        self.style = style;
        self
    }

    fn write_all<T: Serialize>(&self, items: &[T], mut writer: &mut dyn Write) -> Result<(), FormatError> {
        match self.style {
            JsonStyle::Array => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut writer, items)?;
                } else {
                    serde_json::to_writer(&mut writer, items)?;
                }
                writeln!(writer)?;
            }
            JsonStyle::Ndjson => {
                for item in items {
                    serde_json::to_writer(&mut writer, item)?;
                    writeln!(writer)?;
                }
            }
        }
        Ok(())
    }
}

impl Formatter for JsonFormatter {
    fn write_trades(&self, trades: &[Trade], writer: &mut dyn Write) -> Result<(), FormatError> {
        self.write_all(trades, writer)
    }

    fn write_bars(&self, bars: &[Bar], writer: &mut dyn Write) -> Result<(), FormatError> {
        self.write_all(bars, writer)
    }

    fn extension(&self) -> &str {
        match self.style {
            JsonStyle::Array => "json",
            JsonStyle::Ndjson => "ndjson",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawl_types::Side;

    fn create_test_trade() -> Trade {
        Trade::new("ETHBTC", Some(26129), 1_498_793_709, 0.01633102, 4.70443515, Side::Sell)
            .with_extra("best_price_match", "true")
    }

    #[test]
    fn test_json_array() {
        let formatter = JsonFormatter::new();
        let mut output = Vec::new();

        formatter
            .write_trades(&[create_test_trade()], &mut output)
            .unwrap();

        let result = String::from_utf8(output).unwrap();
        assert!(result.starts_with('['));
        assert!(result.contains("\"price\":0.01633102"));
        assert!(result.contains("\"side\":\"sell\""));
    }

    #[test]
    fn test_ndjson_bars() {
        let formatter = JsonFormatter::ndjson();
        let mut output = Vec::new();

        formatter
            .write_bars(&[Bar::flat(30, 1.0), Bar::flat(60, 1.0)], &mut output)
            .unwrap();

        let result = String::from_utf8(output).unwrap();
        let lines: Vec<_> = result.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("{\"bucket_end_time\":60"));
        assert_eq!(formatter.extension(), "ndjson");
    }

    #[test]
    fn test_pretty_json() {
        let formatter = JsonFormatter::new().with_pretty(true);
        let mut output = Vec::new();

        formatter
            .write_trades(&[create_test_trade()], &mut output)
            .unwrap();

        let result = String::from_utf8(output).unwrap();
        assert!(result.contains('\n'));
        assert!(result.contains("  "));
    }
}
