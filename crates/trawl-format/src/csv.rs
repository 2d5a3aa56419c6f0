//! CSV output format.

use std::borrow::Cow;
use std::io::Write;

use trawl_aggregate::Bar;
use trawl_types::{Trade, time};

use crate::{FormatError, Formatter};

/// CSV formatter.
///
/// Trades use the on-disk column layout (`date,time,trade_id,price,size,side`
/// followed by the exchange's pass-through columns, taken from the first
/// trade). Bars are keyed by their inclusive right edge.
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    /// Field delimiter (default: comma).
    delimiter: char,
    /// Whether to include header row.
    include_header: bool,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvFormatter {
    /// Creates a new CSV formatter with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
        }
    }

    /// Sets the field delimiter.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether to include a header row.
    #[must_use]
    pub const fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    /// Creates a tab-separated values (TSV) formatter.
    #[must_use]
    pub const fn tsv() -> Self {
        Self {
            delimiter: '\t',
            include_header: true,
        }
    }

    /// Quotes a field if it contains the delimiter, a quote or a newline.
    fn escape<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if value.contains([self.delimiter, '"', '\n', '\r']) {
            Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
        } else {
            Cow::Borrowed(value)
        }
    }
}

impl Formatter for CsvFormatter {
    fn write_trades(&self, trades: &[Trade], writer: &mut dyn Write) -> Result<(), FormatError> {
        let d = self.delimiter;

        if self.include_header {
            write!(writer, "date{d}time{d}trade_id{d}price{d}size{d}side")?;
            for (name, _) in trades.first().map(|t| t.extra.as_slice()).unwrap_or_default() {
                write!(writer, "{d}{}", self.escape(name))?;
            }
            writeln!(writer)?;
        }

        for trade in trades {
            write!(
                writer,
                "{}{d}{}{d}{}{d}{}{d}{}{d}{}",
                time::unix_to_iso(trade.timestamp),
                trade.timestamp,
                trade.sequence.map(|s| s.to_string()).unwrap_or_default(),
                trade.price,
                trade.size,
                trade.side
            )?;
            for (_, value) in &trade.extra {
                write!(writer, "{d}{}", self.escape(value))?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    fn write_bars(&self, bars: &[Bar], writer: &mut dyn Write) -> Result<(), FormatError> {
        let d = self.delimiter;

        if self.include_header {
            writeln!(
                writer,
                "time{d}date{d}open{d}high{d}low{d}close{d}volume{d}weighted_average_price\
                 {d}buy_volume{d}buy_weighted_average_price{d}n_buys\
                 {d}sell_volume{d}sell_weighted_average_price{d}n_sells{d}n_trades"
            )?;
        }

        for bar in bars {
            writeln!(
                writer,
                "{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}",
                bar.bucket_end_time,
                time::unix_to_iso(bar.bucket_end_time),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume,
                bar.weighted_average_price,
                bar.buy_volume,
                bar.buy_weighted_average_price,
                bar.n_buys,
                bar.sell_volume,
                bar.sell_weighted_average_price,
                bar.n_sells,
                bar.n_trades
            )?;
        }

        Ok(())
    }

    fn extension(&self) -> &str {
        if self.delimiter == '\t' { "tsv" } else { "csv" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawl_types::Side;

    fn trades() -> Vec<Trade> {
        vec![
            Trade::new("XXBTZUSD", None, 1_526_008_794, 8512.3, 0.01, Side::Buy)
                .with_extra("order_type", "l"),
            Trade::new("XXBTZUSD", None, 1_526_008_795, 8512.4, 0.25, Side::Sell)
                .with_extra("order_type", "m,x"),
        ]
    }

    fn render(formatter: &CsvFormatter, trades: &[Trade]) -> String {
        let mut output = Vec::new();
        formatter.write_trades(trades, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_csv_trades() {
        let result = render(&CsvFormatter::new(), &trades());
        let lines: Vec<_> = result.lines().collect();
        assert_eq!(lines[0], "date,time,trade_id,price,size,side,order_type");
        assert_eq!(lines[1], "2018-05-11T03:19:54Z,1526008794,,8512.3,0.01,buy,l");
        assert_eq!(lines[2], "2018-05-11T03:19:55Z,1526008795,,8512.4,0.25,sell,\"m,x\"");
    }

    #[test]
    fn test_csv_no_header() {
        let result = render(&CsvFormatter::new().with_header(false), &trades());
        assert_eq!(result.lines().count(), 2);
        assert!(!result.contains("date,time"));
    }

    #[test]
    fn test_tsv_bars() {
        let formatter = CsvFormatter::tsv();
        let mut output = Vec::new();
        formatter
            .write_bars(&[Bar::flat(60, 100.5)], &mut output)
            .unwrap();

        let result = String::from_utf8(output).unwrap();
        assert!(result.starts_with("time\tdate\topen\thigh"));
        assert!(result.contains("60\t1970-01-01T00:01:00Z\t100.5\t100.5"));
        assert_eq!(formatter.extension(), "tsv");
    }

    #[test]
    fn test_empty_trades_header_only() {
        let result = render(&CsvFormatter::new(), &[]);
        assert_eq!(result, "date,time,trade_id,price,size,side\n");
    }
}
