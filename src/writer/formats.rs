//! Row/header formatting for the three output formats (§6.5): comma-,
//! tab-, and Excel-compatible-comma-separated. Excel mode prepends a
//! UTF-8 BOM and uses CRLF; the others use LF.

use crate::models::{Calibration, Sample};

pub const BOM_UTF8: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Tsv,
    ExcelCompatible,
}

impl OutputFormat {
    pub fn delimiter(self) -> char {
        match self {
            OutputFormat::Tsv => '\t',
            OutputFormat::Csv | OutputFormat::ExcelCompatible => ',',
        }
    }

    pub fn line_ending(self) -> &'static str {
        match self {
            OutputFormat::ExcelCompatible => "\r\n",
            OutputFormat::Csv | OutputFormat::Tsv => "\n",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::ExcelCompatible => "csv",
        }
    }
}

const COLUMN_HEADERS: [&str; 16] = [
    "t_monotonic_ns",
    "rdt_sequence",
    "ft_sequence",
    "status",
    "Fx_counts",
    "Fy_counts",
    "Fz_counts",
    "Tx_counts",
    "Ty_counts",
    "Tz_counts",
    "Fx_N",
    "Fy_N",
    "Fz_N",
    "Tx_Nm",
    "Ty_Nm",
    "Tz_Nm",
];

pub fn column_header_line(format: OutputFormat) -> String {
    COLUMN_HEADERS.join(&format.delimiter().to_string())
}

fn format_float(v: f64) -> String {
    format!("{v:.6}")
}

/// One data row, no trailing line ending — the writer appends
/// `format.line_ending()` between rows.
pub fn format_row(format: OutputFormat, sample: &Sample) -> String {
    let sep = format.delimiter().to_string();
    let mut fields: Vec<String> = vec![sample.t_monotonic_ns.to_string(), sample.rdt_sequence.to_string(), sample.ft_sequence.to_string(), sample.status.to_string()];
    fields.extend(sample.counts.iter().map(|c| c.to_string()));

    match sample.force_n {
        Some(f) => fields.extend(f.iter().map(|v| format_float(*v))),
        None => fields.extend(std::iter::repeat(String::new()).take(3)),
    }
    match sample.torque_nm {
        Some(t) => fields.extend(t.iter().map(|v| format_float(*v))),
        None => fields.extend(std::iter::repeat(String::new()).take(3)),
    }

    fields.join(&sep)
}

#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
}

/// Full metadata header: optional BOM, `# key: value` comment lines, then
/// the column header line. Does not include a trailing line ending.
pub fn metadata_header(format: OutputFormat, calibration: Option<&Calibration>, identity: Option<&Identity>) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(id) = identity {
        if let Some(s) = &id.serial_number {
            lines.push(format!("# Serial Number: {s}"));
        }
        if let Some(f) = &id.firmware_version {
            lines.push(format!("# Firmware Version: {f}"));
        }
    }

    if let Some(cal) = calibration {
        lines.push(format!("# Counts Per Force: {}", cal.counts_per_force));
        lines.push(format!("# Counts Per Torque: {}", cal.counts_per_torque));
        if let Some(code) = cal.force_units_code {
            lines.push(format!("# Force Units Code: {code}"));
        }
        if let Some(code) = cal.torque_units_code {
            lines.push(format!("# Torque Units Code: {code}"));
        }
    }

    lines.push(column_header_line(format));

    let body = lines.join(format.line_ending());
    if format == OutputFormat::ExcelCompatible { format!("{BOM_UTF8}{body}") } else { body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_row_uses_comma_and_blanks_missing_si_values() {
        let sample = Sample::raw(1, 2, 3, 0, [10, 20, 30, 40, 50, 60]);
        let row = format_row(OutputFormat::Csv, &sample);
        assert_eq!(row, "1,2,3,0,10,20,30,40,50,60,,,,,,");
    }

    #[test]
    fn tsv_row_uses_tab_and_fixed_precision_floats() {
        let mut sample = Sample::raw(1, 2, 3, 0, [0; 6]);
        sample.force_n = Some([1.0, 2.5, -3.0]);
        sample.torque_nm = Some([0.1, 0.2, 0.3]);
        let row = format_row(OutputFormat::Tsv, &sample);
        assert!(row.contains("1.000000\t2.500000\t-3.000000"));
    }

    #[test]
    fn excel_header_has_bom_and_crlf() {
        let header = metadata_header(OutputFormat::ExcelCompatible, None, None);
        assert!(header.starts_with(BOM_UTF8));
    }

    #[test]
    fn metadata_header_includes_calibration_comments() {
        let cal = Calibration::new(1_000_000.0, 1_000_000.0);
        let header = metadata_header(OutputFormat::Csv, Some(&cal), None);
        assert!(header.contains("# Counts Per Force: 1000000"));
        assert!(header.ends_with(&column_header_line(OutputFormat::Csv)));
    }
}
