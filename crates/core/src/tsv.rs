//! Ingestion of Tesseract `image_to_data` TSV output.
//!
//! Columns: `level page_num block_num par_num line_num word_num left top width
//! height conf text`. Only word rows (level 5) carry text; page, block, paragraph
//! and line rows report a confidence of -1 and are skipped.

use crate::error::{Error, Result};
use crate::types::Token;

const WORD_LEVEL: &str = "5";
const COLUMN_COUNT: usize = 12;

/// Parse Tesseract TSV into tokens, in file order.
///
/// Confidence values are rounded to whole percent. Rows with negative or oversized
/// geometry, or a confidence above 100, are rejected with a validation error.
/// Non-integral geometry and non-finite confidence are parse errors.
pub fn parse_tesseract_tsv(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();

    for (line_no, line) in input.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with("level") {
            continue;
        }

        // The text column may itself be empty, so split at most into 12 fields.
        let fields: Vec<&str> = line.splitn(COLUMN_COUNT, '\t').collect();
        if fields.len() < COLUMN_COUNT - 1 {
            return Err(Error::TokenParse(format!(
                "line {}: expected {} columns, found {}",
                line_no + 1,
                COLUMN_COUNT,
                fields.len()
            )));
        }

        if fields[0] != WORD_LEVEL {
            continue;
        }

        let conf = parse_confidence(fields[10], line_no)?;
        if conf < 0.0 {
            continue;
        }

        let text = fields.get(11).copied().unwrap_or_default();
        let int = |idx: usize, name: &str| parse_pixels(fields[idx], name, line_no);

        let token = Token::new(
            text,
            conf.round() as i64,
            int(6, "left")?,
            int(7, "top")?,
            int(8, "width")?,
            int(9, "height")?,
        )?;
        tokens.push(token);
    }

    log::debug!("Parsed {} word tokens from TSV", tokens.len());
    Ok(tokens)
}

fn invalid(field: &str, name: &str, line_no: usize, reason: impl std::fmt::Display) -> Error {
    Error::TokenParse(format!(
        "line {}: invalid {} value '{}': {}",
        line_no + 1,
        name,
        field,
        reason
    ))
}

/// Confidence is fractional in Tesseract output, but must be a real number.
fn parse_confidence(field: &str, line_no: usize) -> Result<f64> {
    let conf = field
        .trim()
        .parse::<f64>()
        .map_err(|e| invalid(field, "conf", line_no, e))?;
    if !conf.is_finite() {
        return Err(invalid(field, "conf", line_no, "not a finite number"));
    }
    Ok(conf)
}

/// Geometry must be a whole number of pixels; fractions are not truncated.
fn parse_pixels(field: &str, name: &str, line_no: usize) -> Result<i64> {
    field
        .trim()
        .parse::<i64>()
        .map_err(|e| invalid(field, name, line_no, e))
}
