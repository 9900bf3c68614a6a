//! Reading-order reconstruction for positioned OCR lines.
//!
//! OCR backends return lines in detection order, which rarely matches
//! how a human reads the page. This pass clusters boxes into visual rows
//! using the median line height as a vertical tolerance, then emits rows
//! top-to-bottom with their boxes ordered left-to-right.

use super::OcrLine;

/// Convert positioned lines into a reading-order string.
///
/// Rows are separated by newlines; boxes within a row by single spaces.
/// When no usable box heights exist, falls back to a simple (top, left)
/// sort.
pub fn lines_to_text(mut lines: Vec<OcrLine>) -> String {
    if lines.is_empty() {
        return String::new();
    }

    let heights: Vec<f32> = lines
        .iter()
        .map(|l| (l.bbox[3] - l.bbox[1]) as f32)
        .filter(|h| *h > 0.0)
        .collect();

    if heights.is_empty() {
        tracing::warn!("No usable line heights, using simple sort for reading order");
        lines.sort_by_key(|l| (l.bbox[1], l.bbox[0]));
        return lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
    }

    let y_tolerance = median(heights) * 0.7;
    lines.sort_by_key(|l| l.bbox[1]);

    let mut rows: Vec<String> = Vec::new();
    let mut current: Vec<&OcrLine> = Vec::new();
    let mut current_ref_y = f32::MIN;

    for line in &lines {
        let top = line.bbox[1] as f32;
        if current.is_empty() || (top - current_ref_y).abs() > y_tolerance {
            if !current.is_empty() {
                rows.push(flush_row(&mut current));
            }
            current.push(line);
            current_ref_y = top;
        } else {
            current.push(line);
            current_ref_y = current_ref_y.min(top);
        }
    }
    if !current.is_empty() {
        rows.push(flush_row(&mut current));
    }

    rows.join("\n")
}

/// Sort a row's boxes left-to-right and join their texts.
fn flush_row(row: &mut Vec<&OcrLine>) -> String {
    row.sort_by_key(|l| l.bbox[0]);
    let text = row
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    row.clear();
    text
}

fn median(mut values: Vec<f32>) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, bbox: [i32; 4]) -> OcrLine {
        OcrLine {
            text: text.to_string(),
            bbox,
            confidence: 90.0,
        }
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(lines_to_text(Vec::new()), "");
    }

    #[test]
    fn rows_emit_top_to_bottom() {
        let lines = vec![
            line("Total: $10", [10, 200, 120, 220]),
            line("INVOICE", [10, 10, 120, 30]),
            line("Date: 2025-05-01", [10, 100, 160, 120]),
        ];
        assert_eq!(
            lines_to_text(lines),
            "INVOICE\nDate: 2025-05-01\nTotal: $10"
        );
    }

    #[test]
    fn boxes_on_same_row_order_left_to_right() {
        // Two columns at nearly the same y, right column detected first
        let lines = vec![
            line("$1,234.56", [400, 101, 500, 121]),
            line("Total Amount:", [10, 100, 150, 120]),
            line("Footer", [10, 400, 80, 420]),
        ];
        assert_eq!(
            lines_to_text(lines),
            "Total Amount: $1,234.56\nFooter"
        );
    }

    #[test]
    fn degenerate_boxes_fall_back_to_simple_sort() {
        let lines = vec![
            line("second", [0, 50, 10, 50]),
            line("first", [0, 10, 10, 10]),
        ];
        assert_eq!(lines_to_text(lines), "first\nsecond");
    }

    #[test]
    fn median_of_even_count_averages_middles() {
        assert!((median(vec![10.0, 20.0, 30.0, 40.0]) - 25.0).abs() < f32::EPSILON);
        assert!((median(vec![10.0, 20.0, 30.0]) - 20.0).abs() < f32::EPSILON);
    }
}
