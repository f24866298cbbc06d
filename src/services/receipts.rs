//! PDF rendering of order receipts.
//!
//! Receipts are a single US-letter page of text drawn with the standard
//! Helvetica faces, so the document needs no embedded fonts and is written
//! directly as PDF 1.4 objects.

use crate::services::orders::Receipt;
use rust_decimal::Decimal;
use std::fmt::Write as _;

pub const COMPANY_NAME: &str = "K-TO-DRINKS TRADING";
pub const FOOTER_TEXT: &str = "Thank you for your business!";

const INCH: f32 = 72.0;
const PAGE_WIDTH: f32 = 8.5 * INCH;
const PAGE_HEIGHT: f32 = 11.0 * INCH;
const ROW_HEIGHT: f32 = 15.0;
/// Left edge of the product, size, quantity, unit price and total columns.
const COLUMNS: [f32; 5] = [1.0 * INCH, 3.0 * INCH, 4.0 * INCH, 5.0 * INCH, 6.0 * INCH];

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }
}

/// Content stream builder for one page.
#[derive(Default)]
struct Page {
    ops: String,
}

impl Page {
    fn text(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        let _ = writeln!(
            self.ops,
            "BT /{} {} Tf {:.2} {:.2} Td ({}) Tj ET",
            font.resource(),
            size,
            x,
            y,
            escape(text)
        );
    }

    fn rule(&mut self, x1: f32, x2: f32, y: f32) {
        let _ = writeln!(self.ops, "{:.2} {:.2} m {:.2} {:.2} l S", x1, y, x2, y);
    }
}

/// Escapes a string for a PDF literal. Characters outside printable ASCII
/// are replaced since the standard fonts use WinAnsi encoding.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ => out.push('?'),
        }
    }
    out
}

fn money(amount: Decimal) -> String {
    format!("PHP {:.2}", amount.round_dp(2))
}

fn draw_receipt(receipt: &Receipt) -> Page {
    let mut page = Page::default();

    page.text(Font::Bold, 16.0, INCH, 10.0 * INCH, COMPANY_NAME);
    page.text(Font::Regular, 12.0, INCH, 9.7 * INCH, "Order Receipt");

    page.text(
        Font::Bold,
        12.0,
        INCH,
        9.3 * INCH,
        &format!("Order ID: {}", receipt.order_id),
    );
    page.text(Font::Regular, 10.0, INCH, 9.0 * INCH, &format!("Date: {}", receipt.date));
    page.text(Font::Regular, 10.0, INCH, 8.6 * INCH, &format!("Store: {}", receipt.store_name));
    page.text(
        Font::Regular,
        10.0,
        INCH,
        8.3 * INCH,
        &format!("Location: {}", receipt.store_location),
    );
    page.text(
        Font::Regular,
        10.0,
        INCH,
        8.0 * INCH,
        &format!("Contact: {}", receipt.store_contact),
    );

    let mut y = 7.5 * INCH;
    for (x, header) in COLUMNS
        .iter()
        .zip(["Product", "Size", "Quantity", "Unit Price", "Total"])
    {
        page.text(Font::Bold, 10.0, *x, y, header);
    }
    page.rule(COLUMNS[0], 7.0 * INCH, y - 4.0);

    for line in &receipt.lines {
        y -= ROW_HEIGHT;
        let cells = [
            line.product.clone(),
            line.size.clone(),
            line.quantity.to_string(),
            money(line.unit_price),
            money(line.total),
        ];
        for (x, cell) in COLUMNS.iter().zip(cells.iter()) {
            page.text(Font::Regular, 10.0, *x, y, cell);
        }
    }
    page.rule(COLUMNS[0], 7.0 * INCH, y - 4.0);

    for (label, amount) in [
        ("Subtotal:", receipt.totals.subtotal),
        ("Tax:", receipt.totals.tax),
        ("Total:", receipt.totals.total),
    ] {
        y -= ROW_HEIGHT;
        page.text(Font::Bold, 10.0, COLUMNS[3], y, label);
        page.text(Font::Bold, 10.0, COLUMNS[4], y, &money(amount));
    }

    page.text(Font::Italic, 8.0, INCH, 1.0 * INCH, FOOTER_TEXT);
    page.text(Font::Italic, 8.0, INCH, 0.8 * INCH, COMPANY_NAME);
    page
}

/// Serializes numbered objects with a cross-reference table.
fn assemble(objects: &[String]) -> Vec<u8> {
    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());

    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{}\nendobj\n", index + 1, body);
    }

    let xref_at = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in &offsets {
        let _ = write!(out, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    );
    out.into_bytes()
}

/// Renders a receipt as a one-page PDF document.
pub fn render_receipt_pdf(receipt: &Receipt) -> Vec<u8> {
    let content = draw_receipt(receipt).ops;

    let objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 5 0 R /F2 6 0 R /F3 7 0 R >> >> \
             /Contents 4 0 R >>",
            PAGE_WIDTH, PAGE_HEIGHT
        ),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Oblique /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    assemble(&objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::orders::{OrderTotals, ReceiptLine};
    use rust_decimal_macros::dec;

    fn receipt() -> Receipt {
        Receipt {
            order_id: "ORD-1A2B3C4D".into(),
            date: "2024-03-01 09:30:00".into(),
            store_name: "Sari-Sari (Main)".into(),
            store_location: "Quezon City".into(),
            store_contact: "0917-000-0000".into(),
            lines: vec![ReceiptLine {
                product: "Cola".into(),
                size: "1.5L".into(),
                quantity: 2,
                unit_price: dec!(60),
                total: dec!(120),
            }],
            totals: OrderTotals::from_line_totals([dec!(120)], dec!(0.02)),
        }
    }

    #[test]
    fn document_has_header_trailer_and_text() {
        let pdf = render_receipt_pdf(&receipt());
        let text = String::from_utf8(pdf).unwrap();

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains(COMPANY_NAME));
        assert!(text.contains(FOOTER_TEXT));
        assert!(text.contains("(Order ID: ORD-1A2B3C4D)"));
        assert!(text.contains("PHP 122.40"));
        // parentheses in text are escaped
        assert!(text.contains("Sari-Sari \\(Main\\)"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let pdf = render_receipt_pdf(&receipt());
        let text = String::from_utf8(pdf).unwrap();

        // `startxref` also ends in "xref", so anchor on the line start
        let xref = text.rfind("\nxref\n").unwrap() + 1;
        let mut table = text[xref..].lines().skip(1);
        let size: usize = table
            .next()
            .and_then(|header| header.strip_prefix("0 "))
            .unwrap()
            .parse()
            .unwrap();
        let entries: Vec<usize> = table
            .skip(1)
            .take(size - 1)
            .map(|line| line[..10].parse().unwrap())
            .collect();
        assert!(entries.len() >= 5);
        for (index, offset) in entries.iter().enumerate() {
            assert!(text[*offset..].starts_with(&format!("{} 0 obj", index + 1)));
        }

        let startxref: usize = text
            .lines()
            .skip_while(|l| *l != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(startxref, xref);
    }

    #[test]
    fn non_ascii_is_replaced() {
        assert_eq!(escape("₱10"), "?10");
        assert_eq!(escape("a\\b"), "a\\\\b");
    }
}
