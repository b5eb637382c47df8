//! Minimal PDF writer for the print version of a report: fixed-width text,
//! A4 pages, a page footer. Only the two standard Type1 fonts are used so the
//! file needs no embedded font data.

use std::fmt::Write;

const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const MARGIN: f64 = 50.0;
const LINE_HEIGHT: f64 = 13.0;
const BODY_SIZE: f64 = 9.5;
const HEADING_SIZE: f64 = 12.0;
const WRAP_COLUMNS: usize = 92;
const LINES_PER_PAGE: usize = 56;

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Heading(String),
    Body(String),
}

/// 將 markdown 轉成可列印的 PDF
pub fn render_pdf(title: &str, markdown: &str) -> Vec<u8> {
    let pages = paginate(layout(markdown));
    write_document(title, &pages)
}

fn layout(markdown: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut in_code = false;

    for raw in markdown.lines() {
        if raw.trim_start().starts_with("```") {
            in_code = !in_code;
            continue;
        }
        let text = to_latin1(raw.trim_end());

        if !in_code && text.starts_with('#') {
            let heading = text.trim_start_matches('#').trim().to_string();
            lines.push(Line::Heading(heading));
            continue;
        }

        if text.is_empty() {
            lines.push(Line::Body(String::new()));
            continue;
        }

        // 固定寬度換行
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(WRAP_COLUMNS) {
            lines.push(Line::Body(chunk.iter().collect()));
        }
    }

    lines
}

fn paginate(lines: Vec<Line>) -> Vec<Vec<Line>> {
    let mut pages: Vec<Vec<Line>> = lines
        .chunks(LINES_PER_PAGE)
        .map(|chunk| chunk.to_vec())
        .collect();
    if pages.is_empty() {
        pages.push(Vec::new());
    }
    pages
}

fn to_latin1(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else if c == '\t' { ' ' } else { '?' })
        .collect()
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '(' | ')' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn page_stream(lines: &[Line], page: usize, total: usize) -> String {
    let mut stream = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        let (font, size, text) = match line {
            Line::Heading(text) => ("F2", HEADING_SIZE, text),
            Line::Body(text) => ("F1", BODY_SIZE, text),
        };
        if !text.is_empty() {
            let _ = writeln!(
                stream,
                "BT /{} {} Tf {} {:.1} Td ({}) Tj ET",
                font,
                size,
                MARGIN,
                y,
                escape(text)
            );
        }
        y -= LINE_HEIGHT;
    }

    let footer = format!("Page {} of {}", page, total);
    let _ = writeln!(
        stream,
        "BT /F1 8 Tf {:.1} {:.1} Td ({}) Tj ET",
        PAGE_WIDTH / 2.0 - 25.0,
        MARGIN / 2.0,
        footer
    );
    stream
}

fn write_document(title: &str, pages: &[Vec<Line>]) -> Vec<u8> {
    let total = pages.len();
    // 物件編號：1 catalog、2 pages、3/4 字型、5 info，之後每頁兩個物件
    let first_page_id = 6;
    let mut objects: Vec<String> = Vec::new();

    let kids: Vec<String> = (0..total)
        .map(|i| format!("{} 0 R", first_page_id + i * 2))
        .collect();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        total
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>".to_string());
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold >>".to_string());
    objects.push(format!(
        "<< /Title ({}) /Producer (liquidity-etl) >>",
        escape(&to_latin1(title))
    ));

    for (index, lines) in pages.iter().enumerate() {
        let content_id = first_page_id + index * 2 + 1;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH, PAGE_HEIGHT, content_id
        ));
        let stream = page_stream(lines, index + 1, total);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{}\nendobj\n", index + 1, body);
    }

    let xref_offset = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(out, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    );

    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pdf_structure() {
        let pdf = render_pdf("Pool report", "# Title\n\nSome (text) here\n");
        let text = String::from_utf8(pdf).unwrap();
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("Some \\(text\\) here"));
        assert!(text.contains("Page 1 of 1"));
    }

    #[test]
    fn test_long_report_is_paginated() {
        let markdown: String = (0..150).map(|i| format!("line {}\n", i)).collect();
        let text = String::from_utf8(render_pdf("long", &markdown)).unwrap();
        assert!(text.contains("/Count 3"));
        assert!(text.contains("Page 3 of 3"));
    }

    #[test]
    fn test_wrap_and_non_ascii() {
        let lines = layout(&format!("{}\n€uro", "x".repeat(100)));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], Line::Body("?uro".to_string()));
    }
}
