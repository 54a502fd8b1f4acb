//! Text measurement for the built-in Helvetica faces.
//!
//! Widths are the standard AFM advance widths (1/1000 em) for the printable
//! ASCII range. Layout only ever sees sanitized text, so every character it
//! measures is in the table.

/// Points to millimetres.
pub const PT_TO_MM: f32 = 25.4 / 72.0;

/// Baseline-to-baseline distance as a multiple of the font size.
pub const LINE_SPACING: f32 = 1.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

fn advance(c: char, font: Font) -> u16 {
    let table = match font {
        Font::Regular => &HELVETICA,
        Font::Bold => &HELVETICA_BOLD,
    };
    let code = c as u32;
    if (32..=126).contains(&code) {
        table[(code - 32) as usize]
    } else {
        // '?' is what sanitize substitutes.
        table[('?' as u32 - 32) as usize]
    }
}

#[must_use]
pub fn text_width_mm(text: &str, size_pt: f32, font: Font) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(advance(c, font))).sum();
    units as f32 / 1000.0 * size_pt * PT_TO_MM
}

#[must_use]
pub fn line_height_mm(size_pt: f32) -> f32 {
    size_pt * PT_TO_MM * LINE_SPACING
}

/// Maps text onto the printable ASCII range the built-in fonts can draw.
#[must_use]
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' '..='~' => out.push(c),
            '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2022}' | '\u{00B7}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{20B9}' => out.push_str("Rs."),
            '\t' | '\n' | '\r' | '\u{00A0}' => out.push(' '),
            _ => out.push('?'),
        }
    }
    out
}

/// Greedy word wrap. Words wider than the line are broken by character.
#[must_use]
pub fn wrap(text: &str, max_width_mm: f32, size_pt: f32, font: Font) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width_mm(&candidate, size_pt, font) <= max_width_mm {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if text_width_mm(word, size_pt, font) <= max_width_mm {
            current = word.to_string();
        } else {
            let mut pieces = break_word(word, max_width_mm, size_pt, font);
            current = pieces.pop().unwrap_or_default();
            lines.extend(pieces);
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn break_word(word: &str, max_width_mm: f32, size_pt: f32, font: Font) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in word.chars() {
        piece.push(c);
        if piece.chars().count() > 1 && text_width_mm(&piece, size_pt, font) > max_width_mm {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(c);
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        // "Hello" = 722 + 556 + 222 + 222 + 556 = 2278 units
        let expected = 2.278 * 10.0 * PT_TO_MM;
        assert!((text_width_mm("Hello", 10.0, Font::Regular) - expected).abs() < 1e-4);
        assert!(text_width_mm("Hello", 10.0, Font::Bold) > text_width_mm("Hello", 10.0, Font::Regular));
    }

    #[test]
    fn test_wrap_respects_width_and_keeps_every_word() {
        let text = "The allottee shall pay the balance sale consideration as per the payment plan opted for at the time of booking";
        let lines = wrap(text, 60.0, 10.0, Font::Regular);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width_mm(line, 10.0, Font::Regular) <= 60.0, "{line}");
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_overlong_word_is_broken() {
        let word = "X".repeat(80);
        let lines = wrap(&word, 30.0, 10.0, Font::Regular);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
        for line in &lines {
            assert!(text_width_mm(line, 10.0, Font::Regular) <= 30.0);
        }
    }

    #[test]
    fn test_empty_text_yields_one_empty_line() {
        assert_eq!(wrap("   ", 50.0, 10.0, Font::Regular), vec![String::new()]);
    }

    #[test]
    fn test_sanitize_maps_typographic_characters() {
        assert_eq!(sanitize("\u{20B9} 5,000 \u{2013} buyer\u{2019}s"), "Rs. 5,000 - buyer's");
        assert_eq!(sanitize("caf\u{00E9}"), "caf?");
    }
}
