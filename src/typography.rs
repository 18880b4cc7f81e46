//! Hanging-indent width calculation (spec §4.8): a pure function from a
//! numbering marker string and a font size to a HWPUNIT width, used when a
//! table or paragraph insert needs to line text up under a list marker.
//!
//! The width is the sum of each character's own em-width, not a single
//! bucket picked for the marker as a whole — two markers of the same shape
//! but different length (e.g. `"1."` vs `"10."`) must not come out equal.

/// Per-character classification used to look up an em-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharKind {
  Bullet,
  Dash,
  Digit,
  Paren,
  CircledNumber,
  KoreanSyllable,
  RomanNumeral,
  LatinLetter,
  Period,
  Other,
}

fn classify(ch: char) -> CharKind {
  match ch {
    '•' | '·' | '○' | '●' => CharKind::Bullet,
    '-' | '–' | '—' => CharKind::Dash,
    '0'..='9' => CharKind::Digit,
    '(' | ')' => CharKind::Paren,
    '\u{2460}'..='\u{2473}' => CharKind::CircledNumber,
    '\u{AC00}'..='\u{D7A3}' => CharKind::KoreanSyllable,
    'i' | 'v' | 'x' | 'l' | 'c' | 'd' | 'm' | 'I' | 'V' | 'X' | 'L' | 'C' | 'D' | 'M' => CharKind::RomanNumeral,
    '.' => CharKind::Period,
    c if c.is_ascii_alphabetic() => CharKind::LatinLetter,
    _ => CharKind::Other,
  }
}

/// Base em-width of one character of each kind, before font-size scaling,
/// calibrated relative to a 1.0 em reference glyph width.
fn em_width(kind: CharKind) -> f64 {
  match kind {
    CharKind::Bullet => 1.0,
    CharKind::Dash => 0.8,
    CharKind::Digit => 0.6,
    CharKind::Paren => 0.5,
    CharKind::CircledNumber => 1.2,
    CharKind::KoreanSyllable => 1.0,
    CharKind::RomanNumeral => 0.5,
    CharKind::LatinLetter => 0.6,
    CharKind::Period => 0.3,
    CharKind::Other => 0.6,
  }
}

/// Korean fonts render wider glyphs than the Latin em box assumes; any
/// marker containing at least one Korean syllable gets its whole summed
/// width corrected by this factor, not just a subset of marker shapes.
const KOREAN_FONT_CORRECTION: f64 = 1.3;

/// Converts an em-based width to HWPUNIT (1/100 mm equivalent used
/// throughout HWPX geometry fields).
const HWPUNIT_SCALE: f64 = 100.0;

/// Computes the hanging-indent width, in HWPUNIT, for `marker` rendered at
/// `font_size_pt`: the sum of each character's own em-width, scaled by
/// `font_size_pt` and the Korean font correction factor, applied uniformly
/// to every marker kind rather than gated on a subset of them.
pub fn hanging_indent_width(marker: &str, font_size_pt: f64) -> i64 {
  if marker.is_empty() {
    return 0;
  }
  let em_total: f64 = marker.chars().map(|ch| em_width(classify(ch))).sum();
  let width = em_total * font_size_pt * KOREAN_FONT_CORRECTION * HWPUNIT_SCALE;
  width.round() as i64
}
