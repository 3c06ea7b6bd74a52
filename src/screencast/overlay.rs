use std::fmt;

/// Fewest tokens a recognized diagnostics overlay can have
pub const MIN_TOKENS: usize = 5;

/// Phone numbers are the only tokens longer than this
const PHONE_MIN_CHARS: usize = 9;

/// Cell identifiers shorter than this are OCR fragments
const CELL_ID_MIN_DIGITS: usize = 6;

/// Cellular attributes decoded from one recognized frame
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverlayValues {
    pub tracking_area_code: Option<u32>,
    pub band: Option<u16>,
    pub cell_id: Option<u32>,
    pub physical_cell_id: Option<u16>,
}

/// Why a frame's recognized text was discarded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecognitionGap {
    TooFewTokens(usize),
    NoPhoneAnchor,
}

impl fmt::Display for RecognitionGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionGap::TooFewTokens(n) => write!(f, "only {} tokens recognized", n),
            RecognitionGap::NoPhoneAnchor => write!(f, "no phone number token to anchor on"),
        }
    }
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// Known OCR confusions on the band digit
fn correct_band_token(token: &str) -> &str {
    match token {
        "S" => "5",
        "}" | "S)" => "3",
        other => other,
    }
}

/// Decode the overlay tokens of one frame.
///
/// The tracking area code sits at token 1. The phone number (token 3 or 4)
/// anchors the rest: band one token after it, cell id four after, physical
/// cell id five after. Non-numeric tokens at those positions leave the value
/// unset.
pub fn parse_overlay(tokens: &[String]) -> Result<OverlayValues, RecognitionGap> {
    if tokens.len() < MIN_TOKENS {
        return Err(RecognitionGap::TooFewTokens(tokens.len()));
    }

    let tac = if is_numeric(&tokens[1]) { tokens[1].parse().unwrap_or(0) } else { 0 };
    let mut values = OverlayValues {
        tracking_area_code: Some(tac),
        ..Default::default()
    };

    let phone_at = [3usize, 4]
        .into_iter()
        .find(|&i| tokens[i].chars().count() >= PHONE_MIN_CHARS)
        .ok_or(RecognitionGap::NoPhoneAnchor)?;

    for (m, raw) in tokens.iter().enumerate().skip(phone_at + 1) {
        let token = if m == phone_at + 1 { correct_band_token(raw) } else { raw.as_str() };
        if !is_numeric(token) {
            continue;
        }
        match m - phone_at {
            1 => values.band = token.parse().ok(),
            4 => {
                values.cell_id = if token.len() >= CELL_ID_MIN_DIGITS {
                    token.parse().ok()
                } else {
                    Some(0)
                }
            }
            5 => values.physical_cell_id = token.parse().ok(),
            _ => {}
        }
    }

    Ok(values)
}
