use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use serde::Serialize;

use crate::error::TransferError;

/// Pixel size of the SVG rendering
const SVG_SIZE: u32 = 200;

/// A rendered scannable code for a share link
#[derive(Debug, Clone, Serialize)]
pub struct ScannableCode {
    /// The encoded text, exactly as given
    pub text: String,
    /// Modules per side
    pub width: usize,
    /// Terminal rendering using half-block characters
    pub terminal: String,
    pub svg: String,
}

pub fn render_code(text: &str) -> Result<ScannableCode, TransferError> {
    let code =
        QrCode::new(text.as_bytes()).map_err(|e| TransferError::CodeRender(e.to_string()))?;

    let terminal = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    let svg = code
        .render::<svg::Color>()
        .min_dimensions(SVG_SIZE, SVG_SIZE)
        .build();

    Ok(ScannableCode {
        text: text.to_string(),
        width: code.width(),
        terminal,
        svg,
    })
}

#[cfg(test)]
mod tests {
    use super::render_code;

    #[test]
    fn render_code_keeps_text_and_produces_both_renderings() {
        let code = render_code("https://x/abc").unwrap();
        assert_eq!(code.text, "https://x/abc");
        assert!(code.width >= 21);
        assert!(code.svg.contains("<svg"));
        assert!(code.terminal.lines().count() > code.width / 2);
    }
}
