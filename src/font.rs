use crate::model::TextStyle;

/// SVG family plus the cap-height fraction of the em square. DWG text
/// height measures capital letters, SVG font-size measures the em, so
/// `font-size = height / cap_height_ratio`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontInfo {
    pub family: &'static str,
    pub cap_height_ratio: f64,
}

/// Map a text style's font file to a display family by case-insensitive
/// substring match. SHX fonts and unresolved styles fall back to Courier.
pub fn resolve_font(style: Option<&TextStyle>) -> FontInfo {
    let file = match style {
        Some(style) if !style.font_file.is_empty() => style.font_file.to_ascii_lowercase(),
        _ => String::new(),
    };
    if file.contains(".ttf") {
        if file.contains("arial") {
            FontInfo {
                family: "Arial",
                cap_height_ratio: 0.716,
            }
        } else if file.contains("times") {
            FontInfo {
                family: "Times New Roman",
                cap_height_ratio: 0.662,
            }
        } else if file.contains("swissek") {
            // Swiss 721 Black Extended (swissek.ttf)
            FontInfo {
                family: "Swis721 BlkEx BT, Helvetica, Arial",
                cap_height_ratio: 0.716,
            }
        } else if file.contains("swiss") {
            // Swiss 721 (swiss.ttf)
            FontInfo {
                family: "Swis721 BT, Helvetica, Arial",
                cap_height_ratio: 0.716,
            }
        } else if file.contains("lucon") {
            FontInfo {
                family: "Lucida Console",
                cap_height_ratio: 0.692,
            }
        } else {
            FontInfo {
                family: "Verdana",
                cap_height_ratio: 0.727,
            }
        }
    } else {
        FontInfo {
            family: "Courier",
            cap_height_ratio: 0.616,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(font_file: &str) -> TextStyle {
        TextStyle {
            name: "STANDARD".to_string(),
            font_file: font_file.to_string(),
            width_factor: 1.0,
        }
    }

    #[test]
    fn known_ttf_families() {
        assert_eq!(resolve_font(Some(&style("Arial.TTF"))).family, "Arial");
        assert_eq!(
            resolve_font(Some(&style("times.ttf"))).family,
            "Times New Roman"
        );
        assert_eq!(
            resolve_font(Some(&style("SWISSEK.ttf"))).family,
            "Swis721 BlkEx BT, Helvetica, Arial"
        );
        assert_eq!(
            resolve_font(Some(&style("swiss.ttf"))).family,
            "Swis721 BT, Helvetica, Arial"
        );
        assert_eq!(
            resolve_font(Some(&style("lucon.ttf"))).family,
            "Lucida Console"
        );
    }

    #[test]
    fn unknown_ttf_is_verdana() {
        let info = resolve_font(Some(&style("comicsans.ttf")));
        assert_eq!(info.family, "Verdana");
        assert!((info.cap_height_ratio - 0.727).abs() < 1e-9);
    }

    #[test]
    fn shx_and_missing_fall_back_to_courier() {
        assert_eq!(resolve_font(Some(&style("txt.shx"))).family, "Courier");
        assert_eq!(resolve_font(Some(&style(""))).family, "Courier");
        assert_eq!(resolve_font(None).family, "Courier");
    }
}
