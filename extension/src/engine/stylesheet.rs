// Injected stylesheet for the generated background
// Root carries the image; everything else goes transparent except functional elements and their contents

/// Id of the single <style> element owned by the engine.
pub const STYLE_ELEMENT_ID: &str = "ai-background-shifter-style";

/// Elements that keep their natural background (media, form controls, popups, code, icons, cards).
pub const FUNCTIONAL_SELECTORS: &[&str] = &[
    "img",
    "picture",
    "video",
    "canvas",
    "svg",
    "iframe",
    "input",
    "textarea",
    "select",
    "option",
    "button",
    "[role=\"button\"]",
    "[role=\"menu\"]",
    "[role=\"menuitem\"]",
    "[role=\"listbox\"]",
    "[role=\"dialog\"]",
    "[role=\"tooltip\"]",
    "pre",
    "code",
    "[class*=\"icon\"]",
    "[class*=\"menu\"]",
    "[class*=\"dropdown\"]",
    "[class*=\"popup\"]",
    "[class*=\"popover\"]",
    "[class*=\"tooltip\"]",
    "[class*=\"modal\"]",
    "[class*=\"card\"]",
];

const READABILITY_SHADOW: &str = "0 1px 2px rgba(0, 0, 0, 0.8), 0 0 8px rgba(0, 0, 0, 0.5)";

/// CSS `url("...")` with the string escaped for a double-quoted token.
pub fn css_url(image_url: &str) -> String {
    let mut escaped = String::with_capacity(image_url.len() + 7);
    escaped.push_str("url(\"");
    for ch in image_url.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\a "),
            '\r' => escaped.push_str("\\d "),
            _ => escaped.push(ch),
        }
    }
    escaped.push_str("\")");
    escaped
}

pub fn build_stylesheet(image_url: &str) -> String {
    let functional = FUNCTIONAL_SELECTORS.join(", ");
    let url = css_url(image_url);

    format!(
        r#"html {{
  background-image: {url} !important;
  background-size: cover !important;
  background-position: center center !important;
  background-repeat: no-repeat !important;
  background-attachment: fixed !important;
}}
body {{
  background: transparent !important;
  background-color: transparent !important;
  background-image: none !important;
}}
body *:not({functional}):not(:is({functional}) *) {{
  background-color: transparent !important;
  background-image: none !important;
  text-shadow: {READABILITY_SHADOW} !important;
}}
:is({functional}) {{
  background-color: revert !important;
  background-image: revert !important;
  text-shadow: none !important;
}}
"#
    )
}
