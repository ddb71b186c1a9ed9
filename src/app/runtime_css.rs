use gtk4::CssProvider;

use crate::geometry::Color;

const PIN_CORNER_RADIUS: u16 = 6;
const CONTROL_RADIUS: u16 = 8;
const TOAST_RADIUS: u16 = 10;
const HOVER_FADE_MS: u16 = 150;

fn runtime_css() -> String {
    format!(
        "
window.pinshot-pin,
window.pinshot-overlay,
window.pinshot-toast {{
  background: transparent;
}}
.pinshot-pin .pin-surface {{
  border-radius: {PIN_CORNER_RADIUS}px;
  box-shadow: 0 4px 16px rgba(0, 0, 0, 0.28);
}}
.pinshot-pin .pin-controls,
.pinshot-pin .pin-palette {{
  margin: 6px;
  padding: 2px 4px;
  border-radius: {CONTROL_RADIUS}px;
  background: rgba(28, 28, 30, 0.72);
  transition: opacity {HOVER_FADE_MS}ms ease-out;
}}
.pinshot-pin .pin-controls button,
.pinshot-pin .pin-palette button {{
  min-width: 24px;
  min-height: 24px;
  padding: 2px;
  color: #ffffff;
  background: transparent;
  border: none;
  box-shadow: none;
}}
.pinshot-pin .pin-controls button:hover,
.pinshot-pin .pin-palette button:hover,
.pinshot-pin .pin-controls button:checked {{
  background: rgba(255, 255, 255, 0.18);
}}
.pinshot-pin .pin-controls scale {{
  min-width: 96px;
}}
.pinshot-pin .pin-swatch {{
  min-width: 16px;
  min-height: 16px;
  border-radius: 8px;
  border: 2px solid rgba(255, 255, 255, 0.6);
}}
.pinshot-pin .pin-swatch.active {{
  border-color: #ffffff;
}}
.toast-badge {{
  padding: 8px 16px;
  border-radius: {TOAST_RADIUS}px;
  background: rgba(28, 28, 30, 0.86);
  color: #ffffff;
  font-weight: 600;
}}
"
    )
}

pub(super) fn swatch_class(index: usize) -> String {
    format!("swatch-{index}")
}

/// Background rule for the palette swatch at `index`.
pub(super) fn swatch_css(index: usize, color: Color) -> String {
    format!(
        ".pinshot-pin .pin-swatch.{} {{ background: rgba({}, {}, {}, {:.3}); }}\n",
        swatch_class(index),
        color.r,
        color.g,
        color.b,
        f64::from(color.a) / 255.0
    )
}

pub(super) fn install_runtime_css(extra: &str) {
    let Some(display) = gtk4::gdk::Display::default() else {
        tracing::warn!("no display available; skipping runtime css");
        return;
    };
    let provider = CssProvider::new();
    provider.load_from_data(&format!("{}{extra}", runtime_css()));
    gtk4::style_context_add_provider_for_display(
        &display,
        &provider,
        gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );
}
