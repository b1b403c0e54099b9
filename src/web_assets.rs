//! Embedded static web assets for the mdglow serve mode.
//!
//! Both files are compiled into the binary via `include_str!` so the binary
//! is fully self-contained; no external asset files need to be distributed.

/// Stylesheet for the serve-mode HTML viewer. Defines the visual meaning of
/// the `visible` and `active` flags the script toggles.
///
/// Loaded from `src/assets/mdglow.css` at compile time.
pub const CSS: &str = include_str!("assets/mdglow.css");

/// JavaScript for the serve-mode HTML viewer: the client-side mirror of the
/// visibility-activation engine (hero stagger, one-shot scroll reveal via
/// `IntersectionObserver`, TOC scroll-spy) plus the KaTeX auto-render call.
///
/// Loaded from `src/assets/mdglow.js` at compile time.
pub const JS: &str = include_str!("assets/mdglow.js");
