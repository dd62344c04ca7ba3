//! Reading surface: vocabulary highlighting and the word popup

pub mod highlight;
pub mod popup;
pub mod surface;

pub use highlight::{highlight, Fragment, Highlighter};
pub use popup::{ActivePopup, ClickTarget, PopupActivation, PopupAnchor, Rect, WordPopupController};
pub use surface::{ReadingSurface, SurfaceFragment, SurfaceSegment};
