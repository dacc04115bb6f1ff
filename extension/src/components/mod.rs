mod side_panel;

pub use side_panel::{validate_prompt, SidePanel};
