pub mod rest;
pub mod state;

// Re-export the handlers so the binary can build the router without
// spelling out the module path for each one.
pub use rest::{
    get_page_handler, get_prefs_handler, get_progress_handler, get_references_handler,
    interpretation_handler, list_surahs_handler, put_prefs_handler, toggle_ayah_handler,
    toggle_page_handler,
};
