pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the REST handlers to make them easily accessible to the binary
// that will build the web server router.
pub use middleware::require_auth;
pub use rest::{
    analyze_content_requirements_handler, content_chat_handler,
    generate_comprehensive_content_handler, generate_lesson_content_handler,
    list_lesson_contents_handler, list_module_contents_handler, update_module_content_handler,
};
