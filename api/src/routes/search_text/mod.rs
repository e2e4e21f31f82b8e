pub mod search_text_request;
pub mod search_text_route;
