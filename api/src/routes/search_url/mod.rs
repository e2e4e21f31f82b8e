pub mod search_url_request;
pub mod search_url_route;
