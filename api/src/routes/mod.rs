pub mod count_field;
pub mod health_route;
pub mod search_image;
pub mod search_text;
pub mod search_url;
