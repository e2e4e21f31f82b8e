pub mod search_image_route;
