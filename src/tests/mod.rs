pub mod common;

mod server_routes;
mod signed_requests;
