pub mod response;

pub use response::ResponseBuilder;
