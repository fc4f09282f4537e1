//! # HTTP/1.1
//!
//! Request parsing and response writing for the single-request HTTP path.
//!
//! - [`HttpMessageReader`] reads a head under the header-size limit, then a
//!   `Content-Length` or chunked body under the body-size limit
//! - [`Response`] and [`FileResponse`] always close the connection after
//!   writing
//! - [`ResponsePolicy`] adds CORS and `X-Frame-Options` headers

pub mod error;
pub mod file;
pub mod policy;
pub mod reader;
pub mod request;
pub mod response;

pub use error::{HttpError, HttpResult};
pub use file::{content_type_for, Disposition, FileResponse, HttpReply};
pub use policy::ResponsePolicy;
pub use reader::HttpMessageReader;
pub use request::{HttpHeaders, Request};
pub use response::{escape_html, status_line, HeaderList, Response, ResponseBuilder};
