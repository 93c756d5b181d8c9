//! Minimal HTTP/1.1 framing for the configuration service.
//!
//! Only what the service needs: the request line, `Content-Length`, and a
//! `Connection: close` response head.

use core::fmt::Write;

use heapless::String;

/// Header slots handed to the parser; browsers rarely send more.
pub const MAX_HEADERS: usize = 24;

/// Capacity of a formatted response head.
pub const RESPONSE_HEAD_CAPACITY: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Method {
    Get,
    Post,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    /// The head is not terminated yet; read more.
    Incomplete,
    Malformed,
    BadContentLength,
}

/// Parsed request line and the headers the service cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHead<'b> {
    pub method: Method,
    /// Path without query string.
    pub path: &'b str,
    pub content_length: usize,
    /// Bytes of `buf` taken by the head; the body starts here.
    pub head_len: usize,
}

pub fn parse_head(buf: &[u8]) -> Result<RequestHead<'_>, RequestError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);

    let head_len = match request.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Err(RequestError::Incomplete),
        Err(_) => return Err(RequestError::Malformed),
    };

    let method = match request.method {
        Some("GET") => Method::Get,
        Some("POST") => Method::Post,
        Some(_) => Method::Other,
        None => return Err(RequestError::Malformed),
    };

    let path = request.path.ok_or(RequestError::Malformed)?;
    let path = path.split('?').next().unwrap_or(path);

    let mut content_length = 0;
    for header in request.headers.iter() {
        if header.name.eq_ignore_ascii_case("content-length") {
            content_length = core::str::from_utf8(header.value)
                .ok()
                .and_then(|value| value.trim().parse().ok())
                .ok_or(RequestError::BadContentLength)?;
        }
    }

    Ok(RequestHead {
        method,
        path,
        content_length,
        head_len,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl Status {
    pub const fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::InternalServerError => 500,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

/// Formats a complete response head, blank line included.
pub fn response_head(
    status: Status,
    content_type: Option<&str>,
    content_length: usize,
) -> Result<String<RESPONSE_HEAD_CAPACITY>, core::fmt::Error> {
    let mut head = String::new();
    write!(head, "HTTP/1.1 {} {}\r\n", status.code(), status.reason())?;
    if let Some(content_type) = content_type {
        write!(head, "Content-Type: {}\r\n", content_type)?;
    }
    write!(
        head,
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        content_length
    )?;
    Ok(head)
}
