//! Configuration service endpoints.
//!
//! | Method | Path | Body | Effect |
//! |---|---|---|---|
//! | GET | `/` | | UI page |
//! | GET | `/tracking-values` | | `{"balance":N,"gain":N}` from storage |
//! | POST | `/tracking-values` | `[balance, gain]` LE u16 | persist, apply, push to the controller |
//! | POST | `/commands` | count LE u16, then count LE u16 words | send each word, 100 ms apart |
//! | POST | `/restart` | | reset after responding |
//!
//! The service is transport independent: the firmware feeds it a parsed
//! route and the request body, and drives the bus through a [`CommandSink`].

use core::time::Duration;

use embedded_storage::nor_flash::NorFlash;
use heapless::String;

use crate::http::{Method, Status};
use crate::overrides::{TrackingOverrides, TrackingValues};
use crate::storage::{StoreError, TrackingStore};

/// Largest command batch accepted by `POST /commands`.
pub const MAX_COMMANDS: usize = 512;

/// Pause between two commands of a batch.
pub const COMMAND_INTERVAL: Duration = Duration::from_millis(100);

/// Room for `{"balance":65535,"gain":65535}`.
pub const JSON_CAPACITY: usize = 48;

pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    Index,
    GetTrackingValues,
    PostTrackingValues,
    PostCommands,
    Restart,
}

impl Route {
    /// Resolves a request line, or the status to reject it with.
    pub fn resolve(method: Method, path: &str) -> Result<Self, Status> {
        match (path, method) {
            ("/", Method::Get) => Ok(Route::Index),
            ("/tracking-values", Method::Get) => Ok(Route::GetTrackingValues),
            ("/tracking-values", Method::Post) => Ok(Route::PostTrackingValues),
            ("/commands", Method::Post) => Ok(Route::PostCommands),
            ("/restart", Method::Post) => Ok(Route::Restart),
            ("/" | "/tracking-values" | "/commands" | "/restart", _) => {
                Err(Status::MethodNotAllowed)
            }
            _ => Err(Status::NotFound),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceError {
    /// Body ended before the declared or required length.
    ShortBody,
    TooManyCommands(u16),
    Storage(StoreError),
    Encode,
}

impl ServiceError {
    pub const fn status(self) -> Status {
        match self {
            ServiceError::TooManyCommands(_) => Status::BadRequest,
            ServiceError::ShortBody | ServiceError::Storage(_) | ServiceError::Encode => {
                Status::InternalServerError
            }
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Storage(err)
    }
}

/// Outbound side of the service: the servo controller bus.
pub trait CommandSink {
    /// Sends one word and latches it.
    fn send(&mut self, word: u16);

    /// Waits without blocking the executor.
    async fn pause(&mut self, duration: Duration);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Static(&'static [u8]),
    Json(String<JSON_CAPACITY>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Static(bytes) => bytes,
            Body::Json(json) => json.as_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: Option<&'static str>,
    pub body: Body,
    /// Reset the device once the response is on the wire.
    pub restart: bool,
}

impl Response {
    pub const fn empty(status: Status) -> Self {
        Self {
            status,
            content_type: None,
            body: Body::Empty,
            restart: false,
        }
    }

    fn from_result(result: Result<(), ServiceError>) -> Self {
        match result {
            Ok(()) => Self::empty(Status::Ok),
            Err(err) => Self::empty(err.status()),
        }
    }
}

pub struct ConfigService<'a, F> {
    store: TrackingStore<F>,
    overrides: &'a TrackingOverrides,
    index: &'static [u8],
}

impl<'a, F: NorFlash> ConfigService<'a, F> {
    pub fn new(
        store: TrackingStore<F>,
        overrides: &'a TrackingOverrides,
        index: &'static [u8],
    ) -> Self {
        Self {
            store,
            overrides,
            index,
        }
    }

    pub async fn handle<S: CommandSink>(
        &mut self,
        route: Route,
        body: &[u8],
        sink: &mut S,
    ) -> Response {
        match route {
            Route::Index => Response {
                status: Status::Ok,
                content_type: Some(CONTENT_TYPE_HTML),
                body: Body::Static(self.index),
                restart: false,
            },
            Route::GetTrackingValues => match self.tracking_values_json() {
                Ok(json) => Response {
                    status: Status::Ok,
                    content_type: Some(CONTENT_TYPE_JSON),
                    body: Body::Json(json),
                    restart: false,
                },
                Err(err) => Response::empty(err.status()),
            },
            Route::PostTrackingValues => {
                Response::from_result(self.update_tracking_values(body, sink).map(|_| ()))
            }
            Route::PostCommands => Response::from_result(run_commands(body, sink).await),
            Route::Restart => Response {
                restart: true,
                ..Response::empty(Status::Ok)
            },
        }
    }

    /// Stored values as JSON; unreadable or missing storage reads as zeros.
    pub fn tracking_values_json(&mut self) -> Result<String<JSON_CAPACITY>, ServiceError> {
        let values = self
            .store
            .read()
            .ok()
            .flatten()
            .unwrap_or(TrackingValues {
                balance: 0,
                gain: 0,
            });

        serde_json_core::to_string(&values).map_err(|_| ServiceError::Encode)
    }

    /// Persists and applies a `[balance, gain]` body.
    ///
    /// Both values replace the live overrides (zero disables one). Every
    /// non-zero value is also pushed to the controller right away instead of
    /// waiting for the host to send that command again.
    pub fn update_tracking_values<S: CommandSink>(
        &mut self,
        body: &[u8],
        sink: &mut S,
    ) -> Result<TrackingValues, ServiceError> {
        let bytes: [u8; 4] = body
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(ServiceError::ShortBody)?;
        let values = TrackingValues::from_le_bytes(bytes);

        self.store.write(values)?;
        self.overrides.store(values);

        for (_, value) in values.active() {
            sink.send(value);
        }

        Ok(values)
    }
}

/// Validates a `POST /commands` body and returns its words.
pub fn parse_commands(body: &[u8]) -> Result<impl Iterator<Item = u16> + '_, ServiceError> {
    let count = body
        .get(..2)
        .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
        .ok_or(ServiceError::ShortBody)?;

    if usize::from(count) > MAX_COMMANDS {
        return Err(ServiceError::TooManyCommands(count));
    }

    let words = body
        .get(2..2 + 2 * usize::from(count))
        .ok_or(ServiceError::ShortBody)?;

    Ok(words
        .chunks_exact(2)
        .map(|word| u16::from_le_bytes([word[0], word[1]])))
}

/// Sends a command batch with [`COMMAND_INTERVAL`] after every word.
pub async fn run_commands<S: CommandSink>(body: &[u8], sink: &mut S) -> Result<(), ServiceError> {
    for word in parse_commands(body)? {
        sink.send(word);
        sink.pause(COMMAND_INTERVAL).await;
    }
    Ok(())
}
