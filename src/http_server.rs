//! HTTP transport for the configuration service.
//!
//! One connection at a time: read the head, read the body up to
//! `Content-Length`, hand both to [`ConfigService`], write the response and
//! close. A restart request resets the MCU after the response is flushed.

use cortex_m::peripheral::SCB;
use embassy_net::Stack;
use embassy_net::tcp::{self, TcpSocket};
use embassy_stm32::flash::{Blocking, Flash};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write;
use tracking_core::http::{RequestError, Status, parse_head, response_head};
use tracking_core::service::{ConfigService, Response, Route};

use crate::intercept::{BusSink, PausedBusFlash};

/// Configuration service backed by the on-chip flash.
pub type Service = ConfigService<'static, PausedBusFlash<Flash<'static, Blocking>>>;

pub const HTTP_PORT: u16 = 80;

/// Request head and body must fit here together.
const REQUEST_CAPACITY: usize = 2048;

const SOCKET_BUFFER: usize = 1024;

/// Idle connections are dropped after this long.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// Time for the host to receive the response before a restart.
const RESTART_GRACE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
enum ServeError {
    Tcp(tcp::Error),
    /// Response head did not fit its buffer.
    Format,
}

impl From<tcp::Error> for ServeError {
    fn from(err: tcp::Error) -> Self {
        ServeError::Tcp(err)
    }
}

/// Async task serving the configuration service on [`HTTP_PORT`].
///
/// # Arguments
///
/// * `stack` - Network stack the socket is opened on
/// * `service` - Configuration service, owned by this task
#[embassy_executor::task]
pub async fn http_task(stack: Stack<'static>, mut service: Service) -> ! {
    let mut rx_buffer = [0u8; SOCKET_BUFFER];
    let mut tx_buffer = [0u8; SOCKET_BUFFER];
    let mut request = [0u8; REQUEST_CAPACITY];
    let mut sink = BusSink;

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        if let Err(err) = socket.accept(HTTP_PORT).await {
            defmt::warn!("Accept failed: {}", err);
            continue;
        }

        let restart = match serve(&mut socket, &mut request, &mut service, &mut sink).await {
            Ok(restart) => restart,
            Err(err) => {
                defmt::warn!("Connection dropped: {}", err);
                false
            }
        };

        socket.close();
        if let Err(err) = socket.flush().await {
            defmt::warn!("Close failed: {}", err);
        }

        if restart {
            #[cfg(feature = "debug-mode")]
            defmt::info!("Restart requested");
            Timer::after(RESTART_GRACE).await;
            SCB::sys_reset();
        }
    }
}

/// Serves one request. Returns whether the device should restart.
async fn serve(
    socket: &mut TcpSocket<'_>,
    buf: &mut [u8],
    service: &mut Service,
    sink: &mut BusSink,
) -> Result<bool, ServeError> {
    let mut filled = 0;

    let (route, content_length, head_len) = loop {
        if filled == buf.len() {
            respond(socket, &Response::empty(Status::BadRequest)).await?;
            return Ok(false);
        }

        let read = socket.read(&mut buf[filled..]).await?;
        if read == 0 {
            return Ok(false);
        }
        filled += read;

        match parse_head(&buf[..filled]) {
            Ok(head) => {
                break (
                    Route::resolve(head.method, head.path),
                    head.content_length,
                    head.head_len,
                );
            }
            Err(RequestError::Incomplete) => continue,
            Err(_err) => {
                #[cfg(feature = "debug-mode")]
                defmt::info!("Bad request: {}", _err);

                respond(socket, &Response::empty(Status::BadRequest)).await?;
                return Ok(false);
            }
        }
    };

    let route = match route {
        Ok(route) => route,
        Err(status) => {
            respond(socket, &Response::empty(status)).await?;
            return Ok(false);
        }
    };

    let body_end = head_len + content_length;
    if body_end > buf.len() {
        respond(socket, &Response::empty(Status::InternalServerError)).await?;
        return Ok(false);
    }

    while filled < body_end {
        let read = socket.read(&mut buf[filled..body_end]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    let body = &buf[head_len..filled.min(body_end)];
    let response = service.handle(route, body, sink).await;

    #[cfg(feature = "debug-mode")]
    defmt::info!("{} -> {}", route, response.status.code());

    respond(socket, &response).await?;
    Ok(response.restart)
}

async fn respond(socket: &mut TcpSocket<'_>, response: &Response) -> Result<(), ServeError> {
    let body = response.body.as_bytes();
    let head = response_head(response.status, response.content_type, body.len())
        .map_err(|_| ServeError::Format)?;

    socket.write_all(head.as_bytes()).await?;
    socket.write_all(body).await?;
    socket.flush().await?;
    Ok(())
}
