//! USB network link for the configuration service.
//!
//! The board enumerates as a CDC-NCM Ethernet adapter. The host side gets a
//! point-to-point /30 link; the interposer answers on [`SERVICE_ADDRESS`].
//!
//! # Tasks
//!
//! - **usb_task**: USB device state machine
//! - **ncm_task**: Moves Ethernet frames between the NCM class and the stack
//! - **net_task**: embassy-net stack
//! - **http_task**: Configuration service, see [`crate::http_server`]

use embassy_executor::{SpawnError, Spawner};
use embassy_net::{Ipv4Address, Ipv4Cidr, StackResources, StaticConfigV4};
use embassy_stm32::{bind_interrupts, peripherals, usb};
use embassy_usb::class::cdc_ncm::embassy_net::{Device, Runner, State as NetState};
use embassy_usb::class::cdc_ncm::{CdcNcmClass, State};
use embassy_usb::{Builder, UsbDevice};
use static_cell::StaticCell;

use crate::hardware::UsbParts;
use crate::http_server::{HTTP_PORT, Service, http_task};

bind_interrupts!(struct Irqs {
    USB_FS => usb::InterruptHandler<peripherals::USB>;
});

type UsbDriver = usb::Driver<'static, peripherals::USB>;

/// Ethernet MTU carried over NCM.
const MTU: usize = 1514;

/// Full speed control endpoint size.
const MAX_PACKET_SIZE: u16 = 64;

const USB_VID: u16 = 0xc0de;
const USB_PID: u16 = 0xcafe;

/// Address of the configuration service.
const SERVICE_ADDRESS: Ipv4Address = Ipv4Address::new(172, 16, 1, 1);

/// Point-to-point link: the interposer and the host.
const PREFIX_LEN: u8 = 30;

/// Locally administered MACs: the interposer's interface and the one
/// presented to the host.
const DEVICE_MAC: [u8; 6] = [0x02, 0x54, 0x52, 0x4b, 0x00, 0x01];
const HOST_MAC: [u8; 6] = [0x02, 0x54, 0x52, 0x4b, 0x00, 0x02];

fn usb_config() -> embassy_usb::Config<'static> {
    let mut config = embassy_usb::Config::new(USB_VID, USB_PID);
    config.manufacturer = Some("tracking-interposer");
    config.product = Some("Tracking configuration");
    config.serial_number = Some("00000001");
    config.max_power = 100;
    config.max_packet_size_0 = MAX_PACKET_SIZE as u8;

    // Required for composite devices with IADs (Interface Association Descriptors)
    config.device_class = 0xEF;
    config.device_sub_class = 0x02;
    config.device_protocol = 0x01;

    config
}

/// Seeds TCP sequence numbers from the factory unique ID.
fn stack_seed() -> u64 {
    let uid = embassy_stm32::uid::uid();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&uid[..8]);
    u64::from_le_bytes(seed)
}

/// Brings up USB, the network stack and the configuration service.
///
/// # Arguments
///
/// * `spawner` - Executor spawner for the link and service tasks
/// * `parts` - USB peripheral and pins
/// * `service` - Configuration service served on port 80
///
/// # Errors
///
/// Returns the spawn error if any task is already running.
pub fn start(spawner: Spawner, parts: UsbParts, service: Service) -> Result<(), SpawnError> {
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUF: StaticCell<[u8; 128]> = StaticCell::new();
    static NCM_STATE: StaticCell<State> = StaticCell::new();
    static NET_STATE: StaticCell<NetState<MTU, 4, 4>> = StaticCell::new();
    static RESOURCES: StaticCell<StackResources<2>> = StaticCell::new();

    let driver = usb::Driver::new(parts.usb, Irqs, parts.dp, parts.dm);

    let mut builder = Builder::new(
        driver,
        usb_config(),
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [],
        CONTROL_BUF.init([0; 128]),
    );

    let class = CdcNcmClass::new(
        &mut builder,
        NCM_STATE.init(State::new()),
        HOST_MAC,
        MAX_PACKET_SIZE,
    );
    let usb = builder.build();
    spawner.spawn(usb_task(usb))?;

    let (runner, device) =
        class.into_embassy_net_device::<MTU, 4, 4>(NET_STATE.init(NetState::new()), DEVICE_MAC);
    spawner.spawn(ncm_task(runner))?;

    let config = embassy_net::Config::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(SERVICE_ADDRESS, PREFIX_LEN),
        gateway: None,
        dns_servers: heapless::Vec::new(),
    });
    let (stack, runner) = embassy_net::new(
        device,
        config,
        RESOURCES.init(StackResources::new()),
        stack_seed(),
    );
    spawner.spawn(net_task(runner))?;
    spawner.spawn(http_task(stack, service))?;

    #[cfg(feature = "debug-mode")]
    defmt::info!("Configuration service listening on port {}", HTTP_PORT);

    Ok(())
}

#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

#[embassy_executor::task]
async fn ncm_task(runner: Runner<'static, UsbDriver, MTU>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, Device<'static, MTU>>) -> ! {
    runner.run().await
}
