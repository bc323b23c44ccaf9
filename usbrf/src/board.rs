use core::cell::RefCell;

use defmt::Format;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Pull, Speed};
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::usb::Driver;
use embassy_stm32::{bind_interrupts, peripherals, usb, exti::ExtiInput, gpio::Output};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, watch::Watch, signal::Signal};
use embassy_time::{with_timeout, Duration, Timer};
use static_cell::StaticCell;

use crate::antenna::GpioAntennaMux;
use crate::flash_config::FlashConfigStore;
use crate::radio::{cc2500::Cc2500Radio, cyrf6936::Cyrf6936Radio};
use crate::tick::StmTickTimer;

bind_interrupts!(struct Irqs {
    USB_LP_CAN1_RX0 => usb::InterruptHandler<peripherals::USB>;
});

/// Shared SPI2 bus the two radio chips sit on, one `RefCellDevice` each with
/// its own chip-select (spec §2 "two radio chips", same physical bus).
type Spi2 = Spi<'static, embassy_stm32::mode::Blocking>;
type SpiBus = RefCell<Spi2>;
/// The concrete `SpiDevice` each radio driver is generic over (shared SPI2,
/// one chip-select per chip). Exported so `bin/usbrf.rs` can name
/// `Cyrf6936Radio<RadioSpiDevice>`/`Cc2500Radio<RadioSpiDevice>` directly
/// when it wraps them in a shared `RefCell`.
pub type RadioSpiDevice = embedded_hal_bus::spi::RefCellDevice<'static, Spi2, Output<'static>, embassy_time::Delay>;

static SPI_BUS: StaticCell<SpiBus> = StaticCell::new();

/// Pin mapping (Nucleo-style silkscreen names, STM32F103):
/// SCK   PB13 | MISO PB14 | MOSI PB15  (SPI2, shared)
/// CYRF  SS   PB12 | RST  PB8
/// CC2500 SS  PB6
/// Antenna mux select PB4 / PB5
/// Status LED PA5 | User button PC13
pub struct Board {
    pub cyrf: Cyrf6936Radio<RadioSpiDevice>,
    pub cc2500: Cc2500Radio<RadioSpiDevice>,
    pub tick: StmTickTimer,
    pub antenna: GpioAntennaMux<'static>,
    pub config_store: FlashConfigStore<'static>,
    pub usb_driver: Driver<'static, peripherals::USB>,
    /// Status LED and user button, spun up via [`blink`]/[`user_intf`] the
    /// same way every teacher demo bin does it.
    pub led: Output<'static>,
    pub button: ExtiInput<'static>,
}

impl Board {
    pub async fn init(_spawner: &Spawner) -> Board {
        let p = embassy_stm32::init(Default::default());

        let mut spi_config = SpiConfig::default();
        spi_config.frequency = Hertz(4_000_000);
        let spi = Spi::new_blocking(p.SPI2, p.PB13, p.PB15, p.PB14, spi_config);
        let bus = SPI_BUS.init(RefCell::new(spi));

        let mut cyrf_rst = Output::new(p.PB8, Level::High, Speed::Low);
        cyrf_rst.set_low();
        Timer::after_millis(1).await;
        cyrf_rst.set_high();

        let cyrf_cs = Output::new(p.PB12, Level::High, Speed::VeryHigh);
        let cc2500_cs = Output::new(p.PB6, Level::High, Speed::VeryHigh);
        let cyrf_spi = embedded_hal_bus::spi::RefCellDevice::new(bus, cyrf_cs, embassy_time::Delay)
            .expect("build CYRF6936 SPI device");
        let cc2500_spi = embedded_hal_bus::spi::RefCellDevice::new(bus, cc2500_cs, embassy_time::Delay)
            .expect("build CC2500 SPI device");

        let antenna = GpioAntennaMux::new(
            Output::new(p.PB4, Level::Low, Speed::Low),
            Output::new(p.PB5, Level::Low, Speed::Low),
        );

        let flash = embassy_stm32::flash::Flash::new_blocking(p.FLASH);

        let usb_driver = Driver::new(p.USB, Irqs, p.PA12, p.PA11);

        let led = Output::new(p.PA5, Level::Low, Speed::Low);
        let button = ExtiInput::new(p.PC13, p.EXTI13, Pull::Up);

        Board {
            cyrf: Cyrf6936Radio::new(cyrf_spi),
            cc2500: Cc2500Radio::new(cc2500_spi),
            tick: StmTickTimer::new(),
            antenna,
            config_store: FlashConfigStore::new(flash),
            usb_driver,
            led,
            button,
        }
    }
}


#[derive(Debug, Clone, Copy, Format, PartialEq)]
pub enum ButtonPressKind {
    Short,
    Double,
    Long
}

impl ButtonPressKind {
    pub fn is_short(&self) -> bool {
       *self==ButtonPressKind::Short
    }
}

pub type WatchButtonPress = Watch<CriticalSectionRawMutex, ButtonPressKind, 3>;

/// Watches the user button and reports press kind over `watch`; what a
/// short/double/long press does is up to the caller (`bin/usbrf.rs` uses it
/// to stop the current protocol or cycle to the next one).
#[embassy_executor::task]
pub async fn user_intf(mut button: ExtiInput<'static>, watch: &'static WatchButtonPress) {
    let s = watch.sender();
    loop {
        button.wait_for_falling_edge().await;
        // Small wait to debounce button press
        Timer::after_millis(5).await;
        // Determine if this is a short or long press
        let k = match with_timeout(Duration::from_millis(500), button.wait_for_high()).await {
            // Short press -> check for another press shortly after
            Ok(_) => {
                match with_timeout(Duration::from_millis(150), button.wait_for_falling_edge()).await {
                    Ok(_) => ButtonPressKind::Double,
                    Err(_) => ButtonPressKind::Short,
                }
            }
            // Long press
            Err(_) => ButtonPressKind::Long,
        };
        s.send(k)
    }
}


/// Led Mode
#[derive(Debug, Clone, Copy, Format, PartialEq)]
pub enum LedMode {
    Off = 0,
    On  = 1,
    BlinkSlow = 2,
    BlinkFast = 3,
    Flash = 4,
}

impl LedMode {

    /// Blinking half period
    pub fn delay(&self) -> Duration {
        match self {
            LedMode::BlinkSlow => Duration::from_millis(500),
            LedMode::BlinkFast => Duration::from_millis(125),
            LedMode::Flash => Duration::from_millis(60),
            _ => Duration::from_ticks(0),
        }
    }

    /// Flag when LedMode is blinking
    pub fn is_blink(&self) -> bool {
        matches!(self, LedMode::BlinkSlow |LedMode::BlinkFast | LedMode::Flash)
    }

    /// Flag when LedMode is blinking
    pub fn is_burst(&self) -> bool {
        matches!(self, LedMode::Flash)
    }

    /// Flag when LedMode should be on
    pub fn is_on(&self) -> bool {
        matches!(self, LedMode::On)
    }
}

impl From<u8> for LedMode {
    fn from(value: u8) -> Self {
        match value {
            4 => LedMode::Flash,
            3 => LedMode::BlinkFast,
            2 => LedMode::BlinkSlow,
            1 => LedMode::On,
            _ => LedMode::Off,
        }
    }
}

pub type SignalLedMode = Signal<CriticalSectionRawMutex, LedMode>;

/// Drives the single status LED.
#[embassy_executor::task(pool_size = 1)]
pub async fn blink(mut led: Output<'static>, signal: &'static SignalLedMode) {
    let mut burst_cnt : u8 = 0;
    let mut prev_mode : LedMode = LedMode::BlinkSlow;
    let mut mode : LedMode = LedMode::BlinkSlow;
    loop {
        // Check if mode has changed
        if let Some(next_mode) = signal.try_take() {
            if !mode.is_burst() {
                prev_mode = mode;
            }
            mode = next_mode;
            // Init burst cnt on
            if mode.is_burst() {
                burst_cnt = 4;
            }
        }
        // Toggle led state after a delay if it should blink
        if mode.is_blink() {
            Timer::after(mode.delay()).await;
            led.toggle();
            if burst_cnt > 0 {
                burst_cnt -= 1;
                if burst_cnt == 0 {
                    mode = prev_mode;
                }
            }
        }
        // Set the state on/off and wait for change in mode
        else {
            burst_cnt = 0;
            if mode.is_on() {
                led.set_high();
            } else {
                led.set_low();
            }
            prev_mode = mode;
            mode = signal.wait().await;
            if mode.is_burst() {
                burst_cnt = 4;
            }
        }
    }
}
