#![no_main]
#![no_std]

use core::fmt::Write;
use core::sync::atomic::{AtomicU32, Ordering};
use cortex_m;
use cortex_m_rt::{entry, exception};
use panic_halt as _;

use stm32f0xx_hal as hal;

use touch::bank::{Bank, Channel};
use touch::button::Button;
use touch::coordinator::{EcsRetry, Status};
use touch::group::ObjectGroup;
use touch::handshake::SharedResults;
use touch::linear::HalfEndedLinear;
use touch::object::TouchObject;
use touch::tsc::{self, MaxCount, Tsc};
use touch::{Coordinator, CoordinatorConfig, TouchConfig};

use crate::hal::pac;
use crate::hal::pac::interrupt;
use crate::hal::prelude::*;

mod serial;

/// Result slots of the electrodes
const REV_SLOTS: [usize; 3] = [0, 1, 2];
const STOP_SLOT: usize = 3;
const FWD_SLOTS: [usize; 3] = [4, 5, 6];
const CHANNELS: usize = 7;

/// Position of each object in the group. The stop button comes first so it wins
/// over the sliders when touched together.
const STOP: usize = 0;
const REV: usize = 1;
const FWD: usize = 2;

static BANKS: [Bank; 2] = [
    Bank::new()
        .sample(Channel::G1Ch2).channel(Channel::G1Ch1, REV_SLOTS[0] as u8) // Rev 1
        .sample(Channel::G2Ch3).channel(Channel::G2Ch1, REV_SLOTS[1] as u8) // Rev 2
        .sample(Channel::G3Ch4).channel(Channel::G3Ch2, REV_SLOTS[2] as u8) // Rev 3
        .sample(Channel::G6Ch2).channel(Channel::G6Ch1, STOP_SLOT as u8), // Stop
    Bank::new()
        .sample(Channel::G6Ch2).channel(Channel::G6Ch3, FWD_SLOTS[0] as u8) // Fwd 1
        .sample(Channel::G2Ch3).channel(Channel::G2Ch2, FWD_SLOTS[1] as u8) // Fwd 2
        .sample(Channel::G3Ch4).channel(Channel::G3Ch3, FWD_SLOTS[2] as u8), // Fwd 3
];

static TSC_CONFIG: tsc::Config = tsc::Config {
    max_count: Some(MaxCount::U8191),
    ..tsc::Config::default()
};

static TOUCH_CONFIG: TouchConfig = TouchConfig {
    detect_threshold: 100,
    detect_hysteresis: 5,
    calibration_delay: 10,
    calibration_samples: 10,
    debounce: 3,
    ecs_weight: 26,
};

static COORDINATOR_CONFIG: CoordinatorConfig = CoordinatorConfig {
    ecs_interval_ms: 500,
    ecs_retry: EcsRetry::NextCycle,
};

/// Latest counts of every electrode. Exported so a host tool can read them over SWD,
/// following the handshake flags stored alongside.
#[no_mangle]
static TOUCH_RESULTS: SharedResults<CHANNELS> = SharedResults::new();

/// Milliseconds since boot
static TICKS: AtomicU32 = AtomicU32::new(0);

fn write_pos(log: &mut impl Write, label: &str, pos: Option<u16>) {
    match pos {
        Some(pos) => write!(log, " {} {}", label, pos).ok(),
        None => write!(log, " {} -", label).ok(),
    };
}

/// Position of a slider, if it is the object currently reported by the group
fn reported_pos(group: &ObjectGroup, index: usize) -> Option<u16> {
    if group.reported(index) {
        group.object(index).position()
    } else {
        None
    }
}

fn report_objects(log: &mut impl Write, group: &ObjectGroup) {
    write!(log, "stop {}", group.reported(STOP) as u8).ok();
    write_pos(log, "rev", reported_pos(group, REV));
    write_pos(log, "fwd", reported_pos(group, FWD));
    write!(log, "\r\n").ok();
}

fn report_counts(log: &mut impl Write, label: &str) {
    write!(log, "{}:", label).ok();
    TOUCH_RESULTS.read(|counts| {
        for count in counts {
            write!(log, " {}", count).ok();
        }
    });
    write!(log, " (dropped {})\r\n", serial::uart1::dropped()).ok();
}

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();

    let mut flash = dp.FLASH;
    let mut rcc = dp.RCC.configure().sysclk(48.mhz()).freeze(&mut flash);
    let gpioa = dp.GPIOA.split(&mut rcc);
    let gpiob = dp.GPIOB.split(&mut rcc);

    // A library requiring a critical section to set a gpio AF register is bad and I just won't.
    let fake_cs = unsafe { cortex_m::interrupt::CriticalSection::new() };

    // Initialize touch pins
    let _rev1 = gpioa.pa0.into_alternate_af3(&fake_cs);
    let _rev2 = gpioa.pa4.into_alternate_af3(&fake_cs);
    let _rev3 = gpiob.pb0.into_alternate_af3(&fake_cs);
    let _stop = gpiob.pb11.into_alternate_af3(&fake_cs);
    let _fwd1 = gpiob.pb13.into_alternate_af3(&fake_cs);
    let _fwd2 = gpioa.pa5.into_alternate_af3(&fake_cs);
    let _fwd3 = gpiob.pb1.into_alternate_af3(&fake_cs);
    let _g1_cap = gpioa.pa1.into_alternate_af3(&fake_cs);
    let _g2_cap = gpioa.pa6.into_alternate_af3(&fake_cs);
    let _g3_cap = gpiob.pb2.into_alternate_af3(&fake_cs);
    let _g6_cap = gpiob.pb12.into_alternate_af3(&fake_cs);

    let tx_pin = gpiob.pb6.into_alternate_af0(&fake_cs);
    let rx_pin = gpiob.pb7.into_alternate_af0(&fake_cs);
    let uart = hal::serial::Serial::usart1(dp.USART1, (tx_pin, rx_pin), 115200.bps(), &mut rcc);
    serial::uart1::init(uart, 4);
    let mut log = serial::uart1::writer();

    let mut syst = hal::timers::Timer::syst(cp.SYST, 1.khz(), &mut rcc);
    syst.listen(&hal::timers::Event::TimeOut);

    let mut stop_button = Button::new([STOP_SLOT], Some(&TOUCH_CONFIG));
    let mut rev_linear = HalfEndedLinear::new(REV_SLOTS, Some(&TOUCH_CONFIG));
    let mut fwd_linear = HalfEndedLinear::new(FWD_SLOTS, Some(&TOUCH_CONFIG));
    let mut objects: [&mut dyn TouchObject; 3] = [&mut stop_button, &mut rev_linear, &mut fwd_linear];
    let group = ObjectGroup::new(&mut objects);

    let panel = Tsc::new(Some(TSC_CONFIG), &BANKS)
        .and_then(|engine| Coordinator::new(engine, group, &TICKS, &TOUCH_RESULTS, Some(COORDINATOR_CONFIG)));
    let mut panel = match panel {
        Ok(panel) => panel,
        Err(e) => {
            write!(log, "touch init failed: {}\r\n", e).ok();
            loop {
                cortex_m::asm::wfi();
            }
        }
    };
    write!(log, "touch: {} banks, {} channels\r\n", BANKS.len(), CHANNELS).ok();

    // A declined recalibration is retried every cycle, only log the first one
    let mut ecs_skipped = false;

    loop {
        let status = panel.run();
        if status.is_busy() {
            continue;
        }

        if panel.group().changed() {
            report_objects(&mut log, panel.group());
        }
        match status {
            Status::Recalibrated => {
                ecs_skipped = false;
                report_counts(&mut log, "ecs");
            },
            Status::RecalibrationSkipped if !ecs_skipped => {
                ecs_skipped = true;
                report_counts(&mut log, "ecs skipped");
            },
            _ => (),
        }
    }
}

#[exception]
fn SysTick() {
    // No read-modify-write atomics on the M0. Nothing else writes TICKS.
    let time = TICKS.load(Ordering::Relaxed);
    TICKS.store(time.wrapping_add(1), Ordering::Relaxed);
}
