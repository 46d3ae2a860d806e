#![no_std]
#![no_main]

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use embassy_futures::select::select;
use embassy_net::{Config, IpAddress, IpEndpoint, Stack, StackResources};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Event, Input, InputConfig, Io, Level, Output, OutputConfig, Pull};
use esp_hal::handler;
use esp_hal::ledc::channel::{self, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::rng::Rng;
use esp_hal::time::{Instant, Rate};
use esp_hal::timer::timg::TimerGroup;
use esp_hal_embassy::Executor;
use esp_wifi::wifi;
use log::{error, info};
use static_cell::StaticCell;

use sense_node::actuation::LinearMap;
use sense_node::config::NodeConfig;
use sense_node::control::ControlLoop;
use sense_node::hardware::{PinBoard, Ultrasonic};
use sense_node::net::{TcpCommandSocket, TcpDialer};
use sense_node::shared::SharedState;
use sense_node::wifi::StationLink;

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

/// Socket buffer sizes; the data channel only ever carries short lines
const DATA_BUFFER: usize = 512;
const COMMAND_BUFFER: usize = 256;

type Ranger = Ultrasonic<Output<'static>, Input<'static>, Delay, fn() -> u64>;
type NodeBoard = PinBoard<Ranger, channel::Channel<'static, LowSpeed>, Output<'static>>;
type Node = ControlLoop<
    'static,
    StationLink<'static>,
    TcpDialer<'static>,
    TcpCommandSocket<'static>,
    NodeBoard,
    LinearMap,
>;

/// Inputs serviced by the GPIO interrupt
struct InterruptInputs {
    green: Input<'static>,
    red: Input<'static>,
    motion: Input<'static>,
}

// Static cells for embassy components
static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static SHARED_CELL: StaticCell<SharedState> = StaticCell::new();
static LEDC_CELL: StaticCell<Ledc<'static>> = StaticCell::new();
static PWM_TIMER_CELL: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();
static DATA_RX: StaticCell<[u8; DATA_BUFFER]> = StaticCell::new();
static DATA_TX: StaticCell<[u8; DATA_BUFFER]> = StaticCell::new();
static COMMAND_RX: StaticCell<[u8; COMMAND_BUFFER]> = StaticCell::new();
static COMMAND_TX: StaticCell<[u8; COMMAND_BUFFER]> = StaticCell::new();

// Static executor for embassy tasks
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

// Interrupt side handles
static SHARED: Mutex<Cell<Option<&'static SharedState>>> = Mutex::new(Cell::new(None));
static INPUTS: Mutex<RefCell<Option<InterruptInputs>>> = Mutex::new(RefCell::new(None));

/// Cuts the idle wait short when an input fires
static WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    esp_println::println!("[PANIC] {}", info);
    loop {}
}

fn now_ms() -> u32 {
    Instant::now().duration_since_epoch().as_millis() as u32
}

fn micros() -> u64 {
    Instant::now().duration_since_epoch().as_micros()
}

fn report_heap() {
    info!(
        "[MEM] heap used {} free {}",
        esp_alloc::HEAP.used(),
        esp_alloc::HEAP.free()
    );
}

#[handler]
fn gpio_handler() {
    let now = now_ms();
    critical_section::with(|cs| {
        let Some(shared) = SHARED.borrow(cs).get() else {
            return;
        };
        let mut inputs = INPUTS.borrow_ref_mut(cs);
        let Some(inputs) = inputs.as_mut() else {
            return;
        };

        let mut accepted = false;
        if inputs.green.is_interrupt_set() {
            accepted |= shared.on_green_edge(now).is_some();
            inputs.green.clear_interrupt();
        }
        if inputs.red.is_interrupt_set() {
            accepted |= shared.on_red_edge(now).is_some();
            inputs.red.clear_interrupt();
        }
        if inputs.motion.is_interrupt_set() {
            accepted |= shared.on_motion_edge(inputs.motion.is_high(), now).is_some();
            inputs.motion.clear_interrupt();
        }

        if accepted {
            WAKE.signal(());
        }
    });
}

// Embassy task to run the network stack
#[embassy_executor::task]
async fn net_task(
    mut runner: embassy_net::Runner<'static, esp_wifi::wifi::WifiDevice<'static>>,
) -> ! {
    runner.run().await
}

/// Cooperative control loop task
#[embassy_executor::task]
async fn control_task(mut node: Node, boot_link_timeout_ms: u32, tick_ms: u32) -> ! {
    info!("[BOOT] bringing Wi-Fi up");
    node.watchdog_mut()
        .link_mut()
        .boot_connect(boot_link_timeout_ms)
        .await;
    node.watchdog_mut().note_attempt(now_ms());

    info!("[BOOT] boot complete, entering main loop");
    let tick = Duration::from_millis(u64::from(tick_ms));
    loop {
        let report = node.tick(now_ms()).await;

        if report.active {
            Timer::after(tick).await;
        } else {
            // Idle: sleep until the tick boundary or the next accepted input
            select(Timer::after(tick), WAKE.wait()).await;
        }
    }
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_println::logger::init_logger(log::LevelFilter::Info);

    let node_config = match NodeConfig::from_build_env() {
        Ok(node_config) => node_config,
        Err(e) => {
            error!("[BOOT] invalid build configuration: {:?}", e);
            panic!("configuration error");
        }
    };

    // Initialize heap allocator for WiFi (72KB)
    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Initialize embassy time system
    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    // Initialize WiFi driver
    let timer_group1 = TimerGroup::new(peripherals.TIMG1);
    let mut rng = Rng::new(peripherals.RNG);
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let wifi_init = esp_wifi::init(timer_group1.timer0, rng, peripherals.RADIO_CLK).unwrap();
    let wifi_init_ref = WIFI_INIT_CELL.init(wifi_init);

    let (wifi_controller, wifi_interfaces) = wifi::new(wifi_init_ref, peripherals.WIFI).unwrap();
    let link = match StationLink::new(
        wifi_controller,
        node_config.wifi_ssid,
        node_config.wifi_password,
    ) {
        Ok(link) => link,
        Err(e) => {
            error!("[WIFI] station setup failed: {:?}", e);
            panic!("WiFi initialization failed");
        }
    };
    info!("[WIFI] station link ready");

    // embassy-net stack with DHCP
    let stack_resources = STACK_RESOURCES.init(StackResources::new());
    let (stack, runner): (Stack<'static>, _) = embassy_net::new(
        wifi_interfaces.sta,
        Config::dhcpv4(Default::default()),
        stack_resources,
        seed,
    );

    let remote = IpEndpoint::new(
        IpAddress::Ipv4(node_config.telemetry_host),
        node_config.telemetry_port,
    );
    let dialer = TcpDialer::new(stack, DATA_RX.init([0; DATA_BUFFER]), DATA_TX.init([0; DATA_BUFFER]), remote);
    let listener = TcpCommandSocket::new(
        stack,
        COMMAND_RX.init([0; COMMAND_BUFFER]),
        COMMAND_TX.init([0; COMMAND_BUFFER]),
        node_config.command_port,
    );
    info!(
        "[CMD] listening on {}, telemetry to {}:{}",
        node_config.command_port, node_config.telemetry_host, node_config.telemetry_port
    );

    // Shared state and interrupt-driven inputs
    let shared: &'static SharedState = SHARED_CELL.init(SharedState::from_config(&node_config));

    let mut io = Io::new(peripherals.IO_MUX);
    io.set_interrupt_handler(gpio_handler);

    let mut green = Input::new(peripherals.GPIO5, InputConfig::default().with_pull(Pull::Up));
    let mut red = Input::new(peripherals.GPIO6, InputConfig::default().with_pull(Pull::Up));
    let mut motion = Input::new(peripherals.GPIO7, InputConfig::default().with_pull(Pull::Down));

    critical_section::with(|cs| {
        green.listen(Event::FallingEdge);
        red.listen(Event::FallingEdge);
        motion.listen(Event::AnyEdge);
        SHARED.borrow(cs).set(Some(shared));
        INPUTS
            .borrow_ref_mut(cs)
            .replace(InterruptInputs { green, red, motion });
    });

    // Ultrasonic ranger, PWM actuator at 1 kHz and the PING indicator
    let trigger = Output::new(peripherals.GPIO3, Level::Low, OutputConfig::default());
    let echo = Input::new(peripherals.GPIO1, InputConfig::default());
    let ranger: Ranger = Ultrasonic::new(
        trigger,
        echo,
        Delay::new(),
        micros as fn() -> u64,
        node_config.max_distance_mm,
    );

    let ledc = LEDC_CELL.init(Ledc::new(peripherals.LEDC));
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let pwm_timer = PWM_TIMER_CELL.init(ledc.timer::<LowSpeed>(timer::Number::Timer0));
    pwm_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty10Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_khz(1),
        })
        .unwrap();

    let mut pwm = ledc.channel(channel::Number::Channel0, peripherals.GPIO4);
    pwm.configure(channel::config::Config {
        timer: &*pwm_timer,
        duty_pct: 0,
        pin_config: channel::config::PinConfig::PushPull,
    })
    .unwrap();

    let indicator = Output::new(peripherals.GPIO10, Level::Low, OutputConfig::default());
    let board = PinBoard::new(ranger, pwm, indicator).with_reclaim(report_heap);

    let mapper = LinearMap::new(node_config.min_distance_mm, node_config.max_distance_mm);
    let node: Node = ControlLoop::new(&node_config, shared, link, dialer, listener, board, mapper);

    info!("[MAIN] sense-node {} starting", sense_node::VERSION);

    // Initialize embassy executor and run tasks
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        info!("[MAIN] Spawning network task...");
        spawner.spawn(net_task(runner)).ok();

        info!("[MAIN] Spawning control task...");
        spawner
            .spawn(control_task(
                node,
                node_config.boot_link_timeout_ms,
                node_config.tick_ms,
            ))
            .ok();
    });
}
