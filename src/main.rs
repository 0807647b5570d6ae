#![no_main]
#![no_std]

use core::fmt::Write as _;

use cortex_m_rt::entry;
use panic_halt as _;

use hal::{
    gpio::{Floating, Input, Output, PushPull},
    pac,
    prelude::*,
    serial::{Config, Serial},
};
use stm32f7xx_hal as hal;

use zipbot::config::{
    BUTTON_MS, CONTROL_LOOP_MS, HARDWARE_PROFILE, INTAKE_FEED_EVERY, INTAKE_MAX_BYTES,
    INTAKE_MAX_MS, INTAKE_MS, SENSORS_SLOW_MS, SERIAL_BAUD, WATCHDOG_TIMEOUT_MS,
};
use zipbot::control::MotionOwner;
use zipbot::dispatch::Commander;
use zipbot::drivers::{BatteryMonitor, HcSr04, LineSensor, ModeButton, PanServoSg90, Tb6612};
use zipbot::hal::{ByteSource, Imu, MillisClock, NoImu, SensorSnapshot, Watchdog};
use zipbot::hw::pins::{channel, BoardPins};
use zipbot::hw::{Adc, IwdgWatchdog, MotorPwm, ServoPwm, SysClock, Usart, UsartRx, UsartTx};
use zipbot::protocol::{Intake, ResponseWriter};
use zipbot::scheduler::Scheduler;

type Motors = Tb6612<
    MotorPwm,
    hal::gpio::gpiob::PB4<Output<PushPull>>,
    hal::gpio::gpiob::PB5<Output<PushPull>>,
    hal::gpio::gpiob::PB3<Output<PushPull>>,
>;
type Ultrasonic = HcSr04<
    hal::gpio::gpioc::PC0<Output<PushPull>>,
    hal::gpio::gpioc::PC1<Input<Floating>>,
>;
type Button = ModeButton<hal::gpio::gpioc::PC13<Input<Floating>>>;

/// Everything the scheduler tasks share.
struct Ctx {
    commander: Commander<Motors>,
    intake: Intake,
    writer: ResponseWriter<UsartTx<pac::USART1>>,
    rx: UsartRx<pac::USART1>,
    sensors: SensorSnapshot,

    adc: Adc,
    ultrasonic: Ultrasonic,
    line: LineSensor,
    battery: BatteryMonitor,
    imu: NoImu,
    servo: PanServoSg90<ServoPwm>,
    button: Button,

    clock: SysClock,
    dog: IwdgWatchdog,
}

// Task: control loop (50 Hz) - boot check, motion, macros, drive safety.
fn task_control_loop(ctx: &mut Ctx, now: u32) {
    ctx.commander
        .control_tick(now, &ctx.sensors, &mut ctx.servo, &mut ctx.writer);
}

// Task: slow sensors (10 Hz) - refresh the snapshot everyone reads.
fn task_sensors_slow(ctx: &mut Ctx, now: u32) {
    let ultrasonic_cm = ctx.ultrasonic.measure(&ctx.clock);
    let line = ctx.line.read_all(&mut ctx.adc);
    ctx.battery.update(ctx.adc.read(channel::BATTERY));
    ctx.imu.update(now);

    ctx.sensors = SensorSnapshot {
        battery_mv: ctx.battery.millivolts(),
        battery_raw: ctx.battery.raw(),
        ultrasonic_cm,
        line,
        imu_present: ctx.imu.present(),
        yaw_decideg: ctx.imu.yaw_decidegrees(),
    };
    ctx.commander.sensors_tick(&ctx.sensors);
}

// Task: protocol intake (1 ms) - bounded byte/time budget per call so the
// control loop's latency stays predictable even under a flood.
fn task_protocol_rx(ctx: &mut Ctx, now: u32) {
    ctx.writer.service();
    ctx.rx.pump();

    let mut processed = 0;
    while processed < INTAKE_MAX_BYTES {
        if ctx.clock.now_ms().wrapping_sub(now) > INTAKE_MAX_MS {
            break;
        }
        let Some(byte) = ctx.rx.read_byte() else {
            break;
        };
        processed += 1;
        if processed % INTAKE_FEED_EVERY == 0 {
            ctx.dog.feed();
        }

        if let Some((command, source)) = ctx.intake.push(byte, now) {
            let link = ctx.intake.stats(ctx.rx.overflow_count());
            ctx.commander.handle(
                &command,
                source,
                now,
                &ctx.sensors,
                &link,
                &mut ctx.servo,
                &mut ctx.writer,
            );
            // One command per call keeps the budget honest.
            break;
        }
    }
}

// Task: mode button (100 Hz) - a press is a local stop.
fn task_button(ctx: &mut Ctx, now: u32) {
    ctx.button.update(now);
    if ctx.button.is_pressed() && ctx.commander.owner() != MotionOwner::Idle {
        ctx.commander.local_stop();
    }
}

#[entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();
    let dp = pac::Peripherals::take().unwrap();

    // Clocks
    let rcc = dp.RCC.constrain();
    let clocks = rcc.cfgr.sysclk(96.MHz()).freeze();
    let timer_clk = clocks.pclk1().raw() * 2;

    // GPIO
    let pins = BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOC);

    // USART1 to the WiFi bridge
    let usart_cfg = Config {
        baud_rate: SERIAL_BAUD.bps(),
        ..Default::default()
    };
    let serial = Serial::new(
        dp.USART1,
        (pins.usart1.tx, pins.usart1.rx),
        &clocks,
        usart_cfg,
    );
    let (rx, tx) = Usart::split(serial);

    // Drivetrain and peripherals
    let motor_pwm = MotorPwm::new(dp.TIM3, timer_clk);
    let motors = Tb6612::new(motor_pwm, pins.motor.ain1, pins.motor.bin1, pins.motor.stby);
    let servo = PanServoSg90::new(ServoPwm::new(dp.TIM4, timer_clk));
    let ultrasonic = HcSr04::new(pins.ultrasonic.trig, pins.ultrasonic.echo);
    let line = LineSensor::new([channel::LINE_LEFT, channel::LINE_MID, channel::LINE_RIGHT]);
    let adc = Adc::adc1(dp.ADC1);
    let button = ModeButton::new(pins.button.mode);

    // Timekeeping and the watchdog
    let clock = SysClock::start(cp.SYST, clocks.sysclk().raw());
    let mut dog = IwdgWatchdog::start(dp.IWDG, WATCHDOG_TIMEOUT_MS);

    let mut ctx = Ctx {
        commander: Commander::new(motors),
        intake: Intake::new(),
        writer: ResponseWriter::new(tx),
        rx,
        sensors: SensorSnapshot::default(),
        adc,
        ultrasonic,
        line,
        battery: BatteryMonitor::new(),
        imu: NoImu,
        servo,
        button,
        clock,
        dog,
    };

    let mut sched: Scheduler<Ctx> = Scheduler::new();
    let registered = [
        sched.register(task_control_loop, CONTROL_LOOP_MS, "ctrl"),
        sched.register(task_sensors_slow, SENSORS_SLOW_MS, "sens_s"),
        sched.register(task_protocol_rx, INTAKE_MS, "rx"),
        sched.register(task_button, BUTTON_MS, "btn"),
    ];
    if registered.iter().any(|r| r.is_err()) {
        log::warn!("task table full; some tasks not registered");
    }

    // First sensor pass so the boot check and status line see real values.
    let now = ctx.clock.now_ms();
    task_sensors_slow(&mut ctx, now);

    // Boot status line: HW:<profile> imu=<0/1> batt=<mV>
    let mut hw_line: heapless::String<64> = heapless::String::new();
    let _ = write!(
        hw_line,
        "HW:{} imu={} batt={}",
        HARDWARE_PROFILE, ctx.sensors.imu_present as u8, ctx.sensors.battery_mv
    );
    ctx.writer.send_line(&hw_line);

    // Non-blocking self-check runs inside the control task from here on.
    ctx.commander.start_boot(now);

    // Reset marker for the host.
    ctx.writer.send_line("R");

    loop {
        let now = ctx.clock.now_ms();
        sched.run(now, &mut ctx, &mut dog);
        cortex_m::asm::nop();
    }
}
