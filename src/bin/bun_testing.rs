// Bun hopper distance testing
//
// Waits for the FIO0 trigger, streams the laser distance sensor while it is
// held high, then writes and plots each run. Runs until the device fails or
// Ctrl-C is pressed; either way the device is reset and closed.

use bunhopper_daq::{
    AcquisitionConfig, AcquisitionLoop, BitState, ConversionConfig, CsvPlotSink, DigitalTrigger,
    OutputFile, OutputNaming, PollPolicy, SimulatedDevice, SimulatorConfig, StreamConfig,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bun_testing")]
#[command(version)]
#[command(about = "Triggered distance acquisition for the bun hopper")]
#[command(long_about = "Streams the bun hopper laser distance sensor whenever the trigger input is held high, converts each run to inches and saves it as CSV before plotting it. Without hardware attached the built-in simulator stands in for the DAQ.")]
struct Args {
    /// Output file for each run
    #[arg(short, long, default_value = "test")]
    output: PathBuf,

    /// Write every run to its own numbered file instead of overwriting
    #[arg(long)]
    numbered: bool,

    /// Do not open the plot window
    #[arg(long)]
    no_plot: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,

    #[arg(long, default_value_t = 1, help = "ADC resolution index")]
    resolution_index: u8,

    #[arg(long, default_value_t = 25)]
    samples_per_packet: u8,

    #[arg(long, default_value_t = 0)]
    settling_factor: u8,

    #[arg(long, default_value_t = 0, help = "Analog input the sensor is wired to")]
    channel: u8,

    #[arg(long, default_value_t = 60_000, help = "Scan interval in 4 MHz clock ticks")]
    scan_interval: u16,

    #[arg(long, default_value_t = 48, help = "Packets every stream read should deliver")]
    packets_per_request: u32,

    #[arg(long, default_value_t = 38.08, help = "Inches per volt")]
    volts_to_inches: f64,

    #[arg(long, default_value_t = 0.123, help = "Sensor voltage at zero distance")]
    volts_at_zero: f64,

    #[arg(long, default_value_t = 0.015, help = "Seconds between samples")]
    sample_period: f64,

    #[arg(long, default_value_t = 1, help = "Trigger poll interval in milliseconds")]
    poll_ms: u64,

    #[arg(long, default_value_t = 3, help = "Consecutive high reads needed to start")]
    debounce: u32,

    #[arg(long, default_value_t = 2.0, help = "Simulator: seconds the trigger stays low")]
    sim_idle: f64,

    #[arg(long, default_value_t = 10.0, help = "Simulator: seconds the trigger stays high")]
    sim_active: f64,

    #[arg(long, default_value_t = 42)]
    sim_seed: u64,
}

/// Turn Ctrl-C into a flag the acquisition loop checks, so the device still
/// gets reset and closed on the way out.
fn install_interrupt_handler() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log::error!("Failed to create signal handler runtime: {}", e);
                return;
            }
        };

        rt.block_on(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            log::warn!("Interrupt received, shutting down the device");
            handler_flag.store(true, Ordering::SeqCst);
        });
    });

    flag
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    #[cfg(feature = "cpu-profiling")]
    let _tracy = tracy_client::Client::start();

    let stream = match StreamConfig::builder()
        .resolution_index(args.resolution_index)
        .samples_per_packet(args.samples_per_packet)
        .settling_factor(args.settling_factor)
        .channel(args.channel, 0)
        .scan_interval(args.scan_interval)
        .packets_per_request(args.packets_per_request)
        .build()
    {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Invalid stream configuration: {}", e);
            std::process::exit(2);
        }
    };

    let config = AcquisitionConfig {
        stream,
        conversion: ConversionConfig {
            volts_to_inches: args.volts_to_inches,
            volts_at_zero: args.volts_at_zero,
            sample_period: args.sample_period,
        },
        poll: PollPolicy {
            interval: Duration::from_millis(args.poll_ms),
            debounce_reads: args.debounce,
        },
    };

    let naming = if args.numbered {
        OutputNaming::Numbered
    } else {
        OutputNaming::Overwrite
    };
    let sink = CsvPlotSink::new(OutputFile::new(args.output, naming), !args.no_plot);

    let device = SimulatedDevice::new(
        SimulatorConfig {
            idle_time: Duration::from_secs_f64(args.sim_idle.max(0.0)),
            active_time: Duration::from_secs_f64(args.sim_active.max(0.0)),
            seed: args.sim_seed,
            ..SimulatorConfig::default()
        },
        config.conversion,
    );
    let trigger = DigitalTrigger::start_streaming_when().bit0_is(BitState::High);

    let interrupt = install_interrupt_handler();
    let shutdown = AcquisitionLoop::new(device, trigger, sink, config)
        .with_interrupt(interrupt)
        .run_forever();
    log::error!("{}", shutdown);
    println!("Exiting program.");
    std::process::exit(1);
}
