use clap::{arg, command, value_parser, Arg, ArgMatches, Command};
use colored::*;
use lbm_tunnel as lbm;
use lbm::d2q9::accelerator::device;
use lbm::d2q9::EngineKind;
use lbm::io::CaseSetup;
use rayon::ThreadPoolBuilder;
use std::process;
use tracing_subscriber::EnvFilter;

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn load_setup(sub_matches: &ArgMatches) -> CaseSetup {
    let mut setup = match CaseSetup::load() {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("Error while reading the case setup: {e}.");
            process::exit(1);
        }
    };
    if let Ok(Some(engine)) = sub_matches.try_get_one::<String>("engine") {
        match engine.parse::<EngineKind>() {
            Ok(engine) => setup.engine = engine,
            Err(e) => {
                eprintln!("Error: {e}.");
                process::exit(1);
            }
        }
    }
    if let Ok(Some(&frames)) = sub_matches.try_get_one::<usize>("frames") {
        setup.frames = frames;
    }
    if let Ok(Some(&steps_per_frame)) = sub_matches.try_get_one::<usize>("steps_per_frame") {
        setup.steps_per_frame = steps_per_frame;
    }
    setup
}

fn print_devices() {
    let adapters = device::enumerate_adapters();
    if adapters.is_empty() {
        println!("No accelerator adapters found.");
        return;
    }
    println!(
        "\n{:>40} {:>10} {:>16} {:>8}\n",
        "adapter".cyan().bold(),
        "backend".cyan().bold(),
        "type".cyan().bold(),
        "compute".cyan().bold()
    );
    for adapter in adapters {
        println!(
            "{:>40} {:>10} {:>16} {:>8}",
            adapter.name,
            format!("{:?}", adapter.backend),
            format!("{:?}", adapter.device_type),
            if adapter.compute { "yes" } else { "no" }
        );
    }
}

fn main() {
    let matches = command!()
        .arg(
            arg!(
                -n --number_of_threads <NUMBER_OF_THREADS> "Sets the number of threads of the parallel engine"
            )
            .required(false)
            .global(true)
            .value_parser(value_parser!(usize)),
        )
        .arg(arg!(-v --verbose "Prints debug diagnostics").global(true))
        .arg(arg!(-q --quiet "Prints errors only").global(true))
        .subcommand(
            Command::new("run")
                .about("Runs the wind tunnel")
                .arg(
                    arg!(
                        -e --engine <ENGINE> "Collide-and-stream engine"
                    )
                    .required(false)
                    .value_parser(["serial", "parallel", "accelerator", "session"]),
                )
                .arg(
                    arg!(
                        -f --frames <FRAMES> "Number of frames"
                    )
                    .required(false)
                    .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("steps_per_frame")
                        .short('s')
                        .long("steps-per-frame")
                        .value_name("STEPS")
                        .help("Lattice steps between frames")
                        .required(false)
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("benchmark")
                .about("Times every engine on the case setup")
                .arg(
                    arg!(
                        -s --steps <STEPS> "Lattice steps per engine"
                    )
                    .required(false)
                    .default_value("200")
                    .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(Command::new("devices").about("Lists the accelerator adapters"))
        .get_matches();

    setup_logging(matches.get_flag("verbose"), matches.get_flag("quiet"));

    if let Some(&num_threads) = matches.get_one::<usize>("number_of_threads") {
        if let Err(e) = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
        {
            eprintln!("Error while building the thread pool: {e}.");
            process::exit(1);
        }
    }

    let result = match matches.subcommand() {
        Some(("run", sub_matches)) => lbm::d2q9::run(load_setup(sub_matches)),
        Some(("benchmark", sub_matches)) => {
            let steps = sub_matches.get_one::<usize>("steps").copied().unwrap_or(200);
            lbm::d2q9::run_benchmark(load_setup(sub_matches), steps)
        }
        Some(("devices", _)) => {
            print_devices();
            Ok(())
        }
        _ => lbm::d2q9::run(load_setup(&matches)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}.");
        process::exit(1);
    }
}
