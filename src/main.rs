//! OISC Move Machine - CLI Entry Point
//!
//! Commands:
//! - `oisc-vm run <config.json>` - Load a configuration and run it
//! - `oisc-vm example <name>` - Run a built-in program
//! - `oisc-vm export <config.json>` - Load a configuration and print the resulting memory
//! - `oisc-vm list` - List the built-in programs and devices

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oisc::config::{load_file, save_file};
use oisc::{Config, ConfigError, ConfigFile, Console, DeviceRegistry, Example, Machine, MachineError};

#[derive(Parser)]
#[command(name = "oisc-vm")]
#[command(version = "0.1.0")]
#[command(about = "A one-instruction computer whose only instruction is move")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a configuration file and run it until it halts
    Run {
        /// Path to the JSON configuration
        config: String,
        /// Start from empty memory instead of the default layout
        #[arg(long)]
        no_base: bool,
        #[command(flatten)]
        opts: RunOptions,
    },
    /// Run a built-in program
    Example {
        /// Program name (see `list`)
        name: String,
        #[command(flatten)]
        opts: RunOptions,
    },
    /// Load a configuration file and print the resulting memory as JSON
    Export {
        /// Path to the JSON configuration
        config: String,
        /// Start from empty memory instead of the default layout
        #[arg(long)]
        no_base: bool,
        /// Leave device triggers out of the export
        #[arg(long)]
        no_callbacks: bool,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List built-in programs and devices
    List,
}

#[derive(Args)]
struct RunOptions {
    /// Maximum number of moves to execute (default: 10000)
    #[arg(short, long, default_value = "10000")]
    max_steps: u64,
    /// Text fed to the input device
    #[arg(short, long)]
    input: Option<String>,
    /// Log every move
    #[arg(short, long)]
    trace: bool,
    /// Print every configured cell after the run
    #[arg(short, long)]
    dump: bool,
}

fn main() {
    let cli = Cli::parse();

    let trace = matches!(
        &cli.command,
        Some(Commands::Run { opts: RunOptions { trace: true, .. }, .. })
            | Some(Commands::Example { opts: RunOptions { trace: true, .. }, .. })
    );
    init_tracing(trace);

    match cli.command {
        Some(Commands::Run { config, no_base, opts }) => {
            let console = console(&opts);
            let devices = DeviceRegistry::standard(&console);
            let config = or_exit(file_config(&config, no_base, &devices), "Failed to load configuration");
            run_machine(&config, &console, &opts);
        }
        Some(Commands::Example { name, opts }) => {
            let Some(example) = Example::from_name(&name) else {
                eprintln!("❌ Unknown example: {} (try `list`)", name);
                std::process::exit(1);
            };
            println!("🔧 Running example: {}", example.name());
            let console = console(&opts);
            let devices = DeviceRegistry::standard(&console);
            let config = or_exit(example.config(&devices), "Failed to build example");
            run_machine(&config, &console, &opts);
        }
        Some(Commands::Export { config, no_base, no_callbacks, output }) => {
            export_config(&config, no_base, !no_callbacks, output);
        }
        Some(Commands::List) => list(),
        None => {
            println!("OISC Move Machine v0.1.0");
            println!("A one-instruction computer: every instruction is a move");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("warn,oisc=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn or_exit<T, E: std::fmt::Display>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("❌ {}: {}", context, e);
            std::process::exit(1);
        }
    }
}

fn console(opts: &RunOptions) -> Console {
    match &opts.input {
        Some(text) => Console::with_input(text),
        None => Console::new(),
    }
}

/// The file's configuration, layered over the default layout unless `no_base`.
fn file_config(path: &str, no_base: bool, devices: &DeviceRegistry) -> Result<Config, ConfigError> {
    let file = load_file(path)?.to_config(devices)?;
    if no_base {
        return Ok(file);
    }
    let mut config = oisc::default_config(devices)?;
    config.merge(file);
    Ok(config)
}

fn run_machine(config: &Config, console: &Console, opts: &RunOptions) {
    let mut vm = or_exit(Machine::from_config(config), "Failed to load configuration");
    println!("📂 Loaded {} cells, {} symbols", config.len(), vm.mem.symbols().len());

    let result = vm.run(opts.max_steps);

    let output = console.output_text();
    if !output.is_empty() {
        println!();
        println!("━━━ Output ━━━");
        println!("{}", output);
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Steps: {}", vm.steps);
    if let Some(mv) = vm.last_move() {
        println!("Last move: {} → {} ({}) at {}", mv.src, mv.dst, mv.value, mv.ip);
    }

    if opts.dump {
        println!();
        println!("━━━ Memory ━━━");
        dump(&vm);
    }

    match result {
        Ok(_) => println!("State: Halted"),
        Err(MachineError::BudgetExhausted { steps }) => {
            tracing::warn!(steps, "step budget exhausted");
            println!("State: Running");
            println!();
            println!("⚠️  Reached max steps limit ({}). Use --max-steps to increase.", steps);
        }
        Err(e) => {
            eprintln!("❌ Machine error after {} steps: {}", vm.steps, e);
            std::process::exit(1);
        }
    }
}

fn dump(vm: &Machine) {
    println!("{:>6}  {:<16} {:>12} {:>12}", "addr", "symbols", "stored", "observed");
    for addr in vm.mem.addresses() {
        let aliases = vm.mem.symbols().aliases_of(addr).join(",");
        let stored = vm.mem.stored(addr).map(|w| w.to_string()).unwrap_or_default();
        let observed = vm.mem.observed(addr).map(|w| w.to_string()).unwrap_or_default();
        let marker = match (vm.mem.read_trigger(addr), vm.mem.write_triggers(addr).is_empty()) {
            (Some(_), false) => " rw",
            (Some(_), true) => " r",
            (None, false) => " w",
            (None, true) => "",
        };
        println!("{:>6}  {:<16} {:>12} {:>12}{}", addr, aliases, stored, observed, marker);
    }
}

fn export_config(path: &str, no_base: bool, include_callbacks: bool, output: Option<String>) {
    let console = Console::new();
    let devices = DeviceRegistry::standard(&console);
    let config = or_exit(file_config(path, no_base, &devices), "Failed to load configuration");
    let vm = or_exit(Machine::from_config(&config), "Failed to load configuration");

    let exported = vm.export_config(include_callbacks);
    let file = or_exit(ConfigFile::from_config(&exported, include_callbacks), "Failed to export");

    match output {
        Some(out_path) => {
            or_exit(save_file(&out_path, &file), "Failed to save configuration");
            println!("✓ Saved {} cells to {}", file.entries.len(), out_path);
        }
        None => println!("{}", or_exit(file.to_json(), "Failed to export")),
    }
}

fn list() {
    println!("━━━ Examples ━━━");
    for example in Example::ALL {
        println!("  {:<14} {}", example.name(), example.description());
    }

    let devices = DeviceRegistry::standard(&Console::new());
    println!();
    println!("━━━ Devices ━━━");
    println!("  onread:  {}", devices.read_names().collect::<Vec<_>>().join(" "));
    println!("  onwrite: {}", devices.write_names().collect::<Vec<_>>().join(" "));
}
