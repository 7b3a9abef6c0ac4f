use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use simdgen::{
    BitPackPlanner, Direction, ElementType, EmissionDriver, GeneratorConfig, KernelFamily,
    NetworkKind, Orientation, PackDirection, SortNetworkPlanner,
};

#[derive(Parser, Debug)]
#[command(name = "simdgen", version, about = "Generate AVX2 bitonic sort and bit-packing kernels")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory the namespace directory is created in
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Name of the generated module directory
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate bitonic sort kernels
    Sort(SortArgs),
    /// Generate bit-packing kernels for every width 0..=32
    Pack(PackArgs),
    /// Generate both kernel families
    All {
        #[command(flatten)]
        sort: SortArgs,
        #[command(flatten)]
        pack: PackArgs,
    },
    /// Print plan statistics without writing anything
    Plan {
        #[command(subcommand)]
        target: PlanTarget,
    },
}

#[derive(Args, Debug)]
struct SortArgs {
    /// Comma-separated element types, e.g. i32,f64
    #[arg(long, value_delimiter = ',')]
    types: Option<Vec<ElementType>>,

    #[arg(long)]
    max_vectors: Option<usize>,

    #[arg(long)]
    unroll_threshold: Option<usize>,

    /// Sort in descending order
    #[arg(long)]
    descending: bool,
}

#[derive(Args, Debug)]
struct PackArgs {
    /// Values per packed batch
    #[arg(long)]
    batch_length: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum PlanTarget {
    /// Statistics of one sorting network
    Sort {
        #[arg(long, default_value = "i32")]
        element: ElementType,
        #[arg(long)]
        vectors: usize,
        #[arg(long)]
        descending: bool,
    },
    /// Step layout of one bit width
    Pack {
        #[arg(long)]
        bit_width: u32,
    },
}

impl SortArgs {
    fn apply(&self, config: &mut GeneratorConfig) {
        if let Some(types) = &self.types {
            config.supported_element_types = types.clone();
        }
        if let Some(max_vectors) = self.max_vectors {
            config.max_bitonic_sort_vectors = max_vectors;
        }
        if let Some(threshold) = self.unroll_threshold {
            config.unroll_threshold = threshold;
        }
        if self.descending {
            config.direction = Direction::Descending;
        }
    }
}

impl PackArgs {
    fn apply(&self, config: &mut GeneratorConfig) {
        if let Some(batch_length) = self.batch_length {
            config.packing.batch_length = batch_length;
        }
    }
}

fn load_config(cli: &Cli) -> Result<GeneratorConfig> {
    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_directory = dir.clone();
    }
    if let Some(namespace) = &cli.namespace {
        config.output_namespace = namespace.clone();
    }
    Ok(config)
}

fn run_generation(config: GeneratorConfig, family: KernelFamily) -> Result<()> {
    let driver = EmissionDriver::new(config).context("invalid configuration")?;
    let report = driver.generate(family).context("generation failed")?;
    info!(
        files = report.written.len(),
        entry_points = report.sort_entry_points,
        specializations = report.sort_specializations,
        pack_widths = report.pack_widths,
        "generation complete"
    );
    for path in &report.written {
        println!("{}", path.display());
    }
    Ok(())
}

fn print_plan(config: &GeneratorConfig, target: &PlanTarget) -> Result<()> {
    match *target {
        PlanTarget::Sort {
            element,
            vectors,
            descending,
        } => {
            anyhow::ensure!(vectors > 0, "--vectors must be at least 1");
            let lanes = element.lanes(config.vector_width_bytes)?;
            let direction = if descending {
                Direction::Descending
            } else {
                Direction::Ascending
            };
            let planner = SortNetworkPlanner::new(lanes, config.unroll_threshold);
            let plan = planner.plan_sort(vectors, direction);
            let stats = plan.stats();
            println!("{} x{} lanes, {} vectors, {}", element, lanes, vectors, direction);
            println!("  base cases:      {}", stats.base_cases);
            println!("  stages:          {}", stats.stages);
            println!("  exchanges:       {}", stats.exchanges);
            println!("  calls:           {}", stats.calls);
            println!("  depth:           {}", stats.depth);
            for spec in plan.direct_calls() {
                println!("  calls {}", spec);
            }
            let unrolled = SortNetworkPlanner::new(lanes, usize::MAX)
                .plan_site(NetworkKind::Sort, vectors, Orientation::uniform(direction))
                .stats();
            println!("  fully unrolled:  {} stages, {} exchanges", unrolled.stages, unrolled.exchanges);
        }
        PlanTarget::Pack { bit_width } => {
            let planner = BitPackPlanner::new(config.packing.batch_length);
            let plan = planner.plan(bit_width, PackDirection::Pack)?;
            println!(
                "bit width {}: {} values -> {} words",
                bit_width,
                plan.batch_length(),
                plan.words()
            );
            for step in plan.steps() {
                println!(
                    "  value {:>3} -> word {:>3} at bit {:>2}{}{}{}",
                    step.input_index,
                    step.output_index,
                    step.shift_amount,
                    if step.flushes_word { ", flush" } else { "" },
                    if step.carry_bits > 0 {
                        format!(", carry {}", step.carry_bits)
                    } else {
                        String::new()
                    },
                    if step.flushes_carry { ", carry flush" } else { "" }
                );
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    info!("simdgen v{}", simdgen::VERSION);
    let mut config = load_config(&cli)?;

    match &cli.command {
        Command::Sort(args) => {
            args.apply(&mut config);
            run_generation(config, KernelFamily::Sort)
        }
        Command::Pack(args) => {
            args.apply(&mut config);
            run_generation(config, KernelFamily::Pack)
        }
        Command::All { sort, pack } => {
            sort.apply(&mut config);
            pack.apply(&mut config);
            run_generation(config, KernelFamily::All)
        }
        Command::Plan { target } => {
            config.validate()?;
            print_plan(&config, target)
        }
    }
}
